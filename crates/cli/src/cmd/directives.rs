//! `cairn directives`: list the facts declared in a script header.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use cairn_lib::directive::{DirectiveFact, collect_facts};

use crate::output::{print_info, print_json};

pub fn cmd_directives(file: &Path, json: bool) -> Result<()> {
  let text = fs::read_to_string(file).with_context(|| format!("Failed to read script: {}", file.display()))?;
  let (facts, summary) = collect_facts(&text).with_context(|| format!("Invalid header in {}", file.display()))?;

  if json {
    return print_json(&json!({
      "facts": facts,
      "directives": summary.directives,
      "stopped_at": summary.stopped_at,
    }));
  }

  for fact in &facts {
    match fact {
      DirectiveFact::Dependency {
        group,
        artifact,
        version,
      } => println!("dep        {}:{}:{}", group, artifact, version),
      DirectiveFact::Repository { name, url } => println!("repository {} {}", name, url),
      DirectiveFact::Plugin { name, group } => println!("plugin     {} {}", name, group),
      DirectiveFact::Classpath { path } => println!("classpath  {}", path),
    }
  }

  match summary.stopped_at {
    Some(line) => print_info(&format!("{} directive(s), header ends at line {}", summary.directives, line)),
    None => print_info(&format!("{} directive(s)", summary.directives)),
  }
  Ok(())
}
