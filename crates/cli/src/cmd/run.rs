//! `cairn run`: evaluate tasks against a build definition.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::debug;

use cairn_lib::assembly::AssemblyPlugin;
use cairn_lib::directive::{DirectivePlugin, collect_facts};
use cairn_lib::graph::{BuildDefinition, ConfigGraph, EvalSession, GraphBuilder};
use cairn_lib::settings::Settings;
use cairn_lib::task::parse_task_args;

use crate::output::{OutputFormat, print_json, print_success};

/// Plugins layered under a build definition.
#[derive(Debug, Default)]
pub struct GraphOptions<'a> {
  /// Register the assembly task on this project.
  pub assembly: Option<&'a str>,
  /// Script whose header directives are bound on the first project.
  pub directives: Option<&'a Path>,
}

/// Load `definition` and build its configuration graph.
///
/// Plugins register before the definition, so the definition's bindings take
/// precedence over their defaults.
pub fn load_graph(definition: &Path, options: &GraphOptions<'_>, settings: &Settings) -> Result<ConfigGraph> {
  let definition = BuildDefinition::from_file(definition)
    .with_context(|| format!("Failed to load build definition: {}", definition.display()))?;

  let mut builder = GraphBuilder::new();
  if let Some(project) = options.assembly {
    let mut plugin = AssemblyPlugin::new(project);
    if let Some(threads) = settings.parallelism {
      plugin = plugin.parallelism(threads);
    }
    builder.register(&plugin)?;
  }
  if let Some(script) = options.directives {
    let text = fs::read_to_string(script).with_context(|| format!("Failed to read script: {}", script.display()))?;
    let (facts, _) = collect_facts(&text).with_context(|| format!("Invalid header in {}", script.display()))?;
    let project = definition
      .projects
      .first()
      .map(|p| p.name.clone())
      .context("Build definition declares no projects")?;
    debug!(script = %script.display(), facts = facts.len(), project = %project, "binding directives");
    builder.register(&DirectivePlugin::new(project, facts))?;
  }
  builder.register(&definition)?;

  builder.build().context("Invalid build definition")
}

pub fn cmd_run(
  definition: &Path,
  tasks: &[String],
  options: &GraphOptions<'_>,
  settings: &Settings,
  format: OutputFormat,
) -> Result<()> {
  let tasks = parse_task_args(tasks)?;
  let graph = load_graph(definition, options, settings)?;
  let session = EvalSession::new(Arc::new(graph));

  let values = session.run_all(&tasks)?;

  if format.is_json() {
    let results: Vec<_> = tasks
      .iter()
      .zip(&values)
      .map(|(task, value)| json!({ "task": task.to_string(), "value": value }))
      .collect();
    return print_json(&results);
  }

  for value in &values {
    println!("{}", value);
  }
  print_success(&format!("Ran {} task(s), {} value(s) memoized", tasks.len(), session.memoized()));
  Ok(())
}
