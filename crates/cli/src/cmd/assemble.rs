//! `cairn assemble`: merge directory trees into one output.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::json;

use cairn_lib::assembly::{MergePolicy, Merger, collect_dirs, write_dir, write_tar_gz};
use cairn_lib::settings::Settings;

use crate::output::{self, OutputFormat, format_bytes, format_duration, print_json, print_stat, print_success};

pub struct AssembleArgs {
  pub own: Vec<PathBuf>,
  pub dependencies: Vec<PathBuf>,
  pub out: PathBuf,
  pub policy: Option<PathBuf>,
}

fn is_archive(path: &Path) -> bool {
  let name = path.to_string_lossy();
  name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

pub fn cmd_assemble(args: &AssembleArgs, settings: &Settings, verbose: bool, format: OutputFormat) -> Result<()> {
  let policy = match args.policy.as_ref().or(settings.policy.as_ref()) {
    Some(path) => {
      MergePolicy::from_file(path).with_context(|| format!("Failed to load merge policy: {}", path.display()))?
    }
    None => MergePolicy::standard(),
  };

  let inputs = collect_dirs(&args.own, &args.dependencies).context("Failed to collect inputs")?;

  let start = Instant::now();
  let mut merger = Merger::new(policy);
  if let Some(threads) = settings.parallelism {
    merger = merger.parallelism(threads);
  }
  let tree = merger.merge(&inputs).context("Merge failed")?;
  let elapsed = start.elapsed();

  if is_archive(&args.out) {
    write_tar_gz(&tree, &args.out)?;
  } else {
    write_dir(&tree, &args.out)?;
  }

  let digest = tree.digest();
  if format.is_json() {
    return print_json(&json!({
      "output": args.out,
      "files": tree.len(),
      "digest": digest.0,
      "reports": tree.reports(),
    }));
  }

  print_success(&format!(
    "Assembled {} file(s) into {} in {}",
    tree.len(),
    args.out.display(),
    format_duration(elapsed)
  ));
  print_stat("Digest", digest.short());
  if is_archive(&args.out) {
    let size = fs::metadata(&args.out).map(|m| m.len()).unwrap_or(0);
    print_stat("Size", &format_bytes(size));
  }

  if verbose {
    for report in tree.reports().iter().filter(|r| r.strategy.is_some()) {
      let strategy = report.strategy.map(|s| s.to_string()).unwrap_or_default();
      println!(
        "  {} {} [{}] {} {}",
        output::symbols::INFO,
        report.path,
        strategy,
        output::symbols::ARROW,
        if report.outputs.is_empty() {
          "discarded".to_string()
        } else {
          report.outputs.join(", ")
        }
      );
    }
  }
  Ok(())
}
