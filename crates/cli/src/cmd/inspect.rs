//! `cairn inspect`: show how a key resolves without running it.
//!
//! For each task of the expression, prints the configurations visited in
//! order and the operation list applied to the key. Operations before the
//! last `set` are listed but have no effect on the result.

use std::path::Path;

use anyhow::Result;
use owo_colors::{OwoColorize, Stream};
use serde_json::json;

use cairn_lib::graph::BindingKind;
use cairn_lib::settings::Settings;
use cairn_lib::task::parse_tasks;

use super::run::{GraphOptions, load_graph};
use crate::output::{self, OutputFormat, print_json, print_stat};

pub fn cmd_inspect(definition: &Path, expr: &str, settings: &Settings, format: OutputFormat) -> Result<()> {
  let graph = load_graph(definition, &GraphOptions::default(), settings)?;
  let tasks = parse_tasks(expr)?;
  let mut reports = Vec::new();

  for task in &tasks {
    let (project, stack) = graph.scope_ids(task.project.as_deref(), &task.configurations)?;
    let key = graph.key_id(&task.key)?;
    let def = graph.key(key);

    let traversal: Vec<&str> = graph
      .traversal(project, &stack)
      .into_iter()
      .map(|config| graph.configuration_name(config))
      .collect();
    let operations = graph.operations(key, project, &stack);
    let effective_from = operations
      .iter()
      .rposition(|op| op.kind() == BindingKind::Set)
      .unwrap_or(0);
    let scope = graph.scope_label(project, &stack);

    if format.is_json() {
      reports.push(json!({
        "task": task.to_string(),
        "scope": scope,
        "key": def.name,
        "type": def.ty,
        "kind": def.kind,
        "traversal": traversal,
        "operations": operations.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "effective_from": effective_from,
      }));
      continue;
    }

    println!("{} {}:{}", output::symbols::ARROW, scope, def.name);
    print_stat("type", &def.ty.to_string());
    print_stat("traversal", &traversal.join(" → "));
    if operations.is_empty() {
      print_stat("operations", "none (undefined)");
    }
    for (index, op) in operations.iter().enumerate() {
      if index < effective_from {
        println!("    {}", op.if_supports_color(Stream::Stdout, |s| s.dimmed()));
      } else {
        println!("    {}", op);
      }
    }
  }

  if format.is_json() {
    print_json(&reports)?;
  }
  Ok(())
}
