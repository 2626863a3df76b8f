//! `cairn task parse`: show how a task expression is understood.

use anyhow::Result;

use cairn_lib::task::{parse_task_args, parse_tasks};

use crate::output::{self, OutputFormat, print_json, print_stat};

/// Parse `input` as one raw expression, or as pre-split tokens with `tokens`.
pub fn cmd_task_parse(input: &[String], tokens: bool, format: OutputFormat) -> Result<()> {
  let tasks = if tokens {
    parse_task_args(input)?
  } else {
    parse_tasks(&input.join(" "))?
  };

  if format.is_json() {
    return print_json(&tasks);
  }

  for task in &tasks {
    println!("{} {}", output::symbols::ARROW, task);
    if let Some(project) = &task.project {
      print_stat("project", project);
    }
    if !task.configurations.is_empty() {
      print_stat("configurations", &task.configurations.join(", "));
    }
    print_stat("key", &task.key);
    for (name, value) in &task.arguments {
      let label = if name.is_empty() { "argument" } else { name.as_str() };
      print_stat(label, value);
    }
  }
  Ok(())
}
