//! Task expressions.
//!
//! A task expression names a key to run, optionally scoped to a project and a
//! stack of configurations, followed by arguments:
//!
//! ```text
//! [project "/"] {configuration ":"} key {argument}
//! argument := value | name "=" value
//! ```
//!
//! Several expressions are joined with `;`. See [`parse_tasks`] for raw
//! command-line strings and [`parse_task_args`] for already-split arguments.

mod parse;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use parse::{parse_task_args, parse_tasks};

/// One parsed task invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Task {
  /// Explicit project, if the expression had a `project/` prefix.
  pub project: Option<String>,
  /// Configuration scopes, outermost first.
  pub configurations: Vec<String>,
  /// Name of the key to run.
  pub key: String,
  /// Arguments in encounter order; positional arguments have an empty name.
  pub arguments: Vec<(String, String)>,
}

impl Task {
  /// A task with no project, configurations or arguments.
  pub fn new(key: impl Into<String>) -> Self {
    Self {
      project: None,
      configurations: Vec::new(),
      key: key.into(),
      arguments: Vec::new(),
    }
  }

  /// Positional argument values in order.
  pub fn positional(&self) -> impl Iterator<Item = &str> {
    self
      .arguments
      .iter()
      .filter(|(name, _)| name.is_empty())
      .map(|(_, value)| value.as_str())
  }

  /// Value of the first named argument called `name`.
  pub fn named(&self, name: &str) -> Option<&str> {
    self
      .arguments
      .iter()
      .find(|(arg, _)| !arg.is_empty() && arg == name)
      .map(|(_, value)| value.as_str())
  }
}

impl fmt::Display for Task {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if let Some(project) = &self.project {
      write!(f, "{project}/")?;
    }
    for configuration in &self.configurations {
      write!(f, "{configuration}:")?;
    }
    f.write_str(&self.key)?;
    for (name, value) in &self.arguments {
      f.write_str(" ")?;
      if !name.is_empty() {
        write!(f, "{name}=")?;
      }
      write_value(f, value)?;
    }
    Ok(())
  }
}

/// Quote values that would not survive re-parsing as a single plain token.
fn write_value(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
  let plain = !value.is_empty()
    && !value
      .chars()
      .any(|c| c.is_whitespace() || matches!(c, ';' | '"' | '\'' | '\\' | '=' | ':' | '/'));
  if plain {
    return f.write_str(value);
  }

  f.write_str("\"")?;
  for c in value.chars() {
    if matches!(c, '"' | '\\') {
      f.write_str("\\")?;
    }
    write!(f, "{c}")?;
  }
  f.write_str("\"")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_renders_canonical_expression() {
    let task = Task {
      project: Some("core".to_string()),
      configurations: vec!["test".to_string(), "it".to_string()],
      key: "run".to_string(),
      arguments: vec![
        ("filter".to_string(), "fast".to_string()),
        (String::new(), "two words".to_string()),
      ],
    };
    assert_eq!(task.to_string(), "core/test:it:run filter=fast \"two words\"");
  }

  #[test]
  fn display_reparses_to_the_same_task() {
    let task = Task {
      project: None,
      configurations: vec![],
      key: "echo".to_string(),
      arguments: vec![
        (String::new(), "a=b".to_string()),
        ("path".to_string(), "C:\\tmp; x".to_string()),
      ],
    };
    let reparsed = parse_tasks(&task.to_string()).unwrap();
    assert_eq!(reparsed, vec![task]);
  }

  #[test]
  fn argument_accessors() {
    let task = &parse_tasks("k a x=1 b x=2").unwrap()[0];
    assert_eq!(task.positional().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(task.named("x"), Some("1"));
    assert_eq!(task.named("y"), None);
  }
}
