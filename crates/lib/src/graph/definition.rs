//! JSON build definitions.
//!
//! A definition declares keys, projects, configurations and literal bindings:
//!
//! ```json
//! {
//!   "keys": { "acc": { "type": "str" }, "trail": { "type": "str", "kind": "task" } },
//!   "projects": [{
//!     "name": "root",
//!     "configurations": [{ "name": "a", "extends": ["b"], "bindings": [{ "key": "acc", "op": "append", "value": "a" }] }],
//!     "bindings": [{ "key": "trail", "op": "ref", "source": "acc", "configurations": ["a"] }]
//!   }]
//! }
//! ```
//!
//! Supported binding ops: `set`, `append`, `ref`, `append-ref` and `argument`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use super::builder::{GraphBuilder, GraphPlugin};
use super::session::Scope;
use super::types::{Binding, EvalError, KeyDef, KeyKind, Value, ValueType};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildDefinition {
  #[serde(default)]
  pub keys: BTreeMap<String, KeyDecl>,
  pub projects: Vec<ProjectDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyDecl {
  #[serde(rename = "type", default)]
  pub ty: ValueType,
  #[serde(default)]
  pub kind: KeyKind,
  #[serde(default)]
  pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectDef {
  pub name: String,
  /// Configuration used for an empty stack.
  #[serde(default)]
  pub default: Option<String>,
  #[serde(default)]
  pub configurations: Vec<ConfigurationDef>,
  #[serde(default)]
  pub bindings: Vec<BindingDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigurationDef {
  pub name: String,
  #[serde(default)]
  pub extends: Vec<String>,
  #[serde(default)]
  pub bindings: Vec<BindingDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BindingDef {
  pub key: String,
  #[serde(flatten)]
  pub op: BindingOp,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum BindingOp {
  /// Replace the value with a literal.
  Set { value: serde_json::Value },
  /// Append a literal to the value.
  Append { value: serde_json::Value },
  /// Replace the value with another key's value. `configurations` defaults to
  /// the stack being resolved.
  Ref {
    source: String,
    #[serde(default)]
    configurations: Option<Vec<String>>,
  },
  /// Append another key's value.
  AppendRef {
    source: String,
    #[serde(default)]
    configurations: Option<Vec<String>>,
  },
  /// Replace the value with a task argument (named, or positional by index).
  Argument {
    name: String,
    #[serde(default)]
    default: Option<serde_json::Value>,
  },
}

impl BuildDefinition {
  pub fn from_json(text: &str) -> Result<Self, EvalError> {
    serde_json::from_str(text).map_err(|e| EvalError::Definition(e.to_string()))
  }

  pub fn from_file(path: &Path) -> Result<Self, EvalError> {
    let text =
      std::fs::read_to_string(path).map_err(|e| EvalError::Definition(format!("{}: {e}", path.display())))?;
    Self::from_json(&text)
  }

  fn key_type(&self, key: &str) -> ValueType {
    self.keys.get(key).map(|decl| decl.ty).unwrap_or_default()
  }

  fn binding(&self, def: &BindingDef) -> Result<Binding, EvalError> {
    let ty = self.key_type(&def.key);
    let literal = |json: &serde_json::Value| {
      Value::from_json(json, ty).map_err(|reason| EvalError::Definition(format!("key '{}': {reason}", def.key)))
    };

    Ok(match &def.op {
      BindingOp::Set { value } => Binding::constant(literal(value)?),
      BindingOp::Append { value } => Binding::append(literal(value)?),
      BindingOp::Ref { source, configurations } => {
        let (source, configurations) = (source.clone(), configurations.clone());
        Binding::set(move |scope| lookup(scope, &source, configurations.as_deref()))
      }
      BindingOp::AppendRef { source, configurations } => {
        let (source, configurations) = (source.clone(), configurations.clone());
        Binding::modify(move |scope, current| {
          let other = lookup(scope, &source, configurations.as_deref())?;
          current.append(other).map_err(|message| scope.fail(message))
        })
      }
      BindingOp::Argument { name, default } => {
        let name = name.clone();
        let default = default.as_ref().map(literal).transpose()?;
        Binding::set(move |scope| match (scope.argument(&name), &default) {
          (Some(value), _) => Ok(Value::Str(value.to_string())),
          (None, Some(default)) => Ok(default.clone()),
          (None, None) => Err(scope.fail(format!("missing argument '{name}'"))),
        })
      }
    })
  }
}

fn lookup(scope: &Scope<'_>, source: &str, configurations: Option<&[String]>) -> Result<Value, EvalError> {
  match configurations {
    Some(configurations) => scope.get_in(source, configurations),
    None => scope.get(source),
  }
}

impl GraphPlugin for BuildDefinition {
  fn name(&self) -> &str {
    "build-definition"
  }

  fn register(&self, builder: &mut GraphBuilder) -> Result<(), EvalError> {
    for (name, decl) in &self.keys {
      builder.key(KeyDef {
        name: name.clone(),
        kind: decl.kind,
        ty: decl.ty,
        description: decl.description.clone(),
      });
    }

    for project in &self.projects {
      builder.project(&project.name);
      if let Some(default) = &project.default {
        builder.default_configuration(&project.name, default);
      }
      for binding in &project.bindings {
        builder.bind(&project.name, &binding.key, self.binding(binding)?);
      }
      for configuration in &project.configurations {
        let extends: Vec<&str> = configuration.extends.iter().map(String::as_str).collect();
        builder.configuration(&project.name, &configuration.name, &extends);
        for binding in &configuration.bindings {
          builder.bind_in(&project.name, &configuration.name, &binding.key, self.binding(binding)?);
        }
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::graph::EvalSession;

  fn load(json: serde_json::Value) -> EvalSession {
    let definition = BuildDefinition::from_json(&json.to_string()).unwrap();
    let mut builder = GraphBuilder::new();
    builder.register(&definition).unwrap();
    EvalSession::new(Arc::new(builder.build().unwrap()))
  }

  #[test]
  fn diamond_definition_matches_pinned_trail() {
    let session = load(serde_json::json!({
      "keys": { "acc": { "type": "str" }, "trail": { "type": "str", "kind": "task" } },
      "projects": [{
        "name": "root",
        "configurations": [
          { "name": "a", "extends": ["b", "c"], "bindings": [{ "key": "acc", "op": "append", "value": "a" }] },
          { "name": "b", "extends": ["c", "a"], "bindings": [{ "key": "acc", "op": "append", "value": "b" }] },
          { "name": "c", "extends": ["a", "b"], "bindings": [{ "key": "acc", "op": "append", "value": "c" }] }
        ],
        "bindings": [
          { "key": "acc", "op": "set", "value": "" },
          { "key": "trail", "op": "ref", "source": "acc", "configurations": ["a"] },
          { "key": "trail", "op": "append-ref", "source": "acc", "configurations": ["b"] },
          { "key": "trail", "op": "append-ref", "source": "acc", "configurations": ["c"] },
          { "key": "trail", "op": "append", "value": "." }
        ]
      }]
    }));

    assert_eq!(session.run_expr("trail").unwrap(), vec![Value::from("abcbcacab.")]);
  }

  #[test]
  fn argument_binding_uses_default() {
    let session = load(serde_json::json!({
      "keys": { "greet": { "type": "str", "kind": "task" } },
      "projects": [{
        "name": "app",
        "bindings": [
          { "key": "greet", "op": "argument", "name": "who", "default": "world" }
        ]
      }]
    }));

    assert_eq!(session.run_expr("greet").unwrap(), vec![Value::from("world")]);
    assert_eq!(session.run_expr("greet who=cairn").unwrap(), vec![Value::from("cairn")]);
  }

  #[test]
  fn path_keys_read_strings_as_paths() {
    let session = load(serde_json::json!({
      "keys": { "out": { "type": "path" } },
      "projects": [{ "name": "app", "bindings": [{ "key": "out", "op": "set", "value": "target/out" }] }]
    }));
    assert_eq!(
      session.resolve("out", None, &[] as &[&str]).unwrap(),
      Value::Path("target/out".into())
    );
  }

  #[test]
  fn unknown_fields_are_rejected() {
    let err = BuildDefinition::from_json(r#"{ "projects": [], "extra": 1 }"#).unwrap_err();
    assert!(matches!(err, EvalError::Definition(_)));
  }

  #[test]
  fn unsupported_number_is_a_definition_error() {
    let definition = BuildDefinition::from_json(
      r#"{ "keys": { "n": {} }, "projects": [{ "name": "p", "bindings": [{ "key": "n", "op": "set", "value": 1.5 }] }] }"#,
    )
    .unwrap();
    let err = GraphBuilder::new().register(&definition).map(|_| ()).unwrap_err();
    assert!(matches!(err, EvalError::Definition(_)));
  }
}
