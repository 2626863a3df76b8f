//! Values, keys, bindings and evaluation errors.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::session::Scope;
use crate::assembly::AssemblyError;
use crate::error::ParseError;

/// A resolved key value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
  Unit,
  Bool(bool),
  Int(i64),
  Str(String),
  Path(PathBuf),
  List(Vec<Value>),
  Map(BTreeMap<String, Value>),
}

impl Value {
  pub fn value_type(&self) -> ValueType {
    match self {
      Value::Unit => ValueType::Unit,
      Value::Bool(_) => ValueType::Bool,
      Value::Int(_) => ValueType::Int,
      Value::Str(_) => ValueType::Str,
      Value::Path(_) => ValueType::Path,
      Value::List(_) => ValueType::List,
      Value::Map(_) => ValueType::Map,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::Str(s) => Some(s),
      _ => None,
    }
  }

  /// Paths and strings both read as paths.
  pub fn as_path(&self) -> Option<&Path> {
    match self {
      Value::Path(p) => Some(p),
      Value::Str(s) => Some(Path::new(s)),
      _ => None,
    }
  }

  pub fn as_int(&self) -> Option<i64> {
    match self {
      Value::Int(i) => Some(*i),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Value::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub fn as_list(&self) -> Option<&[Value]> {
    match self {
      Value::List(items) => Some(items),
      _ => None,
    }
  }

  pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
    match self {
      Value::Map(map) => Some(map),
      _ => None,
    }
  }

  /// Combine `self` with `other` the way an `append` binding does.
  ///
  /// - strings concatenate
  /// - lists extend with a list, or push any other value
  /// - integers add
  /// - unit is the identity
  pub fn append(self, other: Value) -> Result<Value, String> {
    match (self, other) {
      (Value::Unit, other) => Ok(other),
      (Value::Str(mut left), Value::Str(right)) => {
        left.push_str(&right);
        Ok(Value::Str(left))
      }
      (Value::List(mut items), Value::List(more)) => {
        items.extend(more);
        Ok(Value::List(items))
      }
      (Value::List(mut items), item) => {
        items.push(item);
        Ok(Value::List(items))
      }
      (Value::Int(left), Value::Int(right)) => left
        .checked_add(right)
        .map(Value::Int)
        .ok_or_else(|| "integer overflow".to_string()),
      (Value::Map(mut map), Value::Map(more)) => {
        map.extend(more);
        Ok(Value::Map(map))
      }
      (left, right) => Err(format!(
        "cannot append {} to {}",
        right.value_type(),
        left.value_type()
      )),
    }
  }

  /// Convert JSON into a value, reading strings as paths when `ty` is [`ValueType::Path`].
  pub fn from_json(json: &serde_json::Value, ty: ValueType) -> Result<Value, String> {
    use serde_json::Value as Json;

    Ok(match json {
      Json::Null => Value::Unit,
      Json::Bool(b) => Value::Bool(*b),
      Json::Number(n) => Value::Int(n.as_i64().ok_or_else(|| format!("unsupported number {n}"))?),
      Json::String(s) if ty == ValueType::Path => Value::Path(PathBuf::from(s)),
      Json::String(s) => Value::Str(s.clone()),
      Json::Array(items) => {
        let element = if ty == ValueType::Path { ty } else { ValueType::Any };
        Value::List(
          items
            .iter()
            .map(|item| Value::from_json(item, element))
            .collect::<Result<_, _>>()?,
        )
      }
      Json::Object(map) => Value::Map(
        map
          .iter()
          .map(|(k, v)| Ok((k.clone(), Value::from_json(v, ValueType::Any)?)))
          .collect::<Result<_, String>>()?,
      ),
    })
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Unit => f.write_str("()"),
      Value::Bool(b) => write!(f, "{b}"),
      Value::Int(i) => write!(f, "{i}"),
      Value::Str(s) => f.write_str(s),
      Value::Path(p) => write!(f, "{}", p.display()),
      Value::List(items) => {
        f.write_str("[")?;
        for (i, item) in items.iter().enumerate() {
          if i > 0 {
            f.write_str(", ")?;
          }
          write!(f, "{item}")?;
        }
        f.write_str("]")
      }
      Value::Map(map) => {
        f.write_str("{")?;
        for (i, (k, v)) in map.iter().enumerate() {
          if i > 0 {
            f.write_str(", ")?;
          }
          write!(f, "{k}: {v}")?;
        }
        f.write_str("}")
      }
    }
  }
}

impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Value::Str(value.to_string())
  }
}

impl From<String> for Value {
  fn from(value: String) -> Self {
    Value::Str(value)
  }
}

impl From<i64> for Value {
  fn from(value: i64) -> Self {
    Value::Int(value)
  }
}

impl From<bool> for Value {
  fn from(value: bool) -> Self {
    Value::Bool(value)
  }
}

impl From<PathBuf> for Value {
  fn from(value: PathBuf) -> Self {
    Value::Path(value)
  }
}

impl From<Vec<Value>> for Value {
  fn from(value: Vec<Value>) -> Self {
    Value::List(value)
  }
}

/// Declared type of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
  #[default]
  Any,
  Unit,
  Bool,
  Int,
  Str,
  Path,
  List,
  Map,
}

impl ValueType {
  /// Starting value for a `Modify` that has no `Set` before it.
  pub fn default_value(self) -> Value {
    match self {
      ValueType::Any | ValueType::Unit => Value::Unit,
      ValueType::Bool => Value::Bool(false),
      ValueType::Int => Value::Int(0),
      ValueType::Str => Value::Str(String::new()),
      ValueType::Path => Value::Path(PathBuf::new()),
      ValueType::List => Value::List(Vec::new()),
      ValueType::Map => Value::Map(BTreeMap::new()),
    }
  }

  /// Check `value` against this type. Strings are accepted (and converted) for paths.
  pub fn coerce(self, value: Value) -> Result<Value, ValueType> {
    match (self, value) {
      (ValueType::Any, value) => Ok(value),
      (ValueType::Path, Value::Str(s)) => Ok(Value::Path(PathBuf::from(s))),
      (ty, value) if value.value_type() == ty => Ok(value),
      (_, value) => Err(value.value_type()),
    }
  }
}

impl fmt::Display for ValueType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ValueType::Any => "any",
      ValueType::Unit => "unit",
      ValueType::Bool => "bool",
      ValueType::Int => "int",
      ValueType::Str => "str",
      ValueType::Path => "path",
      ValueType::List => "list",
      ValueType::Map => "map",
    };
    f.write_str(name)
  }
}

/// Whether a key is a plain setting or a task that may take arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
  #[default]
  Setting,
  Task,
}

/// Declaration of a key. Keys carry no state; values live in bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDef {
  pub name: String,
  pub kind: KeyKind,
  pub ty: ValueType,
  pub description: Option<String>,
}

impl KeyDef {
  pub fn setting(name: impl Into<String>, ty: ValueType) -> Self {
    Self {
      name: name.into(),
      kind: KeyKind::Setting,
      ty,
      description: None,
    }
  }

  pub fn task(name: impl Into<String>, ty: ValueType) -> Self {
    Self {
      name: name.into(),
      kind: KeyKind::Task,
      ty,
      description: None,
    }
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }
}

pub type SetFn = dyn Fn(&Scope<'_>) -> Result<Value, EvalError> + Send + Sync;
pub type ModifyFn = dyn Fn(&Scope<'_>, Value) -> Result<Value, EvalError> + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
  Set,
  Modify,
}

impl fmt::Display for BindingKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BindingKind::Set => f.write_str("set"),
      BindingKind::Modify => f.write_str("modify"),
    }
  }
}

/// One operation on a key inside a project or configuration.
///
/// `Set` produces a fresh value and hides every operation folded before it;
/// `Modify` transforms the value produced so far.
#[derive(Clone)]
pub enum Binding {
  Set(Arc<SetFn>),
  Modify(Arc<ModifyFn>),
}

impl Binding {
  pub fn set<F>(f: F) -> Self
  where
    F: Fn(&Scope<'_>) -> Result<Value, EvalError> + Send + Sync + 'static,
  {
    Binding::Set(Arc::new(f))
  }

  pub fn modify<F>(f: F) -> Self
  where
    F: Fn(&Scope<'_>, Value) -> Result<Value, EvalError> + Send + Sync + 'static,
  {
    Binding::Modify(Arc::new(f))
  }

  /// `Set` to a fixed value.
  pub fn constant(value: impl Into<Value>) -> Self {
    let value = value.into();
    Binding::set(move |_| Ok(value.clone()))
  }

  /// `Modify` by appending a fixed value (see [`Value::append`]).
  pub fn append(value: impl Into<Value>) -> Self {
    let value = value.into();
    Binding::modify(move |scope, current| current.append(value.clone()).map_err(|message| scope.fail(message)))
  }

  pub fn kind(&self) -> BindingKind {
    match self {
      Binding::Set(_) => BindingKind::Set,
      Binding::Modify(_) => BindingKind::Modify,
    }
  }
}

impl fmt::Debug for Binding {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Binding::{}", self.kind())
  }
}

/// Errors raised while building a graph or resolving keys.
#[derive(Debug, Error)]
pub enum EvalError {
  /// A key's evaluation read itself, directly or through other keys.
  #[error("cyclic evaluation: {}", chain.join(" -> "))]
  CyclicEvaluation { chain: Vec<String> },

  #[error("unknown project: {0}")]
  UnknownProject(String),

  #[error("unknown configuration '{configuration}' in project '{project}'")]
  UnknownConfiguration { project: String, configuration: String },

  #[error("unknown key: {0}")]
  UnknownKey(String),

  #[error("duplicate definition: {0}")]
  DuplicateDefinition(String),

  #[error("graph has no projects")]
  NoProjects,

  /// No binding contributes to the key in the requested scope.
  #[error("no value defined for {0}")]
  Undefined(String),

  #[error("{scope}: expected {expected}, got {actual}")]
  TypeMismatch {
    scope: String,
    expected: ValueType,
    actual: ValueType,
  },

  #[error("evaluation cancelled")]
  Cancelled,

  /// A binding function reported a failure.
  #[error("{key}: {message}")]
  Binding { key: String, message: String },

  #[error("invalid build definition: {0}")]
  Definition(String),

  #[error(transparent)]
  Parse(#[from] ParseError),

  #[error(transparent)]
  Assembly(#[from] AssemblyError),
}
