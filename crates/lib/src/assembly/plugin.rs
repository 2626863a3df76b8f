//! The `assembly` task.

use std::path::PathBuf;

use tracing::info;

use super::collect::collect_dirs;
use super::merge::Merger;
use super::output::{write_dir, write_tar_gz};
use super::policy::MergePolicy;
use super::types::AssemblyError;
use crate::graph::{Binding, EvalError, GraphBuilder, GraphPlugin, Scope, Value, ValueType};

pub const OWN_INPUTS: &str = "assembly-own-inputs";
pub const DEPENDENCY_INPUTS: &str = "assembly-dependency-inputs";
pub const OUTPUT: &str = "assembly-output";
pub const POLICY: &str = "assembly-policy";
pub const TASK: &str = "assembly";

pub const DEFAULT_OUTPUT: &str = "target/assembly";

/// Registers the assembly settings with defaults on a project's base scope,
/// and the `assembly` task that collects, merges and writes the inputs.
///
/// `assembly-policy` is unit for [`MergePolicy::standard`], a path to a JSON
/// policy file, or an inline policy map. An output path ending in `.tar.gz` or
/// `.tgz` produces an archive; anything else a directory. The task accepts an
/// `out=PATH` argument that overrides `assembly-output`.
#[derive(Debug, Clone)]
pub struct AssemblyPlugin {
  project: String,
  parallelism: Option<usize>,
}

impl AssemblyPlugin {
  pub fn new(project: impl Into<String>) -> Self {
    Self {
      project: project.into(),
      parallelism: None,
    }
  }

  pub fn parallelism(mut self, threads: usize) -> Self {
    self.parallelism = Some(threads);
    self
  }
}

impl GraphPlugin for AssemblyPlugin {
  fn name(&self) -> &str {
    "assembly"
  }

  fn register(&self, builder: &mut GraphBuilder) -> Result<(), EvalError> {
    let project = self.project.as_str();
    let parallelism = self.parallelism;

    builder
      .setting(OWN_INPUTS, ValueType::List)
      .setting(DEPENDENCY_INPUTS, ValueType::List)
      .setting(OUTPUT, ValueType::Path)
      .setting(POLICY, ValueType::Any)
      .task(TASK, ValueType::Path)
      .bind(project, OWN_INPUTS, Binding::constant(Value::List(Vec::new())))
      .bind(project, DEPENDENCY_INPUTS, Binding::constant(Value::List(Vec::new())))
      .bind(project, OUTPUT, Binding::constant(PathBuf::from(DEFAULT_OUTPUT)))
      .bind(project, POLICY, Binding::constant(Value::Unit))
      .bind(project, TASK, Binding::set(move |scope| assemble(scope, parallelism)));
    Ok(())
  }
}

fn assemble(scope: &Scope<'_>, parallelism: Option<usize>) -> Result<Value, EvalError> {
  let own = paths(scope, OWN_INPUTS)?;
  let dependencies = paths(scope, DEPENDENCY_INPUTS)?;
  let output = match scope.argument("out") {
    Some(out) => PathBuf::from(out),
    None => scope
      .get(OUTPUT)?
      .as_path()
      .map(PathBuf::from)
      .ok_or_else(|| scope.fail(format!("{OUTPUT} is not a path")))?,
  };
  let policy = policy(scope)?;

  let inputs = collect_dirs(&own, &dependencies)?;
  let mut merger = Merger::new(policy).cancel(scope.cancel_token().clone());
  if let Some(threads) = parallelism {
    merger = merger.parallelism(threads);
  }
  let tree = merger.merge(&inputs)?;

  let name = output.to_string_lossy();
  if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
    write_tar_gz(&tree, &output)?;
  } else {
    write_dir(&tree, &output)?;
  }
  info!(output = %output.display(), files = tree.len(), "assembly written");
  Ok(Value::Path(output))
}

fn paths(scope: &Scope<'_>, key: &str) -> Result<Vec<PathBuf>, EvalError> {
  let value = scope.get(key)?;
  let items = value.as_list().unwrap_or_default();
  items
    .iter()
    .map(|item| {
      item
        .as_path()
        .map(PathBuf::from)
        .ok_or_else(|| scope.fail(format!("{key} entries must be paths, got {}", item.value_type())))
    })
    .collect()
}

fn policy(scope: &Scope<'_>) -> Result<MergePolicy, EvalError> {
  let value = scope.get(POLICY)?;
  match &value {
    Value::Unit => Ok(MergePolicy::standard()),
    Value::Str(_) | Value::Path(_) => {
      let path = value.as_path().unwrap_or_else(|| std::path::Path::new(""));
      Ok(MergePolicy::from_file(path)?)
    }
    Value::Map(_) => {
      let json = serde_json::to_value(&value).map_err(|e| AssemblyError::Policy(e.to_string()))?;
      Ok(serde_json::from_value(json).map_err(|e| AssemblyError::Policy(e.to_string()))?)
    }
    other => Err(scope.fail(format!("{POLICY} must be unit, a path or a map, got {}", other.value_type()))),
  }
}
