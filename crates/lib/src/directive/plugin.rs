//! Feeds directive facts into a configuration graph.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use super::DirectiveFact;
use crate::graph::{Binding, EvalError, GraphBuilder, GraphPlugin, Value, ValueType};
use crate::version::{Version, VersionRange};

pub const LIBRARY_DEPENDENCIES: &str = "library-dependencies";
pub const RESOLVERS: &str = "resolvers";
pub const COMPILER_PLUGINS: &str = "compiler-plugins";
pub const EXTRA_CLASSPATH: &str = "extra-classpath";
pub const RESOLVED_DEPENDENCIES: &str = "resolved-dependencies";

/// Binds collected facts to list settings in a project's base scope.
///
/// With [`with_available`](Self::with_available), the plugin also binds
/// `resolved-dependencies`: each dependency's declared version (or range) is
/// resolved against the available versions of `group:artifact`.
#[derive(Debug, Clone)]
pub struct DirectivePlugin {
  project: String,
  facts: Vec<DirectiveFact>,
  available: Option<HashMap<String, Vec<Version>>>,
}

impl DirectivePlugin {
  pub fn new(project: impl Into<String>, facts: Vec<DirectiveFact>) -> Self {
    Self {
      project: project.into(),
      facts,
      available: None,
    }
  }

  /// Available versions keyed by `group:artifact`.
  pub fn with_available(mut self, available: HashMap<String, Vec<Version>>) -> Self {
    self.available = Some(available);
    self
  }

  fn lists(&self) -> [(&'static str, Vec<Value>); 4] {
    let mut dependencies = Vec::new();
    let mut resolvers = Vec::new();
    let mut plugins = Vec::new();
    let mut classpath = Vec::new();

    for fact in &self.facts {
      match fact {
        DirectiveFact::Dependency {
          group,
          artifact,
          version,
        } => dependencies.push(dependency_record(group, artifact, version)),
        DirectiveFact::Repository { name, url } => {
          resolvers.push(record(&[("name", name.as_str()), ("url", url.as_str())]));
        }
        DirectiveFact::Plugin { name, group } => {
          plugins.push(record(&[("name", name.as_str()), ("group", group.as_str())]));
        }
        DirectiveFact::Classpath { path } => classpath.push(Value::Path(path.into())),
      }
    }

    [
      (LIBRARY_DEPENDENCIES, dependencies),
      (RESOLVERS, resolvers),
      (COMPILER_PLUGINS, plugins),
      (EXTRA_CLASSPATH, classpath),
    ]
  }

  fn resolve(&self, available: &HashMap<String, Vec<Version>>) -> Result<Vec<Value>, EvalError> {
    let mut resolved = Vec::new();
    for fact in &self.facts {
      let DirectiveFact::Dependency {
        group,
        artifact,
        version,
      } = fact
      else {
        continue;
      };

      let coordinate = format!("{group}:{artifact}");
      let range: VersionRange = version.parse()?;
      let candidates = available.get(&coordinate).map(Vec::as_slice).unwrap_or_default();
      let Some(selected) = range.select(candidates) else {
        return Err(EvalError::Binding {
          key: RESOLVED_DEPENDENCIES.to_string(),
          message: format!("no available version of {coordinate} satisfies {range}"),
        });
      };
      debug!(coordinate = %coordinate, range = %range, selected = %selected, "resolved dependency");
      resolved.push(dependency_record(group, artifact, selected.as_str()));
    }
    Ok(resolved)
  }
}

fn dependency_record(group: &str, artifact: &str, version: &str) -> Value {
  record(&[("group", group), ("artifact", artifact), ("version", version)])
}

fn record(fields: &[(&str, &str)]) -> Value {
  Value::Map(
    fields
      .iter()
      .map(|(name, value)| (name.to_string(), Value::Str(value.to_string())))
      .collect::<BTreeMap<_, _>>(),
  )
}

impl GraphPlugin for DirectivePlugin {
  fn name(&self) -> &str {
    "directives"
  }

  fn register(&self, builder: &mut GraphBuilder) -> Result<(), EvalError> {
    for (key, values) in self.lists() {
      debug!(project = %self.project, key, entries = values.len(), "binding directive facts");
      builder
        .setting(key, ValueType::List)
        .bind(&self.project, key, Binding::constant(Value::List(values)));
    }

    if let Some(available) = &self.available {
      let resolved = self.resolve(available)?;
      builder
        .setting(RESOLVED_DEPENDENCIES, ValueType::List)
        .bind(&self.project, RESOLVED_DEPENDENCIES, Binding::constant(Value::List(resolved)));
    }
    Ok(())
  }
}
