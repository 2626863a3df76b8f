//! The frozen configuration graph: projects, configurations, keys and bindings.

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use super::types::{Binding, BindingKind, EvalError, KeyDef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigId(pub(crate) NodeIndex);

#[derive(Debug)]
pub(crate) struct ProjectNode {
  pub(crate) name: String,
  pub(crate) default_configuration: ConfigId,
  pub(crate) configurations: HashMap<String, ConfigId>,
  pub(crate) base: HashMap<KeyId, Vec<Binding>>,
}

#[derive(Debug)]
pub(crate) struct ConfigNode {
  pub(crate) project: ProjectId,
  pub(crate) name: String,
  pub(crate) bindings: HashMap<KeyId, Vec<Binding>>,
}

/// One entry of a key's materialized operation list.
#[derive(Debug, Clone)]
pub struct Operation<'g> {
  pub project: &'g str,
  /// `None` for project base bindings.
  pub configuration: Option<&'g str>,
  /// Position among the key's bindings in that scope.
  pub index: usize,
  pub binding: &'g Binding,
}

impl Operation<'_> {
  pub fn kind(&self) -> BindingKind {
    self.binding.kind()
  }
}

impl fmt::Display for Operation<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.configuration {
      Some(configuration) => write!(f, "{}/{}#{} {}", self.project, configuration, self.index, self.kind()),
      None => write!(f, "{}#{} {}", self.project, self.index, self.kind()),
    }
  }
}

/// Immutable graph produced by [`GraphBuilder::build`](super::GraphBuilder::build).
///
/// Configuration extension edges live in a [`DiGraph`] whose edge weight is the
/// declaration position in `extends`. The graph may contain cycles.
#[derive(Debug)]
pub struct ConfigGraph {
  pub(crate) projects: Vec<ProjectNode>,
  pub(crate) project_index: HashMap<String, ProjectId>,
  pub(crate) keys: Vec<KeyDef>,
  pub(crate) key_index: HashMap<String, KeyId>,
  pub(crate) configs: DiGraph<ConfigNode, usize>,
}

impl ConfigGraph {
  /// The first declared project; used when a task names no project.
  pub fn root_project(&self) -> ProjectId {
    ProjectId(0)
  }

  pub fn project_id(&self, name: &str) -> Result<ProjectId, EvalError> {
    self
      .project_index
      .get(name)
      .copied()
      .ok_or_else(|| EvalError::UnknownProject(name.to_string()))
  }

  pub fn project_name(&self, project: ProjectId) -> &str {
    &self.projects[project.0].name
  }

  pub fn project_names(&self) -> impl Iterator<Item = &str> {
    self.projects.iter().map(|p| p.name.as_str())
  }

  pub fn key_id(&self, name: &str) -> Result<KeyId, EvalError> {
    self
      .key_index
      .get(name)
      .copied()
      .ok_or_else(|| EvalError::UnknownKey(name.to_string()))
  }

  pub fn key(&self, key: KeyId) -> &KeyDef {
    &self.keys[key.0]
  }

  pub fn keys(&self) -> impl Iterator<Item = &KeyDef> {
    self.keys.iter()
  }

  pub fn configuration_id(&self, project: ProjectId, name: &str) -> Result<ConfigId, EvalError> {
    let node = &self.projects[project.0];
    node
      .configurations
      .get(name)
      .copied()
      .ok_or_else(|| EvalError::UnknownConfiguration {
        project: node.name.clone(),
        configuration: name.to_string(),
      })
  }

  pub fn configuration_name(&self, config: ConfigId) -> &str {
    &self.configs[config.0].name
  }

  pub fn default_configuration(&self, project: ProjectId) -> ConfigId {
    self.projects[project.0].default_configuration
  }

  /// Direct parents of `config` in declaration order.
  pub fn extends(&self, config: ConfigId) -> Vec<ConfigId> {
    let mut edges: Vec<_> = self
      .configs
      .edges(config.0)
      .map(|edge| (*edge.weight(), ConfigId(edge.target())))
      .collect();
    edges.sort_by_key(|(position, _)| *position);
    edges.into_iter().map(|(_, target)| target).collect()
  }

  /// Resolve a project name (or the root project) and configuration names to ids.
  pub fn scope_ids<S: AsRef<str>>(
    &self,
    project: Option<&str>,
    configurations: &[S],
  ) -> Result<(ProjectId, Vec<ConfigId>), EvalError> {
    let project = match project {
      Some(name) => self.project_id(name)?,
      None => self.root_project(),
    };
    let stack = configurations
      .iter()
      .map(|name| self.configuration_id(project, name.as_ref()))
      .collect::<Result<Vec<_>, _>>()?;
    Ok((project, stack))
  }

  /// Configurations visited for `stack`, in visit order.
  ///
  /// Depth-first pre-order: the innermost (last) stack entry first, then its
  /// parents in declaration order, then the next-outer entry. One visited set
  /// spans the whole traversal. An empty stack starts from the project's
  /// default configuration.
  pub fn traversal(&self, project: ProjectId, stack: &[ConfigId]) -> Vec<ConfigId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();

    if stack.is_empty() {
      self.visit(self.default_configuration(project), &mut visited, &mut order);
    } else {
      for &config in stack.iter().rev() {
        self.visit(config, &mut visited, &mut order);
      }
    }
    order
  }

  fn visit(&self, config: ConfigId, visited: &mut HashSet<ConfigId>, order: &mut Vec<ConfigId>) {
    if !visited.insert(config) {
      return;
    }
    order.push(config);
    for parent in self.extends(config) {
      self.visit(parent, visited, order);
    }
  }

  /// The full operation list for `key`: project base bindings, then the
  /// bindings of each visited configuration.
  pub fn operations(&self, key: KeyId, project: ProjectId, stack: &[ConfigId]) -> Vec<Operation<'_>> {
    let node = &self.projects[project.0];
    let mut operations: Vec<Operation<'_>> = node
      .base
      .get(&key)
      .into_iter()
      .flatten()
      .enumerate()
      .map(|(index, binding)| Operation {
        project: &node.name,
        configuration: None,
        index,
        binding,
      })
      .collect();

    for config in self.traversal(project, stack) {
      let config_node = &self.configs[config.0];
      let bindings = config_node.bindings.get(&key).into_iter().flatten();
      operations.extend(bindings.enumerate().map(|(index, binding)| Operation {
        project: &self.projects[config_node.project.0].name,
        configuration: Some(config_node.name.as_str()),
        index,
        binding,
      }));
    }
    operations
  }

  /// Human-readable scope, e.g. `root/test:it`.
  pub fn scope_label(&self, project: ProjectId, stack: &[ConfigId]) -> String {
    let configurations: Vec<&str> = stack.iter().map(|&c| self.configuration_name(c)).collect();
    if configurations.is_empty() {
      self.project_name(project).to_string()
    } else {
      format!("{}/{}", self.project_name(project), configurations.join(":"))
    }
  }

  pub fn has_extension_cycles(&self) -> bool {
    petgraph::algo::is_cyclic_directed(&self.configs)
  }
}
