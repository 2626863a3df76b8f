//! Graph construction and the plugin seam.

use std::collections::{HashMap, hash_map::Entry};

use petgraph::graph::DiGraph;
use tracing::{debug, info};

use super::config_graph::{ConfigGraph, ConfigId, ConfigNode, KeyId, ProjectId, ProjectNode};
use super::types::{Binding, EvalError, KeyDef, ValueType};
use crate::consts::DEFAULT_CONFIGURATION;

/// Contributes projects, configurations, keys or bindings to a graph.
///
/// Plugins are registered in order; later plugins see what earlier ones
/// declared only through the names they share.
pub trait GraphPlugin: Send + Sync {
  fn name(&self) -> &str;

  fn register(&self, builder: &mut GraphBuilder) -> Result<(), EvalError>;
}

#[derive(Debug)]
struct ProjectDecl {
  name: String,
  default_configuration: Option<String>,
}

#[derive(Debug)]
struct ConfigDecl {
  project: String,
  name: String,
  extends: Vec<String>,
}

#[derive(Debug)]
struct BindingDecl {
  project: String,
  configuration: Option<String>,
  key: String,
  binding: Binding,
}

/// Collects declarations by name. Nothing is validated until [`build`](Self::build).
#[derive(Debug, Default)]
pub struct GraphBuilder {
  projects: Vec<ProjectDecl>,
  configurations: Vec<ConfigDecl>,
  keys: Vec<KeyDef>,
  bindings: Vec<BindingDecl>,
}

impl GraphBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Declare a project. The first project declared is the root project.
  pub fn project(&mut self, name: impl Into<String>) -> &mut Self {
    self.projects.push(ProjectDecl {
      name: name.into(),
      default_configuration: None,
    });
    self
  }

  /// Use `configuration` instead of [`DEFAULT_CONFIGURATION`] for an empty stack.
  pub fn default_configuration(&mut self, project: &str, configuration: impl Into<String>) -> &mut Self {
    let configuration = configuration.into();
    if let Some(decl) = self.projects.iter_mut().rev().find(|p| p.name == project) {
      decl.default_configuration = Some(configuration);
    }
    self
  }

  pub fn configuration(&mut self, project: &str, name: impl Into<String>, extends: &[&str]) -> &mut Self {
    self.configurations.push(ConfigDecl {
      project: project.to_string(),
      name: name.into(),
      extends: extends.iter().map(|s| s.to_string()).collect(),
    });
    self
  }

  pub fn key(&mut self, key: KeyDef) -> &mut Self {
    self.keys.push(key);
    self
  }

  pub fn setting(&mut self, name: impl Into<String>, ty: ValueType) -> &mut Self {
    self.key(KeyDef::setting(name, ty))
  }

  pub fn task(&mut self, name: impl Into<String>, ty: ValueType) -> &mut Self {
    self.key(KeyDef::task(name, ty))
  }

  /// Add a binding to the project's base scope.
  pub fn bind(&mut self, project: &str, key: &str, binding: Binding) -> &mut Self {
    self.bindings.push(BindingDecl {
      project: project.to_string(),
      configuration: None,
      key: key.to_string(),
      binding,
    });
    self
  }

  /// Add a binding to a configuration of `project`.
  pub fn bind_in(&mut self, project: &str, configuration: &str, key: &str, binding: Binding) -> &mut Self {
    self.bindings.push(BindingDecl {
      project: project.to_string(),
      configuration: Some(configuration.to_string()),
      key: key.to_string(),
      binding,
    });
    self
  }

  pub fn register(&mut self, plugin: &dyn GraphPlugin) -> Result<&mut Self, EvalError> {
    debug!(plugin = plugin.name(), "registering plugin");
    plugin.register(self)?;
    Ok(self)
  }

  pub fn with_plugins(&mut self, plugins: &[Box<dyn GraphPlugin>]) -> Result<&mut Self, EvalError> {
    for plugin in plugins {
      self.register(plugin.as_ref())?;
    }
    Ok(self)
  }

  /// Validate every reference and freeze the graph.
  ///
  /// # Errors
  ///
  /// - [`EvalError::NoProjects`] when nothing was declared
  /// - [`EvalError::DuplicateDefinition`] for a project or configuration declared
  ///   twice, or a key redeclared with a different kind or type
  /// - [`EvalError::UnknownProject`], [`EvalError::UnknownConfiguration`] and
  ///   [`EvalError::UnknownKey`] for dangling references
  pub fn build(self) -> Result<ConfigGraph, EvalError> {
    if self.projects.is_empty() {
      return Err(EvalError::NoProjects);
    }

    let mut keys: Vec<KeyDef> = Vec::new();
    let mut key_index: HashMap<String, KeyId> = HashMap::new();
    for key in self.keys {
      match key_index.entry(key.name.clone()) {
        Entry::Occupied(entry) => {
          let existing: &KeyDef = &keys[entry.get().0];
          if existing.kind != key.kind || existing.ty != key.ty {
            return Err(EvalError::DuplicateDefinition(format!("key '{}'", key.name)));
          }
        }
        Entry::Vacant(entry) => {
          entry.insert(KeyId(keys.len()));
          keys.push(key);
        }
      }
    }

    let mut configs: DiGraph<ConfigNode, usize> = DiGraph::new();
    let mut projects: Vec<ProjectNode> = Vec::new();
    let mut project_index = HashMap::new();
    let mut defaults = Vec::new();

    for decl in self.projects {
      if project_index.contains_key(&decl.name) {
        return Err(EvalError::DuplicateDefinition(format!("project '{}'", decl.name)));
      }
      let id = ProjectId(projects.len());
      project_index.insert(decl.name.clone(), id);
      defaults.push(decl.default_configuration);
      projects.push(ProjectNode {
        name: decl.name,
        // Placeholder until configurations are added below.
        default_configuration: ConfigId(Default::default()),
        configurations: HashMap::new(),
        base: HashMap::new(),
      });
    }

    let lookup_project = |name: &str| {
      project_index
        .get(name)
        .copied()
        .ok_or_else(|| EvalError::UnknownProject(name.to_string()))
    };

    for decl in &self.configurations {
      let project = lookup_project(&decl.project)?;
      let node = &mut projects[project.0];
      if node.configurations.contains_key(&decl.name) {
        return Err(EvalError::DuplicateDefinition(format!(
          "configuration '{}/{}'",
          decl.project, decl.name
        )));
      }
      let index = configs.add_node(ConfigNode {
        project,
        name: decl.name.clone(),
        bindings: HashMap::new(),
      });
      node.configurations.insert(decl.name.clone(), ConfigId(index));
    }

    for (node, default) in projects.iter_mut().zip(defaults) {
      let id = match default {
        Some(name) => node
          .configurations
          .get(&name)
          .copied()
          .ok_or_else(|| EvalError::UnknownConfiguration {
            project: node.name.clone(),
            configuration: name,
          })?,
        None => match node.configurations.get(DEFAULT_CONFIGURATION) {
          Some(&id) => id,
          None => {
            let project = project_index[&node.name];
            let index = configs.add_node(ConfigNode {
              project,
              name: DEFAULT_CONFIGURATION.to_string(),
              bindings: HashMap::new(),
            });
            node
              .configurations
              .insert(DEFAULT_CONFIGURATION.to_string(), ConfigId(index));
            ConfigId(index)
          }
        },
      };
      node.default_configuration = id;
    }

    let find_config = |projects: &[ProjectNode], project: ProjectId, name: &str| {
      let node = &projects[project.0];
      node
        .configurations
        .get(name)
        .copied()
        .ok_or_else(|| EvalError::UnknownConfiguration {
          project: node.name.clone(),
          configuration: name.to_string(),
        })
    };

    for decl in &self.configurations {
      let project = lookup_project(&decl.project)?;
      let from = find_config(&projects, project, &decl.name)?;
      for (position, parent) in decl.extends.iter().enumerate() {
        let to = find_config(&projects, project, parent)?;
        configs.add_edge(from.0, to.0, position);
      }
    }

    for decl in self.bindings {
      let project = lookup_project(&decl.project)?;
      let key = key_index
        .get(&decl.key)
        .copied()
        .ok_or_else(|| EvalError::UnknownKey(decl.key.clone()))?;
      match decl.configuration {
        Some(name) => {
          let config = find_config(&projects, project, &name)?;
          configs[config.0].bindings.entry(key).or_default().push(decl.binding);
        }
        None => projects[project.0].base.entry(key).or_default().push(decl.binding),
      }
    }

    let graph = ConfigGraph {
      projects,
      project_index,
      keys,
      key_index,
      configs,
    };

    if graph.has_extension_cycles() {
      debug!("configuration extension graph contains cycles");
    }
    info!(
      projects = graph.projects.len(),
      configurations = graph.configs.node_count(),
      keys = graph.keys.len(),
      "configuration graph built"
    );
    Ok(graph)
  }
}
