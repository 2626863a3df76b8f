//! Directive facts: the data the standard directive set declares.

use serde::{Deserialize, Serialize};

use super::{Directive, DirectiveError, DirectiveSpec, ScanSummary, scan};
use crate::error::{ParseError, ParseSubject};

/// Directives understood by [`collect_facts`].
pub const STANDARD_DIRECTIVES: &[DirectiveSpec] = &[
  DirectiveSpec {
    name: "dep",
    arities: &[1, 3],
  },
  DirectiveSpec {
    name: "repository",
    arities: &[2],
  },
  DirectiveSpec {
    name: "plugin",
    arities: &[2],
  },
  DirectiveSpec {
    name: "classpath",
    arities: &[1],
  },
];

/// A fact declared in a script header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DirectiveFact {
  /// `//> dep group artifact version` or `//> dep group:artifact:version`
  Dependency {
    group: String,
    artifact: String,
    version: String,
  },
  /// `//> repository name url`
  Repository { name: String, url: String },
  /// `//> plugin name group`
  Plugin { name: String, group: String },
  /// `//> classpath path`
  Classpath { path: String },
}

/// Scan `input` with [`STANDARD_DIRECTIVES`] and collect the declared facts.
///
/// # Errors
///
/// Returns a [`DirectiveError`] for malformed directives, including a `dep`
/// coordinate that is not `group:artifact:version`.
pub fn collect_facts(input: &str) -> Result<(Vec<DirectiveFact>, ScanSummary), DirectiveError> {
  let mut facts = Vec::new();
  let summary = scan(input, STANDARD_DIRECTIVES, |directive| {
    facts.push(to_fact(directive)?);
    Ok(())
  })?;
  Ok((facts, summary))
}

fn to_fact(directive: Directive<'_>) -> Result<DirectiveFact, DirectiveError> {
  let line = directive.line;
  let fact = match (directive.spec.name, directive.args.as_slice()) {
    ("dep", [coordinate]) => {
      let parts: Vec<&str> = coordinate.split(':').collect();
      match parts.as_slice() {
        [group, artifact, version] if !group.is_empty() && !artifact.is_empty() && !version.is_empty() => {
          DirectiveFact::Dependency {
            group: group.to_string(),
            artifact: artifact.to_string(),
            version: version.to_string(),
          }
        }
        _ => {
          return Err(
            ParseError::new(
              ParseSubject::Directive,
              coordinate.as_str(),
              0,
              format!("line {line}: expected group:artifact:version"),
            )
            .into(),
          );
        }
      }
    }
    ("dep", [group, artifact, version]) => DirectiveFact::Dependency {
      group: group.clone(),
      artifact: artifact.clone(),
      version: version.clone(),
    },
    ("repository", [name, url]) => DirectiveFact::Repository {
      name: name.clone(),
      url: url.clone(),
    },
    ("plugin", [name, group]) => DirectiveFact::Plugin {
      name: name.clone(),
      group: group.clone(),
    },
    ("classpath", [path]) => DirectiveFact::Classpath { path: path.clone() },
    (name, _) => {
      return Err(DirectiveError::Rejected {
        line,
        name: name.to_string(),
        message: "not a standard directive".to_string(),
      });
    }
  };
  Ok(fact)
}
