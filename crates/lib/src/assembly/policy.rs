//! Path to strategy rules.
//!
//! Policies are ordered rule lists; the first matching rule wins and unmatched
//! paths use the default strategy. JSON form:
//!
//! ```json
//! {
//!   "rules": [
//!     { "matcher": { "class": "junk" }, "strategy": "discard" },
//!     { "matcher": { "prefix": "META-INF/services/" }, "strategy": "unique-lines" }
//!   ],
//!   "default": "deduplicate"
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::classify::{file_name, is_junk, is_license, is_readme};
use super::types::{AssemblyError, MergeStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileClass {
  Readme,
  License,
  Junk,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Matcher {
  Exact(String),
  Prefix(String),
  Suffix(String),
  /// Exact match on the last path component.
  FileName(String),
  Class(FileClass),
}

impl Matcher {
  pub fn matches(&self, path: &str) -> bool {
    match self {
      Matcher::Exact(exact) => path == exact,
      Matcher::Prefix(prefix) => path.starts_with(prefix.as_str()),
      Matcher::Suffix(suffix) => path.ends_with(suffix.as_str()),
      Matcher::FileName(name) => file_name(path) == name,
      Matcher::Class(FileClass::Readme) => is_readme(path),
      Matcher::Class(FileClass::License) => is_license(path),
      Matcher::Class(FileClass::Junk) => is_junk(path),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
  pub matcher: Matcher,
  pub strategy: MergeStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergePolicy {
  #[serde(default)]
  pub rules: Vec<Rule>,
  #[serde(default)]
  pub default: MergeStrategy,
}

impl Default for MergePolicy {
  fn default() -> Self {
    Self::standard()
  }
}

impl MergePolicy {
  /// A policy with no rules.
  pub fn uniform(default: MergeStrategy) -> Self {
    Self {
      rules: Vec::new(),
      default,
    }
  }

  /// The stock policy for packaging a project with its dependencies.
  pub fn standard() -> Self {
    Self::uniform(MergeStrategy::Deduplicate)
      .rule(Matcher::Class(FileClass::Junk), MergeStrategy::Discard)
      .rule(Matcher::Exact("META-INF/MANIFEST.MF".into()), MergeStrategy::Discard)
      .rule(Matcher::Suffix(".SF".into()), MergeStrategy::Discard)
      .rule(Matcher::Suffix(".DSA".into()), MergeStrategy::Discard)
      .rule(Matcher::Suffix(".RSA".into()), MergeStrategy::Discard)
      .rule(Matcher::Prefix("META-INF/services/".into()), MergeStrategy::UniqueLines)
      .rule(Matcher::FileName("reference.conf".into()), MergeStrategy::Concatenate)
      .rule(Matcher::Class(FileClass::Readme), MergeStrategy::Rename)
      .rule(Matcher::Class(FileClass::License), MergeStrategy::Rename)
  }

  /// Append a rule; earlier rules take precedence.
  pub fn rule(mut self, matcher: Matcher, strategy: MergeStrategy) -> Self {
    self.rules.push(Rule { matcher, strategy });
    self
  }

  pub fn strategy_for(&self, path: &str) -> MergeStrategy {
    self
      .rules
      .iter()
      .find(|rule| rule.matcher.matches(path))
      .map_or(self.default, |rule| rule.strategy)
  }

  pub fn from_json(text: &str) -> Result<Self, AssemblyError> {
    serde_json::from_str(text).map_err(|e| AssemblyError::Policy(e.to_string()))
  }

  pub fn from_file(path: &Path) -> Result<Self, AssemblyError> {
    let text = std::fs::read_to_string(path).map_err(|e| AssemblyError::io(path, e))?;
    Self::from_json(&text)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn standard_policy_assignments() {
    let policy = MergePolicy::standard();
    let cases = [
      ("res/.DS_Store", MergeStrategy::Discard),
      ("META-INF/MANIFEST.MF", MergeStrategy::Discard),
      ("META-INF/SIGNER.SF", MergeStrategy::Discard),
      ("META-INF/services/org.example.Codec", MergeStrategy::UniqueLines),
      ("reference.conf", MergeStrategy::Concatenate),
      ("lib/reference.conf", MergeStrategy::Concatenate),
      ("README.md", MergeStrategy::Rename),
      ("META-INF/LICENSE", MergeStrategy::Rename),
      ("org/example/Main.class", MergeStrategy::Deduplicate),
    ];
    for (path, expected) in cases {
      assert_eq!(policy.strategy_for(path), expected, "{path}");
    }
  }

  #[test]
  fn first_matching_rule_wins() {
    let policy = MergePolicy::uniform(MergeStrategy::First)
      .rule(Matcher::Prefix("conf/".into()), MergeStrategy::Lines)
      .rule(Matcher::Suffix(".conf".into()), MergeStrategy::Concatenate);
    assert_eq!(policy.strategy_for("conf/app.conf"), MergeStrategy::Lines);
    assert_eq!(policy.strategy_for("app.conf"), MergeStrategy::Concatenate);
    assert_eq!(policy.strategy_for("app.txt"), MergeStrategy::First);
  }

  #[test]
  fn loads_from_json() {
    let policy = MergePolicy::from_json(
      r#"{
        "rules": [
          { "matcher": { "class": "license" }, "strategy": "concatenate" },
          { "matcher": { "file-name": "plugin.properties" }, "strategy": "last" }
        ],
        "default": "single-own"
      }"#,
    )
    .unwrap();

    assert_eq!(policy.strategy_for("NOTICE.txt"), MergeStrategy::Concatenate);
    assert_eq!(policy.strategy_for("x/plugin.properties"), MergeStrategy::Last);
    assert_eq!(policy.strategy_for("x.class"), MergeStrategy::SingleOwn);
  }

  #[test]
  fn invalid_json_is_a_policy_error() {
    let err = MergePolicy::from_json(r#"{ "rules": [{ "matcher": { "glob": "*" }, "strategy": "first" }] }"#)
      .unwrap_err();
    assert!(matches!(err, AssemblyError::Policy(_)));
  }

  #[test]
  fn default_strategy_is_deduplicate() {
    let policy = MergePolicy::from_json("{}").unwrap();
    assert!(policy.rules.is_empty());
    assert_eq!(policy.default, MergeStrategy::Deduplicate);
  }
}
