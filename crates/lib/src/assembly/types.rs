use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::lazy::LazyBytes;
use crate::util::hash::{ContentHash, hash_entries};

/// How to combine several sources that land on the same destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
  /// Keep the first source; the rest are never read.
  First,
  /// Keep the last source; the rest are never read.
  Last,
  /// Keep the single own source.
  SingleOwn,
  /// Fail unless there is exactly one source.
  SingleOrError,
  /// Byte concatenation in encounter order.
  Concatenate,
  /// Concatenated text lines with normalized endings.
  Lines,
  /// As `Lines`, dropping repeated lines.
  UniqueLines,
  /// Omit the path.
  Discard,
  /// Identical sources collapse to one; different ones conflict.
  #[default]
  Deduplicate,
  /// Keep one source at the path and move the others aside.
  Rename,
}

impl MergeStrategy {
  pub const ALL: [MergeStrategy; 10] = [
    MergeStrategy::First,
    MergeStrategy::Last,
    MergeStrategy::SingleOwn,
    MergeStrategy::SingleOrError,
    MergeStrategy::Concatenate,
    MergeStrategy::Lines,
    MergeStrategy::UniqueLines,
    MergeStrategy::Discard,
    MergeStrategy::Deduplicate,
    MergeStrategy::Rename,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      MergeStrategy::First => "first",
      MergeStrategy::Last => "last",
      MergeStrategy::SingleOwn => "single-own",
      MergeStrategy::SingleOrError => "single-or-error",
      MergeStrategy::Concatenate => "concatenate",
      MergeStrategy::Lines => "lines",
      MergeStrategy::UniqueLines => "unique-lines",
      MergeStrategy::Discard => "discard",
      MergeStrategy::Deduplicate => "deduplicate",
      MergeStrategy::Rename => "rename",
    }
  }
}

impl fmt::Display for MergeStrategy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for MergeStrategy {
  type Err = AssemblyError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    MergeStrategy::ALL
      .into_iter()
      .find(|strategy| strategy.as_str() == s)
      .ok_or_else(|| AssemblyError::Policy(format!("unknown merge strategy '{s}'")))
  }
}

/// One contribution to a destination path.
#[derive(Debug, Clone)]
pub struct AssemblySource {
  origin: String,
  file: Option<PathBuf>,
  own: bool,
  bytes: Arc<LazyBytes>,
}

impl AssemblySource {
  /// A file read from disk on first use.
  pub fn from_file(origin: impl Into<String>, file: impl Into<PathBuf>, own: bool) -> Self {
    let file = file.into();
    let path = file.clone();
    Self {
      origin: origin.into(),
      file: Some(file),
      own,
      bytes: Arc::new(LazyBytes::new(move || std::fs::read(&path))),
    }
  }

  pub fn from_bytes(origin: impl Into<String>, bytes: impl Into<Arc<[u8]>>, own: bool) -> Self {
    Self {
      origin: origin.into(),
      file: None,
      own,
      bytes: Arc::new(LazyBytes::ready(bytes.into())),
    }
  }

  pub fn with_loader<F>(origin: impl Into<String>, own: bool, loader: F) -> Self
  where
    F: Fn() -> io::Result<Vec<u8>> + Send + Sync + 'static,
  {
    Self {
      origin: origin.into(),
      file: None,
      own,
      bytes: Arc::new(LazyBytes::new(loader)),
    }
  }

  /// Where the source came from, e.g. the root directory it was collected from.
  pub fn origin(&self) -> &str {
    &self.origin
  }

  pub fn file(&self) -> Option<&Path> {
    self.file.as_deref()
  }

  pub fn is_own(&self) -> bool {
    self.own
  }

  pub fn bytes(&self) -> io::Result<Arc<[u8]>> {
    self.bytes.get()
  }

  pub fn is_loaded(&self) -> bool {
    self.bytes.is_loaded()
  }

  pub fn describe(&self) -> String {
    match &self.file {
      Some(file) => format!("{} ({})", self.origin, file.display()),
      None => self.origin.clone(),
    }
  }
}

/// Destination path to sources, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct AssemblyInputs {
  entries: Vec<(String, Vec<AssemblySource>)>,
  index: HashMap<String, usize>,
}

impl AssemblyInputs {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append `source` to the sources of `path`.
  pub fn add(&mut self, path: impl Into<String>, source: AssemblySource) {
    let path = path.into();
    match self.index.get(&path) {
      Some(&i) => self.entries[i].1.push(source),
      None => {
        self.index.insert(path.clone(), self.entries.len());
        self.entries.push((path, vec![source]));
      }
    }
  }

  pub fn get(&self, path: &str) -> Option<&[AssemblySource]> {
    self.index.get(path).map(|&i| self.entries[i].1.as_slice())
  }

  pub fn contains(&self, path: &str) -> bool {
    self.index.contains_key(path)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &[AssemblySource])> {
    self.entries.iter().map(|(path, sources)| (path.as_str(), sources.as_slice()))
  }

  pub(crate) fn entries(&self) -> &[(String, Vec<AssemblySource>)] {
    &self.entries
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

/// What happened at one destination path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
  pub path: String,
  /// `None` when a single source was copied through.
  pub strategy: Option<MergeStrategy>,
  pub origins: Vec<String>,
  /// Paths written for this entry; empty when discarded.
  pub outputs: Vec<String>,
  /// Short digest of the bytes kept at `path`, if any.
  pub digest: Option<String>,
}

/// The merged file set, sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedTree {
  pub(crate) files: BTreeMap<String, Arc<[u8]>>,
  pub(crate) reports: Vec<MergeReport>,
}

impl MergedTree {
  pub fn files(&self) -> impl Iterator<Item = (&str, &[u8])> {
    self.files.iter().map(|(path, bytes)| (path.as_str(), bytes.as_ref()))
  }

  pub fn get(&self, path: &str) -> Option<&[u8]> {
    self.files.get(path).map(AsRef::as_ref)
  }

  pub fn paths(&self) -> impl Iterator<Item = &str> {
    self.files.keys().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }

  /// Per-path reports in path order.
  pub fn reports(&self) -> &[MergeReport] {
    &self.reports
  }

  /// Digest over every path and its bytes.
  pub fn digest(&self) -> ContentHash {
    hash_entries(self.files())
  }
}

#[derive(Debug, Error)]
pub enum AssemblyError {
  #[error("{path}: more than one own source ({})", origins.join(", "))]
  MultipleOwnSources { path: String, origins: Vec<String> },

  #[error("{path}: cannot choose between {} sources ({})", origins.len(), origins.join(", "))]
  AmbiguousMerge { path: String, origins: Vec<String> },

  #[error("{path}: conflicting content from {}", describe_conflict(origins, digests))]
  ConflictingContent {
    path: String,
    origins: Vec<String>,
    digests: Vec<String>,
  },

  #[error("{path}: renamed entry '{renamed}' from {origin} collides with an existing path")]
  RenameCollision {
    path: String,
    renamed: String,
    origin: String,
  },

  #[error("{path}: {origin} is not valid UTF-8 text")]
  InvalidText { path: String, origin: String },

  #[error("{path}: failed to load {origin}: {source}")]
  Load {
    path: String,
    origin: String,
    #[source]
    source: io::Error,
  },

  #[error("{}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to walk {}: {message}", root.display())]
  Walk { root: PathBuf, message: String },

  #[error("invalid merge policy: {0}")]
  Policy(String),

  #[error("assembly cancelled")]
  Cancelled,
}

fn describe_conflict(origins: &[String], digests: &[String]) -> String {
  origins
    .iter()
    .zip(digests)
    .map(|(origin, digest)| format!("{origin} [{digest}]"))
    .collect::<Vec<_>>()
    .join(", ")
}

impl AssemblyError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
    AssemblyError::Io {
      path: path.into(),
      source,
    }
  }
}
