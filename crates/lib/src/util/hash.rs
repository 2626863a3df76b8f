//! Content digests for merged trees and their on-disk output.
//!
//! - `ContentHash`: a full 64-character SHA-256, shown shortened in reports
//! - `hash_bytes()`: arbitrary byte hashing
//! - `hash_entries()`: deterministic digest of a path -> bytes listing
//! - `hash_directory()`: the same digest computed from a directory on disk

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::consts::DIGEST_PREFIX_LEN;

/// A lowercase hex SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
  /// Leading characters used in human-facing output.
  pub fn short(&self) -> &str {
    &self.0[..DIGEST_PREFIX_LEN.min(self.0.len())]
  }
}

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, thiserror::Error)]
pub enum DirHashError {
  #[error("failed to walk directory: {message}")]
  WalkDir { message: String },

  #[error("failed to read file {path}: {message}")]
  ReadFile { path: String, message: String },
}

pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}

/// Digest a listing of files. Entries must already be sorted by path.
pub fn hash_entries<'a, I>(entries: I) -> ContentHash
where
  I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
  let mut hasher = Sha256::new();
  for (path, bytes) in entries {
    hasher.update(format!("F:{}:{}", path, hash_bytes(bytes)).as_bytes());
    hasher.update(b"\n");
  }
  ContentHash(hex::encode(hasher.finalize()))
}

/// Digest the regular files under `root`, keyed by `/`-separated relative path.
///
/// Agrees with [`hash_entries`] for the same files, so a written tree can be
/// checked against its in-memory digest. Directories and metadata are ignored.
pub fn hash_directory(root: &Path) -> Result<ContentHash, DirHashError> {
  let mut files: Vec<(String, Vec<u8>)> = Vec::new();

  for entry in WalkDir::new(root).sort_by_file_name() {
    let entry = entry.map_err(|e| DirHashError::WalkDir { message: e.to_string() })?;
    if !entry.file_type().is_file() {
      continue;
    }
    let rel = entry
      .path()
      .strip_prefix(root)
      .unwrap_or(entry.path())
      .components()
      .map(|c| c.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/");
    let bytes = fs::read(entry.path()).map_err(|e| DirHashError::ReadFile {
      path: entry.path().display().to_string(),
      message: e.to_string(),
    })?;
    files.push((rel, bytes));
  }

  files.sort_by(|a, b| a.0.cmp(&b.0));
  Ok(hash_entries(files.iter().map(|(p, b)| (p.as_str(), b.as_slice()))))
}
