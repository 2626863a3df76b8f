//! Gathering assembly inputs from directory trees.

use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use super::types::{AssemblyError, AssemblyInputs, AssemblySource};

/// Collect regular files under the `own` roots, then the `dependencies` roots.
///
/// Each root is walked sorted by file name; destination paths are relative to
/// the root and `/`-separated. Files are read lazily.
pub fn collect_dirs<P, Q>(own: &[P], dependencies: &[Q]) -> Result<AssemblyInputs, AssemblyError>
where
  P: AsRef<Path>,
  Q: AsRef<Path>,
{
  let mut inputs = AssemblyInputs::new();
  for root in own {
    collect_root(&mut inputs, root.as_ref(), true)?;
  }
  for root in dependencies {
    collect_root(&mut inputs, root.as_ref(), false)?;
  }
  Ok(inputs)
}

fn collect_root(inputs: &mut AssemblyInputs, root: &Path, own: bool) -> Result<(), AssemblyError> {
  let origin = root.display().to_string();
  let mut files = 0usize;

  for entry in WalkDir::new(root).sort_by_file_name() {
    let entry = entry.map_err(|e| AssemblyError::Walk {
      root: root.to_path_buf(),
      message: e.to_string(),
    })?;
    if !entry.file_type().is_file() {
      continue;
    }

    let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
    let path = relative
      .components()
      .map(|c| c.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/");
    inputs.add(path, AssemblySource::from_file(origin.clone(), entry.path(), own));
    files += 1;
  }

  debug!(root = %origin, own, files, "collected assembly root");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::write_tree;
  use tempfile::tempdir;

  #[test]
  fn own_roots_come_first() {
    let own = tempdir().unwrap();
    let dep = tempdir().unwrap();
    write_tree(own.path(), &[("b/x.txt", "own x"), ("a.txt", "own a")]);
    write_tree(dep.path(), &[("b/x.txt", "dep x"), ("c.txt", "dep c")]);

    let inputs = collect_dirs(&[own.path()], &[dep.path()]).unwrap();
    let paths: Vec<&str> = inputs.iter().map(|(path, _)| path).collect();
    assert_eq!(paths, vec!["a.txt", "b/x.txt", "c.txt"]);

    let sources = inputs.get("b/x.txt").unwrap();
    assert!(sources[0].is_own());
    assert!(!sources[1].is_own());
    assert!(sources.iter().all(|s| !s.is_loaded()));
  }

  #[test]
  fn missing_root_is_a_walk_error() {
    let temp = tempdir().unwrap();
    let missing = temp.path().join("nope");
    let err = collect_dirs(&[missing], &[] as &[&Path]).unwrap_err();
    assert!(matches!(err, AssemblyError::Walk { .. }));
  }
}
