//! Test helpers for building input trees on disk.

use std::fs;
use std::path::Path;

/// Write `files` (relative path, contents) under `root`, creating parent directories.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
  for (path, contents) in files {
    let target = root.join(path);
    if let Some(parent) = target.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(target, contents).unwrap();
  }
}

/// Read a UTF-8 file under `root`.
pub fn read(root: &Path, path: &str) -> String {
  fs::read_to_string(root.join(path)).unwrap()
}
