//! Writing merged trees to disk.
//!
//! Both writers stage their output next to the destination and move it into
//! place at the end, so a failed write leaves no partial output behind.

use std::fs;
use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use tar::{Builder, EntryType, Header};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::types::{AssemblyError, MergedTree};

fn staging_parent(target: &Path) -> Result<&Path, AssemblyError> {
  let parent = match target.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  fs::create_dir_all(parent).map_err(|e| AssemblyError::io(parent, e))?;
  Ok(parent)
}

/// Write `tree` as a directory at `dir`, replacing any existing directory.
pub fn write_dir(tree: &MergedTree, dir: &Path) -> Result<(), AssemblyError> {
  let parent = staging_parent(dir)?;
  let staging = tempfile::Builder::new()
    .prefix(".cairn-assembly-")
    .tempdir_in(parent)
    .map_err(|e| AssemblyError::io(parent, e))?;

  for (path, bytes) in tree.files() {
    let target = staging.path().join(path);
    if let Some(folder) = target.parent() {
      fs::create_dir_all(folder).map_err(|e| AssemblyError::io(folder, e))?;
    }
    fs::write(&target, bytes).map_err(|e| AssemblyError::io(&target, e))?;
  }

  let staged = staging.keep();

  // The previous output moves into its own temp dir and is removed when
  // `previous` drops, after the new tree is in place.
  let previous = if dir.exists() {
    let holder = match tempfile::Builder::new().prefix(".cairn-previous-").tempdir_in(parent) {
      Ok(holder) => holder,
      Err(e) => {
        discard(&staged);
        return Err(AssemblyError::io(parent, e));
      }
    };
    let moved = holder.path().join("previous");
    if let Err(e) = fs::rename(dir, &moved) {
      discard(&staged);
      return Err(AssemblyError::io(dir, e));
    }
    Some((holder, moved))
  } else {
    None
  };

  if let Err(e) = fs::rename(&staged, dir) {
    if let Some((holder, moved)) = previous
      && let Err(restore) = fs::rename(&moved, dir)
    {
      let kept = holder.keep();
      warn!(
        path = %dir.display(),
        kept = %kept.display(),
        error = %restore,
        "failed to restore previous assembly directory"
      );
    }
    discard(&staged);
    return Err(AssemblyError::io(dir, e));
  }
  drop(previous);

  info!(path = %dir.display(), files = tree.len(), "wrote assembly directory");
  Ok(())
}

fn discard(staged: &Path) {
  if let Err(e) = fs::remove_dir_all(staged) {
    debug!(path = %staged.display(), error = %e, "failed to remove staging directory");
  }
}

/// Write `tree` as a gzip-compressed tarball at `file`.
///
/// Entries are sorted by path with mtime 0 and mode 0o644, so equal trees
/// produce byte-identical archives.
pub fn write_tar_gz(tree: &MergedTree, file: &Path) -> Result<(), AssemblyError> {
  let archive = tar_gz_bytes(tree).map_err(|e| AssemblyError::io(file, e))?;

  let parent = staging_parent(file)?;
  let mut staged = NamedTempFile::new_in(parent).map_err(|e| AssemblyError::io(parent, e))?;
  staged.write_all(&archive).map_err(|e| AssemblyError::io(file, e))?;
  staged.persist(file).map_err(|e| AssemblyError::io(file, e.error))?;

  info!(path = %file.display(), files = tree.len(), bytes = archive.len(), "wrote assembly archive");
  Ok(())
}

fn tar_gz_bytes(tree: &MergedTree) -> std::io::Result<Vec<u8>> {
  let encoder = GzEncoder::new(Vec::new(), Compression::default());
  let mut builder = Builder::new(encoder);

  for (path, bytes) in tree.files() {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    builder.append_data(&mut header, path, bytes)?;
  }

  builder.into_inner()?.finish()
}
