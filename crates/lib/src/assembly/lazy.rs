//! Load-on-first-use byte buffers.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

type Loader = Box<dyn Fn() -> io::Result<Vec<u8>> + Send + Sync>;

/// Bytes loaded at most once on success.
///
/// Concurrent callers block on the same load. A failed load is returned to its
/// caller and not cached, so a later call retries.
pub struct LazyBytes {
  cell: Mutex<Option<Arc<[u8]>>>,
  loader: Option<Loader>,
  loads: AtomicUsize,
}

impl LazyBytes {
  pub fn new<F>(loader: F) -> Self
  where
    F: Fn() -> io::Result<Vec<u8>> + Send + Sync + 'static,
  {
    Self {
      cell: Mutex::new(None),
      loader: Some(Box::new(loader)),
      loads: AtomicUsize::new(0),
    }
  }

  /// Already-loaded bytes.
  pub fn ready(bytes: Arc<[u8]>) -> Self {
    Self {
      cell: Mutex::new(Some(bytes)),
      loader: None,
      loads: AtomicUsize::new(0),
    }
  }

  pub fn get(&self) -> io::Result<Arc<[u8]>> {
    let mut cell = self.cell.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(bytes) = cell.as_ref() {
      return Ok(Arc::clone(bytes));
    }
    let loader = self
      .loader
      .as_ref()
      .ok_or_else(|| io::Error::other("no loader for lazy bytes"))?;
    let bytes: Arc<[u8]> = loader()?.into();
    self.loads.fetch_add(1, Ordering::Relaxed);
    *cell = Some(Arc::clone(&bytes));
    Ok(bytes)
  }

  pub fn is_loaded(&self) -> bool {
    self.cell.lock().unwrap_or_else(PoisonError::into_inner).is_some()
  }

  /// Number of successful loader runs.
  pub fn loads(&self) -> usize {
    self.loads.load(Ordering::Relaxed)
  }
}

impl fmt::Debug for LazyBytes {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LazyBytes")
      .field("loaded", &self.is_loaded())
      .field("loads", &self.loads())
      .finish()
  }
}
