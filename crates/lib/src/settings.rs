//! User settings.
//!
//! Resolution order, later wins: built-in defaults, the settings file
//! (`$CAIRN_CONFIG`, else `<config dir>/cairn/settings.json`), then the
//! `CAIRN_PARALLELISM` and `CAIRN_LOG` environment variables. A missing file
//! is not an error; an unreadable or malformed one is.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{ENV_CONFIG, ENV_LOG, ENV_PARALLELISM};
use crate::platform::paths::settings_file;

#[derive(Debug, Error)]
pub enum SettingsError {
  #[error("failed to read settings file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid settings file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid value for {var}: {value:?}")]
  Env { var: &'static str, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Settings {
  /// Worker threads for merging. `None` uses rayon's global pool.
  pub parallelism: Option<usize>,
  /// `tracing` filter directive used when `RUST_LOG` is unset.
  pub log: Option<String>,
  /// Merge policy file used when none is given explicitly.
  pub policy: Option<PathBuf>,
}

impl Settings {
  /// Load settings from the default locations and apply env overrides.
  pub fn load() -> Result<Self, SettingsError> {
    let path = std::env::var_os(ENV_CONFIG)
      .filter(|v| !v.is_empty())
      .map(PathBuf::from)
      .or_else(settings_file);

    let settings = match path {
      Some(path) if path.is_file() => Self::from_file(&path)?,
      Some(path) => {
        debug!(path = %path.display(), "no settings file");
        Self::default()
      }
      None => Self::default(),
    };
    settings.with_env()
  }

  pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
    let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let settings = serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    debug!(path = %path.display(), "loaded settings");
    Ok(settings)
  }

  /// Apply `CAIRN_*` overrides.
  pub fn with_env(mut self) -> Result<Self, SettingsError> {
    if let Ok(value) = std::env::var(ENV_PARALLELISM) {
      let threads = value
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|&n| n > 0)
        .ok_or(SettingsError::Env {
          var: ENV_PARALLELISM,
          value: value.clone(),
        })?;
      self.parallelism = Some(threads);
    }
    if let Ok(value) = std::env::var(ENV_LOG)
      && !value.is_empty()
    {
      self.log = Some(value);
    }
    Ok(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::tempdir;

  #[test]
  #[serial]
  fn defaults_without_file_or_env() {
    let temp = tempdir().unwrap();
    let missing = temp.path().join("settings.json");
    temp_env::with_vars(
      [
        (ENV_CONFIG, Some(missing.to_str().unwrap())),
        (ENV_PARALLELISM, None),
        (ENV_LOG, None),
      ],
      || {
        assert_eq!(Settings::load().unwrap(), Settings::default());
      },
    );
  }

  #[test]
  #[serial]
  fn file_then_env_overrides() {
    let temp = tempdir().unwrap();
    let file = temp.path().join("settings.json");
    std::fs::write(&file, r#"{ "parallelism": 2, "log": "info", "policy": "/etc/policy.json" }"#).unwrap();

    temp_env::with_vars(
      [
        (ENV_CONFIG, Some(file.to_str().unwrap())),
        (ENV_PARALLELISM, Some("6")),
        (ENV_LOG, None),
      ],
      || {
        let settings = Settings::load().unwrap();
        assert_eq!(settings.parallelism, Some(6));
        assert_eq!(settings.log.as_deref(), Some("info"));
        assert_eq!(settings.policy, Some(PathBuf::from("/etc/policy.json")));
      },
    );
  }

  #[test]
  #[serial]
  fn bad_parallelism_is_rejected() {
    temp_env::with_var(ENV_PARALLELISM, Some("zero"), || {
      let err = Settings::default().with_env().unwrap_err();
      assert!(matches!(err, SettingsError::Env { var: ENV_PARALLELISM, .. }));
    });
    temp_env::with_var(ENV_PARALLELISM, Some("0"), || {
      assert!(Settings::default().with_env().is_err());
    });
  }

  #[test]
  fn unknown_fields_are_parse_errors() {
    let temp = tempdir().unwrap();
    let file = temp.path().join("settings.json");
    std::fs::write(&file, r#"{ "threads": 2 }"#).unwrap();
    let err = Settings::from_file(&file).unwrap_err();
    assert!(matches!(err, SettingsError::Parse { .. }));
  }
}
