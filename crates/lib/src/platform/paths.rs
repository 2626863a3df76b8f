//! Per-user directories, following each platform's conventions.

use crate::consts::{APP_NAME, SETTINGS_FILE};
use std::path::PathBuf;

fn env_dir(var: &str) -> Option<PathBuf> {
  std::env::var_os(var).filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> Option<PathBuf> {
  env_dir("USERPROFILE")
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> Option<PathBuf> {
  env_dir("HOME")
}

/// Returns the directory for configuration files for the application
#[cfg(windows)]
pub fn config_dir() -> Option<PathBuf> {
  env_dir("APPDATA").map(|appdata| appdata.join(APP_NAME))
}

/// Returns the directory for configuration files for the application
#[cfg(not(windows))]
pub fn config_dir() -> Option<PathBuf> {
  let config_home = env_dir("XDG_CONFIG_HOME").or_else(|| home_dir().map(|home| home.join(".config")))?;
  Some(config_home.join(APP_NAME))
}

/// Default location of the settings file.
pub fn settings_file() -> Option<PathBuf> {
  config_dir().map(|dir| dir.join(SETTINGS_FILE))
}

#[cfg(all(test, not(windows)))]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn config_dir_prefers_xdg() {
    temp_env::with_vars(
      [("XDG_CONFIG_HOME", Some("/xdg")), ("HOME", Some("/home/me"))],
      || {
        assert_eq!(config_dir(), Some(PathBuf::from("/xdg/cairn")));
        assert_eq!(settings_file(), Some(PathBuf::from("/xdg/cairn/settings.json")));
      },
    );
  }

  #[test]
  #[serial]
  fn config_dir_falls_back_to_home() {
    temp_env::with_vars([("XDG_CONFIG_HOME", None), ("HOME", Some("/home/me"))], || {
      assert_eq!(config_dir(), Some(PathBuf::from("/home/me/.config/cairn")));
    });
  }

  #[test]
  #[serial]
  fn no_home_no_config_dir() {
    temp_env::with_vars([("XDG_CONFIG_HOME", None::<&str>), ("HOME", None)], || {
      assert_eq!(home_dir(), None);
      assert_eq!(config_dir(), None);
    });
  }
}
