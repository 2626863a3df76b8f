//! Crate-wide constants.

/// Application name, used for config directories and env var prefixes.
pub const APP_NAME: &str = "cairn";

/// Name of the configuration every project gets when none is declared.
pub const DEFAULT_CONFIGURATION: &str = "default";

/// Length of the digest prefix shown in reports and diagnostics.
pub const DIGEST_PREFIX_LEN: usize = 12;

/// File name of the settings file inside the config directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Environment variable pointing at an alternative settings file.
pub const ENV_CONFIG: &str = "CAIRN_CONFIG";

/// Environment variable overriding merge parallelism.
pub const ENV_PARALLELISM: &str = "CAIRN_PARALLELISM";

/// Environment variable holding a `tracing` filter directive.
pub const ENV_LOG: &str = "CAIRN_LOG";
