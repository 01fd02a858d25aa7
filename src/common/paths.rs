//! Platform configuration and data paths

use std::path::PathBuf;

/// Name used for platform directories
const APP_NAME: &str = "scout";

/// Default environment definitions file, relative to the working directory
pub const DEFAULT_ENVIRONMENTS_FILE: &str = "environments.yml";

/// Default suite definitions file, relative to the working directory
pub const DEFAULT_SUITES_FILE: &str = "suites.yml";

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/scout/`
/// - macOS: `~/Library/Application Support/scout/`
/// - Windows: `%APPDATA%\scout\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the runner settings file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Resolve an environment/suite file path: explicit flag, then env var, then default
pub fn resolve_config_file(explicit: Option<PathBuf>, env_var: &str, default: &str) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os(env_var).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(default))
}
