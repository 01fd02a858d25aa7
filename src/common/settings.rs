//! Runner settings file handling
//!
//! Settings describe how to invoke the test framework and how to reach the
//! alert transports. They are read from TOML, then selectively overridden by
//! environment variables (which may come from a `.env` file).

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::paths::config_path;
use super::{Error, Result};

/// Main settings structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Settings {
    /// Test framework invocation
    #[serde(default)]
    pub framework: FrameworkSettings,

    /// Email transport
    #[serde(default)]
    pub mail: MailSettings,

    /// PagerDuty API
    #[serde(default)]
    pub pagerduty: PagerDutySettings,
}

/// How to invoke the external test framework
#[derive(Debug, Deserialize, Clone)]
pub struct FrameworkSettings {
    /// Executable name or path
    #[serde(default = "default_command")]
    pub command: String,

    /// Argument template. `{txt}`, `{html}` and `{json}` are replaced by report
    /// file paths; an argument that is exactly `{files}` expands to the test files.
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Glob applied to file names inside a suite directory
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Root under which `<suite name>/` directories live
    #[serde(default = "default_suite_dir")]
    pub suite_dir: PathBuf,
}

impl Default for FrameworkSettings {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: default_args(),
            pattern: default_pattern(),
            suite_dir: default_suite_dir(),
        }
    }
}

fn default_command() -> String {
    "rspec".to_string()
}

fn default_args() -> Vec<String> {
    [
        "--format",
        "json",
        "--out",
        "{json}",
        "--format",
        "html",
        "--out",
        "{html}",
        "--format",
        "documentation",
        "--out",
        "{txt}",
        "--format",
        "progress",
        "{files}",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_pattern() -> String {
    "*.rb".to_string()
}

fn default_suite_dir() -> PathBuf {
    PathBuf::from("spec/suites")
}

/// SMTP settings for alert emails
#[derive(Debug, Deserialize, Clone)]
pub struct MailSettings {
    /// Sender for failure emails
    #[serde(default = "default_from")]
    pub from: String,

    /// Sender for emails relayed to a paging address
    #[serde(default = "default_pager_from")]
    pub pager_from: String,

    /// SMTP relay host; email channels are skipped when unset
    pub smtp_host: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    pub smtp_user: Option<String>,

    pub smtp_password: Option<String>,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            from: default_from(),
            pager_from: default_pager_from(),
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_user: None,
            smtp_password: None,
        }
    }
}

fn default_from() -> String {
    "Scout <scout@localhost>".to_string()
}

fn default_pager_from() -> String {
    "Scout <scout@localhost>".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

/// PagerDuty integration settings
#[derive(Debug, Deserialize, Clone)]
pub struct PagerDutySettings {
    /// Events API v1 endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for PagerDutySettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    "https://events.pagerduty.com/generic/2010-04-15/create_event.json".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Settings {
    /// Load settings from an explicit file, or the default config file
    ///
    /// Returns default settings if no file exists. An explicit path that does
    /// not exist is an error. Environment overrides are applied either way.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut settings = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Parse settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, &e))?;
        toml::from_str(&content).map_err(|e| Error::config_parse(path, e))
    }

    /// Apply environment variable overrides through a lookup function
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("SCOUT_SUITE_DIR") {
            self.framework.suite_dir = PathBuf::from(dir);
        }
        if let Some(from) = lookup("SCOUT_MAIL_FROM") {
            self.mail.from = from;
        }
        if let Some(host) = lookup("SMTP_HOST") {
            self.mail.smtp_host = Some(host);
        }
        if let Some(port) = lookup("SMTP_PORT").and_then(|p| p.parse().ok()) {
            self.mail.smtp_port = port;
        }
        if let Some(user) = lookup("SMTP_USER") {
            self.mail.smtp_user = Some(user);
        }
        if let Some(password) = lookup("SMTP_PASSWORD") {
            self.mail.smtp_password = Some(password);
        }
    }
}
