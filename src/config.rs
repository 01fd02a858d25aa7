//! Environment and suite definitions
//!
//! Both files are YAML mappings from a symbolic name to a settings mapping.
//! Entries keep the order they have in the file; that order drives the run
//! matrix. Keys that scout does not know are kept in `extra` (sorted) and
//! handed to the test framework, never rejected.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::common::{Error, Result};

/// A named deployment target whose settings control alerting
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct EnvironmentConfig {
    /// Injected from the mapping key
    #[serde(skip_deserializing)]
    pub name: String,
    /// Send failure emails for suites run against this environment
    #[serde(default)]
    pub email_enabled: bool,
    /// Page on-call for suites run against this environment
    #[serde(default)]
    pub pagerduty_enabled: bool,
    /// Paging key used when the suite does not set its own
    #[serde(default, alias = "pagerduty_key")]
    pub pagerduty_service_key: Option<String>,
    /// Unrecognized settings, passed through to the framework
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A named collection of test files plus its notification targets
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct SuiteConfig {
    /// Injected from the mapping key
    #[serde(skip_deserializing)]
    pub name: String,
    /// Recipient for failure emails
    #[serde(default)]
    pub email: Option<String>,
    /// Paging key; overrides the environment's key
    #[serde(default, alias = "pagerduty_key")]
    pub pagerduty_service_key: Option<String>,
    /// Test file directory (default: `<suite_dir>/<name>`)
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// File name glob (default: the framework pattern)
    #[serde(default)]
    pub pattern: Option<String>,
    /// Shell commands run before the framework is invoked
    #[serde(default)]
    pub setup: Vec<String>,
    /// Unrecognized settings
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl SuiteConfig {
    /// Paging key for this suite in the given environment
    pub fn paging_key<'a>(&'a self, env: &'a EnvironmentConfig) -> Option<&'a str> {
        self.pagerduty_service_key
            .as_deref()
            .or(env.pagerduty_service_key.as_deref())
    }

    /// Directory holding this suite's test files
    pub fn test_dir(&self, suite_root: &Path) -> PathBuf {
        match &self.dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => suite_root.join(dir),
            None => suite_root.join(&self.name),
        }
    }
}

/// Entries addressable by their mapping key
pub trait Named {
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
    /// Normalize loosely-written values after deserialization
    fn normalize(&mut self) {}
}

impl Named for EnvironmentConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn normalize(&mut self) {
        blank_to_none(&mut self.pagerduty_service_key);
        // The mapping key is the name
        self.extra.remove("name");
    }
}

impl Named for SuiteConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn normalize(&mut self) {
        blank_to_none(&mut self.email);
        blank_to_none(&mut self.pagerduty_service_key);
        blank_to_none(&mut self.pattern);
        self.extra.remove("name");
    }
}

fn blank_to_none(value: &mut Option<String>) {
    if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
        *value = None;
    }
}

/// Find an entry by name
pub fn lookup<'a, T: Named>(items: &'a [T], kind: &'static str, name: &str) -> Result<&'a T> {
    items.iter().find(|item| item.name() == name).ok_or_else(|| {
        let configured: Vec<&str> = items.iter().map(Named::name).collect();
        Error::unknown_name(kind, name, &configured)
    })
}

/// Loaded environment and suite definitions
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    environments: Vec<EnvironmentConfig>,
    suites: Vec<SuiteConfig>,
}

impl ConfigStore {
    /// Load both definition files
    pub fn load(environments_path: &Path, suites_path: &Path) -> Result<Self> {
        let environments = load_file(environments_path)?;
        let suites = load_file(suites_path)?;

        tracing::debug!(
            environments = environments.len(),
            suites = suites.len(),
            "Loaded configuration"
        );

        Ok(Self {
            environments,
            suites,
        })
    }

    /// Build a store from YAML text
    pub fn from_yaml(environments: &str, suites: &str) -> Result<Self> {
        Ok(Self {
            environments: parse_mapping(Path::new("<environments>"), environments)?,
            suites: parse_mapping(Path::new("<suites>"), suites)?,
        })
    }

    /// Build a store from already-typed entries
    pub fn new(environments: Vec<EnvironmentConfig>, suites: Vec<SuiteConfig>) -> Self {
        Self {
            environments,
            suites,
        }
    }

    /// All environments in configured order
    pub fn environments(&self) -> &[EnvironmentConfig] {
        &self.environments
    }

    /// All suites in configured order
    pub fn suites(&self) -> &[SuiteConfig] {
        &self.suites
    }

    pub fn environment(&self, name: &str) -> Result<&EnvironmentConfig> {
        lookup(&self.environments, "environment", name)
    }

    pub fn suite(&self, name: &str) -> Result<&SuiteConfig> {
        lookup(&self.suites, "suite", name)
    }
}

fn load_file<T>(path: &Path) -> Result<Vec<T>>
where
    T: DeserializeOwned + Named,
{
    let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, &e))?;
    parse_mapping(path, &content)
}

fn parse_mapping<T>(path: &Path, content: &str) -> Result<Vec<T>>
where
    T: DeserializeOwned + Named,
{
    let document: Value =
        serde_yaml::from_str(content).map_err(|e| Error::config_parse(path, e))?;

    let mapping = match document {
        Value::Mapping(mapping) => mapping,
        Value::Null => {
            return Err(Error::config_parse(
                path,
                "file is empty; expected a mapping of names to settings",
            ))
        }
        other => {
            return Err(Error::config_parse(
                path,
                format!("expected a mapping of names to settings, found {}", kind_of(&other)),
            ))
        }
    };

    let mut entries = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let name = match key {
            Value::String(name) => name,
            other => {
                return Err(Error::config_parse(
                    path,
                    format!("entry names must be strings, found {}", kind_of(&other)),
                ))
            }
        };

        // A bare `name:` line means "no settings"
        let value = match value {
            Value::Null => Value::Mapping(Default::default()),
            Value::Mapping(_) => value,
            other => {
                return Err(Error::config_parse(
                    path,
                    format!("settings for '{}' must be a mapping, found {}", name, kind_of(&other)),
                ))
            }
        };

        let mut entry: T = serde_yaml::from_value(value)
            .map_err(|e| Error::config_parse(path, format!("'{}': {}", name, e)))?;
        entry.set_name(name);
        entry.normalize();
        entries.push(entry);
    }

    Ok(entries)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
