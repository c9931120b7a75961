//! # Configuration
//!
//! The process environment is read once into an [`EnvSnapshot`]. Secret-file
//! resolution and `.env` loading work on that snapshot, and the result is
//! turned into an immutable [`ResolvedConfig`] that every later step receives
//! by reference. Nothing here writes to the process environment.
//!
//! Plain settings go through the `config` crate; secrets are lifted out of the
//! snapshot directly and kept in [`Secret`] buffers that are wiped on drop.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use zeroize::Zeroizing;

use crate::database::{StoreLocation, DEFAULT_DATABASE_URL};
use crate::startup::StartupError;

/// A secret value, zeroed when dropped
pub type Secret = Zeroizing<String>;

/// Keys handed to the `config` crate
const SETTING_KEYS: &[&str] = &[
    "DATABASE_URL",
    "LOG_LEVEL",
    "APP_PORT",
    "DEPLOYMENT_TYPE",
    "DOMAIN",
];

// ============================================================================
// EnvSnapshot
// ============================================================================

/// Owned copy of environment variables
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment. Non-UTF-8 entries are dropped.
    pub fn from_process() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Value of `key` unless it is missing or empty
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Set `key` only if it is not present yet. Returns whether it was set.
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        match self.vars.entry(key.into()) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(value.into());
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

// Values may be secrets
impl fmt::Debug for EnvSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.vars.keys()).finish()
    }
}

// ============================================================================
// Settings
// ============================================================================

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_app_port() -> u16 {
    8000
}

fn default_deployment_type() -> String {
    "local".to_string()
}

/// Non-secret settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_app_port")]
    pub app_port: u16,
    #[serde(default = "default_deployment_type")]
    pub deployment_type: String,
    #[serde(default)]
    pub domain: Option<String>,
}

impl Settings {
    /// Deserialize settings from the snapshot
    pub fn from_env(env: &EnvSnapshot) -> Result<Self, StartupError> {
        let source: config::Map<String, String> = SETTING_KEYS
            .iter()
            .filter_map(|key| Some((key.to_string(), env.get(key)?.to_string())))
            .collect();

        config::Config::builder()
            .add_source(config::Environment::default().source(Some(source)))
            .build()
            .and_then(|c| c.try_deserialize::<Settings>())
            .map_err(|e| StartupError::InvalidSetting(e.to_string()))
    }
}

/// Deployment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeploymentMode {
    /// No authentication, served on localhost
    #[default]
    Local,
    /// Authentication enabled behind a domain
    Production,
}

impl FromStr for DeploymentMode {
    type Err = StartupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(DeploymentMode::Local),
            "production" => Ok(DeploymentMode::Production),
            other => Err(StartupError::InvalidSetting(format!(
                "DEPLOYMENT_TYPE must be 'local' or 'production', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentMode::Local => write!(f, "LOCAL"),
            DeploymentMode::Production => write!(f, "PRODUCTION"),
        }
    }
}

// ============================================================================
// ResolvedConfig
// ============================================================================

/// Configuration after secret resolution and `.env` loading
pub struct ResolvedConfig {
    pub settings: Settings,
    pub deployment: DeploymentMode,
    pub store: StoreLocation,
    /// `.env` file that contributed values, if any
    pub env_file: Option<PathBuf>,
    pub encryption_key: Secret,
    pub auth_username: Option<String>,
    pub auth_password_hash: Option<Secret>,
    pub unifi_password: Option<Secret>,
    pub unifi_api_key: Option<Secret>,
}

impl ResolvedConfig {
    pub fn build(env: &EnvSnapshot, env_file: Option<PathBuf>) -> Result<Self, StartupError> {
        let encryption_key = env
            .non_empty("ENCRYPTION_KEY")
            .map(|k| Zeroizing::new(k.to_string()))
            .ok_or(StartupError::MissingEncryptionKey)?;

        let settings = Settings::from_env(env)?;
        let deployment = settings.deployment_type.parse::<DeploymentMode>()?;
        let store = StoreLocation::parse(&settings.database_url);
        let secret = |key: &str| env.non_empty(key).map(|v| Zeroizing::new(v.to_string()));

        Ok(Self {
            deployment,
            store,
            env_file,
            encryption_key,
            auth_username: env.non_empty("AUTH_USERNAME").map(str::to_string),
            auth_password_hash: secret("AUTH_PASSWORD_HASH"),
            unifi_password: secret("UNIFI_PASSWORD"),
            unifi_api_key: secret("UNIFI_API_KEY"),
            settings,
        })
    }

    pub fn auth_enabled(&self) -> bool {
        self.deployment == DeploymentMode::Production
    }
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const REDACTED: &str = "<redacted>";
        let redact = |s: &Option<Secret>| s.as_ref().map(|_| REDACTED);

        f.debug_struct("ResolvedConfig")
            .field("settings", &self.settings)
            .field("deployment", &self.deployment)
            .field("store", &self.store)
            .field("env_file", &self.env_file)
            .field("encryption_key", &REDACTED)
            .field("auth_username", &self.auth_username)
            .field("auth_password_hash", &redact(&self.auth_password_hash))
            .field("unifi_password", &redact(&self.unifi_password))
            .field("unifi_api_key", &redact(&self.unifi_api_key))
            .finish()
    }
}
