//! Shared configuration for FMC tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), and
//! translation into an `fmc_api::ClientConfig` plus `BasicAuthenticator`.
//! The CLI layers its flag overrides on top of this.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use fmc_api::{
    BasicAuthenticator, ClientConfig, Credentials, RateLimitConfig, RetryPolicy, TlsMode,
    TransportConfig,
};

/// Keyring service name; entries are keyed `{profile}/password`.
pub const KEYRING_SERVICE: &str = "fmc";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named FMC profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// `requested`, else `default_profile`, else `"default"`.
    pub fn active_profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

/// Values applied to every profile that doesn't override them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default)]
    pub insecure: bool,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_rate_limit_capacity")]
    pub rate_limit_capacity: u32,

    #[serde(default = "default_rate_limit_interval")]
    pub rate_limit_interval_secs: u64,

    #[serde(default = "default_gate_capacity")]
    pub gate_capacity: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            insecure: false,
            timeout: default_timeout(),
            rate_limit_capacity: default_rate_limit_capacity(),
            rate_limit_interval_secs: default_rate_limit_interval(),
            gate_capacity: default_gate_capacity(),
        }
    }
}

fn default_timeout() -> u64 {
    120
}
fn default_rate_limit_capacity() -> u32 {
    100
}
fn default_rate_limit_interval() -> u64 {
    60
}
fn default_gate_capacity() -> usize {
    1
}

/// A named FMC profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// FMC address, e.g. "fmc.example.com" or "https://10.0.0.5:8443".
    pub host: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Plaintext password. Prefer the keyring or `password_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Name of an environment variable holding the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// PEM file with a custom CA certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_capacity: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_interval_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_capacity: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unauthorized_retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_throttled_retries: Option<u32>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "fmc", "fmc").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("fmc");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from an explicit file. A missing file yields the defaults.
///
/// `FMC_`-prefixed variables override file values; nested keys use a
/// double underscore, e.g. `FMC_DEFAULTS__GATE_CAPACITY=4`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FMC_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML, creating parent directories as needed.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve username + password for a profile.
///
/// Username: profile, then `FMC_USERNAME`. Password: the variable named by
/// `password_env`, then `FMC_PASSWORD`, then the system keyring, then the
/// plaintext `password` field.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<Credentials, ConfigError> {
    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var("FMC_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    let password = resolve_password(profile, profile_name).ok_or_else(|| {
        ConfigError::NoCredentials {
            profile: profile_name.into(),
        }
    })?;

    Ok(Credentials { username, password })
}

fn resolve_password(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. Global env var
    if let Ok(val) = std::env::var("FMC_PASSWORD") {
        return Some(SecretString::from(val));
    }

    // 3. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password")) {
        if let Ok(pw) = entry.get_password() {
            return Some(SecretString::from(pw));
        }
    }

    // 4. Plaintext in config
    profile
        .password
        .as_ref()
        .map(|pw| SecretString::from(pw.clone()))
}

// ── Translation into fmc_api types ──────────────────────────────────

/// Build the executor configuration for a profile, falling back to
/// `defaults` for anything the profile leaves unset.
pub fn client_config(profile: &Profile, defaults: &Defaults) -> Result<ClientConfig, ConfigError> {
    let timeout = profile.timeout.unwrap_or(defaults.timeout);
    if timeout == 0 {
        return Err(invalid("timeout", "must be at least 1 second"));
    }

    let capacity = profile
        .rate_limit_capacity
        .unwrap_or(defaults.rate_limit_capacity);
    if capacity == 0 {
        return Err(invalid("rate_limit_capacity", "must be at least 1"));
    }

    let interval = profile
        .rate_limit_interval_secs
        .unwrap_or(defaults.rate_limit_interval_secs);
    if interval == 0 {
        return Err(invalid("rate_limit_interval_secs", "must be at least 1"));
    }

    let gate_capacity = profile.gate_capacity.unwrap_or(defaults.gate_capacity);
    if gate_capacity == 0 {
        return Err(invalid("gate_capacity", "must be at least 1"));
    }

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };

    let base = RetryPolicy::default();
    let retry = RetryPolicy {
        max_unauthorized_retries: profile
            .max_unauthorized_retries
            .or(base.max_unauthorized_retries),
        max_throttled_retries: profile
            .max_throttled_retries
            .or(base.max_throttled_retries),
        ..base
    };

    Ok(ClientConfig {
        transport: TransportConfig {
            tls,
            timeout: Duration::from_secs(timeout),
        },
        rate_limit: RateLimitConfig::per_interval(capacity, Duration::from_secs(interval)),
        gate_capacity,
        retry,
    })
}

/// Everything needed to construct an `FmcClient` for a profile.
pub fn profile_to_client(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<(ClientConfig, BasicAuthenticator), ConfigError> {
    let config = client_config(profile, defaults)?;
    let credentials = resolve_credentials(profile, profile_name)?;
    let authenticator = BasicAuthenticator::new(&profile.host, credentials)
        .map_err(|e| invalid("host", &format!("{}: {e}", profile.host)))?;
    Ok((config, authenticator))
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}
