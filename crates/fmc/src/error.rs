//! CLI error types with miette diagnostics.
//!
//! Maps `fmc_api::Error` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use fmc_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to FMC")]
    #[diagnostic(
        code(fmc::connection_failed),
        help(
            "Check that the FMC is reachable from this machine.\n\
             Self-signed appliance? Try: fmc --insecure login"
        )
    )]
    ConnectionFailed {
        #[source]
        source: fmc_api::Error,
    },

    #[error("Request timed out")]
    #[diagnostic(
        code(fmc::timeout),
        help("Increase the timeout with --timeout or check FMC responsiveness.")
    )]
    Timeout {
        #[source]
        source: fmc_api::Error,
    },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed for profile '{profile}'")]
    #[diagnostic(
        code(fmc::auth_failed),
        help(
            "Verify the username and password.\n\
             Run: fmc --profile {profile} config set-password"
        )
    )]
    AuthFailed {
        profile: String,
        #[source]
        source: fmc_api::Error,
    },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(fmc::no_credentials),
        help(
            "Configure credentials with: fmc config init\n\
             Or set FMC_USERNAME and FMC_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Not found: {path}")]
    #[diagnostic(code(fmc::not_found))]
    NotFound {
        path: String,
        #[source]
        source: fmc_api::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(fmc::api_error))]
    Api(fmc_api::Error),

    #[error("Interrupted")]
    #[diagnostic(code(fmc::interrupted))]
    Interrupted,

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fmc::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(fmc::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: fmc --profile {name} --host <HOST> config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No FMC host configured")]
    #[diagnostic(
        code(fmc::no_config),
        help(
            "Create a profile with: fmc --host <HOST> config init\n\
             Or pass --host / set FMC_HOST.\n\
             Config expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(fmc::config))]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(fmc::json), help("Check the JSON body and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Interrupted => exit_code::INTERRUPTED,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the profile name to authentication failures.
    pub fn from_api(err: fmc_api::Error, profile: &str, path: Option<&str>) -> Self {
        if err.is_auth_failure() {
            return Self::AuthFailed {
                profile: profile.into(),
                source: err,
            };
        }
        if err.is_not_found() {
            if let Some(path) = path {
                return Self::NotFound {
                    path: path.into(),
                    source: err,
                };
            }
        }
        err.into()
    }
}

// ── Error mapping ────────────────────────────────────────────────────

impl From<fmc_api::Error> for CliError {
    fn from(err: fmc_api::Error) -> Self {
        match &err {
            fmc_api::Error::Cancelled => Self::Interrupted,
            fmc_api::Error::Transport(e) if e.is_timeout() => Self::Timeout { source: err },
            fmc_api::Error::Transport(e) if e.is_connect() => {
                Self::ConnectionFailed { source: err }
            }
            fmc_api::Error::Config { message } => Self::Validation {
                field: "client".into(),
                reason: message.clone(),
            },
            _ => Self::Api(err),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::UnknownProfile { name } => Self::ProfileNotFound {
                name,
                available: "(none)".into(),
            },
            other => Self::Config(other),
        }
    }
}
