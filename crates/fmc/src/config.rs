//! CLI configuration: a thin wrapper around `fmc_config` that applies
//! `GlobalOpts` flag overrides (--host, --username, --insecure, ...).

use std::path::PathBuf;

use fmc_api::{BasicAuthenticator, ClientConfig, FmcClient};
use fmc_config::{Config, Profile};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use fmc_config::{KEYRING_SERVICE, save_config_to};

// ── Loading ─────────────────────────────────────────────────────────

/// `--config`, else the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(fmc_config::config_path)
}

pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(fmc_config::load_config_from(&config_path(global))?)
}

pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().cloned().collect();
    names.sort();
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}

// ── Client construction ─────────────────────────────────────────────

/// Merge flag overrides into the selected profile.
///
/// Without a matching profile, `--host` alone is enough to build one from
/// the defaults; credentials then come from the environment or keyring.
pub fn resolve_profile(global: &GlobalOpts, config: &Config) -> Result<(String, Profile), CliError> {
    let name = active_profile_name(global, config);

    let mut profile = match config.profiles.get(&name) {
        Some(profile) => profile.clone(),
        None if global.host.is_some() => Profile::default(),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                available: available_profiles(config),
                name,
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_path(global).display().to_string(),
            });
        }
    };

    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if global.username.is_some() {
        profile.username.clone_from(&global.username);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }

    Ok((name, profile))
}

pub fn build_client(
    global: &GlobalOpts,
) -> Result<(String, FmcClient<BasicAuthenticator>), CliError> {
    let config = load_config(global)?;
    let (name, profile) = resolve_profile(global, &config)?;
    let (client_config, authenticator): (ClientConfig, BasicAuthenticator) =
        fmc_config::profile_to_client(&profile, &name, &config.defaults)?;

    tracing::debug!(
        profile = %name,
        host = %authenticator.host(),
        gate = client_config.gate_capacity,
        "building client"
    );
    let client = FmcClient::new(client_config, authenticator)?;
    Ok((name, client))
}
