//! Config subcommand handlers.

use dialoguer::Input;
use fmc_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, KEYRING_SERVICE};
use crate::error::CliError;

// ── Helpers ─────────────────────────────────────────────────────────

fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn store_password(profile_name: &str) -> Result<(), CliError> {
    let secret = rpassword::prompt_password("FMC password: ").map_err(prompt_err)?;
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "value cannot be empty".into(),
        });
    }
    let entry = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
        .map_err(|e| CliError::Validation {
            field: "keyring".into(),
            reason: format!("failed to access keyring: {e}"),
        })?;
    entry
        .set_password(&secret)
        .map_err(|e| CliError::Validation {
            field: "keyring".into(),
            reason: format!("failed to store password in keyring: {e}"),
        })?;
    Ok(())
}

/// Render the config as TOML with plaintext passwords masked.
fn render_redacted(cfg: &Config) -> Result<String, CliError> {
    let mut value = toml::Value::try_from(cfg).map_err(|e| CliError::Validation {
        field: "config".into(),
        reason: format!("failed to serialize config: {e}"),
    })?;
    if let Some(profiles) = value.get_mut("profiles").and_then(toml::Value::as_table_mut) {
        for (_, profile) in profiles.iter_mut() {
            if let Some(password) = profile.get_mut("password") {
                *password = toml::Value::String("********".into());
            }
        }
    }
    toml::to_string_pretty(&value).map_err(|e| CliError::Validation {
        field: "config".into(),
        reason: format!("failed to serialize config: {e}"),
    })
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", config::config_path(global).display());
            Ok(())
        }

        // ── Init ────────────────────────────────────────────────────
        ConfigCommand::Init { keyring } => {
            let path = config::config_path(global);
            let mut cfg = config::load_config(global)?;
            let profile_name = config::active_profile_name(global, &cfg);
            let existing = cfg.profiles.remove(&profile_name).unwrap_or_default();

            let host = match global.host.clone() {
                Some(host) => host,
                None => Input::new()
                    .with_prompt("FMC host")
                    .with_initial_text(existing.host.clone())
                    .interact_text()
                    .map_err(prompt_err)?,
            };
            let username = match global.username.clone().or(existing.username.clone()) {
                Some(user) => user,
                None => Input::new()
                    .with_prompt("Username")
                    .interact_text()
                    .map_err(prompt_err)?,
            };

            let profile = Profile {
                host,
                username: Some(username),
                insecure: global.insecure.then_some(true).or(existing.insecure),
                timeout: global.timeout.or(existing.timeout),
                ..existing
            };
            // Validate before writing anything.
            fmc_config::client_config(&profile, &cfg.defaults)?;
            fmc_api::auth::normalize_host(&profile.host).map_err(|e| CliError::Validation {
                field: "host".into(),
                reason: e.to_string(),
            })?;

            if keyring {
                store_password(&profile_name)?;
                eprintln!("✓ Password stored in system keyring");
            }

            cfg.profiles.insert(profile_name.clone(), profile);
            if cfg
                .default_profile
                .as_ref()
                .is_none_or(|name| !cfg.profiles.contains_key(name))
            {
                cfg.default_profile = Some(profile_name.clone());
            }
            config::save_config_to(&cfg, &path)?;
            eprintln!("✓ Profile '{profile_name}' saved to {}", path.display());
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config(global)?;
            print!("{}", render_redacted(&cfg)?);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config(global)?;
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: fmc --host <HOST> config init");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config(global)?;
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config_to(&cfg, &config::config_path(global))?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let cfg = config::load_config(global)?;
            let profile_name = config::active_profile_name(global, &cfg);
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name: profile_name,
                });
            }
            store_password(&profile_name)?;
            eprintln!("✓ Password for '{profile_name}' stored in system keyring");
            Ok(())
        }
    }
}
