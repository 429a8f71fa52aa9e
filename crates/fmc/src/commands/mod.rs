//! Command handlers. Each module owns one top-level subcommand.

pub mod config_cmd;
pub mod login;
pub mod request;
pub mod util;

use fmc_api::FmcClient;

use crate::cli::Command;
use crate::error::CliError;

/// Run a command that needs an FMC connection.
pub async fn dispatch(cmd: Command, client: &FmcClient, profile: &str) -> Result<(), CliError> {
    match cmd {
        Command::Login => login::handle(client, profile).await,
        Command::Get(args) => request::get(client, args, profile).await,
        Command::Request(args) => request::handle(client, args, profile).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
