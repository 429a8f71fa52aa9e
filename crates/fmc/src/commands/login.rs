//! `fmc login`: authenticate once and report the session's domain.

use fmc_api::FmcClient;

use crate::error::CliError;

pub async fn handle(client: &FmcClient, profile: &str) -> Result<(), CliError> {
    let session = client
        .login()
        .await
        .map_err(|e| CliError::from_api(e, profile, None))?;

    println!("host:   {}", session.host());
    println!("domain: {}", session.domain_uuid());
    println!("prefix: {}", session.prefix());
    Ok(())
}
