//! `fmc get` and `fmc request`: raw calls under the domain prefix.

use fmc_api::{FmcClient, Method, Request, StatusCode};
use serde_json::Value;

use crate::cli::{GetArgs, RequestArgs};
use crate::commands::util;
use crate::error::CliError;

pub async fn get(client: &FmcClient, args: GetArgs, profile: &str) -> Result<(), CliError> {
    let mut request = Request::get(args.path.as_str());
    for (key, value) in util::parse_query(&args.query)? {
        request = request.query(key, value);
    }
    run(client, &request, &args.path, profile).await
}

pub async fn handle(client: &FmcClient, args: RequestArgs, profile: &str) -> Result<(), CliError> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes()).map_err(|_| {
        CliError::Validation {
            field: "method".into(),
            reason: format!("'{}' is not an HTTP method", args.method),
        }
    })?;

    let mut request = Request::new(method, args.path.as_str());
    if let Some(ref data) = args.data {
        request = request.json(&util::read_body(data)?)?;
    }
    if let Some(code) = args.expect {
        let status = StatusCode::from_u16(code).map_err(|_| CliError::Validation {
            field: "expect".into(),
            reason: format!("{code} is not an HTTP status code"),
        })?;
        request = request.expect(status);
    }
    for (key, value) in util::parse_query(&args.query)? {
        request = request.query(key, value);
    }

    run(client, &request, &args.path, profile).await
}

async fn run(
    client: &FmcClient,
    request: &Request,
    path: &str,
    profile: &str,
) -> Result<(), CliError> {
    tracing::debug!(method = %request.method(), path, "executing");
    let body: Value = client
        .execute(request)
        .await
        .map_err(|e| CliError::from_api(e, profile, Some(path)))?;
    util::print_json(&body)
}
