// FMC authentication
//
// The executor is generic over `Authenticator` so the login handshake can
// vary (username/password on-prem, API token for cloud-delivered FMC)
// while retry, rate-limit and locking logic stays in one place.

use std::future::Future;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::session::SessionGrant;

/// Unauthenticated token endpoint, relative to the appliance root.
pub const TOKEN_PATH: &str = "api/fmc_platform/v1/auth/generatetoken";

/// Domain-scoped configuration API root; the domain UUID is appended.
pub const CONFIG_DOMAIN_PATH: &str = "api/fmc_config/v1/domain";

/// Response header carrying the access token on login.
pub const TOKEN_HEADER: &str = "X-auth-access-token";

/// Response header carrying the routing identifier on login.
pub const DOMAIN_UUID_HEADER: &str = "DOMAIN_UUID";

/// A login handshake producing a fresh session.
///
/// Implementations must not touch client state: the executor installs the
/// returned grant, and a failed login leaves the previous session in place.
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(
        &self,
        http: &reqwest::Client,
    ) -> impl Future<Output = Result<SessionGrant, Error>> + Send;
}

/// Username/password credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// Basic-auth login against the on-prem token endpoint.
///
/// `POST {host}/api/fmc_platform/v1/auth/generatetoken` answers
/// `204 No Content` with the token and domain UUID in response headers.
#[derive(Debug, Clone)]
pub struct BasicAuthenticator {
    host: Url,
    credentials: Credentials,
}

impl BasicAuthenticator {
    /// `host` may be a bare `host[:port]` (HTTPS implied) or a full URL.
    pub fn new(host: &str, credentials: Credentials) -> Result<Self, Error> {
        Ok(Self {
            host: normalize_host(host)?,
            credentials,
        })
    }

    pub fn host(&self) -> &Url {
        &self.host
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }
}

impl Authenticator for BasicAuthenticator {
    async fn authenticate(&self, http: &reqwest::Client) -> Result<SessionGrant, Error> {
        let url = self.host.join(TOKEN_PATH)?;
        debug!(%url, username = %self.credentials.username, "requesting access token");

        let resp = http
            .post(url)
            .basic_auth(
                &self.credentials.username,
                Some(self.credentials.password.expose_secret()),
            )
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: format!(
                    "invalid username or password for '{}'",
                    self.credentials.username
                ),
            });
        }
        if status != StatusCode::NO_CONTENT {
            let body = resp.text().await?;
            return Err(Error::LoginFailed {
                status: status.as_u16(),
                body,
            });
        }

        let headers = resp.headers();
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
                .ok_or_else(|| Error::LoginFailed {
                    status: status.as_u16(),
                    body: format!("login response is missing the {name} header"),
                })
        };
        let token = header(TOKEN_HEADER)?;
        let domain_uuid = header(DOMAIN_UUID_HEADER)?;

        Ok(SessionGrant {
            prefix: domain_prefix(&self.host, &domain_uuid)?,
            host: self.host.clone(),
            token: SecretString::from(token),
            domain_uuid,
        })
    }
}

/// `fmc.example.com` → `https://fmc.example.com/`; full URLs keep their
/// scheme and port but lose any path.
pub fn normalize_host(raw: &str) -> Result<Url, Error> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::Config {
            message: "FMC host must not be empty".into(),
        });
    }
    let mut url = if raw.contains("://") {
        Url::parse(raw)?
    } else {
        Url::parse(&format!("https://{raw}"))?
    };
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// `{host}/api/fmc_config/v1/domain/{domain_uuid}`
pub fn domain_prefix(host: &Url, domain_uuid: &str) -> Result<Url, Error> {
    Ok(host.join(&format!("{CONFIG_DOMAIN_PATH}/{domain_uuid}"))?)
}
