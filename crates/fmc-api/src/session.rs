// ── Session state ──
//
// Token + domain-scoped URL prefix obtained from a login. A session is
// installed wholesale by the authenticator and never mutated in place;
// readers take an `Arc` snapshot without locking.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use secrecy::SecretString;
use tokio::sync::Mutex;
use url::Url;

use crate::error::Error;

/// What a successful login hands back to the executor.
#[derive(Debug, Clone)]
pub struct SessionGrant {
    /// Appliance base URL (`https://fmc.example.com`).
    pub host: Url,
    /// Authenticated origin every request path is appended to
    /// (`https://fmc.example.com/api/fmc_config/v1/domain/{uuid}`).
    pub prefix: Url,
    /// Bearer token sent as `X-auth-access-token`.
    pub token: SecretString,
    /// Server-assigned routing identifier the prefix was built from.
    pub domain_uuid: String,
}

/// An installed session.
#[derive(Debug)]
pub struct Session {
    host: Url,
    prefix: Url,
    token: SecretString,
    domain_uuid: String,
    generation: u64,
}

impl Session {
    pub fn host(&self) -> &Url {
        &self.host
    }

    pub fn prefix(&self) -> &Url {
        &self.prefix
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn domain_uuid(&self) -> &str {
        &self.domain_uuid
    }

    /// Install counter. Strictly increases with every successful login.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Resolve a request path against the domain prefix.
    ///
    /// `"object/networks"` and `"/object/networks"` both become
    /// `{prefix}/object/networks`.
    pub fn url_for(&self, path: &str) -> Result<Url, Error> {
        let base = self.prefix.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return Ok(Url::parse(base)?);
        }
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }
}

/// Shared holder for the current session plus the lock that serializes
/// logins.
pub(crate) struct SessionStore {
    current: ArcSwapOption<Session>,
    next_generation: AtomicU64,
    login_lock: Mutex<()>,
}

impl SessionStore {
    pub(crate) fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
            next_generation: AtomicU64::new(1),
            login_lock: Mutex::new(()),
        }
    }

    pub(crate) fn current(&self) -> Option<Arc<Session>> {
        self.current.load_full()
    }

    pub(crate) fn login_lock(&self) -> &Mutex<()> {
        &self.login_lock
    }

    /// Replace the current session with one built from `grant`.
    pub(crate) fn install(&self, grant: SessionGrant) -> Arc<Session> {
        let session = Arc::new(Session {
            host: grant.host,
            prefix: grant.prefix,
            token: grant.token,
            domain_uuid: grant.domain_uuid,
            generation: self.next_generation.fetch_add(1, Ordering::AcqRel),
        });
        self.current.store(Some(Arc::clone(&session)));
        session
    }
}
