// FMC request executor
//
// The only component that touches the network. Every call runs the same
// pipeline: sign with the current token, wait on the token bucket, take a
// gate permit (plus the write lock for mutations), send, classify. 401
// triggers a re-login and a full replay; 429 backs off and replays through
// the bucket again.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{Authenticator, BasicAuthenticator};
use crate::config::{ClientConfig, RetryPolicy};
use crate::error::{Error, RetryReason};
use crate::gate::{ConcurrencyGate, GateStats};
use crate::limiter::TokenBucket;
use crate::request::Request;
use crate::session::{Session, SessionStore};

/// Async client for the FMC REST API.
///
/// Cheaply cloneable; clones share the session, the token bucket, the gate
/// and the write lock. Independently constructed clients share nothing.
pub struct FmcClient<A = BasicAuthenticator> {
    inner: Arc<ClientInner<A>>,
}

struct ClientInner<A> {
    http: reqwest::Client,
    authenticator: A,
    session: SessionStore,
    limiter: TokenBucket,
    gate: ConcurrencyGate,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl<A> Clone for FmcClient<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Outcome of one pass through the pipeline.
enum Attempt {
    Done(String),
    Unauthorized { stale_generation: u64 },
    Throttled { retry_after: Option<Duration> },
}

impl<A: Authenticator> FmcClient<A> {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build the HTTP client from `config.transport`. Does not log in; the
    /// first request (or [`login`](Self::login)) does.
    pub fn new(config: ClientConfig, authenticator: A) -> Result<Self, Error> {
        let http = config.transport.build_client()?;
        Self::with_client(http, &config, authenticator)
    }

    /// Use a pre-built `reqwest::Client`; `config.transport` is ignored.
    pub fn with_client(
        http: reqwest::Client,
        config: &ClientConfig,
        authenticator: A,
    ) -> Result<Self, Error> {
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                authenticator,
                session: SessionStore::new(),
                limiter: TokenBucket::new(config.rate_limit)?,
                gate: ConcurrencyGate::new(config.gate_capacity)?,
                retry: config.retry,
                cancel: CancellationToken::new(),
            }),
        })
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn authenticator(&self) -> &A {
        &self.inner.authenticator
    }

    /// The installed session, if a login has succeeded.
    pub fn session(&self) -> Option<Arc<Session>> {
        self.inner.session.current()
    }

    pub fn gate_stats(&self) -> GateStats {
        self.inner.gate.stats()
    }

    /// Tokens left in the rate-limit bucket. Never waits on the bucket.
    pub fn available_tokens(&self) -> u32 {
        self.inner.limiter.available()
    }

    /// A token cancelled by [`shutdown`](Self::shutdown); pass children of
    /// it to [`execute_with_cancel`](Self::execute_with_cancel).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.child_token()
    }

    /// Abort every waiting and in-flight request and refuse new ones.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.gate.close();
        debug!("client shut down");
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Log in unconditionally and install the new session.
    ///
    /// On failure the previous session (if any) stays installed.
    pub async fn login(&self) -> Result<Arc<Session>, Error> {
        let cancel = self.cancellation_token();
        let _guard = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            guard = self.inner.session.login_lock().lock() => guard,
        };
        self.authenticate(&cancel).await
    }

    /// Return a usable session, logging in when there is none or when the
    /// installed one is the `stale` generation that just got a 401.
    ///
    /// Logins are serialized; a caller that waited behind another caller's
    /// login reuses the result instead of logging in again.
    async fn ensure_session(
        &self,
        stale: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<Arc<Session>, Error> {
        let _guard = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            guard = self.inner.session.login_lock().lock() => guard,
        };

        if let Some(current) = self.inner.session.current() {
            if Some(current.generation()) != stale {
                debug!(
                    generation = current.generation(),
                    "session already refreshed by another caller"
                );
                return Ok(current);
            }
        }

        self.authenticate(cancel).await
    }

    /// The login call is a transport call like any other and pays a token.
    async fn authenticate(&self, cancel: &CancellationToken) -> Result<Arc<Session>, Error> {
        self.inner.limiter.acquire(1, cancel).await?;
        let grant = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            grant = self.inner.authenticator.authenticate(&self.inner.http) => grant?,
        };
        let session = self.inner.session.install(grant);
        info!(
            domain = session.domain_uuid(),
            generation = session.generation(),
            "authenticated"
        );
        Ok(session)
    }

    // ── Execution ────────────────────────────────────────────────────

    /// Execute `request` and decode the success body into `T`.
    ///
    /// An empty success body decodes as JSON `null`, so `()` and
    /// `Option<_>` work for endpoints that return nothing.
    pub async fn execute<T: DeserializeOwned>(&self, request: &Request) -> Result<T, Error> {
        self.execute_with_cancel(request, &self.cancellation_token())
            .await
    }

    /// [`execute`](Self::execute) with a caller-supplied cancellation token.
    pub async fn execute_with_cancel<T: DeserializeOwned>(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<T, Error> {
        let body = self.dispatch(request, cancel).await?;
        decode(&body)
    }

    /// Execute `request` and discard the success body.
    pub async fn send(&self, request: &Request) -> Result<(), Error> {
        self.dispatch(request, &self.cancellation_token())
            .await
            .map(|_| ())
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.execute(&Request::get(path)).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        self.execute(&Request::post(path, body)?).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        self.execute(&Request::put(path, body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), Error> {
        self.send(&Request::delete(path)).await
    }

    /// Run the pipeline until the request resolves, absorbing 401 and 429
    /// up to the retry ceiling. Returns the raw success body.
    async fn dispatch(&self, request: &Request, cancel: &CancellationToken) -> Result<String, Error> {
        let retry = self.inner.retry;
        let mut unauthorized = 0u32;
        let mut throttled = 0u32;

        loop {
            match self.attempt(request, cancel).await? {
                Attempt::Done(body) => return Ok(body),

                Attempt::Unauthorized { stale_generation } => {
                    unauthorized += 1;
                    if retry.unauthorized_exhausted(unauthorized) {
                        return Err(Error::RetriesExhausted {
                            reason: RetryReason::Unauthorized,
                            attempts: unauthorized - 1,
                        });
                    }
                    warn!(
                        attempt = unauthorized,
                        method = %request.method(),
                        "session rejected (HTTP 401), re-authenticating"
                    );
                    self.ensure_session(Some(stale_generation), cancel).await?;
                }

                Attempt::Throttled { retry_after } => {
                    throttled += 1;
                    if retry.throttled_exhausted(throttled) {
                        return Err(Error::RetriesExhausted {
                            reason: RetryReason::TooManyRequests,
                            attempts: throttled - 1,
                        });
                    }
                    let delay = retry.throttle_backoff(throttled, retry_after);
                    warn!(
                        attempt = throttled,
                        delay_ms = delay.as_millis(),
                        method = %request.method(),
                        "throttled (HTTP 429), backing off"
                    );
                    if !delay.is_zero() {
                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => return Err(Error::Cancelled),
                            () = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }
    }

    /// One pass: sign, limit, gate, send, classify. The gate permit lives
    /// for the duration of this call only.
    async fn attempt(&self, request: &Request, cancel: &CancellationToken) -> Result<Attempt, Error> {
        let inner = &*self.inner;

        let session = match inner.session.current() {
            Some(session) => session,
            None => self.ensure_session(None, cancel).await?,
        };
        let http_request = request.build(&inner.http, &session)?;

        inner.limiter.acquire(1, cancel).await?;
        let _permit = inner.gate.acquire(request.is_mutating(), cancel).await?;

        debug!(method = %http_request.method(), url = %http_request.url(), "sending request");
        let resp = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            resp = inner.http.execute(http_request) => resp?,
        };

        let status = resp.status();
        match status {
            StatusCode::UNAUTHORIZED => Ok(Attempt::Unauthorized {
                stale_generation: session.generation(),
            }),
            StatusCode::TOO_MANY_REQUESTS => Ok(Attempt::Throttled {
                retry_after: retry_after(resp.headers()),
            }),
            s if s == request.expected_status() => {
                let body = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(Error::Cancelled),
                    body = resp.text() => body?,
                };
                Ok(Attempt::Done(body))
            }
            _ => {
                let body = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(Error::Cancelled),
                    body = resp.text() => body?,
                };
                debug!(status = status.as_u16(), "unexpected status");
                Err(Error::from_api_body(status.as_u16(), body))
            }
        }
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    let text = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(text).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: body.to_owned(),
        }
    })
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use reqwest::header::{HeaderMap, HeaderValue};

    use super::*;

    #[test]
    fn empty_body_decodes_as_null() {
        decode::<()>("").unwrap();
        assert_eq!(decode::<Option<u32>>("  ").unwrap(), None);
        assert_eq!(decode::<serde_json::Value>("").unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn decode_failure_keeps_body() {
        let err = decode::<Vec<u32>>(r#"{"id":"abc"}"#).unwrap_err();
        match err {
            Error::Deserialization { body, .. } => assert_eq!(body, r#"{"id":"abc"}"#),
            other => panic!("expected Deserialization, got {other:?}"),
        }
    }

    #[test]
    fn retry_after_parses_seconds_only() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers), None);
    }
}
