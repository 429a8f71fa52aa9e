// ── Request descriptor ──
//
// One API call: method, target, optional JSON body, and the status code
// that counts as success. Built by callers, consumed by the executor,
// rebuilt into a fresh `reqwest::Request` on every retry.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use url::Url;

use crate::error::Error;
use crate::session::Session;

/// Header carrying the session token on every authenticated request.
pub const ACCESS_TOKEN_HEADER: &str = "X-auth-access-token";

#[derive(Debug, Clone)]
enum Target {
    /// Path under the session's domain prefix.
    Domain(String),
    /// Fully-qualified URL (platform endpoints outside the domain prefix).
    Absolute(Url),
}

#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: Target,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    expected: StatusCode,
}

impl Request {
    /// A request against a path under the domain prefix.
    ///
    /// The expected status defaults to `201 Created` for POST and
    /// `200 OK` for everything else.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let expected = default_expected(&method);
        Self {
            method,
            target: Target::Domain(path.into()),
            query: Vec::new(),
            body: None,
            expected,
        }
    }

    /// A request against a fully-qualified URL. The session token is still
    /// attached.
    pub fn absolute(method: Method, url: Url) -> Self {
        let expected = default_expected(&method);
        Self {
            method,
            target: Target::Absolute(url),
            query: Vec::new(),
            body: None,
            expected,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn post(path: impl Into<String>, body: &impl Serialize) -> Result<Self, Error> {
        Self::new(Method::POST, path).json(body)
    }

    pub fn put(path: impl Into<String>, body: &impl Serialize) -> Result<Self, Error> {
        Self::new(Method::PUT, path).json(body)
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: &impl Serialize) -> Result<Self, Error> {
        self.body = Some(serde_json::to_value(body).map_err(|e| Error::Config {
            message: format!("request body is not serializable: {e}"),
        })?);
        Ok(self)
    }

    /// Append a query parameter (`filter=name:fw1`, `expanded=true`, ...).
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Override the status code treated as success.
    pub fn expect(mut self, status: StatusCode) -> Self {
        self.expected = status;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn expected_status(&self) -> StatusCode {
        self.expected
    }

    /// Anything other than GET/HEAD/OPTIONS must hold the write lock.
    pub fn is_mutating(&self) -> bool {
        !matches!(self.method, Method::GET | Method::HEAD | Method::OPTIONS)
    }

    /// Resolve the target URL against `session`, query string included.
    pub fn url(&self, session: &Session) -> Result<Url, Error> {
        let mut url = match &self.target {
            Target::Domain(path) => session.url_for(path)?,
            Target::Absolute(url) => url.clone(),
        };
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        Ok(url)
    }

    /// Build the transport request, signing it with a snapshot of the
    /// session token.
    pub(crate) fn build(
        &self,
        http: &reqwest::Client,
        session: &Session,
    ) -> Result<reqwest::Request, Error> {
        let mut builder = http
            .request(self.method.clone(), self.url(session)?)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(ACCESS_TOKEN_HEADER, session.token().expose_secret());
        if let Some(body) = &self.body {
            builder = builder.json(body);
        }
        Ok(builder.build()?)
    }
}

fn default_expected(method: &Method) -> StatusCode {
    if *method == Method::POST {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}
