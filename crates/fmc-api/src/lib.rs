// fmc-api: Session-authenticated, rate-limited request engine for Cisco FMC

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod gate;
pub mod limiter;
pub mod request;
pub mod session;
pub mod transport;

pub use auth::{Authenticator, BasicAuthenticator, Credentials};
pub use client::FmcClient;
pub use config::{ClientConfig, RetryPolicy};
pub use error::{Error, ErrorDetail, ErrorMessage, RetryReason};
pub use gate::{ConcurrencyGate, GatePermit, GateStats};
pub use limiter::{RateLimitConfig, TokenBucket};
pub use request::{ACCESS_TOKEN_HEADER, Request};
pub use session::{Session, SessionGrant};
pub use transport::{TlsMode, TransportConfig};

// Callers build requests with these; re-exported so they don't need a
// direct reqwest dependency.
pub use reqwest::{Method, StatusCode};
pub use tokio_util::sync::CancellationToken;
