use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the `heatlink-api` crate.
///
/// Covers every failure mode of the cloud transport: authentication,
/// rate limiting, network transport, and payload decoding.
/// `heatlink-core` maps these into its own user-facing variants.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected or context key expired/invalid (HTTP 401 or a
    /// non-null `ErrorId` in the login response).
    #[error("Authentication failed: {message}")]
    AuthFailed { message: String },

    // ── Rate limiting ───────────────────────────────────────────────
    /// The cloud service throttled the request (HTTP 429).
    #[error("Rate limited by the cloud service")]
    RateLimited { retry_after: Option<Duration> },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Network(#[from] reqwest::Error),

    /// URL construction error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Data ────────────────────────────────────────────────────────
    /// Response body did not match the expected shape. Carries a body
    /// preview for debugging.
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String, body: String },

    // ── Service ─────────────────────────────────────────────────────
    /// Any other non-success HTTP status from the service.
    #[error("Cloud API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Operation not expressible for this device.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl Error {
    /// Returns `true` if re-authentication might resolve this error.
    pub fn is_auth_failed(&self) -> bool {
        matches!(self, Self::AuthFailed { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
