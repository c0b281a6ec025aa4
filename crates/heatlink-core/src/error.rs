// ── Core error types ──
//
// User-facing errors from heatlink-core. Consumers never see HTTP status
// codes or JSON parse failures directly; the `From<heatlink_api::Error>`
// impl translates transport-layer errors into domain variants.
//
// `CoreError` is `Clone` because a single refresh outcome fans out to
// every caller attached to the in-flight cycle; transport errors are
// wrapped in `Arc` to stay cloneable.

use std::sync::Arc;

use thiserror::Error;

use crate::model::{DeviceId, Field};

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Transport ────────────────────────────────────────────────────
    /// Cloud call failed for non-auth reasons (network, rate limit,
    /// malformed payload). Periodic refresh retries these with backoff;
    /// they are never fatal to consumers.
    #[error("cloud transport error: {0}")]
    Transport(#[from] Arc<heatlink_api::Error>),

    /// Authentication rejected by the cloud service. Surfaced to the
    /// caller that triggered the refresh so re-authentication can be
    /// arranged; the scheduler itself keeps running.
    #[error("authentication failed: {message}")]
    AuthFailed { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    // ── Commands ─────────────────────────────────────────────────────
    /// A pending command expired before the cloud confirmed it. The
    /// optimistic value has been reverted to the confirmed state.
    #[error("command {field} for device {device} expired unconfirmed after {timeout_secs}s")]
    ReconciliationTimeout {
        device: DeviceId,
        field: Field,
        timeout_secs: u64,
    },

    #[error("device not found: {0}")]
    DeviceNotFound(DeviceId),

    #[error("field {field} does not apply to device {device}")]
    UnsupportedField { device: DeviceId, field: Field },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: Field, reason: String },

    // ── Lifecycle ────────────────────────────────────────────────────
    /// Operation attempted after `shutdown()`.
    #[error("coordinator has shut down")]
    Shutdown,
}

impl From<heatlink_api::Error> for CoreError {
    fn from(err: heatlink_api::Error) -> Self {
        if err.is_auth_failed() {
            Self::AuthFailed {
                message: err.to_string(),
            }
        } else {
            Self::Transport(Arc::new(err))
        }
    }
}

impl CoreError {
    /// Returns `true` if the periodic scheduler should keep retrying
    /// on its backoff schedule after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::AuthFailed { .. })
    }
}
