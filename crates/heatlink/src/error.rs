//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` / `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use heatlink_config::ConfigError;
use heatlink_core::CoreError;

/// Exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(
        code(heatlink::auth_failed),
        help(
            "The stored access token was rejected by the cloud service.\n\
             Run: heatlink login"
        )
    )]
    AuthFailed {
        #[source]
        source: CoreError,
    },

    #[error("No access token configured for profile '{profile}'")]
    #[diagnostic(
        code(heatlink::no_token),
        help(
            "Log in first: heatlink login\n\
             Or set the HEATLINK_TOKEN environment variable."
        )
    )]
    NoToken { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Device '{identifier}' not found")]
    #[diagnostic(
        code(heatlink::not_found),
        help("List known devices with: heatlink devices list")
    )]
    DeviceNotFound { identifier: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid {field}: {reason}")]
    #[diagnostic(code(heatlink::validation))]
    Validation { field: String, reason: String },

    // ── Commands ─────────────────────────────────────────────────────
    #[error("Command was not confirmed by the cloud in time")]
    #[diagnostic(
        code(heatlink::command_timeout),
        help(
            "The optimistic value was reverted. The device may be offline\n\
             or another controller overwrote the setting."
        )
    )]
    CommandTimeout {
        #[source]
        source: CoreError,
    },

    // ── Everything else from core / config ───────────────────────────
    #[error("Cloud request failed")]
    #[diagnostic(
        code(heatlink::cloud),
        help("The cloud service is unreachable or rate-limiting. Try again later.")
    )]
    Cloud {
        #[source]
        source: CoreError,
    },

    #[error(transparent)]
    #[diagnostic(code(heatlink::config))]
    Config(#[from] ConfigError),

    #[error("{message}")]
    #[diagnostic(code(heatlink::general))]
    General { message: String },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AuthFailed { .. } | Self::NoToken { .. } => exit_code::AUTH,
            Self::DeviceNotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            Self::CommandTimeout { .. } => exit_code::TIMEOUT,
            Self::Cloud { .. } => exit_code::CONNECTION,
            Self::Config(ConfigError::Validation { .. }) => exit_code::USAGE,
            Self::Config(ConfigError::NoToken { .. }) => exit_code::AUTH,
            Self::Config(_) | Self::General { .. } => exit_code::GENERAL,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthFailed { .. } => Self::AuthFailed { source: err },
            CoreError::DeviceNotFound(id) => Self::DeviceNotFound {
                identifier: id.to_string(),
            },
            CoreError::Validation { ref field, ref reason } => Self::Validation {
                field: field.clone(),
                reason: reason.clone(),
            },
            CoreError::InvalidValue { ref field, ref reason } => Self::Validation {
                field: field.to_string(),
                reason: reason.clone(),
            },
            CoreError::UnsupportedField { device, field } => Self::Validation {
                field: field.to_string(),
                reason: format!("not supported by device {device}"),
            },
            CoreError::ReconciliationTimeout { .. } => Self::CommandTimeout { source: err },
            CoreError::Transport(_) | CoreError::Shutdown => Self::Cloud { source: err },
        }
    }
}

impl From<heatlink_api::Error> for CliError {
    fn from(err: heatlink_api::Error) -> Self {
        CoreError::from(err).into()
    }
}
