//! CLI configuration — thin wrapper around `heatlink_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--profile, --token).

use secrecy::SecretString;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use heatlink_config::{
    Config, Profile, config_path, load_config_or_default, save_config, validate_refresh_interval,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Resolve the access token: CLI flag first, then the shared chain
/// (env indirection, plaintext profile field).
pub fn resolve_token_with_flag(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
) -> Result<SecretString, CliError> {
    if let Some(ref token) = global.token {
        return Ok(SecretString::from(token.clone()));
    }
    heatlink_config::resolve_token(profile, profile_name).map_err(|_| CliError::NoToken {
        profile: profile_name.into(),
    })
}
