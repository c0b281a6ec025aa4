//! Shared configuration for the heatlink binaries.
//!
//! TOML profiles (account email, access token, refresh interval), token
//! resolution (env-var indirection before plaintext), and the
//! refresh-interval range check. The interval is validated here, at the
//! configuration boundary, before any coordinator exists — bad input is
//! rejected with a [`ConfigError::Validation`], never clamped.

use std::collections::HashMap;
use std::path::PathBuf;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Valid refresh interval range in minutes, inclusive.
pub const MIN_REFRESH_INTERVAL_MINUTES: u64 = 1;
pub const MAX_REFRESH_INTERVAL_MINUTES: u64 = 60;

/// Interval used when a profile doesn't set one.
pub const DEFAULT_REFRESH_INTERVAL_MINUTES: u64 = 15;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no access token configured for profile '{profile}'")]
    NoToken { profile: String },

    #[error("unknown profile '{profile}'")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

/// A named account profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Account email the token was issued for.
    pub email: Option<String>,

    /// Access token (plaintext — prefer `token_env`).
    pub token: Option<String>,

    /// Environment variable name containing the access token.
    pub token_env: Option<String>,

    /// Refresh interval in minutes, 1–60 inclusive.
    pub refresh_interval_minutes: Option<u64>,
}

impl Profile {
    /// Validated refresh interval in minutes.
    ///
    /// Returns the default when unset; out-of-range values are rejected
    /// here so no scheduler state is ever built from them.
    pub fn refresh_interval_minutes(&self) -> Result<u64, ConfigError> {
        let minutes = self
            .refresh_interval_minutes
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_MINUTES);
        validate_refresh_interval(minutes)?;
        Ok(minutes)
    }
}

/// Check a refresh interval against the allowed 1–60 minute range.
pub fn validate_refresh_interval(minutes: u64) -> Result<(), ConfigError> {
    if (MIN_REFRESH_INTERVAL_MINUTES..=MAX_REFRESH_INTERVAL_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(ConfigError::Validation {
            field: "refresh_interval_minutes".into(),
            reason: format!(
                "expected {MIN_REFRESH_INTERVAL_MINUTES}-{MAX_REFRESH_INTERVAL_MINUTES} minutes, got {minutes}"
            ),
        })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "heatlink", "heatlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("heatlink");
    p
}

// ── Config loading / saving ─────────────────────────────────────────

/// Load the full Config from file + `HEATLINK_*` environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit path (tests, `--config` overrides).
pub fn load_config_from(path: &std::path::Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("HEATLINK_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning defaults if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

/// Save to an explicit path.
pub fn save_config_to(cfg: &Config, path: &std::path::Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution ────────────────────────────────────────────────

/// Resolve the access token for a profile.
///
/// Order: the profile's `token_env` environment indirection, then the
/// plaintext `token` field.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoToken {
        profile: profile_name.into(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn profile(minutes: Option<u64>) -> Profile {
        Profile {
            email: Some("user@example.com".into()),
            token: Some("ctx-abc".into()),
            token_env: None,
            refresh_interval_minutes: minutes,
        }
    }

    #[test]
    fn interval_defaults_when_unset() {
        assert_eq!(profile(None).refresh_interval_minutes().unwrap(), 15);
    }

    #[test]
    fn interval_bounds_are_inclusive() {
        assert_eq!(profile(Some(1)).refresh_interval_minutes().unwrap(), 1);
        assert_eq!(profile(Some(60)).refresh_interval_minutes().unwrap(), 60);
    }

    #[test]
    fn out_of_range_interval_is_a_validation_error() {
        for bad in [0, 61, 90] {
            let err = profile(Some(bad)).refresh_interval_minutes().unwrap_err();
            assert!(matches!(err, ConfigError::Validation { .. }), "{bad}");
        }
    }

    #[test]
    fn token_resolution_prefers_env_indirection() {
        let mut p = profile(None);
        p.token_env = Some("HEATLINK_TEST_TOKEN_UNSET".into());
        // Env var not set: falls through to plaintext.
        let token = resolve_token(&p, "default").unwrap();
        assert_eq!(secrecy::ExposeSecret::expose_secret(&token), "ctx-abc");
    }

    #[test]
    fn missing_token_is_an_error() {
        let p = Profile::default();
        assert!(matches!(
            resolve_token(&p, "default"),
            Err(ConfigError::NoToken { .. })
        ));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.profiles.insert("home".into(), profile(Some(30)));
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        let p = loaded.profile("home").unwrap();
        assert_eq!(p.refresh_interval_minutes, Some(30));
        assert_eq!(p.email.as_deref(), Some("user@example.com"));
    }
}
