//! Shared helpers for subcommands: coordinator construction and small
//! formatting utilities.

use std::sync::Arc;

use heatlink_api::{CloudClient, CloudTransport};
use heatlink_core::{
    Availability, ControlState, Coordinator, CoordinatorConfig, Device, DeviceFamily,
};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;

/// Build a coordinator from the active profile without fetching.
///
/// `interval_override` (from `watch --interval`) takes priority over the
/// profile's setting; both go through the same 1–60 validation.
pub fn build(global: &GlobalOpts, interval_override: Option<u64>) -> Result<Coordinator, CliError> {
    let cfg = config::load_config_or_default();
    let profile_name = config::active_profile_name(global, &cfg);
    let profile = cfg.profiles.get(&profile_name).cloned().unwrap_or_default();

    let token = config::resolve_token_with_flag(&profile, &profile_name, global)?;

    let interval_minutes = match interval_override {
        Some(minutes) => {
            config::validate_refresh_interval(minutes)?;
            minutes
        }
        None => profile.refresh_interval_minutes()?,
    };

    let client = CloudClient::new()?;
    client.set_token(token);

    let coordinator_config = CoordinatorConfig::new(interval_minutes)?;
    Ok(Coordinator::new(
        coordinator_config,
        Arc::new(client) as Arc<dyn CloudTransport>,
    ))
}

/// Build a coordinator and run one fetch cycle — the one-shot mode the
/// read/write subcommands use (no periodic loop).
pub async fn connect(global: &GlobalOpts) -> Result<Coordinator, CliError> {
    let coordinator = build(global, None)?;
    coordinator.request_refresh().await?;
    Ok(coordinator)
}

// ── Formatting helpers ──────────────────────────────────────────────

pub fn family_label(family: DeviceFamily) -> &'static str {
    match family {
        DeviceFamily::Ata => "ATA",
        DeviceFamily::Atw => "ATW",
    }
}

pub fn availability_label(device: &Device) -> &'static str {
    if device.reported_offline {
        return "offline";
    }
    match device.availability {
        Availability::Live => "live",
        Availability::Stale => "stale",
        Availability::Missing => "missing",
    }
}

pub fn fmt_temp(value: Option<f64>) -> String {
    value.map_or_else(|| "—".into(), |v| format!("{v:.1}°C"))
}

pub fn fmt_power(value: Option<bool>) -> String {
    match value {
        Some(true) => "on".into(),
        Some(false) => "off".into(),
        None => "—".into(),
    }
}

/// Short one-line summary of a device's displayed state.
pub fn summary(device: &Device) -> String {
    let name = device.name.as_deref().unwrap_or("(unnamed)");
    match &device.displayed {
        ControlState::Ata(s) => format!(
            "{} [{}] power={} mode={} target={} room={}",
            name,
            device.id,
            fmt_power(s.power),
            s.mode.map_or_else(|| "—".into(), |m| m.to_string()),
            fmt_temp(s.target_temperature),
            fmt_temp(s.room_temperature),
        ),
        ControlState::Atw(s) => {
            let zones = s
                .zones
                .iter()
                .map(|z| {
                    format!(
                        "{}:{}/{}",
                        z.id.0,
                        fmt_temp(z.room_temperature),
                        fmt_temp(z.target_temperature)
                    )
                })
                .collect::<Vec<_>>()
                .join(" ");
            format!(
                "{} [{}] power={} tank={}/{} zones: {}",
                name,
                device.id,
                fmt_power(s.power),
                fmt_temp(s.tank_temperature),
                fmt_temp(s.tank_target_temperature),
                zones,
            )
        }
    }
}
