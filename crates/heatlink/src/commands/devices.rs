//! `heatlink devices` — list devices or show one in detail.

use tabled::Tabled;

use heatlink_core::{ControlState, Device};

use crate::cli::{DevicesAction, DevicesArgs, GlobalOpts};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "FAMILY")]
    family: &'static str,
    #[tabled(rename = "POWER")]
    power: String,
    #[tabled(rename = "TARGET")]
    target: String,
    #[tabled(rename = "CURRENT")]
    current: String,
    #[tabled(rename = "ZONES")]
    zones: String,
    #[tabled(rename = "STATE")]
    state: &'static str,
}

fn to_row(device: &Device) -> DeviceRow {
    let (power, target, current, zones) = match &device.displayed {
        ControlState::Ata(s) => (
            util::fmt_power(s.power),
            util::fmt_temp(s.target_temperature),
            util::fmt_temp(s.room_temperature),
            "—".to_owned(),
        ),
        ControlState::Atw(s) => (
            util::fmt_power(s.power),
            util::fmt_temp(s.tank_target_temperature),
            util::fmt_temp(s.tank_temperature),
            s.zones.len().to_string(),
        ),
    };
    DeviceRow {
        id: device.id.to_string(),
        name: device.name.clone().unwrap_or_else(|| "(unnamed)".into()),
        family: util::family_label(device.family),
        power,
        target,
        current,
        zones,
        state: util::availability_label(device),
    }
}

fn detail(device: &Device) -> String {
    let mut lines = vec![
        format!("Device:    {}", device.name.as_deref().unwrap_or("(unnamed)")),
        format!("Id:        {}", device.id),
        format!("Family:    {}", util::family_label(device.family)),
        format!("State:     {}", util::availability_label(device)),
    ];
    if let Some(ref mac) = device.mac {
        lines.push(format!("MAC:       {mac}"));
    }
    if let Some(ref serial) = device.serial {
        lines.push(format!("Serial:    {serial}"));
    }
    if !device.unit_models.is_empty() {
        lines.push(format!("Units:     {}", device.unit_models.join(", ")));
    }
    match &device.displayed {
        ControlState::Ata(s) => {
            lines.push(format!("Power:     {}", util::fmt_power(s.power)));
            lines.push(format!(
                "Mode:      {}",
                s.mode.map_or_else(|| "—".into(), |m| m.to_string())
            ));
            lines.push(format!("Target:    {}", util::fmt_temp(s.target_temperature)));
            lines.push(format!("Room:      {}", util::fmt_temp(s.room_temperature)));
            if let Some(fan) = s.fan_speed {
                lines.push(format!("Fan:       {fan}"));
            }
        }
        ControlState::Atw(s) => {
            lines.push(format!("Power:     {}", util::fmt_power(s.power)));
            lines.push(format!("Tank:      {}", util::fmt_temp(s.tank_temperature)));
            lines.push(format!(
                "Tank set:  {}",
                util::fmt_temp(s.tank_target_temperature)
            ));
            for zone in &s.zones {
                lines.push(format!(
                    "Zone {}:    {} (room {}, target {})",
                    zone.id.0,
                    zone.name.as_deref().unwrap_or("-"),
                    util::fmt_temp(zone.room_temperature),
                    util::fmt_temp(zone.target_temperature),
                ));
            }
        }
    }
    lines.join("\n")
}

pub async fn run(global: &GlobalOpts, args: DevicesArgs) -> Result<(), CliError> {
    let coordinator = util::connect(global).await?;

    match args.action.unwrap_or(DevicesAction::List) {
        DevicesAction::List => {
            let devices = coordinator.devices();
            let rendered = output::render_list(
                &global.output,
                devices.as_slice(),
                |d| to_row(d),
                |d| d.id.to_string(),
            );
            output::print_output(&rendered, global.quiet);
        }
        DevicesAction::Show { id } => {
            let device = coordinator
                .device(id)
                .ok_or_else(|| CliError::DeviceNotFound {
                    identifier: id.to_string(),
                })?;
            let rendered = output::render_single(
                &global.output,
                device.as_ref(),
                |d| detail(d),
                |d| d.id.to_string(),
            );
            output::print_output(&rendered, global.quiet);
        }
    }
    Ok(())
}
