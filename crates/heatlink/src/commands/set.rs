//! `heatlink set` — write device settings through the command queue.

use std::time::Duration;

use owo_colors::OwoColorize;

use heatlink_core::{CommandOutcome, CommandReceipt, CoreError, Field, SettingValue};

use crate::cli::{GlobalOpts, PowerArg, SetArgs};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

/// How long to wait for the confirming fetch before reporting a command
/// as still pending. Purely a CLI patience knob — the command itself
/// lives until the coordinator's confirmation timeout.
const CONFIRM_WAIT: Duration = Duration::from_secs(5);

pub async fn run(global: &GlobalOpts, args: SetArgs) -> Result<(), CliError> {
    let coordinator = util::connect(global).await?;

    let mut writes: Vec<(Field, SettingValue)> = Vec::new();
    if let Some(power) = args.power {
        writes.push((
            Field::Power,
            SettingValue::Bool(matches!(power, PowerArg::On)),
        ));
    }
    if let Some(mode) = args.mode {
        writes.push((Field::Mode, SettingValue::Mode(mode)));
    }
    if let Some(temp) = args.temp {
        writes.push((Field::TargetTemperature, SettingValue::Temperature(temp)));
    }
    if let Some(fan) = args.fan {
        writes.push((Field::FanSpeed, SettingValue::Step(fan)));
    }
    if let Some(tank) = args.tank_temp {
        writes.push((
            Field::TankTargetTemperature,
            SettingValue::Temperature(tank),
        ));
    }

    if writes.is_empty() {
        return Err(CliError::Validation {
            field: "set".into(),
            reason: "nothing to write — pass at least one of --power/--mode/--temp/--fan/--tank-temp".into(),
        });
    }

    let mut receipts: Vec<(Field, SettingValue, CommandReceipt)> = Vec::new();
    for (field, value) in writes {
        // Only the per-zone ATW setpoint takes the zone; everything else
        // is device-scoped.
        let zone = if field == Field::TargetTemperature {
            args.zone
        } else {
            None
        };
        let receipt = coordinator.enqueue(args.id, zone, field, value).await?;
        receipts.push((field, value, receipt));
    }

    // One confirming fetch; anything the cloud already reflects resolves
    // its receipt here.
    coordinator.request_refresh().await?;

    let color = output::should_color(&global.color);
    for (field, value, receipt) in receipts {
        let status = match tokio::time::timeout(CONFIRM_WAIT, receipt.outcome()).await {
            Ok(Ok(CommandOutcome::Confirmed)) => {
                if color {
                    "confirmed".green().to_string()
                } else {
                    "confirmed".into()
                }
            }
            Ok(Ok(CommandOutcome::Superseded)) => "superseded".into(),
            Ok(Err(CoreError::ReconciliationTimeout { .. })) => {
                if color {
                    "timed out".red().to_string()
                } else {
                    "timed out".into()
                }
            }
            Ok(Err(e)) => return Err(e.into()),
            // Receipt unresolved: the write is out, confirmation arrives
            // on a later refresh.
            Err(_) => "pending confirmation".into(),
        };
        if !global.quiet {
            println!("{} {field} = {value}: {status}", args.id);
        }
    }

    coordinator.shutdown().await;
    Ok(())
}
