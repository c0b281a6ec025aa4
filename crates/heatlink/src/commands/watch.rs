//! `heatlink watch` — run the polling coordinator and print change lines
//! until interrupted.

use chrono::Local;

use crate::cli::{GlobalOpts, WatchArgs};
use crate::commands::util;
use crate::error::CliError;

pub async fn run(global: &GlobalOpts, args: WatchArgs) -> Result<(), CliError> {
    let coordinator = util::build(global, args.interval)?;
    coordinator.start().await?;

    let mut rx = coordinator.watch_devices();
    let mut previous = rx.borrow().clone();

    if !global.quiet {
        println!(
            "watching {} device(s), refresh every {} min — ctrl-c to stop",
            previous.len(),
            coordinator.config().refresh_interval().as_secs() / 60,
        );
        for device in previous.iter() {
            println!("  {}", util::summary(device));
        }
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = rx.borrow_and_update().clone();
                for device in current.iter() {
                    let old = previous.iter().find(|d| d.id == device.id);
                    if old.is_none_or(|old| **old != **device) {
                        println!(
                            "{} {}",
                            Local::now().format("%H:%M:%S"),
                            util::summary(device)
                        );
                    }
                }
                previous = current;
            }
        }
    }

    coordinator.shutdown().await;
    Ok(())
}
