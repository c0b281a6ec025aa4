//! `heatlink vane` — out-of-band vane positioning for air-to-air units.
//!
//! Thin wrappers over the coordinator's fixed-field vane commands;
//! fire-and-forget, so the receipt is dropped deliberately.

use crate::cli::{GlobalOpts, VaneArgs, VaneAxis};
use crate::commands::util;
use crate::error::CliError;

pub async fn run(global: &GlobalOpts, args: VaneArgs) -> Result<(), CliError> {
    let coordinator = util::connect(global).await?;

    let _receipt = match args.axis {
        VaneAxis::Horizontal => {
            coordinator
                .set_vane_horizontal(args.id, args.position)
                .await?
        }
        VaneAxis::Vertical => coordinator.set_vane_vertical(args.id, args.position).await?,
    };

    if !global.quiet {
        println!(
            "{}: vane {:?} -> {}",
            args.id,
            args.axis,
            args.position
        );
    }

    coordinator.shutdown().await;
    Ok(())
}
