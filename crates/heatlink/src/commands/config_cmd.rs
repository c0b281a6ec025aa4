//! `heatlink config` — inspect and edit the configuration file.

use crate::cli::{ConfigAction, ConfigArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;

pub fn run(global: &GlobalOpts, args: ConfigArgs) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Path => {
            println!("{}", config::config_path().display());
        }

        ConfigAction::Show => {
            let cfg = config::load_config_or_default();
            let active = config::active_profile_name(global, &cfg);
            if cfg.profiles.is_empty() {
                println!("no profiles configured — run: heatlink login");
                return Ok(());
            }
            for (name, profile) in &cfg.profiles {
                let marker = if *name == active { "*" } else { " " };
                println!("{marker} {name}");
                if let Some(ref email) = profile.email {
                    println!("    email:    {email}");
                }
                println!(
                    "    token:    {}",
                    if profile.token.is_some() || profile.token_env.is_some() {
                        "configured"
                    } else {
                        "missing"
                    }
                );
                println!(
                    "    interval: {} min",
                    profile
                        .refresh_interval_minutes
                        .unwrap_or(heatlink_config::DEFAULT_REFRESH_INTERVAL_MINUTES)
                );
            }
        }

        ConfigAction::SetInterval { minutes } => {
            // Reject before touching the file — never clamp.
            config::validate_refresh_interval(minutes)?;

            let mut cfg = config::load_config_or_default();
            let name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(name.clone()).or_default();
            profile.refresh_interval_minutes = Some(minutes);
            config::save_config(&cfg)?;

            if !global.quiet {
                println!("profile '{name}': refresh interval set to {minutes} min");
            }
        }
    }
    Ok(())
}
