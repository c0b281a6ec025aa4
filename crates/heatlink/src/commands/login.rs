//! `heatlink login` — exchange account credentials for an access token
//! and store it in the active profile.

use dialoguer::Input;
use secrecy::{ExposeSecret, SecretString};

use heatlink_api::CloudClient;

use crate::cli::{GlobalOpts, LoginArgs};
use crate::config;
use crate::error::CliError;

pub async fn run(global: &GlobalOpts, args: LoginArgs) -> Result<(), CliError> {
    let email = match args.email {
        Some(email) => email,
        None => Input::new()
            .with_prompt("Email")
            .interact_text()
            .map_err(|e| CliError::General {
                message: format!("prompt failed: {e}"),
            })?,
    };

    let password = rpassword::prompt_password("Password: ").map_err(|e| CliError::General {
        message: format!("password prompt failed: {e}"),
    })?;
    let password = SecretString::from(password);

    let client = CloudClient::new()?;
    let token = client.login(&email, &password).await?;

    let mut cfg = config::load_config_or_default();
    let name = config::active_profile_name(global, &cfg);
    let profile = cfg.profiles.entry(name.clone()).or_default();
    profile.email = Some(email);
    profile.token = Some(token.expose_secret().to_owned());
    config::save_config(&cfg)?;

    if !global.quiet {
        println!(
            "logged in — token saved to profile '{name}' ({})",
            config::config_path().display()
        );
    }
    Ok(())
}
