//! CLI configuration -- thin wrapper around `lockward_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--api-url, --subscription, --token, ...).

use std::time::Duration;

use secrecy::SecretString;

use lockward_core::ServiceConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use lockward_config::{
    Config, Profile, config_path, load_config_or_default, save_config, store_token,
};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build a `ServiceConfig` from the config file, active profile and flags.
///
/// Flags override profile values. Without a matching profile, `--api-url`
/// and `--subscription` are enough on their own.
pub fn build_service_config(global: &GlobalOpts) -> Result<ServiceConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
            names.sort();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if names.is_empty() {
                    "(none)".into()
                } else {
                    names.join(", ")
                },
            });
        }
        None => {
            if global.api_url.is_none() && global.subscription.is_none() {
                return Err(CliError::NoConfig {
                    path: config_path().display().to_string(),
                });
            }
            Profile {
                api_url: "https://api.simplisafe.com/v1".into(),
                ..Profile::default()
            }
        }
    };

    let profile = apply_overrides(profile, global);
    let token = resolve_token_with_flag(&profile, &profile_name, global)?;
    let mut service = lockward_config::build_service_config(&profile, token, &cfg.defaults)?;

    if let Some(secs) = global.timeout {
        service.timeout = Duration::from_secs(secs);
    }
    service.accept_invalid_certs |= global.insecure;
    Ok(service)
}

fn apply_overrides(mut profile: Profile, global: &GlobalOpts) -> Profile {
    if let Some(ref url) = global.api_url {
        profile.api_url.clone_from(url);
    }
    if let Some(ref url) = global.events_url {
        profile.events_url = Some(url.clone());
    }
    if let Some(ref sub) = global.subscription {
        profile.subscription_id.clone_from(sub);
    }
    profile
}

/// Resolve the token with the CLI flag first, then the shared chain.
fn resolve_token_with_flag(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
) -> Result<SecretString, CliError> {
    if let Some(ref token) = global.token {
        return Ok(SecretString::from(token.clone()));
    }
    Ok(lockward_config::resolve_token(profile, profile_name)?)
}
