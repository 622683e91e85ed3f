//! Config subcommand handlers.

use std::io::{self, BufRead, IsTerminal};

use secrecy::SecretString;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking the token.
fn format_config_redacted(cfg: &Config, active: &str) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "poll_interval = {}", cfg.defaults.poll_interval);
    let _ = writeln!(out, "rate_limit_backoff = {}", cfg.defaults.rate_limit_backoff);

    let Some(p) = cfg.profiles.get(active) else {
        let _ = writeln!(out);
        let _ = writeln!(out, "# profile '{active}' is not defined");
        return out;
    };
    let _ = writeln!(out);
    let _ = writeln!(out, "[profiles.{active}]");
    let _ = writeln!(out, "api_url = \"{}\"", p.api_url);
    if let Some(ref url) = p.events_url {
        let _ = writeln!(out, "events_url = \"{url}\"");
    }
    let _ = writeln!(out, "subscription_id = \"{}\"", p.subscription_id);
    if p.token.is_some() {
        let _ = writeln!(out, "token = \"****\"");
    }
    if let Some(ref env) = p.token_env {
        let _ = writeln!(out, "token_env = \"{env}\"");
    }
    if let Some(insecure) = p.insecure {
        let _ = writeln!(out, "insecure = {insecure}");
    }
    if let Some(timeout) = p.timeout {
        let _ = writeln!(out, "timeout = {timeout}");
    }
    if let Some(poll) = p.poll_interval {
        let _ = writeln!(out, "poll_interval = {poll}");
    }

    out
}

fn read_token() -> Result<SecretString, CliError> {
    let token = if io::stdin().is_terminal() {
        rpassword::prompt_password("Token: ")?
    } else {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        line
    };

    let token = token.trim();
    if token.is_empty() {
        return Err(CliError::Validation {
            field: "token".into(),
            reason: "must not be empty".into(),
        });
    }
    Ok(SecretString::from(token.to_owned()))
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load_config_or_default();
    let profile_name = config::active_profile_name(global, &cfg);

    match args.command {
        ConfigCommand::Init {
            api_url,
            events_url,
            subscription,
            token_env,
            default,
        } => {
            let profile = Profile {
                api_url,
                events_url,
                subscription_id: subscription,
                token_env,
                ..Profile::default()
            };
            // Validate before writing anything.
            lockward_config::parse_url("api_url", &profile.api_url)?;
            if let Some(ref url) = profile.events_url {
                lockward_config::parse_url("events_url", url)?;
            }

            cfg.profiles.insert(profile_name.clone(), profile);
            if default || cfg.profiles.len() == 1 {
                cfg.default_profile = Some(profile_name.clone());
            }
            let path = config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Profile '{profile_name}' written to {}", path.display());
            }
            Ok(())
        }

        ConfigCommand::Show => {
            output::print_output(&format_config_redacted(&cfg, &profile_name), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::SetToken => {
            let token = read_token()?;
            config::store_token(&profile_name, &token)?;
            if !global.quiet {
                eprintln!("Token stored in system keyring for profile '{profile_name}'");
            }
            Ok(())
        }
    }
}
