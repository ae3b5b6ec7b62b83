//! Resolve global CLI flags plus the config file into a `HubConfig`.

use std::time::Duration;

use secrecy::SecretString;

use homeward_config::{Config, Profile, config_path, parse_url, profile_to_hub_config, resolve_token};
use homeward_core::HubConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Name of the profile this invocation uses, and whether it was asked for
/// explicitly (`--profile` / `HOMEWARD_PROFILE`).
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> (String, bool) {
    match global.profile {
        Some(ref name) => (name.clone(), true),
        None => (cfg.default_profile_name().to_owned(), false),
    }
}

/// Build the runtime hub config.
///
/// A matching profile supplies the base; `--url`, `--token` and `--timeout`
/// override it. Without a profile, `--url` alone is enough as long as a
/// token is available from `--token` or `HOMEWARD_TOKEN`.
pub fn build_hub_config(global: &GlobalOpts, cfg: &Config) -> Result<HubConfig, CliError> {
    let (name, explicit) = active_profile_name(global, cfg);

    let (profile, name) = match cfg.profiles.get(&name) {
        Some(profile) => (profile.clone(), name),
        None if explicit => {
            let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            available.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        None => {
            let Some(ref url) = global.url else {
                return Err(CliError::NoConfig {
                    path: config_path().display().to_string(),
                });
            };
            let adhoc = Profile {
                url: url.clone(),
                ..Profile::default()
            };
            (adhoc, "(command line)".to_owned())
        }
    };

    let token = match global.token {
        Some(ref token) => SecretString::from(token.clone()),
        None => resolve_token(&profile, &name)?,
    };

    let mut hub = profile_to_hub_config(&profile, &cfg.defaults, token)?;

    if let Some(ref url) = global.url {
        hub.url = parse_url(url)?;
    }
    if let Some(secs) = global.timeout {
        if secs == 0 {
            return Err(CliError::Validation {
                field: "timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        hub.request_timeout = Duration::from_secs(secs);
    }

    tracing::debug!(profile = %name, url = %hub.url, "resolved hub config");
    Ok(hub)
}
