//! Config subcommand handlers. None of these touch the network.

use homeward_config::{self as config, Config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

const MASK: &str = "********";

/// Copy of `cfg` with every plaintext token replaced by a mask.
fn masked(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(MASK.into());
        }
    }
    cfg
}

fn profile_names(cfg: &Config) -> Vec<String> {
    let mut names: Vec<String> = cfg.profiles.keys().cloned().collect();
    names.sort();
    names
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = masked(&config::load_config()?);
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("{c:#?}\n# {e}")),
                |c| c.default_profile_name().to_owned(),
            );
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            let default = cfg.default_profile_name();
            let lines: Vec<String> = profile_names(&cfg)
                .into_iter()
                .map(|name| {
                    let marker = if name == default { "*" } else { " " };
                    let url = cfg.profiles.get(&name).map_or("", |p| p.url.as_str());
                    format!("{marker} {name}  {url}")
                })
                .collect();
            if lines.is_empty() && !global.quiet {
                eprintln!("No profiles configured ({})", config::config_path().display());
            }
            output::print_output(&lines.join("\n"), global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config()?;
            if !cfg.profiles.contains_key(&name) {
                let available = profile_names(&cfg);
                return Err(CliError::ProfileNotFound {
                    name,
                    available: if available.is_empty() {
                        "(none)".into()
                    } else {
                        available.join(", ")
                    },
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
            Ok(())
        }
    }
}
