//! Configuration for the homeward CLI.
//!
//! TOML profiles, token resolution (env + plaintext), and translation to
//! `homeward_core::HubConfig`. The CLI adds flag-aware wrappers on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use homeward_core::{Backoff, HubConfig};

/// Environment variable consulted for the token when a profile names none.
pub const TOKEN_ENV: &str = "HOMEWARD_TOKEN";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "HOMEWARD_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("no token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named hub profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds between reconnect attempts.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: u64,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            reconnect_delay: default_reconnect_delay(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_reconnect_delay() -> u64 {
    5
}
fn default_max_reconnect_attempts() -> u32 {
    10
}

/// Reconnect delay strategy as written in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffMode {
    #[default]
    Fixed,
    Exponential,
}

/// A named hub profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Hub URL (e.g., "http://homeassistant.local:8123").
    pub url: String,

    /// Access token (plaintext -- prefer `token_env`).
    pub token: Option<String>,

    /// Environment variable name containing the access token.
    pub token_env: Option<String>,

    /// Override request timeout (seconds).
    pub timeout: Option<u64>,

    /// Override reconnect delay (seconds).
    pub reconnect_delay: Option<u64>,

    /// Override maximum consecutive reconnect attempts.
    pub max_reconnect_attempts: Option<u32>,

    #[serde(default)]
    pub backoff: BackoffMode,

    /// Ceiling for exponential backoff (seconds). Default: 300.
    pub max_reconnect_delay: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `HOMEWARD_CONFIG`, else platform conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }

    ProjectDirs::from("dev", "homeward", "homeward").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("homeward");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path`, layered over defaults and under `HOMEWARD_`
/// environment variables (`__` separates nested keys, e.g.
/// `HOMEWARD_DEFAULTS__TIMEOUT`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("HOMEWARD_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or is invalid.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile lookup ──────────────────────────────────────────────────

impl Config {
    /// Name of the profile to use when none is requested explicitly.
    pub fn default_profile_name(&self) -> &str {
        self.default_profile.as_deref().unwrap_or("default")
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

// ── Token resolution ────────────────────────────────────────────────

/// Resolve the access token from the process environment and the profile.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_token_with(profile, profile_name, |name| std::env::var(name).ok())
}

/// Token resolution chain with an injectable environment lookup:
/// 1. the variable named by `token_env`
/// 2. `HOMEWARD_TOKEN`
/// 3. plaintext `token`
pub fn resolve_token_with<F>(
    profile: &Profile,
    profile_name: &str,
    env: F,
) -> Result<SecretString, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(ref env_name) = profile.token_env {
        if let Some(val) = env(env_name).filter(|v| !v.is_empty()) {
            return Ok(SecretString::from(val));
        }
    }

    if let Some(val) = env(TOKEN_ENV).filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(val));
    }

    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Translation to runtime config ───────────────────────────────────

/// Parse and sanity-check a hub URL.
pub fn parse_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    match url.scheme() {
        "ws" | "wss" | "http" | "https" => Ok(url),
        other => Err(ConfigError::Validation {
            field: "url".into(),
            reason: format!("unsupported scheme '{other}' (use http, https, ws or wss)"),
        }),
    }
}

/// Build a `HubConfig` from a profile and the global defaults, with an
/// already-resolved token.
pub fn profile_to_hub_config(
    profile: &Profile,
    defaults: &Defaults,
    token: SecretString,
) -> Result<HubConfig, ConfigError> {
    let url = parse_url(&profile.url)?;

    let timeout = profile.timeout.unwrap_or(defaults.timeout);
    if timeout == 0 {
        return Err(ConfigError::Validation {
            field: "timeout".into(),
            reason: "must be at least 1 second".into(),
        });
    }

    let mut cfg = HubConfig::new(url, token);
    cfg.request_timeout = Duration::from_secs(timeout);
    cfg.reconnect_delay =
        Duration::from_secs(profile.reconnect_delay.unwrap_or(defaults.reconnect_delay));
    cfg.max_reconnect_attempts = profile
        .max_reconnect_attempts
        .unwrap_or(defaults.max_reconnect_attempts);
    cfg.backoff = match profile.backoff {
        BackoffMode::Fixed => Backoff::Fixed,
        BackoffMode::Exponential => Backoff::Exponential {
            max_delay: Duration::from_secs(profile.max_reconnect_delay.unwrap_or(300)),
        },
    };
    Ok(cfg)
}
