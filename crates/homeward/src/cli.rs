//! Clap derive structures for the `homeward` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// homeward -- talk to a home-automation hub from the command line
#[derive(Debug, Parser)]
#[command(
    name = "homeward",
    version,
    about = "Control a home-automation hub from the command line",
    long_about = "List device states, invoke actions and watch state changes over the\n\
        hub's authenticated websocket API.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Hub profile to use
    #[arg(long, short = 'p', env = "HOMEWARD_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Hub URL (overrides profile)
    #[arg(long, short = 'u', env = "HOMEWARD_URL", global = true)]
    pub url: Option<String>,

    /// Access token (overrides profile and HOMEWARD_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HOMEWARD_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "HOMEWARD_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List entity states
    #[command(alias = "ls")]
    States(StatesArgs),

    /// Show one entity's state and attributes
    Get {
        /// Entity id, e.g. light.kitchen
        entity_id: String,
    },

    /// Invoke an action, e.g. `call light turn_on light.kitchen`
    Call(CallArgs),

    /// Stream state changes until interrupted
    Watch(WatchArgs),

    /// Measure round-trip latency to the hub
    Ping,

    /// Manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Command Arguments ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatesArgs {
    /// Only entities of this category (e.g. light, sensor)
    #[arg(long, short = 'c')]
    pub category: Option<String>,
}

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Action category, e.g. light
    pub category: String,

    /// Action name, e.g. turn_on
    pub action: String,

    /// Target entity id
    pub target: Option<String>,

    /// Action parameters as a JSON object
    #[arg(long, short = 'd')]
    pub data: Option<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only changes for entities of this category
    #[arg(long, short = 'c')]
    pub category: Option<String>,

    /// Only changes for this entity
    #[arg(long, short = 'e')]
    pub entity: Option<String>,

    /// Exit after this many matching changes
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display current configuration (tokens masked)
    Show,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
