//! Clap derive structures for the `lockward` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// lockward -- keep smart lock state in sync from the command line
#[derive(Debug, Parser)]
#[command(
    name = "lockward",
    version,
    about = "Inspect and control SimpliSafe smart locks",
    long_about = "Reconciles smart lock state from the SimpliSafe cloud API.\n\n\
        Reads lock state, sends lock/unlock commands, and follows push\n\
        events to show state transitions as they happen.",
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
    /// Service profile to use
    #[arg(long, short = 'p', env = "LOCKWARD_PROFILE", global = true)]
    pub profile: Option<String>,

    /// API base URL (overrides profile)
    #[arg(long, env = "LOCKWARD_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Push-event WebSocket URL (overrides profile)
    #[arg(long, env = "LOCKWARD_EVENTS_URL", global = true)]
    pub events_url: Option<String>,

    /// Subscription the locks belong to (overrides profile)
    #[arg(long, short = 's', env = "LOCKWARD_SUBSCRIPTION", global = true)]
    pub subscription: Option<String>,

    /// Bearer token
    #[arg(long, env = "LOCKWARD_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
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

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "LOCKWARD_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "LOCKWARD_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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
    /// Show the state of every lock on the subscription
    #[command(alias = "ls")]
    Status,

    /// Lock a door
    Lock(LockArgs),

    /// Unlock a door
    Unlock(LockArgs),

    /// Show identity information for a lock
    Identify(LockArgs),

    /// Follow lock state changes until interrupted
    Watch(WatchArgs),

    /// Manage configuration profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct LockArgs {
    /// Lock serial number
    pub serial: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only follow this lock
    #[arg(long)]
    pub serial: Option<String>,

    /// Poll interval in seconds, 0 to disable (overrides profile)
    #[arg(long)]
    pub poll_interval: Option<u64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a profile to the config file
    Init {
        /// API base URL
        #[arg(long, default_value = "https://api.simplisafe.com/v1")]
        api_url: String,

        /// Push-event WebSocket URL
        #[arg(long)]
        events_url: Option<String>,

        /// Subscription ID
        #[arg(long)]
        subscription: String,

        /// Environment variable holding the token
        #[arg(long)]
        token_env: Option<String>,

        /// Make this the default profile
        #[arg(long)]
        default: bool,
    },

    /// Show the active profile (secrets redacted)
    Show,

    /// Print the config file path
    Path,

    /// Store a token in the system keyring (read from stdin)
    SetToken,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
