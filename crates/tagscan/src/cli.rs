//! Clap derive structures for the `tagscan` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tagscan -- handheld RFID scanning from the command line
#[derive(Debug, Parser)]
#[command(
    name = "tagscan",
    version,
    about = "Scan RFID tags and report them to the inventory backend",
    long_about = "Runs a handheld scan session against a reader, tracks every tag seen,\n\
        and forwards sampled sightings to the inventory backend.\n\n\
        Without vendor hardware attached, `scan` drives a simulated reader.",
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
    /// Backend API root (overrides config), e.g. http://localhost:3001/api
    #[arg(long, short = 'b', env = "TAGSCAN_BACKEND_URL", global = true)]
    pub backend: Option<String>,

    /// Request timeout in seconds (overrides config)
    #[arg(long, env = "TAGSCAN_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "TAGSCAN_INSECURE", global = true)]
    pub insecure: bool,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TAGSCAN_OUTPUT",
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
    /// Run a scan session until Ctrl-C or the given duration
    #[command(alias = "s")]
    Scan(ScanArgs),

    /// Check backend connectivity
    Health,

    /// List tags known to the backend
    #[command(alias = "t")]
    Tags,

    /// Assign an asset to a tag
    Assign(AssignArgs),

    /// Show department and room reference data
    #[command(alias = "refs")]
    References,

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Scan ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Stop after this long (e.g. "30s", "2m"); default runs until Ctrl-C
    #[arg(long, short = 'd', value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Number of distinct tags the simulated reader cycles through
    #[arg(long, default_value = "8")]
    pub simulate: u32,

    /// Device model to check against the supported list (overrides config)
    #[arg(long, short = 'm')]
    pub model: Option<String>,

    /// Transmit power in dBm (clamped to the reader maximum)
    #[arg(long)]
    pub tx_power: Option<u8>,

    /// Print every tag update, not just new tags
    #[arg(long, short = 'f')]
    pub follow: bool,

    /// When the session ends, assign an asset with this name to the last
    /// scanned tag
    #[arg(long, value_name = "NAME")]
    pub assign_last: Option<String>,

    /// Description for the --assign-last asset
    #[arg(long, requires = "assign_last")]
    pub description: Option<String>,

    /// Category for the --assign-last asset
    #[arg(long, requires = "assign_last")]
    pub category: Option<String>,
}

// ── Assign ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AssignArgs {
    /// Tag EPC (hex)
    pub epc: String,

    /// Asset name
    #[arg(long, short = 'n')]
    pub name: String,

    /// Asset description
    #[arg(long)]
    pub description: Option<String>,

    /// Asset category
    #[arg(long)]
    pub category: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
