//! Clap derive structures for the `fmc` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fmc -- talk to a Cisco Firepower Management Center from the shell
#[derive(Debug, Parser)]
#[command(
    name = "fmc",
    version,
    about = "Query and change a Cisco FMC through its REST API",
    long_about = "Send authenticated, rate-limited requests to a Cisco Firepower\n\
        Management Center. Sessions are refreshed automatically and write\n\
        requests are serialized.",
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
    /// Profile to use
    #[arg(long, short = 'p', env = "FMC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "FMC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// FMC host or URL (overrides profile)
    #[arg(long, short = 'H', env = "FMC_HOST", global = true)]
    pub host: Option<String>,

    /// API username (overrides profile)
    #[arg(long, short = 'u', env = "FMC_USERNAME", global = true)]
    pub username: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "FMC_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "FMC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authenticate and print the session's domain
    Login,

    /// GET a path under the domain prefix and print the JSON response
    Get(GetArgs),

    /// Send an arbitrary request under the domain prefix
    #[command(alias = "req")]
    Request(RequestArgs),

    /// Manage configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Request commands ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Path relative to the domain prefix, e.g. "object/networks"
    pub path: String,

    /// Query parameter as key=value (repeatable)
    #[arg(long, short = 'q', value_name = "KEY=VALUE")]
    pub query: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, DELETE, ...)
    pub method: String,

    /// Path relative to the domain prefix
    pub path: String,

    /// JSON body, or @FILE to read it from a file
    #[arg(long, short = 'd')]
    pub data: Option<String>,

    /// Status code treated as success (default: 201 for POST, else 200)
    #[arg(long, short = 'e')]
    pub expect: Option<u16>,

    /// Query parameter as key=value (repeatable)
    #[arg(long, short = 'q', value_name = "KEY=VALUE")]
    pub query: Vec<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Create or update the selected profile from --host / --username,
    /// prompting for anything not given
    Init {
        /// Prompt for the password and store it in the system keyring
        #[arg(long)]
        keyring: bool,
    },

    /// Display the configuration with secrets redacted
    Show,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store the selected profile's password in the system keyring
    SetPassword,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
