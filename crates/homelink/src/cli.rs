//! Clap derive structures for the `homelink` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// homelink -- control a homelink smart-home hub from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "homelink",
    version,
    about = "Control your homelink smart-home hub from the command line",
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
    #[arg(long, short = 'p', env = "HOMELINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Hub API URL, e.g. http://hub.local:5000/api (overrides profile)
    #[arg(long, env = "HOMELINK_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short = 'o', env = "HOMELINK_OUTPUT", default_value = "table", global = true)]
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

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "HOMELINK_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "HOMELINK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
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

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in to the hub
    Login(LoginArgs),

    /// Create an account and sign in
    Register(RegisterArgs),

    /// Sign out and forget stored credentials
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Update profile fields
    Profile(ProfileArgs),

    /// Change the account password
    Password,

    /// List and control devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Manage rooms
    #[command(alias = "r")]
    Rooms(RoomsArgs),

    /// Manage automations
    #[command(alias = "auto")]
    Automations(AutomationsArgs),

    /// Keep polling the hub and print device changes and activity
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Session ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Username (defaults to the profile's username, else prompts)
    pub username: Option<String>,

    /// Password (prompts when omitted)
    #[arg(long, env = "HOMELINK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    pub username: String,

    #[arg(long)]
    pub email: String,

    #[arg(long, default_value = "")]
    pub first_name: String,

    #[arg(long, default_value = "")]
    pub last_name: String,

    /// Password (prompts when omitted)
    #[arg(long, env = "HOMELINK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    #[arg(long)]
    pub first_name: Option<String>,

    #[arg(long)]
    pub last_name: Option<String>,

    #[arg(long)]
    pub email: Option<String>,
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List devices
    #[command(alias = "ls")]
    List {
        /// Only devices in this room (id or name)
        #[arg(long)]
        room: Option<String>,
    },

    /// Show one device
    Get {
        /// Device id or name
        device: String,
    },

    /// Toggle a device on or off
    Toggle {
        /// Device id or name
        device: String,
    },

    /// Set a thermostat's target temperature (°F)
    #[command(alias = "temp")]
    Temperature {
        /// Device id or name
        device: String,
        value: f64,
    },

    /// Switch every light on or off
    Lights {
        state: PowerState,
    },

    /// Add a device
    Add {
        name: String,

        /// Device type, e.g. light or thermostat
        #[arg(long = "type", short = 't')]
        kind: String,

        /// Room id or name
        #[arg(long)]
        room: Option<String>,

        /// Extra attributes as a JSON file
        #[arg(long)]
        attributes: Option<PathBuf>,
    },

    /// Remove a device
    #[command(alias = "rm")]
    Remove {
        /// Device id or name
        device: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

// ── Rooms ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RoomsArgs {
    #[command(subcommand)]
    pub command: RoomsCommand,
}

#[derive(Debug, Subcommand)]
pub enum RoomsCommand {
    #[command(alias = "ls")]
    List,

    Add {
        name: String,
    },

    Rename {
        /// Room id or name
        room: String,
        name: String,
    },

    #[command(alias = "rm")]
    Remove {
        /// Room id or name
        room: String,
    },
}

// ── Automations ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AutomationsArgs {
    #[command(subcommand)]
    pub command: AutomationsCommand,
}

#[derive(Debug, Subcommand)]
pub enum AutomationsCommand {
    #[command(alias = "ls")]
    List,

    Add {
        name: String,

        /// Automation type, e.g. time or device-link
        #[arg(long = "type", short = 't')]
        kind: String,

        /// Condition as inline JSON
        #[arg(long)]
        condition: String,

        /// Action as inline JSON
        #[arg(long)]
        action: String,

        /// Create in the disabled state
        #[arg(long)]
        disabled: bool,
    },

    #[command(alias = "rm")]
    Remove {
        /// Automation id or name
        automation: String,
    },

    /// Enable or disable an automation
    Toggle {
        /// Automation id or name
        automation: String,
    },
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this long (e.g. "30s", "5m"); runs until Ctrl-C otherwise
    #[arg(long)]
    pub duration: Option<humantime::Duration>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or update a profile
    Init {
        /// Hub API URL
        #[arg(long)]
        api_url: String,

        /// Profile name
        #[arg(long, default_value = "default")]
        name: String,

        /// Where to keep session credentials
        #[arg(long)]
        credential_store: Option<StoreChoice>,

        /// Username offered by `login`
        #[arg(long)]
        username: Option<String>,
    },

    /// Display the resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        name: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StoreChoice {
    Keyring,
    File,
    Memory,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
