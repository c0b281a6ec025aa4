//! Clap derive structures for the `heatlink` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

use heatlink_core::{DeviceId, HvacMode, VanePosition, ZoneId};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// heatlink -- control MELCloud heat pumps from the command line
#[derive(Debug, Parser)]
#[command(
    name = "heatlink",
    version,
    about = "Control MELCloud heat pumps from the command line",
    long_about = "Presents cloud-controlled heat pumps (air-to-air units and\n\
        air-to-water units with heating zones) as locally controllable devices.\n\
        One polling coordinator per invocation keeps cloud traffic minimal.",
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
    /// Account profile to use
    #[arg(long, short = 'p', env = "HEATLINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Access token (overrides profile)
    #[arg(long, env = "HEATLINK_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HEATLINK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv)
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
    /// Log in and store an access token in the profile
    Login(LoginArgs),

    /// List devices or show one in detail
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Write device settings (setpoint, mode, fan, power)
    Set(SetArgs),

    /// Position an air-to-air unit's vanes
    Vane(VaneArgs),

    /// Run the polling coordinator and print changes as they land
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Inspect or edit the configuration file
    #[command(alias = "cfg")]
    Config(ConfigArgs),
}

// ── Login ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Account email (prompted when omitted)
    #[arg(long)]
    pub email: Option<String>,
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub action: Option<DevicesAction>,
}

#[derive(Debug, Subcommand)]
pub enum DevicesAction {
    /// List all devices (default)
    #[command(alias = "ls")]
    List,

    /// Show one device in detail, zones included
    Show {
        /// Device id
        id: DeviceId,
    },
}

// ── Set ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PowerArg {
    On,
    Off,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Device id
    pub id: DeviceId,

    /// Power the unit on or off
    #[arg(long)]
    pub power: Option<PowerArg>,

    /// Target temperature in °C
    #[arg(long, value_name = "CELSIUS")]
    pub temp: Option<f64>,

    /// HVAC mode (air-to-air only)
    #[arg(long)]
    pub mode: Option<HvacMode>,

    /// Fan speed step (air-to-air only)
    #[arg(long, value_name = "STEP")]
    pub fan: Option<u8>,

    /// Tank target temperature in °C (air-to-water only)
    #[arg(long, value_name = "CELSIUS")]
    pub tank_temp: Option<f64>,

    /// Zone for --temp on air-to-water devices
    #[arg(long, short = 'z')]
    pub zone: Option<ZoneId>,
}

// ── Vane ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum VaneAxis {
    Horizontal,
    Vertical,
}

#[derive(Debug, Args)]
pub struct VaneArgs {
    /// Device id
    pub id: DeviceId,

    /// Which vane axis to position
    #[arg(value_enum)]
    pub axis: VaneAxis,

    /// Position: auto, 1-5, or swing
    pub position: VanePosition,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Refresh interval in minutes (1-60; overrides the profile)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the config file path
    Path,

    /// Show profiles (tokens redacted)
    Show,

    /// Set the refresh interval for a profile
    SetInterval {
        /// Minutes between refreshes, 1-60 inclusive
        minutes: u64,
    },
}
