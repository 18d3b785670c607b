//! Command-line argument parsing.

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use uuid::Uuid;

/// vifplug - plug and unplug VM network interfaces on this host
#[derive(Parser, Debug)]
#[command(name = "vifplug")]
#[command(about = "vifplug - plug and unplug VM network interfaces on this host")]
#[command(version)]
pub struct Args {
    /// Path to configuration file (optional, defaults used if not given)
    #[arg(short, long, env = "VIFPLUG_CONFIG")]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Use the in-memory device driver instead of touching the host
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the VIF types a plugin supports as JSON
    Describe {
        /// Plugin to describe
        #[arg(long, value_enum)]
        plugin: PluginKind,
    },
    /// Create the host devices for a VIF
    Plug(VifArgs),
    /// Remove the host devices for a VIF
    Unplug(VifArgs),
}

/// Arguments shared by plug and unplug.
#[derive(ClapArgs, Debug)]
pub struct VifArgs {
    /// Plugin to use
    #[arg(long, value_enum)]
    pub plugin: PluginKind,

    /// Path to the VIF descriptor (YAML)
    #[arg(long)]
    pub vif: String,

    /// UUID of the instance owning the VIF
    #[arg(long)]
    pub instance_uuid: Uuid,

    /// Display name of the instance
    #[arg(long, default_value = "")]
    pub instance_name: String,
}

/// Available plugging strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PluginKind {
    /// Shared Linux bridge
    LinuxBridge,
    /// Per-VIF Linux bridge chained to OVS
    OvsHybrid,
}
