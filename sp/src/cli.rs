//! CLI argument parsing for syncpane

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sp")]
#[command(author, version, about = "Mirror embedded chat prompts across services", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage the daemon process
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },

    /// Show connection status for all services
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Turn synchronized typing on or off
    Sync {
        #[arg(value_enum)]
        state: SyncSwitch,
    },

    /// Manage the service catalog
    Services {
        #[command(subcommand)]
        command: ServicesCommand,
    },

    /// Run as the daemon process (internal)
    #[command(hide = true)]
    RunDaemon,
}

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Start the daemon
    Start {
        /// Run in the foreground instead of detaching
        #[arg(short, long)]
        foreground: bool,
    },

    /// Stop the daemon
    Stop,

    /// Show daemon status
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Check the daemon is alive via IPC
    Ping,
}

#[derive(Subcommand, Debug)]
pub enum ServicesCommand {
    /// List services and their enabled state
    List,

    /// Enable a service
    Enable {
        /// Service key (e.g. chatgpt, gemini)
        key: String,
    },

    /// Disable a service
    Disable {
        /// Service key (e.g. chatgpt, gemini)
        key: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncSwitch {
    On,
    Off,
}
