//! CLI argument parsing for syncstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ss")]
#[command(author, version, about = "Durable key/value state store", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the store directory
    #[arg(short, long)]
    pub store_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the JSON document stored under a key
    Get {
        /// Key to read
        #[arg(required = true)]
        key: String,
    },

    /// Store a JSON document under a key
    Set {
        /// Key to write
        #[arg(required = true)]
        key: String,

        /// JSON value (e.g. 'true' or '{"a": 1}')
        #[arg(required = true)]
        value: String,
    },

    /// Remove a key
    Remove {
        /// Key to remove
        #[arg(required = true)]
        key: String,
    },

    /// List all keys
    List,
}
