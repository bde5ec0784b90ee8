use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use syncstore::Store;
use syncstore::cli::{Cli, Command};
use syncstore::config::Config;

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let store_dir = cli.store_dir.unwrap_or(config.store_path);

    info!("syncstore starting");

    let store = Store::open(&store_dir)?;

    match cli.command {
        Command::Get { key } => {
            let value: Option<serde_json::Value> = store.get(&key)?;
            match value {
                Some(v) => println!("{}", serde_json::to_string_pretty(&v)?),
                None => {
                    eprintln!("{} key not found: {}", "✗".red(), key);
                    std::process::exit(1);
                }
            }
        }
        Command::Set { key, value } => {
            let parsed: serde_json::Value = serde_json::from_str(&value).context("Value is not valid JSON")?;
            store.set(&key, &parsed)?;
            println!("{} {}", "✓".green(), key.cyan());
        }
        Command::Remove { key } => {
            if store.remove(&key)? {
                println!("{} removed {}", "✓".green(), key.cyan());
            } else {
                println!("key not present: {}", key);
            }
        }
        Command::List => {
            let keys = store.keys()?;
            if keys.is_empty() {
                println!("No keys found");
            } else {
                for key in keys {
                    println!("{}", key);
                }
            }
        }
    }

    Ok(())
}
