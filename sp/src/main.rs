//! Syncpane - CLI entry point
//!
//! Launches and controls the sync daemon, and exposes the dashboard's
//! control surface (status, sync toggle, service catalog) on the command
//! line.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use syncpane::cli::{Cli, Command, DaemonCommand, OutputFormat, ServicesCommand, SyncSwitch};
use syncpane::config::Config;
use syncpane::coordinator::{Coordinator, CoordinatorHandle};
use syncpane::daemon::DaemonManager;
use syncpane::ipc::{self, ControlMessage, ControlResponse, SyncClient};
use syncstore::Store;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("syncpane")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(log_dir.join("syncpane.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Daemon { command } => match command {
            DaemonCommand::Start { foreground } => cmd_start(&config, foreground).await,
            DaemonCommand::Stop => cmd_stop().await,
            DaemonCommand::Status { format } => cmd_daemon_status(format),
            DaemonCommand::Ping => cmd_ping().await,
        },
        Command::Status { format } => cmd_status(format).await,
        Command::Sync { state } => cmd_sync(state).await,
        Command::Services { command } => cmd_services(command).await,
        Command::RunDaemon => cmd_run_daemon(&config).await,
    }
}

/// Start the daemon
async fn cmd_start(config: &Config, foreground: bool) -> Result<()> {
    let daemon = DaemonManager::new();

    if daemon.is_running() {
        if let Some(pid) = daemon.running_pid() {
            println!("Syncpane daemon is already running (PID: {})", pid);
        } else {
            println!("Syncpane daemon is already running");
        }
        return Ok(());
    }

    if foreground {
        println!("Starting syncpane daemon in foreground mode...");
        run_daemon(config).await
    } else {
        let pid = daemon.start()?;
        println!("Syncpane daemon started (PID: {})", pid);
        Ok(())
    }
}

/// Stop the daemon
///
/// Tries IPC shutdown first for a graceful stop, falls back to SIGTERM.
async fn cmd_stop() -> Result<()> {
    let daemon = DaemonManager::new();

    if !daemon.is_running() {
        println!("Syncpane daemon is not running");
        return Ok(());
    }

    let pid = daemon.running_pid();

    let client = SyncClient::new();
    if client.socket_exists() {
        match client.shutdown().await {
            Ok(()) => {
                let mut attempts = 0;
                while daemon.is_running() && attempts < 50 {
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    attempts += 1;
                }
                if !daemon.is_running() {
                    if let Some(pid) = pid {
                        println!("Syncpane daemon stopped gracefully via IPC (was PID: {})", pid);
                    } else {
                        println!("Syncpane daemon stopped gracefully via IPC");
                    }
                    return Ok(());
                }
                debug!("IPC shutdown timed out, falling back to SIGTERM");
            }
            Err(e) => {
                debug!(error = %e, "IPC shutdown failed, falling back to SIGTERM");
            }
        }
    }

    daemon.stop()?;
    if let Some(pid) = pid {
        println!("Syncpane daemon stopped (was PID: {})", pid);
    } else {
        println!("Syncpane daemon stopped");
    }
    Ok(())
}

/// Show daemon process status
fn cmd_daemon_status(format: OutputFormat) -> Result<()> {
    let daemon = DaemonManager::new();
    let status = daemon.status();

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "running": status.running,
                "pid": status.pid,
                "pid_file": status.pid_file.to_string_lossy()
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("Syncpane Daemon");
            println!("---------------");
            if status.running {
                println!("Status: {}", "running".green());
                if let Some(pid) = status.pid {
                    println!("PID: {}", pid);
                }
            } else {
                println!("Status: {}", "stopped".red());
            }
            println!("PID file: {}", status.pid_file.display());
        }
    }

    Ok(())
}

/// Ping the daemon via IPC
async fn cmd_ping() -> Result<()> {
    let daemon = DaemonManager::new();
    if !daemon.is_running() {
        println!("Syncpane daemon is not running");
        return Ok(());
    }

    let client = SyncClient::new();
    if !client.socket_exists() {
        println!("Daemon PID file exists but IPC socket not found");
        println!("The daemon may be starting up or in an inconsistent state");
        return Ok(());
    }

    match client.ping().await {
        Ok(version) => {
            println!("Daemon is alive and responsive");
            println!("Version: {}", version);
        }
        Err(e) => {
            println!("Daemon PID file exists but not responding to IPC");
            println!("Error: {}", e);
        }
    }

    Ok(())
}

/// Show connection status for all services
async fn cmd_status(format: OutputFormat) -> Result<()> {
    let client = SyncClient::new();
    if !client.socket_exists() {
        println!("Syncpane daemon is not running. Start it with: sp daemon start");
        return Ok(());
    }

    let report = client.status().await.context("Failed to fetch status")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!(
                "Sync: {}",
                if report.sync_enabled {
                    "enabled".green()
                } else {
                    "disabled".red()
                }
            );
            if report.status.is_empty() {
                println!("No surfaces connected");
            } else {
                println!("{:<12} {:<12} {:<14} {:<14}", "SERVICE", "STATE", "CONTAINER", "SUB-CONTEXT");
                for (service_key, info) in &report.status {
                    let state = if info.connected {
                        "connected".green()
                    } else {
                        "disconnected".red()
                    };
                    println!(
                        "{:<12} {:<12} {:<14} {:<14}",
                        service_key, state, info.container_id, info.sub_context_id
                    );
                }
            }
        }
    }

    Ok(())
}

/// Toggle the global sync flag
async fn cmd_sync(state: SyncSwitch) -> Result<()> {
    let client = SyncClient::new();
    if !client.socket_exists() {
        println!("Syncpane daemon is not running. Start it with: sp daemon start");
        return Ok(());
    }

    let enabled = client
        .set_sync_enabled(state == SyncSwitch::On)
        .await
        .context("Failed to set sync state")?;
    println!(
        "Sync is now {}",
        if enabled { "enabled".green() } else { "disabled".red() }
    );
    Ok(())
}

/// Manage the service catalog
async fn cmd_services(command: ServicesCommand) -> Result<()> {
    let client = SyncClient::new();
    if !client.socket_exists() {
        println!("Syncpane daemon is not running. Start it with: sp daemon start");
        return Ok(());
    }

    match command {
        ServicesCommand::List => {
            let services = client.get_services().await.context("Failed to fetch services")?;
            println!("{:<12} {:<10} {:<12} URL", "KEY", "ENABLED", "NAME");
            for (key, def) in services.iter() {
                let enabled = if def.enabled { "yes".green() } else { "no".dimmed() };
                println!("{:<12} {:<10} {:<12} {}", key, enabled, def.display_name, def.url);
            }
        }
        ServicesCommand::Enable { key } => set_service_enabled(&client, &key, true).await?,
        ServicesCommand::Disable { key } => set_service_enabled(&client, &key, false).await?,
    }

    Ok(())
}

async fn set_service_enabled(client: &SyncClient, key: &str, enabled: bool) -> Result<()> {
    let mut services = client.get_services().await.context("Failed to fetch services")?;
    match services.get_mut(key) {
        Some(def) => def.enabled = enabled,
        None => {
            eprintln!("Unknown service key: {}", key);
            std::process::exit(1);
        }
    }
    client.save_services(services).await.context("Failed to save services")?;
    println!(
        "{} {} is now {}",
        "✓".green(),
        key.cyan(),
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

/// Run as the daemon process (internal command)
async fn cmd_run_daemon(config: &Config) -> Result<()> {
    let daemon = DaemonManager::new();
    daemon.register_self()?;
    run_daemon(config).await
}

/// Run the daemon main loop
async fn run_daemon(config: &Config) -> Result<()> {
    info!("Daemon starting...");

    fs::create_dir_all(&config.storage.store_dir).context("Failed to create store directory")?;
    let store = Store::open(&config.storage.store_dir)?;

    let coordinator = Coordinator::new(config.coordinator.clone(), store);
    let control = coordinator.control_handle();
    let coord_task = tokio::spawn(coordinator.run());
    info!("Coordinator started");

    let (ipc_listener, socket_path) = ipc::create_listener()?;
    info!(?socket_path, "IPC socket listening");

    let serve_control = control.clone();
    let mut ipc_task = tokio::spawn(async move { serve_ipc(ipc_listener, serve_control).await });

    info!("Daemon running");

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => warn!("SIGINT received"),
            _ = sigterm.recv() => warn!("SIGTERM received"),
            _ = &mut ipc_task => info!("Shutdown requested via IPC"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => warn!("Ctrl+C received"),
            _ = &mut ipc_task => info!("Shutdown requested via IPC"),
        }
    }

    info!("Daemon shutting down...");

    let _ = control.shutdown().await;
    ipc::cleanup_socket(&socket_path);
    ipc_task.abort();

    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), coord_task).await;

    info!("Daemon stopped");
    Ok(())
}

/// Accept control connections until a shutdown message arrives
async fn serve_ipc(listener: tokio::net::UnixListener, control: CoordinatorHandle) {
    loop {
        match listener.accept().await {
            Ok((mut stream, _)) => match ipc::read_message(&mut stream).await {
                Ok(msg) => {
                    let (response, shutdown) = handle_control(&control, msg).await;
                    let _ = ipc::send_response(&mut stream, response).await;
                    if shutdown {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Bad IPC message");
                    let _ = ipc::send_response(
                        &mut stream,
                        ControlResponse::Error { message: e.to_string() },
                    )
                    .await;
                }
            },
            Err(e) => {
                warn!(error = %e, "IPC accept failed");
            }
        }
    }
}

/// Translate one control message into a coordinator request
async fn handle_control(control: &CoordinatorHandle, msg: ControlMessage) -> (ControlResponse, bool) {
    match msg {
        ControlMessage::Ping => (
            ControlResponse::Pong {
                version: syncpane::daemon::VERSION.to_string(),
            },
            false,
        ),
        ControlMessage::GetStatus => match control.get_status().await {
            Ok(report) => (ControlResponse::Status { report }, false),
            Err(e) => (ControlResponse::Error { message: e.to_string() }, false),
        },
        ControlMessage::SetSyncEnabled { enabled } => match control.set_sync_enabled(enabled).await {
            Ok(enabled) => (ControlResponse::SyncEnabled { enabled }, false),
            Err(e) => (ControlResponse::Error { message: e.to_string() }, false),
        },
        ControlMessage::GetServices => match control.get_services().await {
            Ok(services) => (ControlResponse::Services { services }, false),
            Err(e) => (ControlResponse::Error { message: e.to_string() }, false),
        },
        ControlMessage::SaveServices { services } => match control.save_services(services).await {
            Ok(()) => (ControlResponse::Ok, false),
            Err(e) => (ControlResponse::Error { message: e.to_string() }, false),
        },
        ControlMessage::Shutdown => (ControlResponse::Ok, true),
    }
}
