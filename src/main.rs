//! Navbridge - GNSS receiver to network bridge
//!
//! Bridges a position receiver and a heading receiver onto the local
//! network: NMEA telemetry and synthesized heading sentences go out as UDP
//! datagrams, RTK corrections come back over UDP and are written to the
//! position receiver.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use navbridge_core::core::transport;
use navbridge_core::{AppConfig, RelayService, ServiceState};

/// Navbridge CLI
#[derive(Parser, Debug)]
#[command(
    name = "navbridge",
    author = "Navbridge Team",
    version = "0.1.0",
    about = "GNSS receiver to network bridge",
    long_about = None
)]
struct Cli {
    /// Config file path (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the relay (the default when no subcommand is given)
    Run {
        /// Position receiver port override
        #[arg(long)]
        position_port: Option<String>,

        /// Heading receiver port override
        #[arg(long)]
        heading_port: Option<String>,

        /// Telemetry destination override (host:port)
        #[arg(long)]
        target: Option<String>,

        /// Correction listener override (host:port)
        #[arg(long)]
        listen: Option<String>,
    },

    /// List available serial ports
    ListPorts,

    /// Write a default config file
    InitConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match &cli.command {
        Some(Commands::ListPorts) => return list_ports(),
        Some(Commands::InitConfig) => return init_config(cli.config.as_deref()),
        _ => {}
    }

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("could not load {}", path.display()))?,
        None => AppConfig::load().context("could not load configuration")?,
    };

    if let Some(Commands::Run {
        position_port,
        heading_port,
        target,
        listen,
    }) = cli.command
    {
        if let Some(port) = position_port {
            config.position.serial.port = port;
        }
        if let Some(port) = heading_port {
            config.heading.serial.port = port;
        }
        if let Some(target) = target {
            config.transport.target = target;
        }
        if let Some(listen) = listen {
            config.transport.listen = listen;
        }
    }

    run(config)
}

fn run(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("Starting navbridge v{}", env!("CARGO_PKG_VERSION"));

    let mut service = RelayService::new(config);
    service.start().map_err(|e| anyhow::anyhow!(e))?;

    let running = Arc::new(AtomicBool::new(true));
    let ctrlc_flag = running.clone();
    ctrlc::set_handler(move || {
        ctrlc_flag.store(false, Ordering::SeqCst);
    })
    .context("could not install signal handler")?;

    while running.load(Ordering::SeqCst) {
        if service.state() == ServiceState::Error {
            service.stop();
            bail!("relay failed to start; see the log for details");
        }
        thread::sleep(Duration::from_millis(200));
    }

    tracing::info!("shutting down");
    service.stop();
    let stats = service.stats();
    tracing::info!(
        "final counters: {} frames relayed, {} headings, {} corrections",
        stats.frames_relayed,
        stats.headings_sent,
        stats.corrections_forwarded
    );
    Ok(())
}

fn list_ports() -> anyhow::Result<()> {
    let ports = transport::list_ports().context("could not enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }
    for port in ports {
        println!("{} [{:?}]", port.port_name, port.port_type);
    }
    Ok(())
}

fn init_config(path: Option<&Path>) -> anyhow::Result<()> {
    let config = AppConfig::default();
    match path {
        Some(path) => {
            config
                .save_to(path)
                .with_context(|| format!("could not write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => {
            config.save().context("could not write config file")?;
            match navbridge_core::config::config_dir() {
                Some(dir) => println!("Wrote {}", dir.join("config.toml").display()),
                None => println!("Wrote config file"),
            }
        }
    }
    Ok(())
}
