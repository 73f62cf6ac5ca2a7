//! VISCA Bridge - VISCA-over-IP to serial gateway
//!
//! Lets network PTZ controllers drive a camera that only speaks VISCA on a
//! serial line.

mod config;
mod network;
mod protocol;
mod relay;
mod serial;

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;
use network::Gateway;
use serial::SerialLink;

/// VISCA Bridge - VISCA-over-IP to serial gateway
#[derive(Parser)]
#[command(name = "visca-bridge")]
#[command(author = "VISCA Bridge Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Relay VISCA-over-IP datagrams to a serial VISCA camera", long_about = None)]
struct Cli {
    /// Path to configuration file (JSON, or TOML with a .toml extension)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway
    Run {
        /// UDP port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Serial device the camera is attached to
        #[arg(short, long)]
        serial: Option<String>,

        /// Serial baud rate
        #[arg(short, long)]
        baud: Option<u32>,

        /// Interface to bind to
        #[arg(long)]
        bind: Option<IpAddr>,
    },

    /// List available serial ports
    ListPorts,

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?
    } else {
        Config::load_default()?
    };

    match cli.command {
        Commands::Run {
            port,
            serial,
            baud,
            bind,
        } => {
            let config = apply_overrides(config, port, serial, baud, bind);
            config.validate()?;
            run_gateway(config).await?;
        }
        Commands::ListPorts => {
            list_ports()?;
        }
        Commands::Config { generate, output } => {
            let config = if generate {
                config::generate_sample_config()
            } else {
                config
            };

            if let Some(path) = output {
                config
                    .save(&path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Configuration written to: {}", path.display());
            } else {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

fn apply_overrides(
    mut config: Config,
    port: Option<u16>,
    serial: Option<String>,
    baud: Option<u32>,
    bind: Option<IpAddr>,
) -> Config {
    if let Some(port) = port {
        config.network_port = port;
    }
    if let Some(serial) = serial {
        config.serial_path = serial;
    }
    if let Some(baud) = baud {
        config.baud_rate = baud;
    }
    if let Some(bind) = bind {
        config.bind_address = bind;
    }
    config
}

/// Open both channels and relay until Ctrl+C
async fn run_gateway(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Starting VISCA bridge: udp {} <-> {} @ {} baud",
        config.network().socket_addr(),
        config.serial_path,
        config.baud_rate
    );

    let link = SerialLink::open(&config.serial())
        .with_context(|| format!("Failed to open serial port {}", config.serial_path))?;
    let socket = network::bind(&config.network()).await?;

    let gateway = Gateway::new(socket, link);
    let stats = gateway
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    tracing::info!(
        "Relayed {} requests and {} replies",
        stats.requests_forwarded,
        stats.replies_sent
    );

    Ok(())
}

fn list_ports() -> anyhow::Result<()> {
    let ports = serial::list_ports()?;

    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }

    println!("Available serial ports:");
    for port in ports {
        println!("  {}", port);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["visca-bridge", "list-ports"]);
        assert!(cli.is_ok());

        let cli = Cli::try_parse_from([
            "visca-bridge",
            "run",
            "--port",
            "1259",
            "--serial",
            "/dev/ttyUSB1",
            "--baud",
            "38400",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { port, serial, baud, bind } => {
                assert_eq!(port, Some(1259));
                assert_eq!(serial.as_deref(), Some("/dev/ttyUSB1"));
                assert_eq!(baud, Some(38400));
                assert!(bind.is_none());
            }
            _ => panic!("Wrong command"),
        }
    }

    #[test]
    fn test_config_command_output() {
        let cli = Cli::try_parse_from([
            "visca-bridge",
            "config",
            "--generate",
            "--output",
            "bridge.toml",
        ])
        .unwrap();
        match cli.command {
            Commands::Config { generate, output } => {
                assert!(generate);
                assert_eq!(output, Some(PathBuf::from("bridge.toml")));
            }
            _ => panic!("Wrong command"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_port() {
        assert!(Cli::try_parse_from(["visca-bridge", "run", "--port", "70000"]).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let config = apply_overrides(
            Config::default(),
            Some(1259),
            None,
            Some(38400),
            Some("127.0.0.1".parse().unwrap()),
        );

        assert_eq!(config.network_port, 1259);
        assert_eq!(config.serial_path, Config::default().serial_path);
        assert_eq!(config.baud_rate, 38400);
        assert_eq!(config.network().socket_addr().to_string(), "127.0.0.1:1259");
    }

    #[test]
    fn test_override_then_validate() {
        let config = apply_overrides(Config::default(), Some(0), None, None, None);
        assert!(config.validate().is_err());
    }
}
