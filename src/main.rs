//! Environmental monitor - host entry point
//!
//! Wires host drivers into the supervisor: a TCP-probe network driver, the
//! rumqttc broker transport, a simulated SCD-40 and a console indicator.

use clap::{Parser, Subcommand};
use envmon::broker::{BrokerSupervisor, MqttBroker};
use envmon::config::MonitorConfig;
use envmon::event_log::{EventLog, FileEventLog};
use envmon::indicator::{ConsoleIndicator, StatusIndicator};
use envmon::link::{LinkSupervisor, TcpProbeDriver};
use envmon::observability::init_default_logging;
use envmon::protocol::TopicSet;
use envmon::sensor::SimulatedScd40;
use envmon::supervisor::{boot, Collaborators};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

/// Connection-health supervisor for an environmental sensor node
#[derive(Parser)]
#[command(name = "envmon")]
#[command(about = "Environmental sensor node with link and broker recovery")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "ENVMON_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Boot the node and supervise it until interrupted
    Run,
    /// Validate configuration
    Config {
        /// Print the configuration with credentials masked
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting envmon v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_monitor(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<MonitorConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(MonitorConfig::load_from_file(path)?);
    }

    for path_str in ["envmon.toml", "config/envmon.toml"] {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(MonitorConfig::load_from_file(&path)?);
        }
    }

    Err("No configuration file found. Provide one with -c/--config or create envmon.toml".into())
}

async fn run_monitor(config: MonitorConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Device ID: {}", config.device.id);
    let timing = config.timing();
    let topics = TopicSet::from_config(&config.mqtt)?;

    let event_log: Arc<dyn EventLog> = Arc::new(FileEventLog::new(&config.device.event_log_path));

    let driver = TcpProbeDriver::new(&config.wifi.probe_addr, timing.poll_interval);
    let link = LinkSupervisor::new(
        driver,
        timing.poll_interval,
        timing.initial_connect_timeout,
        event_log.clone(),
    );

    let transport = MqttBroker::new(&config.device.id, config.mqtt.clone())?;
    let broker = BrokerSupervisor::new(transport, event_log.clone());

    let sensor = SimulatedScd40::new(
        Duration::from_secs(config.sensor.warmup_secs),
        Duration::from_secs(config.sensor.measurement_interval_secs),
    );

    let parts = Collaborators {
        link,
        broker,
        sensor: Some(sensor),
        indicator: StatusIndicator::new(Box::new(ConsoleIndicator::default()), timing.startup_display),
        event_log,
    };

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
        }
        result = async {
            let mut machine = boot(parts, &config.wifi.networks, topics, timing).await?;
            machine.run_forever().await;
            Ok::<(), envmon::error::MonitorError>(())
        } => {
            result?;
        }
    }

    Ok(())
}

fn handle_config_command(
    config: &MonitorConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config.redacted())?);
    }

    info!("Configuration validation complete");
    Ok(())
}
