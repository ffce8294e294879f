//! # d-tracker
//!
//! Periodically report battery level, location and today's step count to a
//! tracking server.
//!
//! # Commands
//!
//! - `run` (default): run the data send and step refresh jobs on their
//!   periodic triggers until Ctrl+C or SIGTERM. SIGUSR1 triggers a one-time send.
//! - `send`: send one record now, with the usual retry policy.
//! - `steps`: listen to the step counter once and print today's count.
//! - `collect`: collect one record and print it as JSON without sending.
//!
//! # Examples
//!
//! ```bash
//! d-tracker --config /etc/d-tracker/config.toml run
//! kill -USR1 $(pidof d-tracker)   # manual send
//! ```
//!
//! Expected output:
//! ```text
//! INFO d_tracker: d-tracker v0.1.0 starting...
//! INFO d_tracker::worker::scheduler: Scheduling DataSenderWork every 1800s
//! INFO d_tracker::worker::data_sender: Sending data - Battery: 87, Location: (52.52, 13.4), Steps: 4210
//! INFO d_tracker::worker::data_sender: Data sent successfully
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Mutex;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use d_tracker::config::{Config, LoggingConfig};
use d_tracker::network::TrackerApiService;
use d_tracker::steps::StepSensorManager;
use d_tracker::telemetry::TrackerDataCollector;
use d_tracker::worker::{
    DataSenderWorker, StepCounterWorker, WorkResult, WorkScheduler, MANUAL_DATA_SEND_TAG,
};

/// Configuration file used when `--config` is not given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Log file name prefix inside `[logging] dir`
const LOG_FILE_PREFIX: &str = "d-tracker.log";

#[derive(Parser, Debug)]
#[command(name = "d-tracker", version)]
#[command(about = "Report battery, location and daily step count to a tracking server")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Run the periodic jobs until stopped
    Run,
    /// Send one record now
    Send,
    /// Refresh and print today's step count
    Steps,
    /// Collect one record and print it without sending
    Collect,
}

/// Everything the jobs need, wired from configuration
struct Agent {
    scheduler: Arc<WorkScheduler>,
    steps: Arc<Mutex<StepSensorManager>>,
    data_sender: Arc<DataSenderWorker>,
    step_counter: Arc<StepCounterWorker>,
}

impl Agent {
    fn build(config: &Config) -> Result<Self> {
        let steps = Arc::new(Mutex::new(StepSensorManager::from_config(config)));
        let collector = TrackerDataCollector::from_config(config);
        let api = TrackerApiService::from_config(&config.server)
            .context("failed to set up HTTP client")?;

        let data_sender = Arc::new(DataSenderWorker::new(
            collector,
            Box::new(api),
            steps.clone(),
            config.schedule.send_warmup(),
            config.schedule.max_retry_attempts,
        ));
        let step_counter = Arc::new(StepCounterWorker::new(
            steps.clone(),
            config.schedule.step_warmup(),
        ));

        Ok(Self {
            scheduler: Arc::new(WorkScheduler::from_config(&config.schedule)),
            steps,
            data_sender,
            step_counter,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    let _log_guard = init_logging(&config.logging);
    info!("d-tracker v{} starting...", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config).await,
        Commands::Send => send(&config).await,
        Commands::Steps => steps(&config).await,
        Commands::Collect => collect(&config).await,
    }
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence over `[logging] level`. With `[logging] dir`
/// set, output goes to a daily rolling file through a non-blocking writer;
/// the returned guard must live until exit so buffered lines are flushed.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.dir.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&config.dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

async fn run(config: &Config) -> Result<()> {
    let agent = Agent::build(config)?;

    let send_task = agent
        .scheduler
        .spawn_periodic(agent.data_sender.clone(), config.schedule.send_interval());
    let step_task = agent
        .scheduler
        .spawn_periodic(agent.step_counter.clone(), config.schedule.step_refresh_interval());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;
    info!("Send SIGUSR1 to trigger a one-time data send, Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = sigusr1.recv() => {
                info!("Manual data send requested");
                agent.scheduler.spawn_one_time(agent.data_sender.clone(), MANUAL_DATA_SEND_TAG);
            }

            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                break;
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    send_task.abort();
    step_task.abort();
    agent.steps.lock().await.stop_listening().await;
    Ok(())
}

async fn send(config: &Config) -> Result<()> {
    let agent = Agent::build(config)?;

    match agent.scheduler.run_once(agent.data_sender.as_ref()).await {
        WorkResult::Success => Ok(()),
        result => bail!("data send did not succeed: {:?}", result),
    }
}

async fn steps(config: &Config) -> Result<()> {
    let mut manager = StepSensorManager::from_config(config);
    if !manager.has_sensor() {
        println!("No step counter available, reporting the last stored count");
    }

    manager.warm_up(config.schedule.step_warmup()).await;
    println!("Steps today: {}", manager.latest_step_count()?);
    Ok(())
}

async fn collect(config: &Config) -> Result<()> {
    let collector = TrackerDataCollector::from_config(config);
    let data = collector.collect_data().await?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_command_and_config() {
        let cli = Cli::try_parse_from(["d-tracker"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_subcommands() {
        for (arg, expected) in [
            ("run", Commands::Run),
            ("send", Commands::Send),
            ("steps", Commands::Steps),
            ("collect", Commands::Collect),
        ] {
            let cli = Cli::try_parse_from(["d-tracker", "--config", "/etc/d.toml", arg]).unwrap();
            assert_eq!(cli.command, Some(expected));
            assert_eq!(cli.config, PathBuf::from("/etc/d.toml"));
        }
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["d-tracker", "upload"]).is_err());
    }
}
