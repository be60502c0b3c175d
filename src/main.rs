use aegis::ai::backends;
use aegis::collectors::SyntheticSource;
use aegis::config::Config;
use aegis::console::{self, ConsolePresenter};
use aegis::error::ConfigError;
use aegis::service::TriageService;
use aegis::triage::TriagePipeline;
use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, watch};

/// Command-line arguments for the triage console
#[derive(Parser)]
#[command(
    name = "aegis",
    about = "Log triage console - AI-assisted fault analysis and remediation",
    long_about = "Watches a stream of service log events, sends the first unhandled error to an \
                  AI analyzer, and lets the operator apply or dismiss the suggested fix."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,

    /// Override the buffer capacity from the configuration
    #[arg(long, value_name = "N")]
    capacity: Option<usize>,

    /// Do not start the synthetic event source
    #[arg(long)]
    no_source: bool,
}

impl Cli {
    /// Validate the CLI arguments
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            // Missing files fall back to defaults in load_config
            if config_path.exists() {
                if !config_path.is_file() {
                    return Err(format!(
                        "Configuration path is not a file: {}",
                        config_path.display()
                    ));
                }

                if let Some(extension) = config_path.extension() {
                    if extension != "toml" {
                        warn!(
                            "Configuration file does not have .toml extension: {}",
                            config_path.display()
                        );
                    }
                }
            }
        }

        if self.capacity == Some(0) {
            return Err("--capacity must be at least 1".to_string());
        }

        Ok(())
    }

    /// Apply command-line overrides on top of the loaded configuration
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(capacity) = self.capacity {
            config.buffer.capacity = capacity;
        }
        if self.no_source {
            config.source.enabled = false;
        }
    }
}

/// Load configuration from file or use defaults
///
/// An unreadable or invalid file is reported and replaced by the defaults.
fn load_config(config_path: Option<&Path>) -> Config {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            match Config::from_file(path) {
                Ok(config) => config,
                Err(ConfigError::ReadError(_)) => {
                    warn!(
                        "Configuration file '{}' not found or unreadable, using defaults",
                        path.display()
                    );
                    Config::default()
                }
                Err(e) => {
                    error!("Configuration error in '{}': {}", path.display(), e);
                    warn!("Using default configuration due to invalid config file");
                    Config::default()
                }
            }
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    info!("Starting triage console");

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let mut config = load_config(cli.config.as_deref());
    cli.apply_overrides(&mut config);

    let backend = backends::from_config(&config.ai.backend)
        .context("Failed to initialize analyzer backend")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ctrlc_tx = shutdown_tx.clone();
    ctrlc::set_handler(move || {
        info!("Received interrupt signal (SIGINT), shutting down gracefully...");
        if let Err(e) = ctrlc_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
    })
    .context("Error setting SIGINT handler for graceful shutdown")?;

    let (event_tx, event_rx) = mpsc::channel(64);
    let source = if config.source.enabled {
        Some(SyntheticSource::new(config.source.interval()).spawn(event_tx, shutdown_rx.clone()))
    } else {
        info!("Synthetic event source disabled");
        drop(event_tx);
        None
    };

    let (command_tx, command_rx) = mpsc::channel(16);
    // Detached: a read still blocked on stdin ends with the process
    console::spawn_command_reader(command_tx).context("Failed to start command reader")?;

    println!("{}", console::HELP);

    let service = TriageService::new(
        TriagePipeline::new(config.buffer.capacity),
        backend,
        ConsolePresenter::stdout(),
    )
    .with_analysis_timeout(config.analysis.timeout());

    service.run(event_rx, command_rx, shutdown_rx).await;

    // Stops the source if the loop ended on Quit
    let _ = shutdown_tx.send(true);
    if let Some(source) = source {
        if let Err(e) = source.await {
            warn!("Event source task failed: {}", e);
        }
    }

    info!("Triage console shutdown complete");
    Ok(())
}
