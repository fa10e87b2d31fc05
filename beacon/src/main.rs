mod config;
mod telemetry;

use clap::{Args, Parser, Subcommand};
use config::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "beacon", version, about = "Client telemetry ingestion service")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the ingest endpoints
    Serve(ConfigArgs),
    /// Load and validate the configuration, then exit
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// YAML config file. Sinks not set there are read from the environment.
    #[arg(long)]
    config_file: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    InvalidConfig(#[from] ingest::config::ValidationError),
    #[error(transparent)]
    Telemetry(#[from] telemetry::TelemetryError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Ingest(#[from] ingest::errors::IngestError),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli_main(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn cli_main(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        CliCommand::Serve(args) => {
            let config = Config::load(args.config_file.as_deref())?;
            let _telemetry = telemetry::init(&config.common)?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(ingest::run(config.ingest))?;
        }
        CliCommand::CheckConfig(args) => {
            let config = Config::load(args.config_file.as_deref())?;
            config.ingest.validate()?;

            let sinks: Vec<_> = config
                .ingest
                .sinks
                .enabled()
                .iter()
                .map(|kind| kind.as_str())
                .collect();
            println!(
                "config ok (listener {}:{}, sinks: [{}])",
                config.ingest.listener.host,
                config.ingest.listener.port,
                sinks.join(", ")
            );
        }
    }

    Ok(())
}
