use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use scenecast::{
    config::Config,
    metrics,
    server::Server,
    sinks::{FileSink, OutputFormat, Sink, StdoutSink},
    workflow::{FlowState, Orchestrator},
};

#[derive(Parser)]
#[command(author, version, about = "Turn the current time, place and weather into a generated photo", long_about = None)]
struct Cli {
    /// Log filter (error, warn, info, debug, trace or a full EnvFilter directive)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the workflow once and print the result
    Run {
        /// Output format (json, pretty, text)
        #[arg(short, long, default_value = "pretty")]
        format: String,

        /// Template for the text format
        #[arg(short, long)]
        template: Option<String>,

        /// Also write artifacts to this directory (defaults to SCENECAST_OUTPUT_DIR)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Do not write artifacts to disk
        #[arg(long)]
        no_files: bool,
    },

    /// Serve the HTTP API
    Serve {
        /// Listen address (defaults to SCENECAST_SERVER_ADDR)
        #[arg(short, long)]
        addr: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;
    info!("Loaded configuration: {:?}", config);
    metrics::register_metrics();

    match cli.command {
        Commands::Run {
            format,
            template,
            output,
            no_files,
        } => {
            let format: OutputFormat = format.parse()?;
            let mut orchestrator = Orchestrator::from_config(&config)?;
            orchestrator.start();
            let snapshot = orchestrator.run_until_settled().await;

            StdoutSink::new(format, template.as_deref())?
                .send(&snapshot)
                .await?;
            if !no_files && !snapshot.context.generated_artifacts.is_empty() {
                let sink = FileSink::new(output.unwrap_or_else(|| config.output.dir.clone()));
                sink.send(&snapshot).await?;
            }

            if snapshot.state == FlowState::Error {
                bail!(
                    "Run failed: {}",
                    snapshot.context.last_error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        Commands::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| config.server.addr.clone());
            let handle = Orchestrator::from_config(&config)?.spawn();
            info!("Starting server on {} (orchestrator {})", addr, handle.id());
            Server::new(handle).start(&addr).await?;
        }
    }

    Ok(())
}
