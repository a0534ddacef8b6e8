use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use fluidflow_cli::duration::parse_duration;
use fluidflow_cli::settings::{self, Overrides};
use fluidflow_cli::Console;
use fluidflow_sdk::{Bus, ParameterStore, SimulatorConfig, TaskRegistry};
use tokio::io::BufReader;

#[derive(Parser, Debug)]
#[command(name = "fluidflow-sim")]
#[command(about = "Simulated fluid-flow sensor publishing on a data bus at 10 Hz")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Topic to publish samples on
    #[arg(long)]
    topic: Option<String>,

    /// Tick period (e.g., "100ms", "0.5s")
    #[arg(long)]
    period: Option<String>,

    /// Fixed RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Write the latest sample to this JSON file
    #[arg(long)]
    output_file: Option<PathBuf>,

    /// Stream samples as newline-delimited JSON to a TCP endpoint (host:port)
    #[arg(long)]
    output_tcp: Option<String>,

    /// Start the simulator before opening the console
    #[arg(short, long)]
    start: bool,

    /// Run without the console for this long, then exit (e.g., "30s")
    #[arg(long)]
    run_for: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.as_str().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let overrides = Overrides {
        topic: args.topic.clone(),
        period: args.period.as_deref().map(parse_duration).transpose()?,
        seed: args.seed,
        output_file: args.output_file.clone(),
        output_tcp: args.output_tcp.clone(),
    };
    let config = settings::load(args.config.as_deref(), &overrides)?;
    tracing::debug!(?config, "configuration loaded");
    let run_for = args.run_for.as_deref().map(parse_duration).transpose()?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config, args.start, run_for))
}

async fn run(config: SimulatorConfig, start: bool, run_for: Option<Duration>) -> Result<()> {
    let registry = Arc::new(TaskRegistry::new(
        Bus::new(),
        ParameterStore::new(config.params),
    ));

    if start || run_for.is_some() {
        let id = registry
            .start(&config)
            .with_context(|| format!("{} failed to start", config.module_name))?;
        println!("{} started as {}", config.module_name, id);
    }

    // Headless mode
    if let Some(limit) = run_for {
        tokio::select! {
            _ = tokio::time::sleep(limit) => {}
            _ = tokio::signal::ctrl_c() => {}
        }
        if let Some(status) = registry
            .find(&config.module_name)
            .and_then(|id| registry.status(id))
        {
            println!("{status}");
        }
        registry.shutdown().await;
        return Ok(());
    }

    let mut console = Console::new(registry, config, std::io::stdout());
    let stdin = BufReader::new(tokio::io::stdin());
    console
        .run(stdin, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
