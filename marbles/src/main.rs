#![cfg_attr(test, allow(clippy::disallowed_methods))]
// Forbid unwrap() in production code.
// Test code is allowed to use unwrap() for convenience.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use std::path::PathBuf;

use clap::Parser;
use marbles::cli::{self, OperatorSpec};
use marbles::{Scheduler, TimeConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Run a marble diagram through time operators in virtual time.
#[derive(Debug, Parser)]
#[command(name = "marbles", version)]
struct Args {
    /// Virtual time units per diagram character (overrides MARBLES_INTERVAL).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    /// Print the recorded log as JSON instead of a diagram.
    #[arg(long)]
    json: bool,

    /// Also write the recorded log as JSON to this file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Input diagram, e.g. "--a--b--|".
    #[arg(allow_hyphen_values = true)]
    diagram: String,

    /// Operators applied in order: delay:K, throttle:P, debounce:P, take:N.
    operators: Vec<OperatorSpec>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marbles=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    // Load configuration from environment variables
    let mut config = match TimeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    if let Some(interval) = args.interval {
        config = config.with_interval(interval);
    }

    tracing::debug!(
        "Loaded configuration: interval={}, frame_interval_ms={}",
        config.interval,
        config.frame_interval_ms
    );

    let scheduler = Scheduler::new(config);
    let output = match cli::run_pipeline(&scheduler, &args.diagram, &args.operators).await {
        Ok(output) => output,
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    };

    if let Some(path) = &args.output
        && let Err(e) = cli::write_json(path, &output.log)
    {
        tracing::error!("Failed to write {}: {e}", path.display());
        std::process::exit(1);
    }

    if args.json {
        match cli::to_json(&output.log) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                tracing::error!("{e}");
                std::process::exit(1);
            }
        }
    } else {
        println!("{}", output.diagram);
    }
}
