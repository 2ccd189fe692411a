use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::InterceptorConfig;

mod breaker;
mod config;
mod fatal;
mod server;

/// Pre-send chat interceptor for marketplace messaging.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interceptor service
    Serve,

    /// Score a message body locally and print the decision as JSON
    Score(ScoreArgs),
}

#[derive(Args)]
struct ScoreArgs {
    /// Message content to score
    content: String,

    /// Override the hard-block threshold
    #[arg(long)]
    threshold: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;
    fatal::install_exit_hook();

    let result = match cli.command {
        Commands::Serve => cmd_serve().await,
        Commands::Score(args) => cmd_score(args),
    };

    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            error!("command failed: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let level: tracing::Level = level.parse().context("invalid log level")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

async fn cmd_serve() -> Result<()> {
    let config = InterceptorConfig::get().context("configuration rejected")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting chat interceptor"
    );
    server::run(config).await
}

fn cmd_score(args: ScoreArgs) -> Result<()> {
    let config = InterceptorConfig::get().context("configuration rejected")?;
    let policy = cis_scorer::ScorePolicy {
        sync_threshold: args.threshold.unwrap_or(config.sync_threshold),
        max_message_length: config.max_message_length,
    };
    let result = cis_scorer::assess(&args.content, &policy);
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("serializing score result")?
    );
    Ok(())
}
