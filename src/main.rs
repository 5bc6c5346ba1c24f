mod logging;

use anyhow::Context;
use clap::Parser;
use logging::JsonLogFormat;
use reddit_client::RedditClient;
use std::path::PathBuf;
use std::sync::Arc;
use sweep_service::Scheduler;
use sweeper_core::Config;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "removal-sweeper")]
#[command(about = "Crossposts hot submissions that moderators removed")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    config: PathBuf,
}

/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .event_format(JsonLogFormat::new())
        .with_env_filter(filter)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config).with_context(|| {
        format!(
            "failed to load configuration from {}",
            cli.config.display()
        )
    })?;
    init_logging(&config.log_level);

    info!(
        sweep_subreddit = %config.sweep_subreddit,
        targets = config.crosspost_subreddits.len(),
        username = %config.client.username,
        stickied_reply = config.stickied_reply.enabled,
        "Starting removal sweeper"
    );

    let client = Arc::new(
        RedditClient::new(&config.client).context("failed to create Reddit client")?,
    );
    let scheduler = Scheduler::from_config(client.clone(), &config);

    tokio::select! {
        _ = scheduler.run() => {
            error!(critical = true, "Every supervised task stopped, shutting down");
        }
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => error!(critical = true, "Received cancellation signal, shutting down"),
            Err(e) => error!(
                critical = true,
                exception = %e,
                "Failed to listen for cancellation signal, shutting down"
            ),
        },
    }

    client.close().await;
    info!("Reddit session closed");
    Ok(())
}
