use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gator::command::{Command, State};
use gator::config::Config;
use gator::db::Database;
use gator::fetcher::Fetcher;
use gator::handlers;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging; stdout is kept for command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config_path = Config::default_path()?;
    let config = Config::load(&config_path)
        .with_context(|| format!("unable to load config from {}", config_path.display()))?;

    // Initialize database
    let db = Database::new(&config.db_url)
        .await
        .with_context(|| format!("unable to connect to {}", config.db_url))?;
    db.initialize().await?;

    let fetcher = Fetcher::new(Duration::from_secs(config.fetch_timeout_secs))?;

    let mut state = State::new(
        config,
        Arc::new(db),
        Arc::new(fetcher),
        CancellationToken::new(),
    );
    let commands = handlers::registry();

    let mut args = std::env::args().skip(1);
    let Some(name) = args.next() else {
        commands
            .run(&mut state, Command::new("help", Vec::new()))
            .await?;
        std::process::exit(1);
    };

    // Only long-running commands watch the token; others keep the default SIGINT exit
    if handlers::is_long_running(&name) {
        let ctrl_c = state.shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Unable to listen for Ctrl-C: {}", e);
                return;
            }
            info!("Shutting down");
            ctrl_c.cancel();
        });
    }

    if let Err(e) = commands
        .run(&mut state, Command::new(name, args.collect()))
        .await
    {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    Ok(())
}
