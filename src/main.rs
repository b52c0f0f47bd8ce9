//! Shelfwatch binary — configuration, wiring, startup checks, and the
//! interactive command loop.

mod commands;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use shelfwatch_catalog::{CatalogClient, SessionManager};
use shelfwatch_channels::{TelegramGateway, format};
use shelfwatch_core::AppConfig;
use shelfwatch_core::traits::SubscriberSource;
use shelfwatch_core::types::StockEvent;
use shelfwatch_notify::Dispatcher;
use shelfwatch_registry::{SubscriptionRegistry, SubscriptionStore};
use shelfwatch_scheduler::{PollEngine, run_poll_loop};

#[derive(Parser)]
#[command(
    name = "shelfwatch",
    version,
    about = "Storefront stock watcher and notifier"
)]
struct Cli {
    /// Config file path (default: ~/.shelfwatch/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the poll interval in seconds
    #[arg(long)]
    check_interval: Option<u64>,

    /// Override the quiet-hours timezone (IANA name, e.g. Asia/Kolkata)
    #[arg(long)]
    timezone: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "shelfwatch=debug"
    } else {
        "shelfwatch=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => {
            let expanded = shellexpand::tilde(path).to_string();
            AppConfig::load_from(Path::new(&expanded))?
        }
        None => AppConfig::load()?,
    };
    if let Some(secs) = cli.check_interval {
        config.scheduler.check_interval_secs = secs;
    }
    if cli.timezone.is_some() {
        config.notify.timezone = cli.timezone.clone();
    }

    let token = config.bot_token()?;

    // Load persisted subscriptions before serving any request.
    let data_dir = PathBuf::from(shellexpand::tilde(&config.store.data_dir).to_string());
    let registry = Arc::new(SubscriptionRegistry::load(SubscriptionStore::new(&data_dir)));

    // Verify the gateway credential once up front.
    let gateway = Arc::new(TelegramGateway::new(
        &token,
        config.telegram.poll_timeout_secs,
    )?);
    let me = gateway.get_me().await?;
    tracing::info!(
        "Authorized as @{}",
        me.username.as_deref().unwrap_or("unknown")
    );

    // No session means nothing else can function, so a failed startup
    // refresh is fatal. Steady-state failures are retried per cycle.
    let session = Arc::new(SessionManager::new(config.catalog.clone())?);
    session.ensure_session(&config.catalog.default_store).await?;
    let catalog = Arc::new(CatalogClient::new(session, &config.catalog.base_url));

    let base_url = config.catalog.base_url.clone();
    let dispatcher = Arc::new(Dispatcher::new(
        registry.clone(),
        gateway.clone(),
        Arc::new(move |event: &StockEvent| format::render_event(event, &base_url)),
        &config.notify,
    ));

    let engine = Arc::new(PollEngine::new(
        catalog,
        registry.clone(),
        dispatcher.clone(),
        &config.catalog.default_store,
    ));

    // Startup self-test notice, quiet-hours gated like every other send.
    if let Some(admin) = config.telegram.admin_chat_id {
        let recipients = registry.all_subscriptions().len();
        let tracked = registry.target_item_ids().len();
        let notice =
            format::render_startup_notice(recipients, tracked, config.notify.timezone.is_some());
        if !dispatcher.send_notice(admin, &notice).await {
            tracing::warn!("Startup notice not delivered (failed or quiet hours)");
        }
    }

    // Baseline cycle so already-in-stock subscribed items notify right away.
    if let Err(e) = engine.cycle().await {
        tracing::warn!("Baseline stock check failed: {e}");
    }

    // The periodic driver runs in the background; the command loop owns
    // the foreground. Process exit drops both without awaiting in-flight
    // sends.
    tokio::spawn(run_poll_loop(
        engine.clone(),
        config.scheduler.check_interval_secs,
    ));

    commands::run_command_loop(gateway, registry, dispatcher, engine, config).await;
    Ok(())
}
