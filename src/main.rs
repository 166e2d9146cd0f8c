//! # planbot
//!
//! Plans bot binary: wires settings, store, rollover engine and the Telegram
//! webhook server together.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use planbot_core::{Clock, SystemClock};
use planbot_engine::{ArchiveWriter, RolloverEngine};
use planbot_server::{AppState, ServerConfig, UpdateHandler};
use planbot_settings::PlanbotSettings;
use planbot_store::PlanStore;
use planbot_telegram::{BotApi, HttpBotApi, ThreadGate};
use planbot_telemetry::TelemetryConfig;
use tracing::{info, warn};

/// Telegram bot that keeps per-user monthly plan lists.
#[derive(Parser, Debug)]
#[command(name = "planbot", about = "Telegram plans bot")]
struct Cli {
    /// Settings file (defaults to `$PLANBOT_CONFIG` or `planbot.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to bind (overrides settings and `PORT`).
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the webhook server (default).
    Serve,
    /// Run one archive-and-purge pass and exit.
    Rollover {
        /// Day to run for, `YYYY-MM-DD` (defaults to today in the configured timezone).
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = planbot_settings::load_settings(cli.config.as_deref())
        .context("failed to load settings")?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    let telemetry = TelemetryConfig::from_names(&settings.logging.level, &settings.logging.format)?
        .with_module_levels(
            settings
                .logging
                .modules
                .iter()
                .map(|(target, level)| (target.as_str(), level.as_str())),
        )?;
    planbot_telemetry::init_telemetry(&telemetry)?;

    let tz = settings.schedule.timezone()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(tz));
    let store = Arc::new(PlanStore::open(&settings.storage.data_file));
    let engine = Arc::new(RolloverEngine::new(
        Arc::clone(&store),
        ArchiveWriter::new(&settings.storage.archive_dir),
    ));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(settings, store, engine, clock).await,
        Command::Rollover { date } => {
            let today = date.unwrap_or_else(|| clock.today());
            let report = tokio::task::spawn_blocking(move || engine.run(today)).await?;
            println!("{report}");
            if !report.is_success() {
                bail!("rollover for {today} finished with errors");
            }
            Ok(())
        }
    }
}

async fn serve(
    settings: PlanbotSettings,
    store: Arc<PlanStore>,
    engine: Arc<RolloverEngine>,
    clock: Arc<dyn Clock>,
) -> Result<()> {
    settings.validate()?;

    let bot: Arc<dyn BotApi> = Arc::new(HttpBotApi::new(
        &settings.telegram.api_base_url,
        settings.telegram.bot_token.clone(),
    )?);
    let gate = Arc::new(ThreadGate::new(
        settings.telegram.topic_name.clone(),
        settings
            .telegram
            .pinned_threads
            .iter()
            .map(|t| (t.chat_id, t.thread_id)),
    ));

    let server = &settings.server;
    match server.webhook_url() {
        Some(url) => match bot.set_webhook(&url, server.webhook_secret.as_ref()).await {
            Ok(()) => info!(%url, "webhook registered"),
            Err(e) => warn!(error = %e, kind = e.error_kind(), "webhook registration failed"),
        },
        None => warn!("no public URL configured, webhook not registered"),
    }

    let state = AppState {
        handler: Arc::new(UpdateHandler::new(
            Arc::clone(&store),
            Arc::clone(&bot),
            gate,
            Arc::clone(&clock),
        )),
        engine,
        store,
        clock,
        webhook_secret: server.webhook_secret.clone(),
        cleanup_token: server.cleanup_token.clone(),
    };
    let config = ServerConfig {
        host: server.host.clone(),
        port: server.port,
        webhook_path: server.webhook_path.clone(),
    };

    let handle = planbot_server::start(&config, state)
        .await
        .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?;
    info!(port = handle.local_addr.port(), topic = %settings.telegram.topic_name, "planbot ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    info!("shutting down");
    handle.shutdown().await;
    Ok(())
}
