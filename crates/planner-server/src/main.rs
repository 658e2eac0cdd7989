//! crypto-planner server
//!
//! Runs the Telegram bot (long polling), the daily broadcast and a small
//! axum HTTP surface for health checks, manual broadcasts and report
//! previews.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use market_feeds::{CoinGeckoClient, CryptoPanicClient, FearGreedClient};
use planner_core::{
    AlertDialogEngine, BroadcastScheduler, ChatRouter, DraftTable, Localizer, ReportAggregator,
    StaticLocalizer,
};
use planner_runtime::{SqliteStore, TelegramClient, TelegramConfig, UpdatePoller};

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    // Storage
    let store = Arc::new(SqliteStore::connect(&config.database_url, config.default_locale).await?);
    tracing::info!("✓ Database ready at {}", config.database_url);

    // Upstream feeds
    let market = Arc::new(CoinGeckoClient::from_config(&config.feeds)?);
    let sentiment = Arc::new(FearGreedClient::from_config(&config.feeds)?);
    let news = Arc::new(CryptoPanicClient::from_config(&config.feeds)?);
    if !news.is_configured() {
        tracing::warn!("⚠ CRYPTOPANIC_TOKEN not set - news block disabled");
    }

    let localizer: Arc<dyn Localizer> = Arc::new(StaticLocalizer::new());
    let reports = Arc::new(ReportAggregator::new(
        market,
        sentiment,
        news,
        localizer.clone(),
        config.report_config(),
    ));

    // Telegram
    let telegram = Arc::new(TelegramClient::new(TelegramConfig::new(config.telegram_token.clone()))?);
    match telegram.get_me().await {
        Ok(bot_id) => tracing::info!("✓ Connected to Telegram as bot {}", bot_id),
        Err(e) => tracing::warn!("⚠ Telegram getMe failed: {} - polling will keep retrying", e),
    }

    // Chat handling
    let dialog = Arc::new(
        AlertDialogEngine::new(Arc::new(DraftTable::new()), store.clone(), localizer.clone())
            .with_fiat(config.feeds.fiat.clone()),
    );
    let router = Arc::new(ChatRouter::new(
        store.clone(),
        store.clone(),
        dialog,
        reports.clone(),
        localizer,
    ));
    tokio::spawn(UpdatePoller::new(telegram.clone(), router).run());

    // Daily broadcast
    let scheduler = Arc::new(
        BroadcastScheduler::new(store.clone(), reports.clone(), telegram, config.schedule)
            .with_concurrency(config.broadcast_concurrency),
    );
    tokio::spawn(scheduler.clone().run_daily());

    let state = AppState { reports, scheduler, store };
    let app = handlers::routes(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 crypto-planner running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!(
        "Daily broadcast at {} {} ({} workers)",
        config.schedule.at.format("%H:%M"),
        config.schedule.tz,
        config.broadcast_concurrency
    );
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health              - Health check");
    tracing::info!("  POST /api/broadcast       - Broadcast the report now");
    tracing::info!("  GET  /api/report/{{locale}} - Preview a report");

    axum::serve(listener, app).await?;

    Ok(())
}
