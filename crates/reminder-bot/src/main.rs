//! Conversational reminder bot.
//!
//! Receives transport events over HTTP, drives each user's conversation,
//! and fires reminders through the outbound gateway.
//!
//! ## Usage
//!
//! ```bash
//! # Log outbound messages instead of sending them
//! cargo run -p reminder-bot
//!
//! # Deliver through a relay and notify an operator account
//! GATEWAY_URL=http://localhost:9000 ADMIN_USER_ID=U123 cargo run -p reminder-bot
//! ```
//!
//! See [`config::Config::from_env`] for all variables.

mod config;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use database::Database;
use dispatcher::{replies, Command, Dispatcher, DispatcherConfig};
use gateway::{GatewayConfig, HttpGateway, LoggingGateway, MessageGateway};
use scheduler::{JobScheduler, SchedulerConfig, UserLocks};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!(addr = %config.addr, "Starting reminder bot");

    // Connect to database
    if let Some(dir) = config.database_dir() {
        std::fs::create_dir_all(dir)?;
    }
    let db = Database::connect(&config.database_url()).await?;
    db.migrate().await?;

    let gateway = build_gateway(&config)?;

    let scheduler = JobScheduler::new(
        db.clone(),
        gateway.clone(),
        UserLocks::new(),
        SchedulerConfig::default()
            .with_grace_period(config.grace_period)
            .with_tick(config.scheduler_tick)
            .with_fire_quick_actions(vec![Command::Snooze.quick_action()]),
    );

    // Restore timers before accepting any events
    scheduler.rehydrate().await?;

    let dispatcher = Arc::new(Dispatcher::new(
        db.clone(),
        gateway,
        scheduler.clone(),
        DispatcherConfig {
            picker_horizon_years: config.picker_horizon_years,
            admin_user_id: config.admin_user_id.clone(),
        },
    ));
    dispatcher.notify_operator(replies::SERVICE_STARTED).await;

    let scheduler_handle = scheduler.spawn();

    let state = AppState::new(db.clone(), dispatcher, scheduler);
    let app = routes::router().with_state(state);

    info!(addr = %config.addr, "Event feed listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Stopping scheduler");
    scheduler_handle.shutdown().await;
    db.close().await;
    info!("Shutdown complete");

    Ok(())
}

fn build_gateway(config: &Config) -> Result<Arc<dyn MessageGateway>, gateway::GatewayError> {
    let Some(url) = &config.gateway_url else {
        warn!("GATEWAY_URL not set; outbound messages will only be logged");
        return Ok(Arc::new(LoggingGateway));
    };

    let mut gateway_config = GatewayConfig::new(url);
    if let Some(token) = &config.gateway_token {
        gateway_config = gateway_config.with_token(token);
    }
    info!("Delivering messages through {}", gateway_config.base_url);
    Ok(Arc::new(HttpGateway::new(gateway_config)?))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
