use dotenvy::dotenv;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use common::actors::{Actor, ActorType};
use common::logger;
use exchange::{BybitClient, SharedGateway};

use crate::actors::supervisor::Supervisor;
use crate::config::Settings;
use crate::services::channel_listener::ChannelListener;
use crate::services::execution_service::ExecutionService;
use crate::services::telegram_service::TelegramService;
use crate::traits::MessageSource;

mod actors;
mod config;
mod services;
mod traits;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    logger::setup_logger();
    debug!("System starting up...");

    let settings = Settings::from_env().inspect_err(|e| error!("Invalid configuration: {}", e))?;
    info!(
        "Risk {}% of {} USDT per signal, TP weights {:?}",
        settings.risk.risk_percent,
        settings.risk.balance,
        settings.allocation.weights()
    );

    let gateway: SharedGateway = Arc::new(BybitClient::new(settings.bybit)?);
    let execution = Arc::new(ExecutionService::new(
        gateway,
        settings.risk,
        Arc::new(settings.allocation),
    ));

    let source: Arc<dyn MessageSource> =
        Arc::new(TelegramService::connect(&settings.telegram_token).await?);

    let shutdown = CancellationToken::new();
    let mut supervisor = Supervisor::new(shutdown.clone());

    let channel_name = settings.channel_name;
    let poll_interval = settings.poll_interval;
    let listener_shutdown = shutdown.clone();
    supervisor.register_actor(
        ActorType::ChannelListener,
        Box::new(move || -> Box<dyn Actor> {
            Box::new(ChannelListener::new(
                channel_name.clone(),
                source.clone(),
                execution.clone(),
                poll_interval,
                listener_shutdown.clone(),
            ))
        }),
    );

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Ctrl-C received, stopping...");
        shutdown.cancel();
    });

    supervisor.start().await;
    info!("Bot stopped.");
    Ok(())
}
