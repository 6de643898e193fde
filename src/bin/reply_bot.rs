use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use harvestbot::{
    llm::{OllamaEngine, TextGenerator},
    reply::{InferenceQueue, ReplyGenerator},
    router::MessageRouter,
    telegram::TelegramClient,
    BotSettings,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = BotSettings::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(settings.log_level.to_lowercase()))
        .init();

    // The engine is built once here and shared by every inference worker.
    let llm_config = settings.llm_config();
    let engine = OllamaEngine::new(&llm_config)?;
    if let Err(e) = engine.warm_up().await {
        warn!("Could not load model {}: {}", engine.model(), e);
    }
    let engine: Arc<dyn TextGenerator> = Arc::new(engine);

    let generator = Arc::new(ReplyGenerator::new(
        engine,
        llm_config.params,
        settings.system_prompt.clone(),
    ));
    let queue = Arc::new(InferenceQueue::start(
        generator,
        settings.queue_capacity,
        settings.inference_workers,
        settings.generation_timeout(),
    ));

    let telegram = TelegramClient::new(&settings.telegram_api_url, &settings.bot_token)?;
    let router = Arc::new(MessageRouter::new(telegram, queue.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let polling = tokio::spawn(router.run_polling(
        std::time::Duration::from_secs(settings.poll_timeout_secs),
        shutdown_rx,
    ));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    shutdown_tx.send(true)?;
    polling.await?;

    // In-flight handlers may still hold the queue; only drain it once they are done.
    match Arc::try_unwrap(queue) {
        Ok(queue) => queue.shutdown().await,
        Err(_) => warn!("Handlers still running, skipping queue drain"),
    }

    Ok(())
}
