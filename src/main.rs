use anyhow::Context;
use pipesub::{init_logging, PubSub, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    let logging = init_logging(&settings.logging).context("failed to initialize logging")?;

    let broker = PubSub::with_config(&settings.broker);
    tracing::info!(
        auto_create_topics = broker.auto_create_topics(),
        default_limit = settings.broker.default_limit,
        "Broker started, waiting for ctrl-c"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    broker
        .graceful_shutdown(settings.broker.shutdown_timeout())
        .await?;

    logging.shutdown();
    Ok(())
}
