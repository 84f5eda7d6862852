mod config;
use config::WorldwatchConfig;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use worldwatch_core::dashboard::DashboardServer;
use worldwatch_core::stream::PulsarConsumer;
use worldwatch_core::vector::AstraCollection;
use worldwatch_core::{FlowClient, LlmClient, RuntimeOptions, VectorStore, Worldwatch};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is normal outside development
    let _ = dotenvy::dotenv();

    // Logging / tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(target: "worldwatch", "Starting Worldwatch: Pulsar → Astra → OpenAI → Dashboard");

    // Load configuration (env + optional secrets file overlay)
    let cfg = WorldwatchConfig::load();
    cfg.validate()?;

    let consumer = PulsarConsumer::connect(&cfg.pulsar).await?;
    let store: Arc<dyn VectorStore> = Arc::new(AstraCollection::new(cfg.astra.clone())?);
    let llm = LlmClient::new(cfg.llm.clone())?;
    let flow = FlowClient::new(cfg.flow.clone())?;

    let runtime = Arc::new(Worldwatch::new(
        Box::new(consumer),
        store,
        llm,
        flow,
        RuntimeOptions {
            poll_interval: cfg.dashboard.poll_interval(),
            receive_timeout: cfg.pulsar.receive_timeout(),
        },
    ));

    // Ctrl+C handler to shutdown gracefully
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(target: "worldwatch", error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!(target: "worldwatch", "Shutting down...");
    };

    let server = DashboardServer::new(cfg.dashboard.clone(), Arc::clone(&runtime));
    if let Err(e) = server.serve_with_shutdown(shutdown).await {
        error!(target: "worldwatch", error = %e, "Dashboard server failed");
    }

    runtime.shutdown().await?;
    Ok(())
}
