use std::sync::Arc;
use std::time::Duration;

use agentloop::broadcast::BroadcastBus;
use agentloop::configuration::get_configuration;
use agentloop::database::{get_connection_pool, migrate_database};
use agentloop::llm::ReqwestLlmClient;
use agentloop::{Orchestrator, OrchestratorFacade, Store};
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentloop=info".into()),
        )
        .init();

    dotenvy::dotenv().ok();

    let settings = get_configuration().expect("failed to read configuration");
    let settings = Arc::new(settings);

    let pool = get_connection_pool(&settings)
        .await
        .expect("failed to create database connection pool");
    migrate_database(&pool)
        .await
        .expect("failed to run database migrations");

    let llm_client = Arc::new(ReqwestLlmClient::new(
        settings.llm.base_url.clone(),
        settings.llm.api_key.clone(),
        Duration::from_secs(settings.llm.request_timeout_seconds),
    ));

    let store = Store::new(pool);
    let bus = BroadcastBus::new();
    let orchestrator = Orchestrator::new(
        store,
        bus,
        llm_client.clone(),
        llm_client,
        settings.clone(),
    );

    let reconciled = orchestrator
        .run_startup_reconciliation()
        .await
        .expect("startup reconciliation failed");
    if reconciled > 0 {
        info!(count = reconciled, "reconciled stale sessions at startup");
    }

    // Recurring sweep for sessions left `running` by a process that died
    // between sweeps; owned by this process's lifetime, not by any facade
    // caller.
    let _sweeper = orchestrator.spawn_stale_sweeper();

    let facade = OrchestratorFacade::new(orchestrator);

    info!("orchestrator ready; hand `facade` to whatever request surface drives it");

    // This binary is the engine's process shell only (§1: transport is an
    // external collaborator). It wires Store/Orchestrator/LLM/Broadcast and
    // keeps the stale-session sweeper alive; an HTTP/WebSocket front end
    // would be layered on top of `facade` by a separate crate.
    let _ = facade;
    std::future::pending::<()>().await;
}
