//! # funnelhubd — funnelhub daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (`funnelhub.toml`, env vars)
//! - Install the tracing subscriber
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repositories, collaborators and application services
//! - Register task handlers and start the scheduler runtime
//! - Build the axum router and serve it
//! - Handle graceful shutdown (SIGTERM/SIGINT), then drain the runtime
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use funnelhub_adapter_http_axum::state::AppState;
use funnelhub_adapter_storage_sqlite_sqlx::{
    Config as DatabaseConfig, SqliteAutomationRepository, SqliteRecordRepository,
    SqliteTaskRepository,
};
use funnelhub_adapter_virtual::LogMailer;
use funnelhub_adapter_webhook_reqwest::ReqwestWebhookClient;
use funnelhub_app::action_executor::{ActionExecutor, DeferredActionHandler};
use funnelhub_app::automation_engine::AutomationEngine;
use funnelhub_app::clock::{Clock, SystemClock};
use funnelhub_app::dispatcher::Dispatcher;
use funnelhub_app::event_bus::InProcessEventBus;
use funnelhub_app::runtime::{Runtime, RuntimeConfig};
use funnelhub_app::services::automation_service::AutomationService;
use funnelhub_app::services::record_service::RecordService;
use funnelhub_app::services::task_service::TaskService;
use funnelhub_app::task_handler::HandlerRegistry;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Database
    let db = DatabaseConfig {
        database_url: config.database.url.clone(),
        max_connections: config.database.max_connections,
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Repositories
    let task_repo = SqliteTaskRepository::new(pool.clone());
    let automation_repo = SqliteAutomationRepository::new(pool.clone());
    let record_repo = SqliteRecordRepository::new(pool);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let event_bus = InProcessEventBus::new(config.scheduler.event_bus_capacity);
    let events = event_bus.subscribe();

    // Services
    let record_service = RecordService::new(record_repo.clone(), event_bus, clock.clone());
    let converter = record_service.converter();
    let task_service = TaskService::new(task_repo.clone(), clock.clone());
    let automation_service = AutomationService::new(automation_repo.clone(), clock.clone());

    // Automations
    let executor = Arc::new(ActionExecutor::new(
        record_repo.clone(),
        task_repo.clone(),
        LogMailer::new(),
        converter,
        ReqwestWebhookClient::new(config.webhook_timeout())?,
        clock.clone(),
    ));
    let engine = Arc::new(AutomationEngine::new(
        automation_repo,
        executor.clone(),
        clock.clone(),
    ));

    // Task handlers
    let mut handlers = HandlerRegistry::new();
    DeferredActionHandler::new(executor).register(&mut handlers);
    funnelhub_adapter_virtual::register_handlers(&mut handlers, record_repo);
    tracing::info!(task_types = ?handlers.task_types(), "task handlers registered");
    let dispatcher = Arc::new(
        Dispatcher::new(task_repo, handlers, clock).with_batch_size(config.scheduler.batch_size),
    );

    let runtime = Runtime::start(
        RuntimeConfig {
            dispatch_interval: config.dispatch_interval(),
            sweep_interval: config.sweep_interval(),
        },
        dispatcher,
        engine,
        events,
    );

    // HTTP
    let state = AppState::new(task_service, automation_service, record_service);
    let app = funnelhub_adapter_http_axum::router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "funnelhubd listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    runtime.shutdown().await;
    served?;
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
