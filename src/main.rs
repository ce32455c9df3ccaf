//! Trellis Dataspace Connector entry point.
//!
//! Control plane and data plane run in one process. Reads configuration
//! from a TOML file (~/.config/trellis-connector/config.toml).

use std::sync::Arc;

use sea_orm_migration::MigratorTrait;
use tracing::{error, info, warn};

use trellis_connector::application::events::CallbackDispatcher;
use trellis_connector::application::{
    HttpRemoteMessageDispatcher, NoopProvisioner, TransferProcessManager, TransferProcessService,
};
use trellis_connector::dataplane::http_sink::HttpDataSinkFactory;
use trellis_connector::dataplane::opcua::OpcUaDataSourceFactory;
use trellis_connector::dataplane::{
    DataPlaneManager, FlowRegistry, PipelineService, TokenService,
};
use trellis_connector::domain::SharedTransferProcessRepository;
use trellis_connector::infrastructure::database::migrator::Migrator;
use trellis_connector::infrastructure::database::SeaOrmTransferProcessRepository;
use trellis_connector::shared::shutdown::ShutdownCoordinator;
use trellis_connector::{
    create_api_router, create_event_bus, default_config_path, init_database, AppConfig,
    DatabaseConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Load configuration ─────────────────────────────────────
    let config_path = std::env::var("CONNECTOR_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| default_config_path());
    let app_cfg = match AppConfig::load(&config_path) {
        Ok(cfg) => {
            // Initialize logging with configured level
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level)),
                )
                .init();
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .init();
            warn!("Failed to load config: {}. Using defaults.", e);
            AppConfig::default()
        }
    };

    info!("Starting Trellis Dataspace Connector...");

    // ── Prometheus metrics recorder (must be installed before any metrics calls) ──
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    info!("📊 Prometheus metrics recorder installed");

    // ── Database ───────────────────────────────────────────────
    let db_config = DatabaseConfig {
        url: app_cfg.database.url.clone(),
    };
    info!("Database: {}", db_config.url);

    let db = match init_database(&db_config).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };

    info!("Running database migrations...");
    if let Err(e) = Migrator::up(&db, None).await {
        error!("Failed to run migrations: {}", e);
        return Err(e.into());
    }
    info!("Migrations completed");

    let repository: SharedTransferProcessRepository =
        Arc::new(SeaOrmTransferProcessRepository::new(db.clone()));

    // ── Event bus for callbacks and monitoring ─────────────────
    let event_bus = create_event_bus();
    info!("🔔 Event bus initialized");

    // ── Data plane: adapters, registry, manager ────────────────
    let http_client = reqwest::Client::new();

    let mut pipeline = PipelineService::new();
    pipeline.register_source_factory(Arc::new(OpcUaDataSourceFactory::new()));
    pipeline.register_sink_factory(Arc::new(HttpDataSinkFactory::new(http_client.clone())));
    let pipeline = Arc::new(pipeline);

    let flow_registry = Arc::new(FlowRegistry::new());
    let (data_plane, flow_completions) = DataPlaneManager::new(
        pipeline.clone(),
        flow_registry.clone(),
        event_bus.clone(),
        app_cfg.data_plane.max_flows,
    );
    let data_plane = Arc::new(data_plane);

    let token_service = Arc::new(TokenService::new(
        &app_cfg.token.secret,
        app_cfg.token.ttl_seconds,
    ));

    // ── Control plane ──────────────────────────────────────────
    let service = Arc::new(TransferProcessService::new(
        repository.clone(),
        token_service.clone(),
        event_bus.clone(),
    ));

    let dispatcher = Arc::new(HttpRemoteMessageDispatcher::new(
        http_client.clone(),
        app_cfg.data_plane.dispatch_token.clone(),
    ));

    let state_machine = Arc::new(TransferProcessManager::new(
        repository.clone(),
        Arc::new(NoopProvisioner),
        dispatcher,
        data_plane,
        event_bus.clone(),
        app_cfg.state_machine.clone(),
        flow_completions,
    ));

    // ── Shutdown coordination ──────────────────────────────────
    let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
    let shutdown_signal = shutdown.signal();
    shutdown.start_signal_listener();

    // Start the state machine ticker
    state_machine.start(shutdown_signal.clone());

    // Start callback delivery
    let callback_dispatcher = Arc::new(CallbackDispatcher::new(
        http_client,
        repository.clone(),
        event_bus.clone(),
    ));
    callback_dispatcher.start(shutdown_signal.clone());

    // ── REST API server ────────────────────────────────────────
    let api_router = create_api_router(
        service,
        repository,
        flow_registry,
        pipeline,
        token_service,
        db.clone(),
        prometheus_handle,
        &app_cfg,
    );

    let api_addr = app_cfg.address();
    let listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("REST API server listening on http://{}", api_addr);
    info!("Swagger UI available at http://{}/docs/", api_addr);

    let api_shutdown = shutdown_signal.clone();
    let api_server = axum::serve(listener, api_router).with_graceful_shutdown(async move {
        api_shutdown.wait().await;
        info!("🛑 REST API server received shutdown signal");
    });

    info!("🚀 Connector started. Press Ctrl+C to shutdown gracefully.");
    if let Err(e) = api_server.await {
        error!("REST API server error: {}", e);
    }

    // Perform final cleanup
    info!("🧹 Performing final cleanup...");

    if let Err(e) = db.close().await {
        warn!("Error closing database connection: {}", e);
    } else {
        info!("✅ Database connection closed");
    }

    info!("👋 Trellis Dataspace Connector shutdown complete");
    Ok(())
}
