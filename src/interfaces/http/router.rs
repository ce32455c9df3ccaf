//! API Router with Swagger UI

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::application::TransferProcessService;
use crate::config::AppConfig;
use crate::dataplane::registry::FlowSnapshot;
use crate::dataplane::{FlowRegistry, PipelineService, TokenService};
use crate::domain::SharedTransferProcessRepository;
use crate::interfaces::http::common::{ApiResponse, PaginatedResponse, PaginationParams};
use crate::interfaces::http::middleware::{auth_middleware, AuthState};
use crate::interfaces::http::modules::health::{self, HealthState};
use crate::interfaces::http::modules::metrics::middleware::http_metrics_middleware;
use crate::interfaces::http::modules::metrics::{self, MetricsState};
use crate::interfaces::http::modules::monitoring::{self, dto::ConnectorStatsDto, MonitoringState};
use crate::interfaces::http::modules::public_data::{self, PublicDataState};
use crate::interfaces::http::modules::transfer_processes::{self, dto, TransferAppState};

/// Security scheme modifier for OpenAPI
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Api-Key"))),
            );
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Consumer-pull data-plane token"))
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::handlers::health_check,
        // Transfer Processes
        transfer_processes::handlers::initiate_transfer_process,
        transfer_processes::handlers::list_transfer_processes,
        transfer_processes::handlers::get_transfer_process,
        transfer_processes::handlers::get_transfer_process_state,
        transfer_processes::handlers::terminate_transfer_process,
        transfer_processes::handlers::suspend_transfer_process,
        transfer_processes::handlers::resume_transfer_process,
        transfer_processes::handlers::deprovision_transfer_process,
        transfer_processes::handlers::get_pull_token,
        // Monitoring
        monitoring::handlers::list_data_flows,
        monitoring::handlers::get_stats,
        // Public data
        public_data::handlers::get_data,
    ),
    components(
        schemas(
            // Common
            ApiResponse<String>,
            PaginatedResponse<dto::TransferProcessDto>,
            PaginationParams,
            // Transfer Processes
            dto::TransferRequestDto,
            dto::TransferProcessDto,
            dto::TransferStateDto,
            dto::TerminateTransferDto,
            dto::SuspendTransferDto,
            dto::DataAddressDto,
            dto::CallbackAddressDto,
            dto::IdResponse,
            dto::PullTokenDto,
            crate::domain::TransferType,
            // Monitoring
            FlowSnapshot,
            ConnectorStatsDto,
            // Health
            health::HealthResponse,
            health::ComponentHealth,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Transfer Processes", description = "Initiate and control data transfers"),
        (name = "Monitoring", description = "Data-plane and state-machine visibility"),
        (name = "Public Data", description = "Consumer-pull data endpoint"),
        (name = "Health", description = "Service health")
    )
)]
struct ApiDoc;

/// Build the complete HTTP router.
#[allow(clippy::too_many_arguments)]
pub fn create_api_router(
    service: Arc<TransferProcessService>,
    repository: SharedTransferProcessRepository,
    flow_registry: Arc<FlowRegistry>,
    pipeline: Arc<PipelineService>,
    token_service: Arc<TokenService>,
    db: DatabaseConnection,
    prometheus_handle: PrometheusHandle,
    app_cfg: &AppConfig,
) -> Router {
    let auth_state = AuthState::new(&app_cfg.management.api_key);

    // Management: transfer processes (api-key protected)
    let transfer_routes = Router::new()
        .route(
            "/",
            post(transfer_processes::handlers::initiate_transfer_process)
                .get(transfer_processes::handlers::list_transfer_processes),
        )
        .route("/{id}", get(transfer_processes::handlers::get_transfer_process))
        .route(
            "/{id}/state",
            get(transfer_processes::handlers::get_transfer_process_state),
        )
        .route(
            "/{id}/terminate",
            post(transfer_processes::handlers::terminate_transfer_process),
        )
        .route(
            "/{id}/suspend",
            post(transfer_processes::handlers::suspend_transfer_process),
        )
        .route(
            "/{id}/resume",
            post(transfer_processes::handlers::resume_transfer_process),
        )
        .route(
            "/{id}/deprovision",
            post(transfer_processes::handlers::deprovision_transfer_process),
        )
        .route("/{id}/token", get(transfer_processes::handlers::get_pull_token))
        .layer(middleware::from_fn_with_state(
            auth_state.clone(),
            auth_middleware,
        ))
        .with_state(TransferAppState { service });

    // Management: monitoring (api-key protected)
    let monitoring_routes = Router::new()
        .route("/dataflows", get(monitoring::handlers::list_data_flows))
        .route("/stats", get(monitoring::handlers::get_stats))
        .layer(middleware::from_fn_with_state(
            auth_state.clone(),
            auth_middleware,
        ))
        .with_state(MonitoringState {
            flow_registry: flow_registry.clone(),
            repository,
        });

    // Public data plane (token auth happens in the handler)
    let public_routes = Router::new()
        .route("/data", get(public_data::handlers::get_data))
        .with_state(PublicDataState {
            token_service,
            pipeline,
        });

    let health_state = HealthState {
        db,
        flow_registry,
        started_at: Arc::new(Instant::now()),
    };

    let metrics_state = MetricsState {
        handle: prometheus_handle,
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let swagger_routes = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    Router::new()
        // Swagger UI
        .merge(swagger_routes)
        // Health
        .route(
            "/health",
            get(health::handlers::health_check).with_state(health_state),
        )
        // Prometheus scrape endpoint
        .route(
            "/metrics",
            get(metrics::handlers::prometheus_metrics).with_state(metrics_state),
        )
        // Management API
        .nest("/api/v1/management/transferprocesses", transfer_routes)
        .nest("/api/v1/management/monitoring", monitoring_routes)
        // Public data API
        .nest("/api/v1/public", public_routes)
        // Middleware
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
