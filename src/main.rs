// Flood Discharge API v0.1
use axum::{
    http::Method,
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod errors;
mod helpers;
mod routes;
mod services;

use config::AppConfig;
use routes::health::HealthState;
use services::forecasting::ForecastingClient;
use services::worker::{SharedWorkerState, WorkerState};

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 10;
/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 2;

/// Flood Discharge API: OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Flood Discharge API",
        version = "0.1.0",
        description = "Converts river water-level readings into discharge using per-sensor \
            rating curves with effective dates, recalculates and compares historical \
            discharges, and classifies sensor readings against dated threshold templates.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Worker", description = "Background discharge worker status"),
        (name = "Rating curves", description = "Rating curve management and evaluation"),
        (name = "Discharges", description = "Discharge processing, recalculation and comparison"),
        (name = "Thresholds", description = "Threshold templates, levels and sensor assignments"),
    ),
    paths(
        routes::health::health_check,
        routes::worker::get_worker_status,
        routes::rating_curves::list_rating_curves,
        routes::rating_curves::create_rating_curve,
        routes::rating_curves::get_rating_curve,
        routes::rating_curves::update_rating_curve,
        routes::rating_curves::delete_rating_curve,
        routes::rating_curves::calculate_discharge,
        routes::rating_curves::get_active_rating_curve,
        routes::rating_curves::get_rating_curve_history,
        routes::discharges::recalculate,
        routes::discharges::compare,
        routes::discharges::process,
        routes::discharges::summary,
        routes::thresholds::list_templates,
        routes::thresholds::create_template,
        routes::thresholds::get_template,
        routes::thresholds::update_template,
        routes::thresholds::delete_template,
        routes::thresholds::add_level,
        routes::thresholds::update_level,
        routes::thresholds::delete_level,
        routes::thresholds::list_assignments,
        routes::thresholds::create_assignment,
        routes::thresholds::update_assignment,
        routes::thresholds::delete_assignment,
        routes::thresholds::get_sensor_threshold,
        routes::thresholds::classify,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::health::ForecastingServiceHealth,
            services::worker::WorkerState,
            services::worker::SensorRunStatus,
            services::rating_curve::FormulaType,
            services::rating_curve::FormulaDescription,
            services::rating_curve::FormulaParameter,
            routes::rating_curves::CreateRatingCurveRequest,
            routes::rating_curves::UpdateRatingCurveRequest,
            routes::rating_curves::CalculateRequest,
            routes::rating_curves::RatingCurveResponse,
            routes::rating_curves::CalculationResponse,
            routes::rating_curves::CurveHistoryEntry,
            routes::rating_curves::CurveHistoryResponse,
            db::models::SeriesKind,
            routes::discharges::RecalculateRequest,
            routes::discharges::CompareRequest,
            services::discharge::SampleError,
            services::discharge::ProcessReport,
            services::discharge::LatestDischarge,
            services::discharge::DischargeSummary,
            services::recalculation::SeriesStats,
            services::recalculation::RecalculatedSample,
            services::recalculation::ComparedSample,
            services::recalculation::ComparisonSummary,
            services::recalculation::CurveRef,
            services::recalculation::RecalculationReport,
            services::recalculation::ComparisonReport,
            services::threshold::Severity,
            services::threshold::ParameterType,
            services::threshold::Level,
            routes::thresholds::CreateTemplateRequest,
            routes::thresholds::UpdateTemplateRequest,
            routes::thresholds::LevelRequest,
            routes::thresholds::CreateAssignmentRequest,
            routes::thresholds::UpdateAssignmentRequest,
            routes::thresholds::TemplateResponse,
            routes::thresholds::AssignmentResponse,
            routes::thresholds::SensorThresholdResponse,
            routes::thresholds::ClassificationResponse,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flood_discharge_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    // Set up database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .min_connections(DB_POOL_MIN_CONNECTIONS)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    // Forecasting service client (health probe only)
    let forecasting = match config.forecasting_service_url.as_deref() {
        Some(url) => match ForecastingClient::new(url) {
            Ok(client) => {
                tracing::info!("Forecasting service configured at {}", client.base_url());
                Some(client)
            }
            Err(e) => {
                tracing::error!("Forecasting service client disabled: {}", e);
                None
            }
        },
        None => {
            tracing::info!("FORECASTING_SERVICE_URL not set, skipping forecasting probe");
            None
        }
    };

    // Shared worker state; the worker itself only runs when enabled
    let worker_state: SharedWorkerState = Arc::new(RwLock::new(WorkerState::new(
        config.worker_enabled,
        config.worker_interval_secs,
        config.worker_lookback_hours,
    )));
    if config.worker_enabled {
        tokio::spawn(services::worker::run_worker(
            pool.clone(),
            worker_state.clone(),
        ));
    } else {
        tracing::info!("Discharge worker disabled");
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    // Build router
    // Rating curve, discharge and threshold routes use PgPool state directly.
    let rating_curve_routes = Router::new()
        .route(
            "/api/v1/rating-curves",
            get(routes::rating_curves::list_rating_curves)
                .post(routes::rating_curves::create_rating_curve),
        )
        .route(
            "/api/v1/rating-curves/:id",
            get(routes::rating_curves::get_rating_curve)
                .put(routes::rating_curves::update_rating_curve)
                .delete(routes::rating_curves::delete_rating_curve),
        )
        .route(
            "/api/v1/rating-curves/:id/calculate",
            post(routes::rating_curves::calculate_discharge),
        )
        .route(
            "/api/v1/sensors/:sensor_code/rating-curves/active",
            get(routes::rating_curves::get_active_rating_curve),
        )
        .route(
            "/api/v1/sensors/:sensor_code/rating-curves/history",
            get(routes::rating_curves::get_rating_curve_history),
        )
        .with_state(pool.clone());

    let discharge_routes = Router::new()
        .route(
            "/api/v1/discharges/:kind/recalculate",
            post(routes::discharges::recalculate),
        )
        .route(
            "/api/v1/discharges/:kind/compare",
            post(routes::discharges::compare),
        )
        .route(
            "/api/v1/discharges/:kind/sensors/:sensor_code/process",
            post(routes::discharges::process),
        )
        .route(
            "/api/v1/discharges/:kind/sensors/:sensor_code/summary",
            get(routes::discharges::summary),
        )
        .with_state(pool.clone());

    let threshold_routes = Router::new()
        .route(
            "/api/v1/threshold-templates",
            get(routes::thresholds::list_templates).post(routes::thresholds::create_template),
        )
        .route(
            "/api/v1/threshold-templates/:code",
            get(routes::thresholds::get_template)
                .put(routes::thresholds::update_template)
                .delete(routes::thresholds::delete_template),
        )
        .route(
            "/api/v1/threshold-templates/:code/levels",
            post(routes::thresholds::add_level),
        )
        .route(
            "/api/v1/threshold-templates/:code/levels/:level_code",
            put(routes::thresholds::update_level).delete(routes::thresholds::delete_level),
        )
        .route(
            "/api/v1/threshold-assignments",
            get(routes::thresholds::list_assignments)
                .post(routes::thresholds::create_assignment),
        )
        .route(
            "/api/v1/threshold-assignments/:id",
            put(routes::thresholds::update_assignment)
                .delete(routes::thresholds::delete_assignment),
        )
        .route(
            "/api/v1/sensors/:sensor_code/threshold",
            get(routes::thresholds::get_sensor_threshold),
        )
        .route(
            "/api/v1/sensors/:sensor_code/threshold/classify",
            get(routes::thresholds::classify),
        )
        .with_state(pool.clone());

    // Health check verifies DB connectivity and probes the forecasting service
    let health_routes = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .with_state(HealthState { pool, forecasting });

    // Worker status uses SharedWorkerState
    let worker_routes = Router::new()
        .route(
            "/api/v1/worker/status",
            get(routes::worker::get_worker_status),
        )
        .with_state(worker_state);

    let app = Router::new()
        .merge(health_routes)
        .merge(worker_routes)
        .merge(rating_curve_routes)
        .merge(discharge_routes)
        .merge(threshold_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
