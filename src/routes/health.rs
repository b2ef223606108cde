use axum::extract::State;
use axum::Json;
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::services::forecasting::ForecastingClient;

/// State for the health endpoint.
#[derive(Clone)]
pub(crate) struct HealthState {
    pub(crate) pool: PgPool,
    pub(crate) forecasting: Option<ForecastingClient>,
}

/// Reachability of the external forecasting service.
#[derive(Debug, Serialize, ToSchema)]
pub struct ForecastingServiceHealth {
    pub url: String,
    pub reachable: bool,
    /// Status reported by the service itself, if any
    pub status: Option<String>,
    /// Whether the service reports its model as loaded, if it says
    pub model_loaded: Option<bool>,
    pub error: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status ("ok" when healthy, "degraded" when a dependency is unreachable)
    pub status: String,
    /// API version
    pub version: String,
    /// Whether the database is reachable
    pub database: bool,
    /// Forecasting service probe; absent when no URL is configured
    pub forecasting_service: Option<ForecastingServiceHealth>,
}

/// Health check endpoint.
///
/// Verifies database connectivity and, when configured, probes the
/// forecasting service. Returns status "degraded" (still 200) if either is
/// unreachable, so load balancers can distinguish partial failures.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<HealthState>) -> Json<HealthResponse> {
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .is_ok();

    let forecasting_service = match &state.forecasting {
        Some(client) => Some(match client.health().await {
            Ok(h) => ForecastingServiceHealth {
                url: client.base_url().to_string(),
                reachable: true,
                status: h.status,
                model_loaded: h.model_loaded,
                error: None,
            },
            Err(e) => {
                tracing::warn!("Forecasting service health probe failed: {}", e);
                ForecastingServiceHealth {
                    url: client.base_url().to_string(),
                    reachable: false,
                    status: None,
                    model_loaded: None,
                    error: Some(e.to_string()),
                }
            }
        }),
        None => None,
    };

    let forecasting_ok = forecasting_service.as_ref().map_or(true, |f| f.reachable);

    Json(HealthResponse {
        status: if db_ok && forecasting_ok {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_ok,
        forecasting_service,
    })
}
