//! Discharge HTTP endpoints. `kind` is `actual` or `predicted`.
//!
//! - POST /api/v1/discharges/:kind/recalculate
//! - POST /api/v1/discharges/:kind/compare
//! - POST /api/v1/discharges/:kind/sensors/:sensor_code/process?start_date=&end_date=
//! - GET /api/v1/discharges/:kind/sensors/:sensor_code/summary?start_date=&end_date=

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use utoipa::{IntoParams, ToSchema};

use crate::db::models::SeriesKind;
use crate::errors::{AppError, ErrorResponse};
use crate::services::discharge::{self, DischargeSummary, ProcessReport};
use crate::services::recalculation::{
    compare_curves, recalculate_with_curve, ComparisonReport, RecalculationReport,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecalculateRequest {
    pub sensor_code: String,
    pub rating_curve_id: i64,
    /// First day of the range (inclusive)
    pub start_date: NaiveDate,
    /// Last day of the range (inclusive)
    pub end_date: NaiveDate,
    /// Store the results; when false (default) this is a dry run
    #[serde(default)]
    pub save_results: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompareRequest {
    pub sensor_code: String,
    pub curve1_id: i64,
    pub curve2_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RangeQuery {
    /// First day of the range (inclusive); open when absent
    pub start_date: Option<NaiveDate>,
    /// Last day of the range (inclusive); open when absent
    pub end_date: Option<NaiveDate>,
}

/// Recompute discharges for a sensor with a chosen rating curve.
///
/// With `save_results = false` nothing is written and the response shows
/// what would change.
#[utoipa::path(
    post,
    path = "/api/v1/discharges/{kind}/recalculate",
    tag = "Discharges",
    params(("kind" = SeriesKind, Path, description = "Series kind")),
    request_body = RecalculateRequest,
    responses(
        (status = 200, description = "Recalculation report", body = RecalculationReport),
        (status = 404, description = "Curve or samples not found", body = ErrorResponse),
        (status = 422, description = "Curve belongs to another sensor or bad range", body = ErrorResponse),
    )
)]
pub async fn recalculate(
    State(pool): State<PgPool>,
    Path(kind): Path<SeriesKind>,
    Json(req): Json<RecalculateRequest>,
) -> Result<Json<RecalculationReport>, AppError> {
    let report = recalculate_with_curve(
        &pool,
        kind,
        &req.sensor_code,
        req.rating_curve_id,
        req.start_date,
        req.end_date,
        req.save_results,
    )
    .await?;
    Ok(Json(report))
}

/// Compare two rating curves of a sensor over the same samples.
#[utoipa::path(
    post,
    path = "/api/v1/discharges/{kind}/compare",
    tag = "Discharges",
    params(("kind" = SeriesKind, Path, description = "Series kind")),
    request_body = CompareRequest,
    responses(
        (status = 200, description = "Comparison report", body = ComparisonReport),
        (status = 404, description = "Curve or samples not found", body = ErrorResponse),
        (status = 422, description = "Same curve twice or curve of another sensor", body = ErrorResponse),
    )
)]
pub async fn compare(
    State(pool): State<PgPool>,
    Path(kind): Path<SeriesKind>,
    Json(req): Json<CompareRequest>,
) -> Result<Json<ComparisonReport>, AppError> {
    let report = compare_curves(
        &pool,
        kind,
        &req.sensor_code,
        req.curve1_id,
        req.curve2_id,
        req.start_date,
        req.end_date,
    )
    .await?;
    Ok(Json(report))
}

/// Compute and store discharges with the curve active on each sample's date.
#[utoipa::path(
    post,
    path = "/api/v1/discharges/{kind}/sensors/{sensor_code}/process",
    tag = "Discharges",
    params(
        ("kind" = SeriesKind, Path, description = "Series kind"),
        ("sensor_code" = String, Path, description = "Sensor code"),
        RangeQuery,
    ),
    responses(
        (status = 200, description = "Batch report", body = ProcessReport),
        (status = 422, description = "Invalid range", body = ErrorResponse),
    )
)]
pub async fn process(
    State(pool): State<PgPool>,
    Path((kind, sensor_code)): Path<(SeriesKind, String)>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<ProcessReport>, AppError> {
    let report =
        discharge::process_range(&pool, kind, &sensor_code, range.start_date, range.end_date)
            .await?;
    Ok(Json(report))
}

/// Summary statistics of stored discharges for a sensor.
#[utoipa::path(
    get,
    path = "/api/v1/discharges/{kind}/sensors/{sensor_code}/summary",
    tag = "Discharges",
    params(
        ("kind" = SeriesKind, Path, description = "Series kind"),
        ("sensor_code" = String, Path, description = "Sensor code"),
        RangeQuery,
    ),
    responses(
        (status = 200, description = "Discharge summary", body = DischargeSummary),
        (status = 404, description = "No stored discharges in range", body = ErrorResponse),
    )
)]
pub async fn summary(
    State(pool): State<PgPool>,
    Path((kind, sensor_code)): Path<(SeriesKind, String)>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<DischargeSummary>, AppError> {
    let summary = discharge::summary(&pool, kind, &sensor_code, range.start_date, range.end_date)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No {} discharges stored for sensor {} in the requested range",
                kind, sensor_code
            ))
        })?;
    Ok(Json(summary))
}
