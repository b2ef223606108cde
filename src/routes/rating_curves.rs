//! Rating curve HTTP endpoints.
//!
//! - GET/POST /api/v1/rating-curves
//! - GET/PUT/DELETE /api/v1/rating-curves/:id
//! - POST /api/v1/rating-curves/:id/calculate
//! - GET /api/v1/sensors/:sensor_code/rating-curves/active?date=YYYY-MM-DD
//! - GET /api/v1/sensors/:sensor_code/rating-curves/history

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};

use crate::db::queries::{self, RatingCurveParams};
use crate::errors::{AppError, ErrorResponse};
use crate::helpers::{f64_to_decimal_coeff, opt_f64_to_decimal_coeff};
use crate::services::rating_curve::{
    calculate_for_display, get_active_for_sensor, load_timeline, Curve, Formula,
    FormulaDescription, FormulaType, DISCHARGE_UNIT,
};

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListQuery {
    /// Only curves of this sensor
    pub sensor_code: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DateQuery {
    /// Reference date (YYYY-MM-DD); defaults to today (UTC)
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRatingCurveRequest {
    pub code: String,
    pub sensor_code: String,
    pub formula_type: FormulaType,
    pub a: f64,
    pub b: Option<f64>,
    pub c: Option<f64>,
    pub effective_date: NaiveDate,
}

/// Partial update. Absent fields keep their value; `b` and `c` may be
/// cleared with an explicit `null`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRatingCurveRequest {
    pub code: Option<String>,
    pub sensor_code: Option<String>,
    pub formula_type: Option<FormulaType>,
    pub a: Option<f64>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<f64>)]
    pub b: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<f64>)]
    pub c: Option<Option<f64>>,
    pub effective_date: Option<NaiveDate>,
}

/// Distinguish an explicit `null` from a missing field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CalculateRequest {
    /// Water level (m), finite and >= 0
    pub water_level: f64,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct RatingCurveResponse {
    pub id: i64,
    pub code: String,
    pub sensor_code: String,
    pub formula_type: FormulaType,
    pub a: f64,
    pub b: Option<f64>,
    pub c: Option<f64>,
    pub effective_date: NaiveDate,
    /// Formula with coefficients substituted
    pub formula: String,
}

impl From<&Curve> for RatingCurveResponse {
    fn from(c: &Curve) -> Self {
        Self {
            id: c.id,
            code: c.code.clone(),
            sensor_code: c.sensor_code.clone(),
            formula_type: c.formula.kind,
            a: c.formula.a,
            b: c.formula.b,
            c: c.formula.c,
            effective_date: c.effective_date,
            formula: c.formula.display(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CalculationResponse {
    pub rating_curve_code: String,
    pub sensor_code: String,
    pub water_level: f64,
    /// Discharge rounded to 4 decimal places
    pub discharge: f64,
    pub unit: String,
    pub formula: FormulaDescription,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CurveHistoryEntry {
    pub rating_curve: RatingCurveResponse,
    pub effective_from: NaiveDate,
    /// Last day of validity; null for the curve currently in force
    pub effective_to: Option<NaiveDate>,
    pub is_current: bool,
    /// Replaced on its first day by a newer curve with the same date
    pub shadowed: bool,
    /// Stored discharges (actual + predicted) computed with this curve
    pub usage_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CurveHistoryResponse {
    pub sensor_code: String,
    pub periods: Vec<CurveHistoryEntry>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn params_from(
    code: String,
    sensor_code: String,
    formula: &Formula,
    effective_date: NaiveDate,
) -> RatingCurveParams {
    RatingCurveParams {
        code,
        sensor_code,
        formula_type: formula.kind.as_str().to_string(),
        a: f64_to_decimal_coeff(formula.a),
        b: opt_f64_to_decimal_coeff(formula.b),
        c: opt_f64_to_decimal_coeff(formula.c),
        effective_date,
    }
}

async fn fetch_curve(pool: &PgPool, id: i64) -> Result<Curve, AppError> {
    let row = queries::get_rating_curve(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Rating curve {} not found", id)))?;
    Curve::try_from(row)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// List rating curves, newest first per sensor.
#[utoipa::path(
    get,
    path = "/api/v1/rating-curves",
    tag = "Rating curves",
    params(ListQuery),
    responses(
        (status = 200, description = "Rating curves", body = Vec<RatingCurveResponse>),
    )
)]
pub async fn list_rating_curves(
    State(pool): State<PgPool>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<RatingCurveResponse>>, AppError> {
    let rows = queries::list_rating_curves(&pool, query.sensor_code.as_deref()).await?;
    let items = rows
        .into_iter()
        .map(|row| Curve::try_from(row).map(|c| RatingCurveResponse::from(&c)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(items))
}

/// Create a rating curve (a new calibration).
#[utoipa::path(
    post,
    path = "/api/v1/rating-curves",
    tag = "Rating curves",
    request_body = CreateRatingCurveRequest,
    responses(
        (status = 201, description = "Rating curve created", body = RatingCurveResponse),
        (status = 400, description = "Missing code or sensor", body = ErrorResponse),
        (status = 409, description = "Code already in use", body = ErrorResponse),
        (status = 422, description = "Invalid coefficients", body = ErrorResponse),
    )
)]
pub async fn create_rating_curve(
    State(pool): State<PgPool>,
    Json(req): Json<CreateRatingCurveRequest>,
) -> Result<(StatusCode, Json<RatingCurveResponse>), AppError> {
    require_non_empty("code", &req.code)?;
    require_non_empty("sensor_code", &req.sensor_code)?;
    let formula = Formula::new(req.formula_type, req.a, req.b, req.c)?;

    if queries::rating_curve_code_exists(&pool, &req.code, None).await? {
        return Err(AppError::Conflict(format!(
            "Rating curve code {} is already in use",
            req.code
        )));
    }

    let params = params_from(req.code, req.sensor_code, &formula, req.effective_date);
    let row = queries::insert_rating_curve(&pool, &params).await?;
    let curve = Curve::try_from(row)?;

    tracing::info!(
        "Created rating curve {} for sensor {} effective {}",
        curve.code,
        curve.sensor_code,
        curve.effective_date
    );
    Ok((StatusCode::CREATED, Json(RatingCurveResponse::from(&curve))))
}

/// Get one rating curve.
#[utoipa::path(
    get,
    path = "/api/v1/rating-curves/{id}",
    tag = "Rating curves",
    params(("id" = i64, Path, description = "Rating curve id")),
    responses(
        (status = 200, description = "Rating curve", body = RatingCurveResponse),
        (status = 404, description = "Rating curve not found", body = ErrorResponse),
    )
)]
pub async fn get_rating_curve(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<Json<RatingCurveResponse>, AppError> {
    let curve = fetch_curve(&pool, id).await?;
    Ok(Json(RatingCurveResponse::from(&curve)))
}

/// Update a rating curve.
///
/// Stored discharges are not recomputed; run a recalculation afterwards to
/// bring them in line with the edited curve.
#[utoipa::path(
    put,
    path = "/api/v1/rating-curves/{id}",
    tag = "Rating curves",
    params(("id" = i64, Path, description = "Rating curve id")),
    request_body = UpdateRatingCurveRequest,
    responses(
        (status = 200, description = "Rating curve updated", body = RatingCurveResponse),
        (status = 404, description = "Rating curve not found", body = ErrorResponse),
        (status = 409, description = "Code already in use", body = ErrorResponse),
        (status = 422, description = "Invalid coefficients", body = ErrorResponse),
    )
)]
pub async fn update_rating_curve(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRatingCurveRequest>,
) -> Result<Json<RatingCurveResponse>, AppError> {
    let current = fetch_curve(&pool, id).await?;

    let code = req.code.unwrap_or_else(|| current.code.clone());
    let sensor_code = req.sensor_code.unwrap_or_else(|| current.sensor_code.clone());
    require_non_empty("code", &code)?;
    require_non_empty("sensor_code", &sensor_code)?;
    let formula = Formula::new(
        req.formula_type.unwrap_or(current.formula.kind),
        req.a.unwrap_or(current.formula.a),
        req.b.unwrap_or(current.formula.b),
        req.c.unwrap_or(current.formula.c),
    )?;
    let effective_date = req.effective_date.unwrap_or(current.effective_date);

    if code != current.code && queries::rating_curve_code_exists(&pool, &code, Some(id)).await? {
        return Err(AppError::Conflict(format!(
            "Rating curve code {} is already in use",
            code
        )));
    }

    let changes_meaning = formula != current.formula
        || effective_date != current.effective_date
        || sensor_code != current.sensor_code;
    if changes_meaning {
        let usage = queries::count_discharges_for_curve(&pool, &current.code).await?;
        if usage > 0 {
            tracing::warn!(
                "Rating curve {} edited while {} stored discharges reference it",
                current.code,
                usage
            );
        }
    }

    let params = params_from(code, sensor_code, &formula, effective_date);
    let row = queries::update_rating_curve(&pool, id, &params)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Rating curve {} not found", id)))?;
    let curve = Curve::try_from(row)?;
    Ok(Json(RatingCurveResponse::from(&curve)))
}

/// Delete a rating curve that no stored discharge references.
#[utoipa::path(
    delete,
    path = "/api/v1/rating-curves/{id}",
    tag = "Rating curves",
    params(("id" = i64, Path, description = "Rating curve id")),
    responses(
        (status = 204, description = "Rating curve deleted"),
        (status = 404, description = "Rating curve not found", body = ErrorResponse),
        (status = 409, description = "Rating curve still referenced by discharges", body = ErrorResponse),
    )
)]
pub async fn delete_rating_curve(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let curve = fetch_curve(&pool, id).await?;
    let usage = queries::count_discharges_for_curve(&pool, &curve.code).await?;
    if usage > 0 {
        return Err(AppError::Conflict(format!(
            "Rating curve {} is used by {} stored discharges",
            curve.code, usage
        )));
    }

    if queries::delete_rating_curve(&pool, id).await? == 0 {
        return Err(AppError::NotFound(format!("Rating curve {} not found", id)));
    }
    tracing::info!("Deleted rating curve {}", curve.code);
    Ok(StatusCode::NO_CONTENT)
}

/// Compute the discharge for one water level with a given curve.
#[utoipa::path(
    post,
    path = "/api/v1/rating-curves/{id}/calculate",
    tag = "Rating curves",
    params(("id" = i64, Path, description = "Rating curve id")),
    request_body = CalculateRequest,
    responses(
        (status = 200, description = "Computed discharge", body = CalculationResponse),
        (status = 404, description = "Rating curve not found", body = ErrorResponse),
        (status = 422, description = "Invalid water level", body = ErrorResponse),
    )
)]
pub async fn calculate_discharge(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(req): Json<CalculateRequest>,
) -> Result<Json<CalculationResponse>, AppError> {
    let curve = fetch_curve(&pool, id).await?;
    let discharge = calculate_for_display(&curve.formula, req.water_level)?;

    Ok(Json(CalculationResponse {
        rating_curve_code: curve.code,
        sensor_code: curve.sensor_code,
        water_level: req.water_level,
        discharge,
        unit: DISCHARGE_UNIT.to_string(),
        formula: curve.formula.describe(),
    }))
}

/// Get the rating curve in force for a sensor on a date.
#[utoipa::path(
    get,
    path = "/api/v1/sensors/{sensor_code}/rating-curves/active",
    tag = "Rating curves",
    params(
        ("sensor_code" = String, Path, description = "Sensor code"),
        DateQuery,
    ),
    responses(
        (status = 200, description = "Active rating curve", body = RatingCurveResponse),
        (status = 404, description = "No curve in force on that date", body = ErrorResponse),
    )
)]
pub async fn get_active_rating_curve(
    State(pool): State<PgPool>,
    Path(sensor_code): Path<String>,
    Query(query): Query<DateQuery>,
) -> Result<Json<RatingCurveResponse>, AppError> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let curve = get_active_for_sensor(&pool, &sensor_code, date)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No rating curve in force for sensor {} on {}",
                sensor_code, date
            ))
        })?;
    Ok(Json(RatingCurveResponse::from(&curve)))
}

/// Get the validity periods of all curves of a sensor, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/sensors/{sensor_code}/rating-curves/history",
    tag = "Rating curves",
    params(("sensor_code" = String, Path, description = "Sensor code")),
    responses(
        (status = 200, description = "Curve history", body = CurveHistoryResponse),
    )
)]
pub async fn get_rating_curve_history(
    State(pool): State<PgPool>,
    Path(sensor_code): Path<String>,
) -> Result<Json<CurveHistoryResponse>, AppError> {
    let timeline = load_timeline(&pool, &sensor_code).await?;
    let usage: HashMap<String, i64> = queries::get_curve_usage_for_sensor(&pool, &sensor_code)
        .await?
        .into_iter()
        .map(|u| (u.rating_curve_code, u.usage_count))
        .collect();

    let periods = timeline
        .history()
        .into_iter()
        .map(|p| CurveHistoryEntry {
            rating_curve: RatingCurveResponse::from(p.curve),
            effective_from: p.effective_from,
            effective_to: p.effective_to,
            is_current: p.is_current,
            shadowed: p.shadowed,
            usage_count: usage.get(&p.curve.code).copied().unwrap_or(0),
        })
        .collect();

    Ok(Json(CurveHistoryResponse {
        sensor_code,
        periods,
    }))
}
