//! Threshold HTTP endpoints.
//!
//! - GET/POST /api/v1/threshold-templates
//! - GET/PUT/DELETE /api/v1/threshold-templates/:code
//! - POST /api/v1/threshold-templates/:code/levels
//! - PUT/DELETE /api/v1/threshold-templates/:code/levels/:level_code
//! - GET/POST /api/v1/threshold-assignments
//! - PUT/DELETE /api/v1/threshold-assignments/:id
//! - GET /api/v1/sensors/:sensor_code/threshold?date=YYYY-MM-DD
//! - GET /api/v1/sensors/:sensor_code/threshold/classify?value=N&date=YYYY-MM-DD

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};

use crate::db::models;
use crate::db::queries::{self, AssignmentParams, TemplateParams};
use crate::errors::{AppError, ErrorResponse};
use crate::helpers::{opt_round4, round4};
use crate::services::threshold::{self, Level, LevelLadder, ParameterType, Severity};

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_parameter_type() -> ParameterType {
    ParameterType::WaterLevel
}

fn default_severity() -> Severity {
    Severity::Normal
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTemplateRequest {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_parameter_type")]
    pub parameter_type: ParameterType,
    pub unit: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTemplateRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_parameter_type")]
    pub parameter_type: ParameterType,
    pub unit: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LevelRequest {
    pub level_order: i32,
    pub level_name: String,
    /// Required when adding a level; ignored on update
    pub level_code: Option<String>,
    /// Inclusive lower bound
    pub min_value: f64,
    /// Exclusive upper bound; null for the open-ended top level
    pub max_value: Option<f64>,
    pub color: Option<String>,
    pub color_hex: Option<String>,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default)]
    pub alert_enabled: bool,
    pub alert_message: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAssignmentRequest {
    pub sensor_code: String,
    pub template_code: String,
    pub effective_from: NaiveDate,
    /// Last day (inclusive); null for open-ended
    pub effective_to: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAssignmentRequest {
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SensorQuery {
    /// Only assignments of this sensor
    pub sensor_code: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DateQuery {
    /// Reference date (YYYY-MM-DD); defaults to today (UTC)
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ClassifyQuery {
    /// Sensor reading to classify
    pub value: f64,
    /// Reference date (YYYY-MM-DD); defaults to today (UTC)
    pub date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct TemplateResponse {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub parameter_type: String,
    pub unit: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Levels ordered by `level_order`
    pub levels: Vec<Level>,
}

impl TemplateResponse {
    fn new(t: models::ThresholdTemplate, levels: Vec<Level>) -> Self {
        Self {
            code: t.code,
            name: t.name,
            description: t.description,
            parameter_type: t.parameter_type,
            unit: t.unit,
            is_active: t.is_active,
            created_at: t.created_at,
            updated_at: t.updated_at,
            levels,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentResponse {
    pub id: i64,
    pub sensor_code: String,
    pub template_code: String,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<models::ThresholdAssignment> for AssignmentResponse {
    fn from(a: models::ThresholdAssignment) -> Self {
        Self {
            id: a.id,
            sensor_code: a.sensor_code,
            template_code: a.template_code,
            effective_from: a.effective_from,
            effective_to: a.effective_to,
            is_active: a.is_active,
            notes: a.notes,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SensorThresholdResponse {
    pub sensor_code: String,
    pub date: NaiveDate,
    pub assignment_id: i64,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub template: TemplateResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClassificationResponse {
    pub sensor_code: String,
    pub value: f64,
    pub date: NaiveDate,
    /// Template in force; null when the sensor has no assignment
    pub template_code: Option<String>,
    /// Severity of the matched level, or "unknown"
    pub status: String,
    pub level: Option<Level>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn fetch_template(pool: &PgPool, code: &str) -> Result<models::ThresholdTemplate, AppError> {
    queries::get_template(pool, code)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Threshold template {} not found", code)))
}

/// Level as it will be stored (bounds at storage precision).
fn level_from_request(req: &LevelRequest, level_code: String) -> Level {
    Level {
        id: 0,
        level_order: req.level_order,
        level_name: req.level_name.clone(),
        level_code,
        min_value: round4(req.min_value),
        max_value: opt_round4(req.max_value),
        color: req.color.clone(),
        color_hex: req.color_hex.clone(),
        severity: req.severity,
        severity_rank: req.severity.rank(),
        alert_enabled: req.alert_enabled,
        alert_message: req.alert_message.clone(),
    }
}

fn today_or(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Utc::now().date_naive())
}

// ---------------------------------------------------------------------------
// Template handlers
// ---------------------------------------------------------------------------

/// List threshold templates with their levels.
#[utoipa::path(
    get,
    path = "/api/v1/threshold-templates",
    tag = "Thresholds",
    responses(
        (status = 200, description = "Threshold templates", body = Vec<TemplateResponse>),
    )
)]
pub async fn list_templates(
    State(pool): State<PgPool>,
) -> Result<Json<Vec<TemplateResponse>>, AppError> {
    let templates = queries::list_templates(&pool).await?;
    let codes: Vec<String> = templates.iter().map(|t| t.code.clone()).collect();

    let mut levels_by_template: HashMap<String, Vec<Level>> = HashMap::new();
    for row in queries::get_levels_for_templates(&pool, &codes).await? {
        let template_code = row.template_code.clone();
        levels_by_template
            .entry(template_code)
            .or_default()
            .push(Level::try_from(row)?);
    }

    let items = templates
        .into_iter()
        .map(|t| {
            let levels = levels_by_template.remove(&t.code).unwrap_or_default();
            TemplateResponse::new(t, LevelLadder::new(levels).levels().to_vec())
        })
        .collect();
    Ok(Json(items))
}

/// Create a threshold template (without levels).
#[utoipa::path(
    post,
    path = "/api/v1/threshold-templates",
    tag = "Thresholds",
    request_body = CreateTemplateRequest,
    responses(
        (status = 201, description = "Template created", body = TemplateResponse),
        (status = 409, description = "Code already in use", body = ErrorResponse),
    )
)]
pub async fn create_template(
    State(pool): State<PgPool>,
    Json(req): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<TemplateResponse>), AppError> {
    if req.code.trim().is_empty() || req.name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "code and name must not be empty".to_string(),
        ));
    }
    if queries::get_template(&pool, &req.code).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Threshold template {} already exists",
            req.code
        )));
    }

    let params = TemplateParams {
        code: req.code,
        name: req.name,
        description: req.description,
        parameter_type: req.parameter_type.as_str().to_string(),
        unit: req.unit,
        is_active: req.is_active,
    };
    let template = queries::insert_template(&pool, &params).await?;
    tracing::info!("Created threshold template {}", template.code);
    Ok((
        StatusCode::CREATED,
        Json(TemplateResponse::new(template, Vec::new())),
    ))
}

/// Get a threshold template with its levels.
#[utoipa::path(
    get,
    path = "/api/v1/threshold-templates/{code}",
    tag = "Thresholds",
    params(("code" = String, Path, description = "Template code")),
    responses(
        (status = 200, description = "Template with levels", body = TemplateResponse),
        (status = 404, description = "Template not found", body = ErrorResponse),
    )
)]
pub async fn get_template(
    State(pool): State<PgPool>,
    Path(code): Path<String>,
) -> Result<Json<TemplateResponse>, AppError> {
    let template = fetch_template(&pool, &code).await?;
    let ladder = threshold::load_ladder(&pool, &code).await?;
    Ok(Json(TemplateResponse::new(template, ladder.levels().to_vec())))
}

/// Replace a template's attributes. Levels are managed separately.
#[utoipa::path(
    put,
    path = "/api/v1/threshold-templates/{code}",
    tag = "Thresholds",
    params(("code" = String, Path, description = "Template code")),
    request_body = UpdateTemplateRequest,
    responses(
        (status = 200, description = "Template updated", body = TemplateResponse),
        (status = 404, description = "Template not found", body = ErrorResponse),
    )
)]
pub async fn update_template(
    State(pool): State<PgPool>,
    Path(code): Path<String>,
    Json(req): Json<UpdateTemplateRequest>,
) -> Result<Json<TemplateResponse>, AppError> {
    let params = TemplateParams {
        code: code.clone(),
        name: req.name,
        description: req.description,
        parameter_type: req.parameter_type.as_str().to_string(),
        unit: req.unit,
        is_active: req.is_active,
    };
    let template = queries::update_template(&pool, &code, &params)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Threshold template {} not found", code)))?;
    let ladder = threshold::load_ladder(&pool, &code).await?;
    Ok(Json(TemplateResponse::new(template, ladder.levels().to_vec())))
}

/// Delete a template and its levels. Refused while assignments reference it.
#[utoipa::path(
    delete,
    path = "/api/v1/threshold-templates/{code}",
    tag = "Thresholds",
    params(("code" = String, Path, description = "Template code")),
    responses(
        (status = 204, description = "Template deleted"),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 409, description = "Template still assigned to sensors", body = ErrorResponse),
    )
)]
pub async fn delete_template(
    State(pool): State<PgPool>,
    Path(code): Path<String>,
) -> Result<StatusCode, AppError> {
    let assignments = queries::count_assignments_for_template(&pool, &code).await?;
    if assignments > 0 {
        return Err(AppError::Conflict(format!(
            "Threshold template {} is referenced by {} assignments",
            code, assignments
        )));
    }
    if queries::delete_template(&pool, &code).await? == 0 {
        return Err(AppError::NotFound(format!(
            "Threshold template {} not found",
            code
        )));
    }
    tracing::info!("Deleted threshold template {}", code);
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Level handlers
// ---------------------------------------------------------------------------

/// Add a level to a template. The resulting ladder must stay ascending and
/// non-overlapping.
#[utoipa::path(
    post,
    path = "/api/v1/threshold-templates/{code}/levels",
    tag = "Thresholds",
    params(("code" = String, Path, description = "Template code")),
    request_body = LevelRequest,
    responses(
        (status = 201, description = "Level added", body = Level),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 409, description = "Level code already in use", body = ErrorResponse),
        (status = 422, description = "Ladder would become inconsistent", body = ErrorResponse),
    )
)]
pub async fn add_level(
    State(pool): State<PgPool>,
    Path(code): Path<String>,
    Json(req): Json<LevelRequest>,
) -> Result<(StatusCode, Json<Level>), AppError> {
    let level_code = req
        .level_code
        .clone()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("level_code is required".to_string()))?;

    let candidate = level_from_request(&req, level_code);
    let level = threshold::add_level(&pool, &code, candidate).await?;
    Ok((StatusCode::CREATED, Json(level)))
}

/// Replace a level's attributes. The resulting ladder must stay consistent.
#[utoipa::path(
    put,
    path = "/api/v1/threshold-templates/{code}/levels/{level_code}",
    tag = "Thresholds",
    params(
        ("code" = String, Path, description = "Template code"),
        ("level_code" = String, Path, description = "Level code"),
    ),
    request_body = LevelRequest,
    responses(
        (status = 200, description = "Level updated", body = Level),
        (status = 404, description = "Level not found", body = ErrorResponse),
        (status = 422, description = "Ladder would become inconsistent", body = ErrorResponse),
    )
)]
pub async fn update_level(
    State(pool): State<PgPool>,
    Path((code, level_code)): Path<(String, String)>,
    Json(req): Json<LevelRequest>,
) -> Result<Json<Level>, AppError> {
    let candidate = level_from_request(&req, level_code);
    let level = threshold::update_level(&pool, &code, candidate).await?;
    Ok(Json(level))
}

/// Remove a level from a template.
#[utoipa::path(
    delete,
    path = "/api/v1/threshold-templates/{code}/levels/{level_code}",
    tag = "Thresholds",
    params(
        ("code" = String, Path, description = "Template code"),
        ("level_code" = String, Path, description = "Level code"),
    ),
    responses(
        (status = 204, description = "Level deleted"),
        (status = 404, description = "Level not found", body = ErrorResponse),
    )
)]
pub async fn delete_level(
    State(pool): State<PgPool>,
    Path((code, level_code)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    if queries::delete_level(&pool, &code, &level_code).await? == 0 {
        return Err(AppError::NotFound(format!(
            "Level {} not found in template {}",
            level_code, code
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Assignment handlers
// ---------------------------------------------------------------------------

/// List sensor threshold assignments.
#[utoipa::path(
    get,
    path = "/api/v1/threshold-assignments",
    tag = "Thresholds",
    params(SensorQuery),
    responses(
        (status = 200, description = "Assignments", body = Vec<AssignmentResponse>),
    )
)]
pub async fn list_assignments(
    State(pool): State<PgPool>,
    Query(query): Query<SensorQuery>,
) -> Result<Json<Vec<AssignmentResponse>>, AppError> {
    let rows = queries::list_assignments(&pool, query.sensor_code.as_deref()).await?;
    Ok(Json(rows.into_iter().map(AssignmentResponse::from).collect()))
}

/// Assign a template to a sensor.
///
/// An active assignment becomes the only active one over its window:
/// overlapping assignments that start earlier are cut off the day before,
/// those starting inside the window are deactivated.
#[utoipa::path(
    post,
    path = "/api/v1/threshold-assignments",
    tag = "Thresholds",
    request_body = CreateAssignmentRequest,
    responses(
        (status = 201, description = "Assignment created", body = AssignmentResponse),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 422, description = "Invalid window", body = ErrorResponse),
    )
)]
pub async fn create_assignment(
    State(pool): State<PgPool>,
    Json(req): Json<CreateAssignmentRequest>,
) -> Result<(StatusCode, Json<AssignmentResponse>), AppError> {
    if req.sensor_code.trim().is_empty() {
        return Err(AppError::BadRequest(
            "sensor_code must not be empty".to_string(),
        ));
    }
    let params = AssignmentParams {
        sensor_code: req.sensor_code,
        template_code: req.template_code,
        effective_from: req.effective_from,
        effective_to: req.effective_to,
        is_active: req.is_active,
        notes: req.notes,
    };
    let created = threshold::assign_template(&pool, &params).await?;
    Ok((StatusCode::CREATED, Json(AssignmentResponse::from(created))))
}

/// Change an assignment's window, active flag or notes.
#[utoipa::path(
    put,
    path = "/api/v1/threshold-assignments/{id}",
    tag = "Thresholds",
    params(("id" = i64, Path, description = "Assignment id")),
    request_body = UpdateAssignmentRequest,
    responses(
        (status = 200, description = "Assignment updated", body = AssignmentResponse),
        (status = 404, description = "Assignment not found", body = ErrorResponse),
        (status = 422, description = "Invalid window", body = ErrorResponse),
    )
)]
pub async fn update_assignment(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAssignmentRequest>,
) -> Result<Json<AssignmentResponse>, AppError> {
    let updated = threshold::update_assignment(
        &pool,
        id,
        req.effective_from,
        req.effective_to,
        req.is_active,
        req.notes.as_deref(),
    )
    .await?;
    Ok(Json(AssignmentResponse::from(updated)))
}

/// Delete an assignment.
#[utoipa::path(
    delete,
    path = "/api/v1/threshold-assignments/{id}",
    tag = "Thresholds",
    params(("id" = i64, Path, description = "Assignment id")),
    responses(
        (status = 204, description = "Assignment deleted"),
        (status = 404, description = "Assignment not found", body = ErrorResponse),
    )
)]
pub async fn delete_assignment(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if queries::delete_assignment(&pool, id).await? == 0 {
        return Err(AppError::NotFound(format!(
            "Threshold assignment {} not found",
            id
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Sensor lookups
// ---------------------------------------------------------------------------

/// Get the threshold template governing a sensor on a date.
#[utoipa::path(
    get,
    path = "/api/v1/sensors/{sensor_code}/threshold",
    tag = "Thresholds",
    params(
        ("sensor_code" = String, Path, description = "Sensor code"),
        DateQuery,
    ),
    responses(
        (status = 200, description = "Template in force", body = SensorThresholdResponse),
        (status = 404, description = "No template assigned on that date", body = ErrorResponse),
    )
)]
pub async fn get_sensor_threshold(
    State(pool): State<PgPool>,
    Path(sensor_code): Path<String>,
    Query(query): Query<DateQuery>,
) -> Result<Json<SensorThresholdResponse>, AppError> {
    let date = today_or(query.date);
    let active = threshold::active_template_for_sensor(&pool, &sensor_code, date)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No threshold template assigned to sensor {} on {}",
                sensor_code, date
            ))
        })?;

    Ok(Json(SensorThresholdResponse {
        sensor_code,
        date,
        assignment_id: active.assignment.id,
        effective_from: active.assignment.effective_from,
        effective_to: active.assignment.effective_to,
        template: TemplateResponse::new(active.template, active.ladder.levels().to_vec()),
    }))
}

/// Classify a sensor value against the template in force.
///
/// A sensor without a template, or a value outside every level, is not an
/// error: the response carries status "unknown" and a null level.
#[utoipa::path(
    get,
    path = "/api/v1/sensors/{sensor_code}/threshold/classify",
    tag = "Thresholds",
    params(
        ("sensor_code" = String, Path, description = "Sensor code"),
        ClassifyQuery,
    ),
    responses(
        (status = 200, description = "Classification", body = ClassificationResponse),
    )
)]
pub async fn classify(
    State(pool): State<PgPool>,
    Path(sensor_code): Path<String>,
    Query(query): Query<ClassifyQuery>,
) -> Result<Json<ClassificationResponse>, AppError> {
    if !query.value.is_finite() {
        return Err(AppError::BadRequest("value must be a finite number".to_string()));
    }
    let date = today_or(query.date);
    let result = threshold::level_for_sensor_value(&pool, &sensor_code, query.value, date).await?;

    Ok(Json(ClassificationResponse {
        sensor_code,
        value: query.value,
        date,
        template_code: result.template_code,
        status: result
            .level
            .as_ref()
            .map_or("unknown", |l| l.severity.as_str())
            .to_string(),
        level: result.level,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::threshold::validate_ladder;

    fn level_request(order: i32, min: f64, max: Option<f64>) -> LevelRequest {
        LevelRequest {
            level_order: order,
            level_name: format!("Level {}", order),
            level_code: Some(format!("L{}", order)),
            min_value: min,
            max_value: max,
            color: None,
            color_hex: None,
            severity: Severity::Warning,
            alert_enabled: true,
            alert_message: None,
        }
    }

    #[test]
    fn test_level_request_defaults() {
        let req: LevelRequest = serde_json::from_str(
            r#"{"level_order": 1, "level_name": "Normal", "level_code": "N", "min_value": 0}"#,
        )
        .unwrap();
        assert_eq!(req.severity, Severity::Normal);
        assert!(!req.alert_enabled);
        assert_eq!(req.max_value, None);
    }

    #[test]
    fn test_responses_carry_row_timestamps() {
        let created: DateTime<Utc> = "2024-03-01T08:00:00Z".parse().unwrap();
        let updated: DateTime<Utc> = "2024-03-02T09:30:00Z".parse().unwrap();

        let template = TemplateResponse::new(
            models::ThresholdTemplate {
                code: "RIVER".to_string(),
                name: "River stage".to_string(),
                description: None,
                parameter_type: "water_level".to_string(),
                unit: Some("m".to_string()),
                is_active: true,
                created_at: created,
                updated_at: updated,
            },
            vec![],
        );
        let json = serde_json::to_value(&template).unwrap();
        assert_eq!(json["created_at"], "2024-03-01T08:00:00Z");
        assert_eq!(json["updated_at"], "2024-03-02T09:30:00Z");

        let assignment = AssignmentResponse::from(models::ThresholdAssignment {
            id: 7,
            sensor_code: "S1".to_string(),
            template_code: "RIVER".to_string(),
            effective_from: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            effective_to: None,
            is_active: true,
            notes: None,
            created_at: created,
            updated_at: updated,
        });
        assert_eq!(assignment.created_at, created);
        assert_eq!(assignment.updated_at, updated);
    }

    #[test]
    fn test_level_from_request_rounds_bounds() {
        let req = level_request(1, 0.123_456, Some(1.000_04));
        let level = level_from_request(&req, "L1".to_string());
        assert_eq!(level.min_value, 0.1235);
        assert_eq!(level.max_value, Some(1.0));
        assert_eq!(level.severity_rank, 3);
    }

    #[test]
    fn test_rounding_collapse_is_caught_by_ladder_validation() {
        let req = level_request(1, 1.000_01, Some(1.000_02));
        let level = level_from_request(&req, "L1".to_string());
        assert!(validate_ladder(&[level]).is_err());
    }

    #[test]
    fn test_assignment_request_defaults_to_active() {
        let req: CreateAssignmentRequest = serde_json::from_str(
            r#"{"sensor_code": "S1", "template_code": "TPL", "effective_from": "2024-01-01"}"#,
        )
        .unwrap();
        assert!(req.is_active);
        assert_eq!(req.effective_to, None);
    }

    #[test]
    fn test_create_template_request_defaults() {
        let req: CreateTemplateRequest =
            serde_json::from_str(r#"{"code": "TPL", "name": "River stage"}"#).unwrap();
        assert_eq!(req.parameter_type, ParameterType::WaterLevel);
        assert!(req.is_active);
    }
}
