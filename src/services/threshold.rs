//! Threshold classifier: severity ladders and sensor template assignments.
//!
//! A template owns an ordered ladder of `[min, max)` bands. Sensors are bound
//! to a template for an effective date window; at most one active assignment
//! should cover any given date, which the write path enforces.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::db::{models, queries};
use crate::errors::AppError;
use crate::helpers::{dec_to_f64, f64_to_decimal_4dp, opt_dec_to_f64, opt_f64_to_decimal_4dp};

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Severity of a level. Declaration order is the ranking.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Normal,
    Watch,
    Warning,
    Danger,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Watch => "watch",
            Severity::Warning => "warning",
            Severity::Danger => "danger",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Severity::Normal),
            "watch" => Some(Severity::Watch),
            "warning" => Some(Severity::Warning),
            "danger" => Some(Severity::Danger),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// Numeric rank, 1 for `normal` up to 5 for `critical`. 0 is left for
    /// values that match no level.
    pub fn rank(self) -> u8 {
        self as u8 + 1
    }
}

/// Physical quantity a template classifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    WaterLevel,
    Rainfall,
    Discharge,
    Temperature,
    Other,
}

impl ParameterType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParameterType::WaterLevel => "water_level",
            ParameterType::Rainfall => "rainfall",
            ParameterType::Discharge => "discharge",
            ParameterType::Temperature => "temperature",
            ParameterType::Other => "other",
        }
    }
}

// ---------------------------------------------------------------------------
// Levels and ladders
// ---------------------------------------------------------------------------

/// One severity band: `min_value <= v < max_value` (no upper bound when
/// `max_value` is absent).
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Level {
    #[serde(skip)]
    pub id: i64,
    pub level_order: i32,
    pub level_name: String,
    pub level_code: String,
    pub min_value: f64,
    pub max_value: Option<f64>,
    pub color: Option<String>,
    pub color_hex: Option<String>,
    pub severity: Severity,
    pub severity_rank: u8,
    pub alert_enabled: bool,
    pub alert_message: Option<String>,
}

impl Level {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min_value && self.max_value.map_or(true, |max| value < max)
    }
}

impl TryFrom<models::ThresholdLevel> for Level {
    type Error = AppError;

    fn try_from(row: models::ThresholdLevel) -> Result<Self, Self::Error> {
        let severity = Severity::parse(&row.severity).ok_or_else(|| {
            AppError::InternalError(format!(
                "Threshold level {} has unknown severity '{}'",
                row.level_code, row.severity
            ))
        })?;

        Ok(Self {
            id: row.id,
            level_order: row.level_order,
            level_name: row.level_name,
            level_code: row.level_code,
            min_value: dec_to_f64(row.min_value),
            max_value: opt_dec_to_f64(row.max_value),
            color: row.color,
            color_hex: row.color_hex,
            severity,
            severity_rank: severity.rank(),
            alert_enabled: row.alert_enabled,
            alert_message: row.alert_message,
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LadderError {
    #[error("level {level_code}: bounds must be finite numbers")]
    NonFiniteBound { level_code: String },

    #[error("level {level_code}: max_value must be greater than min_value")]
    EmptyRange { level_code: String },

    #[error("level_order {level_order} is used more than once")]
    DuplicateOrder { level_order: i32 },

    #[error("level {upper} starts below the end of level {lower}")]
    Overlap { lower: String, upper: String },

    #[error("level {level_code} has no upper bound but is not the highest level")]
    UnboundedNotLast { level_code: String },
}

/// Check that levels, taken in `level_order`, form ascending, non-overlapping
/// bands with at most one open-ended band at the top. Gaps are allowed.
pub fn validate_ladder(levels: &[Level]) -> Result<(), LadderError> {
    for level in levels {
        let finite = level.min_value.is_finite() && level.max_value.map_or(true, f64::is_finite);
        if !finite {
            return Err(LadderError::NonFiniteBound {
                level_code: level.level_code.clone(),
            });
        }
        if level.max_value.is_some_and(|max| max <= level.min_value) {
            return Err(LadderError::EmptyRange {
                level_code: level.level_code.clone(),
            });
        }
    }

    let mut ordered: Vec<&Level> = levels.iter().collect();
    ordered.sort_by_key(|l| l.level_order);

    for pair in ordered.windows(2) {
        let (lower, upper) = (pair[0], pair[1]);
        if lower.level_order == upper.level_order {
            return Err(LadderError::DuplicateOrder {
                level_order: lower.level_order,
            });
        }
        match lower.max_value {
            None => {
                return Err(LadderError::UnboundedNotLast {
                    level_code: lower.level_code.clone(),
                })
            }
            Some(max) if upper.min_value < max => {
                return Err(LadderError::Overlap {
                    lower: lower.level_code.clone(),
                    upper: upper.level_code.clone(),
                })
            }
            Some(_) => {}
        }
    }

    Ok(())
}

/// `existing` with `candidate` added, replacing any level with the same code.
pub fn ladder_with(existing: &[Level], candidate: Level) -> Vec<Level> {
    let mut levels: Vec<Level> = existing
        .iter()
        .filter(|l| l.level_code != candidate.level_code)
        .cloned()
        .collect();
    levels.push(candidate);
    levels
}

/// A template's levels prepared for lookup.
///
/// Valid ladders are searched by `min_value`; ladders stored before
/// validation existed fall back to the first containing level by order.
#[derive(Debug, Clone)]
pub struct LevelLadder {
    levels: Vec<Level>,
    consistent: bool,
}

impl LevelLadder {
    pub fn new(mut levels: Vec<Level>) -> Self {
        levels.sort_by_key(|l| (l.level_order, l.id));
        let consistent = match validate_ladder(&levels) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Inconsistent threshold ladder, using linear match: {}", e);
                false
            }
        };
        Self { levels, consistent }
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Band containing `value`, or `None` when it falls in a gap or below
    /// the lowest band.
    pub fn level_for(&self, value: f64) -> Option<&Level> {
        if !value.is_finite() {
            return None;
        }
        if self.consistent {
            let idx = self.levels.partition_point(|l| l.min_value <= value);
            idx.checked_sub(1)
                .map(|i| &self.levels[i])
                .filter(|l| l.contains(value))
        } else {
            self.levels.iter().find(|l| l.contains(value))
        }
    }
}

// ---------------------------------------------------------------------------
// Assignments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub id: i64,
    pub sensor_code: String,
    pub template_code: String,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub is_active: bool,
}

impl From<&models::ThresholdAssignment> for Assignment {
    fn from(row: &models::ThresholdAssignment) -> Self {
        Self {
            id: row.id,
            sensor_code: row.sensor_code.clone(),
            template_code: row.template_code.clone(),
            effective_from: row.effective_from,
            effective_to: row.effective_to,
            is_active: row.is_active,
        }
    }
}

impl Assignment {
    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.is_active
            && self.effective_from <= date
            && self.effective_to.map_or(true, |to| to >= date)
    }

    /// Whether this window shares at least one day with `[from, to]`.
    pub fn overlaps(&self, from: NaiveDate, to: Option<NaiveDate>) -> bool {
        let self_to = self.effective_to.unwrap_or(NaiveDate::MAX);
        let other_to = to.unwrap_or(NaiveDate::MAX);
        self.effective_from <= other_to && from <= self_to
    }
}

/// The authoritative assignment on `date`: latest `effective_from`, highest
/// id on ties.
pub fn select_effective(assignments: &[Assignment], date: NaiveDate) -> Option<&Assignment> {
    assignments
        .iter()
        .filter(|a| a.is_effective_on(date))
        .max_by_key(|a| (a.effective_from, a.id))
}

/// Change to an existing assignment so a new active window stays exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentChange {
    Truncate { id: i64, effective_to: NaiveDate },
    Deactivate { id: i64 },
}

/// Plan the changes that make `[from, to]` the only active window for a
/// sensor. Assignments starting earlier are cut off the day before `from`;
/// those starting inside the new window are deactivated.
pub fn plan_assignment(
    existing: &[Assignment],
    from: NaiveDate,
    to: Option<NaiveDate>,
    exclude_id: Option<i64>,
) -> Vec<AssignmentChange> {
    existing
        .iter()
        .filter(|a| a.is_active && Some(a.id) != exclude_id && a.overlaps(from, to))
        .map(|a| match from.pred_opt() {
            Some(day_before) if a.effective_from < from => AssignmentChange::Truncate {
                id: a.id,
                effective_to: day_before,
            },
            _ => AssignmentChange::Deactivate { id: a.id },
        })
        .collect()
}

pub fn validate_window(from: NaiveDate, to: Option<NaiveDate>) -> Result<(), AppError> {
    match to {
        Some(to) if to < from => Err(AppError::Validation(format!(
            "effective_to ({}) must not be before effective_from ({})",
            to, from
        ))),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// The template governing a sensor on a date, with its ladder.
#[derive(Debug, Clone)]
pub struct ActiveTemplate {
    pub assignment: Assignment,
    pub template: models::ThresholdTemplate,
    pub ladder: LevelLadder,
}

/// Outcome of classifying one sensor value.
#[derive(Debug, Clone)]
pub struct Classification {
    pub template_code: Option<String>,
    pub level: Option<Level>,
}

async fn fetch_levels(
    conn: &mut sqlx::PgConnection,
    template_code: &str,
) -> Result<Vec<Level>, AppError> {
    queries::get_levels(conn, template_code)
        .await?
        .into_iter()
        .map(Level::try_from)
        .collect()
}

pub async fn load_ladder(pool: &PgPool, template_code: &str) -> Result<LevelLadder, AppError> {
    let mut conn = pool.acquire().await?;
    Ok(LevelLadder::new(fetch_levels(&mut conn, template_code).await?))
}

pub async fn active_template_for_sensor(
    pool: &PgPool,
    sensor_code: &str,
    date: NaiveDate,
) -> Result<Option<ActiveTemplate>, AppError> {
    let rows = queries::get_effective_assignments(pool, sensor_code, date).await?;
    let assignments: Vec<Assignment> = rows.iter().map(Assignment::from).collect();
    if assignments.len() > 1 {
        tracing::warn!(
            "Sensor {} has {} active assignments on {}, using the latest",
            sensor_code,
            assignments.len(),
            date
        );
    }

    let Some(assignment) = select_effective(&assignments, date).cloned() else {
        return Ok(None);
    };
    let Some(template) = queries::get_template(pool, &assignment.template_code).await? else {
        return Ok(None);
    };
    let ladder = load_ladder(pool, &template.code).await?;

    Ok(Some(ActiveTemplate {
        assignment,
        template,
        ladder,
    }))
}

pub async fn level_for_sensor_value(
    pool: &PgPool,
    sensor_code: &str,
    value: f64,
    date: NaiveDate,
) -> Result<Classification, AppError> {
    let Some(active) = active_template_for_sensor(pool, sensor_code, date).await? else {
        return Ok(Classification {
            template_code: None,
            level: None,
        });
    };

    Ok(Classification {
        level: active.ladder.level_for(value).cloned(),
        template_code: Some(active.template.code),
    })
}

// ---------------------------------------------------------------------------
// Assignment write path
// ---------------------------------------------------------------------------

async fn apply_changes(
    conn: &mut sqlx::PgConnection,
    changes: &[AssignmentChange],
) -> Result<(), sqlx::Error> {
    for change in changes {
        match *change {
            AssignmentChange::Truncate { id, effective_to } => {
                tracing::info!("Truncating threshold assignment {} to {}", id, effective_to);
                queries::truncate_assignment(conn, id, effective_to).await?;
            }
            AssignmentChange::Deactivate { id } => {
                tracing::info!("Deactivating threshold assignment {}", id);
                queries::deactivate_assignment(conn, id).await?;
            }
        }
    }
    Ok(())
}

/// Bind a template to a sensor, closing any overlapping active assignment.
pub async fn assign_template(
    pool: &PgPool,
    params: &queries::AssignmentParams,
) -> Result<models::ThresholdAssignment, AppError> {
    validate_window(params.effective_from, params.effective_to)?;
    if queries::get_template(pool, &params.template_code)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!(
            "Threshold template {} not found",
            params.template_code
        )));
    }

    let mut tx = pool.begin().await?;
    if params.is_active {
        let locked = queries::lock_active_assignments(&mut tx, &params.sensor_code).await?;
        let existing: Vec<Assignment> = locked.iter().map(Assignment::from).collect();
        let changes = plan_assignment(&existing, params.effective_from, params.effective_to, None);
        apply_changes(&mut tx, &changes).await?;
    }
    let created = queries::insert_assignment(&mut tx, params).await?;
    tx.commit().await?;

    tracing::info!(
        "Assigned template {} to sensor {} from {}",
        created.template_code,
        created.sensor_code,
        created.effective_from
    );
    Ok(created)
}

/// Replace an assignment's window and flags, keeping the active window
/// exclusive when the result is active.
pub async fn update_assignment(
    pool: &PgPool,
    id: i64,
    effective_from: NaiveDate,
    effective_to: Option<NaiveDate>,
    is_active: bool,
    notes: Option<&str>,
) -> Result<models::ThresholdAssignment, AppError> {
    validate_window(effective_from, effective_to)?;
    let current = queries::get_assignment(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Threshold assignment {} not found", id)))?;

    let mut tx = pool.begin().await?;
    if is_active {
        let locked = queries::lock_active_assignments(&mut tx, &current.sensor_code).await?;
        let existing: Vec<Assignment> = locked.iter().map(Assignment::from).collect();
        let changes = plan_assignment(&existing, effective_from, effective_to, Some(id));
        apply_changes(&mut tx, &changes).await?;
    }
    let updated =
        queries::update_assignment(&mut tx, id, effective_from, effective_to, is_active, notes)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Threshold assignment {} not found", id)))?;
    tx.commit().await?;

    Ok(updated)
}

// ---------------------------------------------------------------------------
// Level write path
// ---------------------------------------------------------------------------

fn level_params(level: &Level) -> queries::LevelParams {
    queries::LevelParams {
        level_order: level.level_order,
        level_name: level.level_name.clone(),
        level_code: level.level_code.clone(),
        min_value: f64_to_decimal_4dp(level.min_value),
        max_value: opt_f64_to_decimal_4dp(level.max_value),
        color: level.color.clone(),
        color_hex: level.color_hex.clone(),
        severity: level.severity.as_str().to_string(),
        alert_enabled: level.alert_enabled,
        alert_message: level.alert_message.clone(),
    }
}

/// Lock the template row and return its current levels. Concurrent level
/// writes on the same template queue behind this lock.
async fn lock_ladder(
    conn: &mut sqlx::PgConnection,
    template_code: &str,
) -> Result<Vec<Level>, AppError> {
    if queries::lock_template(&mut *conn, template_code)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!(
            "Threshold template {} not found",
            template_code
        )));
    }
    fetch_levels(conn, template_code).await
}

/// Add a level to a template, keeping the ladder valid.
pub async fn add_level(
    pool: &PgPool,
    template_code: &str,
    candidate: Level,
) -> Result<Level, AppError> {
    let mut tx = pool.begin().await?;
    let existing = lock_ladder(&mut tx, template_code).await?;
    if queries::level_code_exists(&mut tx, &candidate.level_code).await? {
        return Err(AppError::Conflict(format!(
            "Level code {} is already in use",
            candidate.level_code
        )));
    }
    validate_ladder(&ladder_with(&existing, candidate.clone()))?;

    let row = queries::insert_level(&mut tx, template_code, &level_params(&candidate)).await?;
    tx.commit().await?;

    tracing::info!(
        "Added level {} to threshold template {}",
        row.level_code,
        template_code
    );
    Level::try_from(row)
}

/// Replace a level's attributes, keeping the ladder valid.
pub async fn update_level(
    pool: &PgPool,
    template_code: &str,
    candidate: Level,
) -> Result<Level, AppError> {
    let not_found = || {
        AppError::NotFound(format!(
            "Level {} not found in template {}",
            candidate.level_code, template_code
        ))
    };

    let mut tx = pool.begin().await?;
    let existing = lock_ladder(&mut tx, template_code).await?;
    if !existing.iter().any(|l| l.level_code == candidate.level_code) {
        return Err(not_found());
    }
    validate_ladder(&ladder_with(&existing, candidate.clone()))?;

    let row = queries::update_level(
        &mut tx,
        template_code,
        &candidate.level_code,
        &level_params(&candidate),
    )
    .await?
    .ok_or_else(not_found)?;
    tx.commit().await?;

    Level::try_from(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn level(order: i32, code: &str, min: f64, max: Option<f64>) -> Level {
        Level {
            id: order as i64,
            level_order: order,
            level_name: code.to_string(),
            level_code: code.to_string(),
            min_value: min,
            max_value: max,
            color: None,
            color_hex: None,
            severity: Severity::Normal,
            severity_rank: 1,
            alert_enabled: false,
            alert_message: None,
        }
    }

    fn three_band_ladder() -> LevelLadder {
        LevelLadder::new(vec![
            level(3, "L3", 3.0, None),
            level(1, "L1", 0.0, Some(1.0)),
            level(2, "L2", 1.0, Some(3.0)),
        ])
    }

    fn assignment(id: i64, from: &str, to: Option<&str>) -> Assignment {
        Assignment {
            id,
            sensor_code: "S1".to_string(),
            template_code: "TPL".to_string(),
            effective_from: date(from),
            effective_to: to.map(date),
            is_active: true,
        }
    }

    #[test]
    fn test_level_boundaries_belong_to_upper_band() {
        let ladder = three_band_ladder();
        let cases = [(0.5, "L1"), (1.0, "L2"), (2.9, "L2"), (3.0, "L3"), (100.0, "L3")];
        for (value, expected) in cases {
            let found = ladder.level_for(value).map(|l| l.level_code.as_str());
            assert_eq!(found, Some(expected), "value {}", value);
        }
    }

    #[test]
    fn test_value_below_lowest_band_is_none() {
        let ladder = LevelLadder::new(vec![
            level(1, "L1", 1.0, Some(2.0)),
            level(2, "L2", 2.0, None),
        ]);
        assert!(ladder.level_for(0.5).is_none());
    }

    #[test]
    fn test_value_in_gap_is_none() {
        let ladder = LevelLadder::new(vec![
            level(1, "L1", 0.0, Some(1.0)),
            level(2, "L2", 2.0, None),
        ]);
        assert!(ladder.level_for(1.5).is_none());
        assert_eq!(ladder.level_for(2.0).unwrap().level_code, "L2");
    }

    #[test]
    fn test_nan_value_is_none() {
        assert!(three_band_ladder().level_for(f64::NAN).is_none());
    }

    #[test]
    fn test_inconsistent_ladder_uses_first_match_by_order() {
        let ladder = LevelLadder::new(vec![
            level(1, "WIDE", 0.0, Some(10.0)),
            level(2, "NARROW", 2.0, Some(3.0)),
        ]);
        assert_eq!(ladder.level_for(2.5).unwrap().level_code, "WIDE");
    }

    #[test]
    fn test_validate_ladder_accepts_gaps() {
        let levels = vec![level(1, "L1", 0.0, Some(1.0)), level(2, "L2", 2.0, None)];
        assert_eq!(validate_ladder(&levels), Ok(()));
    }

    #[test]
    fn test_validate_ladder_rejects_overlap() {
        let levels = vec![level(1, "L1", 0.0, Some(2.0)), level(2, "L2", 1.5, None)];
        assert_eq!(
            validate_ladder(&levels),
            Err(LadderError::Overlap {
                lower: "L1".to_string(),
                upper: "L2".to_string()
            })
        );
    }

    #[test]
    fn test_validate_ladder_rejects_open_level_below_top() {
        let levels = vec![level(1, "L1", 0.0, None), level(2, "L2", 5.0, None)];
        assert!(matches!(
            validate_ladder(&levels),
            Err(LadderError::UnboundedNotLast { .. })
        ));
    }

    #[test]
    fn test_validate_ladder_rejects_empty_range_and_duplicate_order() {
        let levels = vec![level(1, "L1", 2.0, Some(2.0))];
        assert!(matches!(
            validate_ladder(&levels),
            Err(LadderError::EmptyRange { .. })
        ));

        let levels = vec![level(1, "A", 0.0, Some(1.0)), level(1, "B", 1.0, None)];
        assert_eq!(
            validate_ladder(&levels),
            Err(LadderError::DuplicateOrder { level_order: 1 })
        );
    }

    #[test]
    fn test_validate_ladder_rejects_non_finite() {
        let levels = vec![level(1, "L1", f64::NEG_INFINITY, Some(1.0))];
        assert!(matches!(
            validate_ladder(&levels),
            Err(LadderError::NonFiniteBound { .. })
        ));
    }

    #[test]
    fn test_ladder_with_replaces_same_code() {
        let existing = vec![level(1, "L1", 0.0, Some(1.0)), level(2, "L2", 1.0, None)];
        let updated = ladder_with(&existing, level(2, "L2", 1.0, Some(4.0)));
        assert_eq!(updated.len(), 2);
        assert_eq!(
            updated.iter().find(|l| l.level_code == "L2").unwrap().max_value,
            Some(4.0)
        );
    }

    #[test]
    fn test_level_params_store_bounds_at_four_places() {
        let mut l = level(1, "L1", 0.123_456, Some(1.5));
        l.severity = Severity::Danger;
        let params = level_params(&l);
        assert_eq!(params.min_value, rust_decimal::Decimal::new(1235, 4));
        assert_eq!(params.max_value, Some(rust_decimal::Decimal::new(15, 1)));
        assert_eq!(params.severity, "danger");
    }

    #[test]
    fn test_severity_ranking() {
        assert!(Severity::Critical > Severity::Danger);
        assert!(Severity::Watch > Severity::Normal);
        assert_eq!(Severity::Normal.rank(), 1);
        assert_eq!(Severity::Warning.rank(), 3);
        assert_eq!(Severity::Critical.rank(), 5);
        assert_eq!(Severity::parse("warning"), Some(Severity::Warning));
        assert_eq!(Severity::parse("extreme"), None);
    }

    #[test]
    fn test_assignment_effective_window_is_inclusive() {
        let a = assignment(1, "2024-01-01", Some("2024-01-31"));
        assert!(!a.is_effective_on(date("2023-12-31")));
        assert!(a.is_effective_on(date("2024-01-01")));
        assert!(a.is_effective_on(date("2024-01-31")));
        assert!(!a.is_effective_on(date("2024-02-01")));

        let inactive = Assignment {
            is_active: false,
            ..assignment(2, "2024-01-01", None)
        };
        assert!(!inactive.is_effective_on(date("2024-06-01")));
    }

    #[test]
    fn test_select_effective_prefers_latest_start() {
        let assignments = vec![
            assignment(1, "2023-01-01", None),
            assignment(2, "2024-01-01", None),
            assignment(3, "2025-01-01", None),
        ];
        let chosen = select_effective(&assignments, date("2024-06-01")).unwrap();
        assert_eq!(chosen.id, 2);
        assert!(select_effective(&assignments, date("2022-01-01")).is_none());
    }

    #[test]
    fn test_plan_truncates_earlier_and_deactivates_inner() {
        let existing = vec![
            assignment(1, "2023-01-01", None),
            assignment(2, "2024-03-01", Some("2024-04-01")),
            assignment(3, "2025-01-01", None),
        ];
        let changes = plan_assignment(&existing, date("2024-02-01"), Some(date("2024-12-31")), None);
        assert_eq!(
            changes,
            vec![
                AssignmentChange::Truncate {
                    id: 1,
                    effective_to: date("2024-01-31")
                },
                AssignmentChange::Deactivate { id: 2 },
            ]
        );
    }

    #[test]
    fn test_plan_same_start_deactivates() {
        let existing = vec![assignment(1, "2024-01-01", None)];
        let changes = plan_assignment(&existing, date("2024-01-01"), None, None);
        assert_eq!(changes, vec![AssignmentChange::Deactivate { id: 1 }]);
    }

    #[test]
    fn test_plan_ignores_excluded_and_disjoint() {
        let existing = vec![
            assignment(1, "2023-01-01", Some("2023-12-31")),
            assignment(2, "2024-01-01", None),
        ];
        let changes = plan_assignment(&existing, date("2024-01-01"), None, Some(2));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_validate_window() {
        assert!(validate_window(date("2024-01-01"), None).is_ok());
        assert!(validate_window(date("2024-01-01"), Some(date("2024-01-01"))).is_ok());
        assert!(matches!(
            validate_window(date("2024-01-02"), Some(date("2024-01-01"))),
            Err(AppError::Validation(_))
        ));
    }
}
