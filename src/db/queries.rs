use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use super::models::{
    CurveUsage, DischargeStats, PendingSample, RatingCurve, SeriesKind, StoredDischarge,
    ThresholdAssignment, ThresholdLevel, ThresholdTemplate, WaterLevelSample,
};

const RATING_CURVE_COLUMNS: &str = "id, code, sensor_code, formula_type, a, b, c, effective_date";

const TEMPLATE_COLUMNS: &str =
    "code, name, description, parameter_type, unit, is_active, created_at, updated_at";

const LEVEL_COLUMNS: &str = "id, template_code, level_order, level_name, level_code, \
     min_value, max_value, color, color_hex, severity, alert_enabled, alert_message";

const ASSIGNMENT_COLUMNS: &str = "id, sensor_code, template_code, effective_from, effective_to, \
     is_active, notes, created_at, updated_at";

// ---------------------------------------------------------------------------
// Rating curves
// ---------------------------------------------------------------------------

/// Parameters for inserting or replacing a rating curve.
pub struct RatingCurveParams {
    pub code: String,
    pub sensor_code: String,
    pub formula_type: String,
    pub a: Decimal,
    pub b: Option<Decimal>,
    pub c: Option<Decimal>,
    pub effective_date: NaiveDate,
}

/// List rating curves, optionally restricted to one sensor, newest first.
pub async fn list_rating_curves(
    pool: &PgPool,
    sensor_code: Option<&str>,
) -> Result<Vec<RatingCurve>, sqlx::Error> {
    sqlx::query_as::<_, RatingCurve>(&format!(
        "SELECT {RATING_CURVE_COLUMNS} FROM rating_curves
         WHERE ($1::text IS NULL OR sensor_code = $1)
         ORDER BY sensor_code, effective_date DESC, id DESC"
    ))
    .bind(sensor_code)
    .fetch_all(pool)
    .await
}

pub async fn get_rating_curve(pool: &PgPool, id: i64) -> Result<Option<RatingCurve>, sqlx::Error> {
    sqlx::query_as::<_, RatingCurve>(&format!(
        "SELECT {RATING_CURVE_COLUMNS} FROM rating_curves WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// All curves of a sensor in no particular order; callers build a timeline.
pub async fn get_rating_curves_for_sensor(
    pool: &PgPool,
    sensor_code: &str,
) -> Result<Vec<RatingCurve>, sqlx::Error> {
    sqlx::query_as::<_, RatingCurve>(&format!(
        "SELECT {RATING_CURVE_COLUMNS} FROM rating_curves WHERE sensor_code = $1"
    ))
    .bind(sensor_code)
    .fetch_all(pool)
    .await
}

/// Whether a curve code is taken by a row other than `exclude_id`.
pub async fn rating_curve_code_exists(
    pool: &PgPool,
    code: &str,
    exclude_id: Option<i64>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(
             SELECT 1 FROM rating_curves
             WHERE code = $1 AND ($2::bigint IS NULL OR id <> $2)
         )",
    )
    .bind(code)
    .bind(exclude_id)
    .fetch_one(pool)
    .await
}

pub async fn insert_rating_curve(
    pool: &PgPool,
    params: &RatingCurveParams,
) -> Result<RatingCurve, sqlx::Error> {
    sqlx::query_as::<_, RatingCurve>(&format!(
        "INSERT INTO rating_curves (code, sensor_code, formula_type, a, b, c, effective_date)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {RATING_CURVE_COLUMNS}"
    ))
    .bind(&params.code)
    .bind(&params.sensor_code)
    .bind(&params.formula_type)
    .bind(params.a)
    .bind(params.b)
    .bind(params.c)
    .bind(params.effective_date)
    .fetch_one(pool)
    .await
}

pub async fn update_rating_curve(
    pool: &PgPool,
    id: i64,
    params: &RatingCurveParams,
) -> Result<Option<RatingCurve>, sqlx::Error> {
    sqlx::query_as::<_, RatingCurve>(&format!(
        "UPDATE rating_curves
         SET code = $2, sensor_code = $3, formula_type = $4, a = $5, b = $6, c = $7,
             effective_date = $8, updated_at = NOW()
         WHERE id = $1
         RETURNING {RATING_CURVE_COLUMNS}"
    ))
    .bind(id)
    .bind(&params.code)
    .bind(&params.sensor_code)
    .bind(&params.formula_type)
    .bind(params.a)
    .bind(params.b)
    .bind(params.c)
    .bind(params.effective_date)
    .fetch_optional(pool)
    .await
}

pub async fn delete_rating_curve(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM rating_curves WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Count stored discharges (actual and predicted) computed with a curve.
pub async fn count_discharges_for_curve(pool: &PgPool, code: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT
             (SELECT COUNT(*) FROM calculated_discharges WHERE rating_curve_code = $1)
           + (SELECT COUNT(*) FROM predicted_calculated_discharges WHERE rating_curve_code = $1)",
    )
    .bind(code)
    .fetch_one(pool)
    .await
}

/// Per-curve discharge usage for every curve of a sensor.
pub async fn get_curve_usage_for_sensor(
    pool: &PgPool,
    sensor_code: &str,
) -> Result<Vec<CurveUsage>, sqlx::Error> {
    sqlx::query_as::<_, CurveUsage>(
        "SELECT rc.code AS rating_curve_code,
                (SELECT COUNT(*) FROM calculated_discharges cd WHERE cd.rating_curve_code = rc.code)
              + (SELECT COUNT(*) FROM predicted_calculated_discharges pd WHERE pd.rating_curve_code = rc.code)
                AS usage_count
         FROM rating_curves rc
         WHERE rc.sensor_code = $1",
    )
    .bind(sensor_code)
    .fetch_all(pool)
    .await
}

// ---------------------------------------------------------------------------
// Water-level samples
// ---------------------------------------------------------------------------

/// Raw readings for a sensor in `[start, end)`, ordered by timestamp. A
/// missing bound leaves that side of the range open.
///
/// Duplicate actual readings keep the most recently inserted one; predicted
/// readings keep the latest prediction run per target timestamp.
pub async fn get_samples(
    pool: &PgPool,
    kind: SeriesKind,
    sensor_code: &str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<Vec<WaterLevelSample>, sqlx::Error> {
    let sql = match kind {
        SeriesKind::Actual => {
            "SELECT DISTINCT ON (received_at) received_at AS timestamp, value AS water_level
             FROM data_actuals
             WHERE sensor_code = $1
               AND ($2::timestamptz IS NULL OR received_at >= $2)
               AND ($3::timestamptz IS NULL OR received_at < $3)
             ORDER BY received_at, id DESC"
        }
        SeriesKind::Predicted => {
            "SELECT DISTINCT ON (prediction_for_ts)
                    prediction_for_ts AS timestamp, predicted_value AS water_level
             FROM data_predictions
             WHERE sensor_code = $1
               AND ($2::timestamptz IS NULL OR prediction_for_ts >= $2)
               AND ($3::timestamptz IS NULL OR prediction_for_ts < $3)
             ORDER BY prediction_for_ts, prediction_run_at DESC, id DESC"
        }
    };

    sqlx::query_as::<_, WaterLevelSample>(sql)
        .bind(sensor_code)
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await
}

/// Readings at or after `since` that have no stored discharge yet, across all
/// sensors, ordered by `(timestamp, sensor_code)`.
///
/// Only sensors with a curve effective on the sample's date are returned.
/// `after` is the `(timestamp, sensor_code)` key of the last row of the
/// previous page; rows at or before it are skipped.
pub async fn get_pending_samples(
    pool: &PgPool,
    kind: SeriesKind,
    since: DateTime<Utc>,
    after: Option<(DateTime<Utc>, &str)>,
    limit: i64,
) -> Result<Vec<PendingSample>, sqlx::Error> {
    let sql = match kind {
        SeriesKind::Actual => {
            "SELECT s.sensor_code, s.timestamp, s.water_level
             FROM (
                 SELECT DISTINCT ON (sensor_code, received_at)
                        sensor_code, received_at AS timestamp, value AS water_level
                 FROM data_actuals
                 WHERE received_at >= $1
                 ORDER BY sensor_code, received_at, id DESC
             ) s
             LEFT JOIN calculated_discharges d
                    ON d.sensor_code = s.sensor_code AND d.calculated_at = s.timestamp
             WHERE d.id IS NULL
               AND EXISTS (
                   SELECT 1 FROM rating_curves rc
                   WHERE rc.sensor_code = s.sensor_code
                     AND rc.effective_date <= (s.timestamp AT TIME ZONE 'UTC')::date
               )
               AND ($3::timestamptz IS NULL OR (s.timestamp, s.sensor_code) > ($3, $4::text))
             ORDER BY s.timestamp, s.sensor_code
             LIMIT $2"
        }
        SeriesKind::Predicted => {
            "SELECT s.sensor_code, s.timestamp, s.water_level
             FROM (
                 SELECT DISTINCT ON (sensor_code, prediction_for_ts)
                        sensor_code, prediction_for_ts AS timestamp, predicted_value AS water_level
                 FROM data_predictions
                 WHERE prediction_for_ts >= $1
                 ORDER BY sensor_code, prediction_for_ts, prediction_run_at DESC, id DESC
             ) s
             LEFT JOIN predicted_calculated_discharges d
                    ON d.sensor_code = s.sensor_code AND d.predicted_at = s.timestamp
             WHERE d.id IS NULL
               AND EXISTS (
                   SELECT 1 FROM rating_curves rc
                   WHERE rc.sensor_code = s.sensor_code
                     AND rc.effective_date <= (s.timestamp AT TIME ZONE 'UTC')::date
               )
               AND ($3::timestamptz IS NULL OR (s.timestamp, s.sensor_code) > ($3, $4::text))
             ORDER BY s.timestamp, s.sensor_code
             LIMIT $2"
        }
    };

    let (after_ts, after_sensor) = after.unzip();
    sqlx::query_as::<_, PendingSample>(sql)
        .bind(since)
        .bind(limit)
        .bind(after_ts)
        .bind(after_sensor)
        .fetch_all(pool)
        .await
}

// ---------------------------------------------------------------------------
// Discharges
// ---------------------------------------------------------------------------

/// Parameters for upserting one computed discharge.
#[derive(Debug, Clone, PartialEq)]
pub struct DischargeUpsert {
    pub sensor_code: String,
    pub recorded_at: DateTime<Utc>,
    pub water_level: Decimal,
    pub discharge: Decimal,
    pub rating_curve_code: String,
}

/// Stored discharges of a sensor in `[start, end)`, either side open when `None`.
pub async fn get_discharges_in_range(
    pool: &PgPool,
    kind: SeriesKind,
    sensor_code: &str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<Vec<StoredDischarge>, sqlx::Error> {
    let ts = kind.discharge_ts_column();
    sqlx::query_as::<_, StoredDischarge>(&format!(
        "SELECT water_level, discharge, rating_curve_code, {ts} AS recorded_at
         FROM {table}
         WHERE sensor_code = $1
           AND ($2::timestamptz IS NULL OR {ts} >= $2)
           AND ($3::timestamptz IS NULL OR {ts} < $3)
         ORDER BY {ts}",
        table = kind.discharge_table(),
    ))
    .bind(sensor_code)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}

/// Insert or replace the discharge for `(sensor_code, recorded_at)`.
pub async fn upsert_discharge(
    conn: &mut PgConnection,
    kind: SeriesKind,
    row: &DischargeUpsert,
) -> Result<(), sqlx::Error> {
    let ts = kind.discharge_ts_column();
    sqlx::query(&format!(
        "INSERT INTO {table} (sensor_code, {ts}, water_level, discharge, rating_curve_code)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (sensor_code, {ts}) DO UPDATE
         SET water_level = EXCLUDED.water_level,
             discharge = EXCLUDED.discharge,
             rating_curve_code = EXCLUDED.rating_curve_code,
             updated_at = NOW()",
        table = kind.discharge_table(),
    ))
    .bind(&row.sensor_code)
    .bind(row.recorded_at)
    .bind(row.water_level)
    .bind(row.discharge)
    .bind(&row.rating_curve_code)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Aggregate statistics over a sensor's stored discharges in `[start, end)`.
pub async fn get_discharge_stats(
    pool: &PgPool,
    kind: SeriesKind,
    sensor_code: &str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<DischargeStats, sqlx::Error> {
    let ts = kind.discharge_ts_column();
    sqlx::query_as::<_, DischargeStats>(&format!(
        "SELECT COUNT(*) AS total,
                MIN(discharge) AS min_discharge,
                MAX(discharge) AS max_discharge,
                AVG(discharge) AS avg_discharge
         FROM {table}
         WHERE sensor_code = $1
           AND ($2::timestamptz IS NULL OR {ts} >= $2)
           AND ($3::timestamptz IS NULL OR {ts} < $3)",
        table = kind.discharge_table(),
    ))
    .bind(sensor_code)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await
}

/// Most recent stored discharge of a sensor in `[start, end)`.
pub async fn get_latest_discharge(
    pool: &PgPool,
    kind: SeriesKind,
    sensor_code: &str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<Option<StoredDischarge>, sqlx::Error> {
    let ts = kind.discharge_ts_column();
    sqlx::query_as::<_, StoredDischarge>(&format!(
        "SELECT water_level, discharge, rating_curve_code, {ts} AS recorded_at
         FROM {table}
         WHERE sensor_code = $1
           AND ($2::timestamptz IS NULL OR {ts} >= $2)
           AND ($3::timestamptz IS NULL OR {ts} < $3)
         ORDER BY {ts} DESC
         LIMIT 1",
        table = kind.discharge_table(),
    ))
    .bind(sensor_code)
    .bind(start)
    .bind(end)
    .fetch_optional(pool)
    .await
}

// ---------------------------------------------------------------------------
// Threshold templates and levels
// ---------------------------------------------------------------------------

/// Parameters for inserting or replacing a threshold template.
pub struct TemplateParams {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub parameter_type: String,
    pub unit: Option<String>,
    pub is_active: bool,
}

/// Parameters for inserting or replacing a threshold level.
pub struct LevelParams {
    pub level_order: i32,
    pub level_name: String,
    pub level_code: String,
    pub min_value: Decimal,
    pub max_value: Option<Decimal>,
    pub color: Option<String>,
    pub color_hex: Option<String>,
    pub severity: String,
    pub alert_enabled: bool,
    pub alert_message: Option<String>,
}

pub async fn list_templates(pool: &PgPool) -> Result<Vec<ThresholdTemplate>, sqlx::Error> {
    sqlx::query_as::<_, ThresholdTemplate>(&format!(
        "SELECT {TEMPLATE_COLUMNS} FROM threshold_templates ORDER BY name, code"
    ))
    .fetch_all(pool)
    .await
}

pub async fn get_template(
    pool: &PgPool,
    code: &str,
) -> Result<Option<ThresholdTemplate>, sqlx::Error> {
    sqlx::query_as::<_, ThresholdTemplate>(&format!(
        "SELECT {TEMPLATE_COLUMNS} FROM threshold_templates WHERE code = $1"
    ))
    .bind(code)
    .fetch_optional(pool)
    .await
}

/// Fetch a template and lock its row until the transaction ends.
pub async fn lock_template(
    conn: &mut PgConnection,
    code: &str,
) -> Result<Option<ThresholdTemplate>, sqlx::Error> {
    sqlx::query_as::<_, ThresholdTemplate>(&format!(
        "SELECT {TEMPLATE_COLUMNS} FROM threshold_templates WHERE code = $1 FOR UPDATE"
    ))
    .bind(code)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn insert_template(
    pool: &PgPool,
    params: &TemplateParams,
) -> Result<ThresholdTemplate, sqlx::Error> {
    sqlx::query_as::<_, ThresholdTemplate>(&format!(
        "INSERT INTO threshold_templates (code, name, description, parameter_type, unit, is_active)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {TEMPLATE_COLUMNS}"
    ))
    .bind(&params.code)
    .bind(&params.name)
    .bind(&params.description)
    .bind(&params.parameter_type)
    .bind(&params.unit)
    .bind(params.is_active)
    .fetch_one(pool)
    .await
}

/// Replace a template's attributes. The code is immutable.
pub async fn update_template(
    pool: &PgPool,
    code: &str,
    params: &TemplateParams,
) -> Result<Option<ThresholdTemplate>, sqlx::Error> {
    sqlx::query_as::<_, ThresholdTemplate>(&format!(
        "UPDATE threshold_templates
         SET name = $2, description = $3, parameter_type = $4, unit = $5, is_active = $6,
             updated_at = NOW()
         WHERE code = $1
         RETURNING {TEMPLATE_COLUMNS}"
    ))
    .bind(code)
    .bind(&params.name)
    .bind(&params.description)
    .bind(&params.parameter_type)
    .bind(&params.unit)
    .bind(params.is_active)
    .fetch_optional(pool)
    .await
}

pub async fn delete_template(pool: &PgPool, code: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM threshold_templates WHERE code = $1")
        .bind(code)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn count_assignments_for_template(pool: &PgPool, code: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM sensor_threshold_assignments WHERE template_code = $1",
    )
    .bind(code)
    .fetch_one(pool)
    .await
}

/// Levels of a template ordered by `level_order`.
pub async fn get_levels(
    conn: &mut PgConnection,
    template_code: &str,
) -> Result<Vec<ThresholdLevel>, sqlx::Error> {
    sqlx::query_as::<_, ThresholdLevel>(&format!(
        "SELECT {LEVEL_COLUMNS} FROM threshold_levels
         WHERE template_code = $1
         ORDER BY level_order, id"
    ))
    .bind(template_code)
    .fetch_all(&mut *conn)
    .await
}

/// Levels of several templates at once, ordered by template then `level_order`.
pub async fn get_levels_for_templates(
    pool: &PgPool,
    template_codes: &[String],
) -> Result<Vec<ThresholdLevel>, sqlx::Error> {
    sqlx::query_as::<_, ThresholdLevel>(&format!(
        "SELECT {LEVEL_COLUMNS} FROM threshold_levels
         WHERE template_code = ANY($1)
         ORDER BY template_code, level_order, id"
    ))
    .bind(template_codes)
    .fetch_all(pool)
    .await
}

pub async fn level_code_exists(
    conn: &mut PgConnection,
    level_code: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM threshold_levels WHERE level_code = $1)",
    )
    .bind(level_code)
    .fetch_one(&mut *conn)
    .await
}

pub async fn insert_level(
    conn: &mut PgConnection,
    template_code: &str,
    params: &LevelParams,
) -> Result<ThresholdLevel, sqlx::Error> {
    sqlx::query_as::<_, ThresholdLevel>(&format!(
        "INSERT INTO threshold_levels (
             template_code, level_order, level_name, level_code, min_value, max_value,
             color, color_hex, severity, alert_enabled, alert_message
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         RETURNING {LEVEL_COLUMNS}"
    ))
    .bind(template_code)
    .bind(params.level_order)
    .bind(&params.level_name)
    .bind(&params.level_code)
    .bind(params.min_value)
    .bind(params.max_value)
    .bind(&params.color)
    .bind(&params.color_hex)
    .bind(&params.severity)
    .bind(params.alert_enabled)
    .bind(&params.alert_message)
    .fetch_one(&mut *conn)
    .await
}

/// Replace a level's attributes. The level code is immutable.
pub async fn update_level(
    conn: &mut PgConnection,
    template_code: &str,
    level_code: &str,
    params: &LevelParams,
) -> Result<Option<ThresholdLevel>, sqlx::Error> {
    sqlx::query_as::<_, ThresholdLevel>(&format!(
        "UPDATE threshold_levels
         SET level_order = $3, level_name = $4, min_value = $5, max_value = $6,
             color = $7, color_hex = $8, severity = $9, alert_enabled = $10,
             alert_message = $11, updated_at = NOW()
         WHERE template_code = $1 AND level_code = $2
         RETURNING {LEVEL_COLUMNS}"
    ))
    .bind(template_code)
    .bind(level_code)
    .bind(params.level_order)
    .bind(&params.level_name)
    .bind(params.min_value)
    .bind(params.max_value)
    .bind(&params.color)
    .bind(&params.color_hex)
    .bind(&params.severity)
    .bind(params.alert_enabled)
    .bind(&params.alert_message)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn delete_level(
    pool: &PgPool,
    template_code: &str,
    level_code: &str,
) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM threshold_levels WHERE template_code = $1 AND level_code = $2")
            .bind(template_code)
            .bind(level_code)
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Sensor threshold assignments
// ---------------------------------------------------------------------------

/// Parameters for inserting a threshold assignment.
pub struct AssignmentParams {
    pub sensor_code: String,
    pub template_code: String,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub is_active: bool,
    pub notes: Option<String>,
}

pub async fn list_assignments(
    pool: &PgPool,
    sensor_code: Option<&str>,
) -> Result<Vec<ThresholdAssignment>, sqlx::Error> {
    sqlx::query_as::<_, ThresholdAssignment>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM sensor_threshold_assignments
         WHERE ($1::text IS NULL OR sensor_code = $1)
         ORDER BY sensor_code, effective_from DESC, id DESC"
    ))
    .bind(sensor_code)
    .fetch_all(pool)
    .await
}

pub async fn get_assignment(
    pool: &PgPool,
    id: i64,
) -> Result<Option<ThresholdAssignment>, sqlx::Error> {
    sqlx::query_as::<_, ThresholdAssignment>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM sensor_threshold_assignments WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Active assignments of a sensor whose window contains `date`.
pub async fn get_effective_assignments(
    pool: &PgPool,
    sensor_code: &str,
    date: NaiveDate,
) -> Result<Vec<ThresholdAssignment>, sqlx::Error> {
    sqlx::query_as::<_, ThresholdAssignment>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM sensor_threshold_assignments
         WHERE sensor_code = $1
           AND is_active
           AND effective_from <= $2
           AND (effective_to IS NULL OR effective_to >= $2)"
    ))
    .bind(sensor_code)
    .bind(date)
    .fetch_all(pool)
    .await
}

/// Lock and return a sensor's active assignments inside a transaction.
pub async fn lock_active_assignments(
    conn: &mut PgConnection,
    sensor_code: &str,
) -> Result<Vec<ThresholdAssignment>, sqlx::Error> {
    sqlx::query_as::<_, ThresholdAssignment>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM sensor_threshold_assignments
         WHERE sensor_code = $1 AND is_active
         FOR UPDATE"
    ))
    .bind(sensor_code)
    .fetch_all(&mut *conn)
    .await
}

pub async fn insert_assignment(
    conn: &mut PgConnection,
    params: &AssignmentParams,
) -> Result<ThresholdAssignment, sqlx::Error> {
    sqlx::query_as::<_, ThresholdAssignment>(&format!(
        "INSERT INTO sensor_threshold_assignments (
             sensor_code, template_code, effective_from, effective_to, is_active, notes
         ) VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {ASSIGNMENT_COLUMNS}"
    ))
    .bind(&params.sensor_code)
    .bind(&params.template_code)
    .bind(params.effective_from)
    .bind(params.effective_to)
    .bind(params.is_active)
    .bind(&params.notes)
    .fetch_one(&mut *conn)
    .await
}

/// Replace an assignment's window, active flag and notes.
pub async fn update_assignment(
    conn: &mut PgConnection,
    id: i64,
    effective_from: NaiveDate,
    effective_to: Option<NaiveDate>,
    is_active: bool,
    notes: Option<&str>,
) -> Result<Option<ThresholdAssignment>, sqlx::Error> {
    sqlx::query_as::<_, ThresholdAssignment>(&format!(
        "UPDATE sensor_threshold_assignments
         SET effective_from = $2, effective_to = $3, is_active = $4, notes = $5,
             updated_at = NOW()
         WHERE id = $1
         RETURNING {ASSIGNMENT_COLUMNS}"
    ))
    .bind(id)
    .bind(effective_from)
    .bind(effective_to)
    .bind(is_active)
    .bind(notes)
    .fetch_optional(&mut *conn)
    .await
}

/// Close an assignment's window at `effective_to`.
pub async fn truncate_assignment(
    conn: &mut PgConnection,
    id: i64,
    effective_to: NaiveDate,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE sensor_threshold_assignments
         SET effective_to = $2, updated_at = NOW()
         WHERE id = $1",
    )
    .bind(id)
    .bind(effective_to)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn deactivate_assignment(conn: &mut PgConnection, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE sensor_threshold_assignments
         SET is_active = FALSE, updated_at = NOW()
         WHERE id = $1",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn delete_assignment(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sensor_threshold_assignments WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
