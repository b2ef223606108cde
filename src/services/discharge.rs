//! Discharge batches: compute and store discharges for water-level samples.
//!
//! Each sample is paired with the rating curve active on its date. Writes go
//! through one transaction with a savepoint per sample, so a failing row is
//! reported and rolled back without losing the rest of the batch.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Connection, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::{SeriesKind, WaterLevelSample};
use crate::db::queries::{self, DischargeUpsert};
use crate::errors::AppError;
use crate::helpers::{day_bounds, dec_to_f64, f64_to_decimal_4dp, opt_dec_to_f64, round4};
use crate::services::rating_curve::CurveTimeline;

/// One water-level reading ready for computation.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub water_level: f64,
}

impl From<WaterLevelSample> for Sample {
    fn from(row: WaterLevelSample) -> Self {
        Self {
            timestamp: row.timestamp,
            water_level: dec_to_f64(row.water_level),
        }
    }
}

/// A sample that could not be computed or stored.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SampleError {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Build the row to store for one computed sample.
///
/// Negative and non-finite discharges are refused; the column is
/// constrained to `>= 0`.
pub fn discharge_row(
    sensor_code: &str,
    curve_code: &str,
    sample: &Sample,
    discharge: f64,
) -> Result<DischargeUpsert, SampleError> {
    if !discharge.is_finite() || discharge < 0.0 {
        return Err(SampleError {
            timestamp: sample.timestamp,
            message: format!(
                "computed discharge {} for water level {} is not a valid flow",
                discharge, sample.water_level
            ),
        });
    }

    Ok(DischargeUpsert {
        sensor_code: sensor_code.to_string(),
        recorded_at: sample.timestamp,
        water_level: f64_to_decimal_4dp(sample.water_level),
        discharge: f64_to_decimal_4dp(discharge),
        rating_curve_code: curve_code.to_string(),
    })
}

/// Rows to write for samples under the curves active on their dates.
#[derive(Debug, Default)]
pub struct ActiveCurvePlan {
    pub rows: Vec<DischargeUpsert>,
    pub skipped: usize,
    pub errors: Vec<SampleError>,
}

/// Pair every sample with its active curve. Samples dated before the first
/// curve are skipped.
pub fn plan_with_active_curves(
    timeline: &CurveTimeline,
    sensor_code: &str,
    samples: &[Sample],
) -> ActiveCurvePlan {
    let mut plan = ActiveCurvePlan::default();
    for sample in samples {
        let Some(curve) = timeline.active_at(sample.timestamp.date_naive()) else {
            plan.skipped += 1;
            continue;
        };
        let q = curve.formula.discharge(sample.water_level);
        match discharge_row(sensor_code, &curve.code, sample, q) {
            Ok(row) => plan.rows.push(row),
            Err(e) => plan.errors.push(e),
        }
    }
    plan
}

/// Upsert `rows` in one transaction, isolating each row in a savepoint.
///
/// Returns the number of rows stored; failures are appended to `errors`.
pub async fn persist_discharges(
    pool: &PgPool,
    kind: SeriesKind,
    rows: &[DischargeUpsert],
    errors: &mut Vec<SampleError>,
) -> Result<usize, AppError> {
    if rows.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut saved = 0;
    for row in rows {
        let mut savepoint = (*tx).begin().await?;
        match queries::upsert_discharge(&mut savepoint, kind, row).await {
            Ok(()) => {
                savepoint.commit().await?;
                saved += 1;
            }
            Err(e) => {
                savepoint.rollback().await?;
                tracing::warn!(
                    "Failed to store {} discharge for {} at {}: {}",
                    kind,
                    row.sensor_code,
                    row.recorded_at,
                    e
                );
                errors.push(SampleError {
                    timestamp: row.recorded_at,
                    message: e.to_string(),
                });
            }
        }
    }
    tx.commit().await?;

    Ok(saved)
}

/// Result of a batch run with active curves.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProcessReport {
    pub run_id: Uuid,
    pub sensor_code: String,
    pub kind: SeriesKind,
    pub total_samples: usize,
    pub processed: usize,
    /// Samples with no curve in force on their date
    pub skipped: usize,
    pub errors: Vec<SampleError>,
}

/// Compute and store discharges for `samples` of one sensor.
pub async fn process_samples(
    pool: &PgPool,
    kind: SeriesKind,
    sensor_code: &str,
    samples: &[Sample],
) -> Result<ProcessReport, AppError> {
    let run_id = Uuid::new_v4();
    let timeline = crate::services::rating_curve::load_timeline(pool, sensor_code).await?;

    let ActiveCurvePlan {
        rows,
        skipped,
        mut errors,
    } = plan_with_active_curves(&timeline, sensor_code, samples);
    let processed = persist_discharges(pool, kind, &rows, &mut errors).await?;

    tracing::info!(
        %run_id,
        "Processed {} {} samples for {}: {} stored, {} skipped, {} errors",
        samples.len(),
        kind,
        sensor_code,
        processed,
        skipped,
        errors.len()
    );

    Ok(ProcessReport {
        run_id,
        sensor_code: sensor_code.to_string(),
        kind,
        total_samples: samples.len(),
        processed,
        skipped,
        errors,
    })
}

/// Process every sample of a sensor in the inclusive day range.
pub async fn process_range(
    pool: &PgPool,
    kind: SeriesKind,
    sensor_code: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<ProcessReport, AppError> {
    let (lower, upper) = day_bounds(start, end)?;
    let samples: Vec<Sample> = queries::get_samples(pool, kind, sensor_code, lower, upper)
        .await?
        .into_iter()
        .map(Sample::from)
        .collect();
    process_samples(pool, kind, sensor_code, &samples).await
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LatestDischarge {
    pub timestamp: DateTime<Utc>,
    pub water_level: f64,
    pub discharge: f64,
    pub rating_curve_code: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DischargeSummary {
    pub sensor_code: String,
    pub kind: SeriesKind,
    pub total_records: i64,
    pub latest: Option<LatestDischarge>,
    pub min_discharge: Option<f64>,
    pub max_discharge: Option<f64>,
    pub avg_discharge: Option<f64>,
    pub unit: String,
}

/// Aggregates over stored discharges; `None` when the range holds none.
pub async fn summary(
    pool: &PgPool,
    kind: SeriesKind,
    sensor_code: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Option<DischargeSummary>, AppError> {
    let (lower, upper) = day_bounds(start, end)?;
    let stats = queries::get_discharge_stats(pool, kind, sensor_code, lower, upper).await?;
    if stats.total == 0 {
        return Ok(None);
    }
    let latest = queries::get_latest_discharge(pool, kind, sensor_code, lower, upper).await?;

    Ok(Some(DischargeSummary {
        sensor_code: sensor_code.to_string(),
        kind,
        total_records: stats.total,
        latest: latest.map(|d| LatestDischarge {
            timestamp: d.recorded_at,
            water_level: dec_to_f64(d.water_level),
            discharge: dec_to_f64(d.discharge),
            rating_curve_code: d.rating_curve_code,
        }),
        min_discharge: opt_dec_to_f64(stats.min_discharge),
        max_discharge: opt_dec_to_f64(stats.max_discharge),
        avg_discharge: opt_dec_to_f64(stats.avg_discharge).map(round4),
        unit: crate::services::rating_curve::DISCHARGE_UNIT.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rating_curve::{Curve, Formula, FormulaType};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse::<DateTime<Utc>>().unwrap()
    }

    fn sample(at: &str, h: f64) -> Sample {
        Sample {
            timestamp: ts(at),
            water_level: h,
        }
    }

    fn custom_curve(id: i64, code: &str, a: f64, effective: &str) -> Curve {
        Curve {
            id,
            code: code.to_string(),
            sensor_code: "S1".to_string(),
            formula: Formula::new(FormulaType::Custom, a, None, None).unwrap(),
            effective_date: effective.parse().unwrap(),
        }
    }

    #[test]
    fn test_discharge_row_rounds_to_storage_precision() {
        let row = discharge_row("S1", "RC-1", &sample("2024-01-01T06:00:00Z", 1.234_56), 7.891_23)
            .unwrap();
        assert_eq!(row.water_level, Decimal::from_str("1.2346").unwrap());
        assert_eq!(row.discharge, Decimal::from_str("7.8912").unwrap());
        assert_eq!(row.rating_curve_code, "RC-1");
    }

    #[test]
    fn test_discharge_row_rejects_negative_and_nan() {
        let s = sample("2024-01-01T06:00:00Z", 1.0);
        assert!(discharge_row("S1", "RC-1", &s, -0.5).is_err());
        assert!(discharge_row("S1", "RC-1", &s, f64::NAN).is_err());
        assert!(discharge_row("S1", "RC-1", &s, 0.0).is_ok());
    }

    #[test]
    fn test_plan_uses_curve_active_on_sample_date() {
        let timeline = CurveTimeline::new(vec![
            custom_curve(1, "A", 1.0, "2024-01-01"),
            custom_curve(2, "B", 2.0, "2024-06-01"),
        ]);
        let samples = vec![
            sample("2023-12-31T23:00:00Z", 1.0),
            sample("2024-05-31T23:59:59Z", 3.0),
            sample("2024-06-01T00:00:00Z", 3.0),
        ];

        let plan = plan_with_active_curves(&timeline, "S1", &samples);

        assert_eq!(plan.skipped, 1);
        assert!(plan.errors.is_empty());
        assert_eq!(plan.rows.len(), 2);
        assert_eq!(plan.rows[0].rating_curve_code, "A");
        assert_eq!(plan.rows[0].discharge, Decimal::from(3));
        assert_eq!(plan.rows[1].rating_curve_code, "B");
        assert_eq!(plan.rows[1].discharge, Decimal::from(6));
    }

    #[test]
    fn test_plan_collects_invalid_discharge_as_error() {
        let timeline = CurveTimeline::new(vec![custom_curve(1, "NEG", -1.0, "2024-01-01")]);
        let samples = vec![sample("2024-02-01T00:00:00Z", 2.0)];

        let plan = plan_with_active_curves(&timeline, "S1", &samples);

        assert!(plan.rows.is_empty());
        assert_eq!(plan.errors.len(), 1);
        assert_eq!(plan.errors[0].timestamp, ts("2024-02-01T00:00:00Z"));
    }

    #[test]
    fn test_plan_with_empty_timeline_skips_everything() {
        let timeline = CurveTimeline::new(Vec::new());
        let samples = vec![sample("2024-02-01T00:00:00Z", 2.0)];
        let plan = plan_with_active_curves(&timeline, "S1", &samples);
        assert_eq!(plan.skipped, 1);
        assert!(plan.rows.is_empty());
    }
}
