//! What-if recalculation and pairwise comparison of rating curves.
//!
//! Both operations replay a sensor's raw water levels through a chosen
//! curve. Recalculation may persist the result; comparison never writes.
//! Persisting is decided before any statement is issued, so a dry run opens
//! no write transaction at all.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::SeriesKind;
use crate::db::queries::{self, DischargeUpsert};
use crate::errors::AppError;
use crate::helpers::{day_bounds, dec_to_f64, opt_round4, round4};
use crate::services::discharge::{discharge_row, persist_discharges, Sample, SampleError};
use crate::services::rating_curve::{Curve, Formula, DISCHARGE_UNIT};

// ---------------------------------------------------------------------------
// Pure computation
// ---------------------------------------------------------------------------

/// Percentage change from `base` to `value`; undefined for a non-positive base.
pub fn percent_difference(base: f64, value: f64) -> Option<f64> {
    if base > 0.0 {
        Some((value - base) / base * 100.0)
    } else {
        None
    }
}

/// Count, average and extremes of a series.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SeriesStats {
    pub count: usize,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

impl SeriesStats {
    /// `None` for an empty series, so no average is ever taken over nothing.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        (count > 0).then(|| Self {
            count,
            avg: sum / count as f64,
            min,
            max,
        })
    }

    fn rounded(self) -> Self {
        Self {
            count: self.count,
            avg: round4(self.avg),
            min: round4(self.min),
            max: round4(self.max),
        }
    }
}

/// One sample replayed through a candidate curve.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RecalculatedSample {
    pub timestamp: DateTime<Utc>,
    pub water_level: f64,
    pub discharge: f64,
    /// Currently stored discharge for this timestamp, if any
    pub old_discharge: Option<f64>,
    pub difference: Option<f64>,
    pub difference_percent: Option<f64>,
}

/// Replay `samples` through `formula`, diffing against stored discharges.
pub fn recalculate_samples(
    formula: &Formula,
    samples: &[Sample],
    stored: &HashMap<DateTime<Utc>, f64>,
) -> Vec<RecalculatedSample> {
    samples
        .iter()
        .map(|s| {
            let discharge = formula.discharge(s.water_level);
            let old = stored.get(&s.timestamp).copied();
            RecalculatedSample {
                timestamp: s.timestamp,
                water_level: s.water_level,
                discharge,
                old_discharge: old,
                difference: old.map(|o| discharge - o),
                difference_percent: old.and_then(|o| percent_difference(o, discharge)),
            }
        })
        .collect()
}

/// One sample under two curves. `difference` is curve 2 minus curve 1.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ComparedSample {
    pub timestamp: DateTime<Utc>,
    pub water_level: f64,
    pub discharge_curve1: f64,
    pub discharge_curve2: f64,
    pub difference: f64,
    pub difference_percent: Option<f64>,
}

pub fn compare_samples(first: &Formula, second: &Formula, samples: &[Sample]) -> Vec<ComparedSample> {
    samples
        .iter()
        .map(|s| {
            let q1 = first.discharge(s.water_level);
            let q2 = second.discharge(s.water_level);
            ComparedSample {
                timestamp: s.timestamp,
                water_level: s.water_level,
                discharge_curve1: q1,
                discharge_curve2: q2,
                difference: q2 - q1,
                difference_percent: percent_difference(q1, q2),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ComparisonSummary {
    pub curve1: SeriesStats,
    pub curve2: SeriesStats,
    pub difference: SeriesStats,
}

impl ComparisonSummary {
    pub fn from_samples(samples: &[ComparedSample]) -> Option<Self> {
        Some(Self {
            curve1: SeriesStats::from_values(samples.iter().map(|s| s.discharge_curve1))?,
            curve2: SeriesStats::from_values(samples.iter().map(|s| s.discharge_curve2))?,
            difference: SeriesStats::from_values(samples.iter().map(|s| s.difference))?,
        })
    }
}

/// Rows to store for a recalculation; empty for a dry run.
pub fn plan_writes(
    persist: bool,
    sensor_code: &str,
    curve_code: &str,
    results: &[RecalculatedSample],
) -> (Vec<DischargeUpsert>, Vec<SampleError>) {
    let mut rows = Vec::new();
    let mut errors = Vec::new();
    if !persist {
        return (rows, errors);
    }
    for r in results {
        let sample = Sample {
            timestamp: r.timestamp,
            water_level: r.water_level,
        };
        match discharge_row(sensor_code, curve_code, &sample, r.discharge) {
            Ok(row) => rows.push(row),
            Err(e) => errors.push(e),
        }
    }
    (rows, errors)
}

fn round_recalculated(r: RecalculatedSample) -> RecalculatedSample {
    RecalculatedSample {
        timestamp: r.timestamp,
        water_level: round4(r.water_level),
        discharge: round4(r.discharge),
        old_discharge: opt_round4(r.old_discharge),
        difference: opt_round4(r.difference),
        difference_percent: r.difference_percent.map(|p| crate::helpers::round_to(p, 2)),
    }
}

fn round_compared(c: ComparedSample) -> ComparedSample {
    ComparedSample {
        timestamp: c.timestamp,
        water_level: round4(c.water_level),
        discharge_curve1: round4(c.discharge_curve1),
        discharge_curve2: round4(c.discharge_curve2),
        difference: round4(c.difference),
        difference_percent: c.difference_percent.map(|p| crate::helpers::round_to(p, 2)),
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Identity of a curve used in a report.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CurveRef {
    pub id: i64,
    pub code: String,
    pub effective_date: NaiveDate,
    pub formula: String,
}

impl From<&Curve> for CurveRef {
    fn from(c: &Curve) -> Self {
        Self {
            id: c.id,
            code: c.code.clone(),
            effective_date: c.effective_date,
            formula: c.formula.display(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecalculationReport {
    pub run_id: Uuid,
    pub sensor_code: String,
    pub kind: SeriesKind,
    pub rating_curve: CurveRef,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Whether results were written (false for a dry run)
    pub persisted: bool,
    pub total_samples: usize,
    pub saved: usize,
    pub errors: Vec<SampleError>,
    pub summary: SeriesStats,
    pub unit: String,
    pub results: Vec<RecalculatedSample>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ComparisonReport {
    pub sensor_code: String,
    pub kind: SeriesKind,
    pub curve1: CurveRef,
    pub curve2: CurveRef,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_samples: usize,
    pub summary: ComparisonSummary,
    pub unit: String,
    pub results: Vec<ComparedSample>,
}

// ---------------------------------------------------------------------------
// Database-backed operations
// ---------------------------------------------------------------------------

async fn load_curve_for_sensor(
    pool: &PgPool,
    curve_id: i64,
    sensor_code: &str,
) -> Result<Curve, AppError> {
    let row = queries::get_rating_curve(pool, curve_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Rating curve {} not found", curve_id)))?;
    let curve = Curve::try_from(row)?;
    if curve.sensor_code != sensor_code {
        return Err(AppError::Validation(format!(
            "Rating curve {} belongs to sensor {}, not {}",
            curve.code, curve.sensor_code, sensor_code
        )));
    }
    Ok(curve)
}

async fn load_samples(
    pool: &PgPool,
    kind: SeriesKind,
    sensor_code: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(Vec<Sample>, Option<DateTime<Utc>>, Option<DateTime<Utc>>), AppError> {
    let (lower, upper) = day_bounds(Some(start), Some(end))?;
    let samples: Vec<Sample> = queries::get_samples(pool, kind, sensor_code, lower, upper)
        .await?
        .into_iter()
        .map(Sample::from)
        .collect();
    if samples.is_empty() {
        return Err(AppError::NotFound(format!(
            "No {} water-level data for sensor {} between {} and {}",
            kind, sensor_code, start, end
        )));
    }
    Ok((samples, lower, upper))
}

/// Replay a sensor's samples through one curve, optionally storing results.
pub async fn recalculate_with_curve(
    pool: &PgPool,
    kind: SeriesKind,
    sensor_code: &str,
    curve_id: i64,
    start: NaiveDate,
    end: NaiveDate,
    persist: bool,
) -> Result<RecalculationReport, AppError> {
    let run_id = Uuid::new_v4();
    let curve = load_curve_for_sensor(pool, curve_id, sensor_code).await?;
    let (samples, lower, upper) = load_samples(pool, kind, sensor_code, start, end).await?;

    let stored: HashMap<DateTime<Utc>, f64> =
        queries::get_discharges_in_range(pool, kind, sensor_code, lower, upper)
            .await?
            .into_iter()
            .map(|d| (d.recorded_at, dec_to_f64(d.discharge)))
            .collect();

    let results = recalculate_samples(&curve.formula, &samples, &stored);
    let summary = SeriesStats::from_values(results.iter().map(|r| r.discharge))
        .ok_or_else(|| AppError::NotFound("Nothing to recalculate".to_string()))?;

    let (rows, mut errors) = plan_writes(persist, sensor_code, &curve.code, &results);
    let saved = if persist {
        persist_discharges(pool, kind, &rows, &mut errors).await?
    } else {
        0
    };

    tracing::info!(
        %run_id,
        "Recalculated {} {} samples for {} with curve {} (persist={}): {} saved, {} errors",
        results.len(),
        kind,
        sensor_code,
        curve.code,
        persist,
        saved,
        errors.len()
    );

    Ok(RecalculationReport {
        run_id,
        sensor_code: sensor_code.to_string(),
        kind,
        rating_curve: CurveRef::from(&curve),
        start_date: start,
        end_date: end,
        persisted: persist,
        total_samples: results.len(),
        saved,
        errors,
        summary: summary.rounded(),
        unit: DISCHARGE_UNIT.to_string(),
        results: results.into_iter().map(round_recalculated).collect(),
    })
}

/// Compare two curves of the same sensor over the same samples. Never writes.
pub async fn compare_curves(
    pool: &PgPool,
    kind: SeriesKind,
    sensor_code: &str,
    curve1_id: i64,
    curve2_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<ComparisonReport, AppError> {
    if curve1_id == curve2_id {
        return Err(AppError::Validation(
            "curve1_id and curve2_id must refer to different rating curves".to_string(),
        ));
    }
    let curve1 = load_curve_for_sensor(pool, curve1_id, sensor_code).await?;
    let curve2 = load_curve_for_sensor(pool, curve2_id, sensor_code).await?;
    let (samples, _, _) = load_samples(pool, kind, sensor_code, start, end).await?;

    let results = compare_samples(&curve1.formula, &curve2.formula, &samples);
    let summary = ComparisonSummary::from_samples(&results)
        .ok_or_else(|| AppError::NotFound("Nothing to compare".to_string()))?;

    tracing::debug!(
        "Compared curves {} and {} over {} {} samples for {}",
        curve1.code,
        curve2.code,
        results.len(),
        kind,
        sensor_code
    );

    Ok(ComparisonReport {
        sensor_code: sensor_code.to_string(),
        kind,
        curve1: CurveRef::from(&curve1),
        curve2: CurveRef::from(&curve2),
        start_date: start,
        end_date: end,
        total_samples: results.len(),
        summary: ComparisonSummary {
            curve1: summary.curve1.rounded(),
            curve2: summary.curve2.rounded(),
            difference: summary.difference.rounded(),
        },
        unit: DISCHARGE_UNIT.to_string(),
        results: results.into_iter().map(round_compared).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rating_curve::FormulaType;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse::<DateTime<Utc>>().unwrap()
    }

    fn two_samples() -> Vec<Sample> {
        vec![
            Sample {
                timestamp: ts("2024-03-01T00:00:00Z"),
                water_level: 1.0,
            },
            Sample {
                timestamp: ts("2024-03-01T01:00:00Z"),
                water_level: 2.0,
            },
        ]
    }

    #[test]
    fn test_percent_difference() {
        assert_eq!(percent_difference(10.0, 12.0), Some(20.0));
        assert_eq!(percent_difference(0.0, 5.0), None);
        assert_eq!(percent_difference(-1.0, 5.0), None);
    }

    #[test]
    fn test_series_stats_empty_is_none() {
        assert_eq!(SeriesStats::from_values(Vec::<f64>::new()), None);
    }

    #[test]
    fn test_series_stats() {
        let stats = SeriesStats::from_values([2.0, 4.0, 9.0]).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.avg, 5.0);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
    }

    #[test]
    fn test_compare_two_curves_over_two_samples() {
        // Curve A effective 2023-01-01, curve B effective 2024-01-01.
        let a = Formula::new(FormulaType::Custom, 2.0, None, None).unwrap();
        let b = Formula::new(FormulaType::Power, 0.0, Some(2.0), Some(3.0)).unwrap();

        let results = compare_samples(&a, &b, &two_samples());

        // H=1: A=2, B=3; H=2: A=4, B=12
        assert_eq!(results[0].discharge_curve1, 2.0);
        assert_eq!(results[0].discharge_curve2, 3.0);
        assert_eq!(results[0].difference, 1.0);
        assert_eq!(results[0].difference_percent, Some(50.0));
        assert_eq!(results[1].difference, 8.0);
        assert_eq!(results[1].difference_percent, Some(200.0));

        let summary = ComparisonSummary::from_samples(&results).unwrap();
        assert_eq!(summary.curve1.avg, 3.0);
        assert_eq!(summary.curve2.avg, 7.5);
        assert_eq!(summary.difference.avg, 4.5);
        assert_eq!(summary.difference.max, 8.0);
        assert_eq!(summary.difference.min, 1.0);
    }

    #[test]
    fn test_compare_summary_empty_is_none() {
        assert!(ComparisonSummary::from_samples(&[]).is_none());
    }

    #[test]
    fn test_recalculate_diffs_against_stored() {
        let f = Formula::new(FormulaType::Custom, 5.0, None, None).unwrap();
        let samples = two_samples();
        let mut stored = HashMap::new();
        stored.insert(samples[0].timestamp, 4.0);

        let results = recalculate_samples(&f, &samples, &stored);

        assert_eq!(results[0].discharge, 5.0);
        assert_eq!(results[0].old_discharge, Some(4.0));
        assert_eq!(results[0].difference, Some(1.0));
        assert_eq!(results[0].difference_percent, Some(25.0));
        assert_eq!(results[1].old_discharge, None);
        assert_eq!(results[1].difference, None);
    }

    #[test]
    fn test_recalculate_zero_baseline_has_no_percent() {
        let f = Formula::new(FormulaType::Custom, 5.0, None, None).unwrap();
        let samples = two_samples();
        let mut stored = HashMap::new();
        stored.insert(samples[0].timestamp, 0.0);

        let results = recalculate_samples(&f, &samples, &stored);
        assert_eq!(results[0].difference, Some(5.0));
        assert_eq!(results[0].difference_percent, None);
    }

    #[test]
    fn test_dry_run_plans_no_writes() {
        let f = Formula::new(FormulaType::Custom, 5.0, None, None).unwrap();
        let results = recalculate_samples(&f, &two_samples(), &HashMap::new());

        let (rows, errors) = plan_writes(false, "S1", "RC-1", &results);
        assert!(rows.is_empty());
        assert!(errors.is_empty());

        let (rows, errors) = plan_writes(true, "S1", "RC-1", &results);
        assert_eq!(rows.len(), 2);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_persisted_path_rejects_negative_discharge() {
        let f = Formula::new(FormulaType::Polynomial, -3.0, Some(1.0), None).unwrap();
        let results = recalculate_samples(&f, &two_samples(), &HashMap::new());
        // H=1 gives -2 (reported in the results, refused on write); H=2 gives -1.
        assert_eq!(results[0].discharge, -2.0);

        let (rows, errors) = plan_writes(true, "S1", "RC-1", &results);
        assert!(rows.is_empty());
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_round_recalculated() {
        let r = round_recalculated(RecalculatedSample {
            timestamp: ts("2024-03-01T00:00:00Z"),
            water_level: 1.000_04,
            discharge: 3.141_592,
            old_discharge: Some(3.0),
            difference: Some(0.141_592),
            difference_percent: Some(4.719_733),
        });
        assert_eq!(r.discharge, 3.1416);
        assert_eq!(r.difference, Some(0.1416));
        assert_eq!(r.difference_percent, Some(4.72));
    }
}
