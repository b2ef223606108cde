use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Which water-level series a discharge is derived from.
///
/// Actual readings live in `data_actuals` and produce `calculated_discharges`;
/// forecast readings live in `data_predictions` and produce
/// `predicted_calculated_discharges`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Actual,
    Predicted,
}

impl SeriesKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SeriesKind::Actual => "actual",
            SeriesKind::Predicted => "predicted",
        }
    }

    /// Table holding computed discharges for this series.
    pub(crate) fn discharge_table(self) -> &'static str {
        match self {
            SeriesKind::Actual => "calculated_discharges",
            SeriesKind::Predicted => "predicted_calculated_discharges",
        }
    }

    /// Timestamp column of the discharge table (part of its unique key).
    pub(crate) fn discharge_ts_column(self) -> &'static str {
        match self {
            SeriesKind::Actual => "calculated_at",
            SeriesKind::Predicted => "predicted_at",
        }
    }
}

impl std::fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored rating-curve calibration.
#[derive(Debug, Clone, FromRow)]
pub struct RatingCurve {
    pub id: i64,
    pub code: String,
    pub sensor_code: String,
    pub formula_type: String,
    pub a: Decimal,
    pub b: Option<Decimal>,
    pub c: Option<Decimal>,
    pub effective_date: NaiveDate,
}

/// One raw water-level reading (actual or predicted) for a sensor.
#[derive(Debug, Clone, FromRow)]
pub struct WaterLevelSample {
    pub timestamp: DateTime<Utc>,
    pub water_level: Decimal,
}

/// A reading that has no stored discharge yet, across all sensors.
#[derive(Debug, Clone, FromRow)]
pub struct PendingSample {
    pub sensor_code: String,
    pub timestamp: DateTime<Utc>,
    pub water_level: Decimal,
}

/// A sensor's computed discharge. `recorded_at` is `calculated_at` for actual
/// series and `predicted_at` for predicted series.
#[derive(Debug, Clone, FromRow)]
pub struct StoredDischarge {
    pub water_level: Decimal,
    pub discharge: Decimal,
    pub rating_curve_code: String,
    pub recorded_at: DateTime<Utc>,
}

/// Aggregates over a sensor's stored discharges.
#[derive(Debug, Clone, FromRow)]
pub struct DischargeStats {
    pub total: i64,
    pub min_discharge: Option<Decimal>,
    pub max_discharge: Option<Decimal>,
    pub avg_discharge: Option<Decimal>,
}

/// Number of stored discharges referencing a curve code.
#[derive(Debug, Clone, FromRow)]
pub struct CurveUsage {
    pub rating_curve_code: String,
    pub usage_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct ThresholdTemplate {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub parameter_type: String,
    pub unit: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ThresholdLevel {
    pub id: i64,
    pub template_code: String,
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

#[derive(Debug, Clone, FromRow)]
pub struct ThresholdAssignment {
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
