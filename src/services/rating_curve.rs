//! Rating-curve engine: stage → discharge formulas and curve validity over time.
//!
//! A sensor accumulates calibrations; each is valid from its `effective_date`
//! until the next newer calibration takes over. [`CurveTimeline`] keeps a
//! sensor's curves sorted so the active one for a date is a binary search.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::db::{models, queries};
use crate::errors::AppError;
use crate::helpers::{
    dec_to_f64, opt_dec_to_f64, round4, round_to, COEFFICIENT_DP, COEFFICIENT_LIMIT,
};

/// Unit of every computed discharge.
pub const DISCHARGE_UNIT: &str = "m³/s";

// ---------------------------------------------------------------------------
// Formula families
// ---------------------------------------------------------------------------

/// Closed set of supported formula families.
///
/// The legacy `tipe-01`/`tipe-02`/`tipe-03` names are accepted on input and
/// map to `power`, `weir` and `power_shifted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FormulaType {
    /// Q = c · max(0, H − a)^b
    #[serde(alias = "tipe-01")]
    Power,
    /// Q = a + b·H + c·H²
    Polynomial,
    /// Q = a · e^(b·H)
    Exponential,
    /// Q = a · H
    Custom,
    /// Q = c · b · max(0, H)^1.5
    #[serde(alias = "tipe-02")]
    Weir,
    /// Q = c · max(0, H + a)^b
    #[serde(alias = "tipe-03")]
    PowerShifted,
}

impl FormulaType {
    pub fn as_str(self) -> &'static str {
        match self {
            FormulaType::Power => "power",
            FormulaType::Polynomial => "polynomial",
            FormulaType::Exponential => "exponential",
            FormulaType::Custom => "custom",
            FormulaType::Weir => "weir",
            FormulaType::PowerShifted => "power_shifted",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FormulaType::Power => "Power",
            FormulaType::Polynomial => "Polynomial",
            FormulaType::Exponential => "Exponential",
            FormulaType::Custom => "Linear",
            FormulaType::Weir => "Weir",
            FormulaType::PowerShifted => "Shifted power",
        }
    }

    /// Generic expression with symbolic coefficients.
    pub fn expression(self) -> &'static str {
        match self {
            FormulaType::Power => "Q = c × (H - a)^b",
            FormulaType::Polynomial => "Q = a + b·H + c·H²",
            FormulaType::Exponential => "Q = a × e^(b·H)",
            FormulaType::Custom => "Q = a × H",
            FormulaType::Weir => "Q = c × b × H^1.5",
            FormulaType::PowerShifted => "Q = c × (H + a)^b",
        }
    }

    /// Coefficients that take part in the formula.
    fn coefficients(self) -> &'static [&'static str] {
        match self {
            FormulaType::Power | FormulaType::Polynomial | FormulaType::PowerShifted => {
                &["a", "b", "c"]
            }
            FormulaType::Exponential => &["a", "b"],
            FormulaType::Custom => &["a"],
            FormulaType::Weir => &["b", "c"],
        }
    }
}

impl fmt::Display for FormulaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormulaType {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "power" | "tipe-01" => Ok(FormulaType::Power),
            "polynomial" => Ok(FormulaType::Polynomial),
            "exponential" => Ok(FormulaType::Exponential),
            "custom" => Ok(FormulaType::Custom),
            "weir" | "tipe-02" => Ok(FormulaType::Weir),
            "power_shifted" | "tipe-03" => Ok(FormulaType::PowerShifted),
            _ => Err(FormulaError::UnknownType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("unknown formula type '{0}'")]
    UnknownType(String),

    #[error("{formula} formula requires coefficient '{coefficient}'")]
    MissingCoefficient {
        formula: &'static str,
        coefficient: &'static str,
    },

    #[error("coefficient '{coefficient}' must be a finite number")]
    NonFinite { coefficient: &'static str },

    #[error("coefficient '{coefficient}' must be smaller than 1e9 in magnitude")]
    OutOfRange { coefficient: &'static str },

    #[error("{formula} formula requires exponent b > 0")]
    NonPositiveExponent { formula: &'static str },
}

// ---------------------------------------------------------------------------
// Formula
// ---------------------------------------------------------------------------

/// A formula family with its coefficients.
///
/// Fields are public so stored curves load as-is; [`Formula::new`] is the
/// validating constructor used on the write path and yields coefficients at
/// storage precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Formula {
    pub kind: FormulaType,
    pub a: f64,
    pub b: Option<f64>,
    pub c: Option<f64>,
}

/// One coefficient as it takes part in the formula (defaults applied).
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FormulaParameter {
    pub name: String,
    pub value: f64,
}

/// Human-readable description of a curve's formula.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FormulaDescription {
    pub formula_type: FormulaType,
    pub label: String,
    /// Symbolic form, e.g. `Q = c × (H - a)^b`
    pub expression: String,
    /// Form with coefficients substituted, e.g. `Q = 10 × (H - 0.2)^1.5`
    pub display: String,
    pub parameters: Vec<FormulaParameter>,
}

impl Formula {
    pub fn new(
        kind: FormulaType,
        a: f64,
        b: Option<f64>,
        c: Option<f64>,
    ) -> Result<Self, FormulaError> {
        let a = storable("a", a)?;
        let b = b.map(|v| storable("b", v)).transpose()?;
        let c = c.map(|v| storable("c", v)).transpose()?;

        if matches!(
            kind,
            FormulaType::Power | FormulaType::Weir | FormulaType::PowerShifted
        ) && c.is_none()
        {
            return Err(FormulaError::MissingCoefficient {
                formula: kind.as_str(),
                coefficient: "c",
            });
        }

        if matches!(kind, FormulaType::Power | FormulaType::PowerShifted)
            && b.is_some_and(|b| b <= 0.0)
        {
            return Err(FormulaError::NonPositiveExponent {
                formula: kind.as_str(),
            });
        }

        Ok(Self { kind, a, b, c })
    }

    /// Discharge (m³/s) for water level `h` (m). Unrounded.
    ///
    /// Shifted stages are clamped at zero, so a level below the curve's
    /// offset yields exactly 0.
    pub fn discharge(&self, h: f64) -> f64 {
        let a = self.a;
        let c = self.c.unwrap_or(0.0);
        match self.kind {
            FormulaType::Power => c * (h - a).max(0.0).powf(self.b.unwrap_or(1.0)),
            FormulaType::Polynomial => a + self.b.unwrap_or(0.0) * h + c * h * h,
            FormulaType::Exponential => a * (self.b.unwrap_or(1.0) * h).exp(),
            FormulaType::Custom => a * h,
            FormulaType::Weir => c * self.b.unwrap_or(1.0) * h.max(0.0).powf(1.5),
            FormulaType::PowerShifted => c * (h + a).max(0.0).powf(self.b.unwrap_or(1.0)),
        }
    }

    /// Formula with coefficients substituted.
    pub fn display(&self) -> String {
        let a = self.a;
        let b = self.b.unwrap_or(1.0);
        let c = self.c.unwrap_or(0.0);
        match self.kind {
            FormulaType::Power => format!("Q = {} × {}^{}", c, shifted_stage(-a), b),
            FormulaType::Polynomial => format!(
                "Q = {} + {}·H + {}·H²",
                a,
                self.b.unwrap_or(0.0),
                c
            ),
            FormulaType::Exponential => format!("Q = {} × e^({}·H)", a, b),
            FormulaType::Custom => format!("Q = {} × H", a),
            FormulaType::Weir => format!("Q = {} × {} × H^1.5", c, b),
            FormulaType::PowerShifted => format!("Q = {} × {}^{}", c, shifted_stage(a), b),
        }
    }

    pub fn describe(&self) -> FormulaDescription {
        let parameters = self
            .kind
            .coefficients()
            .iter()
            .map(|&name| FormulaParameter {
                name: name.to_string(),
                value: self.effective_coefficient(name),
            })
            .collect();

        FormulaDescription {
            formula_type: self.kind,
            label: self.kind.label().to_string(),
            expression: self.kind.expression().to_string(),
            display: self.display(),
            parameters,
        }
    }

    fn effective_coefficient(&self, name: &str) -> f64 {
        match (name, self.kind) {
            ("a", _) => self.a,
            ("b", FormulaType::Polynomial) => self.b.unwrap_or(0.0),
            ("b", _) => self.b.unwrap_or(1.0),
            _ => self.c.unwrap_or(0.0),
        }
    }
}

/// A coefficient as it will be stored: finite, within the column's range,
/// rounded to 6 decimal places. Checks on the formula run on this value.
fn storable(name: &'static str, v: f64) -> Result<f64, FormulaError> {
    if !v.is_finite() {
        return Err(FormulaError::NonFinite { coefficient: name });
    }
    let rounded = round_to(v, COEFFICIENT_DP as i32);
    if rounded.abs() >= COEFFICIENT_LIMIT {
        return Err(FormulaError::OutOfRange { coefficient: name });
    }
    Ok(rounded)
}

/// `(H + offset)` with the sign folded into the operator.
fn shifted_stage(offset: f64) -> String {
    if offset == 0.0 {
        "H".to_string()
    } else if offset < 0.0 {
        format!("(H - {})", -offset)
    } else {
        format!("(H + {})", offset)
    }
}

/// Discharge for an operator-supplied water level, rounded for display.
pub fn calculate_for_display(formula: &Formula, water_level: f64) -> Result<f64, AppError> {
    if !water_level.is_finite() || water_level < 0.0 {
        return Err(AppError::Validation(format!(
            "water_level must be a finite number >= 0, got {}",
            water_level
        )));
    }
    Ok(round4(formula.discharge(water_level)))
}

// ---------------------------------------------------------------------------
// Curves and timelines
// ---------------------------------------------------------------------------

/// A rating curve ready for computation.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub id: i64,
    pub code: String,
    pub sensor_code: String,
    pub formula: Formula,
    pub effective_date: NaiveDate,
}

impl TryFrom<models::RatingCurve> for Curve {
    type Error = AppError;

    fn try_from(row: models::RatingCurve) -> Result<Self, Self::Error> {
        let kind = row.formula_type.parse::<FormulaType>().map_err(|e| {
            AppError::InternalError(format!("Rating curve {} is unusable: {}", row.code, e))
        })?;

        Ok(Self {
            id: row.id,
            formula: Formula {
                kind,
                a: dec_to_f64(row.a),
                b: opt_dec_to_f64(row.b),
                c: opt_dec_to_f64(row.c),
            },
            code: row.code,
            sensor_code: row.sensor_code,
            effective_date: row.effective_date,
        })
    }
}

/// A sensor's curves, sorted ascending by `(effective_date, id)`.
#[derive(Debug, Clone, Default)]
pub struct CurveTimeline {
    curves: Vec<Curve>,
}

/// The validity window of one curve within a timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CurvePeriod<'a> {
    pub curve: &'a Curve,
    pub effective_from: NaiveDate,
    /// Last day of validity; `None` while the curve is still in force.
    pub effective_to: Option<NaiveDate>,
    pub is_current: bool,
    /// Superseded on its first day by a newer curve with the same date.
    pub shadowed: bool,
}

impl CurveTimeline {
    pub fn new(mut curves: Vec<Curve>) -> Self {
        curves.sort_by_key(|c| (c.effective_date, c.id));
        Self { curves }
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    /// Curve in force on `date`: the latest `effective_date <= date`,
    /// highest id on ties.
    pub fn active_at(&self, date: NaiveDate) -> Option<&Curve> {
        let idx = self.curves.partition_point(|c| c.effective_date <= date);
        idx.checked_sub(1).map(|i| &self.curves[i])
    }

    /// Validity periods, newest first.
    pub fn history(&self) -> Vec<CurvePeriod<'_>> {
        let mut periods: Vec<CurvePeriod<'_>> = self
            .curves
            .iter()
            .enumerate()
            .map(|(i, curve)| {
                let next = self.curves.get(i + 1);
                let shadowed = next.is_some_and(|n| n.effective_date == curve.effective_date);
                let effective_to = next.map(|n| {
                    n.effective_date
                        .pred_opt()
                        .unwrap_or(n.effective_date)
                });
                CurvePeriod {
                    curve,
                    effective_from: curve.effective_date,
                    effective_to,
                    is_current: next.is_none(),
                    shadowed,
                }
            })
            .collect();
        periods.reverse();
        periods
    }
}

/// Load every curve of a sensor into a timeline.
pub async fn load_timeline(pool: &PgPool, sensor_code: &str) -> Result<CurveTimeline, AppError> {
    let rows = queries::get_rating_curves_for_sensor(pool, sensor_code).await?;
    let curves = rows
        .into_iter()
        .map(Curve::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CurveTimeline::new(curves))
}

/// Curve in force for a sensor on `date`, if any.
pub async fn get_active_for_sensor(
    pool: &PgPool,
    sensor_code: &str,
    date: NaiveDate,
) -> Result<Option<Curve>, AppError> {
    let timeline = load_timeline(pool, sensor_code).await?;
    Ok(timeline.active_at(date).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::{f64_to_decimal_coeff, opt_f64_to_decimal_coeff};

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn power(a: f64, b: f64, c: f64) -> Formula {
        Formula::new(FormulaType::Power, a, Some(b), Some(c)).unwrap()
    }

    fn curve(id: i64, code: &str, effective: &str) -> Curve {
        Curve {
            id,
            code: code.to_string(),
            sensor_code: "S1".to_string(),
            formula: power(0.2, 1.5, 10.0),
            effective_date: date(effective),
        }
    }

    #[test]
    fn test_power_example() {
        let f = power(0.2, 1.5, 10.0);
        assert_eq!(f.discharge(0.2), 0.0);
        assert!((f.discharge(1.2) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_power_clamps_below_offset() {
        let f = power(0.5, 1.7, 12.0);
        for h in [-3.0, -0.1, 0.0, 0.25, 0.4999] {
            let q = f.discharge(h);
            assert_eq!(q, 0.0, "H={}", h);
        }
    }

    #[test]
    fn test_power_b_defaults_to_one() {
        let f = Formula::new(FormulaType::Power, 1.0, None, Some(4.0)).unwrap();
        assert!((f.discharge(3.0) - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_polynomial_defaults() {
        let f = Formula::new(FormulaType::Polynomial, 2.0, None, None).unwrap();
        assert_eq!(f.discharge(5.0), 2.0);

        let f = Formula::new(FormulaType::Polynomial, 1.0, Some(2.0), Some(3.0)).unwrap();
        assert!((f.discharge(2.0) - 17.0).abs() < 1e-12);
    }

    #[test]
    fn test_exponential() {
        let f = Formula::new(FormulaType::Exponential, 2.0, Some(0.5), None).unwrap();
        assert!((f.discharge(2.0) - 2.0 * std::f64::consts::E).abs() < 1e-12);
    }

    #[test]
    fn test_custom_is_linear() {
        let f = Formula::new(FormulaType::Custom, 3.5, None, None).unwrap();
        assert!((f.discharge(2.0) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_weir() {
        let f = Formula::new(FormulaType::Weir, 0.0, Some(2.0), Some(1.5)).unwrap();
        assert!((f.discharge(4.0) - 24.0).abs() < 1e-12);
        assert_eq!(f.discharge(-1.0), 0.0);
    }

    #[test]
    fn test_power_shifted() {
        let f = Formula::new(FormulaType::PowerShifted, 0.5, Some(2.0), Some(3.0)).unwrap();
        assert!((f.discharge(1.5) - 12.0).abs() < 1e-12);
        assert_eq!(f.discharge(-0.75), 0.0);
    }

    #[test]
    fn test_discharge_is_pure() {
        let f = power(0.3, 1.6, 8.2);
        let first = f.discharge(2.75);
        for _ in 0..10 {
            assert_eq!(f.discharge(2.75), first);
        }
    }

    #[test]
    fn test_new_requires_c_for_power_family() {
        for kind in [FormulaType::Power, FormulaType::Weir, FormulaType::PowerShifted] {
            let err = Formula::new(kind, 0.1, Some(1.5), None).unwrap_err();
            assert_eq!(
                err,
                FormulaError::MissingCoefficient {
                    formula: kind.as_str(),
                    coefficient: "c"
                }
            );
        }
    }

    #[test]
    fn test_new_rejects_non_finite() {
        let err = Formula::new(FormulaType::Custom, f64::NAN, None, None).unwrap_err();
        assert_eq!(err, FormulaError::NonFinite { coefficient: "a" });

        let err =
            Formula::new(FormulaType::Power, 0.1, Some(f64::INFINITY), Some(1.0)).unwrap_err();
        assert_eq!(err, FormulaError::NonFinite { coefficient: "b" });
    }

    #[test]
    fn test_new_rejects_exponent_that_rounds_to_zero() {
        let err = Formula::new(FormulaType::Power, 0.2, Some(1e-7), Some(10.0)).unwrap_err();
        assert_eq!(err, FormulaError::NonPositiveExponent { formula: "power" });
    }

    #[test]
    fn test_new_keeps_clamp_after_storage_round_trip() {
        let f = Formula::new(FormulaType::Power, 0.2, Some(0.000_000_6), Some(10.0)).unwrap();
        assert_eq!(f.b, Some(0.000_001));

        let row = models::RatingCurve {
            id: 1,
            code: "RC-1".to_string(),
            sensor_code: "S1".to_string(),
            formula_type: f.kind.as_str().to_string(),
            a: f64_to_decimal_coeff(f.a),
            b: opt_f64_to_decimal_coeff(f.b),
            c: opt_f64_to_decimal_coeff(f.c),
            effective_date: date("2024-01-01"),
        };
        let stored = Curve::try_from(row).unwrap();
        let stored_b = stored.formula.b.unwrap();
        assert!(stored_b > 0.0 && (stored_b - 0.000_001).abs() < 1e-15);
        assert_eq!(stored.formula.discharge(0.0), 0.0);
    }

    #[test]
    fn test_new_rounds_coefficients_to_storage_precision() {
        let f = Formula::new(FormulaType::Power, 0.123_456_7, Some(1.5), Some(10.0)).unwrap();
        assert_eq!(f.a, 0.123_457);
    }

    #[test]
    fn test_new_rejects_coefficient_beyond_column_range() {
        let err = Formula::new(FormulaType::Custom, 1e9, None, None).unwrap_err();
        assert_eq!(err, FormulaError::OutOfRange { coefficient: "a" });

        let err = Formula::new(FormulaType::Power, 0.0, Some(1.5), Some(-2e12)).unwrap_err();
        assert_eq!(err, FormulaError::OutOfRange { coefficient: "c" });
    }

    #[test]
    fn test_new_rejects_non_positive_exponent() {
        let err = Formula::new(FormulaType::Power, 0.1, Some(0.0), Some(1.0)).unwrap_err();
        assert!(matches!(err, FormulaError::NonPositiveExponent { .. }));
    }

    #[test]
    fn test_formula_type_parses_legacy_aliases() {
        assert_eq!("tipe-01".parse::<FormulaType>().unwrap(), FormulaType::Power);
        assert_eq!("tipe-02".parse::<FormulaType>().unwrap(), FormulaType::Weir);
        assert_eq!(
            "TIPE-03".parse::<FormulaType>().unwrap(),
            FormulaType::PowerShifted
        );
        assert!("logarithmic".parse::<FormulaType>().is_err());
    }

    #[test]
    fn test_formula_type_deserializes_alias() {
        let kind: FormulaType = serde_json::from_str("\"tipe-02\"").unwrap();
        assert_eq!(kind, FormulaType::Weir);
        let kind: FormulaType = serde_json::from_str("\"power_shifted\"").unwrap();
        assert_eq!(kind, FormulaType::PowerShifted);
    }

    #[test]
    fn test_display() {
        assert_eq!(power(0.2, 1.5, 10.0).display(), "Q = 10 × (H - 0.2)^1.5");
        let shifted = Formula::new(FormulaType::PowerShifted, 0.5, Some(2.0), Some(3.0)).unwrap();
        assert_eq!(shifted.display(), "Q = 3 × (H + 0.5)^2");
        let custom = Formula::new(FormulaType::Custom, 3.5, None, None).unwrap();
        assert_eq!(custom.display(), "Q = 3.5 × H");
    }

    #[test]
    fn test_describe_lists_used_coefficients() {
        let exp = Formula::new(FormulaType::Exponential, 2.0, None, None).unwrap();
        let desc = exp.describe();
        let names: Vec<&str> = desc.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(desc.parameters[1].value, 1.0);
        assert_eq!(desc.label, "Exponential");
    }

    #[test]
    fn test_calculate_for_display_rounds() {
        let f = Formula::new(FormulaType::Custom, 1.0, None, None).unwrap();
        assert_eq!(calculate_for_display(&f, 1.234_567).unwrap(), 1.2346);
    }

    #[test]
    fn test_calculate_for_display_rejects_negative_level() {
        let f = power(0.2, 1.5, 10.0);
        assert!(matches!(
            calculate_for_display(&f, -0.1),
            Err(AppError::Validation(_))
        ));
        assert!(calculate_for_display(&f, f64::NAN).is_err());
    }

    #[test]
    fn test_curve_from_row_rejects_unknown_type() {
        let row = models::RatingCurve {
            id: 1,
            code: "RC-1".to_string(),
            sensor_code: "S1".to_string(),
            formula_type: "mystery".to_string(),
            a: rust_decimal::Decimal::ONE,
            b: None,
            c: None,
            effective_date: date("2024-01-01"),
        };
        assert!(matches!(
            Curve::try_from(row),
            Err(AppError::InternalError(_))
        ));
    }

    #[test]
    fn test_active_at_selects_latest_effective() {
        let timeline = CurveTimeline::new(vec![
            curve(2, "B", "2024-06-01"),
            curve(1, "A", "2024-01-01"),
        ]);

        assert!(timeline.active_at(date("2023-12-31")).is_none());
        assert_eq!(timeline.active_at(date("2024-01-01")).unwrap().code, "A");
        assert_eq!(timeline.active_at(date("2024-05-31")).unwrap().code, "A");
        assert_eq!(timeline.active_at(date("2024-06-01")).unwrap().code, "B");
        assert_eq!(timeline.active_at(date("2030-01-01")).unwrap().code, "B");
    }

    #[test]
    fn test_active_at_tie_prefers_highest_id() {
        let timeline = CurveTimeline::new(vec![
            curve(9, "LATER", "2024-01-01"),
            curve(3, "EARLIER", "2024-01-01"),
        ]);
        assert_eq!(timeline.active_at(date("2024-02-01")).unwrap().code, "LATER");
    }

    #[test]
    fn test_history_is_contiguous_with_one_current() {
        let timeline = CurveTimeline::new(vec![
            curve(1, "A", "2023-01-01"),
            curve(3, "C", "2024-06-01"),
            curve(2, "B", "2024-01-01"),
        ]);
        let history = timeline.history();

        let codes: Vec<&str> = history.iter().map(|p| p.curve.code.as_str()).collect();
        assert_eq!(codes, vec!["C", "B", "A"]);
        assert_eq!(history.iter().filter(|p| p.is_current).count(), 1);
        assert!(history[0].is_current);
        assert_eq!(history[0].effective_to, None);

        // Oldest-first, each period ends the day before the next begins.
        let ascending: Vec<_> = history.iter().rev().collect();
        assert_eq!(ascending[0].effective_from, date("2023-01-01"));
        for pair in ascending.windows(2) {
            let end = pair[0].effective_to.unwrap();
            assert_eq!(end.succ_opt().unwrap(), pair[1].effective_from);
        }
    }

    #[test]
    fn test_history_marks_shadowed_curve() {
        let timeline = CurveTimeline::new(vec![
            curve(1, "OLD", "2024-01-01"),
            curve(2, "NEW", "2024-01-01"),
        ]);
        let history = timeline.history();
        assert_eq!(history[0].curve.code, "NEW");
        assert!(!history[0].shadowed);
        assert!(history[1].shadowed);
        assert!(history[1].effective_to.unwrap() < history[1].effective_from);
    }

    #[test]
    fn test_empty_timeline() {
        let timeline = CurveTimeline::new(Vec::new());
        assert!(timeline.is_empty());
        assert!(timeline.active_at(date("2024-01-01")).is_none());
        assert!(timeline.history().is_empty());
    }
}
