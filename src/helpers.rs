//! Shared helpers for Decimal ↔ f64 conversions, display rounding and
//! date-range bounds.
//!
//! Water levels and discharges are stored as NUMERIC with 4 decimal places;
//! all arithmetic happens in f64. Conversions return `Decimal::ZERO` for
//! non-finite inputs (NaN, ±Inf).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::errors::AppError;

/// Decimal places used when storing and displaying water levels and discharges.
pub(crate) const STORAGE_DP: u32 = 4;

/// Round a value for display. Non-finite values pass through unchanged.
pub(crate) fn round_to(v: f64, dp: i32) -> f64 {
    if !v.is_finite() {
        return v;
    }
    let factor = 10f64.powi(dp);
    (v * factor).round() / factor
}

/// Round to 4 decimal places, the display precision for discharge values.
pub(crate) fn round4(v: f64) -> f64 {
    round_to(v, STORAGE_DP as i32)
}

/// Round an optional value to 4 decimal places.
pub(crate) fn opt_round4(v: Option<f64>) -> Option<f64> {
    v.map(round4)
}

/// Convert an f64 to Decimal, rounded to 4 decimal places.
///
/// Used for water levels, discharges and threshold bounds, matching the
/// NUMERIC(_, 4) columns they are written to.
pub(crate) fn f64_to_decimal_4dp(v: f64) -> Decimal {
    if !v.is_finite() {
        tracing::warn!(
            "f64_to_decimal_4dp received non-finite value {}, defaulting to 0",
            v
        );
        return Decimal::ZERO;
    }
    Decimal::from_f64(v)
        .map(|d| d.round_dp_with_strategy(STORAGE_DP, RoundingStrategy::MidpointAwayFromZero))
        .unwrap_or_default()
}

/// Convert an optional f64 to Decimal (4 decimal places).
pub(crate) fn opt_f64_to_decimal_4dp(v: Option<f64>) -> Option<Decimal> {
    v.map(f64_to_decimal_4dp)
}

/// Decimal places of rating-curve coefficients (NUMERIC(15, 6)).
pub(crate) const COEFFICIENT_DP: u32 = 6;

/// Exclusive magnitude limit of a NUMERIC(15, 6) coefficient.
pub(crate) const COEFFICIENT_LIMIT: f64 = 1e9;

/// Convert a rating-curve coefficient to Decimal, rounded to 6 decimal places.
pub(crate) fn f64_to_decimal_coeff(v: f64) -> Decimal {
    if !v.is_finite() {
        tracing::warn!(
            "f64_to_decimal_coeff received non-finite value {}, defaulting to 0",
            v
        );
        return Decimal::ZERO;
    }
    Decimal::from_f64(v)
        .map(|d| d.round_dp_with_strategy(COEFFICIENT_DP, RoundingStrategy::MidpointAwayFromZero))
        .unwrap_or_default()
}

/// Convert an optional coefficient to Decimal (6 decimal places).
pub(crate) fn opt_f64_to_decimal_coeff(v: Option<f64>) -> Option<Decimal> {
    v.map(f64_to_decimal_coeff)
}

/// Convert a Decimal to f64, defaulting to 0.0 for values that can't be represented.
pub(crate) fn dec_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

/// Convert an Option<Decimal> to Option<f64>.
pub(crate) fn opt_dec_to_f64(d: Option<Decimal>) -> Option<f64> {
    d.and_then(|v| v.to_f64())
}

/// Half-open UTC instant range `[start 00:00, end + 1 day 00:00)` covering
/// the inclusive day range `start..=end`. Either side may be open.
pub(crate) fn day_bounds(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), AppError> {
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(AppError::Validation(format!(
                "start_date ({}) must not be after end_date ({})",
                s, e
            )));
        }
    }

    let lower = start.map(|d| d.and_time(NaiveTime::MIN).and_utc());
    let upper = match end {
        Some(d) => Some(
            d.succ_opt()
                .ok_or_else(|| AppError::BadRequest(format!("end_date {} is out of range", d)))?
                .and_time(NaiveTime::MIN)
                .and_utc(),
        ),
        None => None,
    };
    Ok((lower, upper))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_round4() {
        assert_eq!(round4(1.234_56), 1.2346);
        assert_eq!(round4(10.0), 10.0);
        assert_eq!(round4(-0.000_04), -0.0);
    }

    #[test]
    fn test_round_to_passes_nan_through() {
        assert!(round_to(f64::NAN, 2).is_nan());
        assert_eq!(round_to(f64::INFINITY, 2), f64::INFINITY);
    }

    #[test]
    fn test_f64_to_decimal_4dp_rounds() {
        assert_eq!(
            f64_to_decimal_4dp(3.141_59),
            Decimal::from_str("3.1416").unwrap()
        );
    }

    #[test]
    fn test_f64_to_decimal_4dp_nan() {
        assert_eq!(f64_to_decimal_4dp(f64::NAN), Decimal::ZERO);
    }

    #[test]
    fn test_f64_to_decimal_4dp_infinity() {
        assert_eq!(f64_to_decimal_4dp(f64::INFINITY), Decimal::ZERO);
    }

    #[test]
    fn test_opt_f64_to_decimal_4dp() {
        assert_eq!(opt_f64_to_decimal_4dp(None), None);
        assert_eq!(
            opt_f64_to_decimal_4dp(Some(2.5)),
            Some(Decimal::from_str("2.5").unwrap())
        );
    }

    #[test]
    fn test_f64_to_decimal_coeff_rounds_to_six_places() {
        assert_eq!(
            f64_to_decimal_coeff(0.123_456_7),
            Decimal::from_str("0.123457").unwrap()
        );
        assert_eq!(f64_to_decimal_coeff(1e-7), Decimal::ZERO);
    }

    #[test]
    fn test_f64_to_decimal_coeff_neg_infinity() {
        assert_eq!(f64_to_decimal_coeff(f64::NEG_INFINITY), Decimal::ZERO);
    }

    #[test]
    fn test_dec_to_f64_normal() {
        let d = Decimal::from_str("3.14").unwrap();
        assert!((dec_to_f64(d) - 3.14).abs() < 1e-10);
    }

    #[test]
    fn test_day_bounds_inclusive_end() {
        let start: NaiveDate = "2024-03-01".parse().unwrap();
        let end: NaiveDate = "2024-03-02".parse().unwrap();
        let (lower, upper) = day_bounds(Some(start), Some(end)).unwrap();
        assert_eq!(
            lower,
            Some("2024-03-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap())
        );
        assert_eq!(
            upper,
            Some("2024-03-03T00:00:00Z".parse::<DateTime<Utc>>().unwrap())
        );
    }

    #[test]
    fn test_day_bounds_single_day_and_open() {
        let day: NaiveDate = "2024-03-01".parse().unwrap();
        assert!(day_bounds(Some(day), Some(day)).is_ok());
        assert_eq!(day_bounds(None, None).unwrap(), (None, None));
    }

    #[test]
    fn test_day_bounds_rejects_reversed_range() {
        let start: NaiveDate = "2024-03-02".parse().unwrap();
        let end: NaiveDate = "2024-03-01".parse().unwrap();
        assert!(matches!(
            day_bounds(Some(start), Some(end)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_opt_dec_to_f64() {
        assert_eq!(opt_dec_to_f64(None), None);
        let d = Decimal::from_str("1.5").unwrap();
        assert_eq!(opt_dec_to_f64(Some(d)), Some(1.5));
    }
}
