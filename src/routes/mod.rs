pub mod discharges;
pub mod health;
pub mod rating_curves;
pub mod thresholds;
pub mod worker;
