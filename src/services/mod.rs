pub mod discharge;
pub mod forecasting;
pub mod rating_curve;
pub mod recalculation;
pub mod threshold;
pub mod worker;
