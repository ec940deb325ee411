//! Daily sampling policy for 3-hourly forecast series.
//!
//! The series is cut into consecutive windows of [`SAMPLES_PER_DAY`] and the
//! first sample of each window represents that day. A short trailing window
//! still yields its first element. Values are never averaged.

use crate::model::ForecastSample;

/// 24 hours at 3-hour resolution.
pub const SAMPLES_PER_DAY: usize = 8;

/// Representative sample per day, in input order.
pub fn sample_daily(samples: &[ForecastSample]) -> impl Iterator<Item = &ForecastSample> {
    samples.iter().step_by(SAMPLES_PER_DAY)
}
