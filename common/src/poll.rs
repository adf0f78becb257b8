use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::config::ControllerConfig;

const MINUTE_MS: i64 = 60_000;
const HALF_HOUR_MS: i64 = 30 * MINUTE_MS;

/// Delay before polling the unit again, aimed just after the vendor takes
/// its next measurement.
pub fn next_measurement_poll(config: &ControllerConfig, age_secs: Option<f64>) -> Duration {
    let minimum = Duration::from_millis(config.min_poll_interval_ms);
    let interval_secs = config.measurement_interval_ms as f64 / 1000.0;

    let Some(age) = age_secs else {
        return minimum;
    };

    if !age.is_finite() || age < 0.0 || age > interval_secs {
        warn!("Unexpected measurement age: {age}");
        return minimum;
    }

    Duration::from_secs_f64(interval_secs - age % interval_secs + 1.0)
}

/// Delay before fetching the next outdoor observation. Observations are
/// published on the half hour; wait 4-6 minutes past it, spread by
/// `jitter` (0..1) so many controllers don't hit the feed together.
pub fn next_observation_poll(now: DateTime<Utc>, jitter: f64) -> Duration {
    let epoch_ms = now.timestamp_millis();
    let until_half_hour = (HALF_HOUR_MS - epoch_ms.rem_euclid(HALF_HOUR_MS)) % HALF_HOUR_MS;

    let jitter = if jitter.is_finite() {
        jitter.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let delay_ms =
        (until_half_hour + 4 * MINUTE_MS) as f64 + 2.0 * jitter * MINUTE_MS as f64;

    Duration::from_millis(delay_ms.ceil() as u64)
}
