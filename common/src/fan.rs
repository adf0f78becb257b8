use crate::types::FanLevel;

const STRONG_DEVIATION: f64 = 7.0;
const HIGH_DEVIATION: f64 = 4.0;
const MEDIUM_DEVIATION: f64 = 1.0;

/// Fan speed for how far (in degrees) the room is past a threshold.
/// Exact tier boundaries pick the lower tier.
pub fn fan_level_for_temperature_deviation(deviation: f64) -> FanLevel {
    if deviation > STRONG_DEVIATION {
        FanLevel::Strong
    } else if deviation > HIGH_DEVIATION {
        FanLevel::High
    } else if deviation > MEDIUM_DEVIATION {
        FanLevel::Medium
    } else {
        FanLevel::Low
    }
}
