use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureRange {
    #[serde(rename = "minValue")]
    pub min_value: f64,
    #[serde(rename = "maxValue")]
    pub max_value: f64,
    #[serde(rename = "minStep")]
    pub min_step: f64,
}

/// What the unit accepts while in auto mode.
pub const UNIT_AUTO_TEMPERATURE_RANGE: TemperatureRange = TemperatureRange {
    min_value: 18.0,
    max_value: 30.0,
    min_step: 1.0,
};

pub const UNIT_HEATING_TEMPERATURE_RANGE: TemperatureRange = TemperatureRange {
    min_value: 10.0,
    max_value: 30.0,
    min_step: 1.0,
};

pub const UNIT_COOLING_TEMPERATURE_RANGE: TemperatureRange = TemperatureRange {
    min_value: 18.0,
    max_value: 32.0,
    min_step: 1.0,
};

/// Virtual range for user-facing targets and thresholds; finer than the unit.
pub const TARGET_TEMPERATURE_RANGE: TemperatureRange = TemperatureRange {
    min_value: 16.0,
    max_value: 30.0,
    min_step: 0.5,
};

pub fn clamp_temperature(value: f64, range: &TemperatureRange) -> f64 {
    if value <= range.min_value {
        range.min_value
    } else if value >= range.max_value {
        range.max_value
    } else if range.min_step >= 1.0 {
        value.round()
    } else {
        value
    }
}

pub fn fahrenheit_to_celsius(value: f64) -> f64 {
    (value - 32.0) / 1.8
}

pub fn celsius_to_fahrenheit(value: f64) -> f64 {
    (value * 1.8 + 32.0).round()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_to_range_bounds() {
        assert_eq!(clamp_temperature(5.0, &UNIT_HEATING_TEMPERATURE_RANGE), 10.0);
        assert_eq!(clamp_temperature(10.0, &UNIT_HEATING_TEMPERATURE_RANGE), 10.0);
        assert_eq!(clamp_temperature(35.0, &UNIT_COOLING_TEMPERATURE_RANGE), 32.0);
    }

    #[test]
    fn rounds_only_for_whole_degree_ranges() {
        assert_eq!(clamp_temperature(21.4, &UNIT_AUTO_TEMPERATURE_RANGE), 21.0);
        assert_eq!(clamp_temperature(21.5, &UNIT_AUTO_TEMPERATURE_RANGE), 22.0);
        assert_eq!(clamp_temperature(21.4, &TARGET_TEMPERATURE_RANGE), 21.4);
    }

    #[test]
    fn clamping_is_idempotent() {
        let ranges = [
            UNIT_AUTO_TEMPERATURE_RANGE,
            UNIT_HEATING_TEMPERATURE_RANGE,
            UNIT_COOLING_TEMPERATURE_RANGE,
            TARGET_TEMPERATURE_RANGE,
        ];

        for range in &ranges {
            for value in [-10.0, 9.9, 17.25, 18.5, 21.7, 29.5, 31.0, 40.0] {
                let once = clamp_temperature(value, range);
                assert_eq!(clamp_temperature(once, range), once);
            }
        }
    }

    #[test]
    fn converts_between_scales() {
        assert_eq!(celsius_to_fahrenheit(21.0), 70.0);
        assert_eq!(celsius_to_fahrenheit(22.0), 72.0);
        assert!((fahrenheit_to_celsius(70.0) - 21.111).abs() < 0.001);
        assert!((fahrenheit_to_celsius(212.0) - 100.0).abs() < 1e-9);
    }
}
