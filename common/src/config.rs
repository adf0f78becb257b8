use serde::{Deserialize, Serialize};

use crate::{
    temperature::{clamp_temperature, TARGET_TEMPERATURE_RANGE},
    thresholds::{ThresholdError, Thresholds},
};

/// Tunables for the auto controller and outdoor-air evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub humidity_midpoint: f64,
    pub maximum_normal_humidity: f64,
    pub drying_humidity_threshold: f64,
    pub start_temperature_margin: f64,
    pub start_humidity_margin: f64,
    pub stop_margin: f64,
    /// Share of outdoor humidity left after passing through dry mode.
    pub dry_humidity_factor: f64,
    pub dry_start_max_outdoor_humidity: f64,
    pub dry_start_min_outdoor_temperature: f64,
    pub dry_stop_max_outdoor_humidity: f64,
    pub dry_stop_min_outdoor_temperature: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            humidity_midpoint: 40.0,
            maximum_normal_humidity: 50.0,
            drying_humidity_threshold: 60.0,
            start_temperature_margin: 1.0,
            start_humidity_margin: 5.0,
            stop_margin: 0.0,
            dry_humidity_factor: 0.5,
            dry_start_max_outdoor_humidity: 85.0,
            dry_start_min_outdoor_temperature: 15.0,
            dry_stop_max_outdoor_humidity: 95.0,
            dry_stop_min_outdoor_temperature: 10.0,
        }
    }
}

impl EngineConfig {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();

        self.humidity_midpoint = self.humidity_midpoint.clamp(0.0, 100.0);
        self.maximum_normal_humidity = self
            .maximum_normal_humidity
            .clamp(self.humidity_midpoint, 100.0);
        self.drying_humidity_threshold = self
            .drying_humidity_threshold
            .clamp(self.maximum_normal_humidity, 100.0);

        // Stopping must never be harder than starting.
        self.stop_margin = self.stop_margin.max(0.0);
        self.start_temperature_margin = self.start_temperature_margin.max(self.stop_margin);
        self.start_humidity_margin = self.start_humidity_margin.max(self.stop_margin);

        if !(0.0..=1.0).contains(&self.dry_humidity_factor) {
            self.dry_humidity_factor = defaults.dry_humidity_factor;
        }

        self.dry_stop_max_outdoor_humidity = self
            .dry_stop_max_outdoor_humidity
            .max(self.dry_start_max_outdoor_humidity);
        self.dry_stop_min_outdoor_temperature = self
            .dry_stop_min_outdoor_temperature
            .min(self.dry_start_min_outdoor_temperature);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub min_poll_interval_ms: u64,
    pub measurement_interval_ms: u64,
    pub threshold_debounce_ms: u64,
    pub outdoor_stale_timeout_ms: u64,
    pub state_publish_interval_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            min_poll_interval_ms: 30_000,
            measurement_interval_ms: 90_000,
            threshold_debounce_ms: 500,
            outdoor_stale_timeout_ms: 3_600_000,
            state_publish_interval_ms: 10_000,
        }
    }
}

impl ControllerConfig {
    pub fn sanitize(&mut self) {
        self.min_poll_interval_ms = self.min_poll_interval_ms.max(1_000);
        self.measurement_interval_ms = self.measurement_interval_ms.max(self.min_poll_interval_ms);
        self.threshold_debounce_ms = self.threshold_debounce_ms.clamp(50, 5_000);
        self.state_publish_interval_ms = self.state_publish_interval_ms.max(1_000);
    }
}

/// User preferences for one unit, persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserState {
    #[serde(rename = "autoMode", default)]
    pub auto_mode: bool,
    #[serde(rename = "heatingThresholdTemperature", default)]
    pub heating_threshold_temperature: Option<f64>,
    #[serde(rename = "coolingThresholdTemperature", default)]
    pub cooling_threshold_temperature: Option<f64>,
    #[serde(rename = "targetTemperature", default)]
    pub target_temperature: Option<f64>,
}

impl Default for UserState {
    fn default() -> Self {
        Self {
            auto_mode: false,
            heating_threshold_temperature: Some(19.0),
            cooling_threshold_temperature: Some(23.0),
            target_temperature: None,
        }
    }
}

/// Partial edit of a [`UserState`]; absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStateUpdate {
    #[serde(rename = "autoMode", default)]
    pub auto_mode: Option<bool>,
    #[serde(rename = "heatingThresholdTemperature", default)]
    pub heating_threshold_temperature: Option<f64>,
    #[serde(rename = "coolingThresholdTemperature", default)]
    pub cooling_threshold_temperature: Option<f64>,
    #[serde(rename = "targetTemperature", default)]
    pub target_temperature: Option<f64>,
}

impl UserState {
    /// Field-wise equality where two NaN temperatures count as equal.
    pub fn is_equivalent(&self, other: &UserState) -> bool {
        fn same(left: Option<f64>, right: Option<f64>) -> bool {
            match (left, right) {
                (Some(l), Some(r)) if l.is_nan() && r.is_nan() => true,
                (l, r) => l == r,
            }
        }

        self.auto_mode == other.auto_mode
            && same(
                self.heating_threshold_temperature,
                other.heating_threshold_temperature,
            )
            && same(
                self.cooling_threshold_temperature,
                other.cooling_threshold_temperature,
            )
            && same(self.target_temperature, other.target_temperature)
    }

    pub fn merged(&self, update: &UserStateUpdate) -> UserState {
        let mut next = self.clone();
        if let Some(auto_mode) = update.auto_mode {
            next.auto_mode = auto_mode;
        }
        if update.heating_threshold_temperature.is_some() {
            next.heating_threshold_temperature = update.heating_threshold_temperature;
        }
        if update.cooling_threshold_temperature.is_some() {
            next.cooling_threshold_temperature = update.cooling_threshold_temperature;
        }
        if update.target_temperature.is_some() {
            next.target_temperature = update.target_temperature;
        }
        next.sanitize();
        next
    }

    pub fn sanitize(&mut self) {
        let clamp = |value: Option<f64>| {
            value
                .filter(|v| v.is_finite())
                .map(|v| clamp_temperature(v, &TARGET_TEMPERATURE_RANGE))
        };

        self.heating_threshold_temperature = clamp(self.heating_threshold_temperature);
        self.cooling_threshold_temperature = clamp(self.cooling_threshold_temperature);
        self.target_temperature = clamp(self.target_temperature);
    }

    pub fn thresholds(&self) -> Result<Thresholds, ThresholdError> {
        let heating = self
            .heating_threshold_temperature
            .ok_or(ThresholdError::Missing { name: "heating" })?;
        let cooling = self
            .cooling_threshold_temperature
            .ok_or(ThresholdError::Missing { name: "cooling" })?;

        Thresholds::new(heating, cooling)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub unit_id: String,
    pub http_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "192.168.1.100".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            unit_id: "living-room".to_string(),
            http_port: 8080,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub user: UserState,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.engine.sanitize();
        self.controller.sanitize();
        self.user.sanitize();
    }
}
