//! Decides whether pulling in outdoor air would help the room.
//!
//! Starting requires outdoor air to beat the room by a margin (1C, 5%);
//! stopping only happens once it no longer beats it at all. The gap between
//! the two keeps the unit from flapping between fan/dry and off.

use crate::{
    config::EngineConfig,
    types::{AcMode, Measurement, OutdoorObservation, TargetState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionMode {
    Fan,
    Dry,
}

impl IngestionMode {
    pub fn ac_mode(self) -> AcMode {
        match self {
            Self::Fan => AcMode::Fan,
            Self::Dry => AcMode::Dry,
        }
    }

    pub fn from_ac_mode(mode: AcMode) -> Option<Self> {
        match mode {
            AcMode::Fan => Some(Self::Fan),
            AcMode::Dry => Some(Self::Dry),
            AcMode::Heat | AcMode::Cool | AcMode::Auto => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OutdoorAirInput {
    pub room: Measurement,
    pub target: TargetState,
    pub outdoor: OutdoorObservation,
}

#[derive(Debug, Clone, Copy)]
enum Metric {
    Temperature,
    Humidity,
}

/// True when the room is off target by more than `threshold` and the
/// ingested air is better than the room by more than `threshold`, on the
/// same side.
pub fn metric_is_beneficial(room: f64, target: f64, ingested: f64, threshold: f64) -> bool {
    (room - target > threshold && room - ingested > threshold)
        || (target - room > threshold && ingested - room > threshold)
}

#[derive(Debug, Clone, Copy)]
pub struct OutdoorAirBenefit<'a> {
    config: &'a EngineConfig,
}

impl<'a> OutdoorAirBenefit<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    fn is_beneficial(
        &self,
        input: &OutdoorAirInput,
        metric: Metric,
        mode: IngestionMode,
        threshold: f64,
    ) -> bool {
        match metric {
            Metric::Temperature => metric_is_beneficial(
                input.room.temperature,
                input.target.temperature,
                input.outdoor.temperature,
                threshold,
            ),
            Metric::Humidity => {
                let ingested = match mode {
                    IngestionMode::Dry => input.outdoor.humidity * self.config.dry_humidity_factor,
                    IngestionMode::Fan => input.outdoor.humidity,
                };

                metric_is_beneficial(
                    input.room.humidity,
                    input.target.humidity,
                    ingested,
                    threshold,
                )
            }
        }
    }

    pub fn should_start_ingesting(&self, input: &OutdoorAirInput) -> Option<IngestionMode> {
        let config = self.config;

        // The fan can't help if it makes the temperature worse.
        if !self.is_beneficial(
            input,
            Metric::Temperature,
            IngestionMode::Fan,
            config.start_temperature_margin,
        ) {
            return None;
        }

        if self.is_beneficial(
            input,
            Metric::Humidity,
            IngestionMode::Fan,
            config.start_humidity_margin,
        ) {
            return Some(IngestionMode::Fan);
        }

        // Dry mode only dehumidifies, and costs some cooling.
        if input.room.temperature > input.target.temperature
            && self.is_beneficial(
                input,
                Metric::Humidity,
                IngestionMode::Dry,
                config.start_humidity_margin,
            )
        {
            return Some(IngestionMode::Dry);
        }

        None
    }

    pub fn should_stop_ingesting(&self, input: &OutdoorAirInput, mode: IngestionMode) -> bool {
        let margin = self.config.stop_margin;

        !self.is_beneficial(input, Metric::Temperature, mode, margin)
            || !self.is_beneficial(input, Metric::Humidity, mode, margin)
    }

    /// Outdoor conditions under which dry mode may be started for humidity.
    pub fn can_start_dry_mode(&self, outdoor: &OutdoorObservation) -> bool {
        outdoor.humidity <= self.config.dry_start_max_outdoor_humidity
            && outdoor.temperature >= self.config.dry_start_min_outdoor_temperature
    }

    pub fn should_stop_dry_mode(&self, outdoor: &OutdoorObservation) -> bool {
        outdoor.humidity > self.config.dry_stop_max_outdoor_humidity
            || outdoor.temperature < self.config.dry_stop_min_outdoor_temperature
    }
}
