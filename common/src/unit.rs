use std::time::Duration;

use tracing::warn;

use crate::{
    config::{ControllerConfig, EngineConfig, UserState, UserStateUpdate},
    controller::{AutoController, AutoModeInput, Decision},
    poll::next_measurement_poll,
    types::{AcState, ControllerStatus, FanLevel, Measurement, OutdoorObservation, VendorAcState},
};

#[derive(Debug, Clone, Copy)]
struct ReceivedObservation {
    observation: OutdoorObservation,
    received_ms: u64,
}

/// Everything known about one unit between polls.
#[derive(Debug, Clone)]
pub struct UnitSession {
    unit_id: String,
    controller: AutoController,
    config: ControllerConfig,

    ac_state: AcState,
    user_state: UserState,
    room_measurement: Option<Measurement>,
    outdoor: Option<ReceivedObservation>,
    yield_ac: bool,
}

impl UnitSession {
    pub fn new(
        unit_id: impl Into<String>,
        engine: EngineConfig,
        mut config: ControllerConfig,
        mut user_state: UserState,
    ) -> Self {
        config.sanitize();
        user_state.sanitize();
        Self {
            unit_id: unit_id.into(),
            controller: AutoController::new(engine),
            config,
            ac_state: AcState::default(),
            user_state,
            room_measurement: None,
            outdoor: None,
            yield_ac: false,
        }
    }

    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    pub fn ac_state(&self) -> &AcState {
        &self.ac_state
    }

    pub fn user_state(&self) -> &UserState {
        &self.user_state
    }

    pub fn room_measurement(&self) -> Option<&Measurement> {
        self.room_measurement.as_ref()
    }

    pub fn is_yielding(&self) -> bool {
        self.yield_ac
    }

    pub fn update_measurement(&mut self, measurement: Measurement) {
        self.room_measurement = Some(measurement);
    }

    pub fn update_outdoor(&mut self, observation: OutdoorObservation, now_ms: u64) {
        self.outdoor = Some(ReceivedObservation {
            observation,
            received_ms: now_ms,
        });
    }

    /// Drops the observation, e.g. after the feed failed.
    pub fn clear_outdoor(&mut self) {
        self.outdoor = None;
    }

    /// The outdoor observation, unless it has gone stale.
    pub fn outdoor_observation(&self, now_ms: u64) -> Option<OutdoorObservation> {
        self.outdoor
            .filter(|received| {
                now_ms.saturating_sub(received.received_ms) < self.config.outdoor_stale_timeout_ms
            })
            .map(|received| received.observation)
    }

    pub fn set_yield(&mut self, yield_ac: bool) -> bool {
        let changed = self.yield_ac != yield_ac;
        self.yield_ac = yield_ac;
        changed
    }

    /// Applies a user edit; returns whether anything actually changed.
    pub fn update_user_state(&mut self, update: &UserStateUpdate) -> bool {
        let next = self.user_state.merged(update);
        if self.user_state.is_equivalent(&next) {
            return false;
        }

        self.user_state = next;
        true
    }

    /// Adopts the state the unit reports, noting anything changed behind our
    /// back.
    pub fn apply_server_state(&mut self, vendor: &VendorAcState) -> Vec<String> {
        let incoming = AcState::from_vendor(vendor);
        let current = &self.ac_state;
        let mut notes = Vec::new();

        if current.on != incoming.on {
            notes.push(if incoming.on {
                "Externally turned on".to_string()
            } else {
                "Externally turned off".to_string()
            });
        }

        if incoming.on && current.target_temperature != incoming.target_temperature {
            notes.push(format!(
                "Target temperature externally changed from {} to {}",
                current.target_temperature, incoming.target_temperature
            ));
        }

        if incoming.on && current.mode != incoming.mode {
            notes.push(format!(
                "Mode externally changed from {} to {}",
                current.mode, incoming.mode
            ));
        }

        if !self.user_state.auto_mode {
            self.user_state.target_temperature = Some(incoming.target_temperature);
        }

        self.ac_state = incoming;
        notes
    }

    /// Works out what to submit next. `next_state` is `None` when the unit
    /// is already where it should be.
    pub fn plan_update(&self, now_ms: u64) -> Decision {
        let decision = if self.user_state.auto_mode {
            match self.auto_decision(now_ms) {
                Some(decision) => decision,
                None => return Decision::default(),
            }
        } else {
            self.manual_decision()
        };

        let already_there = decision
            .next_state
            .as_ref()
            .is_some_and(|state| state.is_equivalent(&self.ac_state));

        if already_there {
            Decision {
                next_state: None,
                ..decision
            }
        } else {
            decision
        }
    }

    fn auto_decision(&self, now_ms: u64) -> Option<Decision> {
        let room_measurement = self.room_measurement?;

        let thresholds = match self.user_state.thresholds() {
            Ok(thresholds) => thresholds,
            Err(err) => {
                warn!("{}: not running auto mode: {err}", self.unit_id);
                return None;
            }
        };

        let input = AutoModeInput {
            room_measurement,
            thresholds,
            bom_observation: self.outdoor_observation(now_ms),
            yield_ac: self.yield_ac,
        };

        Some(
            self.controller
                .calculate_desired_ac_state(&input, &self.ac_state),
        )
    }

    fn manual_decision(&self) -> Decision {
        let mut state = self.ac_state.clone();
        if state.mode.uses_fan_level() {
            state.fan_level = Some(FanLevel::Auto);
        }
        if let Some(target) = self.user_state.target_temperature {
            state.target_temperature = target;
        }

        Decision {
            next_state: Some(state),
            ..Decision::default()
        }
    }

    /// Records a state that has been submitted to the unit.
    pub fn commit(&mut self, state: AcState) {
        self.ac_state = state;
    }

    pub fn next_poll(&self) -> Duration {
        next_measurement_poll(
            &self.config,
            self.room_measurement.and_then(|m| m.seconds_ago),
        )
    }

    pub fn describe_change(&self, state: &AcState) -> String {
        let room_temp = self
            .room_measurement
            .map_or_else(|| "unknown".to_string(), |m| m.temperature.to_string());
        let room_humid = self
            .room_measurement
            .map_or_else(|| "unknown".to_string(), |m| m.humidity.to_string());

        if !state.on {
            format!("Changed AC state (roomTemp: {room_temp}, mode: off)")
        } else if state.fan_level.is_none() {
            format!(
                "Changed AC state (roomTemp: {room_temp}, mode: {}, roomHumid: {room_humid})",
                state.mode
            )
        } else {
            format!(
                "Changed AC state (roomTemp: {room_temp}, mode: {}, targetTemp: {}, speed: {})",
                state.mode,
                state.target_temperature,
                state.fan_level.map_or("N/A", FanLevel::as_str)
            )
        }
    }

    pub fn status(&self, now_ms: u64) -> ControllerStatus {
        let outdoor = self.outdoor_observation(now_ms);

        ControllerStatus {
            unit_id: self.unit_id.clone(),
            ac_state: self.ac_state.clone(),
            mode: self.ac_state.mode_label(),
            auto_mode: self.user_state.auto_mode,
            yield_ac: self.yield_ac,
            heating_threshold_temperature: self.user_state.heating_threshold_temperature,
            cooling_threshold_temperature: self.user_state.cooling_threshold_temperature,
            target_temperature: self.user_state.target_temperature,
            room_temp: self.room_measurement.map(|m| m.temperature),
            room_humidity: self.room_measurement.map(|m| m.humidity),
            outdoor_temp: outdoor.map(|o| o.temperature),
            outdoor_humidity: outdoor.map(|o| o.humidity),
            outdoor_valid: outdoor.is_some(),
        }
    }
}
