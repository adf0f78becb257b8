use tracing::debug;

use crate::{
    config::EngineConfig,
    fan::fan_level_for_temperature_deviation,
    goal::{current_mode_goal_status, GoalStatus},
    outdoor_air::{IngestionMode, OutdoorAirBenefit, OutdoorAirInput},
    temperature::{
        clamp_temperature, UNIT_COOLING_TEMPERATURE_RANGE, UNIT_HEATING_TEMPERATURE_RANGE,
    },
    thresholds::Thresholds,
    types::{AcMode, AcState, FanLevel, Measurement, OutdoorObservation, TargetState},
};

#[derive(Debug, Clone, PartialEq)]
pub struct AutoModeInput {
    pub room_measurement: Measurement,
    pub thresholds: Thresholds,
    pub bom_observation: Option<OutdoorObservation>,
    /// Let the unit idle once its current goal is reached.
    pub yield_ac: bool,
}

/// Outcome of one controller run. `next_state` is `None` when the unit
/// should be left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    pub next_state: Option<AcState>,
    pub goal: Option<GoalStatus>,
    pub reasons: Vec<String>,
}

impl Decision {
    fn unchanged(goal: Option<GoalStatus>, reasons: Vec<String>) -> Self {
        Self {
            next_state: None,
            goal,
            reasons,
        }
    }

    fn change(state: AcState, goal: Option<GoalStatus>, reasons: Vec<String>) -> Self {
        Self {
            next_state: Some(state),
            goal,
            reasons,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        self.next_state.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AutoController {
    config: EngineConfig,
}

impl AutoController {
    pub fn new(mut config: EngineConfig) -> Self {
        config.sanitize();
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn target_state(&self, thresholds: &Thresholds) -> TargetState {
        TargetState {
            temperature: thresholds.midpoint(),
            humidity: self.config.humidity_midpoint,
        }
    }

    pub fn calculate_desired_ac_state(&self, input: &AutoModeInput, prev_state: &AcState) -> Decision {
        let room = input.room_measurement;
        let heating = input.thresholds.heating();
        let cooling = input.thresholds.cooling();
        let target = self.target_state(&input.thresholds);

        debug!(
            "Calculating desired state (roomTemp: {}, roomHumid: {}, outdoorTemp: {}, outdoorHumid: {}, mode: {}, heatingThresh: {}, coolingThresh: {})",
            room.temperature,
            room.humidity,
            input
                .bom_observation
                .map_or_else(|| "unknown".to_string(), |o| o.temperature.to_string()),
            input
                .bom_observation
                .map_or_else(|| "unknown".to_string(), |o| o.humidity.to_string()),
            prev_state.mode_label(),
            heating,
            cooling,
        );

        let mut reasons = Vec::new();

        if let Some(boosted) = self.fan_boost(input, prev_state, &mut reasons) {
            return Decision::change(boosted, None, reasons);
        }

        let goal = current_mode_goal_status(&self.config, input, prev_state, &target, &mut reasons);

        if goal == GoalStatus::Working {
            return match self.recenter_target(input, prev_state, &mut reasons) {
                Some(state) => Decision::change(state, Some(goal), reasons),
                None => Decision::unchanged(Some(goal), reasons),
            };
        }

        if input.yield_ac {
            if goal == GoalStatus::Reached {
                reasons.push("Reached goal while yielding; switching off".to_string());
                return Decision::change(switched_off(prev_state), Some(goal), reasons);
            }
            return Decision::unchanged(Some(goal), reasons);
        }

        if room.temperature > cooling {
            reasons.push(format!(
                "Hotter ({}) than cooling threshold ({}), starting cool mode",
                room.temperature, cooling
            ));

            let state = AcState {
                on: true,
                mode: AcMode::Cool,
                fan_level: Some(fan_level_for_temperature_deviation(room.temperature - cooling)),
                target_temperature: clamp_temperature(heating, &UNIT_COOLING_TEMPERATURE_RANGE),
                ..prev_state.clone()
            };
            return Decision::change(state, Some(goal), reasons);
        }

        if room.temperature < heating {
            reasons.push(format!(
                "Colder ({}) than heating threshold ({}), starting heat mode",
                room.temperature, heating
            ));

            let state = AcState {
                on: true,
                mode: AcMode::Heat,
                fan_level: Some(fan_level_for_temperature_deviation(heating - room.temperature)),
                target_temperature: clamp_temperature(cooling, &UNIT_HEATING_TEMPERATURE_RANGE),
                ..prev_state.clone()
            };
            return Decision::change(state, Some(goal), reasons);
        }

        let benefit = OutdoorAirBenefit::new(&self.config);

        if room.humidity > self.config.drying_humidity_threshold
            && input
                .bom_observation
                .map_or(true, |outdoor| benefit.can_start_dry_mode(&outdoor))
        {
            reasons.push(format!(
                "More humid ({}) than drying threshold ({}), starting dry mode",
                room.humidity, self.config.drying_humidity_threshold
            ));

            let state = AcState {
                on: true,
                mode: AcMode::Dry,
                fan_level: None,
                ..prev_state.clone()
            };
            return Decision::change(state, Some(goal), reasons);
        }

        if let Some(outdoor) = input.bom_observation {
            let air = OutdoorAirInput {
                room,
                target,
                outdoor,
            };

            if let Some(mode) = benefit.should_start_ingesting(&air) {
                if !prev_state.is_on_in(mode.ac_mode()) {
                    reasons.push(format!(
                        "Outdoor air ({outdoor}) better than indoor ({room}), starting {} mode",
                        mode.ac_mode()
                    ));

                    let state = AcState {
                        on: true,
                        mode: mode.ac_mode(),
                        fan_level: match mode {
                            IngestionMode::Fan => Some(FanLevel::Low),
                            IngestionMode::Dry => None,
                        },
                        ..prev_state.clone()
                    };
                    return Decision::change(state, Some(goal), reasons);
                }
            }
        }

        if goal == GoalStatus::Reached {
            reasons.push("Reached goal with nothing else to do; switching off".to_string());
            return Decision::change(switched_off(prev_state), Some(goal), reasons);
        }

        Decision::unchanged(Some(goal), reasons)
    }

    /// Raises the fan speed of a unit stuck on low while the room drifts
    /// further past its threshold. Never touches mode or target.
    fn fan_boost(
        &self,
        input: &AutoModeInput,
        prev_state: &AcState,
        reasons: &mut Vec<String>,
    ) -> Option<AcState> {
        if !prev_state.on || prev_state.fan_level != Some(FanLevel::Low) {
            return None;
        }

        let room = input.room_measurement.temperature;
        let (deviation, label) = match prev_state.mode {
            AcMode::Heat => (input.thresholds.heating() - room, "Heating"),
            AcMode::Cool => (room - input.thresholds.cooling(), "Cooling"),
            AcMode::Fan | AcMode::Dry | AcMode::Auto => return None,
        };

        let boosted = fan_level_for_temperature_deviation(deviation);
        if boosted == FanLevel::Low {
            return None;
        }

        reasons.push(format!("{label} on low is ineffective; boosting to {boosted}"));
        Some(AcState {
            fan_level: Some(boosted),
            ..prev_state.clone()
        })
    }

    /// Moves a heating/cooling target back across the mid-point after the
    /// thresholds have been edited underneath a running unit.
    fn recenter_target(
        &self,
        input: &AutoModeInput,
        prev_state: &AcState,
        reasons: &mut Vec<String>,
    ) -> Option<AcState> {
        let midpoint = input.thresholds.midpoint();
        let current = prev_state.target_temperature;

        let (recentered, reason) = match prev_state.mode {
            AcMode::Heat if current < midpoint => {
                let raised =
                    clamp_temperature(input.thresholds.cooling(), &UNIT_COOLING_TEMPERATURE_RANGE);
                (
                    raised,
                    format!(
                        "Heating target ({current}) is below temperature mid-point ({midpoint}); raising to {raised}"
                    ),
                )
            }
            AcMode::Cool if current > midpoint => {
                let lowered =
                    clamp_temperature(input.thresholds.heating(), &UNIT_HEATING_TEMPERATURE_RANGE);
                (
                    lowered,
                    format!(
                        "Cooling target ({current}) is above temperature mid-point ({midpoint}); lowering to {lowered}"
                    ),
                )
            }
            _ => return None,
        };

        if recentered == current {
            return None;
        }

        reasons.push(reason);
        Some(AcState {
            target_temperature: recentered,
            ..prev_state.clone()
        })
    }
}

fn switched_off(prev_state: &AcState) -> AcState {
    AcState {
        on: false,
        ..prev_state.clone()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::types::TemperatureUnit;

    fn mock_state() -> AcState {
        AcState {
            on: true,
            mode: AcMode::Heat,
            fan_level: Some(FanLevel::Low),
            target_temperature: 21.0,
            temperature_unit: TemperatureUnit::C,
        }
    }

    fn off() -> AcState {
        AcState {
            on: false,
            ..mock_state()
        }
    }

    fn on_in(mode: AcMode) -> AcState {
        AcState {
            mode,
            ..mock_state()
        }
    }

    fn input(temperature: f64, humidity: f64) -> AutoModeInput {
        AutoModeInput {
            room_measurement: Measurement::new(temperature, humidity),
            thresholds: Thresholds::new(19.0, 23.0).unwrap(),
            bom_observation: None,
            yield_ac: false,
        }
    }

    fn with_outdoor(mut input: AutoModeInput, temperature: f64, humidity: f64) -> AutoModeInput {
        input.bom_observation = Some(OutdoorObservation::new(temperature, humidity));
        input
    }

    fn decide(input: &AutoModeInput, prev: &AcState) -> Decision {
        AutoController::default().calculate_desired_ac_state(input, prev)
    }

    #[test]
    fn idle_when_in_range_and_off_auto_or_fan() {
        for prev in [off(), on_in(AcMode::Auto), on_in(AcMode::Fan)] {
            let decision = decide(&input(21.0, 40.0), &prev);
            assert!(decision.is_unchanged());
            assert!(decision.reasons.is_empty());
        }
    }

    #[test]
    fn starts_heating_when_colder_than_threshold() {
        let decision = decide(&input(18.0, 40.0), &off());

        assert_eq!(
            decision.reasons,
            vec!["Colder (18) than heating threshold (19), starting heat mode"]
        );
        assert_eq!(
            decision.next_state,
            Some(AcState {
                on: true,
                mode: AcMode::Heat,
                fan_level: Some(FanLevel::Low),
                target_temperature: 23.0,
                temperature_unit: TemperatureUnit::C,
            })
        );
    }

    #[test]
    fn heat_fan_level_follows_deviation() {
        for (room, level) in [
            (17.0, FanLevel::Medium),
            (14.0, FanLevel::High),
            (11.0, FanLevel::Strong),
        ] {
            let decision = decide(&input(room, 40.0), &off());
            let state = decision.next_state.unwrap();
            assert_eq!(state.mode, AcMode::Heat);
            assert_eq!(state.fan_level, Some(level));
        }
    }

    #[test]
    fn switches_from_cooling_to_heating() {
        let decision = decide(&input(17.0, 40.0), &on_in(AcMode::Cool));

        assert_eq!(
            decision.reasons,
            vec![
                "Cooled (17) to temperature mid-point (21)",
                "Colder (17) than heating threshold (19), starting heat mode",
            ]
        );
        let state = decision.next_state.unwrap();
        assert_eq!(state.mode, AcMode::Heat);
        assert_eq!(state.fan_level, Some(FanLevel::Medium));
        assert_eq!(state.target_temperature, 23.0);
    }

    #[test]
    fn keeps_heating_below_midpoint() {
        for room in [18.0, 20.0] {
            let decision = decide(&input(room, 40.0), &on_in(AcMode::Heat));
            assert!(decision.is_unchanged());
            assert!(decision.reasons.is_empty());
            assert_eq!(decision.goal, Some(GoalStatus::Working));
        }
    }

    #[test]
    fn boosts_heating_fan_without_changing_mode() {
        let decision = decide(&input(17.0, 40.0), &on_in(AcMode::Heat));

        assert_eq!(
            decision.reasons,
            vec!["Heating on low is ineffective; boosting to medium"]
        );
        assert_eq!(
            decision.next_state,
            Some(AcState {
                fan_level: Some(FanLevel::Medium),
                ..mock_state()
            })
        );
    }

    #[test]
    fn boosts_cooling_fan_without_changing_mode() {
        let decision = decide(&input(25.0, 40.0), &on_in(AcMode::Cool));

        assert_eq!(
            decision.reasons,
            vec!["Cooling on low is ineffective; boosting to medium"]
        );
        let state = decision.next_state.unwrap();
        assert_eq!(state.mode, AcMode::Cool);
        assert_eq!(state.fan_level, Some(FanLevel::Medium));
        assert_eq!(state.target_temperature, 21.0);
    }

    #[test]
    fn no_boost_once_fan_is_above_low() {
        let prev = AcState {
            fan_level: Some(FanLevel::Medium),
            ..on_in(AcMode::Heat)
        };
        assert!(decide(&input(14.0, 40.0), &prev).is_unchanged());
    }

    #[test]
    fn switches_off_after_heating_past_midpoint() {
        let decision = decide(&input(22.0, 40.0), &on_in(AcMode::Heat));

        assert_eq!(
            decision.reasons,
            vec![
                "Heated (22) to temperature mid-point (21)",
                "Reached goal with nothing else to do; switching off",
            ]
        );
        assert_eq!(decision.next_state, Some(off()));
    }

    #[test]
    fn starts_cooling_when_hotter_than_threshold() {
        let decision = decide(&input(24.0, 40.0), &off());

        assert_eq!(
            decision.reasons,
            vec!["Hotter (24) than cooling threshold (23), starting cool mode"]
        );
        let state = decision.next_state.unwrap();
        assert_eq!(state.mode, AcMode::Cool);
        assert_eq!(state.fan_level, Some(FanLevel::Low));
        assert_eq!(state.target_temperature, 19.0);
        assert!(state.on);
    }

    #[test]
    fn switches_from_heating_to_cooling() {
        let decision = decide(&input(31.0, 40.0), &on_in(AcMode::Heat));

        assert_eq!(
            decision.reasons,
            vec![
                "Heated (31) to temperature mid-point (21)",
                "Hotter (31) than cooling threshold (23), starting cool mode",
            ]
        );
        assert_eq!(decision.next_state.unwrap().fan_level, Some(FanLevel::Strong));
    }

    #[test]
    fn switches_off_after_cooling_past_midpoint() {
        let decision = decide(&input(20.0, 40.0), &on_in(AcMode::Cool));

        assert_eq!(
            decision.reasons,
            vec![
                "Cooled (20) to temperature mid-point (21)",
                "Reached goal with nothing else to do; switching off",
            ]
        );
        assert!(!decision.next_state.unwrap().on);
    }

    #[test]
    fn starts_drying_when_humid() {
        let decision = decide(&input(21.0, 65.0), &off());

        assert_eq!(
            decision.reasons,
            vec!["More humid (65) than drying threshold (60), starting dry mode"]
        );
        let state = decision.next_state.unwrap();
        assert_eq!(state.mode, AcMode::Dry);
        assert_eq!(state.fan_level, None);
        assert!(state.on);
    }

    #[test]
    fn drying_threshold_is_exclusive() {
        assert!(decide(&input(21.0, 60.0), &off()).is_unchanged());
    }

    #[test]
    fn no_drying_when_outdoor_air_is_unsuitable() {
        let decision = decide(&with_outdoor(input(21.0, 65.0), 25.0, 90.0), &off());
        assert!(decision.is_unchanged());
    }

    #[test]
    fn keeps_drying_while_humid() {
        let decision = decide(&input(21.0, 65.0), &on_in(AcMode::Dry));
        assert!(decision.is_unchanged());
        assert!(decision.reasons.is_empty());
    }

    #[test]
    fn switches_off_after_drying_below_midpoint() {
        let decision = decide(&input(21.0, 20.0), &on_in(AcMode::Dry));

        assert_eq!(
            decision.reasons,
            vec![
                "Dried (20) to humidity mid-point (40)",
                "Reached goal with nothing else to do; switching off",
            ]
        );
        assert!(!decision.next_state.unwrap().on);
    }

    #[test]
    fn switches_off_drying_when_outdoor_air_turns_worse() {
        let prev = AcState {
            fan_level: None,
            ..on_in(AcMode::Dry)
        };
        let decision = decide(&with_outdoor(input(23.0, 55.0), 30.0, 20.0), &prev);

        assert_eq!(decision.goal, Some(GoalStatus::Reached));
        assert_eq!(
            decision.reasons,
            vec![
                "Outdoor air (30C, 20%) is no longer better than indoor (23C, 55%)",
                "Reached goal with nothing else to do; switching off",
            ]
        );
        assert!(!decision.next_state.unwrap().on);
    }

    #[test]
    fn temperature_thresholds_override_drying() {
        let decision = decide(&input(18.0, 50.0), &on_in(AcMode::Dry));
        let state = decision.next_state.unwrap();
        assert_eq!(state.mode, AcMode::Heat);
        assert_eq!(state.fan_level, Some(FanLevel::Low));

        let decision = decide(&input(24.0, 50.0), &on_in(AcMode::Dry));
        let state = decision.next_state.unwrap();
        assert_eq!(state.mode, AcMode::Cool);
        assert_eq!(state.target_temperature, 19.0);
    }

    #[test]
    fn starts_fan_when_outdoor_air_is_cooler_and_drier() {
        let decision = decide(&with_outdoor(input(23.0, 60.0), 15.0, 30.0), &off());

        assert_eq!(
            decision.reasons,
            vec!["Outdoor air (15C, 30%) better than indoor (23C, 60%), starting fan mode"]
        );
        let state = decision.next_state.unwrap();
        assert_eq!(state.mode, AcMode::Fan);
        assert_eq!(state.fan_level, Some(FanLevel::Low));
        assert!(state.on);
    }

    #[test]
    fn humid_outdoor_air_never_starts_fan() {
        let decision = decide(&with_outdoor(input(23.0, 60.0), 15.0, 60.0), &off());

        let mode = decision.next_state.map(|state| state.mode);
        assert_ne!(mode, Some(AcMode::Fan));
        assert_eq!(mode, Some(AcMode::Dry));
    }

    #[test]
    fn fan_is_not_restarted_while_running() {
        let prev = on_in(AcMode::Fan);
        let input = with_outdoor(input(23.0, 60.0), 15.0, 30.0);

        let decision = decide(&input, &prev);
        assert!(decision.is_unchanged());
        assert_eq!(decision.goal, Some(GoalStatus::Working));
    }

    #[test]
    fn fan_keeps_running_inside_hysteresis_band() {
        let prev = on_in(AcMode::Fan);
        let input = with_outdoor(input(21.5, 43.0), 21.0, 41.0);

        let decision = decide(&input, &prev);
        assert!(decision.is_unchanged());
        assert!(decision.reasons.is_empty());
    }

    #[test]
    fn fan_switches_off_when_outdoor_air_turns_worse() {
        let prev = on_in(AcMode::Fan);
        let input = with_outdoor(input(22.0, 45.0), 26.0, 45.0);

        let decision = decide(&input, &prev);
        assert_eq!(
            decision.reasons,
            vec![
                "Outdoor air (26C, 45%) is no longer better than indoor (22C, 45%)",
                "Reached goal with nothing else to do; switching off",
            ]
        );
        assert!(!decision.next_state.unwrap().on);
    }

    #[test]
    fn repeated_calls_after_goal_are_stable() {
        let controller = AutoController::default();
        let input = input(22.0, 40.0);

        let first = controller.calculate_desired_ac_state(&input, &on_in(AcMode::Heat));
        let state = first.next_state.unwrap();
        assert!(!state.on);

        for _ in 0..3 {
            assert!(controller
                .calculate_desired_ac_state(&input, &state)
                .is_unchanged());
        }
    }

    #[test]
    fn yielding_switches_off_only_at_goal() {
        let mut yielding = input(22.0, 40.0);
        yielding.yield_ac = true;

        let decision = decide(&yielding, &on_in(AcMode::Heat));
        assert_eq!(
            decision.reasons,
            vec![
                "Heated (22) to temperature mid-point (21)",
                "Reached goal while yielding; switching off",
            ]
        );
        assert!(!decision.next_state.unwrap().on);

        let mut cold = input(15.0, 40.0);
        cold.yield_ac = true;
        assert!(decide(&cold, &off()).is_unchanged());
    }

    #[test]
    fn recenters_heating_target_after_threshold_edit() {
        let prev = AcState {
            target_temperature: 20.0,
            fan_level: Some(FanLevel::Medium),
            ..on_in(AcMode::Heat)
        };
        let mut input = input(21.0, 40.0);
        input.thresholds = Thresholds::new(21.0, 25.0).unwrap();

        let decision = decide(&input, &prev);
        assert_eq!(
            decision.reasons,
            vec!["Heating target (20) is below temperature mid-point (23); raising to 25"]
        );
        assert_eq!(
            decision.next_state,
            Some(AcState {
                target_temperature: 25.0,
                ..prev
            })
        );
    }

    #[test]
    fn recenters_cooling_target_using_heating_range() {
        let prev = AcState {
            target_temperature: 24.0,
            fan_level: Some(FanLevel::Medium),
            ..on_in(AcMode::Cool)
        };
        let mut input = input(22.0, 40.0);
        input.thresholds = Thresholds::new(16.5, 21.0).unwrap();

        // 16.5 fits the heating range where the cooling range would clamp to 18.
        let decision = decide(&input, &prev);
        assert_eq!(decision.next_state.unwrap().target_temperature, 17.0);
    }

    #[test]
    fn never_mutates_previous_state() {
        let prev = on_in(AcMode::Heat);
        let snapshot = prev.clone();

        let _ = decide(&input(30.0, 80.0), &prev);
        assert_eq!(prev, snapshot);
    }
}
