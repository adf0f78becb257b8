use crate::{
    config::EngineConfig,
    controller::AutoModeInput,
    outdoor_air::{IngestionMode, OutdoorAirBenefit, OutdoorAirInput},
    types::{AcMode, AcState, Measurement, OutdoorObservation, TargetState},
};

/// Progress of the mode the unit is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalStatus {
    /// Goal-directed and still has work to do.
    Working,
    /// Goal-directed and the goal has been reached or passed.
    Reached,
    /// Off, auto or idling; nothing to measure progress against.
    NotDirected,
}

pub fn current_mode_goal_status(
    config: &EngineConfig,
    input: &AutoModeInput,
    prev_state: &AcState,
    target: &TargetState,
    reasons: &mut Vec<String>,
) -> GoalStatus {
    if !prev_state.on {
        return GoalStatus::NotDirected;
    }

    let room = &input.room_measurement;
    let midpoint = input.thresholds.midpoint();

    match prev_state.mode {
        // Only the user ends auto mode.
        AcMode::Auto => GoalStatus::NotDirected,

        AcMode::Heat => {
            if room.temperature > midpoint {
                reasons.push(format!(
                    "Heated ({}) to temperature mid-point ({})",
                    room.temperature, midpoint
                ));
                GoalStatus::Reached
            } else {
                GoalStatus::Working
            }
        }

        AcMode::Cool => {
            if room.temperature < midpoint {
                reasons.push(format!(
                    "Cooled ({}) to temperature mid-point ({})",
                    room.temperature, midpoint
                ));
                GoalStatus::Reached
            } else {
                GoalStatus::Working
            }
        }

        AcMode::Dry => {
            if room.humidity < config.humidity_midpoint {
                reasons.push(format!(
                    "Dried ({}) to humidity mid-point ({})",
                    room.humidity, config.humidity_midpoint
                ));
                return GoalStatus::Reached;
            }

            if let Some(outdoor) = input.bom_observation {
                let benefit = OutdoorAirBenefit::new(config);
                if benefit.should_stop_dry_mode(&outdoor) {
                    reasons.push(format!(
                        "Outdoor air ({outdoor}) is no longer suitable for dehumidifying"
                    ));
                    return GoalStatus::Reached;
                }

                let air = OutdoorAirInput {
                    room: *room,
                    target: *target,
                    outdoor,
                };
                if benefit.should_stop_ingesting(&air, IngestionMode::Dry) {
                    reasons.push(no_longer_better(&outdoor, room));
                    return GoalStatus::Reached;
                }
            }

            if room.humidity > config.maximum_normal_humidity {
                return GoalStatus::Working;
            }

            ingestion_status(config, input, target, IngestionMode::Dry, reasons)
        }

        AcMode::Fan => ingestion_status(config, input, target, IngestionMode::Fan, reasons),
    }
}

fn ingestion_status(
    config: &EngineConfig,
    input: &AutoModeInput,
    target: &TargetState,
    mode: IngestionMode,
    reasons: &mut Vec<String>,
) -> GoalStatus {
    let Some(outdoor) = input.bom_observation else {
        return GoalStatus::NotDirected;
    };

    let benefit = OutdoorAirBenefit::new(config);
    let air = OutdoorAirInput {
        room: input.room_measurement,
        target: *target,
        outdoor,
    };

    if benefit.should_stop_ingesting(&air, mode) {
        reasons.push(no_longer_better(&outdoor, &input.room_measurement));
        return GoalStatus::Reached;
    }

    if benefit.should_start_ingesting(&air) == Some(mode) {
        return GoalStatus::Working;
    }

    // Idling; let the temperature thresholds decide.
    GoalStatus::NotDirected
}

fn no_longer_better(outdoor: &OutdoorObservation, room: &Measurement) -> String {
    format!("Outdoor air ({outdoor}) is no longer better than indoor ({room})")
}
