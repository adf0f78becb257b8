pub mod config;
pub mod controller;
pub mod fan;
pub mod goal;
pub mod outdoor_air;
pub mod poll;
pub mod temperature;
pub mod thresholds;
pub mod topics;
pub mod types;
pub mod unit;

pub use config::{
    ControllerConfig, EngineConfig, NetworkConfig, RuntimeConfig, UserState, UserStateUpdate,
};
pub use controller::{AutoController, AutoModeInput, Decision};
pub use goal::GoalStatus;
pub use outdoor_air::{IngestionMode, OutdoorAirBenefit, OutdoorAirInput};
pub use thresholds::{ThresholdError, Thresholds};
pub use topics::*;
pub use types::{
    AcMode, AcState, ControllerStatus, FanLevel, Measurement, OutdoorObservation, TargetState,
    TemperatureUnit, VendorAcState,
};
pub use unit::UnitSession;
