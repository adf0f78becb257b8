use std::fmt;

use serde::{Deserialize, Serialize};

use crate::temperature::{celsius_to_fahrenheit, fahrenheit_to_celsius};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcMode {
    Heat,
    Cool,
    Fan,
    Dry,
    Auto,
}

impl AcMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heat => "heat",
            Self::Cool => "cool",
            Self::Fan => "fan",
            Self::Dry => "dry",
            Self::Auto => "auto",
        }
    }

    /// Modes in which the unit expects an explicit fan level.
    pub fn uses_fan_level(self) -> bool {
        matches!(self, Self::Heat | Self::Cool | Self::Fan)
    }
}

impl fmt::Display for AcMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanLevel {
    Auto,
    Low,
    MediumLow,
    Medium,
    MediumHigh,
    High,
    Strong,
}

impl FanLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Low => "low",
            Self::MediumLow => "medium_low",
            Self::Medium => "medium",
            Self::MediumHigh => "medium_high",
            Self::High => "high",
            Self::Strong => "strong",
        }
    }
}

impl fmt::Display for FanLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    C,
    F,
}

/// Commanded state of the unit. The target is always held in Celsius; the
/// display unit only matters when talking to the vendor API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcState {
    pub on: bool,
    pub mode: AcMode,
    #[serde(rename = "fanLevel", default, skip_serializing_if = "Option::is_none")]
    pub fan_level: Option<FanLevel>,
    #[serde(rename = "targetTemperature")]
    pub target_temperature: f64,
    #[serde(rename = "temperatureUnit")]
    pub temperature_unit: TemperatureUnit,
}

/// The unit state exactly as the vendor API reports and accepts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorAcState {
    pub on: bool,
    pub mode: AcMode,
    #[serde(rename = "fanLevel", default, skip_serializing_if = "Option::is_none")]
    pub fan_level: Option<FanLevel>,
    #[serde(rename = "targetTemperature")]
    pub target_temperature: f64,
    #[serde(rename = "temperatureUnit")]
    pub temperature_unit: TemperatureUnit,
}

impl AcState {
    pub fn is_on_in(&self, mode: AcMode) -> bool {
        self.on && self.mode == mode
    }

    /// Both off means equivalent, whatever else differs.
    pub fn is_equivalent(&self, other: &AcState) -> bool {
        if !self.on && !other.on {
            return true;
        }

        self.on == other.on
            && self.mode == other.mode
            && self.target_temperature == other.target_temperature
            && self.fan_level == other.fan_level
    }

    pub fn to_vendor(&self) -> VendorAcState {
        let target_temperature = match self.temperature_unit {
            TemperatureUnit::F => celsius_to_fahrenheit(self.target_temperature),
            TemperatureUnit::C => self.target_temperature,
        };

        VendorAcState {
            on: self.on,
            mode: self.mode,
            fan_level: self.fan_level,
            target_temperature,
            temperature_unit: self.temperature_unit,
        }
    }

    pub fn from_vendor(vendor: &VendorAcState) -> Self {
        let target_temperature = match vendor.temperature_unit {
            TemperatureUnit::F => fahrenheit_to_celsius(vendor.target_temperature),
            TemperatureUnit::C => vendor.target_temperature,
        };

        Self {
            on: vendor.on,
            mode: vendor.mode,
            fan_level: vendor.fan_level,
            target_temperature,
            temperature_unit: vendor.temperature_unit,
        }
    }

    pub fn mode_label(&self) -> &'static str {
        if self.on {
            self.mode.as_str()
        } else {
            "off"
        }
    }
}

impl Default for AcState {
    fn default() -> Self {
        Self {
            on: false,
            mode: AcMode::Cool,
            fan_level: Some(FanLevel::Auto),
            target_temperature: 21.0,
            temperature_unit: TemperatureUnit::C,
        }
    }
}

/// Indoor reading in Celsius and relative humidity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub temperature: f64,
    pub humidity: f64,
    #[serde(rename = "secondsAgo", default, skip_serializing_if = "Option::is_none")]
    pub seconds_ago: Option<f64>,
}

impl Measurement {
    pub fn new(temperature: f64, humidity: f64) -> Self {
        Self {
            temperature,
            humidity,
            seconds_ago: None,
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}C, {}%", self.temperature, self.humidity)
    }
}

/// Outside air reading from the weather feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutdoorObservation {
    pub temperature: f64,
    pub humidity: f64,
}

impl OutdoorObservation {
    pub fn new(temperature: f64, humidity: f64) -> Self {
        Self {
            temperature,
            humidity,
        }
    }
}

impl fmt::Display for OutdoorObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}C, {}%", self.temperature, self.humidity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetState {
    pub temperature: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    #[serde(rename = "unitId")]
    pub unit_id: String,
    #[serde(rename = "acState")]
    pub ac_state: AcState,
    pub mode: &'static str,
    #[serde(rename = "autoMode")]
    pub auto_mode: bool,
    #[serde(rename = "yieldAc")]
    pub yield_ac: bool,
    #[serde(rename = "heatingThresholdTemperature")]
    pub heating_threshold_temperature: Option<f64>,
    #[serde(rename = "coolingThresholdTemperature")]
    pub cooling_threshold_temperature: Option<f64>,
    #[serde(rename = "targetTemperature")]
    pub target_temperature: Option<f64>,
    #[serde(rename = "roomTemp")]
    pub room_temp: Option<f64>,
    #[serde(rename = "roomHumidity")]
    pub room_humidity: Option<f64>,
    #[serde(rename = "outdoorTemp")]
    pub outdoor_temp: Option<f64>,
    #[serde(rename = "outdoorHumidity")]
    pub outdoor_humidity: Option<f64>,
    #[serde(rename = "outdoorValid")]
    pub outdoor_valid: bool,
}
