use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ThresholdError {
    #[error("{name} threshold is not a finite temperature ({value})")]
    NotFinite { name: &'static str, value: f64 },
    #[error("heating threshold ({heating}) is above cooling threshold ({cooling})")]
    Inverted { heating: f64, cooling: f64 },
    #[error("{name} threshold is not set")]
    Missing { name: &'static str },
}

/// Validated heating/cooling pair; heating never exceeds cooling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    heating: f64,
    cooling: f64,
}

impl Thresholds {
    pub fn new(heating: f64, cooling: f64) -> Result<Self, ThresholdError> {
        if !heating.is_finite() {
            return Err(ThresholdError::NotFinite {
                name: "heating",
                value: heating,
            });
        }
        if !cooling.is_finite() {
            return Err(ThresholdError::NotFinite {
                name: "cooling",
                value: cooling,
            });
        }
        if heating > cooling {
            return Err(ThresholdError::Inverted { heating, cooling });
        }

        Ok(Self { heating, cooling })
    }

    pub fn heating(&self) -> f64 {
        self.heating
    }

    pub fn cooling(&self) -> f64 {
        self.cooling
    }

    pub fn midpoint(&self) -> f64 {
        (self.heating + self.cooling) / 2.0
    }
}
