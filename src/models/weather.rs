//! Weather observation model

use serde::{Deserialize, Serialize};

/// Temperature reading returned by the weather provider
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct WeatherObservation {
    /// Temperature in Celsius
    pub temperature_celsius: f64,
}

impl WeatherObservation {
    #[must_use]
    pub fn new(temperature_celsius: f64) -> Self {
        Self {
            temperature_celsius,
        }
    }

    /// Format temperature with unit
    #[must_use]
    pub fn format_temperature(&self) -> String {
        format!("{:.1}°C", self.temperature_celsius)
    }
}
