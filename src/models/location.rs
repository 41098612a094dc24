//! Location query model

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::PlaylistError;

/// What a caller asks a playlist for
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocationQuery {
    /// Free-text city name, resolved by the weather provider
    City { name: String },
    /// Decimal degrees
    Coordinates { latitude: f64, longitude: f64 },
}

impl LocationQuery {
    /// Create a city query. Blank names are rejected.
    pub fn city<S: Into<String>>(name: S) -> Result<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(PlaylistError::invalid_input("City name cannot be empty"));
        }
        Ok(Self::City {
            name: trimmed.to_string(),
        })
    }

    /// Create a coordinate query, checking both ranges before anything goes on the wire
    pub fn coordinates(latitude: f64, longitude: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(PlaylistError::invalid_input(format!(
                "Latitude {latitude} is outside -90..=90"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(PlaylistError::invalid_input(format!(
                "Longitude {longitude} is outside -180..=180"
            )));
        }
        Ok(Self::Coordinates {
            latitude,
            longitude,
        })
    }

    /// Label stored in the request history
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::City { name } => name.clone(),
            Self::Coordinates {
                latitude,
                longitude,
            } => format!("Lat: {latitude}, Lon: {longitude}"),
        }
    }
}

impl fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
