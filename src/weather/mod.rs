//! Weather lookup
//!
//! The pipeline only needs one number from the weather provider: the current
//! temperature in Celsius for a [`LocationQuery`].

use async_trait::async_trait;

use crate::Result;
use crate::models::{LocationQuery, WeatherObservation};

pub mod open_weather_map;

pub use open_weather_map::WeatherResolver;

/// Source of current temperature readings
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current_weather(&self, location: &LocationQuery) -> Result<WeatherObservation>;
}
