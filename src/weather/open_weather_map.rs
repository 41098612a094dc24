//! OpenWeatherMap current weather client

use std::time::Duration;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument};

use super::WeatherProvider;
use crate::Result;
use crate::config::WeatherConfig;
use crate::error::Stage;
use crate::http;
use crate::models::{LocationQuery, WeatherObservation};

/// Resolves a city name or coordinates into the current temperature
pub struct WeatherResolver {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Current weather document, only the fields the pipeline reads
#[derive(Debug, Deserialize)]
struct CurrentWeatherResponse {
    main: MainReadings,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
}

impl WeatherResolver {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> AnyResult<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &WeatherConfig) -> AnyResult<Self> {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone().unwrap_or_default(),
            Duration::from_secs(config.timeout_seconds.into()),
        )
    }

    /// Current temperature for a city name
    pub async fn resolve_by_city(&self, city: &str) -> Result<WeatherObservation> {
        self.current_weather(&LocationQuery::city(city)?).await
    }

    /// Current temperature for a coordinate pair, validated before the call
    pub async fn resolve_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherObservation> {
        self.current_weather(&LocationQuery::coordinates(latitude, longitude)?)
            .await
    }

    fn url_for(&self, location: &LocationQuery) -> String {
        let selector = match location {
            LocationQuery::City { name } => format!("q={}", urlencoding::encode(name)),
            LocationQuery::Coordinates {
                latitude,
                longitude,
            } => format!("lat={latitude}&lon={longitude}"),
        };
        format!(
            "{}/weather?{}&appid={}&units=metric",
            self.base_url,
            selector,
            urlencoding::encode(&self.api_key)
        )
    }
}

#[async_trait]
impl WeatherProvider for WeatherResolver {
    #[instrument(skip(self), fields(location = %location))]
    async fn current_weather(&self, location: &LocationQuery) -> Result<WeatherObservation> {
        let response = http::send(Stage::Weather, self.client.get(self.url_for(location))).await?;
        let document: CurrentWeatherResponse = http::read_json(Stage::Weather, response).await?;

        let observation = WeatherObservation::new(document.main.temp);
        info!("Current temperature {}", observation.format_temperature());
        Ok(observation)
    }
}
