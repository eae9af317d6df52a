//! HTTP client for the weather backend.

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::instrument;

use crate::types::{AirQualitySnapshot, ForecastSnapshot, Position, WeatherSnapshot};
use weda_core::{ApiConfig, ReqwestErrorExt, WeatherError};

const WEATHER_PATH: &str = "/api/weather";
const WEATHER_COORDS_PATH: &str = "/api/weather/coords";
const FORECAST_PATH: &str = "/api/weather/forecast";
const AIR_QUALITY_PATH: &str = "/api/air-quality";

/// What a lookup is keyed on
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    City(String),
    Coords { latitude: f64, longitude: f64 },
}

impl Query {
    pub fn city(name: impl Into<String>) -> Self {
        Self::City(name.into())
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::City(name) => vec![("city", name.clone())],
            Self::Coords {
                latitude,
                longitude,
            } => vec![("lat", latitude.to_string()), ("lon", longitude.to_string())],
        }
    }
}

impl From<Position> for Query {
    fn from(position: Position) -> Self {
        Self::Coords {
            latitude: position.latitude,
            longitude: position.longitude,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::City(name) => write!(f, "{}", name),
            Self::Coords {
                latitude,
                longitude,
            } => write!(f, "{:.4}, {:.4}", latitude, longitude),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
}

impl WeatherClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("weda/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, WeatherError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current conditions. Any non-success status means the place is unknown.
    #[instrument(skip(self), level = "info")]
    pub async fn current_weather(&self, query: &Query) -> Result<WeatherSnapshot, WeatherError> {
        let path = match query {
            Query::City(_) => WEATHER_PATH,
            Query::Coords { .. } => WEATHER_COORDS_PATH,
        };

        let response = self.send(path, query).await?;
        if !response.status().is_success() {
            tracing::info!("Weather lookup for {} returned {}", query, response.status());
            return Err(WeatherError::CityNotFound(query.to_string()));
        }

        Self::decode(response).await
    }

    #[instrument(skip(self), level = "info")]
    pub async fn forecast(&self, query: &Query) -> Result<ForecastSnapshot, WeatherError> {
        self.fetch_optional(FORECAST_PATH, query).await
    }

    #[instrument(skip(self), level = "info")]
    pub async fn air_quality(&self, query: &Query) -> Result<AirQualitySnapshot, WeatherError> {
        self.fetch_optional(AIR_QUALITY_PATH, query).await
    }

    async fn fetch_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &Query,
    ) -> Result<T, WeatherError> {
        let response = self.send(path, query).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Api {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }

        Self::decode(response).await
    }

    async fn send(&self, path: &str, query: &Query) -> Result<Response, WeatherError> {
        let url = format!("{}{}", self.base_url, path);

        self.client
            .get(&url)
            .query(&query.params())
            .send()
            .await
            .map_err(|e| WeatherError::Network(e.into_network_error()))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, WeatherError> {
        response
            .json::<T>()
            .await
            .map_err(|e| WeatherError::Parse(e.to_string()))
    }
}
