//! Dashboard orchestration: input handling, cache lookup, fetch and merge.
//!
//! Results and user-facing errors land in [`DashboardState`]; callers render
//! from there. Operations take `&mut self`, so one dashboard never has two
//! lookups in flight.

use std::future::Future;
use std::sync::Arc;

use crate::cache::TimeBoundedCache;
use crate::client::{Query, WeatherClient};
use crate::location::{PositionOptions, PositionProvider};
use crate::types::{AirQualitySnapshot, ForecastSnapshot, WeatherBundle, WeatherSnapshot};
use weda_core::{LocationError, TemperatureUnit, WeatherError};

/// Cache key for the position flow
pub const LOCATION_CACHE_KEY: &str = "location_weather";

/// Shown when the weather lookup for a resolved position fails
pub const LOCATION_WEATHER_ERROR: &str = "Unable to fetch weather for your location";

/// Cache key for a city search
pub fn city_cache_key(city: &str) -> String {
    format!("weather_{}", city.trim().to_lowercase())
}

/// Where the displayed data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Cache,
    Network,
}

#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub weather: Option<WeatherSnapshot>,
    pub forecast: Option<ForecastSnapshot>,
    pub air_quality: Option<AirQualitySnapshot>,
    pub error: Option<String>,
    pub loading: bool,
    pub unit: TemperatureUnit,
    pub source: Option<DataSource>,
}

impl DashboardState {
    /// Celsius reading converted to the selected unit
    pub fn display_temp(&self, celsius: f64) -> f64 {
        self.unit.convert(celsius)
    }

    pub fn has_data(&self) -> bool {
        self.weather.is_some()
    }

    fn apply(&mut self, bundle: WeatherBundle, source: DataSource) {
        self.weather = Some(bundle.weather);
        self.forecast = bundle.forecast;
        self.air_quality = bundle.air_quality;
        self.source = Some(source);
    }
}

pub struct WeatherDashboard {
    client: WeatherClient,
    cache: TimeBoundedCache,
    position: Option<Arc<dyn PositionProvider>>,
    position_options: PositionOptions,
    air_quality: bool,
    initialized: bool,
    state: DashboardState,
}

impl WeatherDashboard {
    pub fn new(client: WeatherClient, cache: TimeBoundedCache) -> Self {
        Self {
            client,
            cache,
            position: None,
            position_options: PositionOptions::default(),
            air_quality: true,
            initialized: false,
            state: DashboardState::default(),
        }
    }

    pub fn with_position_provider(mut self, provider: Arc<dyn PositionProvider>) -> Self {
        self.position = Some(provider);
        self
    }

    pub fn with_position_options(mut self, options: PositionOptions) -> Self {
        self.position_options = options;
        self
    }

    /// Enable or disable the air-quality section
    pub fn with_air_quality(mut self, enabled: bool) -> Self {
        self.air_quality = enabled;
        self
    }

    pub fn with_unit(mut self, unit: TemperatureUnit) -> Self {
        self.state.unit = unit;
        self
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn cache(&self) -> &TimeBoundedCache {
        &self.cache
    }

    /// Flip between Celsius and Fahrenheit for this session
    pub fn toggle_unit(&mut self) -> TemperatureUnit {
        self.state.unit = self.state.unit.toggle();
        self.state.unit
    }

    /// Look up weather for a city typed by the user.
    ///
    /// Blank input is rejected without touching the cache or the network. A
    /// failed weather lookup leaves the previously shown weather in place.
    pub async fn search_city(&mut self, city: &str) {
        let city = city.trim();
        if city.is_empty() {
            self.state.error = Some(WeatherError::EmptyCity.user_message().to_string());
            return;
        }

        self.state.error = None;
        self.state.loading = true;

        let key = city_cache_key(city);
        if let Some(bundle) = self.cache.get_as::<WeatherBundle>(&key) {
            tracing::info!("Using cached weather for {}", city);
            self.show(bundle, DataSource::Cache);
            self.state.loading = false;
            return;
        }

        match self.fetch_bundle(&Query::city(city)).await {
            Ok(bundle) => {
                self.remember(&key, &bundle);
                self.state.apply(bundle, DataSource::Network);
            }
            Err(e) => {
                tracing::info!("Weather lookup for {} failed: {}", city, e);
                self.state.error = Some(e.user_message().to_string());
            }
        }

        self.state.loading = false;
    }

    /// Look up weather for the device position.
    pub async fn locate(&mut self) {
        self.state.error = None;
        self.state.loading = true;

        if let Some(bundle) = self.cache.get_as::<WeatherBundle>(LOCATION_CACHE_KEY) {
            tracing::info!("Using cached weather for current location");
            self.show(bundle, DataSource::Cache);
            self.state.loading = false;
            return;
        }

        match self.resolve_position().await {
            Ok(query) => match self.fetch_bundle(&query).await {
                Ok(bundle) => {
                    self.remember(LOCATION_CACHE_KEY, &bundle);
                    self.state.apply(bundle, DataSource::Network);
                }
                Err(e) => {
                    tracing::info!("Weather lookup for {} failed: {}", query, e);
                    self.state.error = Some(LOCATION_WEATHER_ERROR.to_string());
                }
            },
            Err(e) => {
                tracing::info!("Position request failed: {}", e);
                self.state.error = Some(e.user_message().to_string());
            }
        }

        self.state.loading = false;
    }

    /// Run the position flow once, on first display
    pub async fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        self.locate().await;
    }

    pub fn clear_city(&self, city: &str) -> Result<(), WeatherError> {
        Ok(self.cache.clear(&city_cache_key(city))?)
    }

    pub fn clear_location(&self) -> Result<(), WeatherError> {
        Ok(self.cache.clear(LOCATION_CACHE_KEY)?)
    }

    async fn resolve_position(&self) -> Result<Query, LocationError> {
        let provider = self
            .position
            .as_ref()
            .ok_or(LocationError::PositionUnavailable)?;

        let position = provider.current_position(&self.position_options).await?;
        Ok(Query::from(position))
    }

    /// Weather is required; forecast and air quality degrade to `None`.
    async fn fetch_bundle(&self, query: &Query) -> Result<WeatherBundle, WeatherError> {
        let weather = self.client.current_weather(query).await?;

        let (forecast, air_quality) = if self.air_quality {
            tokio::join!(
                settle("forecast", self.client.forecast(query)),
                settle("air quality", self.client.air_quality(query))
            )
        } else {
            (settle("forecast", self.client.forecast(query)).await, None)
        };

        Ok(WeatherBundle {
            weather,
            forecast,
            air_quality,
        })
    }

    fn show(&mut self, mut bundle: WeatherBundle, source: DataSource) {
        if !self.air_quality {
            bundle.air_quality = None;
        }
        self.state.apply(bundle, source);
    }

    fn remember(&self, key: &str, bundle: &WeatherBundle) {
        if let Err(e) = self.cache.set_as(key, bundle) {
            tracing::warn!("Failed to cache weather under {}: {}", key, e);
        }
    }
}

async fn settle<T>(
    section: &str,
    request: impl Future<Output = Result<T, WeatherError>>,
) -> Option<T> {
    match request.await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Omitting {} section: {}", section, e);
            None
        }
    }
}
