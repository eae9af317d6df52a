//! Weather lookup for Weda.
//!
//! Fetches current conditions, forecast, and air quality from the weather
//! backend, caches merged results in a local key/value store for 30 minutes,
//! and exposes the dashboard state the front-end renders.

pub mod cache;
pub mod client;
pub mod dashboard;
pub mod location;
pub mod store;
pub mod types;

pub use cache::{CacheEntry, Clock, ManualClock, SystemClock, TimeBoundedCache, FRESHNESS_WINDOW_MS};
pub use client::{Query, WeatherClient};
pub use dashboard::{
    city_cache_key, DashboardState, DataSource, WeatherDashboard, LOCATION_CACHE_KEY,
    LOCATION_WEATHER_ERROR,
};
pub use location::{ChainedPosition, FixedPosition, IpLocator, PositionOptions, PositionProvider};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use types::*;
pub use weda_core::{LocationError, StoreError, TemperatureUnit, WeatherError};
