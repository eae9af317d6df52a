use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Weather backend settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Local cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Display and lookup preferences
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Device position settings
    #[serde(default)]
    pub location: LocationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the weather backend (serves `/api/weather`, `/api/air-quality`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Freshness window in minutes, at most 30
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,

    /// Cache file path; defaults to `weather_cache.json` in the config directory
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Upper bound for `cache.ttl_minutes`
pub const MAX_CACHE_TTL_MINUTES: u64 = 30;

fn default_ttl_minutes() -> u64 {
    MAX_CACHE_TTL_MINUTES
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            file: None,
        }
    }
}

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Celsius,
    #[default]
    Fahrenheit,
}

impl TemperatureUnit {
    /// Switch to the other unit
    pub fn toggle(self) -> Self {
        match self {
            Self::Celsius => Self::Fahrenheit,
            Self::Fahrenheit => Self::Celsius,
        }
    }

    /// Convert a Celsius reading into this unit
    pub fn convert(self, celsius: f64) -> f64 {
        match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => (celsius * 9.0 / 5.0) + 32.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Unit used when a session starts
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,

    /// Fetch air quality alongside the forecast
    #[serde(default = "default_true")]
    pub air_quality: bool,
}

fn default_true() -> bool {
    true
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            temperature_unit: TemperatureUnit::default(),
            air_quality: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Fixed latitude used instead of a lookup
    #[serde(default)]
    pub latitude: Option<f64>,

    /// Fixed longitude used instead of a lookup
    #[serde(default)]
    pub longitude: Option<f64>,

    /// Allow IP-based position lookup
    #[serde(default = "default_true")]
    pub ip_lookup: bool,

    /// IP geolocation endpoint
    #[serde(default = "default_ip_lookup_url")]
    pub ip_lookup_url: String,
}

fn default_ip_lookup_url() -> String {
    "http://ip-api.com/json".to_string()
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            ip_lookup: true,
            ip_lookup_url: default_ip_lookup_url(),
        }
    }
}

impl LocationConfig {
    /// Configured coordinates, if both halves are present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("weda");

        Self {
            config_dir,
            api: ApiConfig::default(),
            cache: CacheConfig::default(),
            weather: WeatherConfig::default(),
            location: LocationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let mut config = Self::default();
            if let Some(parent) = path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(path)?;
            tracing::info!("Wrote default configuration to {}", path.display());
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load configuration and validate it
    ///
    /// Warnings are logged; errors fail the load.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult), ConfigError> {
        let config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.api.base_url, "api.base_url", &mut result);

        if self.api.timeout_secs == 0 {
            result.add_error("api.timeout_secs", "Request timeout must be greater than 0");
        } else if self.api.timeout_secs > 120 {
            result.add_warning("api.timeout_secs", "Request timeout is unusually long (>120s)");
        }

        if self.cache.ttl_minutes == 0 {
            result.add_warning("cache.ttl_minutes", "Caching disabled (0 minutes)");
        } else if self.cache.ttl_minutes > MAX_CACHE_TTL_MINUTES {
            result.add_error(
                "cache.ttl_minutes",
                format!(
                    "Cache freshness window cannot exceed {} minutes",
                    MAX_CACHE_TTL_MINUTES
                ),
            );
        }

        match (self.location.latitude, self.location.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    result.add_error("location.latitude", "Latitude must be within -90..90");
                }
                if !(-180.0..=180.0).contains(&lon) {
                    result.add_error("location.longitude", "Longitude must be within -180..180");
                }
            }
            (Some(_), None) | (None, Some(_)) => {
                result.add_error(
                    "location",
                    "Latitude and longitude must be configured together",
                );
            }
            (None, None) => {}
        }

        if self.location.ip_lookup {
            self.validate_url(
                &self.location.ip_lookup_url,
                "location.ip_lookup_url",
                &mut result,
            );
        } else if self.location.coordinates().is_none() {
            result.add_warning(
                "location",
                "No coordinates configured and IP lookup disabled - location lookup unavailable",
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Path of the persisted weather cache
    pub fn cache_path(&self) -> PathBuf {
        self.cache
            .file
            .clone()
            .unwrap_or_else(|| self.config_dir.join("weather_cache.json"))
    }

    /// Freshness window in milliseconds
    pub fn cache_ttl_ms(&self) -> i64 {
        i64::try_from(self.cache.ttl_minutes)
            .unwrap_or(i64::MAX / 60_000)
            .saturating_mul(60_000)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |e: std::io::Error| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, contents).map_err(io_err)
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?.join("weda");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.api.base_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "api.base_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.api.base_url = "ftp://localhost:8080".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let mut config = Config::default();
        config.api.timeout_secs = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "api.timeout_secs"));
    }

    #[test]
    fn test_zero_ttl_is_warning() {
        let mut config = Config::default();
        config.cache.ttl_minutes = 0;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "cache.ttl_minutes"));
    }

    #[test]
    fn test_ttl_above_thirty_minutes_is_error() {
        let mut config = Config::default();
        config.cache.ttl_minutes = 31;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "cache.ttl_minutes"));

        config.cache.ttl_minutes = 30;
        assert!(config.validate().is_valid());
    }

    #[test]
    fn test_half_configured_coordinates() {
        let mut config = Config::default();
        config.location.latitude = Some(52.5);
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "location"));
    }

    #[test]
    fn test_out_of_range_coordinates() {
        let mut config = Config::default();
        config.location.latitude = Some(95.0);
        config.location.longitude = Some(13.4);
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "location.latitude"));
    }

    #[test]
    fn test_default_ttl_is_thirty_minutes() {
        assert_eq!(Config::default().cache_ttl_ms(), 1_800_000);
    }

    #[test]
    fn test_temperature_conversion() {
        assert_eq!(TemperatureUnit::Fahrenheit.convert(0.0), 32.0);
        assert_eq!(TemperatureUnit::Fahrenheit.convert(100.0), 212.0);
        assert_eq!(TemperatureUnit::Celsius.convert(21.5), 21.5);
    }

    #[test]
    fn test_temperature_unit_toggle() {
        assert_eq!(TemperatureUnit::default(), TemperatureUnit::Fahrenheit);
        assert_eq!(TemperatureUnit::Fahrenheit.toggle(), TemperatureUnit::Celsius);
        assert_eq!(TemperatureUnit::Celsius.toggle(), TemperatureUnit::Fahrenheit);
    }

    #[test]
    fn test_load_from_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.config_dir, dir.path());
        assert_eq!(config.cache_path(), dir.path().join("weather_cache.json"));

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.api.base_url, config.api.base_url);
    }

    #[test]
    fn test_load_from_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "config_dir = \"/tmp/weda\"\n[weather]\ntemperature_unit = \"celsius\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.weather.temperature_unit, TemperatureUnit::Celsius);
        assert!(config.weather.air_quality);
        assert_eq!(config.cache.ttl_minutes, 30);
    }

    #[test]
    fn test_load_from_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
