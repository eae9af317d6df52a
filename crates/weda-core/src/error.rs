//! Centralized error types for Weda.
//!
//! This module provides a typed error hierarchy that:
//! - Enables precise error handling throughout the codebase
//! - Provides user-friendly messages suitable for display
//! - Preserves full error context for logging

use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a display-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Location(e) => e.user_message(),
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to connect. Check your internet connection."
            }
            NetworkError::Timeout => "The request timed out. Please try again.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    NoConfigDir,

    #[error("Failed to access configuration file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NoConfigDir => "Could not locate a configuration directory.",
            ConfigError::Io { .. } => "Configuration file could not be read or written.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
        }
    }
}

/// Weather lookup errors.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("City name is empty")]
    EmptyCity,

    #[error("City not found: {0}")]
    CityNotFound(String),

    #[error("Weather endpoint {endpoint} returned status {status}")]
    Api { endpoint: String, status: u16 },

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Cache error: {0}")]
    Store(#[from] StoreError),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::EmptyCity => "Please enter a city name",
            WeatherError::CityNotFound(_) => "City not found",
            WeatherError::Api { status, .. } if *status >= 500 => {
                "Weather service unavailable. Please try again later."
            }
            WeatherError::Api { .. } => "Weather service error. Please try again.",
            WeatherError::Network(e) => e.user_message(),
            WeatherError::Parse(_) => "Received unexpected weather data. Please try again.",
            WeatherError::Store(_) => "Weather data may be outdated.",
        }
    }
}

/// Device position errors, one per platform error class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location unavailable")]
    PositionUnavailable,

    #[error("Location request timed out")]
    Timeout,

    #[error("Location error: {0}")]
    Unknown(String),
}

impl LocationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            LocationError::PermissionDenied => {
                "Location access denied. Please enable location services or search for a city."
            }
            LocationError::PositionUnavailable => {
                "Location information is unavailable. Please search for a city."
            }
            LocationError::Timeout => {
                "Location request timed out. Please try again or search for a city."
            }
            LocationError::Unknown(_) => "An unknown error occurred while getting your location.",
        }
    }
}

/// Local key/value store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O failed: {0}")]
    Io(String),

    #[error("Store encoding failed: {0}")]
    Encoding(String),
}

impl StoreError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StoreError::Io(_) => "Local cache could not be accessed.",
            StoreError::Encoding(_) => "Local cache data is invalid.",
        }
    }
}

/// Extension trait for converting reqwest transport errors to our error types.
///
/// Status codes and body decoding are handled by the callers, so only the
/// timeout/connection split matters here.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}
