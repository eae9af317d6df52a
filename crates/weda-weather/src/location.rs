//! Device position capability.
//!
//! Providers are injected into the dashboard so the position flow can be
//! driven by configured coordinates, an IP lookup, or a test double.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::types::Position;
use weda_core::{LocationConfig, LocationError};

/// Single-shot request options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest previously obtained position that may be reused; zero disables reuse
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(5),
            maximum_age: Duration::ZERO,
        }
    }
}

#[async_trait]
pub trait PositionProvider: Send + Sync {
    async fn current_position(&self, options: &PositionOptions)
        -> Result<Position, LocationError>;
}

/// Position taken from configuration
#[derive(Debug, Clone, Default)]
pub struct FixedPosition {
    position: Option<Position>,
}

impl FixedPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            position: Some(Position {
                latitude,
                longitude,
                accuracy_meters: None,
            }),
        }
    }

    /// Provider that never has a position
    pub fn unset() -> Self {
        Self { position: None }
    }
}

#[async_trait]
impl PositionProvider for FixedPosition {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Position, LocationError> {
        self.position.ok_or(LocationError::PositionUnavailable)
    }
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

/// Approximate position from an IP geolocation service.
///
/// Accuracy is city-level regardless of `high_accuracy`. Positions are never
/// reused between calls.
#[derive(Debug, Clone)]
pub struct IpLocator {
    client: Client,
    url: String,
    enabled: bool,
}

impl IpLocator {
    pub fn new(url: &str) -> Result<Self, LocationError> {
        let client = Client::builder()
            .user_agent(concat!("weda/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LocationError::Unknown(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            enabled: true,
        })
    }

    /// Locator that refuses every request, as when the user has opted out
    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            url: String::new(),
            enabled: false,
        }
    }
}

#[async_trait]
impl PositionProvider for IpLocator {
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Position, LocationError> {
        if !self.enabled {
            return Err(LocationError::PermissionDenied);
        }

        let request = self.client.get(&self.url).timeout(options.timeout).send();
        let response = match tokio::time::timeout(options.timeout, request).await {
            Err(_) => return Err(LocationError::Timeout),
            Ok(Err(e)) if e.is_timeout() => return Err(LocationError::Timeout),
            Ok(Err(e)) => {
                tracing::debug!("IP lookup request failed: {}", e);
                return Err(LocationError::PositionUnavailable);
            }
            Ok(Ok(response)) => response,
        };

        if !response.status().is_success() {
            tracing::debug!("IP lookup returned status {}", response.status());
            return Err(LocationError::PositionUnavailable);
        }

        // The per-request timeout keeps running while the body is read
        let body: IpLookupResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LocationError::Timeout
            } else {
                LocationError::Unknown(e.to_string())
            }
        })?;

        if body.status.as_deref() == Some("fail") {
            tracing::debug!(
                "IP lookup failed: {}",
                body.message.as_deref().unwrap_or("no reason given")
            );
            return Err(LocationError::PositionUnavailable);
        }

        match (body.lat, body.lon) {
            (Some(latitude), Some(longitude)) => {
                tracing::info!("Located via IP lookup: {:.2}, {:.2}", latitude, longitude);
                Ok(Position {
                    latitude,
                    longitude,
                    accuracy_meters: None,
                })
            }
            _ => Err(LocationError::PositionUnavailable),
        }
    }
}

/// Tries each provider in order; the last error wins when all fail
#[derive(Clone, Default)]
pub struct ChainedPosition {
    providers: Vec<Arc<dyn PositionProvider>>,
}

impl ChainedPosition {
    pub fn new(providers: Vec<Arc<dyn PositionProvider>>) -> Self {
        Self { providers }
    }

    /// Configured coordinates first, then IP lookup when allowed
    pub fn from_config(config: &LocationConfig) -> Result<Self, LocationError> {
        let fixed = match config.coordinates() {
            Some((latitude, longitude)) => FixedPosition::new(latitude, longitude),
            None => FixedPosition::unset(),
        };
        let ip = if config.ip_lookup {
            IpLocator::new(&config.ip_lookup_url)?
        } else {
            IpLocator::disabled()
        };

        Ok(Self::new(vec![Arc::new(fixed), Arc::new(ip)]))
    }
}

#[async_trait]
impl PositionProvider for ChainedPosition {
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Position, LocationError> {
        let mut last_error = LocationError::PositionUnavailable;
        for provider in &self.providers {
            match provider.current_position(options).await {
                Ok(position) => return Ok(position),
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }
}
