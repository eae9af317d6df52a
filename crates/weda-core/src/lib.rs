pub mod config;
pub mod error;

pub use config::{
    ApiConfig, CacheConfig, Config, LocationConfig, TemperatureUnit, ValidationResult,
    WeatherConfig,
};
pub use error::{
    AppError, ConfigError, LocationError, NetworkError, ReqwestErrorExt, StoreError, WeatherError,
};

use anyhow::Result;

/// Initialize logging for the application.
///
/// Honors `RUST_LOG`; defaults to `info`. Output goes to stderr so rendered
/// weather on stdout stays clean.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::debug!("Weda core initialized");
    Ok(())
}
