//! Weda - weather lookup dashboard for the terminal.

mod render;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use weda_core::{AppError, Config, TemperatureUnit};
use weda_weather::{
    ChainedPosition, JsonFileStore, KeyValueStore, MemoryStore, TimeBoundedCache, WeatherClient,
    WeatherDashboard,
};

/// Weather lookup dashboard
#[derive(Parser, Debug)]
#[command(name = "weda")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/weda/config.toml)
    #[arg(short, long, env = "WEDA_CONFIG")]
    config: Option<PathBuf>,

    /// Weather backend base URL (overrides config)
    #[arg(long, env = "WEDA_API_URL")]
    api_url: Option<String>,

    /// Show temperatures in Celsius
    #[arg(long, conflicts_with = "fahrenheit")]
    celsius: bool,

    /// Show temperatures in Fahrenheit
    #[arg(long)]
    fahrenheit: bool,

    /// Keep the cache in memory instead of the cache file
    #[arg(long)]
    no_cache_file: bool,

    /// Skip the air-quality section
    #[arg(long)]
    no_air_quality: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show weather for a city
    Search {
        /// City name (e.g., "San Francisco")
        #[arg(required = true, num_args = 1..)]
        city: Vec<String>,
    },

    /// Show weather for the current location
    Here,

    /// Drop a cached lookup (the current-location entry when no city is given)
    Clear {
        /// City name
        city: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = weda_core::init() {
        eprintln!("{}", e);
    }

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the lookup finished without a user-facing error
async fn run(cli: Cli) -> Result<bool, AppError> {
    let (mut config, _) = Config::load_validated(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);

    let mut dashboard = build_dashboard(&config, cli.no_cache_file)?;

    match cli.command {
        Commands::Search { city } => {
            dashboard.search_city(&city.join(" ")).await;
        }
        Commands::Here => {
            dashboard.initialize().await;
        }
        Commands::Clear { city } => {
            if city.is_empty() {
                dashboard.clear_location()?;
                println!("Cleared cached weather for current location");
            } else {
                let city = city.join(" ");
                dashboard.clear_city(&city)?;
                println!("Cleared cached weather for {}", city.trim());
            }
            return Ok(true);
        }
    }

    print!("{}", render::render(dashboard.state()));
    Ok(dashboard.state().error.is_none())
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(url) = &cli.api_url {
        config.api.base_url = url.clone();
    }
    if cli.celsius {
        config.weather.temperature_unit = TemperatureUnit::Celsius;
    } else if cli.fahrenheit {
        config.weather.temperature_unit = TemperatureUnit::Fahrenheit;
    }
    if cli.no_air_quality {
        config.weather.air_quality = false;
    }
}

fn build_dashboard(config: &Config, in_memory: bool) -> Result<WeatherDashboard, AppError> {
    let store: Arc<dyn KeyValueStore> = if in_memory {
        Arc::new(MemoryStore::new())
    } else {
        let path = config.cache_path();
        tracing::debug!("Using cache file {}", path.display());
        Arc::new(JsonFileStore::new(path))
    };

    let cache = TimeBoundedCache::new(store).with_ttl(config.cache_ttl_ms());
    let client = WeatherClient::from_config(&config.api)?;
    let position = ChainedPosition::from_config(&config.location)?;

    Ok(WeatherDashboard::new(client, cache)
        .with_air_quality(config.weather.air_quality)
        .with_unit(config.weather.temperature_unit)
        .with_position_provider(Arc::new(position)))
}
