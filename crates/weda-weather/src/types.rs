use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entries per day in the 3-hourly forecast series.
pub const FORECAST_SAMPLE_STRIDE: usize = 8;

/// Condition categories reported in the `main` field of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    Clouds,
    Rain,
    Snow,
    Thunderstorm,
    Other,
}

impl WeatherCondition {
    /// Case-insensitive lookup; anything unrecognized maps to `Other`
    pub fn from_main(main: &str) -> Self {
        match main.trim().to_ascii_lowercase().as_str() {
            "clear" => Self::Clear,
            "clouds" => Self::Clouds,
            "rain" => Self::Rain,
            "snow" => Self::Snow,
            "thunderstorm" => Self::Thunderstorm,
            _ => Self::Other,
        }
    }

    /// Icon name; unrecognized conditions share the clear-sky icon
    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Clear | Self::Other => "cloud_sun",
            Self::Clouds => "cloud_moon",
            Self::Rain => "cloud_rain",
            Self::Snow => "cloud_snow",
            Self::Thunderstorm => "cloud_lightning",
        }
    }
}

/// One entry of the `weather` array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub main: String,
    #[serde(default)]
    pub description: String,
}

impl Condition {
    pub fn category(&self) -> WeatherCondition {
        WeatherCondition::from_main(&self.main)
    }
}

/// Temperatures in °C, humidity in %, pressure in hPa
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Readings {
    #[serde(default)]
    pub temp: f64,
    #[serde(default)]
    pub temp_min: f64,
    #[serde(default)]
    pub temp_max: f64,
    #[serde(default)]
    pub humidity: f64,
    #[serde(default)]
    pub pressure: f64,
}

/// Wind speed in m/s
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    #[serde(default)]
    pub speed: f64,
}

/// Sunrise and sunset as epoch seconds. Zero means the payload carried none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SunTimes {
    #[serde(default)]
    pub sunrise: i64,
    #[serde(default)]
    pub sunset: i64,
}

/// Current conditions for one place
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub weather: Vec<Condition>,
    #[serde(default)]
    pub main: Readings,
    #[serde(default)]
    pub wind: Wind,
    #[serde(default)]
    pub sys: SunTimes,
}

impl WeatherSnapshot {
    pub fn primary_condition(&self) -> Option<&Condition> {
        self.weather.first()
    }

    pub fn sunrise(&self) -> Option<DateTime<Utc>> {
        epoch_time(self.sys.sunrise)
    }

    pub fn sunset(&self) -> Option<DateTime<Utc>> {
        epoch_time(self.sys.sunset)
    }
}

fn epoch_time(secs: i64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}

/// One 3-hour step of the forecast series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastItem {
    #[serde(default)]
    pub dt: i64,
    #[serde(default)]
    pub main: Readings,
    #[serde(default)]
    pub weather: Vec<Condition>,
    #[serde(default)]
    pub wind: Wind,
}

impl ForecastItem {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.dt, 0)
    }

    pub fn primary_condition(&self) -> Option<&Condition> {
        self.weather.first()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastCity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country: String,
}

/// Ordered 3-hourly forecast series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastSnapshot {
    #[serde(default)]
    pub list: Vec<ForecastItem>,
    #[serde(default)]
    pub city: Option<ForecastCity>,
}

impl ForecastSnapshot {
    /// One entry per day, approximated by taking every 8th step.
    ///
    /// Assumes the upstream series has no gaps; timestamps are not checked.
    pub fn daily(&self) -> Vec<&ForecastItem> {
        self.list.iter().step_by(FORECAST_SAMPLE_STRIDE).collect()
    }
}

/// Air quality severity categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AqiLevel {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiLevel {
    pub fn from_aqi(aqi: i32) -> Self {
        match aqi {
            i32::MIN..=50 => Self::Good,
            51..=100 => Self::Moderate,
            101..=150 => Self::UnhealthyForSensitiveGroups,
            151..=200 => Self::Unhealthy,
            201..=300 => Self::VeryUnhealthy,
            _ => Self::Hazardous,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            Self::Unhealthy => "Unhealthy",
            Self::VeryUnhealthy => "Very Unhealthy",
            Self::Hazardous => "Hazardous",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirQualitySnapshot {
    pub aqi: i32,
}

impl AirQualitySnapshot {
    pub fn level(&self) -> AqiLevel {
        AqiLevel::from_aqi(self.aqi)
    }
}

/// Everything fetched for one lookup; this is what gets cached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherBundle {
    pub weather: WeatherSnapshot,
    #[serde(default)]
    pub forecast: Option<ForecastSnapshot>,
    #[serde(default)]
    pub air_quality: Option<AirQualitySnapshot>,
}

/// Geographic position reported by a position provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
}
