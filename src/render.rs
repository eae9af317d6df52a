//! Plain-text rendering of the dashboard state.

use std::fmt::Write;

use chrono::{DateTime, Local, Utc};
use weda_weather::{DashboardState, DataSource, WeatherCondition};

/// Forecast days shown
const FORECAST_DAYS: usize = 5;

pub fn render(state: &DashboardState) -> String {
    let mut out = String::new();

    if let Some(error) = &state.error {
        let _ = writeln!(out, "{}", error);
        return out;
    }

    let Some(weather) = &state.weather else {
        let _ = writeln!(out, "Welcome to Weather Dashboard");
        let _ = writeln!(out, "Enter a city name to get weather information");
        return out;
    };

    let unit = state.unit.symbol();
    // Adding 0.0 turns a rounded -0 into 0
    let temp = |celsius: f64| state.display_temp(celsius).round() + 0.0;

    let (description, condition) = weather
        .primary_condition()
        .map(|c| (c.description.as_str(), c.category()))
        .unwrap_or(("", WeatherCondition::Other));

    let _ = writeln!(out, "{}", weather.name);
    let _ = writeln!(out, "{} [{}]", description, condition.icon_name());
    let _ = writeln!(
        out,
        "Temperature: {}{}  High: {}{}  Low: {}{}",
        temp(weather.main.temp),
        unit,
        temp(weather.main.temp_max),
        unit,
        temp(weather.main.temp_min),
        unit,
    );
    let _ = writeln!(
        out,
        "Wind: {} m/s  Humidity: {}%  Pressure: {} hPa",
        weather.wind.speed, weather.main.humidity, weather.main.pressure
    );
    let _ = writeln!(
        out,
        "Sunrise: {}  Sunset: {}",
        local_time(weather.sunrise()),
        local_time(weather.sunset())
    );

    if let Some(forecast) = &state.forecast {
        let _ = writeln!(out);
        let _ = writeln!(out, "5-Day Forecast");
        for day in forecast.daily().into_iter().take(FORECAST_DAYS) {
            let weekday = day
                .time()
                .map(|t| t.with_timezone(&Local).format("%a").to_string())
                .unwrap_or_default();
            let description = day
                .primary_condition()
                .map(|c| c.description.as_str())
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "  {:<4}{:>5}{}  {}",
                weekday,
                temp(day.main.temp),
                unit,
                description
            );
        }
    }

    if let Some(air) = &state.air_quality {
        let _ = writeln!(out);
        let _ = writeln!(out, "Air Quality: {} ({})", air.aqi, air.level().label());
    }

    if state.source == Some(DataSource::Cache) {
        let _ = writeln!(out);
        let _ = writeln!(out, "(cached)");
    }

    out
}

fn local_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}
