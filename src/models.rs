//! Current-weather record returned to callers.
//!
//! Mirrors the OpenWeatherMap "current weather" payload closely enough that
//! upstream bodies decode straight into it. Every field falls back to its
//! default when the upstream omits it, so partial payloads still decode.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Weather facts for one location at one observation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct WeatherRecord {
    /// Location coordinates
    pub coord: Coord,
    /// Weather conditions (usually a single entry)
    pub weather: Vec<Condition>,
    /// Temperature, pressure and humidity
    pub main: MainMeasures,
    /// Visibility in metres
    pub visibility: i32,
    pub wind: Wind,
    pub clouds: Clouds,
    /// Observation time (unix seconds, UTC)
    pub dt: i64,
    pub sys: Sys,
    /// Shift in seconds from UTC
    pub timezone: i32,
    /// Upstream city id
    pub id: i64,
    /// Location name as reported by the upstream
    pub name: String,
    /// Upstream status code echoed in the body
    pub cod: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

/// One weather condition, e.g. `{ "main": "Rain", "description": "light rain" }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Condition {
    pub id: i32,
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct MainMeasures {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    /// Atmospheric pressure in hPa
    pub pressure: i32,
    /// Relative humidity percentage
    pub humidity: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Wind {
    pub speed: f64,
    /// Direction in degrees (meteorological)
    pub deg: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Clouds {
    /// Cloud cover percentage
    pub all: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Sys {
    #[serde(rename = "type")]
    pub kind: i32,
    pub id: i64,
    pub country: String,
    /// Sunrise (unix seconds, UTC)
    pub sunrise: i64,
    /// Sunset (unix seconds, UTC)
    pub sunset: i64,
}
