//! Weather sample generation and serialization.
//!
//! Produces fake weather readings with every field drawn independently from a
//! uniform distribution, and renders them as the JSON documents published to
//! the hub.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Temperature bounds in degrees Celsius.
pub const TEMPERATURE_RANGE: (f64, f64) = (15.0, 30.0);

/// Relative humidity bounds in percent.
pub const HUMIDITY_RANGE: (u8, u8) = (40, 80);

/// Wind speed bounds in km/h.
pub const WIND_SPEED_RANGE: (u8, u8) = (5, 25);

/// Precipitation bounds in millimetres.
pub const PRECIPITATION_RANGE: (f64, f64) = (0.0, 5.0);

/// Compass direction the wind blows from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindDirection {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "NE")]
    NorthEast,
    #[serde(rename = "E")]
    East,
    #[serde(rename = "SE")]
    SouthEast,
    #[serde(rename = "S")]
    South,
    #[serde(rename = "SW")]
    SouthWest,
    #[serde(rename = "W")]
    West,
    #[serde(rename = "NW")]
    NorthWest,
}

impl WindDirection {
    /// Get all compass directions.
    pub fn all() -> &'static [WindDirection] {
        &[
            WindDirection::North,
            WindDirection::NorthEast,
            WindDirection::East,
            WindDirection::SouthEast,
            WindDirection::South,
            WindDirection::SouthWest,
            WindDirection::West,
            WindDirection::NorthWest,
        ]
    }

    /// Abbreviation used on the wire.
    pub fn abbreviation(&self) -> &'static str {
        match self {
            WindDirection::North => "N",
            WindDirection::NorthEast => "NE",
            WindDirection::East => "E",
            WindDirection::SouthEast => "SE",
            WindDirection::South => "S",
            WindDirection::SouthWest => "SW",
            WindDirection::West => "W",
            WindDirection::NorthWest => "NW",
        }
    }
}

impl std::fmt::Display for WindDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// General sky conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Conditions {
    Sunny,
    #[serde(rename = "Partly Cloudy")]
    PartlyCloudy,
    Cloudy,
    Rainy,
    Stormy,
}

impl Conditions {
    /// Get all possible conditions.
    pub fn all() -> &'static [Conditions] {
        &[
            Conditions::Sunny,
            Conditions::PartlyCloudy,
            Conditions::Cloudy,
            Conditions::Rainy,
            Conditions::Stormy,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Conditions::Sunny => "Sunny",
            Conditions::PartlyCloudy => "Partly Cloudy",
            Conditions::Cloudy => "Cloudy",
            Conditions::Rainy => "Rainy",
            Conditions::Stormy => "Stormy",
        }
    }
}

impl std::fmt::Display for Conditions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single fake weather reading.
///
/// Field names serialize in camelCase (`windSpeed`, `windDirection`), which is
/// the schema downstream consumers of the hub expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSample {
    /// Degrees Celsius, two decimal places
    pub temperature: f64,

    /// Percent
    pub humidity: u8,

    /// km/h
    pub wind_speed: u8,

    pub wind_direction: WindDirection,

    /// Millimetres, one decimal place
    pub precipitation: f64,

    pub conditions: Conditions,
}

/// Generate a sample with fresh, unseeded randomness.
pub fn generate_sample() -> WeatherSample {
    generate_sample_with(&mut rand::thread_rng())
}

/// Generate a sample from the given RNG.
pub fn generate_sample_with<R: Rng>(rng: &mut R) -> WeatherSample {
    let directions = WindDirection::all();
    let conditions = Conditions::all();

    WeatherSample {
        temperature: round_to(
            rng.gen_range(TEMPERATURE_RANGE.0..=TEMPERATURE_RANGE.1),
            2,
        ),
        humidity: rng.gen_range(HUMIDITY_RANGE.0..=HUMIDITY_RANGE.1),
        wind_speed: rng.gen_range(WIND_SPEED_RANGE.0..=WIND_SPEED_RANGE.1),
        wind_direction: directions[rng.gen_range(0..directions.len())],
        precipitation: round_to(
            rng.gen_range(PRECIPITATION_RANGE.0..=PRECIPITATION_RANGE.1),
            1,
        ),
        conditions: conditions[rng.gen_range(0..conditions.len())],
    }
}

/// Serialize a sample to compact JSON.
pub fn to_json(sample: &WeatherSample) -> Result<String, serde_json::Error> {
    serde_json::to_string(sample)
}

/// Parse a sample back from JSON.
pub fn from_json(json: &str) -> Result<WeatherSample, serde_json::Error> {
    serde_json::from_str(json)
}

// Round half away from zero to the given number of decimal places.
fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
