use serde::{Deserialize, Serialize};

/// Timeline response from the weather provider, reduced to the fields the
/// gateway serves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Weather {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "resolvedAddress")]
    pub resolved_address: String,
    pub timezone: String,
    #[serde(default)]
    pub description: String,
    pub days: Vec<Day>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Day {
    pub datetime: String,
    pub temp: f64,
    #[serde(rename = "feelslike")]
    pub feels_like: f64,
    #[serde(rename = "windspeed")]
    pub wind_speed: f64,
    pub visibility: f64,
    #[serde(rename = "uvindex")]
    pub uv_index: f64,
    pub sunrise: String,
    pub sunset: String,
    pub icon: String,
    pub description: String,
}
