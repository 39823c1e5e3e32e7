use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    /// Lookup key; missing or blank means the configured default place.
    pub country: Option<String>,
}
