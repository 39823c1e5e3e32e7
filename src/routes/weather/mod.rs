mod handler;
mod model;

pub use handler::{get_weather, index};
pub use model::WeatherQuery;
