//! Weather and terrain inputs resampled onto the scene grid

pub mod dem;
pub mod meteorology;

pub use dem::Terrain;
pub use meteorology::{HourlyRadiation, InMemoryWeather, ReanalysisSnapshot, WeatherContext, WeatherProvider};
