//! sebal-et: Surface Energy Balance (SEBAL) evapotranspiration retrieval
//!
//! Per scene, reflectance and thermal bands are turned into spectral indices,
//! a radiation balance and soil heat flux. Cold and hot calibration pixels are
//! then selected automatically, sensible heat is solved with stability
//! corrections, and daily evapotranspiration is derived together with
//! precipitation history bands.

pub mod config;
pub mod constants;
pub mod core;
pub mod io;
pub mod raster;
pub mod types;

#[cfg(feature = "python")]
mod python;

// Re-export main types
pub use config::SebalConfig;
pub use core::{
    DailyPrecipitationSeries, Endmember, EndmemberSelector, EndmemberStatus, PrecipitationAggregator,
    PrecipitationProvider, SceneFailure, SceneImage, SceneInput, SceneProduct, SceneRecord, SebalModel,
    SensibleHeatSolver,
};
pub use io::{InMemoryWeather, Terrain, WeatherContext, WeatherProvider};
pub use raster::{BandSet, Geometry, Mask, Raster, Reducer};
pub use types::{Band, EndmemberKind, EtError, EtResult, FailureKind, GridSpec, Sensor};
