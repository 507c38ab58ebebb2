use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coordinate system of a raster grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoordinateSystem {
    /// Geographic coordinates (longitude, latitude) in degrees
    Geographic,
    /// Projected coordinates (e.g., UTM)
    Projected { epsg: u32 },
}

/// Geospatial transformation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Map coordinates of the centre of pixel (row, col)
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let c = col as f64 + 0.5;
        let r = row as f64 + 0.5;
        let x = self.top_left_x + c * self.pixel_width + r * self.rotation_x;
        let y = self.top_left_y + c * self.rotation_y + r * self.pixel_height;
        (x, y)
    }

    /// Pixel (row, col) containing the map coordinate, ignoring rotation terms
    pub fn pixel_of(&self, x: f64, y: f64) -> Option<(isize, isize)> {
        if self.pixel_width == 0.0 || self.pixel_height == 0.0 {
            return None;
        }
        let col = ((x - self.top_left_x) / self.pixel_width).floor();
        let row = ((y - self.top_left_y) / self.pixel_height).floor();
        if !col.is_finite() || !row.is_finite() {
            return None;
        }
        Some((row as isize, col as isize))
    }
}

/// Fixed geographic grid shared by every band of a scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub crs: CoordinateSystem,
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
}

impl GridSpec {
    pub fn new(crs: CoordinateSystem, transform: GeoTransform, rows: usize, cols: usize) -> Self {
        Self { crs, transform, rows, cols }
    }

    /// Geographic grid with square pixels of `pixel_deg` degrees anchored at (lon, lat)
    pub fn geographic(top_left_lon: f64, top_left_lat: f64, pixel_deg: f64, rows: usize, cols: usize) -> Self {
        Self::new(
            CoordinateSystem::Geographic,
            GeoTransform {
                top_left_x: top_left_lon,
                pixel_width: pixel_deg,
                rotation_x: 0.0,
                top_left_y: top_left_lat,
                rotation_y: 0.0,
                pixel_height: -pixel_deg,
            },
            rows,
            cols,
        )
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Landsat sensor family, selects albedo coefficients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sensor {
    Landsat5,
    Landsat7,
    Landsat8,
    Landsat9,
}

impl std::fmt::Display for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sensor::Landsat5 => write!(f, "LANDSAT_5"),
            Sensor::Landsat7 => write!(f, "LANDSAT_7"),
            Sensor::Landsat8 => write!(f, "LANDSAT_8"),
            Sensor::Landsat9 => write!(f, "LANDSAT_9"),
        }
    }
}

/// Every named band the pipeline reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Band {
    // Surface reflectance and thermal inputs
    UltraBlue,
    Blue,
    Green,
    Red,
    Nir,
    Swir1,
    Swir2,
    /// Brightness temperature [K]
    BrightnessTemperature,
    Albedo,

    // Terrain
    Elevation,
    Slope,
    Aspect,
    Latitude,
    Longitude,

    // Instantaneous and daily weather
    AirTemperature,
    WindSpeed,
    RelativeHumidity,
    NetRadiation24h,
    ShortwaveDown24h,

    // Spectral indices
    Ndvi,
    Savi,
    Evi,
    Ndwi,
    Lai,
    EmissivityNarrowband,
    EmissivityBroadband,
    /// Land surface temperature before terrain correction [K]
    Lst,
    /// Terrain-corrected land surface temperature [K]
    LstDem,

    // Radiation balance
    Transmissivity,
    LongwaveUp,
    ShortwaveDown,
    LongwaveDown,
    NetRadiation,
    SoilHeatFlux,

    // Sensible heat
    FrictionVelocity,
    AerodynamicResistance,
    NeutralAerodynamicResistance,
    TemperatureDifference,
    SensibleHeatFlux,

    // Evapotranspiration
    LatentHeatFlux,
    EvaporativeFraction,
    EtInstantaneous,
    Et24h,

    // Precipitation
    LastRain,
    CumulativePrecipitation,

    // Date components
    Year,
    Month,
    Day,
}

impl Band {
    /// Band name as written to output products
    pub fn name(&self) -> &'static str {
        match self {
            Band::UltraBlue => "UB",
            Band::Blue => "B",
            Band::Green => "GR",
            Band::Red => "R",
            Band::Nir => "NIR",
            Band::Swir1 => "SWIR_1",
            Band::Swir2 => "SWIR_2",
            Band::BrightnessTemperature => "BRT",
            Band::Albedo => "ALFA",
            Band::Elevation => "elevation",
            Band::Slope => "slope",
            Band::Aspect => "aspect",
            Band::Latitude => "latitude",
            Band::Longitude => "longitude",
            Band::AirTemperature => "AirT_G",
            Band::WindSpeed => "ux_G",
            Band::RelativeHumidity => "RH_G",
            Band::NetRadiation24h => "Rn24h_G",
            Band::ShortwaveDown24h => "SW_Down",
            Band::Ndvi => "NDVI",
            Band::Savi => "SAVI",
            Band::Evi => "EVI",
            Band::Ndwi => "NDWI",
            Band::Lai => "LAI",
            Band::EmissivityNarrowband => "e_NB",
            Band::EmissivityBroadband => "e_0",
            Band::Lst => "T_LST",
            Band::LstDem => "LandT_G",
            Band::Transmissivity => "tao_sw",
            Band::LongwaveUp => "Rl_up",
            Band::ShortwaveDown => "Rs_down",
            Band::LongwaveDown => "Rl_down",
            Band::NetRadiation => "Rn",
            Band::SoilHeatFlux => "G",
            Band::FrictionVelocity => "u_fr",
            Band::AerodynamicResistance => "rah",
            Band::NeutralAerodynamicResistance => "rah_first",
            Band::TemperatureDifference => "dT",
            Band::SensibleHeatFlux => "H",
            Band::LatentHeatFlux => "LE",
            Band::EvaporativeFraction => "EF",
            Band::EtInstantaneous => "ET_inst",
            Band::Et24h => "ET_24h",
            Band::LastRain => "last_rain",
            Band::CumulativePrecipitation => "sum_precip_priorX",
            Band::Year => "yyyy",
            Band::Month => "mm",
            Band::Day => "dd",
        }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Which calibration extreme an endmember represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndmemberKind {
    /// Wet, fully transpiring vegetation
    Cold,
    /// Dry bare soil
    Hot,
}

impl std::fmt::Display for EndmemberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndmemberKind::Cold => write!(f, "cold"),
            EndmemberKind::Hot => write!(f, "hot"),
        }
    }
}

/// Scene-level failure category, stable across error message changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    MissingWeatherData,
    EndmemberSearchFailed,
    DegenerateCalibration,
    InvalidInput,
    Internal,
}

/// Error types for energy-balance processing
#[derive(Debug, thiserror::Error)]
pub enum EtError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No bracketing reanalysis snapshot for {timestamp}: {reason}")]
    MissingWeatherData {
        timestamp: DateTime<Utc>,
        reason: String,
    },

    #[error("No qualifying {kind} pixel after trying NDVI percentiles {percentiles:?}")]
    EndmemberSearchFailed {
        kind: EndmemberKind,
        percentiles: Vec<f64>,
    },

    #[error("Degenerate calibration: {0}")]
    DegenerateCalibration(String),

    #[error("Band {0} is not available")]
    MissingBand(Band),

    #[error("Grid mismatch: expected {expected:?}, found {found:?}")]
    GridMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

impl EtError {
    pub fn kind(&self) -> FailureKind {
        match self {
            EtError::MissingWeatherData { .. } => FailureKind::MissingWeatherData,
            EtError::EndmemberSearchFailed { .. } => FailureKind::EndmemberSearchFailed,
            EtError::DegenerateCalibration(_) => FailureKind::DegenerateCalibration,
            EtError::MissingBand(_)
            | EtError::GridMismatch { .. }
            | EtError::InvalidInput(_)
            | EtError::InvalidConfig(_) => FailureKind::InvalidInput,
            EtError::Io(_) | EtError::Json(_) | EtError::Processing(_) => FailureKind::Internal,
        }
    }
}

/// Result type for energy-balance operations
pub type EtResult<T> = Result<T, EtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_center_and_back() {
        let grid = GridSpec::geographic(-121.8, 38.54, 0.001, 10, 20);
        let (x, y) = grid.transform.pixel_center(3, 7);
        assert!((x - (-121.8 + 7.5 * 0.001)).abs() < 1e-12);
        assert!((y - (38.54 - 3.5 * 0.001)).abs() < 1e-12);
        assert_eq!(grid.transform.pixel_of(x, y), Some((3, 7)));
    }

    #[test]
    fn test_error_kinds() {
        let err = EtError::EndmemberSearchFailed {
            kind: EndmemberKind::Hot,
            percentiles: vec![10.0, 20.0],
        };
        assert_eq!(err.kind(), FailureKind::EndmemberSearchFailed);
        assert!(err.to_string().contains("hot"));
        assert_eq!(EtError::MissingBand(Band::Ndvi).kind(), FailureKind::InvalidInput);
    }
}
