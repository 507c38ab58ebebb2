//! Physical constants shared by the energy-balance stages

/// Stefan-Boltzmann constant [W m-2 K-4]
pub const STEFAN_BOLTZMANN: f64 = 5.67e-8;

/// Solar constant [W m-2]
pub const SOLAR_CONSTANT: f64 = 1367.0;

/// Solar constant [MJ m-2 h-1]
pub const SOLAR_CONSTANT_HOURLY_MJ: f64 = 4.92;

/// MJ m-2 h-1 to W m-2
pub const MJ_HOURLY_TO_WATTS: f64 = 11.574;

/// von Karman constant
pub const VON_KARMAN: f64 = 0.41;

/// Specific heat of air at constant pressure [J kg-1 K-1]
pub const AIR_SPECIFIC_HEAT: f64 = 1004.0;

/// Gravitational acceleration [m s-2]
pub const GRAVITY: f64 = 9.81;

/// Specific gas constant of dry air [J kg-1 K-1]
pub const DRY_AIR_GAS_CONSTANT: f64 = 287.0;

/// Ratio of molecular weights of water vapour and dry air
pub const EPSILON_WATER_AIR: f64 = 0.622;

/// Environmental lapse rate [K m-1]
pub const LAPSE_RATE: f64 = 0.0065;

/// Kelvin offset of 0 degC
pub const KELVIN_OFFSET: f64 = 273.15;

/// Seconds per day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Soil brightness correction factor for SAVI
pub const SAVI_L: f64 = 0.5;

/// Maximum leaf area index produced by the SAVI regression
pub const LAI_MAX: f64 = 6.0;
