//! Solar geometry and clear-sky atmosphere relations

use crate::constants::{DRY_AIR_GAS_CONSTANT, KELVIN_OFFSET};
use crate::types::{EtError, EtResult};
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::f64::consts::PI;

/// Sun position for one acquisition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarGeometry {
    pub acquired: DateTime<Utc>,
    /// Sun elevation above the horizon [deg]
    pub sun_elevation_deg: f64,
}

impl SolarGeometry {
    pub fn new(acquired: DateTime<Utc>, sun_elevation_deg: f64) -> EtResult<Self> {
        if !(sun_elevation_deg > 0.0 && sun_elevation_deg <= 90.0) {
            return Err(EtError::InvalidInput(format!(
                "sun elevation {} deg is not above the horizon",
                sun_elevation_deg
            )));
        }
        Ok(Self {
            acquired,
            sun_elevation_deg,
        })
    }

    pub fn day_of_year(&self) -> u32 {
        self.acquired.ordinal()
    }

    /// Cosine of the solar zenith angle over a horizontal surface
    pub fn cos_zenith(&self) -> f64 {
        (90.0 - self.sun_elevation_deg).to_radians().cos()
    }

    pub fn inverse_relative_distance(&self) -> f64 {
        inverse_relative_distance(self.day_of_year())
    }

    /// Solar declination [rad] (Cooper 1969)
    pub fn declination(&self) -> f64 {
        let b = (360.0 / 365.0 * (self.day_of_year() as f64 - 81.0)).to_radians();
        (23.45f64.to_radians().sin() * b.sin()).asin()
    }

    /// Equation of time [min]
    pub fn equation_of_time(&self) -> f64 {
        let b = (360.0 / 365.0 * (self.day_of_year() as f64 - 81.0)).to_radians();
        9.87 * (2.0 * b).sin() - 7.53 * b.cos() - 1.5 * b.sin()
    }

    /// Solar hour angle [rad] at a longitude, negative before solar noon
    pub fn hour_angle(&self, longitude_deg: f64) -> f64 {
        let utc_hours = self.acquired.hour() as f64
            + self.acquired.minute() as f64 / 60.0
            + self.acquired.second() as f64 / 3600.0;
        let solar_time = utc_hours + longitude_deg / 15.0 + self.equation_of_time() / 60.0;
        (15.0 * (solar_time - 12.0)).to_radians()
    }

    /// Cosine of the solar incidence angle on a sloping surface (Allen et al. 2006).
    ///
    /// `aspect_deg` is the downslope azimuth clockwise from north.
    pub fn cos_incidence(&self, latitude_deg: f64, longitude_deg: f64, slope_deg: f64, aspect_deg: f64) -> f64 {
        let delta = self.declination();
        let phi = latitude_deg.to_radians();
        let s = slope_deg.to_radians();
        let gamma = (aspect_deg - 180.0).to_radians();
        let omega = self.hour_angle(longitude_deg);

        let a = delta.sin() * phi.cos() * s.sin() * gamma.cos() - delta.sin() * phi.sin() * s.cos();
        let b = delta.cos() * phi.cos() * s.cos() + delta.cos() * phi.sin() * s.sin() * gamma.cos();
        let c = delta.cos() * s.sin() * gamma.sin();

        -a + b * omega.cos() + c * omega.sin()
    }
}

/// Inverse relative Earth-Sun distance (Allen et al. 1998)
pub fn inverse_relative_distance(day_of_year: u32) -> f64 {
    1.0 + 0.033 * (2.0 * PI * day_of_year as f64 / 365.0).cos()
}

/// Solar declination [rad] (ASCE 2005)
pub fn declination_asce(day_of_year: u32) -> f64 {
    0.409 * (2.0 * PI * day_of_year as f64 / 365.0 - 1.39).sin()
}

/// Atmospheric pressure from elevation [kPa]
pub fn pressure_from_elevation(elevation_m: f64) -> f64 {
    101.3 * ((293.0 - 0.0065 * elevation_m) / 293.0).powf(5.26)
}

/// Saturation vapour pressure [kPa] at air temperature [degC]
pub fn saturation_vapor_pressure(t_air_c: f64) -> f64 {
    0.6108 * (17.27 * t_air_c / (t_air_c + 237.3)).exp()
}

/// Precipitable water in the atmosphere [mm] (Garrison and Adler 1990)
pub fn precipitable_water(actual_vapor_pressure_kpa: f64, pressure_kpa: f64) -> f64 {
    0.14 * actual_vapor_pressure_kpa * pressure_kpa + 2.1
}

/// Broadband clear-sky transmissivity (Allen et al. 2007)
pub fn transmissivity(pressure_kpa: f64, precipitable_water_mm: f64, cos_zenith: f64) -> f64 {
    0.35 + 0.627
        * (-0.00146 * pressure_kpa / cos_zenith - 0.075 * (precipitable_water_mm / cos_zenith).powf(0.4)).exp()
}

/// Transmissivity from elevation, air temperature [degC] and relative humidity [%]
pub fn transmissivity_at(elevation_m: f64, t_air_c: f64, rh_percent: f64, cos_zenith: f64) -> f64 {
    let p = pressure_from_elevation(elevation_m);
    let ea = saturation_vapor_pressure(t_air_c) * rh_percent / 100.0;
    let w = precipitable_water(ea, p);
    transmissivity(p, w, cos_zenith)
}

/// Moist air density [kg m-3] from pressure [kPa] and air temperature [degC]
pub fn air_density(pressure_kpa: f64, t_air_c: f64) -> f64 {
    1000.0 * pressure_kpa / (1.01 * (t_air_c + KELVIN_OFFSET) * DRY_AIR_GAS_CONSTANT)
}

/// Air density [kg m-3] from a linear fit on temperature [K]
pub fn air_density_from_temperature(t_k: f64) -> f64 {
    -0.0046 * t_k + 2.5538
}
