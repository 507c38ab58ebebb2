//! Instantaneous surface radiation balance

use crate::constants::{SOLAR_CONSTANT, STEFAN_BOLTZMANN};
use crate::core::solar::{self, SolarGeometry};
use crate::raster::{BandSet, Raster};
use crate::types::{Band, EtResult};

/// Outgoing long-wave radiation [W m-2]
pub fn longwave_up_value(e_0: f64, lst: f64) -> f64 {
    e_0 * STEFAN_BOLTZMANN * lst.powi(4)
}

/// Incoming long-wave radiation [W m-2] from the atmospheric emissivity and
/// the cold endmember temperature
pub fn longwave_down_value(tau: f64, t_cold: f64) -> f64 {
    0.85 * (-tau.ln()).powf(0.09) * STEFAN_BOLTZMANN * t_cold.powi(4)
}

pub fn net_radiation_value(albedo: f64, rs_down: f64, rl_down: f64, rl_up: f64, e_0: f64) -> f64 {
    (1.0 - albedo) * rs_down + rl_down - rl_up - (1.0 - e_0) * rl_down
}

/// Bands computed by [`RadiationBalance::compute`]
pub const RADIATION_OUTPUTS: [Band; 5] = [
    Band::Transmissivity,
    Band::LongwaveUp,
    Band::ShortwaveDown,
    Band::LongwaveDown,
    Band::NetRadiation,
];

/// Rasters read by the radiation balance
#[derive(Debug, Clone, Copy)]
pub struct RadiationInputs<'a> {
    pub albedo: &'a Raster,
    pub emissivity_broadband: &'a Raster,
    pub lst: &'a Raster,
    pub elevation: &'a Raster,
    /// Air temperature [degC]
    pub air_temperature: &'a Raster,
    /// Relative humidity [%]
    pub relative_humidity: &'a Raster,
}

#[derive(Debug, Clone)]
pub struct RadiationBalance {
    solar: SolarGeometry,
}

impl RadiationBalance {
    pub fn new(solar: SolarGeometry) -> Self {
        Self { solar }
    }

    pub fn transmissivity(&self, elevation: &Raster, air_temperature: &Raster, rh: &Raster) -> EtResult<Raster> {
        let cos_zenith = self.solar.cos_zenith();
        elevation.zip3_map(air_temperature, rh, move |z, t, rh| {
            solar::transmissivity_at(z, t, rh, cos_zenith)
        })
    }

    pub fn longwave_up(&self, e_0: &Raster, lst: &Raster) -> EtResult<Raster> {
        e_0.zip_map(lst, longwave_up_value)
    }

    pub fn shortwave_down(&self, tau: &Raster) -> Raster {
        let factor = SOLAR_CONSTANT * self.solar.cos_zenith() * self.solar.inverse_relative_distance();
        tau.map(move |t| factor * t)
    }

    /// Incoming long-wave radiation. Without a cold endmember temperature the
    /// whole band is masked.
    pub fn longwave_down(&self, tau: &Raster, t_cold: Option<f64>) -> Raster {
        match t_cold {
            Some(t_cold) => tau.map(move |t| longwave_down_value(t, t_cold)),
            None => {
                log::warn!("Cold endmember temperature unavailable, incoming long-wave radiation masked");
                Raster::masked(tau.grid().clone())
            }
        }
    }

    /// Transmissivity, long-wave up/down, short-wave down and net radiation
    pub fn compute(&self, inputs: RadiationInputs<'_>, t_cold: Option<f64>) -> EtResult<BandSet> {
        log::debug!(
            "Radiation balance: cos_zenith={:.4}, dr={:.4}, T_cold={:?}",
            self.solar.cos_zenith(),
            self.solar.inverse_relative_distance(),
            t_cold
        );

        let tau = self.transmissivity(inputs.elevation, inputs.air_temperature, inputs.relative_humidity)?;
        let rl_up = self.longwave_up(inputs.emissivity_broadband, inputs.lst)?;
        let rs_down = self.shortwave_down(&tau);
        let rl_down = self.longwave_down(&tau, t_cold);
        let rn = Raster::combine(
            &[inputs.albedo, &rs_down, &rl_down, &rl_up, inputs.emissivity_broadband],
            |v| net_radiation_value(v[0], v[1], v[2], v[3], v[4]),
        )?;

        let mut out = BandSet::new(tau.grid().clone());
        out.insert(Band::Transmissivity, tau)?;
        out.insert(Band::LongwaveUp, rl_up)?;
        out.insert(Band::ShortwaveDown, rs_down)?;
        out.insert(Band::LongwaveDown, rl_down)?;
        out.insert(Band::NetRadiation, rn)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GridSpec;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn balance() -> RadiationBalance {
        let t = Utc.with_ymd_and_hms(2019, 7, 15, 18, 40, 0).unwrap();
        RadiationBalance::new(SolarGeometry::new(t, 62.0).unwrap())
    }

    #[test]
    fn test_longwave_up_blackbody_scale() {
        assert_relative_eq!(longwave_up_value(1.0, 300.0), 459.27, max_relative = 1e-4);
    }

    #[test]
    fn test_net_radiation_closure() {
        let rn = net_radiation_value(0.2, 800.0, 350.0, 450.0, 0.96);
        assert_relative_eq!(rn, 0.8 * 800.0 + 350.0 - 450.0 - 0.04 * 350.0, max_relative = 1e-12);
    }

    #[test]
    fn test_missing_cold_temperature_masks_net_radiation() {
        let grid = Arc::new(GridSpec::geographic(0.0, 0.0, 1.0, 2, 2));
        let c = |v: f64| Raster::constant(Arc::clone(&grid), v);
        let (albedo, e_0, lst, z, t, rh) = (c(0.2), c(0.97), c(305.0), c(20.0), c(28.0), c(35.0));
        let inputs = RadiationInputs {
            albedo: &albedo,
            emissivity_broadband: &e_0,
            lst: &lst,
            elevation: &z,
            air_temperature: &t,
            relative_humidity: &rh,
        };

        let out = balance().compute(inputs, None).unwrap();
        assert_eq!(out.get(Band::NetRadiation).unwrap().valid_count(), 0);
        assert_eq!(out.get(Band::LongwaveUp).unwrap().valid_count(), 4);

        let out = balance().compute(inputs, Some(295.0)).unwrap();
        let rn = out.get(Band::NetRadiation).unwrap().get(0, 0);
        assert!(rn > 300.0 && rn < 800.0, "Rn = {}", rn);
    }
}
