//! Latent heat flux, evaporative fraction and daily evapotranspiration

use crate::constants::KELVIN_OFFSET;
use crate::raster::{BandSet, Raster};
use crate::types::{Band, EtError, EtResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtParams {
    /// Set negative sensible heat flux to zero before computing LE
    pub clip_negative_sensible_heat: bool,
    /// Evaporative fractions outside [ef_min, ef_max] are masked
    pub ef_min: f64,
    pub ef_max: f64,
}

impl Default for EtParams {
    fn default() -> Self {
        Self {
            clip_negative_sensible_heat: true,
            ef_min: 0.0,
            ef_max: 1.2,
        }
    }
}

impl EtParams {
    pub fn validate(&self) -> EtResult<()> {
        if !(self.ef_min.is_finite() && self.ef_max.is_finite() && self.ef_min < self.ef_max) {
            return Err(EtError::InvalidConfig(format!(
                "evaporative fraction range [{}, {}] is empty",
                self.ef_min, self.ef_max
            )));
        }
        Ok(())
    }
}

/// Latent heat of vaporization [MJ kg-1] at surface temperature [K]
pub fn latent_heat_of_vaporization(ts: f64) -> f64 {
    2.501 - 0.002361 * (ts - KELVIN_OFFSET)
}

/// Bands computed by [`EvapotranspirationEstimator::compute`]
pub const ET_OUTPUTS: [Band; 4] = [
    Band::LatentHeatFlux,
    Band::EvaporativeFraction,
    Band::EtInstantaneous,
    Band::Et24h,
];

/// Rasters read by the estimator
#[derive(Debug, Clone, Copy)]
pub struct EtInputs<'a> {
    pub net_radiation: &'a Raster,
    pub soil_heat_flux: &'a Raster,
    pub sensible_heat_flux: &'a Raster,
    /// Surface temperature [K]
    pub lst: &'a Raster,
    /// Daily net radiation [W m-2]
    pub net_radiation_24h: &'a Raster,
}

#[derive(Debug, Clone)]
pub struct EvapotranspirationEstimator {
    params: EtParams,
}

impl EvapotranspirationEstimator {
    pub fn new(params: EtParams) -> EtResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn standard() -> Self {
        Self {
            params: EtParams::default(),
        }
    }

    /// Evaporative fraction, or `NaN` when the available energy is not
    /// positive or the fraction falls outside the plausible range
    pub fn evaporative_fraction(&self, le: f64, available_energy: f64) -> f64 {
        if !(available_energy > 0.0) {
            return f64::NAN;
        }
        let ef = le / available_energy;
        if ef >= self.params.ef_min && ef <= self.params.ef_max {
            ef
        } else {
            f64::NAN
        }
    }

    pub fn compute(&self, inputs: EtInputs<'_>) -> EtResult<BandSet> {
        log::debug!(
            "Evapotranspiration: clip negative H = {}, EF range [{}, {}]",
            self.params.clip_negative_sensible_heat,
            self.params.ef_min,
            self.params.ef_max
        );

        let clip = self.params.clip_negative_sensible_heat;
        let le = Raster::combine(
            &[inputs.net_radiation, inputs.soil_heat_flux, inputs.sensible_heat_flux],
            move |v| {
                let h = if clip && v[2] < 0.0 { 0.0 } else { v[2] };
                v[0] - v[1] - h
            },
        )?;

        let ef = Raster::combine(&[&le, inputs.net_radiation, inputs.soil_heat_flux], |v| {
            self.evaporative_fraction(v[0], v[1] - v[2])
        })?;

        let et_inst = le.zip_map(inputs.lst, |le, ts| 0.0036 * le / latent_heat_of_vaporization(ts))?;

        let et_24h = ef.zip3_map(inputs.net_radiation_24h, inputs.lst, |ef, rn24, ts| {
            86.4 * ef * rn24 / (latent_heat_of_vaporization(ts) * 1000.0)
        })?;

        let mut out = BandSet::new(le.grid().clone());
        out.insert(Band::LatentHeatFlux, le)?;
        out.insert(Band::EvaporativeFraction, ef)?;
        out.insert(Band::EtInstantaneous, et_inst)?;
        out.insert(Band::Et24h, et_24h)?;
        Ok(out)
    }
}
