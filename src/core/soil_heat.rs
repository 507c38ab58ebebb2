use crate::constants::KELVIN_OFFSET;
use crate::raster::Raster;
use crate::types::EtResult;

/// Soil heat flux [W m-2] (Bastiaanssen 2000)
pub fn soil_heat_flux_value(rn: f64, lst: f64, albedo: f64, ndvi: f64) -> f64 {
    rn * (lst - KELVIN_OFFSET) * (0.0038 + 0.0074 * albedo) * (1.0 - 0.98 * ndvi.powi(4))
}

/// Soil heat flux from net radiation, surface temperature [K], albedo and NDVI
pub fn soil_heat_flux(rn: &Raster, lst: &Raster, albedo: &Raster, ndvi: &Raster) -> EtResult<Raster> {
    log::debug!("Computing soil heat flux");
    Raster::combine(&[rn, lst, albedo, ndvi], |v| soil_heat_flux_value(v[0], v[1], v[2], v[3]))
}
