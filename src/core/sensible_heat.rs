//! Sensible heat flux from the two-endmember dT calibration
//!
//! The near-surface temperature difference is modelled as a line in surface
//! temperature, `dT = slope * Ts + intercept`, fitted exactly through the cold
//! endmember (dT = 0) and the hot endmember (H = Rn - G). Aerodynamic
//! resistance starts from neutral stability and is then corrected with
//! Monin-Obukhov stability functions for a fixed number of passes.

use crate::constants::{AIR_SPECIFIC_HEAT, GRAVITY, VON_KARMAN};
use crate::core::endmembers::Endmember;
use crate::core::solar::air_density_from_temperature;
use crate::raster::{BandSet, Raster};
use crate::types::{Band, EtError, EtResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Wind profile and iteration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensibleHeatParams {
    /// Number of stability-correction passes
    pub iterations: usize,
    /// Blending height where wind speed is assumed uniform [m]
    pub blending_height: f64,
    /// Height of the wind speed input [m]
    pub station_height: f64,
    /// Vegetation height around the weather station [m]
    pub station_vegetation_height: f64,
    /// Lower reference height above zero-plane displacement [m]
    pub z1: f64,
    /// Upper reference height above zero-plane displacement [m]
    pub z2: f64,
    /// Station wind speeds below this are raised to it [m s-1]; calm air
    /// otherwise gives zero friction velocity
    pub min_wind_speed: f64,
}

impl Default for SensibleHeatParams {
    fn default() -> Self {
        Self {
            iterations: 2,
            blending_height: 200.0,
            station_height: 2.0,
            station_vegetation_height: 3.0,
            z1: 0.1,
            z2: 2.0,
            min_wind_speed: 1.0,
        }
    }
}

impl SensibleHeatParams {
    pub fn validate(&self) -> EtResult<()> {
        if !(self.z1 > 0.0 && self.z2 > self.z1) {
            return Err(EtError::InvalidConfig(format!(
                "reference heights must satisfy 0 < z1 < z2, got z1={} z2={}",
                self.z1, self.z2
            )));
        }
        if !(self.min_wind_speed > 0.0 && self.min_wind_speed.is_finite()) {
            return Err(EtError::InvalidConfig(format!(
                "minimum wind speed must be positive, got {}",
                self.min_wind_speed
            )));
        }
        let zom_ws = self.station_roughness();
        if !(self.station_height > zom_ws && self.blending_height > self.station_height) {
            return Err(EtError::InvalidConfig(format!(
                "heights must satisfy roughness {} < station {} < blending {}",
                zom_ws, self.station_height, self.blending_height
            )));
        }
        Ok(())
    }

    /// Momentum roughness length at the weather station [m]
    pub fn station_roughness(&self) -> f64 {
        0.12 * self.station_vegetation_height
    }
}

/// Exact two-point fit of `dT = slope * Ts + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DtFit {
    pub slope: f64,
    pub intercept: f64,
    pub t_cold: f64,
    pub t_hot: f64,
    /// dT at the hot endmember [K]
    pub dt_hot: f64,
    /// Aerodynamic resistance at the hot endmember [s m-1]
    pub rah_hot: f64,
}

impl DtFit {
    /// Fit through (t_cold, 0) and (t_hot, dt_hot).
    ///
    /// The fit is not sign-checked; an implausible slope is kept as is.
    pub fn fit(t_cold: f64, t_hot: f64, dt_hot: f64, rah_hot: f64) -> EtResult<Self> {
        let contrast = t_hot - t_cold;
        if contrast == 0.0 || !contrast.is_finite() {
            return Err(EtError::DegenerateCalibration(format!(
                "cold and hot endmember temperatures coincide ({:.3} K, {:.3} K)",
                t_cold, t_hot
            )));
        }
        if !dt_hot.is_finite() {
            return Err(EtError::DegenerateCalibration(format!(
                "dT at the hot endmember is not finite ({})",
                dt_hot
            )));
        }
        let slope = (dt_hot - 0.0) / contrast;
        let intercept = dt_hot - slope * t_hot;
        Ok(Self {
            slope,
            intercept,
            t_cold,
            t_hot,
            dt_hot,
            rah_hot,
        })
    }

    pub fn dt(&self, ts: f64) -> f64 {
        self.slope * ts + self.intercept
    }
}

/// Stability corrections (psi_m, psi_h) at height `z` for Obukhov length `l`
/// (Paulson 1970, Webb 1970)
pub fn stability_corrections(l: f64, z: f64) -> (f64, f64) {
    if l.is_nan() {
        return (f64::NAN, f64::NAN);
    }
    if l == 0.0 || l.is_infinite() {
        return (0.0, 0.0);
    }
    if l < 0.0 {
        let x = (1.0 - 16.0 * z / l).powf(0.25);
        let psi_m = 2.0 * ((1.0 + x) / 2.0).ln() + ((1.0 + x * x) / 2.0).ln() - 2.0 * x.atan() + 0.5 * PI;
        let psi_h = 2.0 * ((1.0 + x * x) / 2.0).ln();
        (psi_m, psi_h)
    } else {
        let psi = -5.0 * z / l;
        (psi, psi)
    }
}

/// Monin-Obukhov length [m]
pub fn obukhov_length(rho: f64, u_star: f64, ts: f64, h: f64) -> f64 {
    -(rho * AIR_SPECIFIC_HEAT * u_star.powi(3) * ts) / (VON_KARMAN * GRAVITY * h)
}

/// Momentum roughness length [m] from SAVI (Bastiaanssen 2000)
pub fn roughness_from_savi(savi: f64) -> f64 {
    (5.62 * savi - 5.809).exp()
}

/// Bands computed by [`SensibleHeatSolver::solve`]
pub const SENSIBLE_HEAT_OUTPUTS: [Band; 5] = [
    Band::SensibleHeatFlux,
    Band::TemperatureDifference,
    Band::AerodynamicResistance,
    Band::NeutralAerodynamicResistance,
    Band::FrictionVelocity,
];

/// Rasters read by the solver
#[derive(Debug, Clone, Copy)]
pub struct SensibleHeatInputs<'a> {
    pub savi: &'a Raster,
    /// Terrain-corrected surface temperature [K]
    pub lst: &'a Raster,
    /// Wind speed at the station height [m s-1]
    pub wind_speed: &'a Raster,
}

#[derive(Debug, Clone)]
pub struct SensibleHeatResult {
    pub bands: BandSet,
    /// Fit used for the final H
    pub fit: DtFit,
    /// Fit of every stability pass, in order
    pub pass_fits: Vec<DtFit>,
}

#[derive(Debug, Clone)]
pub struct SensibleHeatSolver {
    params: SensibleHeatParams,
}

impl SensibleHeatSolver {
    pub fn new(params: SensibleHeatParams) -> EtResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn standard() -> Self {
        Self {
            params: SensibleHeatParams::default(),
        }
    }

    pub fn params(&self) -> &SensibleHeatParams {
        &self.params
    }

    fn fit_at_hot(&self, rah: &Raster, cold: &Endmember, hot: &Endmember) -> EtResult<DtFit> {
        let available = hot.available_energy().ok_or_else(|| {
            EtError::DegenerateCalibration("net radiation or soil heat flux masked at the hot endmember".to_string())
        })?;
        let rah_hot = hot.sample(rah)?.ok_or_else(|| {
            EtError::DegenerateCalibration("aerodynamic resistance masked at the hot endmember".to_string())
        })?;
        let rho_hot = air_density_from_temperature(hot.temperature);
        let dt_hot = available * rah_hot / (rho_hot * AIR_SPECIFIC_HEAT);
        DtFit::fit(cold.temperature, hot.temperature, dt_hot, rah_hot)
    }

    /// Solve H with the configured number of stability passes
    pub fn solve(&self, inputs: SensibleHeatInputs<'_>, cold: &Endmember, hot: &Endmember) -> EtResult<SensibleHeatResult> {
        let p = &self.params;
        log::debug!(
            "Sensible heat: T_cold={:.2} K, T_hot={:.2} K, {} stability passes",
            cold.temperature,
            hot.temperature,
            p.iterations
        );

        // Friction velocity at the station, extrapolated to the blending height
        let zom_ws = p.station_roughness();
        let ln_blend_ws = (p.blending_height / zom_ws).ln();
        let ln_station = (p.station_height / zom_ws).ln();
        let min_wind = p.min_wind_speed;
        let u_blend = inputs.wind_speed.map(move |u| {
            // Comparison is false for NaN, so masked wind stays masked
            let u = if u < min_wind { min_wind } else { u };
            let u_star_station = VON_KARMAN * u / ln_station;
            u_star_station * ln_blend_ws / VON_KARMAN
        });

        let blending_height = p.blending_height;
        let zom = inputs.savi.map(roughness_from_savi);
        let ln_blend = zom.map(move |z0| (blending_height / z0).ln());
        let ln_z2_z1 = (p.z2 / p.z1).ln();

        let mut u_star = u_blend.zip_map(&ln_blend, |u200, ln_b| VON_KARMAN * u200 / ln_b)?;
        let rah_neutral = u_star.map(move |us| ln_z2_z1 / (us * VON_KARMAN));
        let mut rah = rah_neutral.clone();

        let (z1, z2) = (p.z1, p.z2);
        let mut pass_fits = Vec::with_capacity(p.iterations);
        for pass in 0..p.iterations {
            let fit = self.fit_at_hot(&rah, cold, hot)?;
            log::debug!(
                "Pass {}: rah_hot={:.3}, dT_hot={:.3}, dT = {:.5} Ts + {:.3}",
                pass + 1,
                fit.rah_hot,
                fit.dt_hot,
                fit.slope,
                fit.intercept
            );
            pass_fits.push(fit);

            let obukhov = Raster::combine(&[inputs.lst, &rah, &u_star], move |v| {
                let (ts, rah, us) = (v[0], v[1], v[2]);
                let dt = fit.dt(ts);
                let rho = air_density_from_temperature(ts - dt);
                let h = rho * AIR_SPECIFIC_HEAT * dt / rah;
                obukhov_length(rho, us, ts, h)
            })?;

            u_star = Raster::combine(&[&obukhov, &u_blend, &ln_blend], move |v| {
                let (psi_m_blend, _) = stability_corrections(v[0], blending_height);
                VON_KARMAN * v[1] / (v[2] - psi_m_blend)
            })?;
            rah = obukhov.zip_map(&u_star, move |l, us| {
                let (_, psi_h2) = stability_corrections(l, z2);
                let (_, psi_h1) = stability_corrections(l, z1);
                (ln_z2_z1 - psi_h2 + psi_h1) / (us * VON_KARMAN)
            })?;
        }

        let fit = self.fit_at_hot(&rah, cold, hot)?;
        let dt = inputs.lst.map(move |ts| fit.dt(ts));
        let h = Raster::combine(&[inputs.lst, &dt, &rah], |v| {
            let rho = air_density_from_temperature(v[0] - v[1]);
            rho * AIR_SPECIFIC_HEAT * v[1] / v[2]
        })?;

        log::debug!(
            "Final dT fit: slope={:.5}, intercept={:.3}, rah_hot={:.3}",
            fit.slope,
            fit.intercept,
            fit.rah_hot
        );

        let mut bands = BandSet::new(inputs.lst.grid().clone());
        bands.insert(Band::SensibleHeatFlux, h)?;
        bands.insert(Band::TemperatureDifference, dt)?;
        bands.insert(Band::AerodynamicResistance, rah)?;
        bands.insert(Band::NeutralAerodynamicResistance, rah_neutral)?;
        bands.insert(Band::FrictionVelocity, u_star)?;

        Ok(SensibleHeatResult { bands, fit, pass_fits })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EndmemberKind, GridSpec};
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    #[test]
    fn test_fit_passes_through_both_points() {
        let fit = DtFit::fit(295.0, 315.0, 8.0, 30.0).unwrap();
        assert_abs_diff_eq!(fit.dt(295.0), 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.dt(315.0), 8.0, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.slope, 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_equal_temperatures_are_degenerate() {
        let err = DtFit::fit(300.0, 300.0, 5.0, 20.0).unwrap_err();
        assert!(matches!(err, EtError::DegenerateCalibration(_)));
    }

    #[test]
    fn test_inverted_endmembers_are_kept() {
        // Hot colder than cold: negative slope, reproduced without correction
        let fit = DtFit::fit(310.0, 300.0, 6.0, 25.0).unwrap();
        assert!(fit.slope < 0.0);
        assert_abs_diff_eq!(fit.dt(310.0), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_stability_corrections() {
        assert_eq!(stability_corrections(f64::INFINITY, 2.0), (0.0, 0.0));
        assert_eq!(stability_corrections(0.0, 2.0), (0.0, 0.0));
        let (m, h) = stability_corrections(50.0, 2.0);
        assert_abs_diff_eq!(m, -0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(h, -0.2, epsilon = 1e-12);
        let (m, h) = stability_corrections(-50.0, 2.0);
        assert!(m > 0.0 && h > 0.0);
        assert!(stability_corrections(f64::NAN, 2.0).0.is_nan());
    }

    #[test]
    fn test_solve_hot_pixel_closes_energy_balance() {
        let grid = Arc::new(GridSpec::geographic(0.0, 0.0, 1.0, 1, 3));
        let lst = Raster::new(Arc::clone(&grid), ndarray::array![[296.0, 305.0, 316.0]]).unwrap();
        let savi = Raster::new(Arc::clone(&grid), ndarray::array![[0.65, 0.4, 0.1]]).unwrap();
        let wind = Raster::constant(Arc::clone(&grid), 2.5);

        let cold = Endmember::at_pixel(EndmemberKind::Cold, (0, 0), (1, 3), 296.0, Some(600.0), Some(40.0));
        let hot = Endmember::at_pixel(EndmemberKind::Hot, (0, 2), (1, 3), 316.0, Some(450.0), Some(90.0));

        let inputs = SensibleHeatInputs {
            savi: &savi,
            lst: &lst,
            wind_speed: &wind,
        };
        let result = SensibleHeatSolver::standard().solve(inputs, &cold, &hot).unwrap();
        assert_eq!(result.pass_fits.len(), 2);

        let h = result.bands.get(Band::SensibleHeatFlux).unwrap();
        let dt = result.bands.get(Band::TemperatureDifference).unwrap();
        assert_abs_diff_eq!(h.get(0, 0), 0.0, epsilon = 1e-8);
        assert_abs_diff_eq!(dt.get(0, 2), result.fit.dt_hot, epsilon = 1e-9);

        // H at the hot pixel uses the hot pixel's own air density; it matches
        // Rn - G up to the density difference between Ts - dT and Ts.
        let rho_air = air_density_from_temperature(316.0 - result.fit.dt_hot);
        let rho_hot = air_density_from_temperature(316.0);
        assert_abs_diff_eq!(h.get(0, 2), 360.0 * rho_air / rho_hot, epsilon = 1e-6);
    }

    #[test]
    fn test_calm_wind_is_floored() {
        let grid = Arc::new(GridSpec::geographic(0.0, 0.0, 1.0, 1, 3));
        let lst = Raster::new(Arc::clone(&grid), ndarray::array![[296.0, 305.0, 316.0]]).unwrap();
        let savi = Raster::new(Arc::clone(&grid), ndarray::array![[0.65, 0.4, 0.1]]).unwrap();
        let calm = Raster::new(Arc::clone(&grid), ndarray::array![[0.0, 0.0, f64::NAN]]).unwrap();
        let floor = Raster::new(Arc::clone(&grid), ndarray::array![[1.0, 1.0, f64::NAN]]).unwrap();

        let cold = Endmember::at_pixel(EndmemberKind::Cold, (0, 0), (1, 3), 296.0, Some(600.0), Some(40.0));
        let hot = Endmember::at_pixel(EndmemberKind::Hot, (0, 1), (1, 3), 305.0, Some(450.0), Some(90.0));

        let solve = |wind: &Raster| {
            SensibleHeatSolver::standard()
                .solve(
                    SensibleHeatInputs {
                        savi: &savi,
                        lst: &lst,
                        wind_speed: wind,
                    },
                    &cold,
                    &hot,
                )
                .unwrap()
        };
        let calm_result = solve(&calm);
        let floor_result = solve(&floor);

        let rah = calm_result.bands.get(Band::AerodynamicResistance).unwrap();
        assert!(rah.get(0, 1).is_finite());
        assert_eq!(rah.get(0, 1), floor_result.bands.get(Band::AerodynamicResistance).unwrap().get(0, 1));
        assert_eq!(calm_result.fit, floor_result.fit);
        // Masked wind is not replaced by the floor
        assert!(rah.get(0, 2).is_nan());
    }

    #[test]
    fn test_non_positive_wind_floor_rejected() {
        let params = SensibleHeatParams {
            min_wind_speed: 0.0,
            ..Default::default()
        };
        assert!(matches!(SensibleHeatSolver::new(params), Err(EtError::InvalidConfig(_))));
    }
}
