//! Band requirements of each pipeline stage
//!
//! Every stage declares the bands it reads and the bands it adds. [`plan`]
//! walks the chain against the bands available before any pixel is computed,
//! so a scene missing an input fails up front with the stage and band named.

use crate::core::evapotranspiration::ET_OUTPUTS;
use crate::core::radiation::RADIATION_OUTPUTS;
use crate::core::sensible_heat::SENSIBLE_HEAT_OUTPUTS;
use crate::core::spectral::{albedo_bands, SPECTRAL_OUTPUTS};
use crate::types::{Band, EtError, EtResult, Sensor};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    SpectralIndices,
    Weather,
    TerrainCorrection,
    ColdEndmemberSearch,
    RadiationBalance,
    SoilHeatFlux,
    HotEndmemberSearch,
    SensibleHeatFlux,
    Evapotranspiration,
    Precipitation,
}

/// Bands a stage reads and writes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSpec {
    pub stage: Stage,
    pub requires: Vec<Band>,
    pub produces: Vec<Band>,
}

impl StageSpec {
    fn new(stage: Stage, requires: &[Band], produces: &[Band]) -> Self {
        Self {
            stage,
            requires: requires.to_vec(),
            produces: produces.to_vec(),
        }
    }
}

/// The fixed stage chain in execution order. Reflectance bands for albedo
/// are only required when the image carries no precomputed albedo.
pub fn stage_specs(sensor: Sensor, precomputed_albedo: bool) -> Vec<StageSpec> {
    let mut spectral_inputs = vec![Band::Blue, Band::Green, Band::Red, Band::Nir, Band::BrightnessTemperature];
    if !precomputed_albedo {
        for band in albedo_bands(sensor) {
            if !spectral_inputs.contains(band) {
                spectral_inputs.push(*band);
            }
        }
    }

    vec![
        StageSpec::new(Stage::SpectralIndices, &spectral_inputs, &SPECTRAL_OUTPUTS),
        StageSpec::new(
            Stage::Weather,
            &[Band::Albedo, Band::Latitude],
            &[
                Band::AirTemperature,
                Band::WindSpeed,
                Band::RelativeHumidity,
                Band::NetRadiation24h,
                Band::ShortwaveDown24h,
            ],
        ),
        StageSpec::new(
            Stage::TerrainCorrection,
            &[
                Band::Lst,
                Band::Elevation,
                Band::Slope,
                Band::Aspect,
                Band::Latitude,
                Band::Longitude,
                Band::AirTemperature,
                Band::RelativeHumidity,
            ],
            &[Band::LstDem],
        ),
        StageSpec::new(Stage::ColdEndmemberSearch, &[Band::Ndvi, Band::LstDem], &[]),
        StageSpec::new(
            Stage::RadiationBalance,
            &[
                Band::Albedo,
                Band::EmissivityBroadband,
                Band::Lst,
                Band::Elevation,
                Band::AirTemperature,
                Band::RelativeHumidity,
            ],
            &RADIATION_OUTPUTS,
        ),
        StageSpec::new(
            Stage::SoilHeatFlux,
            &[Band::NetRadiation, Band::Lst, Band::Albedo, Band::Ndvi],
            &[Band::SoilHeatFlux],
        ),
        StageSpec::new(
            Stage::HotEndmemberSearch,
            &[Band::Ndvi, Band::LstDem, Band::NetRadiation, Band::SoilHeatFlux],
            &[],
        ),
        StageSpec::new(
            Stage::SensibleHeatFlux,
            &[Band::Savi, Band::LstDem, Band::WindSpeed, Band::NetRadiation, Band::SoilHeatFlux],
            &SENSIBLE_HEAT_OUTPUTS,
        ),
        StageSpec::new(
            Stage::Evapotranspiration,
            &[
                Band::NetRadiation,
                Band::SoilHeatFlux,
                Band::SensibleHeatFlux,
                Band::LstDem,
                Band::NetRadiation24h,
            ],
            &ET_OUTPUTS,
        ),
        StageSpec::new(
            Stage::Precipitation,
            &[],
            &[Band::LastRain, Band::CumulativePrecipitation, Band::Year, Band::Month, Band::Day],
        ),
    ]
}

/// Check the stage chain against the bands available up front and return the
/// stages in execution order. Pixels are not touched.
pub fn plan(available: &[Band], sensor: Sensor) -> EtResult<Vec<StageSpec>> {
    let mut bands: BTreeSet<Band> = available.iter().copied().collect();
    let specs = stage_specs(sensor, bands.contains(&Band::Albedo));
    for spec in &specs {
        if let Some(missing) = spec.requires.iter().find(|b| !bands.contains(*b)) {
            log::debug!("Stage {:?} cannot run: {} is not available", spec.stage, missing);
            return Err(EtError::MissingBand(*missing));
        }
        bands.extend(spec.produces.iter().copied());
    }
    Ok(specs)
}
