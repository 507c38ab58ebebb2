//! Per-scene SEBAL pipeline and batch driver
//!
//! [`SebalModel::prepare`] checks the stage chain against the scene's bands
//! without touching pixels. [`SebalModel::run`] then evaluates every stage
//! in order and returns either a [`SceneProduct`] or a [`SceneFailure`]
//! carrying whatever diagnostics were gathered before the failure.

use crate::config::SebalConfig;
use crate::core::endmembers::{Endmember, EndmemberSelector, EndmemberStatus, HotInputs};
use crate::core::evapotranspiration::{EtInputs, EvapotranspirationEstimator};
use crate::core::precipitation::{PrecipitationAggregator, PrecipitationProvider};
use crate::core::radiation::{RadiationBalance, RadiationInputs};
use crate::core::sensible_heat::{DtFit, SensibleHeatInputs, SensibleHeatSolver};
use crate::core::soil_heat::soil_heat_flux;
use crate::core::solar::SolarGeometry;
use crate::core::spectral::{correct_lst_for_terrain, LstCorrectionInputs, SpectralIndices};
use crate::core::stages::{plan, StageSpec};
use crate::io::dem::Terrain;
use crate::io::meteorology::{WeatherContext, WeatherProvider};
use crate::raster::{BandSet, Geometry, Raster, Reducer};
use crate::types::{Band, EtError, EtResult, FailureKind, Sensor};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One prepared satellite image: scaled reflectance and brightness temperature
#[derive(Debug, Clone)]
pub struct SceneImage {
    pub scene_id: String,
    pub sensor: Sensor,
    pub acquired: DateTime<Utc>,
    pub sun_elevation_deg: f64,
    pub bands: BandSet,
}

/// Everything the pipeline needs for one scene besides the shared providers
#[derive(Debug, Clone)]
pub struct SceneInput {
    pub image: SceneImage,
    pub terrain: Terrain,
    /// Region searched for endmembers and summarised in batch records
    pub region: Geometry,
}

impl SceneInput {
    pub fn date(&self) -> NaiveDate {
        self.image.acquired.date_naive()
    }

    fn available_bands(&self) -> Vec<Band> {
        let mut bands = self.image.bands.names();
        bands.extend([Band::Elevation, Band::Slope, Band::Aspect, Band::Latitude, Band::Longitude]);
        bands
    }
}

/// Pixel counts and calibration state of one scene
#[derive(Debug, Clone, Default, Serialize)]
pub struct PixelDiagnostics {
    pub total_pixels: usize,
    /// Pixels with a valid NDVI, i.e. unmasked at the input stage
    pub valid_input_pixels: usize,
    /// Pixels with a valid daily ET
    pub valid_et_pixels: usize,
    pub coverage_percent: f64,
    pub cold: Option<EndmemberStatus>,
    pub hot: Option<EndmemberStatus>,
    pub dt_fit: Option<DtFit>,
    pub stability_passes: Vec<DtFit>,
    pub missing_precipitation_days: Vec<NaiveDate>,
}

/// Successful output of one scene
#[derive(Debug, Clone)]
pub struct SceneProduct {
    pub scene_id: String,
    pub date: NaiveDate,
    /// Every band computed for the scene, inputs included
    pub bands: BandSet,
    pub cold: Endmember,
    pub hot: Endmember,
    pub dt_fit: DtFit,
    pub diagnostics: PixelDiagnostics,
    et_band_name: String,
}

/// Mean, minimum and maximum of a band over a region
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandStatistics {
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Region extraction of a scene's output bands
#[derive(Debug, Clone, Serialize)]
pub struct RegionSummary {
    pub scene_id: String,
    pub date: NaiveDate,
    pub bands: BTreeMap<String, BandStatistics>,
}

impl SceneProduct {
    /// Output bands keyed by their published names, daily ET first
    pub fn output_bands(&self) -> Vec<(String, &Raster)> {
        let named = [
            (Band::Et24h, self.et_band_name.as_str()),
            (Band::Ndvi, Band::Ndvi.name()),
            (Band::LstDem, Band::LstDem.name()),
            (Band::LastRain, Band::LastRain.name()),
            (Band::CumulativePrecipitation, Band::CumulativePrecipitation.name()),
            (Band::Month, Band::Month.name()),
            (Band::Day, Band::Day.name()),
            (Band::Year, Band::Year.name()),
            (Band::Red, Band::Red.name()),
            (Band::Green, Band::Green.name()),
            (Band::Blue, Band::Blue.name()),
        ];
        named
            .into_iter()
            .filter_map(|(band, name)| self.bands.get(band).ok().map(|r| (name.to_string(), r)))
            .collect()
    }

    /// Mean, min and max of every output band over `geometry`
    pub fn summarize(&self, geometry: &Geometry) -> EtResult<RegionSummary> {
        let region = geometry.to_mask(self.bands.grid());
        let mut bands = BTreeMap::new();
        for (name, raster) in self.output_bands() {
            let stats = BandStatistics {
                mean: raster.reduce(Reducer::Mean, &region)?,
                min: raster.reduce(Reducer::Min, &region)?,
                max: raster.reduce(Reducer::Max, &region)?,
            };
            bands.insert(name, stats);
        }
        Ok(RegionSummary {
            scene_id: self.scene_id.clone(),
            date: self.date,
            bands,
        })
    }
}

/// Scene-level failure with the diagnostics gathered before it
#[derive(Debug, Clone, Serialize)]
pub struct SceneFailure {
    pub scene_id: String,
    pub kind: FailureKind,
    pub message: String,
    pub diagnostics: PixelDiagnostics,
}

impl fmt::Display for SceneFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene {} failed ({:?}): {}", self.scene_id, self.kind, self.message)
    }
}

impl std::error::Error for SceneFailure {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SceneStatus {
    Succeeded,
    Failed { kind: FailureKind, message: String },
}

/// One row of a batch run. Failed scenes carry no summary.
#[derive(Debug, Clone, Serialize)]
pub struct SceneRecord {
    pub scene_id: String,
    pub date: NaiveDate,
    pub status: SceneStatus,
    pub summary: Option<RegionSummary>,
}

/// Configured model applied to scenes independently
#[derive(Debug, Clone)]
pub struct SebalModel {
    config: SebalConfig,
    selector: EndmemberSelector,
    solver: SensibleHeatSolver,
    estimator: EvapotranspirationEstimator,
    aggregator: PrecipitationAggregator,
}

impl SebalModel {
    pub fn new(config: SebalConfig) -> EtResult<Self> {
        config.validate()?;
        Ok(Self {
            selector: EndmemberSelector::new(config.endmembers.clone())?,
            solver: SensibleHeatSolver::new(config.sensible_heat.clone())?,
            estimator: EvapotranspirationEstimator::new(config.et.clone())?,
            aggregator: PrecipitationAggregator::new(config.precipitation.clone())?,
            config,
        })
    }

    pub fn config(&self) -> &SebalConfig {
        &self.config
    }

    /// Check the stage chain against the scene's bands before any pixel work
    pub fn prepare(&self, input: &SceneInput) -> EtResult<Vec<StageSpec>> {
        plan(&input.available_bands(), input.image.sensor)
    }

    /// Process one scene
    pub fn run(
        &self,
        input: &SceneInput,
        weather: &dyn WeatherProvider,
        precipitation: &dyn PrecipitationProvider,
    ) -> Result<SceneProduct, SceneFailure> {
        let scene_id = &input.image.scene_id;
        log::info!("Processing scene {} acquired {}", scene_id, input.image.acquired);

        let mut diagnostics = PixelDiagnostics {
            total_pixels: input.image.bands.grid().len(),
            ..Default::default()
        };
        match self.evaluate(input, weather, precipitation, &mut diagnostics) {
            Ok(product) => {
                log::info!(
                    "Scene {} finished: {:.1}% ET coverage, T_cold={:.2} K, T_hot={:.2} K",
                    scene_id,
                    product.diagnostics.coverage_percent,
                    product.cold.temperature,
                    product.hot.temperature
                );
                Ok(product)
            }
            Err(err) => {
                log::info!("Scene {} failed: {}", scene_id, err);
                Err(SceneFailure {
                    scene_id: scene_id.clone(),
                    kind: err.kind(),
                    message: err.to_string(),
                    diagnostics,
                })
            }
        }
    }

    fn evaluate(
        &self,
        input: &SceneInput,
        weather: &dyn WeatherProvider,
        precipitation: &dyn PrecipitationProvider,
        diagnostics: &mut PixelDiagnostics,
    ) -> EtResult<SceneProduct> {
        let stages = self.prepare(input)?;
        log::debug!("Planned {} stages for scene {}", stages.len(), input.image.scene_id);

        let image = &input.image;
        let grid = Arc::clone(image.bands.grid());
        let solar = SolarGeometry::new(image.acquired, image.sun_elevation_deg)?;

        let mut bands = image.bands.clone();
        bands.extend_from(&input.terrain.to_bands()?)?;

        let spectral = SpectralIndices::new(image.sensor).compute(&bands)?;
        bands.extend_from(&spectral)?;
        diagnostics.valid_input_pixels = bands.get(Band::Ndvi)?.valid_count();

        let weather = WeatherContext::at(
            weather,
            image.acquired,
            bands.get(Band::Albedo)?,
            bands.get(Band::Latitude)?,
        )?;
        bands.extend_from(&weather.to_bands()?)?;

        let lst_dem = correct_lst_for_terrain(
            LstCorrectionInputs {
                lst: bands.get(Band::Lst)?,
                elevation: bands.get(Band::Elevation)?,
                slope: bands.get(Band::Slope)?,
                aspect: bands.get(Band::Aspect)?,
                latitude: bands.get(Band::Latitude)?,
                longitude: bands.get(Band::Longitude)?,
                air_temperature: bands.get(Band::AirTemperature)?,
                relative_humidity: bands.get(Band::RelativeHumidity)?,
            },
            &solar,
        )?;
        bands.insert(Band::LstDem, lst_dem)?;

        let region = input.region.to_mask(&grid);
        let cold_search = self
            .selector
            .search_cold(bands.get(Band::Ndvi)?, bands.get(Band::LstDem)?, &region)?;

        let radiation = RadiationBalance::new(solar).compute(
            RadiationInputs {
                albedo: bands.get(Band::Albedo)?,
                emissivity_broadband: bands.get(Band::EmissivityBroadband)?,
                lst: bands.get(Band::Lst)?,
                elevation: bands.get(Band::Elevation)?,
                air_temperature: bands.get(Band::AirTemperature)?,
                relative_humidity: bands.get(Band::RelativeHumidity)?,
            },
            cold_search.temperature(),
        )?;
        bands.extend_from(&radiation)?;

        let g = soil_heat_flux(
            bands.get(Band::NetRadiation)?,
            bands.get(Band::Lst)?,
            bands.get(Band::Albedo)?,
            bands.get(Band::Ndvi)?,
        )?;
        bands.insert(Band::SoilHeatFlux, g)?;

        let rn = bands.get(Band::NetRadiation)?;
        let g = bands.get(Band::SoilHeatFlux)?;
        let cold = cold_search.resolve(rn, g)?;
        diagnostics.cold = Some(cold.clone());
        let hot = self.selector.select_hot(
            HotInputs {
                ndvi: bands.get(Band::Ndvi)?,
                lst: bands.get(Band::LstDem)?,
                net_radiation: rn,
                soil_heat_flux: g,
            },
            &region,
        )?;
        diagnostics.hot = Some(hot.clone());

        let cold = cold.require()?;
        let hot = hot.require()?;
        if cold.temperature > hot.temperature {
            log::warn!(
                "Cold endmember ({:.2} K) is warmer than hot endmember ({:.2} K)",
                cold.temperature,
                hot.temperature
            );
        }

        let sensible = self.solver.solve(
            SensibleHeatInputs {
                savi: bands.get(Band::Savi)?,
                lst: bands.get(Band::LstDem)?,
                wind_speed: bands.get(Band::WindSpeed)?,
            },
            &cold,
            &hot,
        )?;
        diagnostics.dt_fit = Some(sensible.fit);
        diagnostics.stability_passes = sensible.pass_fits.clone();
        bands.extend_from(&sensible.bands)?;

        let et = self.estimator.compute(EtInputs {
            net_radiation: bands.get(Band::NetRadiation)?,
            soil_heat_flux: bands.get(Band::SoilHeatFlux)?,
            sensible_heat_flux: bands.get(Band::SensibleHeatFlux)?,
            lst: bands.get(Band::LstDem)?,
            net_radiation_24h: bands.get(Band::NetRadiation24h)?,
        })?;
        bands.extend_from(&et)?;

        let date = input.date();
        let rain = self.aggregator.aggregate(precipitation, date, &grid)?;
        diagnostics.missing_precipitation_days = rain.missing_days;
        bands.insert(Band::LastRain, rain.last_rain)?;
        bands.insert(Band::CumulativePrecipitation, rain.cumulative)?;
        bands.insert(Band::Year, Raster::constant(Arc::clone(&grid), date.year() as f64))?;
        bands.insert(Band::Month, Raster::constant(Arc::clone(&grid), date.month() as f64))?;
        bands.insert(Band::Day, Raster::constant(Arc::clone(&grid), date.day() as f64))?;

        diagnostics.valid_et_pixels = bands.get(Band::Et24h)?.valid_count();
        diagnostics.coverage_percent = if diagnostics.total_pixels > 0 {
            diagnostics.valid_et_pixels as f64 / diagnostics.total_pixels as f64 * 100.0
        } else {
            0.0
        };

        Ok(SceneProduct {
            scene_id: image.scene_id.clone(),
            date,
            bands,
            dt_fit: sensible.fit,
            cold,
            hot,
            diagnostics: diagnostics.clone(),
            et_band_name: self.config.et_band_name.clone(),
        })
    }

    /// Process scenes in parallel. A failed scene becomes a status row and
    /// never aborts the batch.
    pub fn run_batch(
        &self,
        inputs: &[SceneInput],
        weather: &dyn WeatherProvider,
        precipitation: &dyn PrecipitationProvider,
    ) -> Vec<SceneRecord> {
        log::info!("Running batch of {} scenes", inputs.len());
        let records: Vec<SceneRecord> = inputs
            .par_iter()
            .map(|input| self.record(input, weather, precipitation))
            .collect();
        let failed = records
            .iter()
            .filter(|r| matches!(r.status, SceneStatus::Failed { .. }))
            .count();
        log::info!("Batch finished: {} succeeded, {} failed", records.len() - failed, failed);
        records
    }

    fn record(
        &self,
        input: &SceneInput,
        weather: &dyn WeatherProvider,
        precipitation: &dyn PrecipitationProvider,
    ) -> SceneRecord {
        let outcome = self
            .run(input, weather, precipitation)
            .map_err(|f| (f.kind, f.message))
            .and_then(|product| {
                product
                    .summarize(&input.region)
                    .map_err(|e: EtError| (e.kind(), e.to_string()))
            });
        match outcome {
            Ok(summary) => SceneRecord {
                scene_id: input.image.scene_id.clone(),
                date: input.date(),
                status: SceneStatus::Succeeded,
                summary: Some(summary),
            },
            Err((kind, message)) => SceneRecord {
                scene_id: input.image.scene_id.clone(),
                date: input.date(),
                status: SceneStatus::Failed { kind, message },
                summary: None,
            },
        }
    }
}
