#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use sebal_et::core::pipeline::{SceneImage, SceneInput};
use sebal_et::core::precipitation::DailyPrecipitationSeries;
use sebal_et::io::meteorology::{HourlyRadiation, InMemoryWeather, ReanalysisSnapshot};
use sebal_et::{Band, BandSet, Geometry, GridSpec, Raster, Sensor, Terrain};
use std::sync::Arc;

pub const ROWS: usize = 5;
pub const COLS: usize = 5;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn grid() -> Arc<GridSpec> {
    Arc::new(GridSpec::geographic(-50.0, -10.0, 0.001, ROWS, COLS))
}

pub fn acquisition() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 8, 10, 13, 30, 0).unwrap()
}

/// Vegetation fraction rising from 0 at (0, 0) to 1 at the last pixel
fn cover(row: usize, col: usize) -> f64 {
    (row * COLS + col) as f64 / (ROWS * COLS - 1) as f64
}

/// Landsat 7 image from bare hot soil at (0, 0) to cool dense crop at (4, 4)
pub fn image(grid: &Arc<GridSpec>, scene_id: &str, acquired: DateTime<Utc>) -> SceneImage {
    let band = |f: fn(f64) -> f64| Raster::from_fn(Arc::clone(grid), |r, c| f(cover(r, c)));
    let bands = BandSet::new(Arc::clone(grid))
        .with(Band::Blue, band(|f| 0.08 - 0.04 * f))
        .unwrap()
        .with(Band::Green, band(|f| 0.10 - 0.03 * f))
        .unwrap()
        .with(Band::Red, band(|f| 0.20 - 0.16 * f))
        .unwrap()
        .with(Band::Nir, band(|f| 0.22 + 0.23 * f))
        .unwrap()
        .with(Band::Swir1, band(|f| 0.30 - 0.15 * f))
        .unwrap()
        .with(Band::Swir2, band(|f| 0.22 - 0.14 * f))
        .unwrap()
        .with(Band::BrightnessTemperature, band(|f| 320.0 - 30.0 * f))
        .unwrap();
    SceneImage {
        scene_id: scene_id.to_string(),
        sensor: Sensor::Landsat7,
        acquired,
        sun_elevation_deg: 52.0,
        bands,
    }
}

pub fn terrain(grid: &Arc<GridSpec>) -> Terrain {
    Terrain::from_dem(Raster::constant(Arc::clone(grid), 120.0)).unwrap()
}

pub fn scene(grid: &Arc<GridSpec>, scene_id: &str, acquired: DateTime<Utc>) -> SceneInput {
    SceneInput {
        image: image(grid, scene_id, acquired),
        terrain: terrain(grid),
        region: Geometry::Bounds,
    }
}

fn snapshot(grid: &Arc<GridSpec>, timestamp: DateTime<Utc>, air_temperature_k: f64) -> ReanalysisSnapshot {
    let constant = |v: f64| Raster::constant(Arc::clone(grid), v);
    ReanalysisSnapshot {
        timestamp,
        air_temperature_k: constant(air_temperature_k),
        u_wind_10m: constant(3.0),
        v_wind_10m: constant(1.5),
        surface_pressure_pa: constant(98_000.0),
        specific_humidity: constant(0.012),
    }
}

/// Three-hourly snapshots and hourly shortwave covering the acquisition day
pub fn weather(grid: &Arc<GridSpec>) -> InMemoryWeather {
    let mut weather = InMemoryWeather::new();
    let day = Utc.with_ymd_and_hms(2021, 8, 10, 0, 0, 0).unwrap();
    for step in 0..8 {
        weather.add_snapshot(snapshot(grid, day + Duration::hours(3 * step), 296.0 + step as f64));
    }
    for hour in -12..36 {
        weather.add_hourly(HourlyRadiation {
            timestamp: day + Duration::hours(hour),
            ssrd_j_m2: Raster::constant(Arc::clone(grid), 900_000.0),
        });
    }
    weather
}

/// Daily totals for the ten days before `date`, oldest first
pub fn precipitation(grid: &Arc<GridSpec>, date: NaiveDate, totals_mm: &[f64]) -> DailyPrecipitationSeries {
    let mut series = DailyPrecipitationSeries::new(Arc::clone(grid));
    let n = totals_mm.len() as i64;
    for (i, &mm) in totals_mm.iter().enumerate() {
        let day = date - Duration::days(n - i as i64);
        series.insert(day, Raster::constant(Arc::clone(grid), mm)).unwrap();
    }
    series
}
