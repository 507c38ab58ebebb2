mod common;

use approx::assert_abs_diff_eq;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use sebal_et::io::meteorology::{
    extraterrestrial_radiation_24h, net_radiation_24h, relative_humidity, wind_speed_at_2m, HourlyRadiation,
    InMemoryWeather, ReanalysisSnapshot, WeatherProvider,
};
use sebal_et::{EtError, Raster, WeatherContext};
use std::sync::Arc;

/// Reanalysis archive whose radiation fields were never downloaded
struct SnapshotsOnly(InMemoryWeather);

impl WeatherProvider for SnapshotsOnly {
    fn previous_snapshot(&self, t: DateTime<Utc>) -> Option<&ReanalysisSnapshot> {
        self.0.previous_snapshot(t)
    }

    fn next_snapshot(&self, t: DateTime<Utc>) -> Option<&ReanalysisSnapshot> {
        self.0.next_snapshot(t)
    }

    fn hourly_shortwave(&self, _start: DateTime<Utc>, _end: DateTime<Utc>) -> Vec<&HourlyRadiation> {
        Vec::new()
    }
}

fn scene_rasters() -> (Raster, Raster) {
    let grid = common::grid();
    (Raster::constant(Arc::clone(&grid), 0.2), Raster::constant(grid, -10.0))
}

#[test]
fn test_context_interpolates_between_snapshots() {
    common::init_logging();
    let grid = common::grid();
    let weather = common::weather(&grid);
    let (albedo, latitude) = scene_rasters();
    let t = common::acquisition();

    let context = WeatherContext::at(&weather, t, &albedo, &latitude).unwrap();

    // Halfway between 12:00 (300 K) and 15:00 (301 K)
    assert_abs_diff_eq!(context.air_temperature.get(0, 0), 300.5 - 273.15, epsilon = 1e-9);
    assert_abs_diff_eq!(context.wind_speed.get(1, 1), wind_speed_at_2m(3.0f64.hypot(1.5)), epsilon = 1e-12);
    assert_abs_diff_eq!(
        context.relative_humidity.get(2, 2),
        relative_humidity(0.012, 98.0, 300.5 - 273.15),
        epsilon = 1e-9
    );

    // Twenty-four hourly fields of 0.9 MJ m-2
    assert_abs_diff_eq!(context.shortwave_down_24h.get(0, 0), 250.0, epsilon = 1e-9);
    let ra = extraterrestrial_radiation_24h(-10.0, t.ordinal());
    assert_abs_diff_eq!(
        context.net_radiation_24h.get(4, 4),
        net_radiation_24h(0.2, 250.0, ra),
        epsilon = 1e-9
    );

    let bands = context.to_bands().unwrap();
    assert_eq!(bands.len(), 5);
}

#[test]
fn test_missing_hourly_radiation_is_reported() {
    let grid = common::grid();
    let provider = SnapshotsOnly(common::weather(&grid));
    let (albedo, latitude) = scene_rasters();

    let err = WeatherContext::at(&provider, common::acquisition(), &albedo, &latitude).unwrap_err();
    match err {
        EtError::MissingWeatherData { timestamp, .. } => assert_eq!(timestamp, common::acquisition()),
        other => panic!("expected MissingWeatherData, got {:?}", other),
    }
}

#[test]
fn test_partial_radiation_day_still_accumulates() {
    common::init_logging();
    let grid = common::grid();
    let t = common::acquisition();
    let mut weather = InMemoryWeather::new();
    for (offset, t_k) in [(-2, 298.0), (1, 300.0)] {
        weather.add_snapshot(ReanalysisSnapshot {
            timestamp: t + Duration::hours(offset),
            air_temperature_k: Raster::constant(Arc::clone(&grid), t_k),
            u_wind_10m: Raster::constant(Arc::clone(&grid), 2.0),
            v_wind_10m: Raster::constant(Arc::clone(&grid), 0.0),
            surface_pressure_pa: Raster::constant(Arc::clone(&grid), 101_300.0),
            specific_humidity: Raster::constant(Arc::clone(&grid), 0.008),
        });
    }
    let morning = Utc.with_ymd_and_hms(2021, 8, 10, 3, 0, 0).unwrap();
    for hour in 0..12 {
        weather.add_hourly(HourlyRadiation {
            timestamp: morning + Duration::hours(hour),
            ssrd_j_m2: Raster::constant(Arc::clone(&grid), 1_800_000.0),
        });
    }
    assert_eq!(weather.snapshot_count(), 2);

    let (albedo, latitude) = scene_rasters();
    let context = WeatherContext::at(&weather, t, &albedo, &latitude).unwrap();

    assert_abs_diff_eq!(context.shortwave_down_24h.get(0, 0), 250.0, epsilon = 1e-9);
    // Two thirds of the way from 298 K to 300 K
    assert_abs_diff_eq!(context.air_temperature.get(0, 0), 299.0 + 1.0 / 3.0 - 273.15, epsilon = 1e-9);
}

#[test]
fn test_snapshot_gap_wider_than_bracket_fails() {
    let grid = common::grid();
    let mut weather = common::weather(&grid);
    let late = common::acquisition() + Duration::days(2);
    weather.add_hourly(HourlyRadiation {
        timestamp: late,
        ssrd_j_m2: Raster::constant(Arc::clone(&grid), 0.0),
    });
    let (albedo, latitude) = scene_rasters();
    let err = WeatherContext::at(&weather, late, &albedo, &latitude).unwrap_err();
    assert_eq!(err.kind(), sebal_et::FailureKind::MissingWeatherData);
}
