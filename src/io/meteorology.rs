//! Reanalysis weather at the acquisition time
//!
//! Instantaneous fields are linearly interpolated between the snapshot
//! preceding the acquisition and the one following it. Daily shortwave and
//! net radiation are accumulated from hourly fields around the acquisition.

use crate::constants::{
    EPSILON_WATER_AIR, KELVIN_OFFSET, MJ_HOURLY_TO_WATTS, SECONDS_PER_DAY, SOLAR_CONSTANT_HOURLY_MJ,
};
use crate::core::solar::{declination_asce, inverse_relative_distance, saturation_vapor_pressure};
use crate::raster::{BandSet, Raster};
use crate::types::{Band, EtError, EtResult, GridSpec};
use chrono::{DateTime, Datelike, Duration, Utc};
use std::f64::consts::PI;
use std::sync::Arc;

/// Maximum distance between the acquisition and a bracketing snapshot
pub const BRACKET_HOURS: i64 = 3;
/// Daily radiation window relative to the acquisition: `[t - 11h, t + 13h)`
pub const DAILY_WINDOW_BEFORE_HOURS: i64 = 11;
pub const DAILY_WINDOW_AFTER_HOURS: i64 = 13;
/// De Bruin (1982) net longwave coefficient [W m-2]
const DE_BRUIN_COEFFICIENT: f64 = 110.0;
/// Height of reanalysis wind [m]
const REANALYSIS_WIND_HEIGHT: f64 = 10.0;

/// One reanalysis time step resampled onto the scene grid
#[derive(Debug, Clone)]
pub struct ReanalysisSnapshot {
    pub timestamp: DateTime<Utc>,
    /// 2 m air temperature [K]
    pub air_temperature_k: Raster,
    /// 10 m wind components [m s-1]
    pub u_wind_10m: Raster,
    pub v_wind_10m: Raster,
    /// Surface pressure [Pa]
    pub surface_pressure_pa: Raster,
    /// Specific humidity [kg kg-1]
    pub specific_humidity: Raster,
}

impl ReanalysisSnapshot {
    fn fields(&self) -> [&Raster; 5] {
        [
            &self.air_temperature_k,
            &self.u_wind_10m,
            &self.v_wind_10m,
            &self.surface_pressure_pa,
            &self.specific_humidity,
        ]
    }
}

/// Hourly accumulated surface shortwave radiation downwards [J m-2]
#[derive(Debug, Clone)]
pub struct HourlyRadiation {
    pub timestamp: DateTime<Utc>,
    pub ssrd_j_m2: Raster,
}

/// Source of reanalysis fields for the pipeline
pub trait WeatherProvider: Sync {
    /// Latest snapshot in `[t - 3h, t)`
    fn previous_snapshot(&self, t: DateTime<Utc>) -> Option<&ReanalysisSnapshot>;

    /// Earliest snapshot in `[t, t + 3h)`
    fn next_snapshot(&self, t: DateTime<Utc>) -> Option<&ReanalysisSnapshot>;

    /// Hourly shortwave accumulations with timestamps in `[start, end)`
    fn hourly_shortwave(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&HourlyRadiation>;
}

/// Weather provider over snapshots held in memory, kept sorted by time
#[derive(Debug, Clone, Default)]
pub struct InMemoryWeather {
    snapshots: Vec<ReanalysisSnapshot>,
    hourly: Vec<HourlyRadiation>,
}

impl InMemoryWeather {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_snapshot(&mut self, snapshot: ReanalysisSnapshot) {
        let idx = self.snapshots.partition_point(|s| s.timestamp <= snapshot.timestamp);
        self.snapshots.insert(idx, snapshot);
    }

    pub fn add_hourly(&mut self, radiation: HourlyRadiation) {
        let idx = self.hourly.partition_point(|h| h.timestamp <= radiation.timestamp);
        self.hourly.insert(idx, radiation);
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }
}

impl WeatherProvider for InMemoryWeather {
    fn previous_snapshot(&self, t: DateTime<Utc>) -> Option<&ReanalysisSnapshot> {
        // First index at or after t; the one before it is the latest earlier snapshot
        let idx = self.snapshots.partition_point(|s| s.timestamp < t);
        let candidate = self.snapshots.get(idx.checked_sub(1)?)?;
        (candidate.timestamp >= t - Duration::hours(BRACKET_HOURS)).then_some(candidate)
    }

    fn next_snapshot(&self, t: DateTime<Utc>) -> Option<&ReanalysisSnapshot> {
        let idx = self.snapshots.partition_point(|s| s.timestamp < t);
        let candidate = self.snapshots.get(idx)?;
        (candidate.timestamp < t + Duration::hours(BRACKET_HOURS)).then_some(candidate)
    }

    fn hourly_shortwave(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&HourlyRadiation> {
        let from = self.hourly.partition_point(|h| h.timestamp < start);
        let to = self.hourly.partition_point(|h| h.timestamp < end);
        self.hourly[from..to].iter().collect()
    }
}

/// Weather fields at the acquisition time on the scene grid
#[derive(Debug, Clone)]
pub struct WeatherContext {
    pub timestamp: DateTime<Utc>,
    /// Air temperature [degC]
    pub air_temperature: Raster,
    /// Wind speed at 2 m [m s-1]
    pub wind_speed: Raster,
    /// Relative humidity [%]
    pub relative_humidity: Raster,
    /// Daily net radiation [W m-2]
    pub net_radiation_24h: Raster,
    /// Daily mean incoming shortwave [W m-2]
    pub shortwave_down_24h: Raster,
}

impl WeatherContext {
    /// Interpolate the weather at `t` for a scene with the given albedo and
    /// latitude [deg] rasters
    pub fn at(provider: &dyn WeatherProvider, t: DateTime<Utc>, albedo: &Raster, latitude: &Raster) -> EtResult<Self> {
        let grid = albedo.grid();
        let previous = provider.previous_snapshot(t).ok_or_else(|| EtError::MissingWeatherData {
            timestamp: t,
            reason: format!("no reanalysis snapshot within {}h before acquisition", BRACKET_HOURS),
        })?;
        let next = provider.next_snapshot(t).ok_or_else(|| EtError::MissingWeatherData {
            timestamp: t,
            reason: format!("no reanalysis snapshot within {}h after acquisition", BRACKET_HOURS),
        })?;
        for field in previous.fields().into_iter().chain(next.fields()) {
            check_grid(grid, field)?;
        }

        let delta = interpolation_weight(previous.timestamp, next.timestamp, t);
        log::debug!(
            "Weather at {}: bracketed by {} and {} (delta = {:.3})",
            t,
            previous.timestamp,
            next.timestamp,
            delta
        );

        let lerp = |a: &Raster, b: &Raster| a.zip_map(b, move |a, b| a + (b - a) * delta);

        let air_temperature_k = lerp(&previous.air_temperature_k, &next.air_temperature_k)?;
        let u = lerp(&previous.u_wind_10m, &next.u_wind_10m)?;
        let v = lerp(&previous.v_wind_10m, &next.v_wind_10m)?;
        let pressure_kpa = lerp(&previous.surface_pressure_pa, &next.surface_pressure_pa)?.map(|p| p / 1000.0);
        let specific_humidity = lerp(&previous.specific_humidity, &next.specific_humidity)?;

        let air_temperature = air_temperature_k.map(|t| t - KELVIN_OFFSET);
        let wind_speed = u.zip_map(&v, |u, v| wind_speed_at_2m(u.hypot(v)))?;
        let relative_humidity =
            Raster::combine(&[&specific_humidity, &pressure_kpa, &air_temperature], |v| {
                relative_humidity(v[0], v[1], v[2])
            })?;

        let shortwave_down_24h = daily_shortwave(provider, t, grid)?;
        let ra_24h = latitude.map({
            let doy = t.ordinal();
            move |lat| extraterrestrial_radiation_24h(lat, doy)
        });
        let net_radiation_24h = albedo.zip3_map(&shortwave_down_24h, &ra_24h, net_radiation_24h)?;

        Ok(Self {
            timestamp: t,
            air_temperature,
            wind_speed,
            relative_humidity,
            net_radiation_24h,
            shortwave_down_24h,
        })
    }

    pub fn to_bands(&self) -> EtResult<BandSet> {
        BandSet::new(self.air_temperature.grid().clone())
            .with(Band::AirTemperature, self.air_temperature.clone())?
            .with(Band::WindSpeed, self.wind_speed.clone())?
            .with(Band::RelativeHumidity, self.relative_humidity.clone())?
            .with(Band::NetRadiation24h, self.net_radiation_24h.clone())?
            .with(Band::ShortwaveDown24h, self.shortwave_down_24h.clone())
    }
}

fn check_grid(grid: &Arc<GridSpec>, raster: &Raster) -> EtResult<()> {
    if **raster.grid() != **grid {
        return Err(EtError::GridMismatch {
            expected: grid.shape(),
            found: raster.shape(),
        });
    }
    Ok(())
}

/// Fraction of the way from `previous` to `next` at which `t` lies
pub fn interpolation_weight(previous: DateTime<Utc>, next: DateTime<Utc>, t: DateTime<Utc>) -> f64 {
    let span = (next - previous).num_milliseconds() as f64;
    if span <= 0.0 {
        return 0.0;
    }
    (t - previous).num_milliseconds() as f64 / span
}

/// Log-profile adjustment of a 10 m wind speed to 2 m (Allen et al. 1998)
pub fn wind_speed_at_2m(speed_10m: f64) -> f64 {
    speed_10m * 4.87 / (67.8 * REANALYSIS_WIND_HEIGHT - 5.42).ln()
}

/// Relative humidity [%] from specific humidity [kg kg-1], pressure [kPa]
/// and air temperature [degC]
pub fn relative_humidity(specific_humidity: f64, pressure_kpa: f64, t_air_c: f64) -> f64 {
    let ea = specific_humidity * pressure_kpa / EPSILON_WATER_AIR;
    100.0 * ea / saturation_vapor_pressure(t_air_c)
}

/// Daily extraterrestrial radiation [W m-2] at a latitude (ASCE 2005)
pub fn extraterrestrial_radiation_24h(latitude_deg: f64, day_of_year: u32) -> f64 {
    let phi = latitude_deg.to_radians();
    let delta = declination_asce(day_of_year);
    let dr = inverse_relative_distance(day_of_year);
    // Polar day and night saturate the sunset hour angle
    let omega = (-phi.tan() * delta.tan()).clamp(-1.0, 1.0).acos();
    (24.0 / PI)
        * SOLAR_CONSTANT_HOURLY_MJ
        * dr
        * (omega * phi.sin() * delta.sin() + phi.cos() * delta.cos() * omega.sin())
        * MJ_HOURLY_TO_WATTS
}

/// Daily net radiation [W m-2] (de Bruin 1982)
pub fn net_radiation_24h(albedo: f64, rs_24h: f64, ra_24h: f64) -> f64 {
    (1.0 - albedo) * rs_24h - DE_BRUIN_COEFFICIENT * rs_24h / ra_24h
}

fn daily_shortwave(provider: &dyn WeatherProvider, t: DateTime<Utc>, grid: &Arc<GridSpec>) -> EtResult<Raster> {
    let start = t - Duration::hours(DAILY_WINDOW_BEFORE_HOURS);
    let end = t + Duration::hours(DAILY_WINDOW_AFTER_HOURS);
    let hours = provider.hourly_shortwave(start, end);
    if hours.is_empty() {
        return Err(EtError::MissingWeatherData {
            timestamp: t,
            reason: format!("no hourly shortwave radiation between {} and {}", start, end),
        });
    }
    if hours.len() < 24 {
        log::warn!("Only {} of 24 hourly shortwave fields around {}", hours.len(), t);
    }

    let mut total = Raster::constant(Arc::clone(grid), 0.0);
    for hour in hours {
        check_grid(grid, &hour.ssrd_j_m2)?;
        total = total.zip_map(&hour.ssrd_j_m2, |a, b| a + b)?;
    }
    Ok(total.map(|j| j / SECONDS_PER_DAY))
}
