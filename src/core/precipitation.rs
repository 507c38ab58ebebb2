//! Days since last rain and cumulative prior precipitation

use crate::raster::Raster;
use crate::types::{EtError, EtResult, GridSpec};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Seconds covered by one six-hourly mean precipitation rate
const SIX_HOURS_SECONDS: f64 = 6.0 * 60.0 * 60.0;

/// Marks a pixel whose last rain has not been found yet
const UNRESOLVED: f64 = f64::NEG_INFINITY;

/// Daily precipitation totals by date
pub trait PrecipitationProvider: Sync {
    /// Total precipitation [mm] on `date`, `None` when the day is missing
    fn daily_total(&self, date: NaiveDate) -> Option<Raster>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecipitationParams {
    /// Days looked back for the last rain event
    pub window_days: u32,
    /// Days summed for the cumulative precipitation band
    pub cumulative_days: u32,
    /// Daily total [mm] above which a day counts as rainy
    pub rain_threshold_mm: f64,
    /// Value of `last_rain` when every day of the window was observed and
    /// none was rainy. Missing data is masked instead.
    pub no_rain_sentinel: f64,
}

impl Default for PrecipitationParams {
    fn default() -> Self {
        Self {
            window_days: 10,
            cumulative_days: 3,
            // 0.01 inch
            rain_threshold_mm: 0.254,
            no_rain_sentinel: 10.0,
        }
    }
}

impl PrecipitationParams {
    pub fn validate(&self) -> EtResult<()> {
        if self.window_days == 0 || self.cumulative_days == 0 {
            return Err(EtError::InvalidConfig(
                "precipitation windows must span at least one day".to_string(),
            ));
        }
        if self.cumulative_days > self.window_days {
            return Err(EtError::InvalidConfig(format!(
                "cumulative window ({} days) exceeds lookback window ({} days)",
                self.cumulative_days, self.window_days
            )));
        }
        if !self.no_rain_sentinel.is_finite() {
            return Err(EtError::InvalidConfig(format!(
                "no-rain value must be finite, got {}",
                self.no_rain_sentinel
            )));
        }
        Ok(())
    }
}

/// In-memory daily precipitation series on one grid
#[derive(Debug, Clone)]
pub struct DailyPrecipitationSeries {
    grid: Arc<GridSpec>,
    days: BTreeMap<NaiveDate, Raster>,
}

impl DailyPrecipitationSeries {
    pub fn new(grid: Arc<GridSpec>) -> Self {
        Self {
            grid,
            days: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, date: NaiveDate, total_mm: Raster) -> EtResult<()> {
        if **total_mm.grid() != *self.grid {
            return Err(EtError::GridMismatch {
                expected: self.grid.shape(),
                found: total_mm.shape(),
            });
        }
        self.days.insert(date, total_mm);
        Ok(())
    }

    /// Build daily totals from six-hourly mean precipitation rates
    /// [kg m-2 s-1], each sample covering the six hours from its timestamp
    pub fn from_six_hourly_rates(grid: Arc<GridSpec>, samples: &[(DateTime<Utc>, Raster)]) -> EtResult<Self> {
        let mut series = Self::new(grid);
        for (timestamp, rate) in samples {
            let amount = rate.map(|r| r * SIX_HOURS_SECONDS);
            let date = timestamp.date_naive();
            let total = match series.days.get(&date) {
                Some(sum) => sum.zip_map(&amount, |a, b| a + b)?,
                None => amount,
            };
            series.insert(date, total)?;
        }
        log::debug!("Built {} daily precipitation totals from {} samples", series.len(), samples.len());
        Ok(series)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

impl PrecipitationProvider for DailyPrecipitationSeries {
    fn daily_total(&self, date: NaiveDate) -> Option<Raster> {
        self.days.get(&date).cloned()
    }
}

/// Precipitation bands for one scene date
#[derive(Debug, Clone)]
pub struct PrecipitationBands {
    /// Days since the last rainy day, counted inclusively up to the scene date.
    /// Masked where a day newer than that rain has no observation.
    pub last_rain: Raster,
    /// Sum over the cumulative window [mm]
    pub cumulative: Raster,
    /// Days of the lookback window the provider had no data for, oldest first
    pub missing_days: Vec<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct PrecipitationAggregator {
    params: PrecipitationParams,
}

impl PrecipitationAggregator {
    pub fn new(params: PrecipitationParams) -> EtResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn standard() -> Self {
        Self {
            params: PrecipitationParams::default(),
        }
    }

    /// Aggregate the days `[date - window, date - 1]` onto `grid`
    pub fn aggregate(
        &self,
        provider: &dyn PrecipitationProvider,
        date: NaiveDate,
        grid: &Arc<GridSpec>,
    ) -> EtResult<PrecipitationBands> {
        let p = &self.params;
        let sentinel = p.no_rain_sentinel;
        let threshold = p.rain_threshold_mm;

        let mut last_rain = Raster::constant(Arc::clone(grid), UNRESOLVED);
        let mut cumulative = Raster::constant(Arc::clone(grid), 0.0);
        let mut missing_days = Vec::new();

        // Newest day first: each pixel settles on its first rainy day, or is
        // masked by the first day it has no observation for
        for lag in 1..=p.window_days {
            let day = date - Duration::days(lag as i64);
            let in_cumulative = lag <= p.cumulative_days;

            let total = match provider.daily_total(day) {
                Some(total) => total,
                None => {
                    log::warn!("No precipitation data for {}", day);
                    missing_days.push(day);
                    last_rain = last_rain.map(|v| if v == UNRESOLVED { f64::NAN } else { v });
                    if in_cumulative {
                        cumulative = Raster::masked(Arc::clone(grid));
                    }
                    continue;
                }
            };

            let days_since = (lag as f64 + 1.0).min(sentinel);
            last_rain = last_rain.zip_map(&total, move |current, mm| {
                if current != UNRESOLVED {
                    current
                } else if mm.is_nan() {
                    f64::NAN
                } else if mm > threshold {
                    days_since
                } else {
                    UNRESOLVED
                }
            })?;

            if in_cumulative {
                cumulative = cumulative.zip_map(&total, |sum, mm| sum + mm)?;
            }
        }
        // Observed on every day of the window without rain
        let last_rain = last_rain.map(move |v| if v == UNRESOLVED { sentinel } else { v });
        missing_days.reverse();

        log::debug!(
            "Precipitation for {}: {}-day lookback, {}-day sum, {} missing day(s)",
            date,
            p.window_days,
            p.cumulative_days,
            missing_days.len()
        );

        Ok(PrecipitationBands {
            last_rain,
            cumulative,
            missing_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    fn grid() -> Arc<GridSpec> {
        Arc::new(GridSpec::geographic(0.0, 0.0, 1.0, 1, 1))
    }

    #[test]
    fn test_no_rain_gives_sentinel() {
        let g = grid();
        let mut series = DailyPrecipitationSeries::new(Arc::clone(&g));
        let date = NaiveDate::from_ymd_opt(2021, 5, 20).unwrap();
        for lag in 1..=10 {
            series
                .insert(date - Duration::days(lag), Raster::constant(Arc::clone(&g), 0.1))
                .unwrap();
        }
        let bands = PrecipitationAggregator::standard().aggregate(&series, date, &g).unwrap();
        assert_eq!(bands.last_rain.get(0, 0), 10.0);
        assert_abs_diff_eq!(bands.cumulative.get(0, 0), 0.3, epsilon = 1e-12);
        assert!(bands.missing_days.is_empty());
    }

    fn series_with_gap(date: NaiveDate, missing_lag: i64, rain_lag: i64) -> DailyPrecipitationSeries {
        let g = grid();
        let mut series = DailyPrecipitationSeries::new(Arc::clone(&g));
        for lag in 1..=10 {
            if lag == missing_lag {
                continue;
            }
            let mm = if lag == rain_lag { 4.0 } else { 0.0 };
            series
                .insert(date - Duration::days(lag), Raster::constant(Arc::clone(&g), mm))
                .unwrap();
        }
        series
    }

    #[test]
    fn test_gap_newer_than_rain_masks_last_rain() {
        let date = NaiveDate::from_ymd_opt(2021, 5, 20).unwrap();
        let series = series_with_gap(date, 2, 6);
        let bands = PrecipitationAggregator::standard().aggregate(&series, date, &grid()).unwrap();
        assert_eq!(bands.missing_days, vec![date - Duration::days(2)]);
        assert!(bands.cumulative.get(0, 0).is_nan());
        assert!(bands.last_rain.get(0, 0).is_nan());
    }

    #[test]
    fn test_gap_older_than_rain_keeps_last_rain() {
        let date = NaiveDate::from_ymd_opt(2021, 5, 20).unwrap();
        let series = series_with_gap(date, 8, 6);
        let bands = PrecipitationAggregator::standard().aggregate(&series, date, &grid()).unwrap();
        assert_eq!(bands.last_rain.get(0, 0), 7.0);
        // Outside the three-day sum
        assert_eq!(bands.cumulative.get(0, 0), 0.0);
    }

    #[test]
    fn test_six_hourly_rates_sum_per_day() {
        let g = grid();
        let day = Utc.with_ymd_and_hms(2021, 5, 19, 0, 0, 0).unwrap();
        let rate = 1.0 / SIX_HOURS_SECONDS;
        let samples: Vec<_> = (0..4)
            .map(|i| (day + Duration::hours(6 * i), Raster::constant(Arc::clone(&g), rate)))
            .collect();
        let series = DailyPrecipitationSeries::from_six_hourly_rates(Arc::clone(&g), &samples).unwrap();
        assert_eq!(series.len(), 1);
        let total = series.daily_total(day.date_naive()).unwrap();
        assert_abs_diff_eq!(total.get(0, 0), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cumulative_window_longer_than_lookback_rejected() {
        let params = PrecipitationParams {
            window_days: 3,
            cumulative_days: 5,
            ..Default::default()
        };
        assert!(PrecipitationAggregator::new(params).is_err());
    }
}
