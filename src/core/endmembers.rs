//! Automatic cold and hot endmember selection
//!
//! The cold endmember is a well-watered, fully vegetated pixel: high NDVI and
//! low surface temperature. The hot endmember is dry bare soil: low NDVI and
//! high surface temperature. Both are found with two nested percentile
//! thresholds, first on NDVI over the region of interest, then on surface
//! temperature within the NDVI candidates.
//!
//! When the NDVI candidate set is empty the NDVI percentile is doubled until a
//! candidate appears or `max_ndvi_percentile` has been tried.

use crate::raster::{mask_and, percentile_nearest_rank, Mask, Raster, Reducer};
use crate::types::{EndmemberKind, EtError, EtResult};
use serde::{Deserialize, Serialize};

/// How the final candidate pixels are reduced to one representative value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndmemberReducer {
    /// First pixel in row-major order
    First,
    /// Mean over the final candidate set
    Mean,
}

/// Endmember search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndmemberParams {
    /// Percentile from the top of the NDVI distribution for cold candidates
    pub p_top_ndvi: f64,
    /// Percentile from the bottom of the candidate temperatures for the cold pixel
    pub p_coldest_ts: f64,
    /// Percentile from the bottom of the NDVI distribution for hot candidates
    pub p_lowest_ndvi: f64,
    /// Percentile from the top of the candidate temperatures for the hot pixel
    pub p_hottest_ts: f64,
    /// Upper limit of the NDVI percentile relaxation ladder
    pub max_ndvi_percentile: f64,
    /// Half-width [K] of the temperature band around the temperature threshold
    pub temperature_tolerance: f64,
    /// Surface temperatures below this [K] are treated as invalid
    pub min_valid_temperature: f64,
    pub reducer: EndmemberReducer,
}

impl Default for EndmemberParams {
    fn default() -> Self {
        // Allen et al. (2013)
        Self {
            p_top_ndvi: 5.0,
            p_coldest_ts: 20.0,
            p_lowest_ndvi: 10.0,
            p_hottest_ts: 20.0,
            max_ndvi_percentile: 50.0,
            temperature_tolerance: 0.5,
            min_valid_temperature: 200.0,
            reducer: EndmemberReducer::First,
        }
    }
}

impl EndmemberParams {
    pub fn validate(&self) -> EtResult<()> {
        let percentiles = [
            ("p_top_ndvi", self.p_top_ndvi),
            ("p_coldest_ts", self.p_coldest_ts),
            ("p_lowest_ndvi", self.p_lowest_ndvi),
            ("p_hottest_ts", self.p_hottest_ts),
            ("max_ndvi_percentile", self.max_ndvi_percentile),
        ];
        for (name, p) in percentiles {
            if !(p > 0.0 && p <= 100.0) {
                return Err(EtError::InvalidConfig(format!("{} must be in (0, 100], got {}", name, p)));
            }
        }
        if self.temperature_tolerance < 0.0 || !self.temperature_tolerance.is_finite() {
            return Err(EtError::InvalidConfig(format!(
                "temperature_tolerance must be a non-negative number, got {}",
                self.temperature_tolerance
            )));
        }
        Ok(())
    }

    /// NDVI percentiles tried in order, starting at `start`
    pub fn relaxation_ladder(&self, start: f64) -> Vec<f64> {
        let mut ladder = vec![start];
        let mut p = start;
        while p < self.max_ndvi_percentile {
            p = (p * 2.0).min(self.max_ndvi_percentile);
            ladder.push(p);
        }
        ladder
    }
}

/// Location and temperature of an endmember, before its energy fluxes are known
#[derive(Debug, Clone)]
pub struct EndmemberSearch {
    pub kind: EndmemberKind,
    pub temperature: f64,
    pub ndvi_threshold: f64,
    /// NDVI percentile that produced a non-empty candidate set
    pub ndvi_percentile: f64,
    pub temperature_threshold: f64,
    /// First selected pixel (row, col)
    pub pixel: (usize, usize),
    pub candidate_count: usize,
    /// Pixels in the final temperature band
    pub pixel_count: usize,
    pub relaxation_steps: usize,
    /// Final selection the representative values are reduced over
    pub selection: Mask,
    reducer: EndmemberReducer,
}

impl EndmemberSearch {
    /// Sample net radiation and soil heat flux over the selection
    pub fn resolve(self, net_radiation: &Raster, soil_heat_flux: &Raster) -> EtResult<Endmember> {
        let sample = |raster: &Raster| -> EtResult<Option<f64>> {
            match self.reducer {
                EndmemberReducer::First => Ok(raster.sample(self.pixel.0, self.pixel.1)),
                EndmemberReducer::Mean => Reducer::Mean.reduce(raster, &self.selection),
            }
        };
        let rn = sample(net_radiation)?;
        let g = sample(soil_heat_flux)?;

        log::debug!(
            "{} endmember: T={:.2} K, Rn={:?}, G={:?}, NDVI threshold {:.3} (p{}), pixel {:?}",
            self.kind,
            self.temperature,
            rn,
            g,
            self.ndvi_threshold,
            self.ndvi_percentile,
            self.pixel
        );

        Ok(Endmember {
            kind: self.kind,
            temperature: self.temperature,
            net_radiation: rn,
            soil_heat_flux: g,
            ndvi_threshold: self.ndvi_threshold,
            ndvi_percentile: self.ndvi_percentile,
            pixel: self.pixel,
            pixel_count: self.pixel_count,
            relaxation_steps: self.relaxation_steps,
            selection: self.selection,
            reducer: self.reducer,
        })
    }
}

/// Calibration pixel produced once per scene
#[derive(Debug, Clone, Serialize)]
pub struct Endmember {
    pub kind: EndmemberKind,
    /// Surface temperature [K]
    pub temperature: f64,
    /// Net radiation [W m-2], `None` when masked at the selected pixels
    pub net_radiation: Option<f64>,
    /// Soil heat flux [W m-2], `None` when masked at the selected pixels
    pub soil_heat_flux: Option<f64>,
    pub ndvi_threshold: f64,
    pub ndvi_percentile: f64,
    pub pixel: (usize, usize),
    pub pixel_count: usize,
    pub relaxation_steps: usize,
    #[serde(skip)]
    pub selection: Mask,
    #[serde(skip)]
    reducer: EndmemberReducer,
}

impl Endmember {
    /// Endmember pinned to a known pixel, e.g. from field calibration
    pub fn at_pixel(
        kind: EndmemberKind,
        pixel: (usize, usize),
        shape: (usize, usize),
        temperature: f64,
        net_radiation: Option<f64>,
        soil_heat_flux: Option<f64>,
    ) -> Self {
        let mut selection = Mask::from_elem(shape, false);
        if let Some(cell) = selection.get_mut(pixel) {
            *cell = true;
        }
        Self {
            kind,
            temperature,
            net_radiation,
            soil_heat_flux,
            ndvi_threshold: f64::NAN,
            ndvi_percentile: f64::NAN,
            pixel,
            pixel_count: 1,
            relaxation_steps: 0,
            selection,
            reducer: EndmemberReducer::First,
        }
    }

    /// Available energy Rn - G at the endmember
    pub fn available_energy(&self) -> Option<f64> {
        Some(self.net_radiation? - self.soil_heat_flux?)
    }

    /// Reduce any raster over this endmember's selection
    pub fn sample(&self, raster: &Raster) -> EtResult<Option<f64>> {
        match self.reducer {
            EndmemberReducer::First => Ok(raster.sample(self.pixel.0, self.pixel.1)),
            EndmemberReducer::Mean => Reducer::Mean.reduce(raster, &self.selection),
        }
    }
}

/// Result of an endmember search
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Located(EndmemberSearch),
    /// No candidate even at the top of the relaxation ladder
    Unavailable {
        kind: EndmemberKind,
        percentiles_tried: Vec<f64>,
    },
}

impl SearchOutcome {
    pub fn temperature(&self) -> Option<f64> {
        match self {
            SearchOutcome::Located(search) => Some(search.temperature),
            SearchOutcome::Unavailable { .. } => None,
        }
    }

    pub fn resolve(self, net_radiation: &Raster, soil_heat_flux: &Raster) -> EtResult<EndmemberStatus> {
        match self {
            SearchOutcome::Located(search) => Ok(EndmemberStatus::Found(search.resolve(net_radiation, soil_heat_flux)?)),
            SearchOutcome::Unavailable { kind, percentiles_tried } => {
                Ok(EndmemberStatus::Unavailable { kind, percentiles_tried })
            }
        }
    }
}

/// Endmember or an explicit marker that none qualified
#[derive(Debug, Clone, Serialize)]
pub enum EndmemberStatus {
    Found(Endmember),
    Unavailable {
        kind: EndmemberKind,
        percentiles_tried: Vec<f64>,
    },
}

impl EndmemberStatus {
    pub fn endmember(&self) -> Option<&Endmember> {
        match self {
            EndmemberStatus::Found(e) => Some(e),
            EndmemberStatus::Unavailable { .. } => None,
        }
    }

    /// The endmember, or `EndmemberSearchFailed`
    pub fn require(self) -> EtResult<Endmember> {
        match self {
            EndmemberStatus::Found(e) => Ok(e),
            EndmemberStatus::Unavailable { kind, percentiles_tried } => Err(EtError::EndmemberSearchFailed {
                kind,
                percentiles: percentiles_tried,
            }),
        }
    }
}

/// Rasters used to qualify hot endmember candidates
#[derive(Debug, Clone, Copy)]
pub struct HotInputs<'a> {
    pub ndvi: &'a Raster,
    pub lst: &'a Raster,
    pub net_radiation: &'a Raster,
    pub soil_heat_flux: &'a Raster,
}

/// Percentile-based endmember selector
#[derive(Debug, Clone)]
pub struct EndmemberSelector {
    params: EndmemberParams,
}

impl EndmemberSelector {
    pub fn new(params: EndmemberParams) -> EtResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn standard() -> Self {
        Self {
            params: EndmemberParams::default(),
        }
    }

    pub fn params(&self) -> &EndmemberParams {
        &self.params
    }

    /// Locate the cold endmember from NDVI and surface temperature
    pub fn search_cold(&self, ndvi: &Raster, lst: &Raster, region: &Mask) -> EtResult<SearchOutcome> {
        let valid = self.valid_temperature(lst, region)?;
        self.search(EndmemberKind::Cold, ndvi, lst, &valid, region)
    }

    /// Locate the hot endmember; candidates also need valid Rn and G
    pub fn search_hot(&self, inputs: HotInputs<'_>, region: &Mask) -> EtResult<SearchOutcome> {
        let valid = self.valid_temperature(inputs.lst, region)?;
        let valid = mask_and(&valid, &inputs.net_radiation.valid_mask())?;
        let valid = mask_and(&valid, &inputs.soil_heat_flux.valid_mask())?;
        self.search(EndmemberKind::Hot, inputs.ndvi, inputs.lst, &valid, region)
    }

    /// Search and resolve the cold endmember in one step
    pub fn select_cold(
        &self,
        ndvi: &Raster,
        lst: &Raster,
        net_radiation: &Raster,
        soil_heat_flux: &Raster,
        region: &Mask,
    ) -> EtResult<EndmemberStatus> {
        self.search_cold(ndvi, lst, region)?
            .resolve(net_radiation, soil_heat_flux)
    }

    /// Search and resolve the hot endmember in one step
    pub fn select_hot(&self, inputs: HotInputs<'_>, region: &Mask) -> EtResult<EndmemberStatus> {
        self.search_hot(inputs, region)?
            .resolve(inputs.net_radiation, inputs.soil_heat_flux)
    }

    fn valid_temperature(&self, lst: &Raster, region: &Mask) -> EtResult<Mask> {
        let min_t = self.params.min_valid_temperature;
        mask_and(region, &lst.mask_from(|t| t >= min_t))
    }

    fn search(
        &self,
        kind: EndmemberKind,
        ndvi: &Raster,
        lst: &Raster,
        valid: &Mask,
        region: &Mask,
    ) -> EtResult<SearchOutcome> {
        let (start, ts_percentile) = match kind {
            EndmemberKind::Cold => (self.params.p_top_ndvi, self.params.p_coldest_ts),
            EndmemberKind::Hot => (self.params.p_lowest_ndvi, self.params.p_hottest_ts),
        };

        // NDVI values in the region, sorted so that the selected tail comes first
        let mut region_ndvi: Vec<f64> = ndvi
            .data()
            .iter()
            .zip(region.iter())
            .filter(|&(v, &inside)| inside && v.is_finite())
            .map(|(&v, _)| v)
            .collect();
        match kind {
            EndmemberKind::Cold => region_ndvi.sort_by(|a, b| b.total_cmp(a)),
            EndmemberKind::Hot => region_ndvi.sort_by(|a, b| a.total_cmp(b)),
        }

        let mut tried = Vec::new();
        for (step, percentile) in self.params.relaxation_ladder(start).into_iter().enumerate() {
            tried.push(percentile);

            let ndvi_threshold = match percentile_nearest_rank(&region_ndvi, percentile) {
                Some(t) => t,
                None => break,
            };
            let candidates = match kind {
                EndmemberKind::Cold => ndvi.mask_from(|v| v >= ndvi_threshold),
                EndmemberKind::Hot => ndvi.mask_from(|v| v <= ndvi_threshold),
            };
            let candidates = mask_and(&candidates, valid)?;
            let candidate_count = candidates.iter().filter(|&&c| c).count();

            if candidate_count == 0 {
                log::warn!(
                    "No {} endmember candidates at NDVI percentile {} (threshold {:.3}), relaxing",
                    kind,
                    percentile,
                    ndvi_threshold
                );
                continue;
            }

            let temperature_threshold = match kind {
                EndmemberKind::Cold => Reducer::Percentile(ts_percentile).reduce(lst, &candidates)?,
                EndmemberKind::Hot => Reducer::Percentile(ts_percentile)
                    .reduce(&lst.map(|t| -t), &candidates)?
                    .map(|t| -t),
            };
            let temperature_threshold = temperature_threshold.ok_or_else(|| {
                EtError::Processing(format!("{} candidates lost their temperatures", kind))
            })?;

            let tolerance = self.params.temperature_tolerance;
            let band = lst.mask_from(|t| (t - temperature_threshold).abs() <= tolerance);
            let selection = mask_and(&band, &candidates)?;
            let pixel_count = selection.iter().filter(|&&s| s).count();
            let pixel = selection
                .indexed_iter()
                .find(|&(_, &s)| s)
                .map(|(idx, _)| idx)
                .ok_or_else(|| EtError::Processing(format!("{} endmember selection is empty", kind)))?;

            let temperature = match self.params.reducer {
                EndmemberReducer::First => lst.get(pixel.0, pixel.1),
                EndmemberReducer::Mean => Reducer::Mean
                    .reduce(lst, &selection)?
                    .unwrap_or(temperature_threshold),
            };

            if step > 0 {
                log::info!(
                    "{} endmember found after {} relaxation step(s) at NDVI percentile {}",
                    kind,
                    step,
                    percentile
                );
            }

            return Ok(SearchOutcome::Located(EndmemberSearch {
                kind,
                temperature,
                ndvi_threshold,
                ndvi_percentile: percentile,
                temperature_threshold,
                pixel,
                candidate_count,
                pixel_count,
                relaxation_steps: step,
                selection,
                reducer: self.params.reducer,
            }));
        }

        log::warn!("{} endmember unavailable after NDVI percentiles {:?}", kind, tried);
        Ok(SearchOutcome::Unavailable {
            kind,
            percentiles_tried: tried,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GridSpec;
    use ndarray::{Array1, Array2};
    use std::sync::Arc;

    fn raster3(values: [f64; 9]) -> Raster {
        let grid = Arc::new(GridSpec::geographic(0.0, 0.0, 1.0, 3, 3));
        let data = Array1::from(values.to_vec()).into_shape((3, 3)).unwrap();
        Raster::new(grid, data).unwrap()
    }

    fn all() -> Mask {
        Array2::from_elem((3, 3), true)
    }

    #[test]
    fn test_relaxation_ladder_doubles_to_cap() {
        let params = EndmemberParams::default();
        assert_eq!(params.relaxation_ladder(5.0), vec![5.0, 10.0, 20.0, 40.0, 50.0]);
        assert_eq!(params.relaxation_ladder(50.0), vec![50.0]);
        assert_eq!(params.relaxation_ladder(30.0), vec![30.0, 50.0]);
    }

    #[test]
    fn test_validate_rejects_zero_percentile() {
        let params = EndmemberParams {
            p_top_ndvi: 0.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
        assert!(EndmemberSelector::new(params).is_err());
    }

    #[test]
    fn test_cold_search_picks_coolest_green_pixel() {
        let ndvi = raster3([0.1, 0.9, 0.9, 0.2, 0.85, 0.1, 0.05, 0.3, 0.95]);
        let lst = raster3([310.0, 295.0, 296.0, 308.0, 297.0, 311.0, 312.0, 305.0, 294.0]);
        let selector = EndmemberSelector::new(EndmemberParams {
            p_top_ndvi: 40.0,
            ..Default::default()
        })
        .unwrap();

        match selector.search_cold(&ndvi, &lst, &all()).unwrap() {
            SearchOutcome::Located(search) => {
                assert_eq!(search.candidate_count, 4);
                assert_eq!(search.temperature, 294.0);
                assert_eq!(search.pixel, (2, 2));
                assert_eq!(search.relaxation_steps, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_masked_ndvi_everywhere_is_unavailable() {
        let ndvi = raster3([f64::NAN; 9]);
        let lst = raster3([300.0; 9]);
        let outcome = EndmemberSelector::standard().search_cold(&ndvi, &lst, &all()).unwrap();
        match outcome {
            SearchOutcome::Unavailable { kind, percentiles_tried } => {
                assert_eq!(kind, EndmemberKind::Cold);
                assert_eq!(percentiles_tried, vec![5.0]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unavailable_after_full_ladder() {
        // Every temperature is below the validity floor
        let ndvi = raster3([0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9]);
        let lst = raster3([150.0; 9]);
        let status = EndmemberSelector::standard()
            .select_cold(&ndvi, &lst, &lst, &lst, &all())
            .unwrap();
        assert!(status.endmember().is_none());
        match status.require() {
            Err(EtError::EndmemberSearchFailed { percentiles, .. }) => {
                assert_eq!(percentiles, vec![5.0, 10.0, 20.0, 40.0, 50.0]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mean_reducer_averages_selection() {
        let ndvi = raster3([0.9, 0.9, 0.9, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1]);
        let lst = raster3([294.0, 294.4, 299.0, 310.0, 310.0, 310.0, 310.0, 310.0, 310.0]);
        let rn = raster3([500.0, 520.0, 540.0, 400.0, 400.0, 400.0, 400.0, 400.0, 400.0]);
        let g = raster3([50.0; 9]);
        let selector = EndmemberSelector::new(EndmemberParams {
            p_top_ndvi: 30.0,
            p_coldest_ts: 1.0,
            reducer: EndmemberReducer::Mean,
            ..Default::default()
        })
        .unwrap();

        let cold = selector
            .select_cold(&ndvi, &lst, &rn, &g, &all())
            .unwrap()
            .require()
            .unwrap();
        assert_eq!(cold.pixel_count, 2);
        assert!((cold.temperature - 294.2).abs() < 1e-9);
        assert_eq!(cold.net_radiation, Some(510.0));
        assert_eq!(cold.available_energy(), Some(460.0));
    }
}
