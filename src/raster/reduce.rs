use super::{Mask, Raster};
use crate::types::{EtError, EtResult};
use serde::{Deserialize, Serialize};

/// Region reductions from a raster to a scalar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Reducer {
    Mean,
    Min,
    Max,
    /// Number of valid pixels; zero rather than `None` on an empty region
    Count,
    /// First valid pixel in row-major order
    First,
    /// Nearest-rank percentile in [0, 100]
    Percentile(f64),
}

impl Reducer {
    /// Reduce the valid pixels of `raster` inside `region`.
    ///
    /// Returns `Ok(None)` when the region holds no valid pixel.
    pub fn reduce(&self, raster: &Raster, region: &Mask) -> EtResult<Option<f64>> {
        if region.dim() != raster.shape() {
            return Err(EtError::GridMismatch {
                expected: raster.shape(),
                found: region.dim(),
            });
        }

        let mut values = raster
            .data()
            .iter()
            .zip(region.iter())
            .filter(|&(v, &inside)| inside && v.is_finite())
            .map(|(&v, _)| v);

        let result = match *self {
            Reducer::Count => Some(values.count() as f64),
            Reducer::First => values.next(),
            Reducer::Mean => {
                let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
                (n > 0).then(|| sum / n as f64)
            }
            Reducer::Min => values.reduce(f64::min),
            Reducer::Max => values.reduce(f64::max),
            Reducer::Percentile(p) => {
                if !(0.0..=100.0).contains(&p) {
                    return Err(EtError::InvalidInput(format!(
                        "percentile {} outside [0, 100]",
                        p
                    )));
                }
                let mut sorted: Vec<f64> = values.collect();
                sorted.sort_by(|a, b| a.total_cmp(b));
                percentile_nearest_rank(&sorted, p)
            }
        };
        Ok(result)
    }
}

/// Nearest-rank percentile of ascending-sorted values.
///
/// Rank `k = ceil(p/100 * n)` clamped to `[1, n]`, so the result is always
/// one of the input values.
pub fn percentile_nearest_rank(sorted: &[f64], p: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let rank = (p / 100.0 * n as f64).ceil() as usize;
    let rank = rank.clamp(1, n);
    Some(sorted[rank - 1])
}
