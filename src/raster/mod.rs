//! Immutable raster fields over a shared grid
//!
//! A [`Raster`] is an `f64` array tied to a [`GridSpec`]. Masked pixels are
//! `NaN` and stay `NaN` through every pixel-wise operation, so an input
//! pixel masked upstream is never silently turned into a number downstream.
//! Scalars are only ever produced through [`Reducer`].

pub mod band_set;
pub mod geometry;
pub mod reduce;

pub use band_set::BandSet;
pub use geometry::Geometry;
pub use reduce::{percentile_nearest_rank, Reducer};

use crate::types::{EtError, EtResult, GridSpec};
use ndarray::{Array2, Zip};
use std::sync::Arc;

/// Boolean pixel mask with the shape of its grid
pub type Mask = Array2<bool>;

/// Largest number of rasters accepted by [`Raster::combine`]
const MAX_ARITY: usize = 8;

/// Immutable 2-D field of `f64` values on a fixed grid
#[derive(Debug, Clone)]
pub struct Raster {
    grid: Arc<GridSpec>,
    data: Arc<Array2<f64>>,
}

impl Raster {
    /// Wrap an array, checking it matches the grid shape
    pub fn new(grid: Arc<GridSpec>, data: Array2<f64>) -> EtResult<Self> {
        if data.dim() != grid.shape() {
            return Err(EtError::GridMismatch {
                expected: grid.shape(),
                found: data.dim(),
            });
        }
        Ok(Self {
            grid,
            data: Arc::new(data),
        })
    }

    pub fn constant(grid: Arc<GridSpec>, value: f64) -> Self {
        let data = Array2::from_elem(grid.shape(), value);
        Self {
            grid,
            data: Arc::new(data),
        }
    }

    /// Raster with every pixel masked
    pub fn masked(grid: Arc<GridSpec>) -> Self {
        Self::constant(grid, f64::NAN)
    }

    pub fn from_fn<F>(grid: Arc<GridSpec>, f: F) -> Self
    where
        F: Fn(usize, usize) -> f64,
    {
        let data = Array2::from_shape_fn(grid.shape(), |(i, j)| f(i, j));
        Self {
            grid,
            data: Arc::new(data),
        }
    }

    pub fn grid(&self) -> &Arc<GridSpec> {
        &self.grid
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Raw value at (row, col), `NaN` when masked or out of range
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data.get((row, col)).copied().unwrap_or(f64::NAN)
    }

    /// Valid value at (row, col)
    pub fn sample(&self, row: usize, col: usize) -> Option<f64> {
        let v = self.get(row, col);
        v.is_finite().then_some(v)
    }

    pub fn same_grid(&self, other: &Raster) -> bool {
        Arc::ptr_eq(&self.grid, &other.grid) || *self.grid == *other.grid
    }

    pub fn ensure_same_grid(&self, other: &Raster) -> EtResult<()> {
        if self.same_grid(other) {
            Ok(())
        } else {
            Err(EtError::GridMismatch {
                expected: self.grid.shape(),
                found: other.grid.shape(),
            })
        }
    }

    fn ensure_mask_shape(&self, mask: &Mask) -> EtResult<()> {
        if mask.dim() != self.shape() {
            return Err(EtError::GridMismatch {
                expected: self.shape(),
                found: mask.dim(),
            });
        }
        Ok(())
    }

    fn with_data(&self, data: Array2<f64>) -> Raster {
        Raster {
            grid: Arc::clone(&self.grid),
            data: Arc::new(data),
        }
    }

    /// Apply `f` to every pixel
    pub fn map<F>(&self, f: F) -> Raster
    where
        F: Fn(f64) -> f64 + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        let data = Zip::from(&*self.data).par_map_collect(|&v| f(v));
        #[cfg(not(feature = "parallel"))]
        let data = Zip::from(&*self.data).map_collect(|&v| f(v));
        self.with_data(data)
    }

    /// Apply `f` pixel-wise to two rasters on the same grid
    pub fn zip_map<F>(&self, other: &Raster, f: F) -> EtResult<Raster>
    where
        F: Fn(f64, f64) -> f64 + Sync + Send,
    {
        self.ensure_same_grid(other)?;
        let zip = Zip::from(&*self.data).and(&*other.data);
        #[cfg(feature = "parallel")]
        let data = zip.par_map_collect(|&a, &b| f(a, b));
        #[cfg(not(feature = "parallel"))]
        let data = zip.map_collect(|&a, &b| f(a, b));
        Ok(self.with_data(data))
    }

    /// Apply `f` pixel-wise to three rasters on the same grid
    pub fn zip3_map<F>(&self, b: &Raster, c: &Raster, f: F) -> EtResult<Raster>
    where
        F: Fn(f64, f64, f64) -> f64 + Sync + Send,
    {
        self.ensure_same_grid(b)?;
        self.ensure_same_grid(c)?;
        let zip = Zip::from(&*self.data)
            .and(&*b.data)
            .and(&*c.data);
        #[cfg(feature = "parallel")]
        let data = zip.par_map_collect(|&x, &y, &z| f(x, y, z));
        #[cfg(not(feature = "parallel"))]
        let data = zip.map_collect(|&x, &y, &z| f(x, y, z));
        Ok(self.with_data(data))
    }

    /// Apply `f` pixel-wise to any number of rasters (up to eight).
    /// `f` receives the pixel values in the order of `inputs`.
    pub fn combine<F>(inputs: &[&Raster], f: F) -> EtResult<Raster>
    where
        F: Fn(&[f64]) -> f64 + Sync + Send,
    {
        let first = inputs
            .first()
            .ok_or_else(|| EtError::InvalidInput("combine needs at least one raster".to_string()))?;
        if inputs.len() > MAX_ARITY {
            return Err(EtError::InvalidInput(format!(
                "combine accepts at most {} rasters, got {}",
                MAX_ARITY,
                inputs.len()
            )));
        }
        for other in &inputs[1..] {
            first.ensure_same_grid(other)?;
        }

        let n = inputs.len();
        let kernel = |(i, j): (usize, usize), out: &mut f64| {
            let mut values = [0.0f64; MAX_ARITY];
            for (slot, raster) in values.iter_mut().zip(inputs.iter()) {
                *slot = raster.data[[i, j]];
            }
            *out = f(&values[..n]);
        };

        let mut data = Array2::<f64>::zeros(first.shape());
        #[cfg(feature = "parallel")]
        Zip::indexed(&mut data).par_for_each(kernel);
        #[cfg(not(feature = "parallel"))]
        Zip::indexed(&mut data).for_each(kernel);

        Ok(first.with_data(data))
    }

    /// Mask pixels where `mask` is true
    pub fn mask_where(&self, mask: &Mask) -> EtResult<Raster> {
        self.ensure_mask_shape(mask)?;
        let data = Zip::from(&*self.data)
            .and(mask)
            .map_collect(|&v, &m| if m { f64::NAN } else { v });
        Ok(self.with_data(data))
    }

    /// Keep pixels where `mask` is true, mask the rest
    pub fn where_mask(&self, mask: &Mask) -> EtResult<Raster> {
        self.ensure_mask_shape(mask)?;
        let data = Zip::from(&*self.data)
            .and(mask)
            .map_collect(|&v, &m| if m { v } else { f64::NAN });
        Ok(self.with_data(data))
    }

    /// True where the pixel holds a finite value
    pub fn valid_mask(&self) -> Mask {
        self.data.map(|v| v.is_finite())
    }

    /// Boolean mask from a pixel predicate; masked pixels are always false
    pub fn mask_from<F>(&self, predicate: F) -> Mask
    where
        F: Fn(f64) -> bool,
    {
        self.data.map(|&v| v.is_finite() && predicate(v))
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_finite()).count()
    }

    /// Reduce the valid pixels inside `region` to a scalar
    pub fn reduce(&self, reducer: Reducer, region: &Mask) -> EtResult<Option<f64>> {
        reducer.reduce(self, region)
    }
}

/// Combine two masks with logical AND
pub fn mask_and(a: &Mask, b: &Mask) -> EtResult<Mask> {
    if a.dim() != b.dim() {
        return Err(EtError::GridMismatch {
            expected: a.dim(),
            found: b.dim(),
        });
    }
    Ok(Zip::from(a).and(b).map_collect(|&x, &y| x && y))
}
