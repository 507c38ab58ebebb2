use super::Mask;
use crate::types::GridSpec;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Region of interest in grid map coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    /// Single location; selects the pixel containing it
    Point { x: f64, y: f64 },
    /// Closed ring of (x, y) vertices; selects pixels whose centre lies inside
    Polygon(Vec<(f64, f64)>),
    /// Full extent of the grid
    Bounds,
}

impl Geometry {
    /// Rasterise the geometry onto `grid`
    pub fn to_mask(&self, grid: &GridSpec) -> Mask {
        let shape = grid.shape();
        match self {
            Geometry::Bounds => Array2::from_elem(shape, true),
            Geometry::Point { x, y } => {
                let mut mask = Array2::from_elem(shape, false);
                if let Some((row, col)) = grid.transform.pixel_of(*x, *y) {
                    if row >= 0 && col >= 0 && (row as usize) < grid.rows && (col as usize) < grid.cols {
                        mask[[row as usize, col as usize]] = true;
                    }
                }
                mask
            }
            Geometry::Polygon(ring) => Array2::from_shape_fn(shape, |(i, j)| {
                let (x, y) = grid.transform.pixel_center(i, j);
                point_in_polygon(x, y, ring)
            }),
        }
    }
}

/// Even-odd ray casting test
fn point_in_polygon(x: f64, y: f64, ring: &[(f64, f64)]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}
