use crate::raster::{BandSet, Raster};
use crate::types::{Band, CoordinateSystem, EtError, EtResult, GridSpec};
use ndarray::Array2;
use std::sync::Arc;

/// Metres per degree of latitude, also per degree of longitude at the equator
const METRES_PER_DEGREE: f64 = 111_320.0;

/// Elevation and its derived terrain bands on the scene grid
#[derive(Debug, Clone)]
pub struct Terrain {
    /// Elevation [m]
    pub elevation: Raster,
    /// Slope [deg]
    pub slope: Raster,
    /// Downslope azimuth clockwise from north [deg]
    pub aspect: Raster,
    /// Pixel-centre latitude [deg]
    pub latitude: Raster,
    /// Pixel-centre longitude [deg]
    pub longitude: Raster,
}

impl Terrain {
    /// Derive terrain from a DEM on a geographic grid. Pixel coordinates come
    /// from the grid's affine transform.
    pub fn from_dem(dem: Raster) -> EtResult<Self> {
        let grid = Arc::clone(dem.grid());
        if grid.crs != CoordinateSystem::Geographic {
            return Err(EtError::InvalidInput(
                "projected DEM needs explicit latitude and longitude rasters".to_string(),
            ));
        }
        let latitude = Raster::from_fn(Arc::clone(&grid), |r, c| grid.transform.pixel_center(r, c).1);
        let longitude = Raster::from_fn(Arc::clone(&grid), |r, c| grid.transform.pixel_center(r, c).0);
        Self::with_coordinates(dem, latitude, longitude)
    }

    /// Derive terrain from a DEM whose pixel coordinates are already known
    pub fn with_coordinates(dem: Raster, latitude: Raster, longitude: Raster) -> EtResult<Self> {
        dem.ensure_same_grid(&latitude)?;
        dem.ensure_same_grid(&longitude)?;
        let (slope, aspect) = slope_aspect(&dem, &latitude)?;
        log::debug!(
            "Terrain derived on a {}x{} grid ({} valid elevation pixels)",
            dem.shape().0,
            dem.shape().1,
            dem.valid_count()
        );
        Ok(Self {
            elevation: dem,
            slope,
            aspect,
            latitude,
            longitude,
        })
    }

    pub fn grid(&self) -> &Arc<GridSpec> {
        self.elevation.grid()
    }

    pub fn to_bands(&self) -> EtResult<BandSet> {
        BandSet::new(Arc::clone(self.grid()))
            .with(Band::Elevation, self.elevation.clone())?
            .with(Band::Slope, self.slope.clone())?
            .with(Band::Aspect, self.aspect.clone())?
            .with(Band::Latitude, self.latitude.clone())?
            .with(Band::Longitude, self.longitude.clone())
    }
}

/// Signed pixel size in metres along (east, north) at a latitude
fn pixel_spacing(grid: &GridSpec, latitude_deg: f64) -> (f64, f64) {
    let t = &grid.transform;
    match grid.crs {
        CoordinateSystem::Geographic => (
            t.pixel_width * METRES_PER_DEGREE * latitude_deg.to_radians().cos(),
            t.pixel_height * METRES_PER_DEGREE,
        ),
        CoordinateSystem::Projected { .. } => (t.pixel_width, t.pixel_height),
    }
}

/// Slope and aspect [deg] by central differences, edges copied from the
/// nearest interior pixel
fn slope_aspect(dem: &Raster, latitude: &Raster) -> EtResult<(Raster, Raster)> {
    let z = dem.data();
    let (height, width) = z.dim();
    if height < 3 || width < 3 {
        return Err(EtError::InvalidInput(format!(
            "DEM of {}x{} pixels is too small for slope estimation",
            height, width
        )));
    }

    let grid = dem.grid();
    let mut slope = Array2::from_elem((height, width), f64::NAN);
    let mut aspect = Array2::from_elem((height, width), f64::NAN);

    for i in 1..height - 1 {
        for j in 1..width - 1 {
            let (dx, dy) = pixel_spacing(grid, latitude.get(i, j));
            let dz_dx = (z[[i, j + 1]] - z[[i, j - 1]]) / (2.0 * dx);
            let dz_dy = (z[[i + 1, j]] - z[[i - 1, j]]) / (2.0 * dy);

            slope[[i, j]] = dz_dx.hypot(dz_dy).atan().to_degrees();
            aspect[[i, j]] = (-dz_dx).atan2(-dz_dy).to_degrees().rem_euclid(360.0);
        }
    }

    fill_edge_values(&mut slope);
    fill_edge_values(&mut aspect);

    Ok((
        Raster::new(Arc::clone(grid), slope)?,
        Raster::new(Arc::clone(grid), aspect)?,
    ))
}

fn fill_edge_values(array: &mut Array2<f64>) {
    let (height, width) = array.dim();
    for j in 0..width {
        array[[0, j]] = array[[1, j]];
        array[[height - 1, j]] = array[[height - 2, j]];
    }
    for i in 0..height {
        array[[i, 0]] = array[[i, 1]];
        array[[i, width - 1]] = array[[i, width - 2]];
    }
}
