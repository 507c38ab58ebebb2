use super::Raster;
use crate::types::{Band, EtError, EtResult, GridSpec};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Named bands sharing one grid
#[derive(Debug, Clone)]
pub struct BandSet {
    grid: Arc<GridSpec>,
    bands: BTreeMap<Band, Raster>,
}

impl BandSet {
    pub fn new(grid: Arc<GridSpec>) -> Self {
        Self {
            grid,
            bands: BTreeMap::new(),
        }
    }

    pub fn grid(&self) -> &Arc<GridSpec> {
        &self.grid
    }

    /// Add or replace a band. The raster must live on this set's grid.
    pub fn insert(&mut self, band: Band, raster: Raster) -> EtResult<()> {
        if !(Arc::ptr_eq(raster.grid(), &self.grid) || **raster.grid() == *self.grid) {
            return Err(EtError::GridMismatch {
                expected: self.grid.shape(),
                found: raster.shape(),
            });
        }
        self.bands.insert(band, raster);
        Ok(())
    }

    pub fn with(mut self, band: Band, raster: Raster) -> EtResult<Self> {
        self.insert(band, raster)?;
        Ok(self)
    }

    pub fn get(&self, band: Band) -> EtResult<&Raster> {
        self.bands.get(&band).ok_or(EtError::MissingBand(band))
    }

    pub fn contains(&self, band: Band) -> bool {
        self.bands.contains_key(&band)
    }

    pub fn names(&self) -> Vec<Band> {
        self.bands.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Band, &Raster)> {
        self.bands.iter()
    }

    /// New set holding only `bands`; fails on the first absent band
    pub fn select(&self, bands: &[Band]) -> EtResult<BandSet> {
        let mut out = BandSet::new(Arc::clone(&self.grid));
        for &band in bands {
            out.bands.insert(band, self.get(band)?.clone());
        }
        Ok(out)
    }

    /// Copy every band of `other` into this set
    pub fn extend_from(&mut self, other: &BandSet) -> EtResult<()> {
        for (&band, raster) in other.iter() {
            self.insert(band, raster.clone())?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_select() {
        let grid = Arc::new(GridSpec::geographic(0.0, 0.0, 1.0, 2, 2));
        let set = BandSet::new(Arc::clone(&grid))
            .with(Band::Ndvi, Raster::constant(Arc::clone(&grid), 0.5))
            .unwrap()
            .with(Band::Lst, Raster::constant(Arc::clone(&grid), 300.0))
            .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(Band::Ndvi).unwrap().get(0, 0), 0.5);
        assert!(matches!(set.get(Band::Albedo), Err(EtError::MissingBand(Band::Albedo))));

        let sub = set.select(&[Band::Lst]).unwrap();
        assert_eq!(sub.names(), vec![Band::Lst]);
        assert!(set.select(&[Band::Savi]).is_err());
    }

    #[test]
    fn test_insert_rejects_foreign_grid() {
        let grid = Arc::new(GridSpec::geographic(0.0, 0.0, 1.0, 2, 2));
        let other = Arc::new(GridSpec::geographic(0.0, 0.0, 1.0, 3, 3));
        let mut set = BandSet::new(grid);
        assert!(set.insert(Band::Ndvi, Raster::constant(other, 0.1)).is_err());
    }
}
