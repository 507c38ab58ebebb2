//! Vegetation indices, emissivity and land surface temperature

use crate::constants::{LAI_MAX, LAPSE_RATE, SAVI_L, SOLAR_CONSTANT};
use crate::core::solar::{self, SolarGeometry};
use crate::raster::{BandSet, Raster};
use crate::types::{Band, EtResult, Sensor};

/// Narrow-band and broadband emissivity above this NDVI (full cover)
const NDVI_FULL_COVER: f64 = 0.7;

/// Weighting coefficients for broadband albedo from surface reflectance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlbedoCoefficients {
    pub ultra_blue: f64,
    pub blue: f64,
    pub green: f64,
    pub red: f64,
    pub nir: f64,
    pub swir1: f64,
    pub swir2: f64,
}

impl AlbedoCoefficients {
    pub fn for_sensor(sensor: Sensor) -> Self {
        match sensor {
            // Tasumi et al. (2008)
            Sensor::Landsat5 | Sensor::Landsat7 => Self {
                ultra_blue: 0.0,
                blue: 0.254,
                green: 0.149,
                red: 0.147,
                nir: 0.311,
                swir1: 0.103,
                swir2: 0.036,
            },
            // Ke et al. (2016)
            Sensor::Landsat8 | Sensor::Landsat9 => Self {
                ultra_blue: 0.130,
                blue: 0.115,
                green: 0.143,
                red: 0.180,
                nir: 0.281,
                swir1: 0.108,
                swir2: 0.042,
            },
        }
    }
}

/// Reflectance bands the albedo of `sensor` is weighted from
pub fn albedo_bands(sensor: Sensor) -> &'static [Band] {
    match sensor {
        Sensor::Landsat5 | Sensor::Landsat7 => {
            &[Band::Blue, Band::Green, Band::Red, Band::Nir, Band::Swir1, Band::Swir2]
        }
        Sensor::Landsat8 | Sensor::Landsat9 => &[
            Band::UltraBlue,
            Band::Blue,
            Band::Green,
            Band::Red,
            Band::Nir,
            Band::Swir1,
            Band::Swir2,
        ],
    }
}

/// NDVI clamped into [-1, 1]
pub fn ndvi_value(red: f64, nir: f64) -> f64 {
    ((nir - red) / (nir + red)).clamp(-1.0, 1.0)
}

pub fn savi_value(red: f64, nir: f64) -> f64 {
    (1.0 + SAVI_L) * (nir - red) / (SAVI_L + nir + red)
}

pub fn evi_value(blue: f64, red: f64, nir: f64) -> f64 {
    2.5 * (nir - red) / (nir + 6.0 * red - 7.5 * blue + 1.0)
}

pub fn ndwi_value(green: f64, nir: f64) -> f64 {
    (green - nir) / (green + nir)
}

/// Leaf area index from SAVI, saturating at 6
pub fn lai_value(savi: f64) -> f64 {
    if savi.is_nan() {
        return f64::NAN;
    }
    if savi >= 0.689 {
        return LAI_MAX;
    }
    (-((0.69 - savi) / 0.59).ln() / 0.91).clamp(0.0, LAI_MAX)
}

/// Narrow-band (thermal) surface emissivity
pub fn emissivity_narrowband(ndvi: f64, lai: f64) -> f64 {
    if ndvi.is_nan() {
        f64::NAN
    } else if ndvi < 0.0 {
        0.99
    } else if ndvi > NDVI_FULL_COVER {
        0.98
    } else {
        0.97 + 0.0033 * lai
    }
}

/// Broadband surface emissivity
pub fn emissivity_broadband(ndvi: f64, lai: f64) -> f64 {
    if ndvi.is_nan() {
        f64::NAN
    } else if ndvi < 0.0 {
        0.99
    } else if ndvi > NDVI_FULL_COVER {
        0.98
    } else {
        0.95 + 0.01 * lai
    }
}

/// Bands computed by [`SpectralIndices::compute`]
pub const SPECTRAL_OUTPUTS: [Band; 9] = [
    Band::Albedo,
    Band::Ndvi,
    Band::Savi,
    Band::Evi,
    Band::Ndwi,
    Band::Lai,
    Band::EmissivityNarrowband,
    Band::EmissivityBroadband,
    Band::Lst,
];

/// Spectral index processor for one sensor
#[derive(Debug, Clone)]
pub struct SpectralIndices {
    sensor: Sensor,
}

impl SpectralIndices {
    pub fn new(sensor: Sensor) -> Self {
        Self { sensor }
    }

    /// Broadband albedo. A precomputed `Albedo` band is used as-is.
    pub fn albedo(&self, image: &BandSet) -> EtResult<Raster> {
        if let Ok(albedo) = image.get(Band::Albedo) {
            return Ok(albedo.clone());
        }

        let c = AlbedoCoefficients::for_sensor(self.sensor);
        let blue = image.get(Band::Blue)?;
        let green = image.get(Band::Green)?;
        let red = image.get(Band::Red)?;
        let nir = image.get(Band::Nir)?;
        let swir1 = image.get(Band::Swir1)?;
        let swir2 = image.get(Band::Swir2)?;

        match self.sensor {
            Sensor::Landsat8 | Sensor::Landsat9 => {
                let ub = image.get(Band::UltraBlue)?;
                Raster::combine(&[ub, blue, green, red, nir, swir1, swir2], move |v| {
                    c.ultra_blue * v[0]
                        + c.blue * v[1]
                        + c.green * v[2]
                        + c.red * v[3]
                        + c.nir * v[4]
                        + c.swir1 * v[5]
                        + c.swir2 * v[6]
                })
            }
            Sensor::Landsat5 | Sensor::Landsat7 => {
                Raster::combine(&[blue, green, red, nir, swir1, swir2], move |v| {
                    c.blue * v[0] + c.green * v[1] + c.red * v[2] + c.nir * v[3] + c.swir1 * v[4] + c.swir2 * v[5]
                })
            }
        }
    }

    /// Albedo, NDVI, SAVI, EVI, NDWI, LAI, emissivities and the
    /// emissivity-corrected land surface temperature
    pub fn compute(&self, image: &BandSet) -> EtResult<BandSet> {
        log::debug!("Computing spectral indices for {}", self.sensor);

        let blue = image.get(Band::Blue)?;
        let green = image.get(Band::Green)?;
        let red = image.get(Band::Red)?;
        let nir = image.get(Band::Nir)?;
        let brightness = image.get(Band::BrightnessTemperature)?;

        let albedo = self.albedo(image)?;
        let ndvi = red.zip_map(nir, ndvi_value)?;
        let savi = red.zip_map(nir, savi_value)?;
        let evi = blue.zip3_map(red, nir, evi_value)?;
        let ndwi = green.zip_map(nir, ndwi_value)?;
        let lai = savi.map(lai_value);
        let e_nb = ndvi.zip_map(&lai, emissivity_narrowband)?;
        let e_0 = ndvi.zip_map(&lai, emissivity_broadband)?;
        let lst = brightness.zip_map(&e_nb, |bt, e| bt / e.powf(0.25))?;

        let mut out = BandSet::new(image.grid().clone());
        out.insert(Band::Albedo, albedo)?;
        out.insert(Band::Ndvi, ndvi)?;
        out.insert(Band::Savi, savi)?;
        out.insert(Band::Evi, evi)?;
        out.insert(Band::Ndwi, ndwi)?;
        out.insert(Band::Lai, lai)?;
        out.insert(Band::EmissivityNarrowband, e_nb)?;
        out.insert(Band::EmissivityBroadband, e_0)?;
        out.insert(Band::Lst, lst)?;
        Ok(out)
    }
}

/// Rasters needed to correct LST for elevation and terrain illumination
#[derive(Debug, Clone, Copy)]
pub struct LstCorrectionInputs<'a> {
    pub lst: &'a Raster,
    pub elevation: &'a Raster,
    pub slope: &'a Raster,
    pub aspect: &'a Raster,
    pub latitude: &'a Raster,
    pub longitude: &'a Raster,
    /// Air temperature [degC]
    pub air_temperature: &'a Raster,
    /// Relative humidity [%]
    pub relative_humidity: &'a Raster,
}

/// Correct land surface temperature to a common datum: add the lapse-rate
/// effect of elevation and the difference between the radiation received by
/// the sloping pixel and by a horizontal surface.
pub fn correct_lst_for_terrain(inputs: LstCorrectionInputs<'_>, solar: &SolarGeometry) -> EtResult<Raster> {
    let cos_flat = solar.cos_zenith();
    let dr = solar.inverse_relative_distance();
    let solar = *solar;

    Raster::combine(
        &[
            inputs.lst,
            inputs.elevation,
            inputs.slope,
            inputs.aspect,
            inputs.latitude,
            inputs.longitude,
            inputs.air_temperature,
            inputs.relative_humidity,
        ],
        move |v| {
            let (lst, z, slope, aspect, lat, lon, t_air, rh) = (v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7]);
            let pressure = solar::pressure_from_elevation(z);
            let tau = solar::transmissivity_at(z, t_air, rh, cos_flat);
            let rho = solar::air_density(pressure, t_air);
            let cos_slope = solar.cos_incidence(lat, lon, slope, aspect);
            lst + LAPSE_RATE * z + SOLAR_CONSTANT * dr * tau * (cos_slope - cos_flat) / (rho * 1004.0 * 0.050)
        },
    )
}
