//! Python bindings over NumPy arrays (module `_core`)

use crate::core::endmembers::{Endmember, EndmemberSelector, EndmemberStatus, HotInputs};
use crate::core::precipitation::{DailyPrecipitationSeries, PrecipitationAggregator, PrecipitationParams};
use crate::core::sensible_heat::{SensibleHeatInputs, SensibleHeatSolver};
use crate::raster::Raster;
use crate::types::{Band, EndmemberKind, EtError, GridSpec};
use chrono::{Duration, NaiveDate};
use numpy::{PyReadonlyArray2, ToPyArray};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::sync::Arc;

fn to_py_err(err: EtError) -> PyErr {
    match err {
        EtError::InvalidInput(_) | EtError::InvalidConfig(_) | EtError::GridMismatch { .. } => {
            PyValueError::new_err(err.to_string())
        }
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

/// Wrap NumPy arrays as rasters on one unit grid
fn rasters(arrays: Vec<PyReadonlyArray2<f64>>) -> PyResult<Vec<Raster>> {
    let first = arrays
        .first()
        .ok_or_else(|| PyValueError::new_err("at least one array is required"))?;
    let (rows, cols) = first.as_array().dim();
    let grid = Arc::new(GridSpec::geographic(0.0, 0.0, 1.0, rows, cols));
    arrays
        .iter()
        .map(|a| Raster::new(Arc::clone(&grid), a.as_array().to_owned()).map_err(to_py_err))
        .collect()
}

fn endmember_dict<'py>(py: Python<'py>, status: &EndmemberStatus) -> PyResult<&'py PyDict> {
    let dict = PyDict::new(py);
    match status {
        EndmemberStatus::Found(e) => {
            dict.set_item("available", true)?;
            dict.set_item("temperature", e.temperature)?;
            dict.set_item("net_radiation", e.net_radiation)?;
            dict.set_item("soil_heat_flux", e.soil_heat_flux)?;
            dict.set_item("ndvi_threshold", e.ndvi_threshold)?;
            dict.set_item("ndvi_percentile", e.ndvi_percentile)?;
            dict.set_item("pixel", e.pixel)?;
            dict.set_item("relaxation_steps", e.relaxation_steps)?;
        }
        EndmemberStatus::Unavailable { percentiles_tried, .. } => {
            dict.set_item("available", false)?;
            dict.set_item("percentiles_tried", percentiles_tried.clone())?;
        }
    }
    Ok(dict)
}

/// Select cold and hot endmembers with the default percentiles
#[pyfunction]
fn select_endmembers(
    py: Python,
    ndvi: PyReadonlyArray2<f64>,
    lst: PyReadonlyArray2<f64>,
    net_radiation: PyReadonlyArray2<f64>,
    soil_heat_flux: PyReadonlyArray2<f64>,
) -> PyResult<PyObject> {
    let r = rasters(vec![ndvi, lst, net_radiation, soil_heat_flux])?;
    let region = r[0].grid().shape();
    let region = ndarray::Array2::from_elem(region, true);
    let selector = EndmemberSelector::standard();

    let cold = selector
        .select_cold(&r[0], &r[1], &r[2], &r[3], &region)
        .map_err(to_py_err)?;
    let hot = selector
        .select_hot(
            HotInputs {
                ndvi: &r[0],
                lst: &r[1],
                net_radiation: &r[2],
                soil_heat_flux: &r[3],
            },
            &region,
        )
        .map_err(to_py_err)?;

    let result = PyDict::new(py);
    result.set_item("cold", endmember_dict(py, &cold)?)?;
    result.set_item("hot", endmember_dict(py, &hot)?)?;
    Ok(result.into())
}

/// Days since last rain and cumulative precipitation from daily totals
/// ordered oldest to newest, the last one being the day before the scene
#[pyfunction]
#[pyo3(signature = (daily_totals, cumulative_days = 3))]
fn aggregate_precipitation(
    py: Python,
    daily_totals: Vec<PyReadonlyArray2<f64>>,
    cumulative_days: u32,
) -> PyResult<PyObject> {
    let window = daily_totals.len() as u32;
    let days = rasters(daily_totals)?;
    let grid = Arc::clone(days[0].grid());

    let scene_date = NaiveDate::from_ymd_opt(2000, 1, 1)
        .ok_or_else(|| PyRuntimeError::new_err("invalid anchor date"))?
        + Duration::days(window as i64 + 1);
    let mut series = DailyPrecipitationSeries::new(Arc::clone(&grid));
    for (i, day) in days.into_iter().enumerate() {
        let lag = window as i64 - i as i64;
        series.insert(scene_date - Duration::days(lag), day).map_err(to_py_err)?;
    }

    let aggregator = PrecipitationAggregator::new(PrecipitationParams {
        window_days: window,
        cumulative_days,
        ..Default::default()
    })
    .map_err(to_py_err)?;
    let bands = aggregator.aggregate(&series, scene_date, &grid).map_err(to_py_err)?;

    let result = PyDict::new(py);
    result.set_item(Band::LastRain.name(), bands.last_rain.data().to_pyarray(py))?;
    result.set_item(Band::CumulativePrecipitation.name(), bands.cumulative.data().to_pyarray(py))?;
    Ok(result.into())
}

/// Sensible heat flux from calibration pixels given as (row, col)
#[pyfunction]
#[allow(clippy::too_many_arguments)]
fn solve_sensible_heat(
    py: Python,
    savi: PyReadonlyArray2<f64>,
    lst: PyReadonlyArray2<f64>,
    wind_speed: PyReadonlyArray2<f64>,
    cold_pixel: (usize, usize),
    hot_pixel: (usize, usize),
    hot_net_radiation: f64,
    hot_soil_heat_flux: f64,
) -> PyResult<PyObject> {
    let r = rasters(vec![savi, lst, wind_speed])?;
    let shape = r[1].shape();
    let temperature_at = |(row, col): (usize, usize)| {
        r[1].sample(row, col)
            .ok_or_else(|| PyValueError::new_err(format!("no valid temperature at pixel ({}, {})", row, col)))
    };
    let cold = Endmember::at_pixel(EndmemberKind::Cold, cold_pixel, shape, temperature_at(cold_pixel)?, None, None);
    let hot = Endmember::at_pixel(
        EndmemberKind::Hot,
        hot_pixel,
        shape,
        temperature_at(hot_pixel)?,
        Some(hot_net_radiation),
        Some(hot_soil_heat_flux),
    );

    let solved = SensibleHeatSolver::standard()
        .solve(
            SensibleHeatInputs {
                savi: &r[0],
                lst: &r[1],
                wind_speed: &r[2],
            },
            &cold,
            &hot,
        )
        .map_err(to_py_err)?;

    let result = PyDict::new(py);
    for band in [Band::SensibleHeatFlux, Band::TemperatureDifference, Band::AerodynamicResistance] {
        let raster = solved.bands.get(band).map_err(to_py_err)?;
        result.set_item(band.name(), raster.data().to_pyarray(py))?;
    }
    result.set_item("slope", solved.fit.slope)?;
    result.set_item("intercept", solved.fit.intercept)?;
    Ok(result.into())
}

#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(select_endmembers, m)?)?;
    m.add_function(wrap_pyfunction!(aggregate_precipitation, m)?)?;
    m.add_function(wrap_pyfunction!(solve_sensible_heat, m)?)?;
    Ok(())
}
