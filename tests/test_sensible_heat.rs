use approx::assert_abs_diff_eq;
use ndarray::array;
use sebal_et::constants::AIR_SPECIFIC_HEAT;
use sebal_et::core::sensible_heat::{SensibleHeatInputs, SensibleHeatParams};
use sebal_et::core::solar::air_density_from_temperature;
use sebal_et::{Band, Endmember, EndmemberKind, EtError, GridSpec, Raster, SensibleHeatSolver};
use std::sync::Arc;

struct Field {
    savi: Raster,
    lst: Raster,
    wind: Raster,
}

fn field() -> Field {
    let grid = Arc::new(GridSpec::geographic(0.0, 0.0, 1.0, 2, 3));
    Field {
        savi: Raster::new(Arc::clone(&grid), array![[0.68, 0.5, 0.3], [0.2, 0.1, 0.05]]).unwrap(),
        lst: Raster::new(Arc::clone(&grid), array![[295.0, 299.5, 304.0], [309.0, 313.5, 318.0]]).unwrap(),
        wind: Raster::constant(grid, 3.2),
    }
}

fn endmembers() -> (Endmember, Endmember) {
    let cold = Endmember::at_pixel(EndmemberKind::Cold, (0, 0), (2, 3), 295.0, Some(620.0), Some(45.0));
    let hot = Endmember::at_pixel(EndmemberKind::Hot, (1, 2), (2, 3), 318.0, Some(430.0), Some(95.0));
    (cold, hot)
}

fn solve(iterations: usize) -> sebal_et::core::sensible_heat::SensibleHeatResult {
    let f = field();
    let (cold, hot) = endmembers();
    let solver = SensibleHeatSolver::new(SensibleHeatParams {
        iterations,
        ..Default::default()
    })
    .unwrap();
    solver
        .solve(
            SensibleHeatInputs {
                savi: &f.savi,
                lst: &f.lst,
                wind_speed: &f.wind,
            },
            &cold,
            &hot,
        )
        .unwrap()
}

#[test]
fn test_dt_identities_hold_for_any_pass_count() {
    for iterations in [0, 1, 2, 5] {
        let result = solve(iterations);
        let fit = result.fit;
        assert_eq!(result.pass_fits.len(), iterations);

        // Zero at the cold endmember
        assert_abs_diff_eq!(fit.dt(295.0), 0.0, epsilon = 1e-9);

        // Available energy converted through the final resistance at the hot endmember
        let rah = result.bands.get(Band::AerodynamicResistance).unwrap();
        assert_abs_diff_eq!(fit.rah_hot, rah.get(1, 2), epsilon = 1e-12);
        let expected = (430.0 - 95.0) * fit.rah_hot / (air_density_from_temperature(318.0) * AIR_SPECIFIC_HEAT);
        assert_abs_diff_eq!(fit.dt(318.0), expected, epsilon = 1e-9);

        let dt = result.bands.get(Band::TemperatureDifference).unwrap();
        assert_abs_diff_eq!(dt.get(0, 0), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(dt.get(1, 2), expected, epsilon = 1e-9);
    }
}

#[test]
fn test_h_grows_from_cold_to_hot() {
    let result = solve(2);
    let h = result.bands.get(Band::SensibleHeatFlux).unwrap();
    assert_abs_diff_eq!(h.get(0, 0), 0.0, epsilon = 1e-8);
    assert!(h.get(1, 2) > h.get(0, 2));
    assert!(h.get(0, 2) > 0.0);
}

#[test]
fn test_stability_passes_change_resistance() {
    let neutral = solve(0);
    let corrected = solve(2);
    let rah_neutral = neutral.bands.get(Band::NeutralAerodynamicResistance).unwrap();
    let rah_first = corrected.bands.get(Band::NeutralAerodynamicResistance).unwrap();
    let rah_final = corrected.bands.get(Band::AerodynamicResistance).unwrap();

    assert_eq!(rah_neutral.get(1, 2), rah_first.get(1, 2));
    // Unstable surface layer over the hot pixel lowers the resistance
    assert!(rah_final.get(1, 2) < rah_first.get(1, 2));
}

#[test]
fn test_equal_endmember_temperatures_are_degenerate() {
    let f = field();
    let cold = Endmember::at_pixel(EndmemberKind::Cold, (0, 0), (2, 3), 300.0, Some(600.0), Some(50.0));
    let hot = Endmember::at_pixel(EndmemberKind::Hot, (1, 2), (2, 3), 300.0, Some(600.0), Some(50.0));
    let err = SensibleHeatSolver::standard()
        .solve(
            SensibleHeatInputs {
                savi: &f.savi,
                lst: &f.lst,
                wind_speed: &f.wind,
            },
            &cold,
            &hot,
        )
        .unwrap_err();
    assert!(matches!(err, EtError::DegenerateCalibration(_)));
}

#[test]
fn test_masked_hot_energy_is_degenerate() {
    let f = field();
    let (cold, _) = endmembers();
    let hot = Endmember::at_pixel(EndmemberKind::Hot, (1, 2), (2, 3), 318.0, None, Some(95.0));
    let err = SensibleHeatSolver::standard()
        .solve(
            SensibleHeatInputs {
                savi: &f.savi,
                lst: &f.lst,
                wind_speed: &f.wind,
            },
            &cold,
            &hot,
        )
        .unwrap_err();
    assert_eq!(err.kind(), sebal_et::FailureKind::DegenerateCalibration);
}
