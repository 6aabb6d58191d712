use std::f64::consts::{FRAC_PI_2, PI};

use ndarray::{Array2, Array3, Array4};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::telemetry::LogManager;
use crate::{ArrayError, ArrayResult};

/// Rectangular slowness grid in s/km.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlownessGrid {
    pub sll_x: f64,
    pub slm_x: f64,
    pub sll_y: f64,
    pub slm_y: f64,
    pub sl_s: f64,
}

impl SlownessGrid {
    /// Square grid spanning [-max, max] on both axes.
    pub fn symmetric(max: f64, step: f64) -> Self {
        Self {
            sll_x: -max,
            slm_x: max,
            sll_y: -max,
            slm_y: max,
            sl_s: step,
        }
    }

    /// Number of grid points along x.
    pub fn nx(&self) -> usize {
        ((self.slm_x - self.sll_x) / self.sl_s + 0.5).floor() as usize + 1
    }

    /// Number of grid points along y.
    pub fn ny(&self) -> usize {
        ((self.slm_y - self.sll_y) / self.sl_s + 0.5).floor() as usize + 1
    }

    /// Exact slowness of a grid node.
    pub fn slowness_at(&self, ix: usize, iy: usize) -> (f64, f64) {
        (
            self.sll_x + ix as f64 * self.sl_s,
            self.sll_y + iy as f64 * self.sl_s,
        )
    }
}

/// Correction velocity of the layer beneath the stations, km/s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CorrectionVelocity {
    /// One velocity for the whole array.
    Uniform(f64),
    /// One velocity per station, in trace order.
    PerStation(Vec<f64>),
}

impl CorrectionVelocity {
    fn at(&self, station: usize) -> f64 {
        match self {
            CorrectionVelocity::Uniform(v) => *v,
            CorrectionVelocity::PerStation(v) => v[station],
        }
    }

    fn validate(&self, nstat: usize) -> ArrayResult<()> {
        if let CorrectionVelocity::PerStation(v) = self {
            if v.len() != nstat {
                return Err(ArrayError::InvalidInput(format!(
                    "per-station velocities: expected {} entries, got {}",
                    nstat,
                    v.len()
                )));
            }
        }
        Ok(())
    }
}

impl Default for CorrectionVelocity {
    fn default() -> Self {
        CorrectionVelocity::Uniform(4.0)
    }
}

/// Geometric delay of a planar wavefront for every station and grid node.
///
/// `t = sx*x + sy*y`; with `static_3d` the station elevation adds
/// `z*cos(inc)/v` where `inc = asin(v*slow)`. Slownesses beyond the
/// evanescent limit fall back to horizontal incidence.
pub fn timeshift_table(
    geometry: &Array2<f64>,
    grid: &SlownessGrid,
    vel_cor: &CorrectionVelocity,
    static_3d: bool,
) -> ArrayResult<Array3<f64>> {
    let nstat = geometry.nrows();
    vel_cor.validate(nstat)?;
    let (nx, ny) = (grid.nx(), grid.ny());
    let logger = LogManager::new();
    let mut warned = false;

    let mut table = Array3::zeros((nstat, nx, ny));
    for k in 0..nx {
        for l in 0..ny {
            let (sx, sy) = grid.slowness_at(k, l);
            let slow = sx.hypot(sy);
            for i in 0..nstat {
                let mut t = sx * geometry[[i, 0]] + sy * geometry[[i, 1]];
                if static_3d {
                    let v = vel_cor.at(i);
                    let arg = v * slow;
                    let inc = if arg <= 1.0 {
                        arg.asin()
                    } else {
                        if !warned {
                            logger.alert(
                                "correction velocity smaller than apparent velocity, \
                                 using horizontal incidence",
                            );
                            warned = true;
                        }
                        FRAC_PI_2
                    };
                    t += geometry[[i, 2]] * inc.cos() / v;
                }
                table[[i, k, l]] = t;
            }
        }
    }
    Ok(table)
}

/// Steering phase factors `exp(-i 2 pi f t)` for the band bins.
///
/// Layout is `[freq][grid_x][grid_y][station]`; bin `n` maps to the
/// absolute frequency `(nlow + n) * deltaf`.
pub fn steering_table(
    timeshifts: &Array3<f64>,
    nlow: usize,
    nf: usize,
    deltaf: f64,
) -> Array4<Complex64> {
    let (nstat, nx, ny) = timeshifts.dim();
    let mut steer = Array4::zeros((nf, nx, ny, nstat));
    for i in 0..nstat {
        for x in 0..nx {
            for y in 0..ny {
                let tau = timeshifts[[i, x, y]];
                for n in 0..nf {
                    let wtau = 2.0 * PI * (nlow + n) as f64 * deltaf * tau;
                    steer[[n, x, y, i]] = Complex64::new(wtau.cos(), -wtau.sin());
                }
            }
        }
    }
    steer
}

/// Delay table along a single slowness axis toward a fixed backazimuth.
///
/// Positive axis values correspond to arrivals from `baz_deg`: the delay of
/// station (x, y) is `-s*(x*sin(baz) + y*cos(baz))`, plus the optional
/// elevation term.
pub fn timeshift_table_baz(
    geometry: &Array2<f64>,
    sll: f64,
    slm: f64,
    sls: f64,
    baz_deg: f64,
    vel_cor: &CorrectionVelocity,
    static_3d: bool,
) -> ArrayResult<(Vec<f64>, Array2<f64>)> {
    let nstat = geometry.nrows();
    vel_cor.validate(nstat)?;
    let nslow = ((slm - sll) / sls + 0.5).floor() as usize + 1;
    let baz = baz_deg.to_radians();
    let logger = LogManager::new();
    let mut warned = false;

    let mut slownesses = Vec::with_capacity(nslow);
    let mut table = Array2::zeros((nstat, nslow));
    for j in 0..nslow {
        let s = sll + j as f64 * sls;
        slownesses.push(s);
        for i in 0..nstat {
            let mut t = -s * (geometry[[i, 0]] * baz.sin() + geometry[[i, 1]] * baz.cos());
            if static_3d {
                let v = vel_cor.at(i);
                let arg = v * s.abs();
                let inc = if arg <= 1.0 {
                    arg.asin()
                } else {
                    if !warned {
                        logger.alert(
                            "correction velocity smaller than apparent velocity, \
                             using horizontal incidence",
                        );
                        warned = true;
                    }
                    FRAC_PI_2
                };
                t += geometry[[i, 2]] * inc.cos() / v;
            }
            table[[i, j]] = t;
        }
    }
    Ok((slownesses, table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn unit_square() -> Array2<f64> {
        array![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ]
    }

    #[test]
    fn grid_cardinality_matches_the_rounding_formula() {
        let grid = SlownessGrid::symmetric(0.2, 0.02);
        assert_eq!(grid.nx(), 21);
        assert_eq!(grid.ny(), 21);
        // a step that does not divide the span still lands on the formula
        let odd = SlownessGrid {
            sll_x: -0.3,
            slm_x: 0.3,
            sll_y: -0.3,
            slm_y: 0.3,
            sl_s: 0.07,
        };
        assert_eq!(odd.nx(), ((0.6f64 / 0.07 + 0.5).floor() as usize) + 1);
    }

    #[test]
    fn grid_nodes_are_exact_multiples_of_the_step() {
        let grid = SlownessGrid::symmetric(0.2, 0.02);
        let (sx, sy) = grid.slowness_at(15, 10);
        assert_eq!(sx, -0.2 + 15.0 * 0.02);
        assert_eq!(sy, -0.2 + 10.0 * 0.02);
    }

    #[test]
    fn planar_delay_is_the_dot_product_with_slowness() {
        let geometry = unit_square();
        let grid = SlownessGrid::symmetric(0.2, 0.1);
        let table =
            timeshift_table(&geometry, &grid, &CorrectionVelocity::default(), false).unwrap();
        // node (3, 2) is slowness (0.1, 0.0)
        let (sx, sy) = grid.slowness_at(3, 2);
        assert_eq!((sx, sy), (0.1, 0.0));
        for i in 0..4 {
            let expected = sx * geometry[[i, 0]] + sy * geometry[[i, 1]];
            assert!((table[[i, 3, 2]] - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn evanescent_slowness_drops_the_elevation_term() {
        let geometry = array![[0.0, 0.0, 1.0], [1.0, 0.0, -1.0]];
        let grid = SlownessGrid {
            sll_x: 0.5,
            slm_x: 0.5,
            sll_y: 0.0,
            slm_y: 0.0,
            sl_s: 0.1,
        };
        // vel_cor * slow = 4 * 0.5 = 2 > 1: inc = pi/2, cos(inc) = 0
        let table =
            timeshift_table(&geometry, &grid, &CorrectionVelocity::Uniform(4.0), true).unwrap();
        assert!((table[[0, 0, 0]] - 0.0).abs() < 1e-12);
        assert!((table[[1, 0, 0]] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn per_station_velocity_length_is_validated() {
        let geometry = unit_square();
        let grid = SlownessGrid::symmetric(0.1, 0.1);
        let bad = CorrectionVelocity::PerStation(vec![4.0, 4.0]);
        assert!(timeshift_table(&geometry, &grid, &bad, true).is_err());
    }

    #[test]
    fn steering_phase_rotates_against_the_delay() {
        let geometry = array![[1.0, 0.0, 0.0]];
        let grid = SlownessGrid {
            sll_x: 0.1,
            slm_x: 0.1,
            sll_y: 0.0,
            slm_y: 0.0,
            sl_s: 0.1,
        };
        let table =
            timeshift_table(&geometry, &grid, &CorrectionVelocity::default(), false).unwrap();
        let steer = steering_table(&table, 2, 1, 1.0);
        // f = 2 Hz, tau = 0.1 s: phase must be -2*pi*0.2
        let expected = Complex64::new(0.0, -2.0 * PI * 2.0 * 0.1).exp();
        let got = steer[[0, 0, 0, 0]];
        assert!((got - expected).norm() < 1e-12);
    }

    #[test]
    fn baz_table_aligns_physical_arrivals_at_positive_slowness() {
        let geometry = unit_square();
        // wave from the west (baz 270) travels east: delay grows with x
        let (slownesses, table) = timeshift_table_baz(
            &geometry,
            0.0,
            0.2,
            0.02,
            270.0,
            &CorrectionVelocity::default(),
            false,
        )
        .unwrap();
        assert_eq!(slownesses.len(), 11);
        let j = 5; // s = 0.1
        assert!((slownesses[j] - 0.1).abs() < 1e-12);
        for i in 0..4 {
            let expected = 0.1 * geometry[[i, 0]];
            assert!((table[[i, j]] - expected).abs() < 1e-9);
        }
    }
}
