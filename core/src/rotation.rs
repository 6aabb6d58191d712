//! Rigid rotation and uniform strain from three-component array data.
//!
//! One-shot weighted least-squares inversion of inter-station displacement
//! differences for the six independent horizontal displacement-gradient
//! components (the free-surface boundary condition eliminates the other
//! three), with formal error propagation. Axes are x1 east, x2 north,
//! x3 up, right handed.

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector, Matrix2, Matrix3, SymmetricEigen};
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::math::linalg;
use crate::telemetry::LogManager;
use crate::{ArrayError, ArrayResult};

/// Ground-noise standard deviation model for the inversion weights.
///
/// Noise is assumed uncorrelated between stations and components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NoiseStd {
    /// One value for every component of every station.
    Scalar(f64),
    /// One value per station, shared across its components.
    PerStation(Vec<f64>),
    /// One (e, n, z) triple per station.
    PerComponent(Vec<[f64; 3]>),
}

/// Rotation, strain, and formal-error time series from the inversion.
#[derive(Debug, Clone)]
pub struct RotationStrain {
    /// Design matrix relating the gradient vector to displacement
    /// differences, 3N x 6.
    pub design: DMatrix<f64>,
    /// Generalized inverse mapping data to the solution, 6 x 3N.
    pub generalized_inverse: DMatrix<f64>,
    /// Rotation about x1 (east), radians.
    pub w1: Vec<f64>,
    /// Rotation about x2 (north), radians.
    pub w2: Vec<f64>,
    /// Torsion, rotation about the vertical axis, radians.
    pub w3: Vec<f64>,
    /// Total rotation angle.
    pub wmag: Vec<f64>,
    /// Rotation about a horizontal axis, `sqrt(w1^2 + w2^2)`.
    pub tilt: Vec<f64>,
    /// Dilatation, trace of the strain tensor.
    pub dilatation: Vec<f64>,
    /// Horizontal (areal) dilatation, e11 + e22.
    pub dilatation_h: Vec<f64>,
    /// Maximum shear strain of the full tensor.
    pub shear_max: Vec<f64>,
    /// Maximum shear strain in the horizontal plane.
    pub shear_max_h: Vec<f64>,
    /// Misfit length over data length per sample.
    pub misfit_ratio: Vec<f64>,
    /// Strain tensor per sample, nt x 3 x 3.
    pub strain: Array3<f64>,
    /// Solution vector per sample, nt x 6.
    pub solution: Array2<f64>,
    /// Observed displacement differences, nt x 3N.
    pub data: Array2<f64>,
    /// Model-predicted displacement differences, nt x 3N.
    pub predicted: Array2<f64>,
    /// Residuals, nt x 3N.
    pub misfit: Array2<f64>,
    /// Solution covariance, 6 x 6.
    pub cov_solution: DMatrix<f64>,
    /// Covariance of the strain elements (e11, e21, e22, e33).
    pub cov_strain: DMatrix<f64>,
    /// Covariance of the rotation elements (w21, w31, w32).
    pub cov_rotation: DMatrix<f64>,
    /// Covariance of the shear elements (g11, g12, g22, g33).
    pub cov_shear: DMatrix<f64>,
    /// Covariance of the horizontal shear elements (g11, g12, g22).
    pub cov_shear_h: DMatrix<f64>,
    pub sigma_d: f64,
    pub sigma_dh: f64,
    pub sigma_w1: f64,
    pub sigma_w2: f64,
    pub sigma_w3: f64,
    pub sigma_tilt: f64,
}

/// Inverts three-component motions on a subarray for rotation and strain.
///
/// `ts_e`, `ts_n`, `ts_z` are nt x na sample matrices, simultaneous across
/// stations; `coords` is na x 3 in units matching the seismograms. Fewer
/// than three subarray stations leave the system underdetermined and are
/// rejected; exactly three make it even-determined, which is accepted with
/// a warning.
pub fn rotation_strain(
    subarray: &[usize],
    ts_e: &Array2<f64>,
    ts_n: &Array2<f64>,
    ts_z: &Array2<f64>,
    vp: f64,
    vs: f64,
    sigmau: &NoiseStd,
    coords: &Array2<f64>,
) -> ArrayResult<RotationStrain> {
    let logger = LogManager::new();
    let (nt, na) = ts_e.dim();

    if ts_n.dim() != (nt, na) || ts_z.dim() != (nt, na) {
        return Err(ArrayError::InvalidInput(
            "component matrices have different shapes".into(),
        ));
    }
    if coords.dim() != (na, 3) {
        return Err(ArrayError::InvalidInput(format!(
            "coordinates must be {na} x 3 to match the {na} data columns"
        )));
    }
    if subarray.is_empty() || subarray.iter().any(|&s| s >= na) {
        return Err(ArrayError::InvalidInput(
            "subarray indices out of station range".into(),
        ));
    }

    let n_plus_1 = subarray.len();
    let n = n_plus_1 - 1;
    if n_plus_1 < 3 {
        return Err(ArrayError::InvalidInput(
            "the problem is underdetermined for fewer than 3 stations".into(),
        ));
    }
    if n_plus_1 == 3 {
        logger.alert("for a 3-station array the problem is even-determined");
    }

    let eta = 1.0 - 2.0 * vs * vs / (vp * vp);

    // design matrix: each station offset contributes three rows relating
    // the gradient vector (u1,1 u1,2 u1,3 u2,1 u2,2 u2,3) to its
    // displacement differences, with the free-surface condition folded in
    let mut design = DMatrix::zeros(3 * n, 6);
    for i in 0..n {
        let ss = [
            coords[[subarray[i + 1], 0]] - coords[[subarray[0], 0]],
            coords[[subarray[i + 1], 1]] - coords[[subarray[0], 1]],
            coords[[subarray[i + 1], 2]] - coords[[subarray[0], 2]],
        ];
        for c in 0..3 {
            design[(3 * i, c)] = ss[c];
            design[(3 * i + 1, 3 + c)] = ss[c];
        }
        design[(3 * i + 2, 0)] = -eta * ss[2];
        design[(3 * i + 2, 2)] = -ss[0];
        design[(3 * i + 2, 4)] = -eta * ss[2];
        design[(3 * i + 2, 5)] = -ss[1];
    }

    // displacement covariance, station-major diagonal
    let mut cu_diag = vec![0.0f64; 3 * n_plus_1];
    match sigmau {
        NoiseStd::Scalar(s) => cu_diag.fill(s * s),
        NoiseStd::PerStation(values) => {
            if values.len() != na {
                return Err(ArrayError::InvalidInput(format!(
                    "per-station noise must have {na} entries"
                )));
            }
            for (slot, &station) in subarray.iter().enumerate() {
                for c in 0..3 {
                    cu_diag[3 * slot + c] = values[station] * values[station];
                }
            }
        }
        NoiseStd::PerComponent(values) => {
            if values.len() != na {
                return Err(ArrayError::InvalidInput(format!(
                    "per-component noise must have {na} rows"
                )));
            }
            for (slot, &station) in subarray.iter().enumerate() {
                for c in 0..3 {
                    cu_diag[3 * slot + c] = values[station][c] * values[station][c];
                }
            }
        }
    }

    // differencing matrix: row block i is -I3 at the reference station and
    // +I3 at station i+1
    let mut differencing = DMatrix::zeros(3 * n, 3 * n_plus_1);
    for i in 0..n {
        for c in 0..3 {
            differencing[(3 * i + c, c)] = -1.0;
            differencing[(3 * i + c, 3 * (i + 1) + c)] = 1.0;
        }
    }

    let cu = DMatrix::from_diagonal(&DVector::from_vec(cu_diag));
    let cd = &differencing * &cu * differencing.transpose();
    let cd_inv = cd
        .clone()
        .try_inverse()
        .ok_or_else(|| ArrayError::Numerical("data covariance inversion failed".into()))?;

    let normal = design.transpose() * &cd_inv * &design;
    let condition = linalg::condition_number(&normal);
    if condition > 100.0 {
        logger.alert(&format!(
            "rotation/strain inversion is poorly constrained, condition number {condition:.1}"
        ));
    }
    let normal_inv = normal
        .try_inverse()
        .ok_or_else(|| ArrayError::Numerical("normal-equation inversion failed".into()))?;
    let generalized_inverse = &normal_inv * design.transpose() * &cd_inv;

    // mappings from the solution to strain and rotation elements, used for
    // the covariance propagation
    let mut b_strain = DMatrix::zeros(4, 6);
    b_strain[(0, 0)] = 1.0;
    b_strain[(1, 1)] = 0.5;
    b_strain[(1, 3)] = 0.5;
    b_strain[(2, 4)] = 1.0;
    b_strain[(3, 0)] = -eta;
    b_strain[(3, 4)] = -eta;

    let mut b_rotation = DMatrix::zeros(3, 6);
    b_rotation[(0, 1)] = 0.5;
    b_rotation[(0, 3)] = -0.5;
    b_rotation[(1, 2)] = 1.0;
    b_rotation[(2, 5)] = 1.0;

    let aa = (2.0 + eta) / 3.0;
    let bb = (1.0 - eta) / 3.0;
    let cc = (1.0 + 2.0 * eta) / 3.0;
    let mut b_shear = DMatrix::zeros(4, 6);
    b_shear[(0, 0)] = aa;
    b_shear[(0, 4)] = -bb;
    b_shear[(1, 3)] = 0.5;
    b_shear[(2, 2)] = 0.5;
    b_shear[(2, 0)] = -bb;
    b_shear[(2, 4)] = aa;
    b_shear[(3, 0)] = -cc;
    b_shear[(3, 4)] = -cc;

    let mut b_shear_h = DMatrix::zeros(3, 6);
    b_shear_h[(0, 0)] = 0.5;
    b_shear_h[(0, 4)] = -0.5;
    b_shear_h[(1, 1)] = 0.5;
    b_shear_h[(1, 3)] = 0.5;
    b_shear_h[(2, 0)] = -0.5;
    b_shear_h[(2, 4)] = 0.5;

    let cov_solution = &generalized_inverse * &cd * generalized_inverse.transpose();
    let cov_strain = &b_strain * &cov_solution * b_strain.transpose();
    let cov_rotation = &b_rotation * &cov_solution * b_rotation.transpose();
    let cov_shear = &b_shear * &cov_solution * b_shear.transpose();
    let cov_shear_h = &b_shear_h * &cov_solution * b_shear_h.transpose();

    let cdh = cov_solution[(0, 0)] + 2.0 * cov_solution[(0, 4)] + cov_solution[(4, 4)];
    let sigma_dh = cdh.sqrt();
    let sigma_d = ((1.0 - eta) * (1.0 - eta) * cdh).sqrt();
    let cw3 = (cov_solution[(1, 1)] - 2.0 * cov_solution[(1, 3)] + cov_solution[(3, 3)]) / 4.0;
    let sigma_w3 = cw3.sqrt();
    let sigma_w1 = cov_solution[(5, 5)].sqrt();
    let sigma_w2 = cov_solution[(2, 2)].sqrt();
    // tilt is not linear in the solution; conservative bound
    let sigma_tilt = sigma_w1.max(sigma_w2) * (2.0 - PI / 2.0).sqrt();

    let mut w1 = vec![0.0; nt];
    let mut w2 = vec![0.0; nt];
    let mut w3 = vec![0.0; nt];
    let mut wmag = vec![0.0; nt];
    let mut tilt = vec![0.0; nt];
    let mut dilatation_h = vec![0.0; nt];
    let mut shear_max = vec![0.0; nt];
    let mut shear_max_h = vec![0.0; nt];
    let mut misfit_ratio = vec![0.0; nt];
    let mut strain = Array3::zeros((nt, 3, 3));
    let mut solution = Array2::zeros((nt, 6));
    let mut data_out = Array2::zeros((nt, 3 * n));
    let mut predicted = Array2::zeros((nt, 3 * n));
    let mut misfit_out = Array2::zeros((nt, 3 * n));

    let mut data_vec = DVector::zeros(3 * n);
    for t in 0..nt {
        let mut sumlen = 0.0;
        for i in 0..n {
            let de = ts_e[[t, subarray[i + 1]]] - ts_e[[t, subarray[0]]];
            let dn = ts_n[[t, subarray[i + 1]]] - ts_n[[t, subarray[0]]];
            let dz = ts_z[[t, subarray[i + 1]]] - ts_z[[t, subarray[0]]];
            data_vec[3 * i] = de;
            data_vec[3 * i + 1] = dn;
            data_vec[3 * i + 2] = dz;
            sumlen += (de * de + dn * dn + dz * dz).sqrt();
        }

        let ptilde = &generalized_inverse * &data_vec;
        let u31 = -ptilde[2];
        let u32 = -ptilde[5];
        let u33 = -eta * (ptilde[0] + ptilde[4]);

        let pred = &design * &ptilde;
        let mut misfit_len = 0.0;
        for i in 0..n {
            let m = [
                pred[3 * i] - data_vec[3 * i],
                pred[3 * i + 1] - data_vec[3 * i + 1],
                pred[3 * i + 2] - data_vec[3 * i + 2],
            ];
            misfit_len += (m[0] * m[0] + m[1] * m[1] + m[2] * m[2]).sqrt();
        }
        misfit_ratio[t] = misfit_len / sumlen;

        for k in 0..3 * n {
            data_out[[t, k]] = data_vec[k];
            predicted[[t, k]] = pred[k];
            misfit_out[[t, k]] = pred[k] - data_vec[k];
        }
        for k in 0..6 {
            solution[[t, k]] = ptilde[k];
        }

        let gradient = Matrix3::new(
            ptilde[0], ptilde[1], ptilde[2], //
            ptilde[3], ptilde[4], ptilde[5], //
            u31, u32, u33,
        );
        let e = (gradient + gradient.transpose()) * 0.5;
        for r in 0..3 {
            for c in 0..3 {
                strain[[t, r, c]] = e[(r, c)];
            }
        }

        w1[t] = -ptilde[5];
        w2[t] = ptilde[2];
        w3[t] = 0.5 * (ptilde[3] - ptilde[1]);
        wmag[t] = (w1[t] * w1[t] + w2[t] * w2[t] + w3[t] * w3[t]).sqrt();
        tilt[t] = (w1[t] * w1[t] + w2[t] * w2[t]).sqrt();

        dilatation_h[t] = e[(0, 0)] + e[(1, 1)];

        let eh = Matrix2::new(e[(0, 0)], e[(0, 1)], e[(1, 0)], e[(1, 1)]);
        let gamma_h = eh - Matrix2::identity() * (eh.trace() / 2.0);
        let eig_h = SymmetricEigen::new(gamma_h).eigenvalues;
        shear_max_h[t] = 0.5 * (eig_h.max() - eig_h.min());

        let eig = SymmetricEigen::new(e).eigenvalues;
        shear_max[t] = 0.5 * (eig.max() - eig.min());
    }

    // the free-surface condition ties total dilatation to the horizontal
    let dilatation: Vec<f64> = dilatation_h.iter().map(|dh| dh * (1.0 - eta)).collect();

    Ok(RotationStrain {
        design,
        generalized_inverse,
        w1,
        w2,
        w3,
        wmag,
        tilt,
        dilatation,
        dilatation_h,
        shear_max,
        shear_max_h,
        misfit_ratio,
        strain,
        solution,
        data: data_out,
        predicted,
        misfit: misfit_out,
        cov_solution,
        cov_strain,
        cov_rotation,
        cov_shear,
        cov_shear_h,
        sigma_d,
        sigma_dh,
        sigma_w1,
        sigma_w2,
        sigma_w3,
        sigma_tilt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const VP: f64 = 6.0;
    const VS: f64 = 3.46;

    fn square_coords() -> Array2<f64> {
        array![
            [0.0, 0.0, 0.0],
            [1000.0, 0.0, 0.0],
            [0.0, 1000.0, 0.0],
            [1000.0, 1000.0, 0.0],
        ]
    }

    /// Rigid rotation about the vertical axis: u_e = -theta*y,
    /// u_n = theta*x, u_z = 0.
    fn rigid_rotation(coords: &Array2<f64>, thetas: &[f64]) -> (Array2<f64>, Array2<f64>, Array2<f64>) {
        let na = coords.nrows();
        let nt = thetas.len();
        let mut ts_e = Array2::zeros((nt, na));
        let mut ts_n = Array2::zeros((nt, na));
        let ts_z = Array2::zeros((nt, na));
        for (t, &theta) in thetas.iter().enumerate() {
            for s in 0..na {
                ts_e[[t, s]] = -theta * coords[[s, 1]];
                ts_n[[t, s]] = theta * coords[[s, 0]];
            }
        }
        (ts_e, ts_n, ts_z)
    }

    #[test]
    fn two_station_inversion_is_rejected() {
        let coords = square_coords();
        let (ts_e, ts_n, ts_z) = rigid_rotation(&coords, &[1e-6]);
        let result = rotation_strain(
            &[0, 1],
            &ts_e,
            &ts_n,
            &ts_z,
            VP,
            VS,
            &NoiseStd::Scalar(1e-9),
            &coords,
        );
        assert!(result.is_err());
    }

    #[test]
    fn three_station_inversion_still_produces_a_result() {
        let coords = square_coords();
        let thetas = [1e-6, -2e-6, 5e-7];
        let (ts_e, ts_n, ts_z) = rigid_rotation(&coords, &thetas);
        let out = rotation_strain(
            &[0, 1, 2],
            &ts_e,
            &ts_n,
            &ts_z,
            VP,
            VS,
            &NoiseStd::Scalar(1e-9),
            &coords,
        )
        .unwrap();
        for (got, want) in out.w3.iter().zip(thetas.iter()) {
            assert!((got - want).abs() < 1e-10, "torsion {got} vs {want}");
        }
    }

    #[test]
    fn pure_torsion_leaves_no_strain_behind() {
        let coords = square_coords();
        let thetas = [1e-6, 2e-6, -1e-6, 0.0];
        let (ts_e, ts_n, ts_z) = rigid_rotation(&coords, &thetas);
        let out = rotation_strain(
            &[0, 1, 2, 3],
            &ts_e,
            &ts_n,
            &ts_z,
            VP,
            VS,
            &NoiseStd::Scalar(1e-9),
            &coords,
        )
        .unwrap();
        for t in 0..thetas.len() {
            assert!((out.w3[t] - thetas[t]).abs() < 1e-10);
            assert!((out.wmag[t] - thetas[t].abs()).abs() < 1e-10);
            assert!(out.tilt[t].abs() < 1e-10);
            assert!(out.dilatation[t].abs() < 1e-10);
            assert!(out.dilatation_h[t].abs() < 1e-10);
            assert!(out.shear_max[t].abs() < 1e-10);
            // exact model: the fit reproduces the data
            for k in 0..out.data.ncols() {
                assert!((out.predicted[[t, k]] - out.data[[t, k]]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn uniform_strain_is_recovered_without_rotation() {
        let coords = square_coords();
        let (a, b) = (3e-6, 1e-6);
        let na = coords.nrows();
        let nt = 2;
        let mut ts_e = Array2::zeros((nt, na));
        let mut ts_n = Array2::zeros((nt, na));
        let ts_z = Array2::zeros((nt, na));
        for t in 0..nt {
            let scale = (t + 1) as f64;
            for s in 0..na {
                ts_e[[t, s]] = scale * a * coords[[s, 0]];
                ts_n[[t, s]] = scale * b * coords[[s, 1]];
            }
        }
        let out = rotation_strain(
            &[0, 1, 2, 3],
            &ts_e,
            &ts_n,
            &ts_z,
            VP,
            VS,
            &NoiseStd::Scalar(1e-9),
            &coords,
        )
        .unwrap();
        let eta = 1.0 - 2.0 * VS * VS / (VP * VP);
        for t in 0..nt {
            let scale = (t + 1) as f64;
            assert!((out.dilatation_h[t] - scale * (a + b)).abs() < 1e-12);
            assert!((out.dilatation[t] - scale * (a + b) * (1.0 - eta)).abs() < 1e-12);
            assert!(out.w3[t].abs() < 1e-12);
            assert!((out.shear_max_h[t] - scale * (a - b) / 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn covariance_blocks_have_the_documented_shapes() {
        let coords = square_coords();
        let (ts_e, ts_n, ts_z) = rigid_rotation(&coords, &[1e-6]);
        let out = rotation_strain(
            &[0, 1, 2, 3],
            &ts_e,
            &ts_n,
            &ts_z,
            VP,
            VS,
            &NoiseStd::PerStation(vec![1e-9, 2e-9, 1e-9, 3e-9]),
            &coords,
        )
        .unwrap();
        assert_eq!(out.cov_solution.shape(), (6, 6));
        assert_eq!(out.cov_strain.shape(), (4, 4));
        assert_eq!(out.cov_rotation.shape(), (3, 3));
        assert_eq!(out.cov_shear.shape(), (4, 4));
        assert_eq!(out.cov_shear_h.shape(), (3, 3));
        assert!(
            (out.sigma_tilt - out.sigma_w1.max(out.sigma_w2) * (2.0 - PI / 2.0).sqrt()).abs()
                < 1e-15
        );
        assert!(out.sigma_d > 0.0 && out.sigma_dh > 0.0 && out.sigma_w3 > 0.0);
    }

    #[test]
    fn noise_vector_length_is_validated() {
        let coords = square_coords();
        let (ts_e, ts_n, ts_z) = rigid_rotation(&coords, &[1e-6]);
        let result = rotation_strain(
            &[0, 1, 2, 3],
            &ts_e,
            &ts_n,
            &ts_z,
            VP,
            VS,
            &NoiseStd::PerStation(vec![1e-9, 2e-9]),
            &coords,
        );
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_subarray_index_is_rejected() {
        let coords = square_coords();
        let (ts_e, ts_n, ts_z) = rigid_rotation(&coords, &[1e-6]);
        let result = rotation_strain(
            &[0, 1, 4],
            &ts_e,
            &ts_n,
            &ts_z,
            VP,
            VS,
            &NoiseStd::Scalar(1e-9),
            &coords,
        );
        assert!(result.is_err());
    }
}
