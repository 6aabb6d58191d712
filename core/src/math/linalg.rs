use nalgebra::{Complex, DMatrix};

/// Moore-Penrose pseudo-inverse with a tolerance relative to the largest
/// singular value, for near-singular covariance matrices.
pub fn pseudo_inverse(
    matrix: &DMatrix<Complex<f64>>,
    rcond: f64,
) -> Option<DMatrix<Complex<f64>>> {
    let svd = matrix.clone().svd(true, true);
    let largest = svd
        .singular_values
        .iter()
        .cloned()
        .fold(0.0f64, f64::max);
    svd.pseudo_inverse(rcond * largest).ok()
}

/// 2-norm condition number, the ratio of the extreme singular values.
pub fn condition_number(matrix: &DMatrix<f64>) -> f64 {
    let svd = matrix.clone().svd(false, false);
    let mut largest = 0.0f64;
    let mut smallest = f64::INFINITY;
    for value in svd.singular_values.iter() {
        largest = largest.max(*value);
        smallest = smallest.min(*value);
    }
    if smallest == 0.0 {
        f64::INFINITY
    } else {
        largest / smallest
    }
}
