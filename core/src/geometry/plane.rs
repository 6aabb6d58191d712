use nalgebra::DMatrix;
use ndarray::Array2;

/// Projects centered station positions onto their best-fitting plane.
///
/// The plane through the origin minimizing the squared normal distances
/// has the right singular vector of the smallest singular value as its
/// normal; each position moves along that normal onto the plane. Arrays on
/// inclined slopes get their topographic bias removed this way.
pub fn correct_to_plane(geometry: &mut Array2<f64>) {
    let nstat = geometry.nrows();
    if nstat < 3 {
        return;
    }

    let matrix = DMatrix::from_fn(nstat, 3, |i, j| geometry[[i, j]]);
    let svd = matrix.svd(false, true);
    let v_t = match svd.v_t {
        Some(v_t) => v_t,
        None => return,
    };

    let mut smallest = 0;
    for (k, value) in svd.singular_values.iter().enumerate() {
        if *value < svd.singular_values[smallest] {
            smallest = k;
        }
    }
    let normal = [v_t[(smallest, 0)], v_t[(smallest, 1)], v_t[(smallest, 2)]];
    let norm_sq: f64 = normal.iter().map(|n| n * n).sum();
    if norm_sq == 0.0 {
        return;
    }

    for i in 0..nstat {
        let dot = normal[0] * geometry[[i, 0]]
            + normal[1] * geometry[[i, 1]]
            + normal[2] * geometry[[i, 2]];
        for j in 0..3 {
            geometry[[i, j]] -= normal[j] * dot / norm_sq;
        }
    }
}
