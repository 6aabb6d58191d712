use std::f64::consts::PI;

/// Removes the mean in place.
pub fn demean(data: &mut [f64]) {
    if data.is_empty() {
        return;
    }
    let mean = data.iter().sum::<f64>() / data.len() as f64;
    for value in data.iter_mut() {
        *value -= mean;
    }
}

/// Removes the line through the first and last sample in place.
pub fn detrend_simple(data: &mut [f64]) {
    let n = data.len();
    if n < 2 {
        return;
    }
    let first = data[0];
    let slope = (data[n - 1] - first) / (n - 1) as f64;
    for (i, value) in data.iter_mut().enumerate() {
        *value -= first + slope * i as f64;
    }
}

/// Symmetric cosine taper, ramping over a fraction `p` of the window.
///
/// `p/2` of the samples on each side rise from zero with a half cosine;
/// the middle stays at one.
pub fn cosine_taper(npts: usize, p: f64) -> Vec<f64> {
    let mut window = vec![1.0; npts];
    let frac = (npts as f64 * p / 2.0 + 0.5) as usize;
    if frac >= 2 && npts >= 2 * frac {
        let ramp = (frac - 1) as f64;
        for i in 0..frac {
            let w = 0.5 * (1.0 - (PI * i as f64 / ramp).cos());
            window[i] = w;
            window[npts - 1 - i] = w;
        }
    }
    window
}
