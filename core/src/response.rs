//! Spatial response of the array geometry, independent of any data.

use ndarray::Array2;
use num_complex::Complex64;
use std::f64::consts::PI;

use crate::geometry::{array_geometry, CoordinateSystem};
use crate::waveform::Coordinates;
use crate::ArrayResult;

/// Symmetric or explicit rectangular limits of a response grid.
#[derive(Debug, Clone, Copy)]
pub enum TransferLimits {
    /// [-limit, limit] on both axes.
    Symmetric(f64),
    Explicit {
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
    },
}

impl TransferLimits {
    fn bounds(self) -> (f64, f64, f64, f64) {
        match self {
            TransferLimits::Symmetric(limit) => (-limit, limit, -limit, limit),
            TransferLimits::Explicit {
                xmin,
                xmax,
                ymin,
                ymax,
            } => (xmin, xmax, ymin, ymax),
        }
    }
}

fn axis(min: f64, max: f64, step: f64) -> Vec<f64> {
    let n = ((max + step / 10.0 - min) / step).ceil() as usize;
    (0..n).map(|i| min + i as f64 * step).collect()
}

fn trapezoid(y: &[f64], dx: f64) -> f64 {
    if y.len() < 2 {
        return 0.0;
    }
    y.windows(2).map(|w| w[0] + w[1]).sum::<f64>() * dx / 2.0
}

fn normalize(mut map: Array2<f64>) -> Array2<f64> {
    let largest = map.iter().cloned().fold(0.0f64, f64::max);
    if largest > 0.0 {
        map.mapv_inplace(|v| v / largest);
    }
    map
}

/// Transfer function over wavenumber differences, normalized to max 1.
///
/// Accumulates `|sum_k exp(i k . r_k)|^2` on the wavenumber grid; the
/// pattern shows how the bare geometry smears a point source.
pub fn transfer_wavenumber(
    coords: &[Coordinates],
    system: CoordinateSystem,
    limits: TransferLimits,
    kstep: f64,
) -> ArrayResult<Array2<f64>> {
    let geometry = array_geometry(coords, system, false)?;
    let (kxmin, kxmax, kymin, kymax) = limits.bounds();
    let kxs = axis(kxmin, kxmax, kstep);
    let kys = axis(kymin, kymax, kstep);

    let mut transff = Array2::zeros((kxs.len(), kys.len()));
    for (i, &kx) in kxs.iter().enumerate() {
        for (j, &ky) in kys.iter().enumerate() {
            let mut sum = Complex64::default();
            for r in 0..geometry.nrows() {
                let phase = geometry[[r, 0]] * kx + geometry[[r, 1]] * ky;
                sum += Complex64::from_polar(1.0, phase);
            }
            transff[[i, j]] = sum.norm_sqr();
        }
    }
    Ok(normalize(transff))
}

/// Transfer function over slowness differences, integrated across the
/// frequency band with the trapezoid rule, normalized to max 1.
pub fn transfer_freqslowness(
    coords: &[Coordinates],
    system: CoordinateSystem,
    limits: TransferLimits,
    sstep: f64,
    fmin: f64,
    fmax: f64,
    fstep: f64,
) -> ArrayResult<Array2<f64>> {
    let geometry = array_geometry(coords, system, false)?;
    let (sxmin, sxmax, symin, symax) = limits.bounds();
    let sxs = axis(sxmin, sxmax, sstep);
    let sys = axis(symin, symax, sstep);
    let freqs = axis(fmin, fmax, fstep);

    let mut buffer = vec![0.0; freqs.len()];
    let mut transff = Array2::zeros((sxs.len(), sys.len()));
    for (i, &sx) in sxs.iter().enumerate() {
        for (j, &sy) in sys.iter().enumerate() {
            for (k, &f) in freqs.iter().enumerate() {
                let mut sum = Complex64::default();
                for r in 0..geometry.nrows() {
                    let phase =
                        (geometry[[r, 0]] * sx + geometry[[r, 1]] * sy) * 2.0 * PI * f;
                    sum += Complex64::from_polar(1.0, phase);
                }
                buffer[k] = sum.norm_sqr();
            }
            transff[[i, j]] = trapezoid(&buffer, fstep);
        }
    }
    Ok(normalize(transff))
}
