use std::sync::Arc;

use num_complex::Complex64;
use rustfft::{num_traits::Zero, Fft, FftPlanner};

/// Smallest power of two not less than `n`.
pub fn next_pow2(n: usize) -> usize {
    let mut p = 1;
    while p < n {
        p *= 2;
    }
    p
}

/// Helper that wraps the `rustfft` planner for reuse across windows.
///
/// The plan length is fixed at construction; shorter real inputs are zero
/// padded up to it.
pub struct FftHelper {
    forward: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex64>,
}

impl FftHelper {
    pub fn new(nfft: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(nfft);
        let buffer = vec![Complex64::zero(); nfft];
        Self { forward, buffer }
    }

    pub fn nfft(&self) -> usize {
        self.buffer.len()
    }

    /// Forward transform of a real window, returning `nf` bins from `nlow`.
    pub fn band_spectrum(&mut self, input: &[f64], nlow: usize, nf: usize) -> Vec<Complex64> {
        self.buffer.fill(Complex64::zero());
        for (slot, &value) in self.buffer.iter_mut().zip(input.iter()) {
            *slot = Complex64::new(value, 0.0);
        }
        self.forward.process(&mut self.buffer);
        self.buffer[nlow..nlow + nf].to_vec()
    }
}

/// Analytic-signal builder for a fixed window length.
///
/// Zeroes the negative frequencies and doubles the positive ones, keeping
/// DC and (for even lengths) the Nyquist bin.
pub struct HilbertHelper {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex64>,
}

impl HilbertHelper {
    pub fn new(n: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(n);
        let inverse = planner.plan_fft_inverse(n);
        let buffer = vec![Complex64::zero(); n];
        Self {
            forward,
            inverse,
            buffer,
        }
    }

    /// Analytic signal of `x`; `x` must match the construction length.
    pub fn analytic(&mut self, x: &[f64]) -> Vec<Complex64> {
        let n = self.buffer.len();
        debug_assert_eq!(x.len(), n);
        for (slot, &value) in self.buffer.iter_mut().zip(x.iter()) {
            *slot = Complex64::new(value, 0.0);
        }
        self.forward.process(&mut self.buffer);

        let half = n / 2;
        for k in 1..n {
            if n % 2 == 0 {
                if k < half {
                    self.buffer[k] *= 2.0;
                } else if k > half {
                    self.buffer[k] = Complex64::zero();
                }
            } else if k <= half {
                self.buffer[k] *= 2.0;
            } else {
                self.buffer[k] = Complex64::zero();
            }
        }

        self.inverse.process(&mut self.buffer);
        let scale = 1.0 / n as f64;
        self.buffer.iter().map(|c| c * scale).collect()
    }
}

/// One-shot analytic signal, for callers without a reusable plan.
pub fn analytic_signal(x: &[f64]) -> Vec<Complex64> {
    if x.is_empty() {
        return Vec::new();
    }
    HilbertHelper::new(x.len()).analytic(x)
}
