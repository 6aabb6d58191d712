use ndarray::Array2;
use num_complex::Complex64;

/// Scratch buffers for one sliding-window run.
///
/// Allocated once per call, sized to the grid and window, and borrowed
/// exclusively by the scoring loop; `reset` clears the per-window state.
pub struct WindowScratch {
    pub relpow_map: Array2<f64>,
    pub abspow_map: Array2<f64>,
    /// Stacked beam of the grid node under evaluation.
    pub beam: Vec<f64>,
    /// Beam of the best-scoring node seen in the current window.
    pub best_beam: Vec<f64>,
    /// Shifted single-station window.
    pub station: Vec<f64>,
    /// Phase-coherence accumulator (phase-weighted stack).
    pub stack: Vec<Complex64>,
    /// Coherence magnitudes derived from `stack`.
    pub coherence: Vec<f64>,
}

impl WindowScratch {
    pub fn new(nx: usize, ny: usize, nsamp: usize) -> Self {
        Self {
            relpow_map: Array2::zeros((nx, ny)),
            abspow_map: Array2::zeros((nx, ny)),
            beam: vec![0.0; nsamp],
            best_beam: vec![0.0; nsamp],
            station: vec![0.0; nsamp],
            stack: vec![Complex64::default(); nsamp],
            coherence: vec![0.0; nsamp],
        }
    }

    /// Clears the per-window accumulation state.
    pub fn reset(&mut self) {
        self.relpow_map.fill(0.0);
        self.abspow_map.fill(0.0);
        self.best_beam.fill(0.0);
    }
}
