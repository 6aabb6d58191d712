use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::geometry::{geometry_from_traces, CoordinateSystem};
use crate::math::{detrend_simple, HilbertHelper};
use crate::processing::beam::BeamMethod;
use crate::processing::steering::{timeshift_table_baz, CorrectionVelocity};
use crate::processing::window::stream_offsets;
use crate::waveform::{check_sampling_rates, Trace};
use crate::{ArrayError, ArrayResult};

/// Configuration of one vespagram call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VespagramConfig {
    /// Backazimuth the stack is steered toward, degrees.
    pub baz_deg: f64,
    /// Slowness axis (min, max, step) in s/km.
    pub sll: f64,
    pub slm: f64,
    pub sls: f64,
    pub stime: f64,
    pub etime: f64,
    /// Stacking flavor; only the delay-and-sum and phase-weighted kinds
    /// apply here.
    pub method: BeamMethod,
    pub nthroot: u32,
    pub coordinate_system: CoordinateSystem,
    pub correct_3dplane: bool,
    pub static_3d: bool,
    pub vel_cor: CorrectionVelocity,
}

/// Slant stack of the stream along a slowness axis at one backazimuth.
#[derive(Debug, Clone)]
pub struct Vespagram {
    pub slownesses: Vec<f64>,
    /// One beam trace per slowness value.
    pub beams: Array2<f64>,
    /// Index of the best-scoring slowness.
    pub best: usize,
    pub max_power: f64,
}

impl Vespagram {
    pub fn best_slowness(&self) -> f64 {
        self.slownesses[self.best]
    }
}

/// Stacks the stream toward a fixed backazimuth over a slowness range.
pub fn vespagram(traces: &[Trace], cfg: &VespagramConfig) -> ArrayResult<Vespagram> {
    if cfg.nthroot == 0 {
        return Err(ArrayError::InvalidInput("nthroot must be at least 1".into()));
    }
    if cfg.method == BeamMethod::SlownessWhitenedPower {
        return Err(ArrayError::InvalidInput(
            "vespagram supports the DLS and PWS stacks only".into(),
        ));
    }
    let fs = check_sampling_rates(traces)?;
    let nstat = traces.len();

    let geometry = geometry_from_traces(traces, cfg.coordinate_system, cfg.correct_3dplane)?;
    let (slownesses, table) = timeshift_table_baz(
        &geometry,
        cfg.sll,
        cfg.slm,
        cfg.sls,
        cfg.baz_deg,
        &cfg.vel_cor,
        cfg.static_3d,
    )?;
    let nslow = slownesses.len();

    let mini = table.iter().cloned().fold(f64::INFINITY, f64::min);
    let maxi = table.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let offsets = stream_offsets(traces, cfg.stime - mini, cfg.etime - maxi)?;

    let ndat = (((cfg.etime - maxi) - (cfg.stime - mini)) * fs) as i64;
    if ndat <= 0 {
        return Err(ArrayError::WindowTooShort);
    }
    let ndat = ndat as usize;

    let mut data: Vec<Vec<f64>> = traces.iter().map(|tr| tr.data.clone()).collect();
    for series in data.iter_mut() {
        detrend_simple(series);
    }

    let inv_n = 1.0 / nstat as f64;
    let root = 1.0 / f64::from(cfg.nthroot);
    let mut beams = Array2::<f64>::zeros((nslow, ndat));
    let mut station = vec![0.0f64; ndat];
    let mut best = 0usize;
    let mut max_power = f64::NEG_INFINITY;
    let mut hilbert = HilbertHelper::new(ndat);

    for j in 0..nslow {
        let mut singlet = 0.0;

        match cfg.method {
            BeamMethod::DelayAndSum => {
                for i in 0..nstat {
                    let s = offsets.start[i] as i64 + ((table[[i, j]] * fs) + 0.5).trunc() as i64;
                    if !copy_window(&data[i], s, &mut station) {
                        break;
                    }
                    singlet += inv_n * station.iter().map(|v| v * v).sum::<f64>();
                    for (b, &v) in beams.row_mut(j).iter_mut().zip(station.iter()) {
                        *b += inv_n * v.abs().powf(root) * v.signum();
                    }
                }
                for b in beams.row_mut(j).iter_mut() {
                    *b = b.abs().powi(cfg.nthroot as i32) * b.signum();
                }
            }
            BeamMethod::PhaseWeightedStack => {
                let mut stack = vec![Complex64::default(); ndat];
                for i in 0..nstat {
                    let s = offsets.start[i] as i64 + ((table[[i, j]] * fs) + 0.5).trunc() as i64;
                    if !copy_window(&data[i], s, &mut station) {
                        break;
                    }
                    for (acc, value) in stack.iter_mut().zip(hilbert.analytic(&station).iter()) {
                        let phase = value.im.atan2(value.re);
                        *acc += Complex64::new(phase.cos(), phase.sin());
                    }
                }
                for i in 0..nstat {
                    let s = offsets.start[i] as i64 + ((table[[i, j]] * fs) + 0.5).trunc() as i64;
                    if !copy_window(&data[i], s, &mut station) {
                        break;
                    }
                    singlet += inv_n * station.iter().map(|v| v * v).sum::<f64>();
                    for ((b, &v), acc) in beams
                        .row_mut(j)
                        .iter_mut()
                        .zip(station.iter())
                        .zip(stack.iter())
                    {
                        let coh = inv_n * acc.norm();
                        *b += inv_n * v * coh.powi(cfg.nthroot as i32);
                    }
                }
            }
            BeamMethod::SlownessWhitenedPower => unreachable!("rejected at entry"),
        }

        let bs: f64 = beams.row(j).iter().map(|v| v * v).sum();
        let power = if singlet > 0.0 { bs / singlet } else { 0.0 };
        if power > max_power {
            max_power = power;
            best = j;
        }
    }

    Ok(Vespagram {
        slownesses,
        beams,
        best,
        max_power,
    })
}

fn copy_window(data: &[f64], start: i64, out: &mut [f64]) -> bool {
    if start < 0 {
        return false;
    }
    let start = start as usize;
    if start >= data.len() {
        return false;
    }
    let available = (data.len() - start).min(out.len());
    out[..available].copy_from_slice(&data[start..start + available]);
    out[available..].fill(0.0);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::Coordinates;
    use std::f64::consts::PI;

    const TONES: [f64; 5] = [2.5, 3.5, 4.5, 5.5, 6.5];

    /// Plane wave from the west (backazimuth 270) at 0.1 s/km.
    fn plane_wave_traces() -> Vec<Trace> {
        let fs = 100.0;
        let positions = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)];
        positions
            .iter()
            .map(|&(x, y)| {
                let tau = 0.1 * x;
                let data: Vec<f64> = (0..2000)
                    .map(|k| {
                        let t = k as f64 / fs - tau;
                        TONES
                            .iter()
                            .enumerate()
                            .map(|(m, f)| (2.0 * PI * f * t + m as f64).cos())
                            .sum()
                    })
                    .collect();
                Trace::new(data, 0.0, fs, Coordinates::new(x, y, 0.0))
            })
            .collect()
    }

    fn config(method: BeamMethod) -> VespagramConfig {
        VespagramConfig {
            baz_deg: 270.0,
            sll: 0.0,
            slm: 0.2,
            sls: 0.02,
            stime: 1.0,
            etime: 15.0,
            method,
            nthroot: 2,
            coordinate_system: CoordinateSystem::Xy,
            correct_3dplane: false,
            static_3d: false,
            vel_cor: CorrectionVelocity::default(),
        }
    }

    #[test]
    fn delay_and_sum_vespagram_peaks_at_the_true_slowness() {
        let vespa = vespagram(&plane_wave_traces(), &config(BeamMethod::DelayAndSum)).unwrap();
        assert_eq!(vespa.slownesses.len(), 11);
        assert!((vespa.best_slowness() - 0.1).abs() < 1e-9);
        assert!(vespa.max_power > 0.0);
    }

    #[test]
    fn phase_weighted_vespagram_peaks_at_the_true_slowness() {
        let vespa =
            vespagram(&plane_wave_traces(), &config(BeamMethod::PhaseWeightedStack)).unwrap();
        assert!((vespa.best_slowness() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn whitened_power_is_not_a_vespagram_stack() {
        let result = vespagram(
            &plane_wave_traces(),
            &config(BeamMethod::SlownessWhitenedPower),
        );
        assert!(result.is_err());
    }
}
