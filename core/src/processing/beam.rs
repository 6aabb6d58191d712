use std::str::FromStr;

use ndarray::{Array2, Array3, Array4};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::geometry::{geometry_from_traces, CoordinateSystem};
use crate::math::{cosine_taper, demean, detrend_simple, FftHelper, HilbertHelper};
use crate::processing::fk::{argmax, band_bins, slowness_azimuth, BandBins};
use crate::processing::scratch::WindowScratch;
use crate::processing::sink::{AuxData, PowerMapSink};
use crate::processing::steering::{
    steering_table, timeshift_table, CorrectionVelocity, SlownessGrid,
};
use crate::processing::window::stream_offsets;
use crate::telemetry::{LogManager, WindowCounters};
use crate::waveform::{check_sampling_rates, BeamRecord, TimestampConvention, Trace};
use crate::{ArrayError, ArrayResult};

/// Fraction of the window tapered ahead of the whitened-power transform.
const TAPER_FRACTION: f64 = 0.22;

/// Time-domain beamforming flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeamMethod {
    /// Signed nth-root stack of shifted waveforms.
    DelayAndSum,
    /// Linear stack weighted by instantaneous phase coherence.
    PhaseWeightedStack,
    /// Frequency-normalized spectral beam power; robust to narrowband
    /// noise at the cost of cross-frequency phase information.
    SlownessWhitenedPower,
}

impl FromStr for BeamMethod {
    type Err = ArrayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DLS" => Ok(BeamMethod::DelayAndSum),
            "PWS" => Ok(BeamMethod::PhaseWeightedStack),
            "SWP" => Ok(BeamMethod::SlownessWhitenedPower),
            other => Err(ArrayError::Method(other.to_string())),
        }
    }
}

/// Configuration of one time-domain analysis call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeamConfig {
    pub grid: SlownessGrid,
    /// Sliding window length in seconds; negative means one window over
    /// the usable span.
    pub win_len: f64,
    pub win_frac: f64,
    /// Band for the whitened-power variant.
    pub frqlow: f64,
    pub frqhigh: f64,
    pub stime: f64,
    pub etime: f64,
    pub method: BeamMethod,
    /// Root of the nonlinear stack; 1 keeps the stack linear. Larger
    /// values sharpen beams at the cost of amplitude fidelity.
    pub nthroot: u32,
    pub coordinate_system: CoordinateSystem,
    pub timestamp: TimestampConvention,
    pub correct_3dplane: bool,
    pub static_3d: bool,
    pub vel_cor: CorrectionVelocity,
}

enum Engine {
    DelayAndSum,
    PhaseWeighted(HilbertHelper),
    Whitened(Box<WhitenedState>),
}

struct WhitenedState {
    bins: BandBins,
    steer: Array4<Complex64>,
    taper: Vec<f64>,
    fft: FftHelper,
    spectra: Array2<Complex64>,
    beam: Array3<f64>,
    grid_max: Vec<f64>,
}

/// Runs the sliding-window time-domain beamformer over the stream.
///
/// Every window appends one record; power maps and the best beam go to the
/// sink. A window too small for the slowness grid aborts the whole run.
pub fn beamform(
    traces: &[Trace],
    cfg: &BeamConfig,
    sink: &mut dyn PowerMapSink,
) -> ArrayResult<Vec<BeamRecord>> {
    if cfg.nthroot == 0 {
        return Err(ArrayError::InvalidInput("nthroot must be at least 1".into()));
    }
    let fs = check_sampling_rates(traces)?;
    let nstat = traces.len();
    let logger = LogManager::new();
    let counters = WindowCounters::new();

    let geometry = geometry_from_traces(traces, cfg.coordinate_system, cfg.correct_3dplane)?;
    let (nx, ny) = (cfg.grid.nx(), cfg.grid.ny());
    let timeshifts = timeshift_table(&geometry, &cfg.grid, &cfg.vel_cor, cfg.static_3d)?;
    let mini = timeshifts.iter().cloned().fold(f64::INFINITY, f64::min);
    let maxi = timeshifts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    // shift the coverage check by the table extremes so every shifted read
    // stays inside the common span
    let offsets = stream_offsets(traces, cfg.stime - mini, cfg.etime - maxi)?;

    let nsamp = if cfg.win_len < 0.0 {
        (((cfg.etime - maxi) - (cfg.stime - mini)) * fs) as i64
    } else {
        (cfg.win_len * fs) as i64
    };
    if nsamp <= 0 {
        return Err(ArrayError::WindowTooShort);
    }
    let nsamp = nsamp as usize;
    let nstep = ((nsamp as f64 * cfg.win_frac) as usize).max(1);

    let mut data: Vec<Vec<f64>> = traces.iter().map(|tr| tr.data.clone()).collect();
    for series in data.iter_mut() {
        detrend_simple(series);
    }

    let mut engine = match cfg.method {
        BeamMethod::DelayAndSum => Engine::DelayAndSum,
        BeamMethod::PhaseWeightedStack => Engine::PhaseWeighted(HilbertHelper::new(nsamp)),
        BeamMethod::SlownessWhitenedPower => {
            let bins = band_bins(nsamp, fs, cfg.frqlow, cfg.frqhigh)?;
            // spectra carry exp(-i w tau); the negated table steers them
            // back into phase
            let negated = timeshifts.mapv(|t| -t);
            let steer = steering_table(&negated, bins.nlow, bins.nf, bins.deltaf);
            let taper = cosine_taper(nsamp, TAPER_FRACTION);
            let fft = FftHelper::new(bins.nfft);
            let spectra = Array2::zeros((nstat, bins.nf));
            let beam = Array3::zeros((bins.nf, nx, ny));
            let grid_max = vec![0.0; bins.nf];
            Engine::Whitened(Box::new(WhitenedState {
                bins,
                steer,
                taper,
                fft,
                spectra,
                beam,
                grid_max,
            }))
        }
    };

    let mut scratch = WindowScratch::new(nx, ny, nsamp);
    let mut records = Vec::new();
    let mut offset = 0usize;
    let mut newstart = cfg.stime;
    let mut count = 0usize;

    loop {
        scratch.reset();
        let proceed = match &mut engine {
            Engine::DelayAndSum => {
                score_delay_and_sum(
                    &data,
                    &offsets.start,
                    offset,
                    &timeshifts,
                    fs,
                    cfg.nthroot,
                    &mut scratch,
                );
                true
            }
            Engine::PhaseWeighted(hilbert) => {
                score_phase_weighted(
                    &data,
                    &offsets.start,
                    offset,
                    &timeshifts,
                    fs,
                    cfg.nthroot,
                    hilbert,
                    &mut scratch,
                );
                true
            }
            Engine::Whitened(state) => {
                score_whitened(&data, &offsets.start, offset, state, &mut scratch)
            }
        };
        if !proceed {
            break;
        }
        counters.record_processed();

        let (ix, iy) = argmax(&scratch.abspow_map);
        let abspow = scratch.abspow_map[[ix, iy]];
        if !abspow.is_finite() {
            return Err(ArrayError::Numerical(format!(
                "non-finite beam power at grid node ({ix}, {iy})"
            )));
        }
        sink.emit(&scratch.abspow_map, AuxData::Beam(&scratch.best_beam), count)?;
        count += 1;

        let (slow_x, slow_y) = cfg.grid.slowness_at(ix, iy);
        let (slow, baz) = slowness_azimuth(slow_x, slow_y);
        records.push(BeamRecord {
            timestamp: cfg.timestamp.apply(newstart),
            abs_power: abspow,
            backazimuth_deg: baz,
            slowness_x: slow_x,
            slowness_y: slow_y,
            slowness_s_km: slow,
        });
        counters.record_emitted();

        if newstart + (nsamp + nstep) as f64 / fs > cfg.etime {
            break;
        }
        offset += nstep;
        newstart += nstep as f64 / fs;
    }

    let (processed, _, emitted) = counters.snapshot();
    logger.record(&format!(
        "time-domain beamforming: {processed} windows, {emitted} records"
    ));
    Ok(records)
}

/// Copies the shifted station window into `out`, zero padding a short
/// tail. Returns false when the window starts outside the data.
fn shifted_window(data: &[f64], start: i64, out: &mut [f64]) -> bool {
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

fn sample_shift(tau: f64, fs: f64) -> i64 {
    (tau * fs + 0.5).trunc() as i64
}

#[allow(clippy::too_many_arguments)]
fn score_delay_and_sum(
    data: &[Vec<f64>],
    spoint: &[usize],
    offset: usize,
    timeshifts: &Array3<f64>,
    fs: f64,
    nthroot: u32,
    scratch: &mut WindowScratch,
) {
    let nstat = data.len();
    let inv_n = 1.0 / nstat as f64;
    let root = 1.0 / f64::from(nthroot);
    let (nx, ny) = scratch.abspow_map.dim();
    let mut max_power = f64::NEG_INFINITY;

    for x in 0..nx {
        for y in 0..ny {
            let mut singlet = 0.0;
            scratch.beam.fill(0.0);
            for i in 0..nstat {
                let s = spoint[i] as i64 + sample_shift(timeshifts[[i, x, y]], fs) + offset as i64;
                if !shifted_window(&data[i], s, &mut scratch.station) {
                    break;
                }
                singlet += inv_n * scratch.station.iter().map(|v| v * v).sum::<f64>();
                for (b, &v) in scratch.beam.iter_mut().zip(scratch.station.iter()) {
                    // |v|^(1/n) * sgn(v); identically zero samples
                    // contribute nothing
                    *b += inv_n * v.abs().powf(root) * v.signum();
                }
            }
            for b in scratch.beam.iter_mut() {
                *b = b.abs().powi(nthroot as i32) * b.signum();
            }
            let bs: f64 = scratch.beam.iter().map(|v| v * v).sum();
            let power = if singlet > 0.0 { bs / singlet } else { 0.0 };
            scratch.abspow_map[[x, y]] = power;
            if power > max_power {
                max_power = power;
                scratch.best_beam.copy_from_slice(&scratch.beam);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn score_phase_weighted(
    data: &[Vec<f64>],
    spoint: &[usize],
    offset: usize,
    timeshifts: &Array3<f64>,
    fs: f64,
    nthroot: u32,
    hilbert: &mut HilbertHelper,
    scratch: &mut WindowScratch,
) {
    let nstat = data.len();
    let inv_n = 1.0 / nstat as f64;
    let (nx, ny) = scratch.abspow_map.dim();
    let mut max_power = f64::NEG_INFINITY;

    for x in 0..nx {
        for y in 0..ny {
            scratch.stack.fill(Complex64::default());
            for i in 0..nstat {
                let s = spoint[i] as i64 + sample_shift(timeshifts[[i, x, y]], fs) + offset as i64;
                if !shifted_window(&data[i], s, &mut scratch.station) {
                    break;
                }
                let analytic = hilbert.analytic(&scratch.station);
                for (acc, value) in scratch.stack.iter_mut().zip(analytic.iter()) {
                    let phase = value.im.atan2(value.re);
                    *acc += Complex64::new(phase.cos(), phase.sin());
                }
            }
            for (coh, acc) in scratch.coherence.iter_mut().zip(scratch.stack.iter()) {
                *coh = inv_n * acc.norm();
            }

            let mut singlet = 0.0;
            scratch.beam.fill(0.0);
            for i in 0..nstat {
                let s = spoint[i] as i64 + sample_shift(timeshifts[[i, x, y]], fs) + offset as i64;
                if !shifted_window(&data[i], s, &mut scratch.station) {
                    break;
                }
                singlet += inv_n * scratch.station.iter().map(|v| v * v).sum::<f64>();
                for ((b, &v), &coh) in scratch
                    .beam
                    .iter_mut()
                    .zip(scratch.station.iter())
                    .zip(scratch.coherence.iter())
                {
                    *b += inv_n * v * coh.powi(nthroot as i32);
                }
            }
            let bs: f64 = scratch.beam.iter().map(|v| v * v).sum();
            let power = if singlet > 0.0 { bs / singlet } else { 0.0 };
            scratch.abspow_map[[x, y]] = power;
            if power > max_power {
                max_power = power;
                scratch.best_beam.copy_from_slice(&scratch.beam);
            }
        }
    }
}

/// Returns false when a station's window runs past the end of its data,
/// which terminates the sliding loop.
fn score_whitened(
    data: &[Vec<f64>],
    spoint: &[usize],
    offset: usize,
    state: &mut WhitenedState,
    scratch: &mut WindowScratch,
) -> bool {
    let nstat = data.len();
    let nsamp = scratch.station.len();
    let (nx, ny) = scratch.abspow_map.dim();

    for (i, series) in data.iter().enumerate() {
        let lo = spoint[i] + offset;
        let hi = lo + nsamp;
        if hi > series.len() {
            return false;
        }
        scratch.station.copy_from_slice(&series[lo..hi]);
        demean(&mut scratch.station);
        for (w, t) in scratch.station.iter_mut().zip(state.taper.iter()) {
            *w *= t;
        }
        for (f, value) in state
            .fft
            .band_spectrum(&scratch.station, state.bins.nlow, state.bins.nf)
            .into_iter()
            .enumerate()
        {
            state.spectra[[i, f]] = value;
        }
    }

    for f in 0..state.bins.nf {
        let mut largest = 0.0f64;
        for x in 0..nx {
            for y in 0..ny {
                let mut sum = Complex64::default();
                for l in 0..nstat {
                    sum += state.steer[[f, x, y, l]] * state.spectra[[l, f]];
                }
                let magnitude = sum.norm();
                state.beam[[f, x, y]] = magnitude;
                largest = largest.max(magnitude);
            }
        }
        state.grid_max[f] = largest;
    }

    let inv_nf = 1.0 / state.bins.nf as f64;
    for x in 0..nx {
        for y in 0..ny {
            let mut total = 0.0;
            for f in 0..state.bins.nf {
                if state.grid_max[f] > 0.0 {
                    total += state.beam[[f, x, y]] / state.grid_max[f];
                }
            }
            scratch.abspow_map[[x, y]] = total * inv_nf;
        }
    }

    // the reference station's window stands in for the beam trace
    let lo = spoint[0] + offset;
    scratch.best_beam.copy_from_slice(&data[0][lo..lo + nsamp]);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::sink::{MemorySink, NullSink};
    use crate::waveform::Coordinates;
    use std::f64::consts::PI;

    const TONES: [f64; 5] = [2.5, 3.5, 4.5, 5.5, 6.5];

    /// Plane wave with slowness (0.1, 0.0) s/km, integer-sample delays.
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

    fn config(method: BeamMethod) -> BeamConfig {
        BeamConfig {
            grid: SlownessGrid::symmetric(0.2, 0.02),
            win_len: 4.0,
            win_frac: 0.5,
            frqlow: 2.0,
            frqhigh: 8.0,
            stime: 1.0,
            etime: 15.0,
            method,
            nthroot: 4,
            coordinate_system: CoordinateSystem::Xy,
            timestamp: TimestampConvention::EpochSeconds,
            correct_3dplane: false,
            static_3d: false,
            vel_cor: CorrectionVelocity::default(),
        }
    }

    fn assert_recovers(records: &[BeamRecord]) {
        assert_eq!(records.len(), 6);
        for record in records {
            assert!(
                (record.slowness_x - 0.1).abs() < 1e-9,
                "slowness_x {} off the injected 0.1",
                record.slowness_x
            );
            assert!(record.slowness_y.abs() < 1e-9);
            assert!((record.backazimuth_deg - 270.0).abs() < 1.0);
            assert!(record.abs_power > 0.0);
        }
    }

    #[test]
    fn delay_and_sum_recovers_the_injected_wavefront() {
        let records = beamform(
            &plane_wave_traces(),
            &config(BeamMethod::DelayAndSum),
            &mut NullSink,
        )
        .unwrap();
        assert_recovers(&records);
    }

    #[test]
    fn phase_weighted_stack_recovers_the_injected_wavefront() {
        let records = beamform(
            &plane_wave_traces(),
            &config(BeamMethod::PhaseWeightedStack),
            &mut NullSink,
        )
        .unwrap();
        assert_recovers(&records);
    }

    #[test]
    fn whitened_power_recovers_the_injected_wavefront() {
        let records = beamform(
            &plane_wave_traces(),
            &config(BeamMethod::SlownessWhitenedPower),
            &mut NullSink,
        )
        .unwrap();
        assert_recovers(&records);
        // per-frequency normalization caps the score at one
        for record in &records {
            assert!(record.abs_power <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn linear_stack_keeps_the_same_maximum() {
        let mut cfg = config(BeamMethod::DelayAndSum);
        cfg.nthroot = 1;
        let records = beamform(&plane_wave_traces(), &cfg, &mut NullSink).unwrap();
        assert_recovers(&records);
    }

    #[test]
    fn window_smaller_than_one_sample_is_fatal() {
        let mut cfg = config(BeamMethod::DelayAndSum);
        cfg.win_len = 0.0;
        assert!(matches!(
            beamform(&plane_wave_traces(), &cfg, &mut NullSink),
            Err(ArrayError::WindowTooShort)
        ));
    }

    #[test]
    fn zero_nthroot_is_rejected() {
        let mut cfg = config(BeamMethod::DelayAndSum);
        cfg.nthroot = 0;
        assert!(beamform(&plane_wave_traces(), &cfg, &mut NullSink).is_err());
    }

    #[test]
    fn all_zero_windows_score_zero_not_nan() {
        let traces: Vec<Trace> = plane_wave_traces()
            .into_iter()
            .map(|mut tr| {
                tr.data.iter_mut().for_each(|v| *v = 0.0);
                tr
            })
            .collect();
        let records = beamform(&traces, &config(BeamMethod::DelayAndSum), &mut NullSink).unwrap();
        for record in &records {
            assert_eq!(record.abs_power, 0.0);
        }
    }

    #[test]
    fn sink_receives_map_and_best_beam_per_window() {
        let mut sink = MemorySink::default();
        beamform(
            &plane_wave_traces(),
            &config(BeamMethod::DelayAndSum),
            &mut sink,
        )
        .unwrap();
        assert_eq!(sink.power_maps.len(), 6);
        assert_eq!(sink.beams.len(), 6);
        assert_eq!(sink.power_maps[0].dim(), (21, 21));
        assert_eq!(sink.beams[0].len(), 400);
    }

    #[test]
    fn method_tags_parse_into_the_closed_set() {
        assert_eq!("DLS".parse::<BeamMethod>().unwrap(), BeamMethod::DelayAndSum);
        assert_eq!(
            "PWS".parse::<BeamMethod>().unwrap(),
            BeamMethod::PhaseWeightedStack
        );
        assert_eq!(
            "SWP".parse::<BeamMethod>().unwrap(),
            BeamMethod::SlownessWhitenedPower
        );
        assert!(matches!(
            "dls".parse::<BeamMethod>(),
            Err(ArrayError::Method(_))
        ));
    }
}
