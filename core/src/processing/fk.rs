use std::str::FromStr;

use nalgebra::DMatrix;
use ndarray::{Array2, Array3, Array4};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::geometry::{geometry_from_traces, CoordinateSystem};
use crate::math::{cosine_taper, demean, linalg, next_pow2, FftHelper};
use crate::processing::scratch::WindowScratch;
use crate::processing::sink::{AuxData, PowerMapSink};
use crate::processing::steering::{
    steering_table, timeshift_table, CorrectionVelocity, SlownessGrid,
};
use crate::processing::window::stream_offsets;
use crate::telemetry::{LogManager, WindowCounters};
use crate::waveform::{check_sampling_rates, FkRecord, TimestampConvention, Trace};
use crate::{ArrayError, ArrayResult};

/// Fraction of the window tapered before the transform.
const TAPER_FRACTION: f64 = 0.22;

/// Relative tolerance of the Capon covariance pseudo-inverse.
const PINV_RCOND: f64 = 1e-6;

/// Frequency-domain beamforming flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FkMethod {
    /// Conventional frequency-wavenumber power.
    Conventional,
    /// Adaptive beamformer; sharper peaks at the cost of a covariance
    /// inversion per frequency bin.
    Capon,
}

impl FromStr for FkMethod {
    type Err = ArrayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FK" => Ok(FkMethod::Conventional),
            "CAPON" => Ok(FkMethod::Capon),
            other => Err(ArrayError::Method(other.to_string())),
        }
    }
}

/// Configuration of one frequency-domain analysis call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FkConfig {
    pub grid: SlownessGrid,
    /// Sliding window length in seconds; negative means one whole-trace
    /// window.
    pub win_len: f64,
    /// Fraction of the window used as forward step.
    pub win_frac: f64,
    pub frqlow: f64,
    pub frqhigh: f64,
    /// Relative-power threshold below which a window is silently skipped.
    pub semb_thres: f64,
    /// Apparent-velocity threshold below which a window is silently
    /// skipped.
    pub vel_thres: f64,
    /// Analysis start, epoch seconds.
    pub stime: f64,
    /// Analysis end, epoch seconds.
    pub etime: f64,
    pub method: FkMethod,
    pub coordinate_system: CoordinateSystem,
    pub timestamp: TimestampConvention,
    pub correct_3dplane: bool,
    pub static_3d: bool,
    pub vel_cor: CorrectionVelocity,
}

pub(crate) struct BandBins {
    pub nlow: usize,
    pub nf: usize,
    pub deltaf: f64,
    pub nfft: usize,
}

/// Maps the requested band onto usable transform bins, excluding the
/// offset bin and the Nyquist bin.
pub(crate) fn band_bins(nsamp: usize, fs: f64, frqlow: f64, frqhigh: f64) -> ArrayResult<BandBins> {
    let nfft = next_pow2(nsamp);
    let deltaf = fs / nfft as f64;
    let nlow = ((frqlow / deltaf + 0.5) as usize).max(1);
    let nhigh = ((frqhigh / deltaf + 0.5) as usize).min((nfft / 2).saturating_sub(1));
    if nhigh < nlow {
        return Err(ArrayError::EmptyBand {
            low: frqlow,
            high: frqhigh,
        });
    }
    Ok(BandBins {
        nlow,
        nf: nhigh - nlow + 1,
        deltaf,
        nfft,
    })
}

/// Slowness modulus (floored at 1e-8) and backazimuth in [0, 360).
pub(crate) fn slowness_azimuth(slow_x: f64, slow_y: f64) -> (f64, f64) {
    let mut slow = slow_x.hypot(slow_y);
    if slow < 1e-8 {
        slow = 1e-8;
    }
    let azimut = slow_x.atan2(slow_y).to_degrees();
    let baz = (azimut + 180.0).rem_euclid(360.0);
    (slow, baz)
}

pub(crate) fn argmax(map: &Array2<f64>) -> (usize, usize) {
    let mut best = (0, 0);
    let mut largest = f64::NEG_INFINITY;
    for ((x, y), &value) in map.indexed_iter() {
        if value > largest {
            largest = value;
            best = (x, y);
        }
    }
    best
}

/// Runs the sliding-window frequency-domain beamformer over the stream.
///
/// Windows advance by `floor(nsamp * win_frac)` samples until the next
/// window would pass `etime`; each one yields at most one record, gated by
/// the power and velocity thresholds.
pub fn array_processing(
    traces: &[Trace],
    cfg: &FkConfig,
    sink: &mut dyn PowerMapSink,
) -> ArrayResult<Vec<FkRecord>> {
    let fs = check_sampling_rates(traces)?;
    let nstat = traces.len();
    let logger = LogManager::new();
    let counters = WindowCounters::new();

    let geometry = geometry_from_traces(traces, cfg.coordinate_system, cfg.correct_3dplane)?;
    let (nx, ny) = (cfg.grid.nx(), cfg.grid.ny());
    let timeshifts = timeshift_table(&geometry, &cfg.grid, &cfg.vel_cor, cfg.static_3d)?;
    let offsets = stream_offsets(traces, cfg.stime, cfg.etime)?;

    let (nsamp, nstep) = if cfg.win_len < 0.0 {
        (((cfg.etime - cfg.stime) * fs) as i64, 1i64)
    } else {
        let nsamp = (cfg.win_len * fs) as i64;
        (nsamp, (nsamp as f64 * cfg.win_frac) as i64)
    };
    if nsamp <= 0 {
        return Err(ArrayError::WindowTooShort);
    }
    let nsamp = nsamp as usize;
    let nstep = nstep.max(1) as usize;

    let bins = band_bins(nsamp, fs, cfg.frqlow, cfg.frqhigh)?;
    let steer = steering_table(&timeshifts, bins.nlow, bins.nf, bins.deltaf);
    let taper = cosine_taper(nsamp, TAPER_FRACTION);
    let mut fft = FftHelper::new(bins.nfft);

    let mut ft = Array2::<Complex64>::zeros((nstat, bins.nf));
    let mut covariance = Array3::<Complex64>::zeros((bins.nf, nstat, nstat));
    let mut scratch = WindowScratch::new(nx, ny, nsamp);
    let mut window = vec![0.0f64; nsamp];

    let mut records = Vec::new();
    let mut offset = 0usize;
    let mut newstart = cfg.stime;
    let mut count = 0usize;

    'windows: loop {
        for (i, tr) in traces.iter().enumerate() {
            let lo = offsets.start[i] + offset;
            let hi = lo + nsamp;
            if hi > tr.data.len() {
                break 'windows;
            }
            window.copy_from_slice(&tr.data[lo..hi]);
            demean(&mut window);
            for (w, t) in window.iter_mut().zip(taper.iter()) {
                *w *= t;
            }
            for (f, value) in fft
                .band_spectrum(&window, bins.nlow, bins.nf)
                .into_iter()
                .enumerate()
            {
                ft[[i, f]] = value;
            }
        }
        counters.record_processed();
        scratch.reset();

        // cross-spectral covariance; Hermitian symmetry fills the lower
        // triangle
        let mut dpow = 0.0;
        for i in 0..nstat {
            for j in i..nstat {
                for f in 0..bins.nf {
                    covariance[[f, i, j]] = ft[[i, f]] * ft[[j, f]].conj();
                }
                if cfg.method == FkMethod::Capon {
                    let total: Complex64 = (0..bins.nf).map(|f| covariance[[f, i, j]]).sum();
                    let norm = total.norm();
                    if norm > 0.0 {
                        for f in 0..bins.nf {
                            covariance[[f, i, j]] /= norm;
                        }
                    }
                }
                if i == j {
                    let total: Complex64 = (0..bins.nf).map(|f| covariance[[f, i, i]]).sum();
                    dpow += total.norm();
                } else {
                    for f in 0..bins.nf {
                        covariance[[f, j, i]] = covariance[[f, i, j]].conj();
                    }
                }
            }
        }
        dpow *= nstat as f64;

        if cfg.method == FkMethod::Capon {
            for f in 0..bins.nf {
                let matrix = DMatrix::from_fn(nstat, nstat, |i, j| covariance[[f, i, j]]);
                let inverse = linalg::pseudo_inverse(&matrix, PINV_RCOND).ok_or_else(|| {
                    ArrayError::Numerical("covariance pseudo-inverse failed".into())
                })?;
                for i in 0..nstat {
                    for j in 0..nstat {
                        covariance[[f, i, j]] = inverse[(i, j)];
                    }
                }
            }
        }

        beam_kernel(&steer, &covariance, cfg.method, dpow, &mut scratch)?;

        let (ix, iy) = argmax(&scratch.relpow_map);
        let relpow = scratch.relpow_map[[ix, iy]];
        let abspow = scratch.abspow_map[[ix, iy]];
        sink.emit(&scratch.relpow_map, AuxData::Map(&scratch.abspow_map), count)?;
        count += 1;

        let (slow_x, slow_y) = cfg.grid.slowness_at(ix, iy);
        let (slow, baz) = slowness_azimuth(slow_x, slow_y);
        if relpow > cfg.semb_thres && 1.0 / slow > cfg.vel_thres {
            records.push(FkRecord {
                timestamp: cfg.timestamp.apply(newstart),
                rel_power: relpow,
                abs_power: abspow,
                backazimuth_deg: baz,
                slowness_s_km: slow,
            });
            counters.record_emitted();
        } else {
            counters.record_skipped();
        }

        if newstart + (nsamp + nstep) as f64 / fs > cfg.etime {
            break;
        }
        offset += nstep;
        newstart += nstep as f64 / fs;
    }

    let (processed, skipped, emitted) = counters.snapshot();
    logger.record(&format!(
        "fk analysis: {processed} windows, {emitted} emitted, {skipped} below thresholds"
    ));
    Ok(records)
}

/// Scores every grid node against the per-frequency covariance matrices.
///
/// A non-finite accumulation reports the numerical-degeneracy error
/// instead of poisoning the maps.
fn beam_kernel(
    steer: &Array4<Complex64>,
    covariance: &Array3<Complex64>,
    method: FkMethod,
    dpow: f64,
    scratch: &mut WindowScratch,
) -> ArrayResult<()> {
    let (nf, nx, ny, nstat) = steer.dim();
    let norm = if method == FkMethod::Capon { 1.0 } else { dpow };
    for x in 0..nx {
        for y in 0..ny {
            let mut relpow = 0.0;
            let mut abspow = 0.0;
            for n in 0..nf {
                let mut ehre = Complex64::default();
                for i in 0..nstat {
                    let mut row = Complex64::default();
                    for j in 0..nstat {
                        row += covariance[[n, i, j]] * steer[[n, x, y, j]];
                    }
                    ehre += steer[[n, x, y, i]].conj() * row;
                }
                let mut power = ehre.norm();
                if method == FkMethod::Capon {
                    power = 1.0 / power;
                }
                relpow += power;
                abspow += power;
            }
            relpow /= norm;
            if !relpow.is_finite() {
                return Err(ArrayError::Numerical(format!(
                    "non-finite beam power at grid node ({x}, {y})"
                )));
            }
            scratch.relpow_map[[x, y]] = relpow;
            scratch.abspow_map[[x, y]] = abspow;
        }
    }
    Ok(())
}
