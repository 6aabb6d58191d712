use serde::{Deserialize, Serialize};

use crate::{ArrayError, ArrayResult};

/// Station position attached to a trace.
///
/// Read according to the coordinate system of the analysis call: either
/// (longitude, latitude) in degrees or local (x, y) in kilometers, with the
/// elevation always in kilometers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x_or_lon: f64,
    pub y_or_lat: f64,
    pub elevation_km: f64,
}

impl Coordinates {
    pub fn new(x_or_lon: f64, y_or_lat: f64, elevation_km: f64) -> Self {
        Self {
            x_or_lon,
            y_or_lat,
            elevation_km,
        }
    }
}

/// Single-station waveform with its sampling metadata and position.
///
/// The order of traces handed to an analysis call fixes the station order
/// of the derived geometry and of every table built from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub data: Vec<f64>,
    /// Time of the first sample, seconds since epoch.
    pub start_time: f64,
    /// Samples per second.
    pub sampling_rate: f64,
    pub coordinates: Coordinates,
}

impl Trace {
    pub fn new(data: Vec<f64>, start_time: f64, sampling_rate: f64, coordinates: Coordinates) -> Self {
        Self {
            data,
            start_time,
            sampling_rate,
            coordinates,
        }
    }

    /// Sample spacing in seconds.
    pub fn delta(&self) -> f64 {
        1.0 / self.sampling_rate
    }

    /// Time of the last sample.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.data.len().saturating_sub(1) as f64 * self.delta()
    }
}

/// Checks the shared-sampling-rate invariant and returns the common rate.
pub fn check_sampling_rates(traces: &[Trace]) -> ArrayResult<f64> {
    let first = traces
        .first()
        .ok_or_else(|| ArrayError::InvalidInput("no traces provided".into()))?;
    if traces
        .iter()
        .any(|tr| tr.sampling_rate != first.sampling_rate)
    {
        return Err(ArrayError::SamplingRateMismatch);
    }
    Ok(first.sampling_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(fs: f64) -> Trace {
        Trace::new(vec![0.0; 100], 10.0, fs, Coordinates::new(0.0, 0.0, 0.0))
    }

    #[test]
    fn end_time_counts_last_sample() {
        let tr = trace(100.0);
        assert!((tr.end_time() - (10.0 + 99.0 / 100.0)).abs() < 1e-12);
    }

    #[test]
    fn mismatched_rates_are_rejected_before_any_computation() {
        let traces = vec![trace(100.0), trace(50.0)];
        assert!(matches!(
            check_sampling_rates(&traces),
            Err(ArrayError::SamplingRateMismatch)
        ));
    }

    #[test]
    fn equal_rates_pass() {
        let traces = vec![trace(100.0), trace(100.0)];
        assert_eq!(check_sampling_rates(&traces).unwrap(), 100.0);
    }
}
