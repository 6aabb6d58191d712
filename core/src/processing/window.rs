use crate::telemetry::LogManager;
use crate::waveform::Trace;
use crate::{ArrayError, ArrayResult};

/// Per-station sample offsets aligning a requested window onto each trace.
#[derive(Debug, Clone)]
pub struct StreamOffsets {
    /// Samples from each trace start to the requested window start.
    pub start: Vec<usize>,
    /// Samples from each trace end back to the requested window end.
    pub end: Vec<usize>,
}

/// Maps the global window [stime, etime) onto per-station sample offsets.
///
/// Offset zero refers to the same absolute instant for every station, to
/// sub-sample precision. Requests outside the span covered by all stations
/// fail beyond a half-sample tolerance; sub-sample drift of individual
/// start times beyond a quarter of the sample period is logged but not
/// fatal.
pub fn stream_offsets(traces: &[Trace], stime: f64, etime: f64) -> ArrayResult<StreamOffsets> {
    let first = traces
        .first()
        .ok_or_else(|| ArrayError::InvalidInput("no traces provided".into()))?;
    let logger = LogManager::new();
    let delta = first.delta();

    let latest_start = traces
        .iter()
        .map(|tr| tr.start_time)
        .fold(f64::NEG_INFINITY, f64::max);
    let earliest_end = traces
        .iter()
        .map(|tr| tr.end_time())
        .fold(f64::INFINITY, f64::min);

    if latest_start - stime > delta / 2.0 {
        return Err(ArrayError::StartNotCovered);
    }
    if earliest_end - etime < -delta / 2.0 {
        return Err(ArrayError::EndNotCovered);
    }

    let mut start = Vec::with_capacity(traces.len());
    let mut end = Vec::with_capacity(traces.len());
    for tr in traces {
        let delta = tr.delta();
        let offset = ((stime - latest_start) / delta + 1.0).trunc() as i64;
        let diffstart = latest_start - tr.start_time;
        let whole = (diffstart / delta).trunc();
        if diffstart - whole * delta > delta * 0.25 {
            logger.alert("difference in start times exceeds 25% of the sample period");
        }
        let spoint = whole as i64 + offset;
        if spoint < 0 {
            return Err(ArrayError::StartNotCovered);
        }
        start.push(spoint as usize);

        let negoffset = ((earliest_end - etime) / delta + 1.0).trunc() as i64;
        let diffend = tr.end_time() - earliest_end;
        let epoint = (diffend / delta).trunc() as i64 + negoffset;
        end.push(epoint.max(0) as usize);
    }

    Ok(StreamOffsets { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::Coordinates;

    fn trace(start_time: f64, n: usize) -> Trace {
        Trace::new(
            vec![0.0; n],
            start_time,
            100.0,
            Coordinates::new(0.0, 0.0, 0.0),
        )
    }

    #[test]
    fn identical_traces_share_one_offset() {
        let traces = vec![trace(0.0, 2000), trace(0.0, 2000)];
        let offsets = stream_offsets(&traces, 1.0, 15.0).unwrap();
        assert_eq!(offsets.start[0], offsets.start[1]);
        assert_eq!(offsets.start[0], 101);
    }

    #[test]
    fn later_starting_station_gets_a_smaller_offset() {
        // station 1 starts 0.5 s (50 samples) late; offset zero must be
        // the same instant for both
        let traces = vec![trace(0.0, 2000), trace(0.5, 1950)];
        let offsets = stream_offsets(&traces, 1.0, 15.0).unwrap();
        assert_eq!(offsets.start[0] - offsets.start[1], 50);
    }

    #[test]
    fn window_before_common_start_is_fatal() {
        let traces = vec![trace(0.0, 2000), trace(5.0, 2000)];
        assert!(matches!(
            stream_offsets(&traces, 1.0, 15.0),
            Err(ArrayError::StartNotCovered)
        ));
    }

    #[test]
    fn window_past_common_end_is_fatal() {
        let traces = vec![trace(0.0, 2000), trace(0.0, 500)];
        assert!(matches!(
            stream_offsets(&traces, 1.0, 15.0),
            Err(ArrayError::EndNotCovered)
        ));
    }

    #[test]
    fn half_sample_tolerance_is_honored_at_the_edges() {
        let traces = vec![trace(0.0, 2000)];
        // 0.004 s before the start is within half a sample of 0.005 s
        assert!(stream_offsets(&traces, -0.004, 15.0).is_ok());
        assert!(stream_offsets(&traces, -0.006, 15.0).is_err());
    }
}
