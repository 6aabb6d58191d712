use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::ArrayError;

/// Days between year 1 and the epoch, for the legacy plotting convention.
const MLABDAY_OFFSET: f64 = 719_162.0;

/// How result timestamps are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampConvention {
    /// Seconds since 1970-01-01T00:00:00.
    EpochSeconds,
    /// Decimal days since 0001-01-01T00:00:00, as used by date plotting.
    MatplotlibDays,
}

impl TimestampConvention {
    /// Converts an epoch-seconds timestamp into this convention.
    pub fn apply(self, t: f64) -> f64 {
        match self {
            TimestampConvention::EpochSeconds => t,
            TimestampConvention::MatplotlibDays => t / 86_400.0 + MLABDAY_OFFSET,
        }
    }
}

impl FromStr for TimestampConvention {
    type Err = ArrayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "julsec" => Ok(TimestampConvention::EpochSeconds),
            "mlabday" => Ok(TimestampConvention::MatplotlibDays),
            other => Err(ArrayError::Timestamp(other.to_string())),
        }
    }
}

/// One sliding-window result of the frequency-domain beamformer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FkRecord {
    pub timestamp: f64,
    /// Normalized beam power in [0, 1] for the conventional method.
    pub rel_power: f64,
    pub abs_power: f64,
    /// Direction back toward the source, degrees clockwise from north,
    /// in [0, 360).
    pub backazimuth_deg: f64,
    pub slowness_s_km: f64,
}

impl FkRecord {
    pub fn as_row(&self) -> [f64; 5] {
        [
            self.timestamp,
            self.rel_power,
            self.abs_power,
            self.backazimuth_deg,
            self.slowness_s_km,
        ]
    }
}

/// One sliding-window result of the time-domain beamformer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BeamRecord {
    pub timestamp: f64,
    pub abs_power: f64,
    /// Direction back toward the source, degrees clockwise from north,
    /// in [0, 360).
    pub backazimuth_deg: f64,
    pub slowness_x: f64,
    pub slowness_y: f64,
    pub slowness_s_km: f64,
}

impl BeamRecord {
    pub fn as_row(&self) -> [f64; 6] {
        [
            self.timestamp,
            self.abs_power,
            self.backazimuth_deg,
            self.slowness_x,
            self.slowness_y,
            self.slowness_s_km,
        ]
    }
}

/// Dense numeric table of FK records, one row per processed window.
pub fn fk_table(records: &[FkRecord]) -> Array2<f64> {
    let mut table = Array2::zeros((records.len(), 5));
    for (i, record) in records.iter().enumerate() {
        for (j, value) in record.as_row().into_iter().enumerate() {
            table[[i, j]] = value;
        }
    }
    table
}

/// Dense numeric table of time-domain records, one row per window.
pub fn beam_table(records: &[BeamRecord]) -> Array2<f64> {
    let mut table = Array2::zeros((records.len(), 6));
    for (i, record) in records.iter().enumerate() {
        for (j, value) in record.as_row().into_iter().enumerate() {
            table[[i, j]] = value;
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_numbering_applies_fixed_offset() {
        let days = TimestampConvention::MatplotlibDays;
        assert_eq!(days.apply(0.0), 719_162.0);
        assert_eq!(days.apply(86_400.0), 719_163.0);
        assert_eq!(TimestampConvention::EpochSeconds.apply(86_400.0), 86_400.0);
    }

    #[test]
    fn unknown_convention_tag_is_rejected() {
        assert!(matches!(
            "mlabhour".parse::<TimestampConvention>(),
            Err(ArrayError::Timestamp(_))
        ));
        assert_eq!(
            "julsec".parse::<TimestampConvention>().unwrap(),
            TimestampConvention::EpochSeconds
        );
    }

    #[test]
    fn tables_keep_record_order() {
        let records = vec![
            FkRecord {
                timestamp: 1.0,
                rel_power: 0.9,
                abs_power: 4.0,
                backazimuth_deg: 270.0,
                slowness_s_km: 0.1,
            },
            FkRecord {
                timestamp: 2.0,
                rel_power: 0.8,
                abs_power: 3.0,
                backazimuth_deg: 90.0,
                slowness_s_km: 0.2,
            },
        ];
        let table = fk_table(&records);
        assert_eq!(table.dim(), (2, 5));
        assert_eq!(table[[0, 3]], 270.0);
        assert_eq!(table[[1, 4]], 0.2);
    }

    #[test]
    fn records_serialize_round_trip() {
        let record = BeamRecord {
            timestamp: 3.0,
            abs_power: 1.5,
            backazimuth_deg: 45.0,
            slowness_x: 0.1,
            slowness_y: 0.1,
            slowness_s_km: 0.14142,
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: BeamRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_row(), record.as_row());
    }
}
