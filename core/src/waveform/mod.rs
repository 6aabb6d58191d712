pub mod records;
pub mod trace;

pub use records::{beam_table, fk_table, BeamRecord, FkRecord, TimestampConvention};
pub use trace::{check_sampling_rates, Coordinates, Trace};
