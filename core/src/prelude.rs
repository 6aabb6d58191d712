//! Convenience re-exports of the crate's primary types and entry points.

pub use crate::geometry::{
    aperture, array_geometry, geometry_from_traces, great_circle_km, CoordinateSystem, KM_PER_DEG,
};
pub use crate::processing::beam::{beamform, BeamConfig, BeamMethod};
pub use crate::processing::fk::{array_processing, FkConfig, FkMethod};
pub use crate::processing::sink::{AuxData, MemorySink, NullSink, PowerMapSink};
pub use crate::processing::steering::{
    steering_table, timeshift_table, timeshift_table_baz, CorrectionVelocity, SlownessGrid,
};
pub use crate::processing::vespagram::{vespagram, Vespagram, VespagramConfig};
pub use crate::processing::window::{stream_offsets, StreamOffsets};
pub use crate::response::{transfer_freqslowness, transfer_wavenumber, TransferLimits};
pub use crate::rotation::{rotation_strain, NoiseStd, RotationStrain};
pub use crate::waveform::{
    beam_table, check_sampling_rates, fk_table, BeamRecord, Coordinates, FkRecord,
    TimestampConvention, Trace,
};
pub use crate::{ArrayError, ArrayResult};
