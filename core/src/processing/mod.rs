pub mod beam;
pub mod fk;
pub mod scratch;
pub mod sink;
pub mod steering;
pub mod vespagram;
pub mod window;

pub use beam::{beamform, BeamConfig, BeamMethod};
pub use fk::{array_processing, FkConfig, FkMethod};
pub use sink::{AuxData, MemorySink, NullSink, PowerMapSink};
pub use steering::{CorrectionVelocity, SlownessGrid};
pub use vespagram::{vespagram, Vespagram, VespagramConfig};
pub use window::{stream_offsets, StreamOffsets};
