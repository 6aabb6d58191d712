//! Array-processing core for the Rust seismic beamforming platform.
//!
//! The modules mirror the classic array-analysis toolchain — geometry
//! normalization, steering tables, frequency- and time-domain beamformers,
//! array response, rotation/strain inversion — while providing safe
//! abstractions, scoped buffers, and well-defined processing errors.
//!
//! Coordinate conventions: right handed, x positive to east, y positive to
//! north, z positive up. Distances are kilometers, slowness is s/km.

pub mod geometry;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod response;
pub mod rotation;
pub mod telemetry;
pub mod waveform;

/// Common error type for analysis runs.
#[derive(thiserror::Error, Debug)]
pub enum ArrayError {
    #[error("sampling rates of traces in stream are not equal")]
    SamplingRateMismatch,
    #[error("coordinate system must be one of 'lonlat', 'xy', got '{0}'")]
    CoordinateSystem(String),
    #[error("unknown analysis method '{0}'")]
    Method(String),
    #[error("timestamp convention must be one of 'julsec', 'mlabday', got '{0}'")]
    Timestamp(String),
    #[error("specified start time precedes the common data window")]
    StartNotCovered,
    #[error("specified end time exceeds the common data window")]
    EndNotCovered,
    #[error("frequency band [{low}, {high}] selects no usable bins")]
    EmptyBand { low: f64, high: f64 },
    #[error("data window too small for the slowness grid")]
    WindowTooShort,
    #[error("numerical degeneracy: {0}")]
    Numerical(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result alias shared by every analysis entry point.
pub type ArrayResult<T> = Result<T, ArrayError>;
