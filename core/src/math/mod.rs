pub mod fft;
pub mod linalg;
pub mod stats;

pub use fft::{analytic_signal, next_pow2, FftHelper, HilbertHelper};
pub use stats::{cosine_taper, demean, detrend_simple};
