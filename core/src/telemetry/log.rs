use log::{info, warn};

/// Thin front over the `log` facade shared by the processing routines.
pub struct LogManager;

impl LogManager {
    pub fn new() -> Self {
        Self
    }

    pub fn record(&self, message: &str) {
        info!("{}", message);
    }

    /// Non-fatal conditions the caller should see; processing continues.
    pub fn alert(&self, message: &str) {
        warn!("{}", message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}
