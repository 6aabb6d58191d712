use std::sync::Mutex;

/// Sliding-window bookkeeping for one analysis run.
pub struct WindowCounters {
    inner: Mutex<Counts>,
}

struct Counts {
    processed: usize,
    skipped: usize,
    emitted: usize,
}

impl WindowCounters {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Counts {
                processed: 0,
                skipped: 0,
                emitted: 0,
            }),
        }
    }

    pub fn record_processed(&self) {
        if let Ok(mut counts) = self.inner.lock() {
            counts.processed += 1;
        }
    }

    /// A window whose best power fell below the configured thresholds.
    pub fn record_skipped(&self) {
        if let Ok(mut counts) = self.inner.lock() {
            counts.skipped += 1;
        }
    }

    pub fn record_emitted(&self) {
        if let Ok(mut counts) = self.inner.lock() {
            counts.emitted += 1;
        }
    }

    /// (processed, skipped, emitted)
    pub fn snapshot(&self) -> (usize, usize, usize) {
        if let Ok(counts) = self.inner.lock() {
            (counts.processed, counts.skipped, counts.emitted)
        } else {
            (0, 0, 0)
        }
    }
}

impl Default for WindowCounters {
    fn default() -> Self {
        Self::new()
    }
}
