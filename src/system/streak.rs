use tracing::{debug, info, warn};

use crate::error::ReadError;

/// Rate-limits failure reporting for one metric source: the first failure in
/// a run is a warning, repeats drop to debug, and recovery is announced once.
#[derive(Debug)]
pub struct FailureStreak {
    source: &'static str,
    count: u32,
}

impl FailureStreak {
    pub const fn new(source: &'static str) -> Self {
        Self { source, count: 0 }
    }

    pub fn failed(&mut self, err: &ReadError) {
        self.count = self.count.saturating_add(1);
        if self.count == 1 {
            warn!(source = self.source, error = %err, "metric read failed, using fallback value");
        } else {
            debug!(
                source = self.source,
                error = %err,
                consecutive = self.count,
                "metric read still failing"
            );
        }
    }

    pub fn succeeded(&mut self) {
        if self.count > 0 {
            info!(
                source = self.source,
                failed_reads = self.count,
                "metric read recovered"
            );
            self.count = 0;
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}
