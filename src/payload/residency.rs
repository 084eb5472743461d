//! Counts full-resolution payloads checked out for processing

use std::sync::atomic::{AtomicUsize, Ordering};

/// Live and peak number of outstanding [`PayloadLease`]s
#[derive(Debug, Default)]
pub struct ResidencyGauge {
    live: AtomicUsize,
    peak: AtomicUsize,
}

impl ResidencyGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lease(&self) -> PayloadLease<'_> {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);
        PayloadLease { gauge: self }
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous leases seen
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Held from the moment a payload is checked out until its stage is done
pub struct PayloadLease<'a> {
    gauge: &'a ResidencyGauge,
}

impl Drop for PayloadLease<'_> {
    fn drop(&mut self) {
        self.gauge.live.fetch_sub(1, Ordering::SeqCst);
    }
}
