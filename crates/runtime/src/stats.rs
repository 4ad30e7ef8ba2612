//! Engine statistics
//!
//! Lifecycle counters updated by scan units and the reconfiguration path.
//! All counters are atomics so diagnostics can read them without taking the
//! process image lock.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct EngineStats {
    /// Scan and sensor units currently running
    pub active_units: AtomicUsize,
    /// High-water mark of `active_units`
    pub peak_units: AtomicUsize,
    pub total_spawned: AtomicU64,
    pub spawn_failures: AtomicU64,
    pub total_scans: AtomicU64,
    /// Scans that panicked and were skipped
    pub scan_panics: AtomicU64,
    pub reconfigurations: AtomicU64,
    pub rejected_configurations: AtomicU64,
}

impl EngineStats {
    pub fn unit_started(&self) {
        let now = self.active_units.fetch_add(1, Ordering::AcqRel) + 1;
        self.total_spawned.fetch_add(1, Ordering::Relaxed);
        self.peak_units.fetch_max(now, Ordering::AcqRel);
    }

    pub fn unit_finished(&self) {
        self.active_units.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            active_units: self.active_units.load(Ordering::Acquire),
            peak_units: self.peak_units.load(Ordering::Acquire),
            total_spawned: self.total_spawned.load(Ordering::Relaxed),
            spawn_failures: self.spawn_failures.load(Ordering::Relaxed),
            total_scans: self.total_scans.load(Ordering::Relaxed),
            scan_panics: self.scan_panics.load(Ordering::Relaxed),
            reconfigurations: self.reconfigurations.load(Ordering::Relaxed),
            rejected_configurations: self.rejected_configurations.load(Ordering::Relaxed),
            edge_overflows: 0,
            timer_overflows: 0,
        }
    }
}

/// Point-in-time copy of the counters, plus trigger-table overflows for the
/// current configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub active_units: usize,
    pub peak_units: usize,
    pub total_spawned: u64,
    pub spawn_failures: u64,
    pub total_scans: u64,
    pub scan_panics: u64,
    pub reconfigurations: u64,
    pub rejected_configurations: u64,
    pub edge_overflows: u64,
    pub timer_overflows: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_accounting() {
        let stats = EngineStats::default();
        stats.unit_started();
        stats.unit_started();
        stats.unit_finished();
        let snap = stats.snapshot();
        assert_eq!(snap.active_units, 1);
        assert_eq!(snap.peak_units, 2);
        assert_eq!(snap.total_spawned, 2);
    }
}
