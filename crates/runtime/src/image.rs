//! Process image
//!
//! Everything a scan reads or mutates: the variable store, both trigger
//! tables and the clock timers measure against. Scan units share one image
//! behind a coroutine-aware mutex and hold it for a whole scan.

use crate::config::EngineConfig;
use crate::triggers::{EdgeTable, TimerTable};
use ladder_core::{Clock, PinIo, VariableStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub type SharedImage = Arc<may::sync::Mutex<ProcessImage>>;

pub struct ProcessImage {
    pub store: VariableStore,
    pub edges: EdgeTable,
    pub timers: TimerTable,
    clock: Arc<dyn Clock>,
    reported: HashMap<&'static str, HashSet<String>>,
}

impl ProcessImage {
    pub fn new(
        store: VariableStore,
        edge_capacity: usize,
        timer_capacity: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        ProcessImage {
            store,
            edges: EdgeTable::new(edge_capacity),
            timers: TimerTable::new(timer_capacity),
            clock,
            reported: HashMap::new(),
        }
    }

    /// Empty image sized from the engine configuration
    pub fn empty(config: &EngineConfig, io: Arc<dyn PinIo>, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            VariableStore::new(io),
            config.edge_capacity,
            config.timer_capacity,
            clock,
        )
    }

    /// Replace the store and start over with empty trigger tables
    pub fn reset(&mut self, store: VariableStore) {
        self.store = store;
        self.edges = EdgeTable::new(self.edges.capacity());
        self.timers = TimerTable::new(self.timers.capacity());
        self.reported.clear();
    }

    pub fn now_micros(&self) -> i64 {
        self.clock.now_micros()
    }

    /// True the first time `subject` is passed under `category` since the
    /// last reset. Keeps per-scan warnings from repeating every cycle; only
    /// the first report allocates.
    pub fn first_report(&mut self, category: &'static str, subject: &str) -> bool {
        let seen = self.reported.entry(category).or_default();
        if seen.contains(subject) {
            return false;
        }
        seen.insert(subject.to_string())
    }
}

/// Lock the image, recovering it if a scan panicked while holding it
pub fn lock(image: &SharedImage) -> may::sync::MutexGuard<'_, ProcessImage> {
    image.lock().unwrap_or_else(|e| e.into_inner())
}

pub fn share(image: ProcessImage) -> SharedImage {
    Arc::new(may::sync::Mutex::new(image))
}
