//! Edge-detection and timer-state tables
//!
//! Both tables are keyed by variable name and have a fixed number of slots,
//! allocated on first use and never released until the next configuration.
//! They are shared by every wire: two elements naming the same variable use
//! the same slot.
//!
//! When a table is full, lookups for new keys fail. The failure is logged the
//! first time for each key and counted every time.

use std::collections::HashSet;
use tracing::error;

#[derive(Debug)]
struct EdgeSlot {
    key: String,
    previous: bool,
}

#[derive(Debug)]
pub struct EdgeTable {
    slots: Vec<EdgeSlot>,
    capacity: usize,
    refused: HashSet<String>,
    overflows: u64,
}

impl EdgeTable {
    pub fn new(capacity: usize) -> Self {
        EdgeTable {
            slots: Vec::with_capacity(capacity),
            capacity,
            refused: HashSet::new(),
            overflows: 0,
        }
    }

    fn slot(&mut self, key: &str) -> Option<&mut bool> {
        if let Some(i) = self.slots.iter().position(|s| s.key == key) {
            return Some(&mut self.slots[i].previous);
        }
        if self.slots.len() < self.capacity {
            self.slots.push(EdgeSlot {
                key: key.to_string(),
                previous: false,
            });
            return self.slots.last_mut().map(|s| &mut s.previous);
        }
        self.overflows += 1;
        if self.refused.insert(key.to_string()) {
            error!(key, capacity = self.capacity, "edge table full");
        }
        None
    }

    /// `cond && !previous`, then remember `cond`
    pub fn rising(&mut self, key: &str, cond: bool) -> bool {
        match self.slot(key) {
            Some(previous) => {
                let edge = cond && !*previous;
                *previous = cond;
                edge
            }
            None => false,
        }
    }

    /// `!cond && previous`, then remember `cond`
    pub fn falling(&mut self, key: &str, cond: bool) -> bool {
        match self.slot(key) {
            Some(previous) => {
                let edge = !cond && *previous;
                *previous = cond;
                edge
            }
            None => false,
        }
    }

    pub fn previous(&self, key: &str) -> Option<bool> {
        self.slots.iter().find(|s| s.key == key).map(|s| s.previous)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lookups refused because the table was full
    pub fn overflows(&self) -> u64 {
        self.overflows
    }
}

/// Running state of one timer variable
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimerSlot {
    /// Clock reading when the current timing run started, µs
    pub start_micros: i64,
    pub running: bool,
}

#[derive(Debug)]
pub struct TimerTable {
    slots: Vec<(String, TimerSlot)>,
    capacity: usize,
    refused: HashSet<String>,
    overflows: u64,
}

impl TimerTable {
    pub fn new(capacity: usize) -> Self {
        TimerTable {
            slots: Vec::with_capacity(capacity),
            capacity,
            refused: HashSet::new(),
            overflows: 0,
        }
    }

    /// Find or allocate the slot for `key`
    pub fn slot(&mut self, key: &str) -> Option<&mut TimerSlot> {
        if let Some(i) = self.slots.iter().position(|(k, _)| k == key) {
            return Some(&mut self.slots[i].1);
        }
        if self.slots.len() < self.capacity {
            self.slots.push((key.to_string(), TimerSlot::default()));
            return self.slots.last_mut().map(|(_, s)| s);
        }
        self.overflows += 1;
        if self.refused.insert(key.to_string()) {
            error!(key, capacity = self.capacity, "timer table full");
        }
        None
    }

    pub fn get(&self, key: &str) -> Option<&TimerSlot> {
        self.slots.iter().find(|(k, _)| k == key).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn overflows(&self) -> u64 {
        self.overflows
    }
}
