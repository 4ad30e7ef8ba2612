//! Scan scheduler
//!
//! One May coroutine per wire, each looping: lock the process image, run one
//! scan, release, sleep for the scan interval. When the store holds OneWire or
//! ADC variables an extra `sensors` unit refreshes their cached values.
//!
//! Units share a stop flag per batch. `stop_all` raises it and joins every
//! unit, so when it returns no unit can touch the image again. A panic inside
//! a scan is caught, counted and logged; the unit carries on with the next
//! cycle.

use crate::config::EngineConfig;
use crate::error::{SchedulerError, format_panic_payload};
use crate::image::{SharedImage, lock};
use crate::program::Wire;
use crate::scan::scan_wire;
use crate::stats::EngineStats;
use may::coroutine::{self, JoinHandle};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info};

/// Fixed allowance on top of the per-unit estimate
pub const MEMORY_RESERVE: usize = 1024;

/// Longest uninterrupted sleep; bounds how long `stop_all` waits on a unit
const PAUSE_SLICE: Duration = Duration::from_millis(10);

struct Unit {
    name: String,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    scan_interval: Duration,
    spawn_stagger: Duration,
    sensor_interval: Duration,
    stack_size: usize,
    memory_budget: Option<usize>,
    stats: Arc<EngineStats>,
    stop: Arc<AtomicBool>,
    units: Vec<Unit>,
}

/// Free RAM reported by the kernel, the budget when none is configured
#[cfg(target_os = "linux")]
pub fn host_free_memory() -> Option<usize> {
    // SAFETY: sysinfo only writes into the zeroed struct we pass
    let info = unsafe {
        let mut info: libc::sysinfo = std::mem::zeroed();
        if libc::sysinfo(&mut info) != 0 {
            return None;
        }
        info
    };
    let free = u64::from(info.freeram).saturating_mul(u64::from(info.mem_unit));
    Some(usize::try_from(free).unwrap_or(usize::MAX))
}

#[cfg(not(target_os = "linux"))]
pub fn host_free_memory() -> Option<usize> {
    None
}

/// Memory needed to start `units` scan units
pub fn required_memory(units: usize, stack_size: usize) -> usize {
    units
        .saturating_mul(stack_size.saturating_add(std::mem::size_of::<Unit>()))
        .saturating_add(MEMORY_RESERVE)
}

impl Scheduler {
    pub fn new(config: &EngineConfig, stats: Arc<EngineStats>) -> Self {
        Scheduler {
            scan_interval: config.scan_interval,
            spawn_stagger: config.spawn_stagger,
            sensor_interval: config.sensor_interval,
            stack_size: config.stack_size,
            memory_budget: config.memory_budget,
            stats,
            stop: Arc::new(AtomicBool::new(false)),
            units: Vec::new(),
        }
    }

    /// Start one unit per wire, plus a sensor unit when `sensors` is set.
    ///
    /// Fails without starting anything when the batch does not fit the memory
    /// budget. A unit that fails to spawn is logged and skipped. Returns the
    /// number of wire units started.
    pub fn start(
        &mut self,
        image: &SharedImage,
        wires: Vec<Wire>,
        sensors: bool,
    ) -> Result<usize, SchedulerError> {
        if !self.units.is_empty() {
            self.stop_all();
        }

        let count = wires.len() + usize::from(sensors);
        if let Some(budget) = self.memory_budget.or_else(host_free_memory) {
            let required = required_memory(count, self.stack_size);
            if required > budget {
                error!(units = count, required, budget, "insufficient memory for scan units");
                return Err(SchedulerError::InsufficientMemory {
                    units: count,
                    required,
                    budget,
                });
            }
        }

        self.stop = Arc::new(AtomicBool::new(false));
        let mut started = 0;
        for (n, wire) in wires.into_iter().enumerate() {
            if n > 0 && !self.spawn_stagger.is_zero() {
                coroutine::sleep(self.spawn_stagger);
            }
            let name = wire.name();
            let body = wire_unit(
                wire,
                Arc::clone(image),
                Arc::clone(&self.stop),
                Arc::clone(&self.stats),
                self.scan_interval,
            );
            if self.spawn(name, body) {
                started += 1;
            }
        }

        if sensors {
            let body = sensor_unit(
                Arc::clone(image),
                Arc::clone(&self.stop),
                Arc::clone(&self.stats),
                self.sensor_interval,
            );
            self.spawn("sensors".to_string(), body);
        }

        info!(wires = started, sensors, "scan units started");
        Ok(started)
    }

    fn spawn<F>(&mut self, name: String, body: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.stats.unit_started();
        let builder = coroutine::Builder::new()
            .name(name.clone())
            .stack_size(self.stack_size);
        // SAFETY: the body owns everything it uses and only shares state
        // through Arc'd atomics and the coroutine-aware image mutex.
        match unsafe { builder.spawn(body) } {
            Ok(handle) => {
                debug!(unit = name.as_str(), "unit spawned");
                self.units.push(Unit { name, handle });
                true
            }
            Err(e) => {
                self.stats.unit_finished();
                self.stats.spawn_failures.fetch_add(1, Ordering::Relaxed);
                error!(unit = name.as_str(), error = %e, "failed to spawn unit");
                false
            }
        }
    }

    /// Signal every unit and wait for all of them to finish
    pub fn stop_all(&mut self) {
        if self.units.is_empty() {
            return;
        }
        self.stop.store(true, Ordering::Release);
        let count = self.units.len();
        for unit in self.units.drain(..) {
            if let Err(payload) = unit.handle.join() {
                error!(
                    unit = unit.name.as_str(),
                    "unit ended with a panic: {}",
                    format_panic_payload(&payload)
                );
            }
        }
        info!(units = count, "scan units stopped");
    }

    /// Running units, wire and sensor
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn unit_names(&self) -> Vec<String> {
        self.units.iter().map(|u| u.name.clone()).collect()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn wire_unit(
    wire: Wire,
    image: SharedImage,
    stop: Arc<AtomicBool>,
    stats: Arc<EngineStats>,
    interval: Duration,
) -> impl FnOnce() + Send + 'static {
    move || {
        while !stop.load(Ordering::Acquire) {
            let result = catch_unwind(AssertUnwindSafe(|| {
                let mut image = lock(&image);
                scan_wire(&mut image, &wire);
            }));
            stats.total_scans.fetch_add(1, Ordering::Relaxed);
            if let Err(payload) = result {
                stats.scan_panics.fetch_add(1, Ordering::Relaxed);
                error!(
                    wire = wire.index,
                    "scan panicked: {}",
                    format_panic_payload(&payload)
                );
            }
            pause(&stop, interval);
        }
        stats.unit_finished();
    }
}

fn sensor_unit(
    image: SharedImage,
    stop: Arc<AtomicBool>,
    stats: Arc<EngineStats>,
    interval: Duration,
) -> impl FnOnce() + Send + 'static {
    move || {
        while !stop.load(Ordering::Acquire) {
            let result = catch_unwind(AssertUnwindSafe(|| {
                lock(&image).store.refresh_sensors();
            }));
            if let Err(payload) = result {
                error!("sensor refresh panicked: {}", format_panic_payload(&payload));
            }
            pause(&stop, interval);
        }
        stats.unit_finished();
    }
}

/// Sleep for `total`, returning early once `stop` is raised
fn pause(stop: &AtomicBool, total: Duration) {
    let mut remaining = total;
    while !remaining.is_zero() && !stop.load(Ordering::Acquire) {
        let step = remaining.min(PAUSE_SLICE);
        coroutine::sleep(step);
        remaining -= step;
    }
}
