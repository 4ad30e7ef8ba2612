//! The engine
//!
//! Owns the process image, the scan scheduler, the staging buffer and the
//! optional configuration store, and runs the reconfiguration pipeline:
//!
//! 1. chunks accumulate until the buffer parses as JSON
//! 2. the raw document is persisted (unless it came from the store)
//! 3. every scan unit is stopped and joined
//! 4. the image is cleared, `Device` is forwarded to the I/O layer
//! 5. `Variables` and `Wires` are rebuilt and one unit per wire is started
//!
//! A failure in step 5 leaves the engine with an empty store and no running
//! units until the next successful configuration.

use crate::config::EngineConfig;
use crate::configure::{ConfigureOutcome, ConfigureSummary, Staged, StagingBuffer};
use crate::error::ConfigureError;
use crate::image::{self, ProcessImage, SharedImage};
use crate::persist::ConfigStore;
use crate::program::Program;
use crate::scheduler::Scheduler;
use crate::stats::{EngineStats, StatsSnapshot};
use ladder_core::{Clock, LoadError, MonotonicClock, NullIo, PinIo, VariableStore};
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Default)]
pub struct EngineBuilder {
    io: Option<Arc<dyn PinIo>>,
    clock: Option<Arc<dyn Clock>>,
    config: Option<EngineConfig>,
    config_store: Option<Arc<dyn ConfigStore>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn io(mut self, io: Arc<dyn PinIo>) -> Self {
        self.io = Some(io);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn config_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.config_store = Some(store);
        self
    }

    /// Build an idle engine. Missing parts default to `NullIo`, the
    /// monotonic clock and `EngineConfig::from_env()`.
    pub fn build(self) -> Engine {
        let config = self.config.unwrap_or_else(EngineConfig::from_env);
        let io = self.io.unwrap_or_else(|| Arc::new(NullIo) as Arc<dyn PinIo>);
        let clock = self.clock.unwrap_or_else(|| Arc::new(MonotonicClock) as Arc<dyn Clock>);
        let stats = Arc::new(EngineStats::default());

        let inner = Arc::new(EngineInner {
            image: image::share(ProcessImage::empty(&config, Arc::clone(&io), clock)),
            scheduler: Mutex::new(Scheduler::new(&config, Arc::clone(&stats))),
            staging: Mutex::new(StagingBuffer::new(config.config_timeout)),
            config_store: self.config_store,
            stats,
            io,
            config,
        });

        #[cfg(feature = "diagnostics")]
        crate::diagnostics::register(&inner);

        Engine { inner }
    }
}

pub(crate) struct EngineInner {
    pub(crate) config: EngineConfig,
    io: Arc<dyn PinIo>,
    pub(crate) image: SharedImage,
    pub(crate) scheduler: Mutex<Scheduler>,
    staging: Mutex<StagingBuffer>,
    config_store: Option<Arc<dyn ConfigStore>>,
    pub(crate) stats: Arc<EngineStats>,
}

impl EngineInner {
    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        let mut snapshot = self.stats.snapshot();
        let image = image::lock(&self.image);
        snapshot.edge_overflows = image.edges.overflows();
        snapshot.timer_overflows = image.timers.overflows();
        snapshot
    }
}

/// Control-path lock; never taken by scan units
fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Feed one chunk of a configuration document.
    ///
    /// `from_persisted_store` marks bytes that were read back from the
    /// configuration store, which are not written back.
    pub fn configure(&self, chunk: &[u8], from_persisted_store: bool) -> ConfigureOutcome {
        let staged = guard(&self.inner.staging).push(chunk, Instant::now());
        match staged {
            Staged::Incomplete => ConfigureOutcome::Incomplete,
            Staged::Complete(document, raw) => {
                if !from_persisted_store {
                    self.persist(&raw);
                }
                self.apply(&document)
            }
        }
    }

    /// Discard a partially received configuration that has gone idle
    pub fn expire_stale_configuration(&self) -> bool {
        guard(&self.inner.staging).expire(Instant::now())
    }

    /// Boot path: apply whatever the configuration store holds.
    /// Returns `None` when there is no store or nothing stored.
    pub fn restore_persisted(&self) -> Option<ConfigureOutcome> {
        let bytes = self.stored_configuration()?;
        info!(bytes = bytes.len(), "restoring persisted configuration");
        guard(&self.inner.staging).clear();
        let outcome = self.configure(&bytes, true);
        if outcome == ConfigureOutcome::Incomplete {
            warn!("persisted configuration is not valid JSON");
            guard(&self.inner.staging).clear();
        }
        Some(outcome)
    }

    /// The raw bytes of the last persisted configuration
    pub fn stored_configuration(&self) -> Option<Vec<u8>> {
        let store = self.inner.config_store.as_ref()?;
        match store.load() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "failed to read persisted configuration");
                None
            }
        }
    }

    fn persist(&self, raw: &[u8]) {
        if let Some(store) = &self.inner.config_store {
            match store.save(raw) {
                Ok(()) => info!(bytes = raw.len(), "configuration persisted"),
                Err(e) => error!(error = %e, "failed to persist configuration"),
            }
        }
    }

    fn apply(&self, document: &Value) -> ConfigureOutcome {
        let mut scheduler = guard(&self.inner.scheduler);
        scheduler.stop_all();
        image::lock(&self.inner.image).reset(VariableStore::new(Arc::clone(&self.inner.io)));

        match self.rebuild(&mut scheduler, document) {
            Ok(summary) => {
                self.inner.stats.reconfigurations.fetch_add(1, Ordering::Relaxed);
                info!(
                    variables = summary.variables,
                    wires = summary.wires,
                    skipped = summary.skipped_wires,
                    "configuration applied"
                );
                ConfigureOutcome::Applied(summary)
            }
            Err(e) => {
                self.inner
                    .stats
                    .rejected_configurations
                    .fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "configuration rejected, no wires running");
                scheduler.stop_all();
                image::lock(&self.inner.image)
                    .reset(VariableStore::new(Arc::clone(&self.inner.io)));
                ConfigureOutcome::Rejected(e)
            }
        }
    }

    fn rebuild(
        &self,
        scheduler: &mut Scheduler,
        document: &Value,
    ) -> Result<ConfigureSummary, ConfigureError> {
        let object = document.as_object().ok_or(ConfigureError::NotAnObject)?;

        if let Some(device) = object.get("Device")
            && let Err(e) = self.inner.io.configure_device(device)
        {
            warn!(error = %e, "device configuration failed");
        }

        let store = VariableStore::load(
            object.get("Variables").unwrap_or(&Value::Null),
            Arc::clone(&self.inner.io),
        )?;
        let program = Program::from_json(object.get("Wires").unwrap_or(&Value::Null))?;

        let summary = ConfigureSummary {
            variables: store.len(),
            wires: program.wires.len(),
            skipped_wires: program.skipped,
            sensors: store.has_sensors(),
        };
        image::lock(&self.inner.image).reset(store);
        scheduler.start(&self.inner.image, program.wires, summary.sensors)?;
        Ok(summary)
    }

    /// Monitoring output: every variable in declaration shape with live values
    pub fn variables_json(&self) -> Value {
        image::lock(&self.inner.image).store.serialize()
    }

    /// Apply a flat `{name: bool|number}` update; returns how many variables
    /// changed
    pub fn apply_remote_update(&self, text: &str) -> Result<usize, LoadError> {
        image::lock(&self.inner.image)
            .store
            .apply_remote_update_str(text)
    }

    /// Values published to peer devices
    pub fn shared_values(&self) -> Value {
        image::lock(&self.inner.image).store.shared_values()
    }

    pub fn set_current_time(&self, hour: u32, minute: u32, second: u32) -> bool {
        image::lock(&self.inner.image)
            .store
            .set_current_time(hour, minute, second)
    }

    /// Run `f` with the process image locked, between scans
    pub fn with_image<R>(&self, f: impl FnOnce(&mut ProcessImage) -> R) -> R {
        f(&mut image::lock(&self.inner.image))
    }

    pub fn with_store<R>(&self, f: impl FnOnce(&mut VariableStore) -> R) -> R {
        self.with_image(|image| f(&mut image.store))
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.snapshot()
    }

    /// Names of the running units
    pub fn active_units(&self) -> Vec<String> {
        guard(&self.inner.scheduler).unit_names()
    }

    /// Stop every unit; the store keeps its last values
    pub fn shutdown(&self) {
        guard(&self.inner.scheduler).stop_all();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryConfigStore;
    use ladder_core::MemoryIo;
    use std::time::Duration;

    fn quiet_config() -> EngineConfig {
        EngineConfig {
            spawn_stagger: Duration::ZERO,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_not_an_object_is_rejected() {
        let engine = Engine::builder().config(quiet_config()).build();
        let outcome = engine.configure(b"[1, 2]", false);
        assert_eq!(outcome, ConfigureOutcome::Rejected(ConfigureError::NotAnObject));
        assert_eq!(engine.stats().rejected_configurations, 1);
    }

    #[test]
    fn test_device_forwarded_to_io() {
        let io = Arc::new(MemoryIo::new());
        let engine = Engine::builder()
            .io(io.clone())
            .config(quiet_config())
            .build();
        let doc = br#"{"Device": {"device_name": "plc-1"}, "Variables": [], "Wires": []}"#;
        assert!(engine.configure(doc, false).is_applied());
        assert_eq!(
            io.device(),
            Some(serde_json::json!({"device_name": "plc-1"}))
        );
    }

    #[test]
    fn test_persisted_only_when_not_from_store() {
        let store = Arc::new(MemoryConfigStore::new());
        let engine = Engine::builder()
            .config(quiet_config())
            .config_store(store.clone())
            .build();
        engine.configure(br#"{"Variables": [], "Wires": []}"#, true);
        assert!(store.load().unwrap().is_none());
        engine.configure(br#"{"Variables": [], "Wires": []}"#, false);
        assert!(store.load().unwrap().is_some());
    }
}
