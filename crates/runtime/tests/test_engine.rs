//! End-to-end tests for the engine: configuration ingestion, running scan
//! units against in-memory I/O, rejection and persistence.
//!
//! Scan units run on real coroutines, so assertions poll with a deadline
//! instead of assuming a fixed number of scans.

use ladder_core::{IoError, LoadError, ManualClock, MemoryIo, PinIo};
use ladder_runtime::{
    ConfigStore, ConfigureError, ConfigureOutcome, Engine, EngineConfig, FileConfigStore,
    SchedulerError,
};
use serde_json::{Value, json};
use serial_test::serial;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

fn test_config() -> EngineConfig {
    EngineConfig {
        spawn_stagger: Duration::ZERO,
        ..EngineConfig::default()
    }
}

fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    check()
}

fn el(element_type: &str, values: &[&str]) -> Value {
    json!({"Type": "LadderElement", "ElementType": element_type, "ComboBoxValues": values})
}

fn stop_run_document() -> Value {
    json!({
        "Device": {"digital_inputs_names": ["I0"], "digital_outputs_names": ["Q0"]},
        "Variables": [
            {"Type": "Digital Input", "Name": "Stop", "Pin": "I0"},
            {"Type": "Digital Output", "Name": "Run", "Pin": "Q0"}
        ],
        "Wires": [
            {"Nodes": [el("NOContact", &["Stop"]), el("Coil", &["Run"])]}
        ]
    })
}

#[test]
#[serial]
fn test_stop_run_rung_drives_output() {
    let io = Arc::new(MemoryIo::new());
    let engine = Engine::builder().io(io.clone()).config(test_config()).build();

    let outcome = engine.configure(stop_run_document().to_string().as_bytes(), false);
    assert!(outcome.is_applied(), "{:?}", outcome);
    assert_eq!(engine.active_units(), vec!["wire-0".to_string()]);

    assert!(wait_until(|| io.get("Q0") == Some(1.0)));
    io.set_bool("I0", true);
    assert!(wait_until(|| io.get("Q0") == Some(0.0)));

    engine.shutdown();
    assert!(engine.active_units().is_empty());
    assert_eq!(engine.stats().active_units, 0);
}

#[test]
#[serial]
fn test_chunked_configuration() {
    let engine = Engine::builder()
        .io(Arc::new(MemoryIo::new()))
        .config(test_config())
        .build();
    let text = stop_run_document().to_string();
    let bytes = text.as_bytes();
    let third = bytes.len() / 3;

    assert_eq!(engine.configure(&bytes[..third], false), ConfigureOutcome::Incomplete);
    assert_eq!(
        engine.configure(&bytes[third..2 * third], false),
        ConfigureOutcome::Incomplete
    );
    match engine.configure(&bytes[2 * third..], false) {
        ConfigureOutcome::Applied(summary) => {
            assert_eq!(summary.variables, 2);
            assert_eq!(summary.wires, 1);
            assert_eq!(summary.skipped_wires, 0);
            assert!(!summary.sensors);
        }
        other => panic!("expected applied, got {:?}", other),
    }
    assert!(!engine.expire_stale_configuration());
}

#[test]
#[serial]
fn test_rejected_configuration_leaves_nothing_running() {
    let engine = Engine::builder()
        .io(Arc::new(MemoryIo::new()))
        .config(test_config())
        .build();
    assert!(
        engine
            .configure(stop_run_document().to_string().as_bytes(), false)
            .is_applied()
    );

    let bad = json!({"Variables": {"Type": "Boolean"}, "Wires": []});
    assert_eq!(
        engine.configure(bad.to_string().as_bytes(), false),
        ConfigureOutcome::Rejected(ConfigureError::Variables(LoadError::NotAnArray))
    );
    assert!(engine.active_units().is_empty());
    assert_eq!(engine.variables_json(), json!([]));

    let bad_wires = json!({"Variables": [], "Wires": {"Nodes": []}});
    assert!(matches!(
        engine.configure(bad_wires.to_string().as_bytes(), false),
        ConfigureOutcome::Rejected(ConfigureError::Program(_))
    ));

    let stats = engine.stats();
    assert_eq!(stats.reconfigurations, 1);
    assert_eq!(stats.rejected_configurations, 2);
}

#[test]
#[serial]
fn test_memory_budget_rejects_whole_batch() {
    let config = EngineConfig {
        memory_budget: Some(4096),
        ..test_config()
    };
    let engine = Engine::builder().config(config).build();
    let outcome = engine.configure(stop_run_document().to_string().as_bytes(), false);
    assert!(matches!(
        outcome,
        ConfigureOutcome::Rejected(ConfigureError::Scheduler(
            SchedulerError::InsufficientMemory { units: 1, .. }
        ))
    ));
    assert!(engine.active_units().is_empty());
    assert_eq!(engine.stats().total_spawned, 0);
}

#[test]
#[serial]
fn test_persisted_configuration_restores_on_boot() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    let text = stop_run_document().to_string();

    {
        let engine = Engine::builder()
            .config(test_config())
            .config_store(Arc::new(FileConfigStore::new(&path)))
            .build();
        assert!(engine.restore_persisted().is_none());
        assert!(engine.configure(text.as_bytes(), false).is_applied());
        assert_eq!(engine.stored_configuration(), Some(text.clone().into_bytes()));
    }

    let store = Arc::new(FileConfigStore::new(&path));
    let io = Arc::new(MemoryIo::new());
    let engine = Engine::builder()
        .io(io.clone())
        .config(test_config())
        .config_store(store.clone())
        .build();
    let outcome = engine.restore_persisted();
    assert!(matches!(outcome, Some(ConfigureOutcome::Applied(_))));
    assert!(wait_until(|| io.get("Q0") == Some(1.0)));
    // restoring does not rewrite the file
    assert_eq!(store.load().unwrap(), Some(text.into_bytes()));
}

#[test]
#[serial]
fn test_on_delay_timer_with_manual_clock() {
    let clock = Arc::new(ManualClock::new());
    let engine = Engine::builder()
        .io(Arc::new(MemoryIo::new()))
        .clock(clock.clone())
        .config(test_config())
        .build();
    let doc = json!({
        "Variables": [
            {"Type": "Boolean", "Name": "Go", "Value": true},
            {"Type": "Boolean", "Name": "Done", "Value": false},
            {"Type": "Timer", "Name": "T", "PT": 500}
        ],
        "Wires": [
            {"Nodes": [el("NCContact", &["Go"]), el("OnDelayTimer", &["T"]), el("Coil", &["Done"])]}
        ]
    });
    assert!(engine.configure(doc.to_string().as_bytes(), false).is_applied());

    assert!(wait_until(|| engine.with_image(|image| {
        image.timers.get("T").is_some_and(|slot| slot.running)
    })));
    assert!(!engine.with_store(|store| store.read_bool("Done")));

    clock.advance_ms(600);
    assert!(wait_until(|| engine.with_store(|store| store.read_bool("Done"))));
    engine.with_store(|store| {
        assert!(store.read_bool("T.Q"));
        assert_eq!(store.read_number("T.ET"), 500.0);
    });
}

#[test]
#[serial]
fn test_remote_update_and_monitoring() {
    let engine = Engine::builder()
        .io(Arc::new(MemoryIo::new()))
        .config(test_config())
        .build();
    let doc = json!({
        "Variables": [
            {"Type": "Boolean", "Name": "Enable", "Value": false},
            {"Type": "Number", "Name": "Setpoint", "Value": 1.5}
        ],
        "Wires": []
    });
    assert!(engine.configure(doc.to_string().as_bytes(), false).is_applied());

    assert_eq!(
        engine.apply_remote_update(r#"{"Enable": true, "Setpoint": 7, "Missing": 1}"#),
        Ok(2)
    );
    assert!(engine.apply_remote_update("not json").is_err());
    assert_eq!(
        engine.shared_values(),
        json!({"Enable": true, "Setpoint": 7.0})
    );
    assert_eq!(
        engine.variables_json(),
        json!([
            {"Type": "Boolean", "Name": "Enable", "Value": true},
            {"Type": "Number", "Name": "Setpoint", "Value": 7.0}
        ])
    );
}

#[test]
#[serial]
fn test_reconfiguration_replaces_running_wires() {
    let engine = Engine::builder()
        .io(Arc::new(MemoryIo::new()))
        .config(test_config())
        .build();
    let two = json!({
        "Variables": [{"Type": "Boolean", "Name": "A", "Value": false}],
        "Wires": [
            {"Nodes": [el("NOContact", &["A"])]},
            {"NotNodes": []},
            {"Nodes": [el("NCContact", &["A"])]}
        ]
    });
    match engine.configure(two.to_string().as_bytes(), false) {
        ConfigureOutcome::Applied(summary) => {
            assert_eq!(summary.wires, 2);
            assert_eq!(summary.skipped_wires, 1);
        }
        other => panic!("expected applied, got {:?}", other),
    }
    assert_eq!(
        engine.active_units(),
        vec!["wire-0".to_string(), "wire-2".to_string()]
    );
    assert!(wait_until(|| engine.stats().total_scans >= 2));

    let one = json!({"Variables": [], "Wires": [{"Nodes": []}]});
    assert!(engine.configure(one.to_string().as_bytes(), false).is_applied());
    assert_eq!(engine.active_units(), vec!["wire-0".to_string()]);
    assert_eq!(engine.stats().active_units, 1);
}

/// Pin I/O whose first boolean read panics, like a driver fault
struct FaultOnFirstRead {
    pins: MemoryIo,
    tripped: AtomicBool,
}

impl PinIo for FaultOnFirstRead {
    fn read_bool(&self, pin: &str) -> bool {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            panic!("pin driver fault on {}", pin);
        }
        self.pins.read_bool(pin)
    }

    fn write_bool(&self, pin: &str, value: bool) -> Result<(), IoError> {
        self.pins.write_bool(pin, value)
    }

    fn read_number(&self, pin: &str) -> f64 {
        self.pins.read_number(pin)
    }

    fn write_number(&self, pin: &str, value: f64) -> Result<(), IoError> {
        self.pins.write_number(pin, value)
    }
}

#[test]
#[serial]
fn test_scan_panic_is_contained() {
    let io = Arc::new(FaultOnFirstRead {
        pins: MemoryIo::new(),
        tripped: AtomicBool::new(false),
    });
    let engine = Engine::builder().io(io.clone()).config(test_config()).build();
    assert!(
        engine
            .configure(stop_run_document().to_string().as_bytes(), false)
            .is_applied()
    );

    // the unit survives the panic and later scans still drive the coil
    assert!(wait_until(|| io.pins.get("Q0") == Some(1.0)));
    assert_eq!(engine.stats().scan_panics, 1);
    assert_eq!(engine.active_units(), vec!["wire-0".to_string()]);

    io.pins.set_bool("I0", true);
    assert!(wait_until(|| io.pins.get("Q0") == Some(0.0)));
    assert_eq!(engine.stats().scan_panics, 1);
}

#[test]
#[serial]
fn test_sensor_unit_refreshes_one_wire() {
    let io = Arc::new(MemoryIo::new());
    let config = EngineConfig {
        sensor_interval: Duration::from_millis(20),
        ..test_config()
    };
    let engine = Engine::builder().io(io.clone()).config(config).build();
    let doc = json!({
        "Variables": [{"Type": "One Wire Input", "Name": "Temp", "Pin": "OW0"}],
        "Wires": []
    });
    match engine.configure(doc.to_string().as_bytes(), false) {
        ConfigureOutcome::Applied(summary) => assert!(summary.sensors),
        other => panic!("expected applied, got {:?}", other),
    }
    assert_eq!(engine.active_units(), vec!["sensors".to_string()]);

    io.set("OW0", 21.5);
    assert!(wait_until(|| engine.with_store(|store| store.read_number("Temp")) == 21.5));

    engine.shutdown();
    assert!(engine.active_units().is_empty());
    assert_eq!(engine.stats().active_units, 0);
}

#[test]
#[serial]
fn test_wire_units_start_staggered() {
    let stagger = Duration::from_millis(60);
    let config = EngineConfig {
        spawn_stagger: stagger,
        ..test_config()
    };
    let engine = Engine::builder()
        .io(Arc::new(MemoryIo::new()))
        .config(config)
        .build();
    let doc = json!({
        "Variables": [{"Type": "Boolean", "Name": "A", "Value": false}],
        "Wires": [
            {"Nodes": [el("NOContact", &["A"])]},
            {"Nodes": [el("NCContact", &["A"])]},
            {"Nodes": [el("NOContact", &["A"])]}
        ]
    });

    let started = Instant::now();
    assert!(engine.configure(doc.to_string().as_bytes(), false).is_applied());
    // three wires, two gaps between spawns
    assert!(started.elapsed() >= stagger * 2);
    assert_eq!(engine.active_units().len(), 3);
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_unset_budget_checks_host_memory() {
    let config = EngineConfig {
        memory_budget: None,
        stack_size: usize::MAX / 2,
        ..test_config()
    };
    let engine = Engine::builder().config(config).build();
    let outcome = engine.configure(stop_run_document().to_string().as_bytes(), false);
    assert!(matches!(
        outcome,
        ConfigureOutcome::Rejected(ConfigureError::Scheduler(
            SchedulerError::InsufficientMemory { units: 1, .. }
        ))
    ));
    assert_eq!(engine.stats().total_spawned, 0);
}

#[test]
#[serial]
fn test_idle_partial_configuration_expires() {
    let config = EngineConfig {
        config_timeout: Duration::from_millis(50),
        ..test_config()
    };
    let engine = Engine::builder()
        .io(Arc::new(MemoryIo::new()))
        .config(config)
        .build();
    let text = stop_run_document().to_string();
    let bytes = text.as_bytes();

    assert_eq!(engine.configure(&bytes[..10], false), ConfigureOutcome::Incomplete);
    assert!(!engine.expire_stale_configuration());
    std::thread::sleep(Duration::from_millis(80));
    assert!(engine.expire_stale_configuration());
    assert!(!engine.expire_stale_configuration());

    // the stale prefix is gone, so a whole document applies on its own
    assert!(engine.configure(bytes, false).is_applied());
}
