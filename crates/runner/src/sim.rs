//! Simulated field I/O
//!
//! The pin table comes from the configuration's `Device` section. Inputs can
//! be driven from the command line; outputs hold whatever the program last
//! wrote. Writes to pins the device does not declare are rejected.

use ladder_core::{IoError, PinIo};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinRole {
    DigitalInput,
    DigitalOutput,
    AnalogInput,
    AnalogOutput,
    OneWire,
}

impl PinRole {
    pub fn is_output(self) -> bool {
        matches!(self, PinRole::DigitalOutput | PinRole::AnalogOutput)
    }

    /// `Device` key listing the pins of this role
    pub fn device_key(self) -> &'static str {
        match self {
            PinRole::DigitalInput => "digital_inputs_names",
            PinRole::DigitalOutput => "digital_outputs_names",
            PinRole::AnalogInput => "analog_inputs_names",
            PinRole::AnalogOutput => "dac_outputs_names",
            PinRole::OneWire => "one_wire_inputs_names",
        }
    }

    const ALL: [PinRole; 5] = [
        PinRole::DigitalInput,
        PinRole::DigitalOutput,
        PinRole::AnalogInput,
        PinRole::AnalogOutput,
        PinRole::OneWire,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Pin {
    role: PinRole,
    level: f64,
}

#[derive(Debug, Default)]
pub struct SimulatedIo {
    pins: Mutex<BTreeMap<String, Pin>>,
    device_name: Mutex<Option<String>>,
}

impl SimulatedIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive a pin from the field side. Any declared pin may be set.
    pub fn set_level(&self, pin: &str, level: f64) -> Result<(), IoError> {
        let mut pins = self.lock();
        let entry = pins
            .get_mut(pin)
            .ok_or_else(|| IoError::UnknownPin(pin.to_string()))?;
        entry.level = level;
        Ok(())
    }

    pub fn level(&self, pin: &str) -> Option<f64> {
        self.lock().get(pin).map(|p| p.level)
    }

    pub fn role(&self, pin: &str) -> Option<PinRole> {
        self.lock().get(pin).map(|p| p.role)
    }

    pub fn device_name(&self) -> Option<String> {
        self.device_name
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Current output levels, keyed by pin
    pub fn outputs(&self) -> Value {
        let pins = self.lock();
        let mut out = Map::new();
        for (name, pin) in pins.iter().filter(|(_, p)| p.role.is_output()) {
            out.insert(name.clone(), Value::from(pin.level));
        }
        Value::Object(out)
    }

    fn write(&self, pin: &str, level: f64) -> Result<(), IoError> {
        let mut pins = self.lock();
        match pins.get_mut(pin) {
            Some(entry) if entry.role.is_output() => {
                if entry.level != level {
                    debug!(pin, level, "output changed");
                }
                entry.level = level;
                Ok(())
            }
            Some(_) => Err(IoError::ReadOnly(pin.to_string())),
            None => Err(IoError::UnknownPin(pin.to_string())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Pin>> {
        self.pins.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PinIo for SimulatedIo {
    fn read_bool(&self, pin: &str) -> bool {
        self.level(pin).is_some_and(|v| v != 0.0)
    }

    fn write_bool(&self, pin: &str, value: bool) -> Result<(), IoError> {
        self.write(pin, if value { 1.0 } else { 0.0 })
    }

    fn read_number(&self, pin: &str) -> f64 {
        self.level(pin).unwrap_or(0.0)
    }

    fn write_number(&self, pin: &str, value: f64) -> Result<(), IoError> {
        self.write(pin, value)
    }

    /// Rebuild the pin table. Levels of pins that survive keep their value.
    fn configure_device(&self, device: &Value) -> Result<(), IoError> {
        let object = device
            .as_object()
            .ok_or_else(|| IoError::Device("Device is not an object".to_string()))?;

        let mut table = BTreeMap::new();
        for role in PinRole::ALL {
            let Some(names) = object.get(role.device_key()) else {
                continue;
            };
            let names = names.as_array().ok_or_else(|| {
                IoError::Device(format!("{} is not an array", role.device_key()))
            })?;
            for name in names.iter().filter_map(Value::as_str) {
                table.insert(name.to_string(), role);
            }
        }

        let mut pins = self.lock();
        let previous = std::mem::take(&mut *pins);
        for (name, role) in table {
            let level = previous
                .get(&name)
                .filter(|p| p.role == role)
                .map_or(0.0, |p| p.level);
            pins.insert(name, Pin { role, level });
        }
        let count = pins.len();
        drop(pins);

        let name = object
            .get("device_name")
            .and_then(Value::as_str)
            .map(str::to_string);
        info!(device = name.as_deref().unwrap_or("unnamed"), pins = count, "device configured");
        *self.device_name.lock().unwrap_or_else(|e| e.into_inner()) = name;
        Ok(())
    }
}
