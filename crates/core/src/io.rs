//! Pin I/O contract
//!
//! The store never touches hardware directly. Pin-backed variables forward to a
//! `PinIo` implementation keyed by the logical pin name from the declaration
//! (`"DI0"`, `"AO1"`, ...). Reads are infallible and return neutral values for
//! unknown pins; writes report failures so the store can log them.

use crate::variable::AdcSensor;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// Error from a pin write or device configuration
#[derive(Debug, Clone, PartialEq)]
pub enum IoError {
    /// The pin name is not part of the device pin table
    UnknownPin(String),
    /// The pin exists but cannot be written (e.g. an input)
    ReadOnly(String),
    /// The `Device` section could not be applied
    Device(String),
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::UnknownPin(pin) => write!(f, "unknown pin '{}'", pin),
            IoError::ReadOnly(pin) => write!(f, "pin '{}' is read-only", pin),
            IoError::Device(msg) => write!(f, "device configuration failed: {}", msg),
        }
    }
}

impl std::error::Error for IoError {}

/// Boolean and numeric accessors keyed by logical pin name
pub trait PinIo: Send + Sync {
    fn read_bool(&self, pin: &str) -> bool;

    fn write_bool(&self, pin: &str, value: bool) -> Result<(), IoError>;

    fn read_number(&self, pin: &str) -> f64;

    fn write_number(&self, pin: &str, value: f64) -> Result<(), IoError>;

    /// Sample an ADC sensor. The driver gets the full sensor settings
    /// (type, clock and data pins, gain, sampling rate, mapping range) and
    /// returns the mapped reading, `0.0` on a failed read. The default
    /// reads the `DOUT` pin as an already mapped number.
    fn read_adc(&self, sensor: &AdcSensor) -> f64 {
        self.read_number(&sensor.dout)
    }

    /// Apply the configuration's `Device` section.
    fn configure_device(&self, _device: &serde_json::Value) -> Result<(), IoError> {
        Ok(())
    }
}

/// I/O that reads neutral values and accepts every write
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIo;

impl PinIo for NullIo {
    fn read_bool(&self, _pin: &str) -> bool {
        false
    }

    fn write_bool(&self, _pin: &str, _value: bool) -> Result<(), IoError> {
        Ok(())
    }

    fn read_number(&self, _pin: &str) -> f64 {
        0.0
    }

    fn write_number(&self, _pin: &str, _value: f64) -> Result<(), IoError> {
        Ok(())
    }
}

/// In-memory pin image.
///
/// Every pin holds one numeric level; booleans are stored as 1.0/0.0. Pins
/// that were never written read as zero. Used by tests and by hosts that
/// simulate the field side.
#[derive(Debug, Default)]
pub struct MemoryIo {
    pins: Mutex<HashMap<String, f64>>,
    device: Mutex<Option<serde_json::Value>>,
}

impl MemoryIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a pin level from the field side
    pub fn set(&self, pin: &str, value: f64) {
        self.lock_pins().insert(pin.to_string(), value);
    }

    pub fn set_bool(&self, pin: &str, value: bool) {
        self.set(pin, if value { 1.0 } else { 0.0 });
    }

    /// Last level written to or set on a pin
    pub fn get(&self, pin: &str) -> Option<f64> {
        self.lock_pins().get(pin).copied()
    }

    /// The most recent `Device` section passed to `configure_device`
    pub fn device(&self) -> Option<serde_json::Value> {
        self.device
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn lock_pins(&self) -> std::sync::MutexGuard<'_, HashMap<String, f64>> {
        self.pins.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PinIo for MemoryIo {
    fn read_bool(&self, pin: &str) -> bool {
        self.get(pin).is_some_and(|v| v != 0.0)
    }

    fn write_bool(&self, pin: &str, value: bool) -> Result<(), IoError> {
        self.set_bool(pin, value);
        Ok(())
    }

    fn read_number(&self, pin: &str) -> f64 {
        self.get(pin).unwrap_or(0.0)
    }

    fn write_number(&self, pin: &str, value: f64) -> Result<(), IoError> {
        self.set(pin, value);
        Ok(())
    }

    fn configure_device(&self, device: &serde_json::Value) -> Result<(), IoError> {
        *self.device.lock().unwrap_or_else(|e| e.into_inner()) = Some(device.clone());
        Ok(())
    }
}
