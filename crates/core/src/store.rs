//! Variable store
//!
//! Owns every configured variable in declaration order and resolves operand
//! references (`Start`, `Cnt.CV`, `T1.Q`) to typed reads and writes.
//!
//! Access never fails: a missing name, a suffix the variable does not have, or a
//! representation the variable lacks all resolve to `false`/`0.0` on read and
//! to a no-op on write. Pin-backed variables forward to the store's `PinIo`;
//! write failures from the collaborator are logged and absorbed.

use crate::address::{Address, Field};
use crate::declaration::Declaration;
use crate::error::LoadError;
use crate::io::PinIo;
use crate::variable::{Counter, TimeKind, Timer, Variable, VariableKind};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct VariableStore {
    variables: Vec<Variable>,
    index: HashMap<String, usize>,
    io: Arc<dyn PinIo>,
}

impl std::fmt::Debug for VariableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableStore")
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}

impl VariableStore {
    /// An empty store bound to `io`
    pub fn new(io: Arc<dyn PinIo>) -> Self {
        VariableStore {
            variables: Vec::new(),
            index: HashMap::new(),
            io,
        }
    }

    /// Build a store from a configuration's `Variables` array.
    ///
    /// Every entry must decode as a declaration and names must be unique;
    /// the first offending entry fails the whole load.
    pub fn load(variables: &Value, io: Arc<dyn PinIo>) -> Result<Self, LoadError> {
        let entries = variables.as_array().ok_or(LoadError::NotAnArray)?;
        let mut declarations = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let declaration = Declaration::deserialize(entry).map_err(|e| {
                LoadError::Declaration {
                    index,
                    message: e.to_string(),
                }
            })?;
            declarations.push(declaration);
        }
        Self::from_declarations(declarations, io)
    }

    pub fn from_declarations(
        declarations: Vec<Declaration>,
        io: Arc<dyn PinIo>,
    ) -> Result<Self, LoadError> {
        let mut store = Self::new(io);
        for declaration in declarations {
            let variable = Variable::from(declaration);
            if store.index.contains_key(&variable.name) {
                return Err(LoadError::DuplicateName(variable.name));
            }
            store
                .index
                .insert(variable.name.clone(), store.variables.len());
            store.variables.push(variable);
        }
        debug!(count = store.variables.len(), "variable store loaded");
        Ok(store)
    }

    pub fn io(&self) -> &Arc<dyn PinIo> {
        &self.io
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Variables in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    /// Exact-name lookup; suffixes are not interpreted here
    pub fn find(&self, name: &str) -> Option<&Variable> {
        self.index.get(name).map(|&i| &self.variables[i])
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Variable> {
        match self.index.get(name) {
            Some(&i) => self.variables.get_mut(i),
            None => None,
        }
    }

    pub fn counter_mut(&mut self, name: &str) -> Option<&mut Counter> {
        self.find_mut(name).and_then(Variable::as_counter_mut)
    }

    pub fn timer_mut(&mut self, name: &str) -> Option<&mut Timer> {
        self.find_mut(name).and_then(Variable::as_timer_mut)
    }

    pub fn has_sensors(&self) -> bool {
        self.variables.iter().any(Variable::is_sensor)
    }

    pub fn read_bool(&self, reference: &str) -> bool {
        let address = Address::parse(reference);
        let Some(variable) = self.find(address.base) else {
            return false;
        };
        match (&variable.kind, address.field) {
            (VariableKind::Io { kind, pin }, _) if kind.is_digital() => self.io.read_bool(pin),
            (VariableKind::Boolean(value), _) => *value,
            (VariableKind::Counter(c), Some(Field::Cu)) => c.cu,
            (VariableKind::Counter(c), Some(Field::Cd)) => c.cd,
            (VariableKind::Counter(c), Some(Field::Qu)) => c.qu,
            (VariableKind::Counter(c), Some(Field::Qd)) => c.qd,
            (VariableKind::Timer(t), Some(Field::In)) => t.input,
            (VariableKind::Timer(t), Some(Field::Q)) => t.q,
            _ => false,
        }
    }

    pub fn write_bool(&mut self, reference: &str, value: bool) {
        let address = Address::parse(reference);
        let Some(&i) = self.index.get(address.base) else {
            return;
        };
        let io = Arc::clone(&self.io);
        match (&mut self.variables[i].kind, address.field) {
            (VariableKind::Io { pin, .. }, _) => {
                if let Err(e) = io.write_bool(pin, value) {
                    warn!(variable = reference, error = %e, "pin write failed");
                }
            }
            (VariableKind::Boolean(b), _) => *b = value,
            (VariableKind::Counter(c), Some(Field::Cu)) => c.cu = value,
            (VariableKind::Counter(c), Some(Field::Cd)) => c.cd = value,
            (VariableKind::Counter(c), Some(Field::Qu)) => c.qu = value,
            (VariableKind::Counter(c), Some(Field::Qd)) => c.qd = value,
            (VariableKind::Timer(t), Some(Field::In)) => t.input = value,
            (VariableKind::Timer(t), Some(Field::Q)) => t.q = value,
            _ => {}
        }
    }

    pub fn read_number(&self, reference: &str) -> f64 {
        let address = Address::parse(reference);
        let Some(variable) = self.find(address.base) else {
            return 0.0;
        };
        match (&variable.kind, address.field) {
            (VariableKind::Io { kind, pin }, _) if !kind.is_digital() => self.io.read_number(pin),
            (VariableKind::OneWire { value, .. }, _) => *value,
            (VariableKind::Adc(s), _) => s.value,
            (VariableKind::Number(value), _) => *value,
            (VariableKind::Time { value, .. }, _) => *value,
            (VariableKind::Counter(c), Some(Field::Pv)) => c.pv,
            (VariableKind::Counter(c), Some(Field::Cv)) => c.cv,
            (VariableKind::Timer(t), Some(Field::Pt)) => t.pt,
            (VariableKind::Timer(t), Some(Field::Et)) => t.et,
            _ => 0.0,
        }
    }

    /// Numeric write. Pin-backed variables receive the value rounded and
    /// clamped to the 8-bit DAC range.
    pub fn write_number(&mut self, reference: &str, value: f64) {
        let address = Address::parse(reference);
        let Some(&i) = self.index.get(address.base) else {
            return;
        };
        let io = Arc::clone(&self.io);
        match (&mut self.variables[i].kind, address.field) {
            (VariableKind::Io { pin, .. }, _) => {
                if let Err(e) = io.write_number(pin, dac_level(value)) {
                    warn!(variable = reference, error = %e, "pin write failed");
                }
            }
            (VariableKind::Number(n), _) => *n = value,
            (VariableKind::Time { value: t, .. }, _) => *t = value,
            (VariableKind::Counter(c), Some(Field::Pv)) => c.pv = value,
            (VariableKind::Counter(c), Some(Field::Cv)) => c.cv = value,
            (VariableKind::Timer(t), Some(Field::Pt)) => t.pt = value,
            (VariableKind::Timer(t), Some(Field::Et)) => t.et = value,
            _ => {}
        }
    }

    /// Monitoring view: one declaration-shaped object per variable, with live
    /// readings for pin-backed and sensor variables.
    pub fn serialize(&self) -> Value {
        let items = self
            .variables
            .iter()
            .filter_map(|variable| {
                let live = match &variable.kind {
                    VariableKind::Io { kind, pin } if kind.is_digital() => {
                        Some(if self.io.read_bool(pin) { 1.0 } else { 0.0 })
                    }
                    VariableKind::Io { pin, .. } => Some(self.io.read_number(pin)),
                    _ => None,
                };
                match serde_json::to_value(Declaration::snapshot(variable, live)) {
                    Ok(v) => Some(v),
                    Err(e) => {
                        warn!(variable = %variable.name, error = %e, "failed to serialize variable");
                        None
                    }
                }
            })
            .collect();
        Value::Array(items)
    }

    pub fn to_json_string(&self) -> String {
        self.serialize().to_string()
    }

    /// Apply a flat `{name: value}` object from a peer device.
    ///
    /// Only Boolean and Number variables are updated, and only when the JSON
    /// value has the matching type. Returns how many variables changed.
    pub fn apply_remote_update(&mut self, update: &Value) -> usize {
        let Some(fields) = update.as_object() else {
            warn!("remote update is not a JSON object");
            return 0;
        };
        let mut updated = 0;
        for variable in &mut self.variables {
            let Some(item) = fields.get(&variable.name) else {
                continue;
            };
            match (&mut variable.kind, item) {
                (VariableKind::Boolean(b), Value::Bool(v)) => {
                    *b = *v;
                    updated += 1;
                }
                (VariableKind::Number(n), Value::Number(v)) => {
                    if let Some(v) = v.as_f64() {
                        *n = v;
                        updated += 1;
                    }
                }
                _ => {}
            }
        }
        updated
    }

    pub fn apply_remote_update_str(&mut self, text: &str) -> Result<usize, LoadError> {
        let update: Value = serde_json::from_str(text)?;
        Ok(self.apply_remote_update(&update))
    }

    /// Flat object of every Boolean and Number value, the payload published
    /// to parent devices
    pub fn shared_values(&self) -> Value {
        let mut out = Map::new();
        for variable in &self.variables {
            match &variable.kind {
                VariableKind::Boolean(b) => {
                    out.insert(variable.name.clone(), Value::Bool(*b));
                }
                VariableKind::Number(n) => {
                    out.insert(variable.name.clone(), Value::from(*n));
                }
                _ => {}
            }
        }
        Value::Object(out)
    }

    /// Write `HHMMSS` into the first `Current Time` variable.
    ///
    /// Returns false when no such variable is declared.
    pub fn set_current_time(&mut self, hour: u32, minute: u32, second: u32) -> bool {
        let encoded = f64::from(hour) * 10_000.0 + f64::from(minute) * 100.0 + f64::from(second);
        for variable in &mut self.variables {
            if let VariableKind::Time {
                kind: TimeKind::CurrentTime,
                value,
            } = &mut variable.kind
            {
                *value = encoded;
                return true;
            }
        }
        false
    }

    /// Re-sample every OneWire and ADC variable from the I/O collaborator.
    ///
    /// A zero ADC sample is treated as a failed read and only accepted while
    /// the cached value is itself zero. Returns the number of sensors read.
    pub fn refresh_sensors(&mut self) -> usize {
        let io = Arc::clone(&self.io);
        let mut sampled = 0;
        for variable in &mut self.variables {
            match &mut variable.kind {
                VariableKind::OneWire { pin, value } => {
                    *value = io.read_number(pin);
                    sampled += 1;
                }
                VariableKind::Adc(sensor) => {
                    let sample = io.read_adc(sensor);
                    if sample != 0.0 || sensor.value == 0.0 {
                        sensor.value = sample;
                    } else {
                        warn!(
                            sensor = %variable.name,
                            kept = sensor.value,
                            "invalid ADC sample, keeping previous value"
                        );
                    }
                    sampled += 1;
                }
                _ => {}
            }
        }
        sampled
    }
}

/// Round and clamp to the 0..=255 range of an 8-bit DAC
pub fn dac_level(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.round().clamp(0.0, 255.0)
}
