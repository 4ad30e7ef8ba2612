//! Variable model
//!
//! Each configured variable is one `Variable`: a unique name plus a closed
//! `VariableKind`. The type tag seen on the wire (`"Digital Input"`, `"Counter"`,
//! ...) is derived from the kind instead of being stored as a string.

/// Sub-kind of a pin-backed digital/analog variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
    DigitalInput,
    DigitalOutput,
    AnalogInput,
    AnalogOutput,
}

impl IoKind {
    pub fn type_tag(&self) -> &'static str {
        match self {
            IoKind::DigitalInput => "Digital Input",
            IoKind::DigitalOutput => "Digital Output",
            IoKind::AnalogInput => "Analog Input",
            IoKind::AnalogOutput => "Analog Output",
        }
    }

    pub fn is_digital(&self) -> bool {
        matches!(self, IoKind::DigitalInput | IoKind::DigitalOutput)
    }
}

/// `Time` variables are plain numbers; `Current Time` is fed by the wall clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeKind {
    Time,
    CurrentTime,
}

impl TimeKind {
    pub fn type_tag(&self) -> &'static str {
        match self {
            TimeKind::Time => "Time",
            TimeKind::CurrentTime => "Current Time",
        }
    }
}

/// Up/down counter
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Counter {
    /// Preset value
    pub pv: f64,
    /// Current value
    pub cv: f64,
    /// Count-up mode flag (selects reset-to-zero)
    pub cu: bool,
    /// Count-down mode flag (selects reset-to-preset)
    pub cd: bool,
    /// `cv >= pv`
    pub qu: bool,
    /// `cv <= 0`
    pub qd: bool,
}

impl Counter {
    /// Recompute the done flags from the current value
    pub fn refresh_outputs(&mut self) {
        self.qu = self.cv >= self.pv;
        self.qd = self.cv <= 0.0;
    }

    pub fn count_up(&mut self) {
        self.cv += 1.0;
        self.refresh_outputs();
    }

    pub fn count_down(&mut self) {
        self.cv -= 1.0;
        self.refresh_outputs();
    }

    /// Apply a reset according to the mode flags.
    ///
    /// `CU` resets to zero, `CD` resets to the preset; with both set the preset
    /// wins. Returns whether anything was reset.
    pub fn reset(&mut self) -> bool {
        let mut action_taken = false;
        if self.cu {
            self.cv = 0.0;
            action_taken = true;
        }
        if self.cd {
            self.cv = self.pv;
            action_taken = true;
        }
        if action_taken {
            self.refresh_outputs();
        }
        action_taken
    }
}

/// IEC-style timer variable. Times are milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Timer {
    /// Preset time
    pub pt: f64,
    /// Elapsed time
    pub et: f64,
    /// Input state seen on the last evaluation
    pub input: bool,
    /// Output
    pub q: bool,
}

impl Timer {
    pub fn clear(&mut self) {
        self.et = 0.0;
        self.q = false;
        self.input = false;
    }
}

/// Load-cell style ADC sensor; sampling is done by the I/O collaborator
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdcSensor {
    pub sensor_type: String,
    pub pd_sck: String,
    pub dout: String,
    pub map_low: f64,
    pub map_high: f64,
    pub gain: f64,
    pub sampling_rate: String,
    /// Last accepted sample
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariableKind {
    Io { kind: IoKind, pin: String },
    OneWire { pin: String, value: f64 },
    Adc(AdcSensor),
    Boolean(bool),
    Number(f64),
    Counter(Counter),
    Timer(Timer),
    Time { kind: TimeKind, value: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub kind: VariableKind,
}

impl Variable {
    pub fn new(name: impl Into<String>, kind: VariableKind) -> Self {
        Variable {
            name: name.into(),
            kind,
        }
    }

    /// Type string used in declarations and monitoring output
    pub fn type_tag(&self) -> &'static str {
        match &self.kind {
            VariableKind::Io { kind, .. } => kind.type_tag(),
            VariableKind::OneWire { .. } => "One Wire Input",
            VariableKind::Adc(_) => "ADC Sensor",
            VariableKind::Boolean(_) => "Boolean",
            VariableKind::Number(_) => "Number",
            VariableKind::Counter(_) => "Counter",
            VariableKind::Timer(_) => "Timer",
            VariableKind::Time { kind, .. } => kind.type_tag(),
        }
    }

    pub fn as_counter_mut(&mut self) -> Option<&mut Counter> {
        match &mut self.kind {
            VariableKind::Counter(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_timer_mut(&mut self) -> Option<&mut Timer> {
        match &mut self.kind {
            VariableKind::Timer(t) => Some(t),
            _ => None,
        }
    }

    /// Whether this variable caches a value sampled by a sensor driver
    pub fn is_sensor(&self) -> bool {
        matches!(self.kind, VariableKind::OneWire { .. } | VariableKind::Adc(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_flags_follow_value() {
        let mut c = Counter {
            pv: 2.0,
            ..Default::default()
        };
        c.count_up();
        assert_eq!(c.cv, 1.0);
        assert!(!c.qu);
        assert!(!c.qd);
        c.count_up();
        assert!(c.qu);
        c.count_down();
        c.count_down();
        assert_eq!(c.cv, 0.0);
        assert!(c.qd);
        assert!(!c.qu);
    }

    #[test]
    fn test_counter_reset_modes() {
        let mut up = Counter {
            pv: 5.0,
            cv: 7.0,
            cu: true,
            qu: true,
            ..Default::default()
        };
        assert!(up.reset());
        assert_eq!(up.cv, 0.0);
        assert!(!up.qu);
        assert!(up.qd);

        let mut down = Counter {
            pv: 5.0,
            cv: 1.0,
            cd: true,
            ..Default::default()
        };
        assert!(down.reset());
        assert_eq!(down.cv, 5.0);
        assert!(down.qu);

        let mut both = Counter {
            pv: 3.0,
            cv: 1.0,
            cu: true,
            cd: true,
            ..Default::default()
        };
        both.reset();
        assert_eq!(both.cv, 3.0);
    }

    #[test]
    fn test_counter_reset_without_mode_keeps_flags() {
        let mut c = Counter {
            pv: 5.0,
            cv: 9.0,
            qu: false,
            ..Default::default()
        };
        assert!(!c.reset());
        assert_eq!(c.cv, 9.0);
        // flags are not recomputed when no mode is selected
        assert!(!c.qu);
    }

    #[test]
    fn test_type_tags() {
        let io = Variable::new(
            "Lamp",
            VariableKind::Io {
                kind: IoKind::DigitalOutput,
                pin: "DO1".into(),
            },
        );
        assert_eq!(io.type_tag(), "Digital Output");
        let now = Variable::new(
            "Now",
            VariableKind::Time {
                kind: TimeKind::CurrentTime,
                value: 0.0,
            },
        );
        assert_eq!(now.type_tag(), "Current Time");
        assert!(!now.is_sensor());
    }
}
