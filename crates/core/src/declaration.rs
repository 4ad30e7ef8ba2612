//! Wire format for variable declarations
//!
//! `Declaration` is both what the configuration's `Variables` array is parsed
//! into and what the monitoring output serializes, so the two shapes cannot
//! drift apart. The `Type` key selects the variant; field names follow the
//! configuration tool (`"Map Low"`, `PD_SCK`, `PV`, ...).
//!
//! Pin-backed and sensor variants carry an optional `Value`: it is omitted in
//! configurations and filled with the live reading when serializing.

use crate::variable::{
    AdcSensor, Counter, IoKind, TimeKind, Timer, Variable, VariableKind,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum Declaration {
    #[serde(rename = "Digital Input")]
    DigitalInput(PinDeclaration),
    #[serde(rename = "Digital Output")]
    DigitalOutput(PinDeclaration),
    #[serde(rename = "Analog Input")]
    AnalogInput(PinDeclaration),
    #[serde(rename = "Analog Output")]
    AnalogOutput(PinDeclaration),
    #[serde(rename = "One Wire Input")]
    OneWireInput(PinDeclaration),
    #[serde(rename = "ADC Sensor")]
    AdcSensor(AdcDeclaration),
    Boolean(BooleanDeclaration),
    Number(NumberDeclaration),
    Time(NumberDeclaration),
    #[serde(rename = "Current Time")]
    CurrentTime(NumberDeclaration),
    Counter(CounterDeclaration),
    Timer(TimerDeclaration),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinDeclaration {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Pin")]
    pub pin: String,
    #[serde(rename = "Value", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdcDeclaration {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Sensor Type", default)]
    pub sensor_type: String,
    #[serde(rename = "PD_SCK", default)]
    pub pd_sck: String,
    #[serde(rename = "DOUT", default)]
    pub dout: String,
    #[serde(rename = "Map Low", default)]
    pub map_low: f64,
    #[serde(rename = "Map High", default)]
    pub map_high: f64,
    #[serde(rename = "Gain", default)]
    pub gain: f64,
    #[serde(rename = "Sampling Rate", default)]
    pub sampling_rate: String,
    #[serde(rename = "Value", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanDeclaration {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberDeclaration {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterDeclaration {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "PV", default)]
    pub pv: f64,
    #[serde(rename = "CV", default)]
    pub cv: f64,
    #[serde(rename = "CU", default)]
    pub cu: bool,
    #[serde(rename = "CD", default)]
    pub cd: bool,
    #[serde(rename = "QU", default)]
    pub qu: bool,
    #[serde(rename = "QD", default)]
    pub qd: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerDeclaration {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "PT", default)]
    pub pt: f64,
    #[serde(rename = "ET", default)]
    pub et: f64,
    #[serde(rename = "IN", default)]
    pub input: bool,
    #[serde(rename = "Q", default)]
    pub q: bool,
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::DigitalInput(d)
            | Declaration::DigitalOutput(d)
            | Declaration::AnalogInput(d)
            | Declaration::AnalogOutput(d)
            | Declaration::OneWireInput(d) => &d.name,
            Declaration::AdcSensor(d) => &d.name,
            Declaration::Boolean(d) => &d.name,
            Declaration::Number(d) | Declaration::Time(d) | Declaration::CurrentTime(d) => &d.name,
            Declaration::Counter(d) => &d.name,
            Declaration::Timer(d) => &d.name,
        }
    }

    /// Build the monitoring form of a variable.
    ///
    /// `live` is the current reading for pin-backed variables; sensor variables
    /// report their cached sample instead.
    pub fn snapshot(variable: &Variable, live: Option<f64>) -> Self {
        let name = variable.name.clone();
        match &variable.kind {
            VariableKind::Io { kind, pin } => {
                let d = PinDeclaration {
                    name,
                    pin: pin.clone(),
                    value: Some(live.unwrap_or(0.0)),
                };
                match kind {
                    IoKind::DigitalInput => Declaration::DigitalInput(d),
                    IoKind::DigitalOutput => Declaration::DigitalOutput(d),
                    IoKind::AnalogInput => Declaration::AnalogInput(d),
                    IoKind::AnalogOutput => Declaration::AnalogOutput(d),
                }
            }
            VariableKind::OneWire { pin, value } => Declaration::OneWireInput(PinDeclaration {
                name,
                pin: pin.clone(),
                value: Some(*value),
            }),
            VariableKind::Adc(s) => Declaration::AdcSensor(AdcDeclaration {
                name,
                sensor_type: s.sensor_type.clone(),
                pd_sck: s.pd_sck.clone(),
                dout: s.dout.clone(),
                map_low: s.map_low,
                map_high: s.map_high,
                gain: s.gain,
                sampling_rate: s.sampling_rate.clone(),
                value: Some(s.value),
            }),
            VariableKind::Boolean(value) => Declaration::Boolean(BooleanDeclaration {
                name,
                value: *value,
            }),
            VariableKind::Number(value) => Declaration::Number(NumberDeclaration {
                name,
                value: *value,
            }),
            VariableKind::Time { kind, value } => {
                let d = NumberDeclaration {
                    name,
                    value: *value,
                };
                match kind {
                    TimeKind::Time => Declaration::Time(d),
                    TimeKind::CurrentTime => Declaration::CurrentTime(d),
                }
            }
            VariableKind::Counter(c) => Declaration::Counter(CounterDeclaration {
                name,
                pv: c.pv,
                cv: c.cv,
                cu: c.cu,
                cd: c.cd,
                qu: c.qu,
                qd: c.qd,
            }),
            VariableKind::Timer(t) => Declaration::Timer(TimerDeclaration {
                name,
                pt: t.pt,
                et: t.et,
                input: t.input,
                q: t.q,
            }),
        }
    }
}

impl From<Declaration> for Variable {
    fn from(declaration: Declaration) -> Self {
        fn io(d: PinDeclaration, kind: IoKind) -> Variable {
            Variable::new(d.name, VariableKind::Io { kind, pin: d.pin })
        }
        fn time(d: NumberDeclaration, kind: TimeKind) -> Variable {
            Variable::new(
                d.name,
                VariableKind::Time {
                    kind,
                    value: d.value,
                },
            )
        }

        match declaration {
            Declaration::DigitalInput(d) => io(d, IoKind::DigitalInput),
            Declaration::DigitalOutput(d) => io(d, IoKind::DigitalOutput),
            Declaration::AnalogInput(d) => io(d, IoKind::AnalogInput),
            Declaration::AnalogOutput(d) => io(d, IoKind::AnalogOutput),
            Declaration::OneWireInput(d) => Variable::new(
                d.name,
                VariableKind::OneWire {
                    pin: d.pin,
                    value: d.value.unwrap_or(0.0),
                },
            ),
            Declaration::AdcSensor(d) => Variable::new(
                d.name,
                VariableKind::Adc(AdcSensor {
                    sensor_type: d.sensor_type,
                    pd_sck: d.pd_sck,
                    dout: d.dout,
                    map_low: d.map_low,
                    map_high: d.map_high,
                    gain: d.gain,
                    sampling_rate: d.sampling_rate,
                    value: d.value.unwrap_or(0.0),
                }),
            ),
            Declaration::Boolean(d) => Variable::new(d.name, VariableKind::Boolean(d.value)),
            Declaration::Number(d) => Variable::new(d.name, VariableKind::Number(d.value)),
            Declaration::Time(d) => time(d, TimeKind::Time),
            Declaration::CurrentTime(d) => time(d, TimeKind::CurrentTime),
            Declaration::Counter(d) => Variable::new(
                d.name,
                VariableKind::Counter(Counter {
                    pv: d.pv,
                    cv: d.cv,
                    cu: d.cu,
                    cd: d.cd,
                    qu: d.qu,
                    qd: d.qd,
                }),
            ),
            Declaration::Timer(d) => Variable::new(
                d.name,
                VariableKind::Timer(Timer {
                    pt: d.pt,
                    et: d.et,
                    input: d.input,
                    q: d.q,
                }),
            ),
        }
    }
}
