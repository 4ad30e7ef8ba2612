//! Ladder element semantics
//!
//! One function per element family, each operating on the process image.
//! Elements never fail: a reference to a missing variable reads as
//! `false`/`0.0`, and an element pointed at a variable of the wrong kind
//! (a counter element on a Number, say) does nothing and returns its neutral
//! value. Both cases are logged once per configuration.
//!
//! Timer times are milliseconds; elapsed time is derived from the image clock.

use crate::image::ProcessImage;
use ladder_core::{Counter, Timer, VariableKind};
use tracing::{debug, trace, warn};

/// Divisors closer to zero than this leave the target unchanged
pub const DIVISOR_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
    Equal,
    NotEqual,
}

impl CompareOp {
    pub fn apply(self, a: f64, b: f64) -> bool {
        match self {
            CompareOp::Greater => a > b,
            CompareOp::Less => a < b,
            CompareOp::GreaterOrEqual => a >= b,
            CompareOp::LessOrEqual => a <= b,
            CompareOp::Equal => a == b,
            CompareOp::NotEqual => a != b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// Normally-open contact. Passes power while the variable reads false.
pub fn no_contact(image: &ProcessImage, var: &str) -> bool {
    !image.store.read_bool(var)
}

/// Normally-closed contact. Passes power while the variable reads true.
pub fn nc_contact(image: &ProcessImage, var: &str) -> bool {
    image.store.read_bool(var)
}

pub fn compare(image: &ProcessImage, op: CompareOp, a: &str, b: &str) -> bool {
    op.apply(image.store.read_number(a), image.store.read_number(b))
}

pub fn coil(image: &mut ProcessImage, var: &str, cond: bool) {
    image.store.write_bool(var, cond);
}

/// Writes true for exactly one scan per false-to-true transition of `cond`
pub fn one_shot_positive_coil(image: &mut ProcessImage, var: &str, cond: bool) {
    let pulse = image.edges.rising(var, cond);
    image.store.write_bool(var, pulse);
}

pub fn set_coil(image: &mut ProcessImage, var: &str, cond: bool) {
    if cond {
        image.store.write_bool(var, true);
    }
}

pub fn reset_coil(image: &mut ProcessImage, var: &str, cond: bool) {
    if cond {
        image.store.write_bool(var, false);
    }
}

/// `c = a OP b` on the rising edge of `cond`, keyed by `c`
pub fn math(image: &mut ProcessImage, op: MathOp, a: &str, b: &str, c: &str, cond: bool) {
    if !image.edges.rising(c, cond) {
        return;
    }
    let lhs = image.store.read_number(a);
    let rhs = image.store.read_number(b);
    let result = match op {
        MathOp::Add => lhs + rhs,
        MathOp::Subtract => lhs - rhs,
        MathOp::Multiply => lhs * rhs,
        MathOp::Divide => {
            if rhs.abs() < DIVISOR_EPSILON {
                warn!(dividend = a, divisor = b, value = rhs, "division by near-zero skipped");
                return;
            }
            lhs / rhs
        }
    };
    debug!(?op, a, b, c, result, "math");
    image.store.write_number(c, result);
}

/// Copy `from` into `to`. Runs every scan regardless of power flow.
pub fn move_value(image: &mut ProcessImage, from: &str, to: &str) {
    let value = image.store.read_number(from);
    image.store.write_number(to, value);
}

pub fn count_up(image: &mut ProcessImage, var: &str, cond: bool) {
    if image.edges.rising(var, cond) {
        with_counter(image, var, "CountUp", Counter::count_up);
    }
}

pub fn count_down(image: &mut ProcessImage, var: &str, cond: bool) {
    if image.edges.rising(var, cond) {
        with_counter(image, var, "CountDown", Counter::count_down);
    }
}

fn with_counter(
    image: &mut ProcessImage,
    var: &str,
    element: &'static str,
    f: fn(&mut Counter),
) {
    if let Some(counter) = image.store.counter_mut(var) {
        f(counter);
        trace!(counter = var, cv = counter.cv, "{}", element);
        return;
    }
    wrong_kind(image, element, var, "Counter");
}

/// On-delay timer. `Q` goes true once `cond` has been held for `PT` ms and
/// stays true until `cond` drops.
pub fn timer_on(image: &mut ProcessImage, var: &str, cond: bool) -> bool {
    if !is_timer(image, var) {
        wrong_kind(image, "OnDelayTimer", var, "Timer");
        return false;
    }
    let now = image.now_micros();
    let ProcessImage { store, timers, .. } = &mut *image;
    let (Some(slot), Some(timer)) = (timers.slot(var), store.timer_mut(var)) else {
        return false;
    };

    timer.input = cond;
    if timer.pt <= 0.0 {
        timer.et = 0.0;
        timer.q = false;
        slot.running = false;
        return false;
    }

    if cond {
        if !slot.running && !timer.q {
            slot.start_micros = now;
            slot.running = true;
        }
        if slot.running {
            advance(timer, &mut slot.running, slot.start_micros, now);
            timer.q = timer.et >= timer.pt;
        } else {
            timer.et = timer.pt;
            timer.q = true;
        }
    } else {
        timer.et = 0.0;
        timer.q = false;
        slot.running = false;
    }
    timer.q
}

/// Off-delay timer. `Q` follows `cond` up immediately and drops `PT` ms
/// after `cond` falls.
pub fn timer_off(image: &mut ProcessImage, var: &str, cond: bool) -> bool {
    if !is_timer(image, var) {
        wrong_kind(image, "OffDelayTimer", var, "Timer");
        return false;
    }
    let now = image.now_micros();
    let ProcessImage { store, timers, .. } = &mut *image;
    let (Some(slot), Some(timer)) = (timers.slot(var), store.timer_mut(var)) else {
        return false;
    };

    timer.input = cond;
    if timer.pt <= 0.0 {
        timer.et = 0.0;
        timer.q = cond;
        slot.running = false;
        return timer.q;
    }

    if cond {
        timer.q = true;
        timer.et = 0.0;
        slot.running = false;
    } else {
        if !slot.running && timer.q {
            slot.start_micros = now;
            slot.running = true;
        }
        if slot.running {
            advance(timer, &mut slot.running, slot.start_micros, now);
            timer.q = timer.et < timer.pt;
        } else if !timer.q {
            timer.et = 0.0;
        }
    }
    timer.q
}

/// Update ET from the start time, clamping at PT and stopping the run there
fn advance(timer: &mut Timer, running: &mut bool, start_micros: i64, now: i64) {
    timer.et = (now - start_micros) as f64 / 1000.0;
    if timer.et > timer.pt {
        timer.et = timer.pt;
        *running = false;
    }
}

/// Reset a counter or timer on the rising edge of `cond`
pub fn reset(image: &mut ProcessImage, var: &str, cond: bool) {
    if !image.edges.rising(var, cond) {
        return;
    }
    if let Some(counter) = image.store.counter_mut(var) {
        counter.reset();
        debug!(counter = var, cv = counter.cv, "counter reset");
        return;
    }
    if !is_timer(image, var) {
        wrong_kind(image, "Reset", var, "Counter or Timer");
        return;
    }
    let ProcessImage { store, timers, .. } = &mut *image;
    if let (Some(slot), Some(timer)) = (timers.slot(var), store.timer_mut(var)) {
        timer.clear();
        slot.running = false;
        debug!(timer = var, "timer reset");
    }
}

fn is_timer(image: &ProcessImage, var: &str) -> bool {
    matches!(
        image.store.find(var).map(|v| &v.kind),
        Some(VariableKind::Timer(_))
    )
}

fn wrong_kind(image: &mut ProcessImage, element: &'static str, var: &str, expected: &str) {
    if image.first_report(element, var) {
        match image.store.find(var) {
            Some(found) => warn!(
                element,
                variable = var,
                found = found.type_tag(),
                "{} expects a {} variable",
                element,
                expected
            ),
            None => warn!(element, variable = var, "{} references an unknown variable", element),
        }
    }
}
