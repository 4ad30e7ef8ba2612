//! Ladder Core: typed variables and the contracts the scan engine runs against
//!
//! This crate holds everything a ladder program reads and writes, independent
//! of how programs are scheduled:
//!
//! - Variables are a closed set of kinds (pin-backed I/O, sensors, Boolean,
//!   Number, Counter, Timer, Time) addressed by name, with `.FIELD` suffixes
//!   reaching Counter/Timer sub-fields.
//! - The store forwards pin-backed variables to a `PinIo` implementation and
//!   never fails on access; unresolved references read as `false`/`0.0`.
//! - Timers measure elapsed time through a `Clock`.
//!
//! # Modules
//!
//! - `address`: `Name.SUFFIX` parsing
//! - `variable`: Variable kinds, Counter and Timer records
//! - `declaration`: JSON declaration and monitoring shapes
//! - `store`: The variable store
//! - `io`: Pin I/O trait, in-memory and null implementations
//! - `clock`: Monotonic and manual clocks
//! - `error`: Store load errors

pub mod address;
pub mod clock;
pub mod declaration;
pub mod error;
pub mod io;
pub mod store;
pub mod variable;

pub use address::{Address, Field};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use declaration::Declaration;
pub use error::LoadError;
pub use io::{IoError, MemoryIo, NullIo, PinIo};
pub use store::{VariableStore, dac_level};
pub use variable::{AdcSensor, Counter, IoKind, TimeKind, Timer, Variable, VariableKind};
