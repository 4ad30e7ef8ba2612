//! ladderd: host runner for ladder programs
//!
//! Runs the scan engine against simulated I/O built from the configuration's
//! `Device` section.

pub mod assign;
pub mod sim;

pub use assign::{AssignError, Assignment, parse_assignment, update_object};
pub use sim::{PinRole, SimulatedIo};
