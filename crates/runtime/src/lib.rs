//! Ladder Runtime: the scan engine for JSON-encoded ladder programs
//!
//! Key design principles:
//! - Program: each `Wires` entry parses into an owned node tree once, at
//!   configuration time; scans never touch JSON
//! - Process image: the variable store plus the edge and timer tables, shared
//!   by all scan units behind one mutex and locked for exactly one scan
//! - Scheduler: one May coroutine per wire, stopped and joined before any
//!   reconfiguration touches the image
//! - Fail closed on malformed nodes, fail open on unknown element types,
//!   never fail a scan on an unresolved variable
//!
//! # Example
//!
//! ```
//! use ladder_core::MemoryIo;
//! use ladder_runtime::{Engine, EngineConfig};
//! use std::sync::Arc;
//!
//! let engine = Engine::builder()
//!     .io(Arc::new(MemoryIo::new()))
//!     .config(EngineConfig::default())
//!     .build();
//! let outcome = engine.configure(br#"{"Variables": [], "Wires": []}"#, false);
//! assert!(outcome.is_applied());
//! ```

pub mod config;
pub mod configure;
#[cfg(feature = "diagnostics")]
pub mod diagnostics;
pub mod elements;
pub mod engine;
pub mod error;
pub mod image;
pub mod persist;
pub mod program;
pub mod scan;
pub mod scheduler;
pub mod stats;
pub mod triggers;

pub use config::EngineConfig;
pub use configure::{ConfigureOutcome, ConfigureSummary};
pub use engine::{Engine, EngineBuilder};
pub use error::{ConfigureError, PersistError, ProgramError, SchedulerError};
pub use image::{ProcessImage, SharedImage};
pub use persist::{ConfigStore, FileConfigStore, MemoryConfigStore};
pub use program::{Program, Wire};
pub use stats::StatsSnapshot;
