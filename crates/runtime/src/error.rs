//! Engine error types
//!
//! None of these ever reach a running scan unit. Program and load errors
//! reject a configuration; scheduler errors abort a batch of spawns; persist
//! errors are logged by the engine and otherwise ignored.

use ladder_core::LoadError;
use std::fmt;

/// The `Wires` section could not be turned into a program
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramError {
    /// `Wires` is missing or not an array
    NotAnArray,
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramError::NotAnArray => write!(f, "Wires is not an array"),
        }
    }
}

impl std::error::Error for ProgramError {}

#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerError {
    /// The whole batch would not fit in the memory budget or free memory
    InsufficientMemory {
        units: usize,
        required: usize,
        budget: usize,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::InsufficientMemory {
                units,
                required,
                budget,
            } => write!(
                f,
                "insufficient memory for {} scan units: need {} bytes, budget is {}",
                units, required, budget
            ),
        }
    }
}

impl std::error::Error for SchedulerError {}

#[derive(Debug)]
pub enum PersistError {
    Io(std::io::Error),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::Io(e) => write!(f, "configuration store I/O error: {}", e),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistError::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for PersistError {
    fn from(e: std::io::Error) -> Self {
        PersistError::Io(e)
    }
}

/// Why a complete configuration document was not applied
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigureError {
    /// The document parsed but is not a JSON object
    NotAnObject,
    Variables(LoadError),
    Program(ProgramError),
    Scheduler(SchedulerError),
}

impl fmt::Display for ConfigureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigureError::NotAnObject => write!(f, "configuration is not a JSON object"),
            ConfigureError::Variables(e) => write!(f, "Variables: {}", e),
            ConfigureError::Program(e) => write!(f, "{}", e),
            ConfigureError::Scheduler(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ConfigureError {}

impl From<LoadError> for ConfigureError {
    fn from(e: LoadError) -> Self {
        ConfigureError::Variables(e)
    }
}

impl From<ProgramError> for ConfigureError {
    fn from(e: ProgramError) -> Self {
        ConfigureError::Program(e)
    }
}

impl From<SchedulerError> for ConfigureError {
    fn from(e: SchedulerError) -> Self {
        ConfigureError::Scheduler(e)
    }
}

/// Format a panic payload into an error message
pub fn format_panic_payload(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_panic_payload() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(format_panic_payload(&payload), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(format_panic_payload(&payload), "owned");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(format_panic_payload(&payload), "unknown panic");
    }

    #[test]
    fn test_configure_error_display() {
        let e = ConfigureError::from(SchedulerError::InsufficientMemory {
            units: 3,
            required: 4096,
            budget: 1024,
        });
        assert_eq!(
            e.to_string(),
            "insufficient memory for 3 scan units: need 4096 bytes, budget is 1024"
        );
        assert_eq!(
            ConfigureError::from(LoadError::NotAnArray).to_string(),
            "Variables: Variables must be an array"
        );
    }
}
