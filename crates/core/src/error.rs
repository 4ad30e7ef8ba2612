//! Variable store load errors

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    /// `Variables` is not a JSON array
    NotAnArray,
    /// The declaration at `index` could not be decoded
    Declaration { index: usize, message: String },
    /// Two declarations share a name
    DuplicateName(String),
    /// The text is not valid JSON
    Json(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotAnArray => write!(f, "Variables must be an array"),
            LoadError::Declaration { index, message } => {
                write!(f, "variable #{}: {}", index, message)
            }
            LoadError::DuplicateName(name) => {
                write!(f, "duplicate variable name '{}'", name)
            }
            LoadError::Json(message) => write!(f, "invalid JSON: {}", message),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<serde_json::Error> for LoadError {
    fn from(e: serde_json::Error) -> Self {
        LoadError::Json(e.to_string())
    }
}
