//! `NAME=VALUE` command-line assignments

use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignError {
    MissingEquals(String),
    EmptyName(String),
    BadValue { name: String, value: String },
}

impl fmt::Display for AssignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignError::MissingEquals(arg) => write!(f, "expected NAME=VALUE, got '{}'", arg),
            AssignError::EmptyName(arg) => write!(f, "empty name in '{}'", arg),
            AssignError::BadValue { name, value } => write!(
                f,
                "value for '{}' must be true, false or a number, got '{}'",
                name, value
            ),
        }
    }
}

impl std::error::Error for AssignError {}

/// Parse `NAME=VALUE` where VALUE is `true`, `false` or a finite number
pub fn parse_assignment(arg: &str) -> Result<Assignment, AssignError> {
    let (name, raw) = arg
        .split_once('=')
        .ok_or_else(|| AssignError::MissingEquals(arg.to_string()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(AssignError::EmptyName(arg.to_string()));
    }
    let raw = raw.trim();
    let value = match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| AssignError::BadValue {
                name: name.to_string(),
                value: raw.to_string(),
            })?,
    };
    Ok(Assignment {
        name: name.to_string(),
        value,
    })
}

impl Assignment {
    /// Numeric level for a pin; booleans become 1/0
    pub fn level(&self) -> f64 {
        match &self.value {
            Value::Bool(b) => f64::from(u8::from(*b)),
            other => other.as_f64().unwrap_or(0.0),
        }
    }
}

/// Collect assignments into the flat object a remote update expects
pub fn update_object(assignments: &[Assignment]) -> Value {
    let mut map = Map::new();
    for a in assignments {
        map.insert(a.name.clone(), a.value.clone());
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_values() {
        assert_eq!(parse_assignment("Run=true").unwrap().value, json!(true));
        assert_eq!(parse_assignment(" Sp = 2.5 ").unwrap().value, json!(2.5));
        assert_eq!(parse_assignment("Sp=-4").unwrap().level(), -4.0);
        assert_eq!(parse_assignment("I0=false").unwrap().level(), 0.0);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_assignment("Run"),
            Err(AssignError::MissingEquals(_))
        ));
        assert!(matches!(parse_assignment("=1"), Err(AssignError::EmptyName(_))));
        assert!(matches!(
            parse_assignment("Run=yes"),
            Err(AssignError::BadValue { .. })
        ));
        assert!(matches!(
            parse_assignment("Run=NaN"),
            Err(AssignError::BadValue { .. })
        ));
    }

    #[test]
    fn test_update_object() {
        let items = vec![
            parse_assignment("A=true").unwrap(),
            parse_assignment("B=3").unwrap(),
        ];
        assert_eq!(update_object(&items), json!({"A": true, "B": 3.0}));
    }
}
