//! Compound variable addressing
//!
//! Ladder operands name either a whole variable (`Start`, `Tank Level`) or a
//! sub-field of a Counter/Timer (`Cnt.CV`, `T1.Q`). Only the last `.`-delimited
//! segment is considered, and only when it is one of the known suffixes;
//! otherwise the dot is part of the variable name.
//!
//! ```
//! use ladder_core::address::{Address, Field};
//!
//! let a = Address::parse("Cnt.CV");
//! assert_eq!(a.base, "Cnt");
//! assert_eq!(a.field, Some(Field::Cv));
//!
//! let b = Address::parse("Line.2");
//! assert_eq!(b.base, "Line.2");
//! assert_eq!(b.field, None);
//! ```

use std::fmt;

/// Counter and Timer sub-fields addressable through a `.SUFFIX`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Counter count-up flag
    Cu,
    /// Counter count-down flag
    Cd,
    /// Counter count-up done
    Qu,
    /// Counter count-down done
    Qd,
    /// Timer input
    In,
    /// Timer output
    Q,
    /// Counter preset value
    Pv,
    /// Counter current value
    Cv,
    /// Timer preset time (ms)
    Pt,
    /// Timer elapsed time (ms)
    Et,
}

impl Field {
    /// Parse a suffix without its leading dot
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        let field = match suffix {
            "CU" => Field::Cu,
            "CD" => Field::Cd,
            "QU" => Field::Qu,
            "QD" => Field::Qd,
            "IN" => Field::In,
            "Q" => Field::Q,
            "PV" => Field::Pv,
            "CV" => Field::Cv,
            "PT" => Field::Pt,
            "ET" => Field::Et,
            _ => return None,
        };
        Some(field)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Cu => "CU",
            Field::Cd => "CD",
            Field::Qu => "QU",
            Field::Qd => "QD",
            Field::In => "IN",
            Field::Q => "Q",
            Field::Pv => "PV",
            Field::Cv => "CV",
            Field::Pt => "PT",
            Field::Et => "ET",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed operand reference, borrowing from the original string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address<'a> {
    /// Variable name to look up
    pub base: &'a str,
    /// Sub-field, when the reference carried a known suffix
    pub field: Option<Field>,
}

impl<'a> Address<'a> {
    pub fn parse(reference: &'a str) -> Self {
        if let Some((base, suffix)) = reference.rsplit_once('.')
            && let Some(field) = Field::from_suffix(suffix)
        {
            return Address {
                base,
                field: Some(field),
            };
        }
        Address {
            base: reference,
            field: None,
        }
    }
}

impl fmt::Display for Address<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            Some(field) => write!(f, "{}.{}", self.base, field),
            None => f.write_str(self.base),
        }
    }
}
