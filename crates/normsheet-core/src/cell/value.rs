//! Cell value types

use lazy_regex::regex_is_match;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The computed value of a cell
///
/// In JSON a computed value is either a number or a string. The empty string is
/// [`CellValue::Empty`] and a string spelling one of the known error codes is a
/// [`CellValue::Error`]; any other string is text.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// Empty cell (no value)
    #[default]
    Empty,

    /// Numeric value
    Number(f64),

    /// Text value
    Text(String),

    /// Error marker produced by evaluation (#ERROR, #MISSING_ARGS, ...)
    Error(CellError),
}

impl CellValue {
    /// Create a new text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        CellValue::Text(s.into())
    }

    /// Coerce a literal (non-formula) input.
    ///
    /// Blank input is empty, numeric-looking input becomes a number and
    /// anything else is kept verbatim as text.
    pub fn from_literal(input: &str) -> Self {
        if input.trim().is_empty() {
            CellValue::Empty
        } else if let Some(n) = parse_number(input) {
            CellValue::Number(n)
        } else {
            CellValue::Text(input.to_string())
        }
    }

    /// Check if the value is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Check if the value is an error marker
    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }

    /// Try to get the value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get the value as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the error code
    pub fn as_error(&self) -> Option<CellError> {
        match self {
            CellValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Numeric value of the cell, or 0 for anything that is not a number
    pub fn number_or_zero(&self) -> f64 {
        self.as_number().unwrap_or(0.0)
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Empty => "empty",
            CellValue::Number(_) => "number",
            CellValue::Text(_) => "text",
            CellValue::Error(_) => "error",
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{}", format_number(*n)),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Error(e) => write!(f, "{}", e),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::from_json_str(s)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::from_json_str(&s)
    }
}

impl From<CellError> for CellValue {
    fn from(e: CellError) -> Self {
        CellValue::Error(e)
    }
}

impl CellValue {
    fn from_json_str(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else if let Some(e) = CellError::from_str(s) {
            CellValue::Error(e)
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CellValue::Empty => serializer.serialize_str(""),
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Error(e) => serializer.serialize_str(e.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct CellValueVisitor;

        impl<'de> Visitor<'de> for CellValueVisitor {
            type Value = CellValue;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a number or a string")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<CellValue, E> {
                Ok(CellValue::Number(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<CellValue, E> {
                Ok(CellValue::Number(v as f64))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<CellValue, E> {
                Ok(CellValue::Number(v as f64))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<CellValue, E> {
                Ok(CellValue::from_json_str(v))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<CellValue, E> {
                Ok(CellValue::Text(if v { "true" } else { "false" }.into()))
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<CellValue, E> {
                Ok(CellValue::Empty)
            }

            fn visit_none<E: de::Error>(self) -> std::result::Result<CellValue, E> {
                Ok(CellValue::Empty)
            }
        }

        deserializer.deserialize_any(CellValueVisitor)
    }
}

/// Error markers a formula can evaluate to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellError {
    /// #ERROR - parse failure, arithmetic failure, remote failure
    Error,
    /// #FUNCTION_NOT_FOUND - call to an unknown function
    FunctionNotFound,
    /// #MISSING_ARGS - custom function called without (enough) arguments
    MissingArgs,
    /// #MISSING_ARGUMENT - empty argument passed to the remote bridge
    MissingArgument,
    /// #INVALID_ARGUMENT - argument that is neither a reference nor a number
    InvalidArgument,
}

impl CellError {
    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            CellError::Error => "#ERROR",
            CellError::FunctionNotFound => "#FUNCTION_NOT_FOUND",
            CellError::MissingArgs => "#MISSING_ARGS",
            CellError::MissingArgument => "#MISSING_ARGUMENT",
            CellError::InvalidArgument => "#INVALID_ARGUMENT",
        }
    }

    /// Parse an error from its display string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "#ERROR" => Some(CellError::Error),
            "#FUNCTION_NOT_FOUND" => Some(CellError::FunctionNotFound),
            "#MISSING_ARGS" => Some(CellError::MissingArgs),
            "#MISSING_ARGUMENT" => Some(CellError::MissingArgument),
            "#INVALID_ARGUMENT" => Some(CellError::InvalidArgument),
            _ => None,
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parse numeric-looking text (`42`, `-3.5`, `.5`, `1e3`), ignoring surrounding whitespace
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if regex_is_match!(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$", text) {
        text.parse().ok()
    } else {
        None
    }
}

/// Format a number the way it is shown in a cell: integers without a fraction
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
