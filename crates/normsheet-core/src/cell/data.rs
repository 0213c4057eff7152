//! Cell records

use serde::{Deserialize, Serialize};

use super::CellValue;

/// Presentation attributes carried with a cell
///
/// The engine never interprets these; they are preserved through edits,
/// template loads and document round-trips.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<String>,
}

impl CellStyle {
    /// Check if no attribute is set
    pub fn is_default(&self) -> bool {
        self == &CellStyle::default()
    }
}

/// A single cell: what the user typed plus the last computed value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    /// Input as typed by the user
    #[serde(rename = "value", alias = "rawInput", default)]
    pub raw_input: String,
    /// Formula text (`=...`) or the literal input
    #[serde(default)]
    pub formula: String,
    /// Last evaluated value
    #[serde(default)]
    pub computed: CellValue,
    #[serde(flatten)]
    pub style: CellStyle,
    /// Dropdown options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Tag used to inject element data when a template is loaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_key: Option<String>,
}

impl Cell {
    /// Create a cell from user input.
    ///
    /// The computed value is the unevaluated input until a recalculation pass
    /// commits the real one.
    pub fn from_input<S: Into<String>>(input: S) -> Self {
        let mut cell = Cell::default();
        cell.set_input(input);
        cell
    }

    /// Replace the input, keeping style and options.
    ///
    /// Literals are coerced right away; a formula keeps its own text as the
    /// computed value until it is evaluated.
    pub fn set_input<S: Into<String>>(&mut self, input: S) {
        let input = input.into();
        self.computed = if input.starts_with('=') {
            CellValue::Text(input.clone())
        } else {
            CellValue::from_literal(&input)
        };
        self.formula = input.clone();
        self.raw_input = input;
    }

    /// Check if the cell holds a formula
    pub fn is_formula(&self) -> bool {
        self.formula.starts_with('=')
    }

    /// A cell with neither formula nor computed value counts as absent
    pub fn is_absent(&self) -> bool {
        self.formula.is_empty() && self.computed.is_empty()
    }

    /// Absent and carrying nothing else worth keeping
    pub(crate) fn is_disposable(&self) -> bool {
        self.is_absent()
            && self.style.is_default()
            && self.options.is_none()
            && self.element_key.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_input() {
        let cell = Cell::from_input("=A1+1");
        assert_eq!(cell.raw_input, "=A1+1");
        assert_eq!(cell.formula, "=A1+1");
        assert!(cell.is_formula());
        assert!(!cell.is_absent());

        assert!(Cell::from_input("").is_absent());
    }

    #[test]
    fn test_json_fields() {
        let mut cell = Cell::from_input("=B1*2");
        cell.computed = CellValue::Number(8.0);
        cell.style.bold = Some(true);
        cell.element_key = Some("voltage".into());

        let json = serde_json::to_value(&cell).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "value": "=B1*2",
                "formula": "=B1*2",
                "computed": 8.0,
                "bold": true,
                "elementKey": "voltage"
            })
        );

        let back: Cell = serde_json::from_value(json).unwrap();
        assert_eq!(back, cell);
    }

    #[test]
    fn test_raw_input_alias() {
        let cell: Cell =
            serde_json::from_str(r#"{"rawInput": "5", "formula": "5", "computed": 5}"#).unwrap();
        assert_eq!(cell.raw_input, "5");
        assert_eq!(cell.computed, CellValue::Number(5.0));
        assert!(cell.style.is_default());
    }
}
