//! Sheet templates and element data injection

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cell::{parse_number, Cell, CellRef, CellValue};
use crate::sheet::Sheet;

/// Layout carried by a template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateStyles {
    #[serde(default)]
    pub column_widths: BTreeMap<u16, u32>,
    #[serde(default)]
    pub row_heights: BTreeMap<u32, u32>,
    #[serde(default)]
    pub hidden_rows: Vec<u32>,
    #[serde(default)]
    pub hidden_columns: Vec<u16>,
}

/// A reusable sheet layout: cells plus styles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub cells: BTreeMap<CellRef, Cell>,
    #[serde(default)]
    pub cells_styles: TemplateStyles,
}

impl Template {
    /// Parse a template from JSON
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One value of the element a sheet is being filled for
///
/// Cells whose `elementKey` equals `key` receive `value`. With `type == "number"`
/// the value is stored as a number when it parses as one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementValue {
    pub key: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl ElementValue {
    /// Convenience constructor
    pub fn new<K: Into<String>, T: Into<String>>(
        key: K,
        kind: T,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            key: key.into(),
            kind: kind.into(),
            value: value.into(),
        }
    }

    /// Text form of the value; `None` for null
    fn text(&self) -> Option<String> {
        match &self.value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn computed(&self, text: &str) -> CellValue {
        if self.kind == "number" {
            if let Some(n) = parse_number(text) {
                return CellValue::Number(n);
            }
        }
        CellValue::from(text)
    }
}

/// Overwrite element-keyed cells with matching element data
fn inject_elements(cells: &mut BTreeMap<CellRef, Cell>, elements: &[ElementValue]) {
    for cell in cells.values_mut() {
        let Some(key) = cell.element_key.as_deref() else {
            continue;
        };
        let Some(element) = elements.iter().find(|e| e.key == key) else {
            continue;
        };
        let Some(text) = element.text() else {
            continue;
        };
        cell.computed = element.computed(&text);
        cell.formula = text.clone();
        cell.raw_input = text;
    }
}

impl Sheet {
    /// Replace this sheet's cells and layout with a template.
    ///
    /// Cells are deep-copied and element data injected; column widths and row
    /// heights are copied; template hidden rows/columns are taken from the
    /// template and the user hidden sets are cleared. Computed values of
    /// formula cells are stale until the sheet is recalculated.
    pub fn apply_template(&mut self, template: &Template, elements: &[ElementValue]) {
        let mut cells = template.cells.clone();
        inject_elements(&mut cells, elements);

        self.cells = cells;
        self.column_widths = template.cells_styles.column_widths.clone();
        self.row_heights = template.cells_styles.row_heights.clone();
        self.template_hidden_rows = template.cells_styles.hidden_rows.iter().copied().collect();
        self.template_hidden_columns = template
            .cells_styles
            .hidden_columns
            .iter()
            .copied()
            .collect();
        self.hidden_rows.clear();
        self.hidden_columns.clear();
    }
}
