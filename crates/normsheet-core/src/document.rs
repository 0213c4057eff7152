//! JSON documents for sheets and workbooks
//!
//! Documents are the serialized boundary of the model. Hidden rows, columns and
//! cells are sets in memory and sorted lists on the wire.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellRange, CellRef};
use crate::error::Result;
use crate::function::CustomFunctionDefinition;
use crate::instance::Instance;
use crate::sheet::Sheet;
use crate::workbook::WorkbookStore;

/// Serialized form of a [`Sheet`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetDocument {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub cells: BTreeMap<CellRef, Cell>,
    #[serde(default)]
    pub column_widths: BTreeMap<u16, u32>,
    #[serde(default)]
    pub row_heights: BTreeMap<u32, u32>,
    #[serde(default, alias = "userHiddenRows")]
    pub hidden_rows: Vec<u32>,
    #[serde(default, alias = "userHiddenColumns")]
    pub hidden_columns: Vec<u16>,
    #[serde(default)]
    pub template_hidden_rows: Vec<u32>,
    #[serde(default)]
    pub template_hidden_columns: Vec<u16>,
    #[serde(default)]
    pub hidden_cells: Vec<CellRef>,
    #[serde(default)]
    pub freeze_row: u32,
    #[serde(default)]
    pub freeze_column: u16,
    #[serde(default)]
    pub merged_regions: Vec<CellRange>,
}

impl From<&Sheet> for SheetDocument {
    fn from(sheet: &Sheet) -> Self {
        Self {
            id: sheet.id.clone(),
            name: sheet.name.clone(),
            cells: sheet.cells.clone(),
            column_widths: sheet.column_widths.clone(),
            row_heights: sheet.row_heights.clone(),
            hidden_rows: sheet.hidden_rows.iter().copied().collect(),
            hidden_columns: sheet.hidden_columns.iter().copied().collect(),
            template_hidden_rows: sheet.template_hidden_rows.iter().copied().collect(),
            template_hidden_columns: sheet.template_hidden_columns.iter().copied().collect(),
            hidden_cells: sheet.hidden_cells.iter().copied().collect(),
            freeze_row: sheet.freeze_row,
            freeze_column: sheet.freeze_column,
            merged_regions: sheet.merged_regions.clone(),
        }
    }
}

impl SheetDocument {
    /// Build the in-memory sheet. Overlapping merged regions are rejected.
    pub fn into_sheet(self) -> Result<Sheet> {
        let mut sheet = Sheet {
            id: self.id,
            name: self.name,
            cells: self.cells,
            column_widths: self.column_widths,
            row_heights: self.row_heights,
            hidden_rows: self.hidden_rows.into_iter().collect(),
            hidden_columns: self.hidden_columns.into_iter().collect(),
            template_hidden_rows: self.template_hidden_rows.into_iter().collect(),
            template_hidden_columns: self.template_hidden_columns.into_iter().collect(),
            hidden_cells: self.hidden_cells.into_iter().collect(),
            freeze_row: self.freeze_row,
            freeze_column: self.freeze_column,
            merged_regions: Vec::new(),
        };
        for region in &self.merged_regions {
            sheet.merge_cells(region)?;
        }
        Ok(sheet)
    }
}

/// Serialized form of an [`Instance`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDocument {
    #[serde(rename = "instanceId", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub sheets: Vec<SheetDocument>,
}

impl From<&Instance> for InstanceDocument {
    fn from(instance: &Instance) -> Self {
        Self {
            id: instance.id().to_string(),
            sheets: instance.sheets().map(SheetDocument::from).collect(),
        }
    }
}

impl InstanceDocument {
    /// Build the in-memory instance
    pub fn into_instance(self) -> Result<Instance> {
        let mut instance = Instance::empty(self.id);
        for sheet in self.sheets {
            instance.push_sheet(sheet.into_sheet()?)?;
        }
        if instance.sheet_count() == 0 {
            instance.add_sheet();
        }
        Ok(instance)
    }
}

/// A whole workbook store plus the custom functions its formulas may call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookDocument {
    #[serde(default)]
    pub instances: Vec<InstanceDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<CustomFunctionDefinition>,
}

impl WorkbookDocument {
    /// Parse a workbook document from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Snapshot a store
    pub fn from_store(store: &WorkbookStore, functions: &[CustomFunctionDefinition]) -> Self {
        Self {
            instances: store.instances().map(InstanceDocument::from).collect(),
            functions: functions.to_vec(),
        }
    }

    /// Build the in-memory store, returning the function definitions alongside
    pub fn into_store(self) -> Result<(WorkbookStore, Vec<CustomFunctionDefinition>)> {
        let mut store = WorkbookStore::new();
        for instance in self.instances {
            store.add_instance(instance.into_instance()?)?;
        }
        Ok((store, self.functions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    fn sample_sheet() -> Sheet {
        let mut sheet = Sheet::new("design-sheet1", "Hoja1");
        sheet.set_input("A1", "5").unwrap();
        sheet.set_input("B1", "=A1*2").unwrap();
        let b1 = CellRef::parse("B1").unwrap();
        sheet.set_computed(&b1, CellValue::Number(10.0));
        sheet.hide_row(9);
        sheet.hide_row(3);
        sheet.hide_column(2);
        sheet.hide_cell(CellRef::parse("C4").unwrap());
        sheet.set_freeze(1, 0);
        sheet.merge_cells(&CellRange::parse("D1:E2").unwrap()).unwrap();
        sheet
    }

    #[test]
    fn test_sheet_round_trip() {
        let sheet = sample_sheet();
        let json = serde_json::to_string(&SheetDocument::from(&sheet)).unwrap();
        let doc: SheetDocument = serde_json::from_str(&json).unwrap();
        let back = doc.into_sheet().unwrap();
        assert_eq!(back, sheet);
    }

    #[test]
    fn test_hidden_sets_are_sorted_lists() {
        let doc = SheetDocument::from(&sample_sheet());
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["hiddenRows"], serde_json::json!([3, 9]));
        assert_eq!(json["hiddenCells"], serde_json::json!(["C4"]));
        assert_eq!(json["mergedRegions"], serde_json::json!(["D1:E2"]));
        assert_eq!(json["cells"]["B1"]["computed"], serde_json::json!(10.0));
    }

    #[test]
    fn test_overlapping_merges_rejected() {
        let doc = SheetDocument {
            id: "s".into(),
            name: "Hoja1".into(),
            merged_regions: vec![
                CellRange::parse("A1:B2").unwrap(),
                CellRange::parse("B1:C1").unwrap(),
            ],
            ..Default::default()
        };
        assert!(matches!(
            doc.into_sheet(),
            Err(Error::MergedCellConflict(_))
        ));
    }

    #[test]
    fn test_workbook_document() {
        let json = r#"{
            "instances": [
                {"instanceId": "design", "sheets": [
                    {"id": "design-sheet1", "name": "Hoja1",
                     "cells": {"A1": {"value": "3", "formula": "3", "computed": 3}},
                     "userHiddenRows": [1]}
                ]},
                {"instanceId": "cost", "sheets": []}
            ],
            "functions": [{"code": "POT", "parameterNames": ["v"], "remoteId": 2}]
        }"#;
        let (store, functions) = WorkbookDocument::from_json(json).unwrap().into_store().unwrap();
        assert_eq!(functions.len(), 1);
        let sheet = store.sheet("design", "Hoja1").unwrap();
        assert!(sheet.is_row_hidden(1));
        assert_eq!(
            sheet.computed(&CellRef::parse("A1").unwrap()),
            CellValue::Number(3.0)
        );
        // An instance without sheets gets a fresh one
        assert_eq!(store.instance("cost").unwrap().sheet_count(), 1);

        let again = WorkbookDocument::from_store(&store, &functions);
        let (store2, _) = again.into_store().unwrap();
        assert_eq!(store2, store);
    }
}
