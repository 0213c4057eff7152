//! Sheet type

use std::collections::{BTreeMap, BTreeSet};

use crate::cell::{Cell, CellRange, CellRef, CellStyle, CellValue};
use crate::error::{Error, Result};
use crate::{DEFAULT_COLUMN_WIDTH, DEFAULT_ROW_HEIGHT, MIN_COLUMN_WIDTH, MIN_ROW_HEIGHT};

/// A sheet: a sparse grid of cells plus layout state
///
/// `id` is stable for the lifetime of the sheet; `name` is the display name and
/// may change. Cells iterate in row-major order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) cells: BTreeMap<CellRef, Cell>,
    pub(crate) column_widths: BTreeMap<u16, u32>,
    pub(crate) row_heights: BTreeMap<u32, u32>,
    /// Rows hidden by the user
    pub(crate) hidden_rows: BTreeSet<u32>,
    /// Columns hidden by the user
    pub(crate) hidden_columns: BTreeSet<u16>,
    /// Rows hidden by the template the sheet was loaded from
    pub(crate) template_hidden_rows: BTreeSet<u32>,
    /// Columns hidden by the template the sheet was loaded from
    pub(crate) template_hidden_columns: BTreeSet<u16>,
    pub(crate) hidden_cells: BTreeSet<CellRef>,
    pub(crate) freeze_row: u32,
    pub(crate) freeze_column: u16,
    pub(crate) merged_regions: Vec<CellRange>,
}

impl Sheet {
    /// Create an empty sheet
    pub fn new<I: Into<String>, N: Into<String>>(id: I, name: N) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Get the stable sheet id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the display name
    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    /// Check whether `key` names this sheet, by id or by display name
    pub fn matches(&self, key: &str) -> bool {
        self.id == key || self.name == key
    }

    // === Cells ===

    /// Get a cell
    pub fn cell(&self, cell: &CellRef) -> Option<&Cell> {
        self.cells.get(cell)
    }

    /// Get a cell by A1-style address
    pub fn cell_at(&self, address: &str) -> Result<Option<&Cell>> {
        let cell = CellRef::parse(address)?;
        Ok(self.cells.get(&cell))
    }

    /// Get the computed value of a cell (empty when absent)
    pub fn computed(&self, cell: &CellRef) -> CellValue {
        self.cells
            .get(cell)
            .map(|c| c.computed.clone())
            .unwrap_or(CellValue::Empty)
    }

    /// Iterate over all stored cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = (&CellRef, &Cell)> {
        self.cells.iter()
    }

    /// Iterate over the stored cells inside a range, in row-major order
    pub fn cells_in<'s>(
        &'s self,
        range: &CellRange,
    ) -> impl Iterator<Item = (&'s CellRef, &'s Cell)> + 's {
        let range = *range;
        self.cells
            .range(range.start..=range.end)
            .filter(move |(cell, _)| range.contains(cell))
    }

    /// Number of stored cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Check if the sheet holds no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Write user input to a cell.
    ///
    /// The cell is created on first write. Empty input on a cell with no style,
    /// options or element key removes it.
    pub fn set_cell_input<S: Into<String>>(&mut self, cell: CellRef, input: S) {
        let entry = self.cells.entry(cell).or_default();
        entry.set_input(input);
        if entry.is_disposable() {
            self.cells.remove(&cell);
        }
    }

    /// Write user input by A1-style address
    pub fn set_input(&mut self, address: &str, input: &str) -> Result<()> {
        let cell = CellRef::parse(address)?;
        self.set_cell_input(cell, input);
        Ok(())
    }

    /// Store an evaluated value. Returns false if the cell no longer exists.
    pub fn set_computed(&mut self, cell: &CellRef, value: CellValue) -> bool {
        match self.cells.get_mut(cell) {
            Some(c) => {
                c.computed = value;
                true
            }
            None => false,
        }
    }

    /// Remove a cell entirely
    pub fn remove_cell(&mut self, cell: &CellRef) -> Option<Cell> {
        self.cells.remove(cell)
    }

    /// Insert a complete cell record, replacing any existing one
    pub fn insert_cell(&mut self, cell: CellRef, data: Cell) {
        self.cells.insert(cell, data);
    }

    /// Set the style of a cell, creating it if needed
    pub fn set_cell_style(&mut self, cell: CellRef, style: CellStyle) {
        self.cells.entry(cell).or_default().style = style;
    }

    /// Set the dropdown options of a cell, creating it if needed
    pub fn set_cell_options(&mut self, cell: CellRef, options: Option<Vec<String>>) {
        self.cells.entry(cell).or_default().options = options;
    }

    // === Hidden rows, columns and cells ===

    /// Hide a row
    pub fn hide_row(&mut self, row: u32) {
        self.hidden_rows.insert(row);
    }

    /// Unhide a row hidden by the user
    pub fn unhide_row(&mut self, row: u32) -> bool {
        self.hidden_rows.remove(&row)
    }

    /// Unhide every row hidden by the user
    pub fn unhide_all_rows(&mut self) {
        self.hidden_rows.clear();
    }

    /// Hide a column
    pub fn hide_column(&mut self, col: u16) {
        self.hidden_columns.insert(col);
    }

    /// Unhide a column hidden by the user
    pub fn unhide_column(&mut self, col: u16) -> bool {
        self.hidden_columns.remove(&col)
    }

    /// Unhide every column hidden by the user
    pub fn unhide_all_columns(&mut self) {
        self.hidden_columns.clear();
    }

    /// Hidden by the user or by the template
    pub fn is_row_hidden(&self, row: u32) -> bool {
        self.hidden_rows.contains(&row) || self.template_hidden_rows.contains(&row)
    }

    /// Hidden by the user or by the template
    pub fn is_column_hidden(&self, col: u16) -> bool {
        self.hidden_columns.contains(&col) || self.template_hidden_columns.contains(&col)
    }

    /// Rows hidden by the user
    pub fn hidden_rows(&self) -> &BTreeSet<u32> {
        &self.hidden_rows
    }

    /// Columns hidden by the user
    pub fn hidden_columns(&self) -> &BTreeSet<u16> {
        &self.hidden_columns
    }

    pub fn template_hidden_rows(&self) -> &BTreeSet<u32> {
        &self.template_hidden_rows
    }

    pub fn template_hidden_columns(&self) -> &BTreeSet<u16> {
        &self.template_hidden_columns
    }

    /// Hide a single cell
    pub fn hide_cell(&mut self, cell: CellRef) {
        self.hidden_cells.insert(cell);
    }

    /// Unhide a single cell
    pub fn unhide_cell(&mut self, cell: &CellRef) -> bool {
        self.hidden_cells.remove(cell)
    }

    pub fn is_cell_hidden(&self, cell: &CellRef) -> bool {
        self.hidden_cells.contains(cell)
    }

    // === Dimensions ===

    /// Get the width of a column in pixels
    pub fn column_width(&self, col: u16) -> u32 {
        self.column_widths
            .get(&col)
            .copied()
            .unwrap_or(DEFAULT_COLUMN_WIDTH)
    }

    /// Set the width of a column, clamped to [`MIN_COLUMN_WIDTH`]
    pub fn set_column_width(&mut self, col: u16, width: u32) {
        self.column_widths.insert(col, width.max(MIN_COLUMN_WIDTH));
    }

    /// Get the height of a row in pixels
    pub fn row_height(&self, row: u32) -> u32 {
        self.row_heights
            .get(&row)
            .copied()
            .unwrap_or(DEFAULT_ROW_HEIGHT)
    }

    /// Set the height of a row, clamped to [`MIN_ROW_HEIGHT`]
    pub fn set_row_height(&mut self, row: u32, height: u32) {
        self.row_heights.insert(row, height.max(MIN_ROW_HEIGHT));
    }

    // === Freeze panes ===

    /// Freeze the first `rows` rows and `cols` columns (0 unfreezes)
    pub fn set_freeze(&mut self, rows: u32, cols: u16) {
        self.freeze_row = rows;
        self.freeze_column = cols;
    }

    /// Frozen (rows, columns)
    pub fn freeze(&self) -> (u32, u16) {
        (self.freeze_row, self.freeze_column)
    }

    // === Merged cells ===

    /// Get merged regions
    pub fn merged_regions(&self) -> &[CellRange] {
        &self.merged_regions
    }

    /// Merge cells
    pub fn merge_cells(&mut self, range: &CellRange) -> Result<()> {
        if range.is_single() {
            return Err(Error::InvalidRange(range.to_string()));
        }
        if self.merged_regions.iter().any(|r| r.overlaps(range)) {
            return Err(Error::MergedCellConflict(range.to_string()));
        }
        self.merged_regions.push(*range);
        Ok(())
    }

    /// Unmerge cells
    pub fn unmerge_cells(&mut self, range: &CellRange) -> bool {
        let before = self.merged_regions.len();
        self.merged_regions.retain(|r| r != range);
        self.merged_regions.len() != before
    }

    /// Find the merged region covering a cell
    pub fn merged_region_at(&self, cell: &CellRef) -> Option<&CellRange> {
        self.merged_regions.iter().find(|r| r.contains(cell))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(a1: &str) -> CellRef {
        CellRef::parse(a1).unwrap()
    }

    #[test]
    fn test_new_sheet() {
        let sheet = Sheet::new("design-sheet1", "Hoja1");
        assert_eq!(sheet.id(), "design-sheet1");
        assert_eq!(sheet.name(), "Hoja1");
        assert!(sheet.matches("Hoja1"));
        assert!(sheet.matches("design-sheet1"));
        assert!(sheet.is_empty());
    }

    #[test]
    fn test_set_and_clear_input() {
        let mut sheet = Sheet::new("s1", "Hoja1");
        sheet.set_input("B2", "=A1*2").unwrap();
        assert_eq!(sheet.cell_at("B2").unwrap().unwrap().formula, "=A1*2");

        sheet.set_input("B2", "").unwrap();
        assert!(sheet.cell_at("B2").unwrap().is_none());
    }

    #[test]
    fn test_clearing_styled_cell_keeps_style() {
        let mut sheet = Sheet::new("s1", "Hoja1");
        let style = CellStyle {
            bold: Some(true),
            ..Default::default()
        };
        sheet.set_cell_style(cell("A1"), style.clone());
        sheet.set_cell_input(cell("A1"), "x");
        sheet.set_cell_input(cell("A1"), "");

        let kept = sheet.cell(&cell("A1")).unwrap();
        assert!(kept.is_absent());
        assert_eq!(kept.style, style);
    }

    #[test]
    fn test_set_computed_only_on_existing() {
        let mut sheet = Sheet::new("s1", "Hoja1");
        sheet.set_cell_input(cell("A1"), "=1+1");
        assert!(sheet.set_computed(&cell("A1"), CellValue::Number(2.0)));
        assert!(!sheet.set_computed(&cell("A2"), CellValue::Number(2.0)));
        assert_eq!(sheet.computed(&cell("A1")), CellValue::Number(2.0));
        assert!(sheet.cell(&cell("A2")).is_none());
    }

    #[test]
    fn test_cells_in_range() {
        let mut sheet = Sheet::new("s1", "Hoja1");
        for a1 in ["A1", "B1", "C1", "A2", "B3", "D3"] {
            sheet.set_input(a1, "1").unwrap();
        }
        let range = CellRange::parse("A1:B3").unwrap();
        let found: Vec<String> = sheet.cells_in(&range).map(|(c, _)| c.to_string()).collect();
        assert_eq!(found, vec!["A1", "B1", "A2", "B3"]);
    }

    #[test]
    fn test_hidden_union() {
        let mut sheet = Sheet::new("s1", "Hoja1");
        sheet.template_hidden_rows.insert(4);
        sheet.hide_row(2);
        assert!(sheet.is_row_hidden(2));
        assert!(sheet.is_row_hidden(4));

        sheet.unhide_all_rows();
        assert!(!sheet.is_row_hidden(2));
        assert!(sheet.is_row_hidden(4));

        sheet.hide_column(1);
        assert!(sheet.is_column_hidden(1));
        assert!(sheet.unhide_column(1));
        assert!(!sheet.is_column_hidden(1));
    }

    #[test]
    fn test_dimensions_clamped() {
        let mut sheet = Sheet::new("s1", "Hoja1");
        assert_eq!(sheet.column_width(0), DEFAULT_COLUMN_WIDTH);
        sheet.set_column_width(0, 10);
        assert_eq!(sheet.column_width(0), MIN_COLUMN_WIDTH);
        sheet.set_row_height(3, 50);
        assert_eq!(sheet.row_height(3), 50);
        sheet.set_row_height(3, 1);
        assert_eq!(sheet.row_height(3), MIN_ROW_HEIGHT);
    }

    #[test]
    fn test_merge_rejects_overlap() {
        let mut sheet = Sheet::new("s1", "Hoja1");
        sheet.merge_cells(&CellRange::parse("A1:B2").unwrap()).unwrap();
        assert!(matches!(
            sheet.merge_cells(&CellRange::parse("B2:C3").unwrap()),
            Err(Error::MergedCellConflict(_))
        ));
        assert!(sheet.merge_cells(&CellRange::parse("C1:D1").unwrap()).is_ok());
        assert_eq!(
            sheet.merged_region_at(&cell("B1")).map(|r| r.to_string()),
            Some("A1:B2".to_string())
        );

        assert!(sheet.unmerge_cells(&CellRange::parse("A1:B2").unwrap()));
        assert!(!sheet.unmerge_cells(&CellRange::parse("A1:B2").unwrap()));
    }
}
