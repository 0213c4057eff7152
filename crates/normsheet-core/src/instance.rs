//! Instance type (one named workbook)

use crate::error::{Error, Result};
use crate::sheet::Sheet;
use crate::template::{ElementValue, Template};

/// A named workbook ("design", "cost", ...) holding an ordered list of sheets
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    id: String,
    sheets: Vec<Sheet>,
}

impl Instance {
    /// Create an instance with a single empty sheet
    pub fn new<S: Into<String>>(id: S) -> Self {
        let mut instance = Self::empty(id);
        instance.add_sheet();
        instance
    }

    /// Create an instance with no sheets
    pub fn empty<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            sheets: Vec::new(),
        }
    }

    /// Get the instance id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of sheets
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Iterate over sheets in order
    pub fn sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.sheets.iter()
    }

    /// Iterate mutably over sheets in order
    pub fn sheets_mut(&mut self) -> impl Iterator<Item = &mut Sheet> {
        self.sheets.iter_mut()
    }

    /// Position of a sheet, looked up by id first, then by display name
    pub fn sheet_index(&self, key: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|s| s.id == key)
            .or_else(|| self.sheets.iter().position(|s| s.name == key))
    }

    /// Get a sheet by id or display name
    pub fn sheet(&self, key: &str) -> Option<&Sheet> {
        self.sheet_index(key).map(|i| &self.sheets[i])
    }

    /// Get a mutable sheet by id or display name
    pub fn sheet_mut(&mut self, key: &str) -> Option<&mut Sheet> {
        self.sheet_index(key).map(move |i| &mut self.sheets[i])
    }

    /// Get a sheet by position
    pub fn sheet_at(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    /// Add an empty sheet named `Hoja{n}` and return it
    pub fn add_sheet(&mut self) -> &mut Sheet {
        let (id, name) = self.next_sheet_identity();
        self.sheets.push(Sheet::new(id, name));
        let last = self.sheets.len() - 1;
        &mut self.sheets[last]
    }

    /// Add a sheet built from a template with element data injected
    pub fn add_sheet_from_template(
        &mut self,
        template: &Template,
        elements: &[ElementValue],
    ) -> &mut Sheet {
        let sheet = self.add_sheet();
        sheet.apply_template(template, elements);
        sheet
    }

    /// Append an existing sheet. Sheet ids must be unique within the instance.
    pub fn push_sheet(&mut self, sheet: Sheet) -> Result<()> {
        if self.sheets.iter().any(|s| s.id == sheet.id) {
            return Err(Error::DuplicateSheetId(sheet.id));
        }
        self.sheets.push(sheet);
        Ok(())
    }

    /// Delete a sheet. The last remaining sheet cannot be deleted.
    pub fn delete_sheet(&mut self, key: &str) -> Result<Sheet> {
        let index = self
            .sheet_index(key)
            .ok_or_else(|| Error::SheetNotFound(key.to_string()))?;
        if self.sheets.len() <= 1 {
            return Err(Error::LastSheet(self.id.clone()));
        }
        Ok(self.sheets.remove(index))
    }

    /// Change the display name of a sheet; its id is unchanged
    pub fn rename_sheet<S: Into<String>>(&mut self, key: &str, name: S) -> Result<()> {
        let sheet = self
            .sheet_mut(key)
            .ok_or_else(|| Error::SheetNotFound(key.to_string()))?;
        sheet.set_name(name);
        Ok(())
    }

    fn next_sheet_identity(&self) -> (String, String) {
        let mut n = self.sheets.len() + 1;
        loop {
            let id = format!("{}-sheet{}", self.id, n);
            let name = format!("Hoja{}", n);
            if !self.sheets.iter().any(|s| s.id == id || s.name == name) {
                return (id, name);
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_instance_has_one_sheet() {
        let instance = Instance::new("design");
        assert_eq!(instance.sheet_count(), 1);
        let sheet = instance.sheet_at(0).unwrap();
        assert_eq!(sheet.id(), "design-sheet1");
        assert_eq!(sheet.name(), "Hoja1");
    }

    #[test]
    fn test_add_sheet_names_are_unique() {
        let mut instance = Instance::new("design");
        instance.add_sheet();
        instance.delete_sheet("Hoja1").unwrap();
        // One sheet left (Hoja2); the next would be Hoja2 again without the check
        let sheet = instance.add_sheet();
        assert_eq!(sheet.name(), "Hoja3");
        assert_eq!(sheet.id(), "design-sheet3");
    }

    #[test]
    fn test_lookup_id_before_name() {
        let mut instance = Instance::empty("cost");
        instance.push_sheet(Sheet::new("a", "b")).unwrap();
        instance.push_sheet(Sheet::new("b", "Totals")).unwrap();

        assert_eq!(instance.sheet("b").unwrap().name(), "Totals");
        assert_eq!(instance.sheet("Totals").unwrap().id(), "b");
        assert!(instance.sheet("missing").is_none());
        assert!(matches!(
            instance.push_sheet(Sheet::new("a", "x")),
            Err(Error::DuplicateSheetId(_))
        ));
    }

    #[test]
    fn test_delete_last_sheet_rejected() {
        let mut instance = Instance::new("design");
        assert!(matches!(
            instance.delete_sheet("Hoja1"),
            Err(Error::LastSheet(_))
        ));
        assert!(matches!(
            instance.delete_sheet("nope"),
            Err(Error::SheetNotFound(_))
        ));
    }

    #[test]
    fn test_rename_keeps_id() {
        let mut instance = Instance::new("design");
        instance.rename_sheet("design-sheet1", "Resumen").unwrap();
        let sheet = instance.sheet("Resumen").unwrap();
        assert_eq!(sheet.id(), "design-sheet1");
    }
}
