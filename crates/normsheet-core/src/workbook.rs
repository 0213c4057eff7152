//! Workbook store - every instance the engine knows about

use crate::cell::{CellRef, CellValue};
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::sheet::Sheet;

/// Ordered collection of instances
///
/// Instances are siblings: formulas in one may read cells of another through
/// `instance:sheet!A1` references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkbookStore {
    instances: Vec<Instance>,
}

impl WorkbookStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instances
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Check if the store has no instances
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Iterate over instances in order
    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter()
    }

    /// Get an instance by id
    pub fn instance(&self, id: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.id() == id)
    }

    /// Get a mutable instance by id
    pub fn instance_mut(&mut self, id: &str) -> Option<&mut Instance> {
        self.instances.iter_mut().find(|i| i.id() == id)
    }

    /// Add an instance. Ids must be unique.
    pub fn add_instance(&mut self, instance: Instance) -> Result<()> {
        if self.instance(instance.id()).is_some() {
            return Err(Error::DuplicateInstance(instance.id().to_string()));
        }
        self.instances.push(instance);
        Ok(())
    }

    /// Add an instance, replacing any existing instance with the same id in place
    pub fn upsert_instance(&mut self, instance: Instance) {
        match self.instances.iter_mut().find(|i| i.id() == instance.id()) {
            Some(existing) => *existing = instance,
            None => self.instances.push(instance),
        }
    }

    /// Remove an instance
    pub fn remove_instance(&mut self, id: &str) -> Option<Instance> {
        let index = self.instances.iter().position(|i| i.id() == id)?;
        Some(self.instances.remove(index))
    }

    /// Get a sheet by instance id and sheet id or name
    pub fn sheet(&self, instance: &str, sheet: &str) -> Option<&Sheet> {
        self.instance(instance)?.sheet(sheet)
    }

    /// Get a mutable sheet by instance id and sheet id or name
    pub fn sheet_mut(&mut self, instance: &str, sheet: &str) -> Option<&mut Sheet> {
        self.instance_mut(instance)?.sheet_mut(sheet)
    }

    /// Get a sheet, failing with a descriptive error
    pub fn require_sheet(&self, instance: &str, sheet: &str) -> Result<&Sheet> {
        let inst = self
            .instance(instance)
            .ok_or_else(|| Error::InstanceNotFound(instance.to_string()))?;
        inst.sheet(sheet)
            .ok_or_else(|| Error::SheetNotFound(format!("{}:{}", instance, sheet)))
    }

    /// Get a mutable sheet, failing with a descriptive error
    pub fn require_sheet_mut(&mut self, instance: &str, sheet: &str) -> Result<&mut Sheet> {
        let inst = self
            .instance_mut(instance)
            .ok_or_else(|| Error::InstanceNotFound(instance.to_string()))?;
        inst.sheet_mut(sheet)
            .ok_or_else(|| Error::SheetNotFound(format!("{}:{}", instance, sheet)))
    }

    /// Computed value of a cell anywhere in the store (empty when absent)
    pub fn computed(&self, instance: &str, sheet: &str, cell: &CellRef) -> CellValue {
        self.sheet(instance, sheet)
            .map(|s| s.computed(cell))
            .unwrap_or(CellValue::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lookup() {
        let mut store = WorkbookStore::new();
        store.add_instance(Instance::new("design")).unwrap();
        store.add_instance(Instance::new("cost")).unwrap();
        assert_eq!(store.instance_count(), 2);

        assert!(store.sheet("cost", "Hoja1").is_some());
        assert!(store.sheet("cost", "cost-sheet1").is_some());
        assert!(store.sheet("other", "Hoja1").is_none());

        assert!(matches!(
            store.add_instance(Instance::new("cost")),
            Err(Error::DuplicateInstance(_))
        ));
    }

    #[test]
    fn test_require_sheet_errors() {
        let mut store = WorkbookStore::new();
        store.add_instance(Instance::new("design")).unwrap();
        assert!(matches!(
            store.require_sheet("x", "Hoja1"),
            Err(Error::InstanceNotFound(_))
        ));
        assert!(matches!(
            store.require_sheet("design", "Hoja9"),
            Err(Error::SheetNotFound(_))
        ));
    }

    #[test]
    fn test_upsert_keeps_position() {
        let mut store = WorkbookStore::new();
        store.add_instance(Instance::new("a")).unwrap();
        store.add_instance(Instance::new("b")).unwrap();

        let mut replacement = Instance::new("a");
        replacement.add_sheet();
        store.upsert_instance(replacement);

        let ids: Vec<&str> = store.instances().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.instance("a").unwrap().sheet_count(), 2);
    }
}
