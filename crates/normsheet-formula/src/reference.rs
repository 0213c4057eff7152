//! Reference resolution
//!
//! Turns reference text (or parsed references) into a concrete cell of a concrete
//! sheet. Resolution never fails loudly: anything that does not resolve is `None`,
//! and reading it yields 0.
//!
//! Grammar, in priority order:
//! 1. `instance:sheet!A1` - sheet of another (or the same) instance
//! 2. `sheet!A1` - another sheet of the current instance
//! 3. `A1` - the current sheet
//!
//! Sheets are looked up by id first, then by display name.

use lazy_regex::{regex_captures, regex_is_match};
use normsheet_core::{CellRef, GridBounds, Instance, Sheet, WorkbookStore};

use crate::ast::{CellReference, SheetQualifier};

/// A reference pinned to a concrete cell
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedRef {
    /// Instance id
    pub instance: String,
    /// Sheet id (never the display name)
    pub sheet: String,
    pub cell: CellRef,
}

/// Resolve reference text relative to the current instance and sheet
///
/// ```rust
/// use normsheet_core::{Instance, WorkbookStore, GridBounds};
/// use normsheet_formula::reference::resolve;
///
/// let mut store = WorkbookStore::new();
/// store.add_instance(Instance::new("design")).unwrap();
/// store.add_instance(Instance::new("cost")).unwrap();
///
/// let r = resolve("cost:Hoja1!B5", "design", "Hoja1", &store, GridBounds::default()).unwrap();
/// assert_eq!((r.instance.as_str(), r.sheet.as_str()), ("cost", "cost-sheet1"));
/// assert!(resolve("nowhere:Hoja1!B5", "design", "Hoja1", &store, GridBounds::default()).is_none());
/// ```
pub fn resolve(
    text: &str,
    current_instance: &str,
    current_sheet: &str,
    store: &WorkbookStore,
    bounds: GridBounds,
) -> Option<ResolvedRef> {
    let text = text.trim();

    let (qualifier, cell) = if let Some((_, instance, sheet, cell)) =
        regex_captures!(r"^([^:!']+):(.+)!(\$?[A-Za-z]+\$?[0-9]+)$", text)
    {
        let qualifier = SheetQualifier {
            instance: Some(instance.to_string()),
            sheet: unquote(sheet),
        };
        (Some(qualifier), cell)
    } else if let Some((_, sheet, cell)) =
        regex_captures!(r"^(.+)!(\$?[A-Za-z]+\$?[0-9]+)$", text)
    {
        let qualifier = SheetQualifier {
            instance: None,
            sheet: unquote(sheet),
        };
        (Some(qualifier), cell)
    } else if regex_is_match!(r"^\$?[A-Za-z]+\$?[0-9]+$", text) {
        (None, text)
    } else {
        return None;
    };

    let reference = CellReference {
        sheet: qualifier,
        address: CellRef::parse(cell).ok()?,
    };
    resolve_reference(&reference, current_instance, current_sheet, store, bounds)
}

/// Resolve a parsed reference
pub fn resolve_reference(
    reference: &CellReference,
    current_instance: &str,
    current_sheet: &str,
    store: &WorkbookStore,
    bounds: GridBounds,
) -> Option<ResolvedRef> {
    if !bounds.contains(&reference.address) {
        return None;
    }
    let (instance, sheet) = resolve_sheet(
        reference.sheet.as_ref(),
        current_instance,
        current_sheet,
        store,
    )?;
    Some(ResolvedRef {
        instance: instance.id().to_string(),
        sheet: sheet.id().to_string(),
        cell: reference.address,
    })
}

/// Find the sheet a qualifier points at (the current sheet when unqualified)
pub fn resolve_sheet<'s>(
    qualifier: Option<&SheetQualifier>,
    current_instance: &str,
    current_sheet: &str,
    store: &'s WorkbookStore,
) -> Option<(&'s Instance, &'s Sheet)> {
    match qualifier {
        None => {
            let instance = store.instance(current_instance)?;
            Some((instance, instance.sheet(current_sheet)?))
        }
        Some(q) => {
            let instance = store.instance(q.instance.as_deref().unwrap_or(current_instance))?;
            Some((instance, instance.sheet(&q.sheet)?))
        }
    }
}

fn unquote(sheet: &str) -> String {
    sheet
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .map(|s| s.replace("''", "'"))
        .unwrap_or_else(|| sheet.to_string())
}
