//! Dependency tracking for formula calculation
//!
//! The graph is per sheet and only records same-sheet edges: a cell depends on
//! the cells its formula references on the sheet it lives on. Edges are built
//! from the parsed formula, never from its text.

use std::collections::{BTreeSet, VecDeque};

use ahash::{AHashMap, AHashSet};
use normsheet_core::{CellRef, Sheet};

use crate::ast::FormulaExpr;
use crate::evaluator::EvaluationContext;
use crate::parser::parse_formula;

/// Dependency graph for the formula cells of one sheet
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Cell → Cells that depend on it (dependents)
    dependents: AHashMap<CellRef, BTreeSet<CellRef>>,
    /// Cell → Cells it depends on (precedents)
    precedents: AHashMap<CellRef, BTreeSet<CellRef>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for every formula of a sheet
    pub fn build(sheet: &Sheet, ctx: &EvaluationContext) -> Self {
        let mut graph = Self::new();
        for (cell, data) in sheet.cells() {
            if data.is_formula() {
                graph.update_cell(*cell, &data.formula, ctx);
            }
        }
        graph
    }

    /// Replace a cell's edges after its input changed
    ///
    /// Non-formula input and formulas that do not parse leave the cell without
    /// precedents.
    pub fn update_cell(&mut self, cell: CellRef, input: &str, ctx: &EvaluationContext) {
        let precedents = if input.starts_with('=') {
            parse_formula(input)
                .map(|ast| references(&ast, ctx))
                .unwrap_or_default()
        } else {
            BTreeSet::new()
        };
        self.set_precedents(cell, precedents);
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: CellRef, dependent: CellRef) {
        self.dependents
            .entry(precedent)
            .or_default()
            .insert(dependent);
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
    }

    /// Replace everything `cell` depends on
    pub fn set_precedents<I: IntoIterator<Item = CellRef>>(&mut self, cell: CellRef, precedents: I) {
        if let Some(old) = self.precedents.remove(&cell) {
            for precedent in old {
                if let Some(deps) = self.dependents.get_mut(&precedent) {
                    deps.remove(&cell);
                    if deps.is_empty() {
                        self.dependents.remove(&precedent);
                    }
                }
            }
        }
        for precedent in precedents {
            self.add_dependency(precedent, cell);
        }
    }

    /// Get cells that depend on the given cell, in sheet order
    pub fn get_dependents(&self, cell: CellRef) -> impl Iterator<Item = CellRef> + '_ {
        self.dependents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Get cells that the given cell depends on, in sheet order
    pub fn get_precedents(&self, cell: CellRef) -> impl Iterator<Item = CellRef> + '_ {
        self.precedents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Cells to re-evaluate after `changed` was edited, starting with `changed`
    ///
    /// Breadth-first over dependents; every cell appears once, so cycles terminate.
    pub fn closure(&self, changed: CellRef) -> Vec<CellRef> {
        let mut order = Vec::new();
        let mut visited = AHashSet::new();
        let mut queue = VecDeque::from([changed]);
        visited.insert(changed);

        while let Some(cell) = queue.pop_front() {
            order.push(cell);
            for dependent in self.get_dependents(cell) {
                if visited.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }

        order
    }

    /// Detect circular references involving a cell
    pub fn has_circular_reference(&self, cell: CellRef) -> bool {
        let mut visited = AHashSet::new();
        let mut in_stack = AHashSet::new();
        self.detect_cycle(cell, &mut visited, &mut in_stack)
    }

    fn detect_cycle(
        &self,
        cell: CellRef,
        visited: &mut AHashSet<CellRef>,
        in_stack: &mut AHashSet<CellRef>,
    ) -> bool {
        if in_stack.contains(&cell) {
            return true;
        }
        if visited.contains(&cell) {
            return false;
        }

        visited.insert(cell);
        in_stack.insert(cell);

        for precedent in self.get_precedents(cell) {
            if self.detect_cycle(precedent, visited, in_stack) {
                return true;
            }
        }

        in_stack.remove(&cell);
        false
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.dependents.clear();
        self.precedents.clear();
    }
}

/// Same-sheet cells a formula reads
///
/// Unqualified references, qualified references that point back at the current
/// sheet, and every cell of an unqualified range clipped to the grid.
pub fn references(expr: &FormulaExpr, ctx: &EvaluationContext) -> BTreeSet<CellRef> {
    let mut cells = BTreeSet::new();
    expr.walk(&mut |node| match node {
        FormulaExpr::CellRef(reference) => {
            let local = match &reference.sheet {
                None => true,
                Some(qualifier) => ctx.is_current_sheet(qualifier),
            };
            if local && ctx.bounds.contains(&reference.address) {
                cells.insert(reference.address);
            }
        }
        FormulaExpr::RangeRef(range) if range.sheet.is_none() => {
            if let Some(clipped) = ctx.bounds.clip(&range.range) {
                cells.extend(clipped.cells());
            }
        }
        _ => {}
    });
    cells
}
