//! Recalculation engine
//!
//! Keeps the workbook store, the custom function registry and one dependency
//! graph per sheet. An edit recomputes the edited cell and everything that
//! (transitively) depends on it on the same sheet; loads recompute whole sheets.
//!
//! A pass runs in three steps so that hosts can evaluate outside the borrow of
//! the engine:
//!
//! 1. [`Recalculator::begin_edit`] writes the input, updates the graph and
//!    snapshots the store into a [`PendingPass`].
//! 2. [`PendingPass::run`] evaluates the closure against the snapshot, awaiting
//!    custom function calls one at a time.
//! 3. [`Recalculator::commit`] writes the computed values back. A cell that a
//!    newer pass already wrote keeps the newer value. When only part of a pass
//!    was overtaken, its closure is queued again (see
//!    [`Recalculator::begin_requeued`]).
//!
//! # Example
//!
//! ```rust
//! use normsheet::prelude::*;
//!
//! let mut store = WorkbookStore::new();
//! store.add_instance(Instance::new("design")).unwrap();
//! let mut calc = Recalculator::new(store);
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! rt.block_on(async {
//!     calc.edit_cell("design", "Hoja1", "C1", "=A1+B1", &Unavailable).await.unwrap();
//!     calc.edit_cell("design", "Hoja1", "A1", "2", &Unavailable).await.unwrap();
//!     calc.edit_cell("design", "Hoja1", "B1", "3", &Unavailable).await.unwrap();
//! });
//! assert_eq!(calc.computed("design", "Hoja1", "C1").unwrap(), CellValue::Number(5.0));
//! ```

use std::collections::{HashMap, VecDeque};
use std::ops::AddAssign;

use normsheet_core::{
    CellRef, CellValue, CustomFunctionDefinition, ElementValue, Error, GridBounds, Result,
    Template, WorkbookDocument, WorkbookStore,
};
use normsheet_formula::{
    evaluate, CustomFunctionBridge, CustomFunctionRegistry, DependencyGraph, ErrorPropagation,
    EvaluationContext, FunctionEvaluator,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Options for recalculation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationOptions {
    /// Addressable grid; references outside it read as 0
    pub bounds: GridBounds,
    /// How error-valued cells read when referenced
    pub error_propagation: ErrorPropagation,
}

impl CalculationOptions {
    fn context<'a>(
        &self,
        store: &'a WorkbookStore,
        instance: &'a str,
        sheet: &'a str,
    ) -> EvaluationContext<'a> {
        EvaluationContext::new(store, instance, sheet)
            .with_bounds(self.bounds)
            .with_error_propagation(self.error_propagation)
    }
}

/// Statistics from a recalculation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalculationStats {
    /// Number of cells evaluated
    pub cells_evaluated: usize,
    /// Number of cells whose value is an error marker
    pub errors: usize,
    /// Number of requests sent to the function service
    pub custom_calls: usize,
}

impl AddAssign for CalculationStats {
    fn add_assign(&mut self, other: Self) {
        self.cells_evaluated += other.cells_evaluated;
        self.errors += other.errors;
        self.custom_calls += other.custom_calls;
    }
}

/// Instance id and sheet id
type SheetKey = (String, String);

/// A pass whose cells are chosen but not yet evaluated
#[derive(Debug)]
pub struct PendingPass {
    id: u64,
    instance: String,
    sheet: String,
    /// Edited cell, or `None` for a whole-sheet pass
    origin: Option<CellRef>,
    cells: Vec<CellRef>,
    snapshot: WorkbookStore,
    functions: CustomFunctionRegistry,
    options: CalculationOptions,
}

impl PendingPass {
    /// Pass id; later passes have larger ids
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cells to evaluate, in order
    pub fn cells(&self) -> &[CellRef] {
        &self.cells
    }

    /// Evaluate every cell of the pass
    ///
    /// Each result is written into the snapshot before the next cell is
    /// evaluated, so later cells see earlier results. Cells removed since the pass
    /// began are skipped.
    pub async fn run<E: FunctionEvaluator>(mut self, evaluator: &E) -> PassResult {
        let bridge = CustomFunctionBridge::new(&self.functions, evaluator);
        let mut stats = CalculationStats::default();
        let mut values = Vec::with_capacity(self.cells.len());

        for cell in &self.cells {
            let formula = match self
                .snapshot
                .sheet(&self.instance, &self.sheet)
                .and_then(|sheet| sheet.cell(cell))
            {
                Some(data) => data.formula.clone(),
                None => continue,
            };

            let value = {
                let ctx = self
                    .options
                    .context(&self.snapshot, &self.instance, &self.sheet);
                evaluate(&formula, &ctx, &bridge).await
            };
            debug!(pass = self.id, %cell, %value, "evaluated");

            stats.cells_evaluated += 1;
            if value.is_error() {
                stats.errors += 1;
            }
            if let Some(sheet) = self.snapshot.sheet_mut(&self.instance, &self.sheet) {
                sheet.set_computed(cell, value.clone());
            }
            values.push((*cell, value));
        }
        stats.custom_calls = bridge.call_count();

        PassResult {
            id: self.id,
            instance: self.instance,
            sheet: self.sheet,
            origin: self.origin,
            values,
            stats,
        }
    }
}

/// Computed values of a finished pass, ready to commit
#[derive(Debug, Clone)]
pub struct PassResult {
    id: u64,
    instance: String,
    sheet: String,
    origin: Option<CellRef>,
    values: Vec<(CellRef, CellValue)>,
    stats: CalculationStats,
}

impl PassResult {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn values(&self) -> &[(CellRef, CellValue)] {
        &self.values
    }

    pub fn stats(&self) -> CalculationStats {
        self.stats
    }
}

/// What happened to a committed pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied(CalculationStats),
    /// Newer passes had already written some of the cells. The rest were
    /// written and the pass was queued to run again.
    Requeued(CalculationStats),
    /// Newer passes had already written every cell; nothing was written
    Stale,
}

/// The recalculation engine
#[derive(Debug, Default)]
pub struct Recalculator {
    store: WorkbookStore,
    functions: CustomFunctionRegistry,
    options: CalculationOptions,
    graphs: HashMap<SheetKey, DependencyGraph>,
    next_pass: u64,
    /// Last pass that wrote each cell
    written: HashMap<SheetKey, HashMap<CellRef, u64>>,
    requeued: VecDeque<(SheetKey, Option<CellRef>)>,
}

impl Recalculator {
    /// Create an engine over a store, with default options and no custom functions
    pub fn new(store: WorkbookStore) -> Self {
        Self {
            store,
            ..Default::default()
        }
    }

    pub fn with_options(mut self, options: CalculationOptions) -> Self {
        self.options = options;
        self.graphs.clear();
        self
    }

    pub fn with_functions<I: IntoIterator<Item = CustomFunctionDefinition>>(
        mut self,
        functions: I,
    ) -> Self {
        self.functions = CustomFunctionRegistry::from_definitions(functions);
        self
    }

    pub fn options(&self) -> &CalculationOptions {
        &self.options
    }

    pub fn store(&self) -> &WorkbookStore {
        &self.store
    }

    /// Mutable access to the store for structural changes (sheets, styles,
    /// layout). Cached dependency graphs are dropped and rebuilt on the next edit.
    pub fn store_mut(&mut self) -> &mut WorkbookStore {
        self.graphs.clear();
        &mut self.store
    }

    pub fn functions(&self) -> &CustomFunctionRegistry {
        &self.functions
    }

    /// Register (or replace) a custom function
    pub fn register_function(&mut self, def: CustomFunctionDefinition) {
        self.functions.register(def);
    }

    /// Computed value of a cell
    pub fn computed(&self, instance: &str, sheet: &str, address: &str) -> Result<CellValue> {
        let cell = CellRef::parse(address)?;
        Ok(self.store.require_sheet(instance, sheet)?.computed(&cell))
    }

    /// Export the store and the custom functions
    pub fn to_document(&self) -> WorkbookDocument {
        let functions: Vec<CustomFunctionDefinition> = self.functions.iter().cloned().collect();
        WorkbookDocument::from_store(&self.store, &functions)
    }

    // === Edits ===

    /// Write a cell and recompute it and its dependents
    pub async fn edit_cell<E: FunctionEvaluator>(
        &mut self,
        instance: &str,
        sheet: &str,
        address: &str,
        input: &str,
        evaluator: &E,
    ) -> Result<CalculationStats> {
        let cell = CellRef::parse(address)?;
        let pass = self.begin_edit(instance, sheet, cell, input)?;
        let result = pass.run(evaluator).await;
        self.commit_applied(result)
    }

    /// Write a cell and prepare the pass that recomputes its closure
    ///
    /// The raw input is stored right away and the computed value is set
    /// optimistically (a literal is coerced, a formula shows its own text).
    pub fn begin_edit(
        &mut self,
        instance: &str,
        sheet: &str,
        cell: CellRef,
        input: &str,
    ) -> Result<PendingPass> {
        if !self.options.bounds.contains(&cell) {
            return Err(Error::InvalidAddress(cell.to_string()));
        }
        let target = self.store.require_sheet_mut(instance, sheet)?;
        target.set_cell_input(cell, input);
        let key = (instance.to_string(), target.id().to_string());

        let cells = self.closure(&key, cell, Some(input))?;
        Ok(self.pending(key, Some(cell), cells))
    }

    /// Prepare the next queued pass, if any
    ///
    /// A pass is queued when its commit found some of its cells already written
    /// by a newer pass. The new pass re-evaluates the same closure against the
    /// current store.
    pub fn begin_requeued(&mut self) -> Result<Option<PendingPass>> {
        let Some((key, origin)) = self.requeued.pop_front() else {
            return Ok(None);
        };
        let pass = match origin {
            Some(cell) => {
                let cells = self.closure(&key, cell, None)?;
                self.pending(key, Some(cell), cells)
            }
            None => self.begin_full(&key.0, &key.1)?,
        };
        Ok(Some(pass))
    }

    fn closure(
        &mut self,
        key: &SheetKey,
        cell: CellRef,
        input: Option<&str>,
    ) -> Result<Vec<CellRef>> {
        let target = self.store.require_sheet(&key.0, &key.1)?;
        let ctx = self.options.context(&self.store, &key.0, &key.1);
        let graph = self
            .graphs
            .entry(key.clone())
            .or_insert_with(|| DependencyGraph::build(target, &ctx));
        if let Some(input) = input {
            graph.update_cell(cell, input, &ctx);
        }
        Ok(graph.closure(cell))
    }

    /// Prepare a pass over every cell of a sheet, in sheet order
    ///
    /// The sheet's dependency graph is rebuilt.
    pub fn begin_full(&mut self, instance: &str, sheet: &str) -> Result<PendingPass> {
        let target = self.store.require_sheet(instance, sheet)?;
        let key = (instance.to_string(), target.id().to_string());
        let ctx = self.options.context(&self.store, &key.0, &key.1);
        let graph = DependencyGraph::build(target, &ctx);
        let cells: Vec<CellRef> = target.cells().map(|(cell, _)| *cell).collect();

        self.graphs.insert(key.clone(), graph);
        Ok(self.pending(key, None, cells))
    }

    fn pending(
        &mut self,
        (instance, sheet): SheetKey,
        origin: Option<CellRef>,
        cells: Vec<CellRef>,
    ) -> PendingPass {
        self.next_pass += 1;
        debug!(pass = self.next_pass, %instance, %sheet, cells = cells.len(), "pass started");
        PendingPass {
            id: self.next_pass,
            instance,
            sheet,
            origin,
            cells,
            snapshot: self.store.clone(),
            functions: self.functions.clone(),
            options: self.options,
        }
    }

    /// Write a pass's values back into the store
    ///
    /// Only the computed value of cells that still exist is touched. A cell
    /// last written by a newer pass keeps its value.
    pub fn commit(&mut self, result: PassResult) -> Result<CommitOutcome> {
        let key = (result.instance, result.sheet);
        let sheet = self.store.require_sheet_mut(&key.0, &key.1)?;
        let written = self.written.entry(key.clone()).or_default();

        let total = result.values.len();
        let mut skipped = 0;
        for (cell, value) in result.values {
            match written.get(&cell) {
                Some(&last) if last > result.id => skipped += 1,
                _ => {
                    sheet.set_computed(&cell, value);
                    written.insert(cell, result.id);
                }
            }
        }

        if skipped == 0 {
            debug!(pass = result.id, "pass committed");
            return Ok(CommitOutcome::Applied(result.stats));
        }
        if skipped == total {
            warn!(pass = result.id, "discarding stale pass");
            return Ok(CommitOutcome::Stale);
        }
        // Both passes read a snapshot without the other's values
        warn!(pass = result.id, skipped, "pass overtaken in part, requeueing");
        let entry = (key, result.origin);
        if !self.requeued.contains(&entry) {
            self.requeued.push_back(entry);
        }
        Ok(CommitOutcome::Requeued(result.stats))
    }

    fn commit_applied(&mut self, result: PassResult) -> Result<CalculationStats> {
        let stats = result.stats;
        self.commit(result)?;
        Ok(stats)
    }

    // === Full recalculation ===

    /// Recompute every cell of a sheet
    pub async fn recalculate_sheet<E: FunctionEvaluator>(
        &mut self,
        instance: &str,
        sheet: &str,
        evaluator: &E,
    ) -> Result<CalculationStats> {
        let pass = self.begin_full(instance, sheet)?;
        let result = pass.run(evaluator).await;
        self.commit_applied(result)
    }

    /// Recompute every sheet of every instance
    pub async fn recalculate_all<E: FunctionEvaluator>(
        &mut self,
        evaluator: &E,
    ) -> Result<CalculationStats> {
        let sheets: Vec<SheetKey> = self
            .store
            .instances()
            .flat_map(|instance| {
                instance
                    .sheets()
                    .map(move |sheet| (instance.id().to_string(), sheet.id().to_string()))
            })
            .collect();

        let mut stats = CalculationStats::default();
        for (instance, sheet) in sheets {
            stats += self.recalculate_sheet(&instance, &sheet, evaluator).await?;
        }
        Ok(stats)
    }

    /// Replace a sheet's content with a template and recompute it
    pub async fn load_template<E: FunctionEvaluator>(
        &mut self,
        instance: &str,
        sheet: &str,
        template: &Template,
        elements: &[ElementValue],
        evaluator: &E,
    ) -> Result<CalculationStats> {
        self.store
            .require_sheet_mut(instance, sheet)?
            .apply_template(template, elements);
        self.recalculate_sheet(instance, sheet, evaluator).await
    }

    /// Add a sheet built from a template and recompute it. Returns the new sheet id.
    pub async fn add_sheet_from_template<E: FunctionEvaluator>(
        &mut self,
        instance: &str,
        template: &Template,
        elements: &[ElementValue],
        evaluator: &E,
    ) -> Result<(String, CalculationStats)> {
        let sheet_id = self
            .store
            .instance_mut(instance)
            .ok_or_else(|| Error::InstanceNotFound(instance.to_string()))?
            .add_sheet_from_template(template, elements)
            .id()
            .to_string();
        let stats = self.recalculate_sheet(instance, &sheet_id, evaluator).await?;
        Ok((sheet_id, stats))
    }

    /// Replace the whole store with a document and recompute everything
    pub async fn load_workbook<E: FunctionEvaluator>(
        &mut self,
        document: WorkbookDocument,
        evaluator: &E,
    ) -> Result<CalculationStats> {
        let (store, functions) = document.into_store()?;
        self.store = store;
        self.functions = CustomFunctionRegistry::from_definitions(functions);
        self.graphs.clear();
        self.recalculate_all(evaluator).await
    }
}
