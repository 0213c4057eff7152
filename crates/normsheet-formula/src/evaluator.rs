//! Formula evaluator
//!
//! Evaluates formula text against a snapshot of the workbook store. Evaluation
//! never fails: whatever goes wrong is reported as an error marker in the
//! resulting [`CellValue`].

use normsheet_core::{CellError, CellRange, CellRef, CellValue, GridBounds, Sheet, WorkbookStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{
    BinaryOperator, CellReference, FormulaExpr, RangeReference, SheetQualifier, UnaryOperator,
};
use crate::custom::{CallArgument, CustomFunctionBridge, FunctionEvaluator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::function_registry;
use crate::parser::parse_formula;
use crate::reference::resolve_sheet;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
    Array(Vec<Vec<FormulaValue>>),
    Empty,
}

impl FormulaValue {
    /// Get the number, if this is one. Text and booleans are not coerced.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Force conversion to number for arithmetic
    pub fn to_number(&self) -> FormulaResult<f64> {
        self.as_number()
            .ok_or_else(|| FormulaError::Evaluation(format!("Expected number, got {:?}", self)))
    }

    /// Convert to string, the way lookups compare values
    pub fn as_string(&self) -> String {
        match self {
            FormulaValue::Number(n) => normsheet_core::format_number(*n),
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Boolean(true) => "TRUE".to_string(),
            FormulaValue::Boolean(false) => "FALSE".to_string(),
            FormulaValue::Error(e) => e.to_string(),
            FormulaValue::Empty | FormulaValue::Array(_) => String::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FormulaValue::Error(_))
    }

    /// Get the error if this is one
    pub fn get_error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }
}

impl From<CellValue> for FormulaValue {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Empty => FormulaValue::Empty,
            CellValue::Number(n) => FormulaValue::Number(n),
            CellValue::Text(s) => FormulaValue::String(s),
            CellValue::Error(e) => FormulaValue::Error(e),
        }
    }
}

/// How an error-valued cell reads when referenced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPropagation {
    /// The cell reads as 0
    #[default]
    Zero,
    /// The cell's error becomes the referencing formula's result
    Propagate,
}

/// Context for formula evaluation
///
/// `sheet` may be the id or the display name of the sheet being evaluated.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub store: &'a WorkbookStore,
    pub instance: &'a str,
    pub sheet: &'a str,
    pub bounds: GridBounds,
    pub error_propagation: ErrorPropagation,
}

impl<'a> EvaluationContext<'a> {
    /// Create a context with default bounds and the zero error policy
    pub fn new(store: &'a WorkbookStore, instance: &'a str, sheet: &'a str) -> Self {
        Self {
            store,
            instance,
            sheet,
            bounds: GridBounds::default(),
            error_propagation: ErrorPropagation::default(),
        }
    }

    pub fn with_bounds(mut self, bounds: GridBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_error_propagation(mut self, policy: ErrorPropagation) -> Self {
        self.error_propagation = policy;
        self
    }

    pub fn propagates(&self) -> bool {
        self.error_propagation == ErrorPropagation::Propagate
    }

    /// The sheet being evaluated
    pub fn current_sheet(&self) -> Option<&'a Sheet> {
        self.store.sheet(self.instance, self.sheet)
    }

    /// Does the qualifier point back at the sheet being evaluated?
    pub fn is_current_sheet(&self, qualifier: &SheetQualifier) -> bool {
        let target = resolve_sheet(Some(qualifier), self.instance, self.sheet, self.store);
        match (target, self.current_sheet()) {
            (Some((instance, sheet)), Some(current)) => {
                instance.id() == self.instance && sheet.id() == current.id()
            }
            _ => false,
        }
    }

    /// Find the sheet and cell a reference points at
    pub fn resolve(&self, reference: &CellReference) -> Option<(&'a Sheet, CellRef)> {
        if !self.bounds.contains(&reference.address) {
            return None;
        }
        let (_, sheet) = resolve_sheet(
            reference.sheet.as_ref(),
            self.instance,
            self.sheet,
            self.store,
        )?;
        Some((sheet, reference.address))
    }

    /// An unqualified range on the current sheet, clipped to the grid
    pub fn local_range(&self, range: &RangeReference) -> Option<(&'a Sheet, CellRange)> {
        if range.sheet.is_some() {
            return None;
        }
        Some((self.current_sheet()?, self.bounds.clip(&range.range)?))
    }

    /// Read a computed value as a number, applying the error policy
    pub fn read_number(&self, value: &CellValue) -> FormulaValue {
        match value {
            CellValue::Number(n) => FormulaValue::Number(*n),
            CellValue::Error(e) if self.propagates() => FormulaValue::Error(*e),
            _ => FormulaValue::Number(0.0),
        }
    }

    /// Value of a reference: its number, 0 for anything else or when it does not resolve
    pub fn reference_value(&self, reference: &CellReference) -> FormulaValue {
        match self.resolve(reference) {
            Some((sheet, cell)) => self.read_number(&sheet.computed(&cell)),
            None => FormulaValue::Number(0.0),
        }
    }
}

/// Evaluate formula text
///
/// Input that does not start with `=` is a literal, leading whitespace
/// included. Custom function calls are sent
/// through `bridge`; the first registered code found in the formula decides the
/// whole result.
pub async fn evaluate<E: FunctionEvaluator>(
    formula: &str,
    ctx: &EvaluationContext<'_>,
    bridge: &CustomFunctionBridge<'_, E>,
) -> CellValue {
    if formula.trim().is_empty() {
        return CellValue::Empty;
    }
    if !formula.starts_with('=') {
        return CellValue::from_literal(formula);
    }
    let trimmed = formula.trim_end();

    let ast = match parse_formula(trimmed) {
        Ok(ast) => ast,
        Err(e) => {
            debug!(formula = trimmed, error = %e, "formula did not parse");
            return CellValue::Error(e.to_cell_error());
        }
    };

    for def in bridge.registry().iter() {
        let Some((code, args)) = ast.find_call(|name| name == def.code) else {
            continue;
        };
        let mut resolved = Vec::with_capacity(args.len());
        for arg in args {
            match call_argument(arg, ctx) {
                Ok(Some(argument)) => resolved.push(argument),
                Ok(None) => {}
                Err(e) => return CellValue::Error(e),
            }
        }
        return bridge.call(code, &resolved).await;
    }

    into_cell_value(evaluate_expr(&ast, ctx))
}

/// Resolve one custom call argument; empty slots are dropped
fn call_argument(
    expr: &FormulaExpr,
    ctx: &EvaluationContext,
) -> Result<Option<CallArgument>, CellError> {
    let argument = match expr {
        FormulaExpr::Missing => return Ok(None),
        FormulaExpr::CellRef(reference) => match ctx.reference_value(reference) {
            FormulaValue::Error(e) => return Err(e),
            value => CallArgument::Number(value.as_number().unwrap_or(0.0)),
        },
        FormulaExpr::Number(n) => CallArgument::Number(*n),
        FormulaExpr::UnaryOp {
            op: UnaryOperator::Negate,
            operand,
        } => match operand.as_ref() {
            FormulaExpr::Number(n) => CallArgument::Number(-n),
            _ => CallArgument::Invalid,
        },
        _ => CallArgument::Invalid,
    };
    Ok(Some(argument))
}

fn into_cell_value(result: FormulaResult<FormulaValue>) -> CellValue {
    match result {
        Ok(FormulaValue::Number(n)) if n.is_finite() => CellValue::Number(n),
        Ok(FormulaValue::Error(e)) => CellValue::Error(e),
        Ok(other) => {
            debug!(value = ?other, "formula result is not a number");
            CellValue::Error(CellError::Error)
        }
        Err(e) => CellValue::Error(e.to_cell_error()),
    }
}

/// Evaluate a parsed expression without custom functions
pub fn evaluate_expr(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match expr {
        // === Literals ===
        FormulaExpr::Number(n) => Ok(FormulaValue::Number(*n)),
        FormulaExpr::String(s) => Ok(FormulaValue::String(s.clone())),
        FormulaExpr::Boolean(b) => Ok(FormulaValue::Boolean(*b)),
        FormulaExpr::Missing => Ok(FormulaValue::Empty),

        // === References ===
        FormulaExpr::CellRef(reference) => Ok(ctx.reference_value(reference)),
        FormulaExpr::RangeRef(_) => Err(FormulaError::Evaluation(
            "Range used outside a function".into(),
        )),

        // === Operators ===
        FormulaExpr::BinaryOp { op, left, right } => evaluate_binary_op(*op, left, right, ctx),
        FormulaExpr::UnaryOp { op, operand } => evaluate_unary_op(*op, operand, ctx),

        // === Functions ===
        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx),

        // === Arrays ===
        FormulaExpr::Array(rows) => {
            let mut result_rows = Vec::with_capacity(rows.len());
            for row in rows {
                let mut result_row = Vec::with_capacity(row.len());
                for expr in row {
                    result_row.push(evaluate_expr(expr, ctx)?);
                }
                result_rows.push(result_row);
            }
            Ok(FormulaValue::Array(result_rows))
        }
    }
}

fn evaluate_binary_op(
    op: BinaryOperator,
    left: &FormulaExpr,
    right: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let left_val = evaluate_expr(left, ctx)?;
    let right_val = evaluate_expr(right, ctx)?;

    // Propagate errors
    if let Some(e) = left_val.get_error() {
        return Ok(FormulaValue::Error(e));
    }
    if let Some(e) = right_val.get_error() {
        return Ok(FormulaValue::Error(e));
    }

    let l = left_val.to_number()?;
    let r = right_val.to_number()?;
    let n = match op {
        BinaryOperator::Add => l + r,
        BinaryOperator::Subtract => l - r,
        BinaryOperator::Multiply => l * r,
        BinaryOperator::Divide => {
            if r == 0.0 {
                return Err(FormulaError::Evaluation("Division by zero".into()));
            }
            l / r
        }
        BinaryOperator::Power => l.powf(r),
    };
    Ok(FormulaValue::Number(n))
}

fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let val = evaluate_expr(operand, ctx)?;
    if let Some(e) = val.get_error() {
        return Ok(FormulaValue::Error(e));
    }

    match op {
        UnaryOperator::Negate => Ok(FormulaValue::Number(-val.to_number()?)),
    }
}

fn evaluate_function(
    name: &str,
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let func = function_registry()
        .get(name)
        .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

    if !func.accepts(args.len()) {
        debug!(function = func.name, args = args.len(), "wrong number of arguments");
        return Ok(FormulaValue::Number(0.0));
    }

    (func.implementation)(args, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custom::{
        BridgeError, CustomFunctionRegistry, EvaluationRequest, EvaluationResponse, Unavailable,
    };
    use normsheet_core::{CustomFunctionDefinition, Instance};
    use std::future::Future;
    use std::sync::Mutex;

    fn store(cells: &[(&str, &str)]) -> WorkbookStore {
        let mut store = WorkbookStore::new();
        let mut design = Instance::new("design");
        let sheet = design.add_sheet();
        sheet.set_input("A1", "5").unwrap();
        let mut cost = Instance::new("cost");
        cost.sheet_mut("Hoja1").unwrap().set_input("B5", "40").unwrap();
        store.add_instance(design).unwrap();
        store.add_instance(cost).unwrap();

        let sheet = store.sheet_mut("design", "Hoja1").unwrap();
        for (a1, value) in cells {
            let cell = CellRef::parse(a1).unwrap();
            sheet.set_cell_input(cell, *value);
            if let Some(e) = CellError::from_str(value) {
                sheet.set_computed(&cell, CellValue::Error(e));
            }
        }
        store
    }

    async fn eval_in(store: &WorkbookStore, formula: &str, policy: ErrorPropagation) -> CellValue {
        let ctx = EvaluationContext::new(store, "design", "Hoja1").with_error_propagation(policy);
        let registry = CustomFunctionRegistry::new();
        let bridge = CustomFunctionBridge::new(&registry, &Unavailable);
        evaluate(formula, &ctx, &bridge).await
    }

    async fn eval(formula: &str) -> CellValue {
        let store = store(&[("A1", "1"), ("B1", "2"), ("C1", "hello")]);
        eval_in(&store, formula, ErrorPropagation::Zero).await
    }

    #[tokio::test]
    async fn test_literals() {
        assert_eq!(eval("").await, CellValue::Empty);
        assert_eq!(eval("   ").await, CellValue::Empty);
        assert_eq!(eval("42").await, CellValue::Number(42.0));
        assert_eq!(eval("transformer").await, CellValue::text("transformer"));
        assert_eq!(eval("=").await, CellValue::Error(CellError::Error));
        assert_eq!(eval(" =1+1").await, CellValue::text(" =1+1"));
        assert_eq!(eval("=1+1 ").await, CellValue::Number(2.0));
    }

    #[tokio::test]
    async fn test_arithmetic() {
        assert_eq!(eval("=1+2*3").await, CellValue::Number(7.0));
        assert_eq!(eval("=(1+2)*3").await, CellValue::Number(9.0));
        assert_eq!(eval("=2^3^2").await, CellValue::Number(64.0));
        assert_eq!(eval("=-A1+ +B1").await, CellValue::Number(1.0));
        assert_eq!(eval("=A1+B1").await, CellValue::Number(3.0));
    }

    #[tokio::test]
    async fn test_failures_become_error() {
        assert_eq!(eval("=1/0").await, CellValue::Error(CellError::Error));
        assert_eq!(eval("=\"a\"").await, CellValue::Error(CellError::Error));
        assert_eq!(eval("=\"a\"+1").await, CellValue::Error(CellError::Error));
        assert_eq!(eval("=(-8)^0.5").await, CellValue::Error(CellError::Error));
        assert_eq!(eval("=A1:B1").await, CellValue::Error(CellError::Error));
        assert_eq!(eval("=1+").await, CellValue::Error(CellError::Error));
        assert_eq!(
            eval("=NOSUCH(1)").await,
            CellValue::Error(CellError::FunctionNotFound)
        );
    }

    #[tokio::test]
    async fn test_references_read_numbers_or_zero() {
        // Text, empty and out-of-bounds cells read as 0
        assert_eq!(eval("=C1+D1+AA1+1").await, CellValue::Number(1.0));
        assert_eq!(eval("=Hoja9!A1+1").await, CellValue::Number(1.0));
        assert_eq!(eval("=Hoja2!A1").await, CellValue::Number(5.0));
        assert_eq!(eval("=cost:Hoja1!B5/2").await, CellValue::Number(20.0));
        assert_eq!(eval("=$A$1*10").await, CellValue::Number(10.0));
        // Too large for any grid
        assert_eq!(eval("=ZZZZ1+1").await, CellValue::Number(1.0));
        assert_eq!(eval("=A99999999999+1").await, CellValue::Number(1.0));
        assert_eq!(eval("=SUM(A1:ZZZZ9)").await, CellValue::Number(3.0));
    }

    #[tokio::test]
    async fn test_error_propagation_policy() {
        let store = store(&[("A1", "1"), ("B1", "#MISSING_ARGS")]);
        assert_eq!(
            eval_in(&store, "=A1+B1", ErrorPropagation::Zero).await,
            CellValue::Number(1.0)
        );
        assert_eq!(
            eval_in(&store, "=A1+B1", ErrorPropagation::Propagate).await,
            CellValue::Error(CellError::MissingArgs)
        );
    }

    #[tokio::test]
    async fn test_is_current_sheet() {
        let store = store(&[]);
        let ctx = EvaluationContext::new(&store, "design", "Hoja1");
        let by_id = SheetQualifier {
            instance: None,
            sheet: "design-sheet1".into(),
        };
        let other_instance = SheetQualifier {
            instance: Some("cost".into()),
            sheet: "Hoja1".into(),
        };
        assert!(ctx.is_current_sheet(&by_id));
        assert!(!ctx.is_current_sheet(&other_instance));
    }

    /// Echoes the sum of the parameters back
    struct Summing {
        requests: Mutex<Vec<EvaluationRequest>>,
    }

    impl FunctionEvaluator for Summing {
        fn evaluate(
            &self,
            request: EvaluationRequest,
        ) -> impl Future<Output = Result<EvaluationResponse, BridgeError>> + Send {
            let total: f64 = request.functions[0].parameters.0.iter().map(|(_, v)| v).sum();
            self.requests.lock().unwrap().push(request);
            async move { Ok(EvaluationResponse::numbers([total])) }
        }
    }

    async fn eval_custom(store: &WorkbookStore, formula: &str) -> (CellValue, usize) {
        let registry = CustomFunctionRegistry::from_definitions([
            CustomFunctionDefinition::new("TRAFO", ["power", "voltage"], 7),
            CustomFunctionDefinition::new("LOSS", ["current"], 9),
        ]);
        let evaluator = Summing {
            requests: Mutex::new(Vec::new()),
        };
        let bridge = CustomFunctionBridge::new(&registry, &evaluator);
        let ctx = EvaluationContext::new(store, "design", "Hoja1");
        let value = evaluate(formula, &ctx, &bridge).await;
        (value, bridge.call_count())
    }

    #[tokio::test]
    async fn test_custom_function_call() {
        let store = store(&[("A1", "100"), ("B1", "13.5"), ("C1", "text")]);

        assert_eq!(
            eval_custom(&store, "=TRAFO(A1, B1)").await,
            (CellValue::Number(113.5), 1)
        );
        assert_eq!(
            eval_custom(&store, "=TRAFO(-2, 4)").await,
            (CellValue::Number(2.0), 1)
        );
        // Text cells read as 0, empty slots are dropped
        assert_eq!(
            eval_custom(&store, "=TRAFO(C1,,B1)").await,
            (CellValue::Number(13.5), 1)
        );
        // The custom call decides the whole formula
        assert_eq!(
            eval_custom(&store, "=1+LOSS(A1)").await,
            (CellValue::Number(100.0), 1)
        );
    }

    #[tokio::test]
    async fn test_custom_function_argument_errors() {
        let store = store(&[("A1", "100")]);
        assert_eq!(
            eval_custom(&store, "=TRAFO()").await,
            (CellValue::Error(CellError::MissingArgs), 0)
        );
        assert_eq!(
            eval_custom(&store, "=TRAFO(A1)").await,
            (CellValue::Error(CellError::MissingArgs), 0)
        );
        assert_eq!(
            eval_custom(&store, "=TRAFO(A1, 1+1)").await,
            (CellValue::Error(CellError::InvalidArgument), 0)
        );
        assert_eq!(
            eval_custom(&store, "=TRAFO(A1, \"x\")").await,
            (CellValue::Error(CellError::InvalidArgument), 0)
        );
        // Codes match exactly
        assert_eq!(
            eval_custom(&store, "=trafo(A1, 1)").await,
            (CellValue::Error(CellError::FunctionNotFound), 0)
        );
    }

    #[tokio::test]
    async fn test_idempotent() {
        let store = store(&[("A1", "3"), ("B1", "4")]);
        let first = eval_in(&store, "=SUM(A1:B1)*A1", ErrorPropagation::Zero).await;
        let second = eval_in(&store, "=SUM(A1:B1)*A1", ErrorPropagation::Zero).await;
        assert_eq!(first, CellValue::Number(21.0));
        assert_eq!(first, second);
    }
}
