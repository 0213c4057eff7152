//! SUM and AVERAGE

use std::ops::ControlFlow;

use normsheet_core::{CellError, CellValue};

use crate::ast::FormulaExpr;
use crate::error::FormulaResult;
use crate::evaluator::{evaluate_expr, EvaluationContext, FormulaValue};

fn read(
    value: &CellValue,
    ctx: &EvaluationContext,
    f: &mut impl FnMut(f64),
) -> ControlFlow<CellError> {
    match value {
        CellValue::Number(n) => {
            f(*n);
            ControlFlow::Continue(())
        }
        CellValue::Error(e) if ctx.propagates() => ControlFlow::Break(*e),
        _ => ControlFlow::Continue(()),
    }
}

/// Feed every numeric operand to `f`. Breaks with the first error met under the
/// propagate policy.
///
/// Ranges must be unqualified; sheet-qualified ranges contribute nothing.
fn for_each_number(
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
    mut f: impl FnMut(f64),
) -> FormulaResult<ControlFlow<CellError>> {
    for arg in args {
        match arg {
            FormulaExpr::Missing => {}
            FormulaExpr::RangeRef(range) => {
                if let Some((sheet, range)) = ctx.local_range(range) {
                    for (_, cell) in sheet.cells_in(&range) {
                        if let ControlFlow::Break(e) = read(&cell.computed, ctx, &mut f) {
                            return Ok(ControlFlow::Break(e));
                        }
                    }
                }
            }
            FormulaExpr::CellRef(reference) => {
                if let Some((sheet, cell)) = ctx.resolve(reference) {
                    if let ControlFlow::Break(e) = read(&sheet.computed(&cell), ctx, &mut f) {
                        return Ok(ControlFlow::Break(e));
                    }
                }
            }
            expr => match evaluate_expr(expr, ctx)? {
                FormulaValue::Number(n) => f(n),
                FormulaValue::Error(e) => return Ok(ControlFlow::Break(e)),
                _ => {}
            },
        }
    }
    Ok(ControlFlow::Continue(()))
}

/// SUM(item, ...)
pub fn fn_sum(args: &[FormulaExpr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut total = 0.0;
    match for_each_number(args, ctx, |n| total += n)? {
        ControlFlow::Break(e) => Ok(FormulaValue::Error(e)),
        ControlFlow::Continue(()) => Ok(FormulaValue::Number(total)),
    }
}

/// AVERAGE(item, ...) - 0 when nothing numeric was found
pub fn fn_average(args: &[FormulaExpr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut total = 0.0;
    let mut count = 0usize;
    let flow = for_each_number(args, ctx, |n| {
        total += n;
        count += 1;
    })?;
    match flow {
        ControlFlow::Break(e) => Ok(FormulaValue::Error(e)),
        ControlFlow::Continue(()) if count == 0 => Ok(FormulaValue::Number(0.0)),
        ControlFlow::Continue(()) => Ok(FormulaValue::Number(total / count as f64)),
    }
}
