//! Lookup functions: VLOOKUP, MATCH and CHOOSE
//!
//! Structural problems (a table that is not a local range, a column outside the
//! table, an unknown match type) read as 0 rather than as errors.

use std::cmp::Ordering;

use normsheet_core::{CellRef, CellValue};

use crate::ast::FormulaExpr;
use crate::error::FormulaResult;
use crate::evaluator::{evaluate_expr, EvaluationContext, FormulaValue};

/// Numbers closer than this are equal in exact lookups
const NUMERIC_TOLERANCE: f64 = 1e-4;

fn zero() -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(0.0))
}

/// The value a lookup searches for
///
/// A reference yields the cell's actual computed value, text included; anything
/// else is evaluated.
fn lookup_operand(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match expr {
        FormulaExpr::CellRef(reference) => Ok(match ctx.resolve(reference) {
            Some((sheet, cell)) => match sheet.computed(&cell) {
                CellValue::Number(n) => FormulaValue::Number(n),
                CellValue::Text(s) => FormulaValue::String(s),
                CellValue::Empty => FormulaValue::String(String::new()),
                error @ CellValue::Error(_) => ctx.read_number(&error),
            },
            None => FormulaValue::Number(0.0),
        }),
        expr => evaluate_expr(expr, ctx),
    }
}

/// Table cells read as "" when empty
fn table_value(value: CellValue) -> FormulaValue {
    match value {
        CellValue::Empty => FormulaValue::String(String::new()),
        other => other.into(),
    }
}

fn values_equal(a: &FormulaValue, b: &FormulaValue) -> bool {
    match (a, b) {
        (FormulaValue::Number(x), FormulaValue::Number(y)) => (x - y).abs() < NUMERIC_TOLERANCE,
        _ => a.as_string().to_lowercase() == b.as_string().to_lowercase(),
    }
}

fn compare_values(a: &FormulaValue, b: &FormulaValue) -> Ordering {
    match (a, b) {
        (FormulaValue::Number(x), FormulaValue::Number(y)) => {
            x.partial_cmp(y).unwrap_or(Ordering::Equal)
        }
        _ => a
            .as_string()
            .to_lowercase()
            .cmp(&b.as_string().to_lowercase()),
    }
}

/// Is the optional `exact` argument of VLOOKUP true? Absent means true.
fn exact_flag(arg: Option<&FormulaExpr>, ctx: &EvaluationContext) -> FormulaResult<bool> {
    let expr = match arg {
        None | Some(FormulaExpr::Missing) => return Ok(true),
        Some(expr) => expr,
    };
    Ok(match evaluate_expr(expr, ctx)? {
        FormulaValue::Boolean(b) => b,
        FormulaValue::Number(n) => n == 1.0,
        FormulaValue::String(s) => s.eq_ignore_ascii_case("true") || s == "1",
        _ => false,
    })
}

/// VLOOKUP(lookup_value, table, col_index, [exact])
pub fn fn_vlookup(args: &[FormulaExpr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let lookup = lookup_operand(&args[0], ctx)?;
    if lookup.is_error() {
        return Ok(lookup);
    }

    let (sheet, table) = match &args[1] {
        FormulaExpr::RangeRef(range) => match ctx.local_range(range) {
            Some(found) => found,
            None => return zero(),
        },
        _ => return zero(),
    };

    let col_index = match evaluate_expr(&args[2], ctx)?.as_number() {
        Some(n) => n.trunc(),
        None => return zero(),
    };
    if col_index < 1.0 || col_index > f64::from(table.col_count()) {
        return zero();
    }
    let result_col = table.start.col + col_index as u16 - 1;
    let exact = exact_flag(args.get(3), ctx)?;

    let mut found = None;
    for row in table.start.row..=table.end.row {
        let key = table_value(sheet.computed(&CellRef::new(row, table.start.col)));
        if exact {
            if values_equal(&key, &lookup) {
                found = Some(row);
                break;
            }
        } else {
            match compare_values(&key, &lookup) {
                Ordering::Greater => break,
                _ => found = Some(row),
            }
        }
    }

    let value = found
        .and_then(|row| sheet.computed(&CellRef::new(row, result_col)).as_number())
        .unwrap_or(0.0);
    Ok(FormulaValue::Number(value))
}

/// MATCH(lookup_value, range_or_array, [match_type])
pub fn fn_match(args: &[FormulaExpr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let lookup = lookup_operand(&args[0], ctx)?;
    if lookup.is_error() {
        return Ok(lookup);
    }

    let candidates: Vec<FormulaValue> = match &args[1] {
        FormulaExpr::Array(rows) => {
            let mut values = Vec::new();
            for expr in rows.iter().flatten() {
                values.push(evaluate_expr(expr, ctx)?);
            }
            values
        }
        FormulaExpr::RangeRef(range) => match ctx.local_range(range) {
            Some((sheet, range)) if range.row_count() == 1 || range.col_count() == 1 => range
                .cells()
                .map(|cell| table_value(sheet.computed(&cell)))
                .collect(),
            _ => return zero(),
        },
        _ => return zero(),
    };

    let match_type = match args.get(2) {
        None | Some(FormulaExpr::Missing) => 0,
        Some(expr) => match evaluate_expr(expr, ctx)?.as_number() {
            Some(n) if n == 0.0 => 0,
            Some(n) if n == 1.0 => 1,
            Some(n) if n == -1.0 => -1,
            _ => return zero(),
        },
    };

    let position = match match_type {
        0 => candidates.iter().position(|c| values_equal(c, &lookup)),
        1 => {
            let Some(target) = lookup.as_number() else {
                return zero();
            };
            let mut last = None;
            for (i, candidate) in candidates.iter().enumerate() {
                let Some(n) = candidate.as_number() else {
                    continue;
                };
                if n > target {
                    break;
                }
                last = Some(i);
            }
            last
        }
        _ => {
            let Some(target) = lookup.as_number() else {
                return zero();
            };
            candidates
                .iter()
                .position(|c| c.as_number().is_some_and(|n| n >= target))
        }
    };

    Ok(FormulaValue::Number(position.map_or(0.0, |i| (i + 1) as f64)))
}

/// CHOOSE(index, option1, option2, ...) - only the selected option is evaluated
pub fn fn_choose(args: &[FormulaExpr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    if args.len() < 2 {
        return zero();
    }
    let index = match evaluate_expr(&args[0], ctx)? {
        FormulaValue::Number(n) => n.floor(),
        FormulaValue::Error(e) => return Ok(FormulaValue::Error(e)),
        _ => return zero(),
    };
    let options = &args[1..];
    if index < 1.0 || index > options.len() as f64 {
        return zero();
    }
    evaluate_expr(&options[index as usize - 1], ctx)
}
