//! Formula Abstract Syntax Tree types

use normsheet_core::{CellRange, CellRef};

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),

    // === References ===
    /// Single cell reference
    CellRef(CellReference),
    /// Range reference
    RangeRef(RangeReference),

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    /// Function call; `name` keeps the case it was written in
    Function {
        name: String,
        args: Vec<FormulaExpr>,
    },

    // === Array ===
    /// Array literal, rows of columns (`{1;2;4}` is three rows)
    Array(Vec<Vec<FormulaExpr>>),

    /// An empty argument slot, as in `F(A1,,B1)`
    Missing,
}

impl FormulaExpr {
    /// Visit this expression and all sub-expressions in pre-order
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a FormulaExpr)) {
        visit(self);
        match self {
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.walk(visit),
            FormulaExpr::Function { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            FormulaExpr::Array(rows) => {
                for expr in rows.iter().flatten() {
                    expr.walk(visit);
                }
            }
            _ => {}
        }
    }

    /// First function call in pre-order whose name satisfies `pred`
    pub fn find_call(&self, pred: impl Fn(&str) -> bool) -> Option<(&str, &[FormulaExpr])> {
        let mut found = None;
        self.walk(&mut |expr| {
            if found.is_some() {
                return;
            }
            if let FormulaExpr::Function { name, args } = expr {
                if pred(name) {
                    found = Some((name.as_str(), args.as_slice()));
                }
            }
        });
        found
    }
}

/// Sheet (and optionally instance) qualifier of a reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SheetQualifier {
    /// Instance id for `instance:sheet!A1` references
    pub instance: Option<String>,
    /// Sheet id or display name
    pub sheet: String,
}

/// Cell reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct CellReference {
    pub sheet: Option<SheetQualifier>,
    pub address: CellRef,
}

/// Range reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct RangeReference {
    pub sheet: Option<SheetQualifier>,
    pub range: CellRange,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
}
