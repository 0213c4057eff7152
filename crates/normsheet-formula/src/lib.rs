//! # normsheet-formula
//!
//! Formula parser and evaluator for normsheet.
//!
//! This crate provides:
//! - Formula parsing (text → AST)
//! - Reference resolution across sheets and instances
//! - Formula evaluation (AST → value), with the SUM/AVERAGE/VLOOKUP/MATCH/CHOOSE
//!   built-ins under their English and Spanish names
//! - Custom functions evaluated by a remote service
//! - Dependency tracking for recalculation
//!
//! ## Example
//!
//! ```rust
//! use normsheet_core::{CellValue, Instance, WorkbookStore};
//! use normsheet_formula::{evaluate, CustomFunctionBridge, CustomFunctionRegistry, EvaluationContext, Unavailable};
//!
//! let mut store = WorkbookStore::new();
//! let mut instance = Instance::new("design");
//! instance.sheet_mut("Hoja1").unwrap().set_input("A1", "4").unwrap();
//! store.add_instance(instance).unwrap();
//!
//! let registry = CustomFunctionRegistry::new();
//! let bridge = CustomFunctionBridge::new(&registry, &Unavailable);
//! let ctx = EvaluationContext::new(&store, "design", "Hoja1");
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! let value = rt.block_on(evaluate("=SUM(A1, 2)*10", &ctx, &bridge));
//! assert_eq!(value, CellValue::Number(60.0));
//! ```

pub mod ast;
pub mod custom;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod reference;

pub use ast::{
    BinaryOperator, CellReference, FormulaExpr, RangeReference, SheetQualifier, UnaryOperator,
};
pub use custom::{
    BridgeError, CallArgument, CustomFunctionBridge, CustomFunctionRegistry, EvaluationRequest,
    EvaluationResponse, FunctionCall, FunctionEvaluator, FunctionResult, Parameters, ResultValue,
    Unavailable,
};
pub use dependency::DependencyGraph;
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, evaluate_expr, ErrorPropagation, EvaluationContext, FormulaValue};
pub use parser::parse_formula;
pub use reference::{resolve, ResolvedRef};
