//! Built-in functions
//!
//! Functions receive their arguments unevaluated so that they can read ranges
//! and references directly, and so that CHOOSE only evaluates the selected
//! option. Spanish and English names share an implementation.

pub mod aggregate;
pub mod lookup;

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::ast::FormulaExpr;
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};

/// Function implementation signature
pub type FunctionImpl = fn(&[FormulaExpr], &EvaluationContext) -> FormulaResult<FormulaValue>;

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    /// Check an argument count against the declared arity
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }
}

/// Function registry
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionDef>,
}

static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

/// The shared registry of built-in functions
pub fn function_registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        registry.register_aggregate_functions();
        registry.register_lookup_functions();

        registry
    }

    /// Look up a function by name, ignoring case
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn register_aggregate_functions(&mut self) {
        self.register(FunctionDef {
            name: "SUM",
            min_args: 0,
            max_args: None,
            implementation: aggregate::fn_sum,
        });

        self.register(FunctionDef {
            name: "AVERAGE",
            min_args: 0,
            max_args: None,
            implementation: aggregate::fn_average,
        });
    }

    fn register_lookup_functions(&mut self) {
        for name in ["VLOOKUP", "BUSCARV"] {
            self.register(FunctionDef {
                name,
                min_args: 3,
                max_args: Some(4),
                implementation: lookup::fn_vlookup,
            });
        }

        for name in ["MATCH", "COINCIDIR"] {
            self.register(FunctionDef {
                name,
                min_args: 2,
                max_args: Some(3),
                implementation: lookup::fn_match,
            });
        }

        // CHOOSE with fewer than two arguments reads as 0
        for name in ["CHOOSE", "ELEGIR"] {
            self.register(FunctionDef {
                name,
                min_args: 0,
                max_args: None,
                implementation: lookup::fn_choose,
            });
        }
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
