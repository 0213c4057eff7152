//! Custom function bridge
//!
//! Custom functions are user-defined codes (`=TRAFO(A1, B1)`) whose values come from
//! a remote function service. The formula evaluator resolves the call arguments and
//! hands them to [`CustomFunctionBridge::call`], which validates them, binds them to
//! the declared parameter names and asks a [`FunctionEvaluator`] for the result.
//!
//! The bridge never fails: every problem ends up as a [`CellError`] stored in the
//! calling cell.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use normsheet_core::{parse_number, CellError, CellValue, CustomFunctionDefinition};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

/// Registered custom functions, in registration order
///
/// Order matters: when a formula mentions several custom codes, the first
/// registered one wins.
#[derive(Debug, Clone, Default)]
pub struct CustomFunctionRegistry {
    definitions: Vec<CustomFunctionDefinition>,
}

impl CustomFunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions<I: IntoIterator<Item = CustomFunctionDefinition>>(definitions: I) -> Self {
        let mut registry = Self::new();
        for def in definitions {
            registry.register(def);
        }
        registry
    }

    /// Register a definition. A definition with the same code is replaced in place.
    pub fn register(&mut self, def: CustomFunctionDefinition) {
        match self.definitions.iter_mut().find(|d| d.code == def.code) {
            Some(existing) => *existing = def,
            None => self.definitions.push(def),
        }
    }

    /// Look up a definition by its exact code
    pub fn get(&self, code: &str) -> Option<&CustomFunctionDefinition> {
        self.definitions.iter().find(|d| d.code == code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CustomFunctionDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

// === Wire format ===

/// Named parameter values, serialized as a JSON object in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(pub Vec<(String, f64)>);

impl Parameters {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Parameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Parameters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ParametersVisitor;

        impl<'de> Visitor<'de> for ParametersVisitor {
            type Value = Parameters;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of parameter names to numbers")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Parameters, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, value)) = access.next_entry::<String, f64>()? {
                    entries.push((name, value));
                }
                Ok(Parameters(entries))
            }
        }

        deserializer.deserialize_map(ParametersVisitor)
    }
}

/// One function invocation sent to the remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Remote identifier of the function
    pub id: i64,
    pub parameters: Parameters,
}

/// Body of an evaluation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub functions: Vec<FunctionCall>,
}

/// A single result value: the service answers with numbers or numeric strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultValue {
    Number(f64),
    Text(String),
}

impl ResultValue {
    /// Numeric value, if finite
    pub fn to_number(&self) -> Option<f64> {
        let n = match self {
            ResultValue::Number(n) => *n,
            ResultValue::Text(s) => parse_number(s)?,
        };
        n.is_finite().then_some(n)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResult {
    #[serde(default)]
    pub result: Option<ResultValue>,
}

/// Body of an evaluation response; results match the request's functions by position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResponse {
    #[serde(default)]
    pub results: Vec<FunctionResult>,
}

impl EvaluationResponse {
    /// Response carrying plain numeric results
    pub fn numbers<I: IntoIterator<Item = f64>>(values: I) -> Self {
        Self {
            results: values
                .into_iter()
                .map(|n| FunctionResult {
                    result: Some(ResultValue::Number(n)),
                })
                .collect(),
        }
    }
}

/// Failures talking to the remote function service
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Function service answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Function service timed out")]
    Timeout,

    #[error("No function service configured")]
    Unavailable,
}

/// The remote collaborator that evaluates custom functions
pub trait FunctionEvaluator: Send + Sync {
    fn evaluate(
        &self,
        request: EvaluationRequest,
    ) -> impl Future<Output = Result<EvaluationResponse, BridgeError>> + Send;
}

/// Evaluator for setups without a function service: every call fails
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl FunctionEvaluator for Unavailable {
    fn evaluate(
        &self,
        _request: EvaluationRequest,
    ) -> impl Future<Output = Result<EvaluationResponse, BridgeError>> + Send {
        async { Err(BridgeError::Unavailable) }
    }
}

// === Bridge ===

/// A resolved call argument
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CallArgument {
    Number(f64),
    /// Empty argument
    Missing,
    /// Neither a reference nor a numeric literal
    Invalid,
}

impl CallArgument {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CallArgument::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Binds resolved arguments to a registry and a remote evaluator
pub struct CustomFunctionBridge<'a, E> {
    registry: &'a CustomFunctionRegistry,
    evaluator: &'a E,
    calls: AtomicUsize,
}

impl<'a, E: FunctionEvaluator> CustomFunctionBridge<'a, E> {
    pub fn new(registry: &'a CustomFunctionRegistry, evaluator: &'a E) -> Self {
        Self {
            registry,
            evaluator,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn registry(&self) -> &'a CustomFunctionRegistry {
        self.registry
    }

    /// Number of requests sent to the evaluator so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Evaluate a custom function call
    ///
    /// Arguments are bound to the declared parameter names in order; surplus
    /// arguments are ignored.
    pub async fn call(&self, code: &str, args: &[CallArgument]) -> CellValue {
        let Some(def) = self.registry.get(code) else {
            return CellValue::Error(CellError::FunctionNotFound);
        };
        if args.is_empty() {
            return CellValue::Error(CellError::MissingArgs);
        }
        if args.contains(&CallArgument::Missing) {
            return CellValue::Error(CellError::MissingArgument);
        }
        if args.contains(&CallArgument::Invalid) {
            return CellValue::Error(CellError::InvalidArgument);
        }
        if args.len() < def.parameter_names.len() {
            return CellValue::Error(CellError::MissingArgs);
        }

        let parameters = Parameters(
            def.parameter_names
                .iter()
                .cloned()
                .zip(args.iter().filter_map(CallArgument::as_number))
                .collect(),
        );
        let request = EvaluationRequest {
            functions: vec![FunctionCall {
                id: def.remote_id,
                parameters,
            }],
        };

        self.calls.fetch_add(1, Ordering::Relaxed);
        debug!(code, remote_id = def.remote_id, "calling custom function");

        match self.evaluator.evaluate(request).await {
            Ok(response) => {
                let value = response
                    .results
                    .first()
                    .and_then(|r| r.result.as_ref())
                    .and_then(ResultValue::to_number);
                match value {
                    Some(n) => CellValue::Number(n),
                    None => {
                        warn!(code, "custom function returned no numeric result");
                        CellValue::Error(CellError::Error)
                    }
                }
            }
            Err(e) => {
                warn!(code, error = %e, "custom function call failed");
                CellValue::Error(CellError::Error)
            }
        }
    }
}
