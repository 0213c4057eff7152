//! Custom function definitions

use serde::{Deserialize, Serialize};

/// A user-defined function evaluated by the remote function service
///
/// `code` is the name used in formulas (`=TRAFO(A1, B1)`); `parameter_names` fixes
/// the order in which call arguments are bound to names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFunctionDefinition {
    pub code: String,
    #[serde(alias = "variables", default)]
    pub parameter_names: Vec<String>,
    #[serde(alias = "id")]
    pub remote_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CustomFunctionDefinition {
    /// Create a definition
    pub fn new<C, P, S>(code: C, parameter_names: P, remote_id: i64) -> Self
    where
        C: Into<String>,
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            code: code.into(),
            parameter_names: parameter_names.into_iter().map(Into::into).collect(),
            remote_id,
            name: None,
            description: None,
        }
    }
}
