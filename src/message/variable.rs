use serde::{Deserialize, Serialize};

use super::SymbolId;

/// Variable value as sent to the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Variable {
    Scalar(ScalarVariable),
    List(ListVariable),
}

impl Variable {
    pub fn id(&self) -> &SymbolId {
        match self {
            Variable::Scalar(v) => &v.id,
            Variable::List(v) => &v.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarVariable {
    pub id: SymbolId,
    pub value: String,
}

/// A list variable and zero or more materialized slices of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListVariable {
    pub id: SymbolId,
    pub length: usize,
    #[serde(default)]
    pub slices: Vec<ListSlice>,
}

/// Consecutive list values starting at `start_idx`
///
/// `values` may be shorter than requested when the list shrank while it was
/// being read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSlice {
    pub start_idx: i64,
    pub values: Vec<String>,
}
