//! Parameter binding for warehouse statements.
//!
//! Named `:marker` values are sent in the request's `parameters` array and never
//! spliced into the statement text.

use crate::models::{NamedParam, SqlStatement};
use serde::Serialize;

/// One entry of the statement API's `parameters` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementParameter {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub type_name: &'static str,
}

impl From<&NamedParam> for StatementParameter {
    fn from(param: &NamedParam) -> Self {
        Self {
            name: param.name.clone(),
            value: param.value.value_text(),
            type_name: param.value.type_name(),
        }
    }
}

/// Wire form of all parameters bound to `statement`.
pub fn statement_parameters(statement: &SqlStatement) -> Vec<StatementParameter> {
    statement.params.iter().map(Into::into).collect()
}
