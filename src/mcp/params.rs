//! Tool argument extraction.
//!
//! Same wire shape and schema as rmcp's `Parameters`, but arguments that fail
//! to decode come back as `InvalidArgument` with the gateway's error payload.

use crate::error::{GatewayError, GatewayResult};
use rmcp::ErrorData as McpError;
use rmcp::handler::server::common::FromContextPart;
use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

/// Deserialized tool arguments.
#[derive(Debug, Clone)]
pub struct Parameters<P>(pub P);

impl<P: DeserializeOwned> Parameters<P> {
    /// Decode raw call arguments. Missing arguments decode as `{}`.
    pub fn decode(arguments: Option<JsonObject>) -> GatewayResult<Self> {
        let arguments = arguments.unwrap_or_default();
        serde_json::from_value(JsonValue::Object(arguments))
            .map(Parameters)
            .map_err(|e| GatewayError::invalid_argument("arguments", e.to_string()))
    }
}

impl<P: JsonSchema> JsonSchema for Parameters<P> {
    fn schema_name() -> std::borrow::Cow<'static, str> {
        P::schema_name()
    }

    fn json_schema(generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        P::json_schema(generator)
    }
}

impl<S, P> FromContextPart<ToolCallContext<'_, S>> for Parameters<P>
where
    P: DeserializeOwned,
{
    fn from_context_part(context: &mut ToolCallContext<'_, S>) -> Result<Self, McpError> {
        Self::decode(context.arguments.take()).map_err(|err| {
            tracing::warn!(tool = %context.name, error = %err, "Tool arguments rejected");
            McpError::from(err)
        })
    }
}
