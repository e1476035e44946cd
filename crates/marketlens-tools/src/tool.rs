use async_trait::async_trait;
use marketlens_core::MarketlensResult;
use serde::{Deserialize, Serialize};

/// Metadata describing a tool's interface, as surfaced to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub input_schema: serde_json::Value,
}

/// Trait that every tool implements.
///
/// Tools are stateless between calls: each invocation gets its full arguments
/// and returns a structured value or a domain error.
#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    async fn invoke(&self, args: serde_json::Value) -> MarketlensResult<serde_json::Value>;
}
