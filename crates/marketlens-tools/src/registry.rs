use crate::tool::{Tool, ToolDescriptor};
use marketlens_core::{MarketlensError, MarketlensResult, ToolCall, ToolResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Central registry for all available tools.
///
/// Registration order is preserved so the schema list sent to the model is stable.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Registers a tool. A tool with the same name replaces the earlier one in place.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.descriptor().name.clone();
        info!(tool = %name, "Registered tool");
        match self.index.get(&name) {
            Some(&pos) => self.tools[pos] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&pos| &self.tools[pos])
    }

    /// Descriptors in registration order.
    pub fn schemas(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor().clone()).collect()
    }

    /// Looks up `name` and invokes it with `args`. No retries.
    pub async fn dispatch(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> MarketlensResult<serde_json::Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| MarketlensError::UnknownTool(name.to_string()))?;
        tool.invoke(args).await
    }

    /// Dispatches a model-issued call, turning any failure into an error result.
    pub async fn dispatch_call(&self, call: &ToolCall) -> ToolResult {
        match self.dispatch(&call.name, call.arguments.clone()).await {
            Ok(value) => ToolResult::success(&call.id, value),
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool dispatch failed");
                ToolResult::error(&call.id, e)
            }
        }
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
