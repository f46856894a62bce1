use sage_core::{ToolError, ToolHandler, ToolOutput, ToolSchema};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Why a dispatched tool call produced no output.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    #[error("Tool {0} does not exist")]
    UnknownTool(String),
    #[error("Error calling tool {tool}: {source}")]
    Failed { tool: String, source: ToolError },
    #[error("Error calling tool {tool}: timed out after {after:?}")]
    TimedOut { tool: String, after: Duration },
}

impl DispatchError {
    pub fn is_transient(&self) -> bool {
        match self {
            DispatchError::UnknownTool(_) => false,
            DispatchError::Failed { source, .. } => source.is_transient(),
            DispatchError::TimedOut { .. } => true,
        }
    }
}

// ============================================================================
// ToolRegistry
// ============================================================================

/// Lookup from stable tool name to handler. Iteration is in name order so the
/// prompt built from it is deterministic.
#[derive(Default)]
pub struct ToolRegistry {
    handlers: BTreeMap<String, Box<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool handler. Overwrites any existing handler with the same name.
    pub fn register(&mut self, handler: Box<dyn ToolHandler>) {
        let name = handler.name().to_string();
        tracing::debug!("Registered tool: {}", name);
        if self.handlers.insert(name.clone(), handler).is_some() {
            tracing::warn!("Tool '{}' registered twice, keeping the latest", name);
        }
    }

    pub fn with(mut self, handler: Box<dyn ToolHandler>) -> Self {
        self.register(handler);
        self
    }

    /// Schemas of every registered tool, in name order.
    pub fn available_tools(&self) -> Vec<ToolSchema> {
        self.handlers.values().map(|h| h.schema()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Dispatch a tool call by name, bounded by `timeout`.
    pub async fn dispatch(
        &self,
        name: &str,
        input: &Map<String, Value>,
        timeout: Duration,
    ) -> Result<ToolOutput, DispatchError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| DispatchError::UnknownTool(name.to_string()))?;

        match tokio::time::timeout(timeout, handler.execute(input)).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(source)) => Err(DispatchError::Failed {
                tool: name.to_string(),
                source,
            }),
            Err(_) => Err(DispatchError::TimedOut {
                tool: name.to_string(),
                after: timeout,
            }),
        }
    }
}
