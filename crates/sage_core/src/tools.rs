//! Tool abstraction types shared by the reasoning engine and the concrete
//! tool implementations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Declared name, description and argument schema of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema (`{"type": "object", "properties": ..., "required": ...}`)
    /// describing the keyword arguments the tool accepts.
    pub parameters: Value,
}

impl ToolSchema {
    /// Build an object schema from a `properties` map and required keys.
    pub fn object(
        name: impl Into<String>,
        description: impl Into<String>,
        properties: Value,
        required: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

/// Successful result of one tool invocation.
///
/// `content` is the human-readable text fed back to the model as an
/// observation; `raw_output` is the structured form reported in `sources`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_name: String,
    pub content: String,
    pub raw_input: Value,
    pub raw_output: Value,
}

impl ToolOutput {
    pub fn new(tool_name: impl Into<String>, raw_input: Value, raw_output: Value) -> Self {
        let content = match &raw_output {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self {
            tool_name: tool_name.into(),
            content,
            raw_input,
            raw_output,
        }
    }

    /// Override the observation text while keeping the structured output.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }
}

/// Classification of tool execution errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    /// Transient: timeout, connection reset, worth retrying.
    Transient,
    /// Permanent: bad arguments, missing resource, retrying won't help.
    Permanent,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolError {
    #[error("missing required parameter: \"{0}\"")]
    MissingParameter(String),
    #[error("invalid parameter \"{name}\": {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("{0}")]
    Transient(String),
    #[error("{0}")]
    Permanent(String),
}

impl ToolError {
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            ToolError::Transient(_) => ToolErrorKind::Transient,
            _ => ToolErrorKind::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ToolErrorKind::Transient
    }
}

/// A capability the engine can invoke by name with keyword arguments.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    /// Unique name used for dispatch (must match the name in the schema).
    fn name(&self) -> &str;
    /// JSON schema shown to the model so it knows how to call this tool.
    fn schema(&self) -> ToolSchema;
    /// Execute the tool with the given argument object.
    async fn execute(&self, input: &serde_json::Map<String, Value>)
        -> Result<ToolOutput, ToolError>;
}

/// Fetch a required string argument.
pub fn required_str<'a>(
    input: &'a serde_json::Map<String, Value>,
    key: &str,
) -> Result<&'a str, ToolError> {
    match input.get(key) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(ToolError::InvalidParameter {
            name: key.to_string(),
            reason: format!("expected a string, got {other}"),
        }),
        None => Err(ToolError::MissingParameter(key.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_output_content_from_string() {
        let out = ToolOutput::new("t", json!({}), json!("plain"));
        assert_eq!(out.content, "plain");
    }

    #[test]
    fn test_tool_output_content_from_json() {
        let out = ToolOutput::new("t", json!({}), json!({"a": 1}));
        assert_eq!(out.content, r#"{"a":1}"#);
        let out = out.with_content("custom");
        assert_eq!(out.content, "custom");
        assert_eq!(out.raw_output, json!({"a": 1}));
    }

    #[test]
    fn test_error_kinds() {
        assert!(ToolError::Transient("x".into()).is_transient());
        assert_eq!(
            ToolError::MissingParameter("q".into()).kind(),
            ToolErrorKind::Permanent
        );
        assert_eq!(
            ToolError::MissingParameter("query".into()).to_string(),
            "missing required parameter: \"query\""
        );
    }

    #[test]
    fn test_required_str() {
        let input = json!({"query": "Paris", "n": 3});
        let map = input.as_object().unwrap();
        assert_eq!(required_str(map, "query").unwrap(), "Paris");
        assert!(matches!(
            required_str(map, "n"),
            Err(ToolError::InvalidParameter { .. })
        ));
        assert!(matches!(
            required_str(map, "missing"),
            Err(ToolError::MissingParameter(_))
        ));
    }

    #[test]
    fn test_schema_object() {
        let schema = ToolSchema::object("s", "d", json!({"q": {"type": "string"}}), &["q"]);
        assert_eq!(schema.parameters["type"], "object");
        assert_eq!(schema.parameters["required"][0], "q");
    }
}
