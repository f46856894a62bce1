//! Reasoning-step vocabulary shared by the parser, the formatter and the engine.

use sage_core::ToolOutput;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry of the reasoning trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReasoningStep {
    /// The model chose a tool to call.
    Action {
        thought: String,
        action: String,
        action_input: Map<String, Value>,
    },
    /// The model produced its answer.
    Final { thought: String, response: String },
    /// Outcome of an action, or a description of a failed cycle.
    Observation { observation: String },
}

impl ReasoningStep {
    pub fn observation(text: impl Into<String>) -> Self {
        ReasoningStep::Observation {
            observation: text.into(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ReasoningStep::Final { .. })
    }

    /// The step rendered in the grammar the model writes and reads.
    pub fn content(&self) -> String {
        match self {
            ReasoningStep::Action {
                thought,
                action,
                action_input,
            } => format!(
                "Thought: {thought}\nAction: {action}\nAction Input: {}",
                Value::Object(action_input.clone())
            ),
            ReasoningStep::Final { thought, response } => {
                format!("Thought: {thought}\nAnswer: {response}")
            }
            ReasoningStep::Observation { observation } => format!("Observation: {observation}"),
        }
    }

    /// The tool call an action step requests.
    pub fn tool_call(&self) -> Option<ToolCall> {
        match self {
            ReasoningStep::Action {
                action,
                action_input,
                ..
            } => Some(ToolCall {
                tool_name: action.clone(),
                arguments: action_input.clone(),
            }),
            _ => None,
        }
    }
}

/// A tool invocation requested by an action step. Consumed by dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

/// Terminal artifact of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResult {
    pub response: String,
    pub reasoning: Vec<ReasoningStep>,
    pub sources: Vec<ToolOutput>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action() -> ReasoningStep {
        ReasoningStep::Action {
            thought: "I should look it up".into(),
            action: "lookup".into(),
            action_input: json!({"term": "Paris"}).as_object().unwrap().clone(),
        }
    }

    #[test]
    fn test_action_content() {
        assert_eq!(
            action().content(),
            "Thought: I should look it up\nAction: lookup\nAction Input: {\"term\":\"Paris\"}"
        );
    }

    #[test]
    fn test_final_and_observation_content() {
        let fin = ReasoningStep::Final {
            thought: "done".into(),
            response: "Paris".into(),
        };
        assert_eq!(fin.content(), "Thought: done\nAnswer: Paris");
        assert!(fin.is_done());
        assert_eq!(
            ReasoningStep::observation("it rained").content(),
            "Observation: it rained"
        );
    }

    #[test]
    fn test_tool_call_only_for_actions() {
        let call = action().tool_call().unwrap();
        assert_eq!(call.tool_name, "lookup");
        assert_eq!(call.arguments["term"], "Paris");
        assert!(ReasoningStep::observation("x").tool_call().is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(action()).unwrap();
        assert_eq!(json["type"], "action");
        assert_eq!(json["action_input"]["term"], "Paris");
        let json = serde_json::to_value(ReasoningStep::observation("o")).unwrap();
        assert_eq!(json, json!({"type": "observation", "observation": "o"}));
    }
}
