//! Property-based tests for the output parser and the step ceiling.
//!
//! The parser must never panic on arbitrary model text, and no script of
//! model replies can push the engine past its step ceiling.

use anyhow::Result;
use async_trait::async_trait;
use proptest::prelude::*;
use sage_core::config::AgentConfig;
use sage_core::{ToolError, ToolHandler, ToolOutput, ToolSchema};
use sage_reasoning::api_types::ChatMessage;
use sage_reasoning::llm::{CompletionParams, LlmClient};
use sage_reasoning::output_parser::ReActOutputParser;
use sage_reasoning::{ReActEngine, ReasoningStep, ToolRegistry, FALLBACK_RESPONSE};
use serde_json::{json, Map, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

const REPLIES: &[&str] = &[
    "Thought: search\nAction: echo\nAction Input: {\"q\": \"x\"}",
    "Thought: bad tool\nAction: missing\nAction Input: {}",
    "Thought: broken input\nAction: echo\nAction Input: [1, 2]",
    "just some words",
    "",
    "Thought: done\nAnswer: 42",
];

struct Replay {
    replies: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

#[async_trait]
impl LlmClient for Replay {
    async fn complete(&self, _messages: &[ChatMessage], _params: &CompletionParams) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            Ok(REPLIES[0].to_string())
        } else {
            Ok(replies.remove(0))
        }
    }
}

struct Echo;

#[async_trait]
impl ToolHandler for Echo {
    fn name(&self) -> &str {
        "echo"
    }
    fn schema(&self) -> ToolSchema {
        ToolSchema::object("echo", "Echo.", json!({}), &[])
    }
    async fn execute(&self, input: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::new("echo", Value::Object(input.clone()), json!("echo")))
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// **Never panics** on arbitrary Unicode, and any action carries an object.
    #[test]
    fn parser_never_panics(s in "\\PC{0,600}") {
        for parser in [ReActOutputParser::new(), ReActOutputParser::lenient()] {
            if let Ok(ReasoningStep::Action { action, .. }) = parser.parse(&s) {
                prop_assert!(!action.trim().is_empty());
            }
        }
    }

    /// Grammar-shaped noise around the markers must not panic either.
    #[test]
    fn parser_survives_marker_soup(
        parts in proptest::collection::vec(
            prop_oneof![
                Just("Thought:".to_string()),
                Just("Action:".to_string()),
                Just("Action Input:".to_string()),
                Just("Answer:".to_string()),
                Just("Observation:".to_string()),
                Just("```json".to_string()),
                Just("{".to_string()),
                Just("}".to_string()),
                Just("\n".to_string()),
                "[a-z' \":]{0,12}",
            ],
            0..30,
        )
    ) {
        let text = parts.concat();
        let _ = ReActOutputParser::new().parse(&text);
    }

    /// **Termination**: the trace never exceeds the ceiling and the model is
    /// called at most once per allowed step.
    #[test]
    fn engine_respects_ceiling(
        max_steps in 1usize..8,
        script in proptest::collection::vec(0usize..REPLIES.len(), 0..12),
    ) {
        let llm = Arc::new(Replay {
            replies: Mutex::new(script.iter().map(|&i| REPLIES[i].to_string()).collect()),
            calls: AtomicUsize::new(0),
        });
        let tools = Arc::new(ToolRegistry::new().with(Box::new(Echo)));
        let config = AgentConfig { max_reasoning_steps: max_steps, ..AgentConfig::default() };
        let mut engine = ReActEngine::new(llm.clone(), tools, &config);

        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let result = rt.block_on(engine.run("q"));

        prop_assert!(result.reasoning.len() <= max_steps);
        prop_assert!(llm.calls.load(Ordering::SeqCst) <= max_steps);
        let finished = result.reasoning.last().map(|s| s.is_done()).unwrap_or(false);
        prop_assert!(finished || result.response == FALLBACK_RESPONSE);
        prop_assert_eq!(engine.memory().len(), 2);

        // Every action that is not the final recorded step gets exactly one observation.
        for pair in result.reasoning.windows(2) {
            if matches!(pair[0], ReasoningStep::Action { .. }) {
                let followed_by_observation = matches!(pair[1], ReasoningStep::Observation { .. });
                prop_assert!(followed_by_observation);
            }
        }
    }
}
