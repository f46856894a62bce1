//! Parse raw model text into a typed reasoning step.
//!
//! Recognised forms (priority order):
//! 1. `<tool_call>{"name":"lookup","arguments":{"term":"Paris"}}</tool_call>`
//! 2. `Thought: ...\nAction: lookup\nAction Input: {"term": "Paris"}`
//! 3. `Thought: ...\nAnswer: ...`
//!
//! An `Action:` marker wins over an `Answer:` marker, and a tag only counts
//! when no `Answer:` marker precedes it. Anything else is a
//! [`ParseError`]; parsing never panics and performs no I/O.

use crate::steps::ReasoningStep;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use thiserror::Error;

static RE_TOOL_CALL_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?si)<\s*tool_call\s*>(.*?)<\s*/\s*tool_call\s*>").unwrap());
static RE_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Thought:\s*(.*?)\n+\s*Action:\s*([^\n()]+?)\s*\n+\s*Action Input:\s*(.*)$")
        .unwrap()
});
static RE_FINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Thought:(.*?)Answer:(.*)$").unwrap());
static RE_CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*\n?(.*?)```").unwrap());

/// Thought recorded for answers given without the `Thought:` preamble.
pub const IMPLICIT_THOUGHT: &str = "(Implicit) I can answer without any more tools!";
/// Thought recorded for tagged tool calls with no surrounding prose.
pub const IMPLICIT_ACTION_THOUGHT: &str = "(Implicit) I need to use a tool.";

const MAX_ERROR_EXCERPT: usize = 200;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("model output was empty")]
    Empty,
    #[error("could not parse output: {0}")]
    Unrecognized(String),
    #[error("could not extract tool use from output: {0}")]
    MalformedAction(String),
    #[error("could not parse action input {input}: {reason}")]
    InvalidActionInput { input: String, reason: String },
    #[error("could not extract final answer from output: {0}")]
    MalformedAnswer(String),
}

#[derive(Debug, Clone, Default)]
pub struct ReActOutputParser {
    implicit_final_answer: bool,
}

impl ReActOutputParser {
    /// Strict parser: output must follow one of the recognised forms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser that takes bare prose (no `Thought:` marker) as a final answer.
    pub fn lenient() -> Self {
        Self {
            implicit_final_answer: true,
        }
    }

    pub fn with_implicit_final_answer(mut self, enabled: bool) -> Self {
        self.implicit_final_answer = enabled;
        self
    }

    pub fn parse(&self, output: &str) -> Result<ReasoningStep, ParseError> {
        let text = output.trim();
        if text.is_empty() {
            return Err(ParseError::Empty);
        }

        if let Some(step) = parse_tagged_action(text)? {
            return Ok(step);
        }

        if !text.contains("Thought:") {
            if self.implicit_final_answer {
                return Ok(ReasoningStep::Final {
                    thought: IMPLICIT_THOUGHT.to_string(),
                    response: text.to_string(),
                });
            }
            return Err(ParseError::Unrecognized(excerpt(text)));
        }

        if text.contains("Action:") {
            return parse_action(text);
        }
        if text.contains("Answer:") {
            return parse_final(text);
        }
        Err(ParseError::Unrecognized(excerpt(text)))
    }
}

fn parse_tagged_action(text: &str) -> Result<Option<ReasoningStep>, ParseError> {
    let Some(caps) = RE_TOOL_CALL_TAG.captures(text) else {
        return Ok(None);
    };
    let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
        return Ok(None);
    };
    // A tag quoted inside an answer is part of the answer.
    if text[..whole.start()].contains("Answer:") {
        return Ok(None);
    }
    let (action, action_input) = try_parse_tool_json(inner.as_str().trim())?;

    let prose = text[..whole.start()].trim();
    let prose = prose.strip_prefix("Thought:").unwrap_or(prose).trim();
    let thought = if prose.is_empty() {
        IMPLICIT_ACTION_THOUGHT.to_string()
    } else {
        prose.to_string()
    };

    Ok(Some(ReasoningStep::Action {
        thought,
        action,
        action_input,
    }))
}

fn parse_action(text: &str) -> Result<ReasoningStep, ParseError> {
    let caps = RE_ACTION
        .captures(text)
        .ok_or_else(|| ParseError::MalformedAction(excerpt(text)))?;
    let thought = caps.get(1).map_or("", |m| m.as_str()).trim();
    let action = caps
        .get(2)
        .map_or("", |m| m.as_str())
        .trim()
        .trim_matches(|c| c == '`' || c == '"' || c == '\'');
    let raw_input = caps.get(3).map_or("", |m| m.as_str());

    if action.is_empty() {
        return Err(ParseError::MalformedAction(excerpt(text)));
    }

    Ok(ReasoningStep::Action {
        thought: thought.to_string(),
        action: action.to_string(),
        action_input: parse_action_input(raw_input)?,
    })
}

fn parse_final(text: &str) -> Result<ReasoningStep, ParseError> {
    let caps = RE_FINAL
        .captures(text)
        .ok_or_else(|| ParseError::MalformedAnswer(excerpt(text)))?;
    let thought = caps.get(1).map_or("", |m| m.as_str()).trim();
    let response = caps.get(2).map_or("", |m| m.as_str()).trim();
    if response.is_empty() {
        return Err(ParseError::MalformedAnswer(excerpt(text)));
    }
    Ok(ReasoningStep::Final {
        thought: thought.to_string(),
        response: response.to_string(),
    })
}

/// Extract the JSON object following `Action Input:`.
fn parse_action_input(raw: &str) -> Result<Map<String, Value>, ParseError> {
    // A hallucinated observation is never part of the input.
    let raw = raw.split("\nObservation:").next().unwrap_or(raw);
    let raw = match RE_CODE_FENCE.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw,
    };

    let invalid = |reason: &str| ParseError::InvalidActionInput {
        input: excerpt(raw.trim()),
        reason: reason.to_string(),
    };

    let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
        return Err(invalid("expected a JSON object"));
    };
    if end < start {
        return Err(invalid("expected a JSON object"));
    }
    let candidate = &raw[start..=end];

    let value = match serde_json::from_str::<Value>(candidate) {
        Ok(v) => v,
        // Models often emit Python-style dicts.
        Err(e) => serde_json::from_str::<Value>(&candidate.replace('\'', "\""))
            .map_err(|_| invalid(&e.to_string()))?,
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid("expected a JSON object")),
    }
}

/// Parse a tagged tool-call body.
/// Normalises field names: `tool` → `name`, `arguments`/`parameters` → `input`.
fn try_parse_tool_json(json_str: &str) -> Result<(String, Map<String, Value>), ParseError> {
    let malformed = || ParseError::MalformedAction(excerpt(json_str));

    let obj: Value = serde_json::from_str(json_str).map_err(|_| malformed())?;
    let map = obj.as_object().ok_or_else(malformed)?;

    let name = map
        .get("name")
        .or_else(|| map.get("tool"))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(malformed)?
        .to_string();

    let input = match map
        .get("input")
        .or_else(|| map.get("arguments"))
        .or_else(|| map.get("parameters"))
    {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(args)) => args.clone(),
        Some(other) => {
            return Err(ParseError::InvalidActionInput {
                input: excerpt(&other.to_string()),
                reason: "expected a JSON object".to_string(),
            })
        }
    };

    Ok((name, input))
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= MAX_ERROR_EXCERPT {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_ERROR_EXCERPT).collect();
    out.push_str("...");
    out
}
