pub mod api_types;
pub mod engine;
pub mod formatter;
pub mod llm;
pub mod output_parser;
pub mod prompts;
pub mod providers;
pub mod retry;
pub mod steps;
pub mod tool_registry;

pub use engine::{ReActEngine, FALLBACK_RESPONSE};
pub use llm::{CompletionParams, LlmClient};
pub use steps::{EngineResult, ReasoningStep, ToolCall};
pub use tool_registry::{DispatchError, ToolRegistry};
