use crate::api_types::ChatMessage;
use crate::formatter::ReActChatFormatter;
use crate::llm::{CompletionParams, LlmClient};
use crate::output_parser::ReActOutputParser;
use crate::prompts::OBSERVATION_STOP;
use crate::steps::{EngineResult, ReasoningStep, ToolCall};
use crate::tool_registry::{DispatchError, ToolRegistry};
use sage_core::config::AgentConfig;
use sage_core::{Message, ToolOutput, ToolSchema};
use sage_memory::ConversationMemory;
use std::sync::Arc;
use std::time::Duration;

/// Returned, and remembered as the assistant turn, when the step ceiling is hit.
pub const FALLBACK_RESPONSE: &str = "Sorry, I couldn't find the answer to that.";

/// Pause before retrying a transient tool failure.
const TOOL_RETRY_DELAY: Duration = Duration::from_millis(500);

// ============================================================================
// Session state and cycle phases
// ============================================================================

/// Mutable state of one in-flight query. Created fresh for every query and
/// consumed when the query terminates.
#[derive(Debug, Default)]
struct SessionState {
    reasoning: Vec<ReasoningStep>,
    sources: Vec<ToolOutput>,
}

impl SessionState {
    fn record(&mut self, step: ReasoningStep) {
        self.reasoning.push(step);
    }

    fn observe(&mut self, text: impl Into<String>) {
        self.record(ReasoningStep::observation(text));
    }

    fn into_result(self, response: String) -> EngineResult {
        EngineResult {
            response,
            reasoning: self.reasoning,
            sources: self.sources,
        }
    }
}

/// Where the cycle goes next.
enum Phase {
    Prepare,
    AwaitModel(Vec<ChatMessage>),
    /// Raw model text, or a description of why the call failed.
    Decide(Result<String, String>),
    ToolDispatch(Vec<ToolCall>),
    Terminal(String),
}

// ============================================================================
// ReActEngine
// ============================================================================

/// Drives the Reason → Act → Observe cycle for one conversation.
///
/// One engine serves one session. `run` takes `&mut self`, so queries on the
/// same engine never overlap. Conversation memory persists across queries;
/// the reasoning trace and collected sources do not.
pub struct ReActEngine {
    client: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    tool_schemas: Vec<ToolSchema>,
    memory: ConversationMemory,
    formatter: ReActChatFormatter,
    parser: ReActOutputParser,
    params: CompletionParams,
    max_reasoning_steps: usize,
    model_timeout: Duration,
    tool_timeout: Duration,
    tool_max_retries: usize,
}

impl ReActEngine {
    pub fn new(client: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>, config: &AgentConfig) -> Self {
        let tool_schemas = tools.available_tools();
        let engine = Self {
            client,
            tools,
            tool_schemas,
            memory: ConversationMemory::with_budget(config.memory_budget_chars),
            formatter: ReActChatFormatter::default().with_context(config.extra_context.clone()),
            parser: ReActOutputParser::new()
                .with_implicit_final_answer(config.implicit_final_answer),
            params: CompletionParams::default(),
            max_reasoning_steps: config.max_reasoning_steps.max(1),
            model_timeout: config.model_timeout(),
            tool_timeout: config.tool_timeout(),
            tool_max_retries: config.tool_max_retries,
        };
        engine.with_params(CompletionParams::default())
    }

    /// Set sampling parameters. The observation stop sequence is always kept.
    pub fn with_params(mut self, mut params: CompletionParams) -> Self {
        if !params.stop.iter().any(|s| s == OBSERVATION_STOP) {
            params.stop.push(OBSERVATION_STOP.to_string());
        }
        self.params = params;
        self
    }

    pub fn with_formatter(mut self, formatter: ReActChatFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Answer one user query.
    ///
    /// Never fails: parse errors, model failures and tool failures are folded
    /// into the trace as observations, and the step ceiling guarantees
    /// termination after at most `max_reasoning_steps` model calls.
    #[tracing::instrument(skip(self, query), fields(max_steps = self.max_reasoning_steps))]
    pub async fn run(&mut self, query: &str) -> EngineResult {
        // NewQuery
        let mut session = SessionState::default();
        self.memory.put(Message::user(query));
        tracing::info!("New query ({} chars)", query.chars().count());

        let mut phase = Phase::Prepare;
        loop {
            phase = match phase {
                Phase::Prepare => self.prepare(&session),
                Phase::AwaitModel(input) => Phase::Decide(self.call_model(&input).await),
                Phase::Decide(output) => self.decide(&mut session, output),
                Phase::ToolDispatch(calls) => {
                    self.dispatch_tools(&mut session, calls).await;
                    Phase::Prepare
                }
                Phase::Terminal(response) => {
                    tracing::info!(
                        "Query finished after {} step(s), {} source(s)",
                        session.reasoning.len(),
                        session.sources.len()
                    );
                    return session.into_result(response);
                }
            };
        }
    }

    fn prepare(&mut self, session: &SessionState) -> Phase {
        // Observations count toward the ceiling too.
        if session.reasoning.len() >= self.max_reasoning_steps {
            return self.give_up();
        }
        let input = self
            .formatter
            .format(&self.tool_schemas, self.memory.get(), &session.reasoning);
        Phase::AwaitModel(input)
    }

    async fn call_model(&self, input: &[ChatMessage]) -> Result<String, String> {
        match tokio::time::timeout(self.model_timeout, self.client.complete(input, &self.params))
            .await
        {
            Ok(Ok(text)) => {
                tracing::debug!("LLM Text: {}", text);
                Ok(text)
            }
            Ok(Err(e)) => {
                tracing::warn!("LLM call failed: {:#}", e);
                Err(format!("{e:#}"))
            }
            Err(_) => {
                tracing::warn!("LLM call timed out after {:?}", self.model_timeout);
                Err(format!("timed out after {:?}", self.model_timeout))
            }
        }
    }

    fn decide(&mut self, session: &mut SessionState, output: Result<String, String>) -> Phase {
        let raw = match output {
            Ok(raw) => raw,
            Err(e) => {
                session.observe(format!("There was an error calling the language model: {e}"));
                return Phase::Prepare;
            }
        };

        let step = match self.parser.parse(&raw) {
            Ok(step) => step,
            Err(e) => {
                tracing::warn!("Unparseable reasoning step: {}", e);
                session.observe(format!("There was an error in parsing my reasoning: {e}"));
                return Phase::Prepare;
            }
        };

        session.record(step);
        let recorded = session.reasoning.len();
        match session.reasoning.last() {
            Some(ReasoningStep::Final { response, .. }) => {
                let response = response.clone();
                self.memory.put(Message::assistant(response.clone()));
                Phase::Terminal(response)
            }
            Some(_) if recorded >= self.max_reasoning_steps => self.give_up(),
            Some(step @ ReasoningStep::Action { .. }) => {
                Phase::ToolDispatch(step.tool_call().into_iter().collect())
            }
            Some(ReasoningStep::Observation { .. }) | None => {
                tracing::warn!("Reasoning step is neither an action nor an answer, iterating again");
                Phase::Prepare
            }
        }
    }

    async fn dispatch_tools(&self, session: &mut SessionState, calls: Vec<ToolCall>) {
        for call in calls {
            tracing::info!("Tool: {} input: {:?}", call.tool_name, call.arguments);
            match self.execute_tool_with_retry(&call).await {
                Ok(output) => {
                    session.observe(output.content.clone());
                    session.sources.push(output);
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    session.observe(e.to_string());
                }
            }
        }
    }

    /// Execute a tool, retrying transient failures.
    #[tracing::instrument(skip(self, call), fields(tool = %call.tool_name))]
    async fn execute_tool_with_retry(&self, call: &ToolCall) -> Result<ToolOutput, DispatchError> {
        let mut outcome = self.dispatch_once(call).await;

        for attempt in 1..=self.tool_max_retries {
            match &outcome {
                Err(e) if e.is_transient() => {}
                _ => break,
            }
            tracing::info!(
                "Retrying tool '{}' (attempt {}/{})",
                call.tool_name,
                attempt,
                self.tool_max_retries
            );
            tokio::time::sleep(TOOL_RETRY_DELAY).await;
            outcome = self.dispatch_once(call).await;
        }

        outcome
    }

    async fn dispatch_once(&self, call: &ToolCall) -> Result<ToolOutput, DispatchError> {
        self.tools
            .dispatch(&call.tool_name, &call.arguments, self.tool_timeout)
            .await
    }

    fn give_up(&mut self) -> Phase {
        tracing::warn!(
            "Step ceiling of {} reached, returning fallback response",
            self.max_reasoning_steps
        );
        self.memory.put(Message::assistant(FALLBACK_RESPONSE));
        Phase::Terminal(FALLBACK_RESPONSE.to_string())
    }
}
