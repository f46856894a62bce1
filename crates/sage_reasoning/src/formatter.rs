use crate::api_types::{ChatMessage, ChatRole};
use crate::prompts::{CONTEXT_BLOCK, REACT_SYSTEM_HEADER};
use crate::steps::ReasoningStep;
use sage_core::{Message, ToolSchema};

/// Assembles the model input for the next reasoning cycle.
///
/// Output order: one system message, the conversation window, then the
/// reasoning trace verbatim (observations as user turns, everything else
/// as assistant turns). Identical inputs always produce identical output.
#[derive(Debug, Clone)]
pub struct ReActChatFormatter {
    system_header: String,
    context: Option<String>,
}

impl Default for ReActChatFormatter {
    fn default() -> Self {
        Self::new(REACT_SYSTEM_HEADER, None)
    }
}

impl ReActChatFormatter {
    pub fn new(system_header: impl Into<String>, context: Option<String>) -> Self {
        Self {
            system_header: system_header.into(),
            context: context.filter(|c| !c.trim().is_empty()),
        }
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn format(
        &self,
        tools: &[ToolSchema],
        chat_history: &[Message],
        current_reasoning: &[ReasoningStep],
    ) -> Vec<ChatMessage> {
        let mut messages =
            Vec::with_capacity(1 + chat_history.len() + current_reasoning.len());
        messages.push(ChatMessage::new(ChatRole::System, self.system_prompt(tools)));
        messages.extend(chat_history.iter().map(ChatMessage::from));
        messages.extend(current_reasoning.iter().map(|step| {
            let role = match step {
                ReasoningStep::Observation { .. } => ChatRole::User,
                ReasoningStep::Action { .. } | ReasoningStep::Final { .. } => ChatRole::Assistant,
            };
            ChatMessage::new(role, step.content())
        }));
        messages
    }

    fn system_prompt(&self, tools: &[ToolSchema]) -> String {
        let tool_names = tools
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut prompt = self
            .system_header
            .replace("{tool_desc}", &tool_descriptions(tools))
            .replace("{tool_names}", &tool_names);
        if let Some(ref context) = self.context {
            prompt.push_str(&CONTEXT_BLOCK.replace("{context}", context));
        }
        prompt
    }
}

fn tool_descriptions(tools: &[ToolSchema]) -> String {
    tools
        .iter()
        .map(|t| {
            format!(
                "> Tool Name: {}\nTool Description: {}\nTool Args: {}\n",
                t.name, t.description, t.parameters
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lookup_schema() -> ToolSchema {
        ToolSchema::object(
            "lookup",
            "Look up a term.",
            json!({"term": {"type": "string"}}),
            &["term"],
        )
    }

    fn trace() -> Vec<ReasoningStep> {
        vec![
            ReasoningStep::Action {
                thought: "search".into(),
                action: "lookup".into(),
                action_input: json!({"term": "Paris"}).as_object().unwrap().clone(),
            },
            ReasoningStep::observation("Paris is the capital of France"),
        ]
    }

    #[test]
    fn test_system_prompt_lists_tools() {
        let formatter = ReActChatFormatter::default();
        let msgs = formatter.format(&[lookup_schema()], &[], &[]);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, ChatRole::System);
        assert!(msgs[0].content.contains("> Tool Name: lookup"));
        assert!(msgs[0].content.contains("Tool Description: Look up a term."));
        assert!(msgs[0].content.contains("(one of lookup)"));
        assert!(!msgs[0].content.contains("{tool_desc}"));
    }

    #[test]
    fn test_history_then_trace_order() {
        let formatter = ReActChatFormatter::default();
        let history = vec![Message::user("What is the capital of France?")];
        let msgs = formatter.format(&[lookup_schema()], &history, &trace());
        let roles: Vec<ChatRole> = msgs.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![ChatRole::System, ChatRole::User, ChatRole::Assistant, ChatRole::User]
        );
        assert!(msgs[2].content.starts_with("Thought: search\nAction: lookup"));
        assert_eq!(msgs[3].content, "Observation: Paris is the capital of France");
    }

    #[test]
    fn test_extra_context_appended() {
        let formatter = ReActChatFormatter::default().with_context(Some("Be brief.".into()));
        let msgs = formatter.format(&[], &[], &[]);
        assert!(msgs[0]
            .content
            .ends_with("Here is some context to help you answer the question:\nBe brief.\n"));
    }

    #[test]
    fn test_blank_context_ignored() {
        let formatter = ReActChatFormatter::new("header", Some("   ".into()));
        let msgs = formatter.format(&[], &[], &[]);
        assert_eq!(msgs[0].content, "header");
    }

    #[test]
    fn test_deterministic() {
        let formatter = ReActChatFormatter::default();
        let history = vec![Message::user("q")];
        let a = formatter.format(&[lookup_schema()], &history, &trace());
        let b = formatter.format(&[lookup_schema()], &history, &trace());
        assert_eq!(a, b);
    }
}
