use sage_core::{Message, Role};
use serde::Serialize;

/// Ordered, append-only log of dialogue turns.
///
/// The log itself is never rewritten. An optional character budget limits
/// what [`ConversationMemory::get`] hands to the prompt formatter: the newest
/// turns that fit, never starting on an assistant turn. The newest turn is
/// always included even when it alone exceeds the budget.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    #[serde(skip)]
    budget_chars: Option<usize>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(budget_chars: Option<usize>) -> Self {
        Self {
            messages: Vec::new(),
            budget_chars,
        }
    }

    pub fn put(&mut self, message: Message) {
        tracing::debug!(
            "memory: {} turn appended ({} chars)",
            message.role.as_str(),
            message.content.chars().count()
        );
        self.messages.push(message);
    }

    /// The window of recent turns the model should see.
    pub fn get(&self) -> &[Message] {
        let Some(budget) = self.budget_chars else {
            return &self.messages;
        };
        if self.messages.is_empty() {
            return &self.messages;
        }

        let mut start = self.messages.len() - 1;
        let mut used = self.messages[start].content.chars().count();
        while start > 0 {
            let next = self.messages[start - 1].content.chars().count();
            if used + next > budget {
                break;
            }
            used += next;
            start -= 1;
        }

        // A window opening on an assistant reply has lost its question.
        while start < self.messages.len() - 1 && self.messages[start].role == Role::Assistant {
            start += 1;
        }
        &self.messages[start..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}
