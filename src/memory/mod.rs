//! Conversation memory bounded by a token budget.
//!
//! The buffer is the most recent stretch of the transcript whose
//! estimated token count fits `max_token_limit`; older turns fall off
//! first. System messages never take part.

use crate::llm::{ChatMessage, Role};

#[derive(Debug, Clone)]
pub struct TokenBufferMemory {
    max_token_limit: usize,
}

impl Default for TokenBufferMemory {
    fn default() -> Self {
        Self::new(1800)
    }
}

impl TokenBufferMemory {
    pub fn new(max_token_limit: usize) -> Self {
        Self { max_token_limit }
    }

    pub fn max_token_limit(&self) -> usize {
        self.max_token_limit
    }

    /// The suffix of `messages` that fits the budget, in original order.
    pub fn window(&self, messages: &[ChatMessage]) -> Vec<ChatMessage> {
        let conversation: Vec<&ChatMessage> = messages
            .iter()
            .filter(|msg| msg.role != Role::System)
            .collect();

        let mut total = 0usize;
        let mut start = conversation.len();
        for (idx, msg) in conversation.iter().enumerate().rev() {
            let tokens = msg.tokens();
            if total + tokens > self.max_token_limit {
                break;
            }
            total += tokens;
            start = idx;
        }

        if start < conversation.len() && start > 0 {
            tracing::debug!("Memory dropped {} oldest messages", start);
        }

        conversation[start..].iter().map(|msg| (*msg).clone()).collect()
    }
}

/// Renders the buffer as `Human:`/`Assistant:` lines, each preceded by a newline.
pub fn format_history(messages: &[ChatMessage]) -> String {
    let mut buffer = String::new();
    for msg in messages {
        let prefix = match msg.role {
            Role::User => "Human",
            Role::Assistant => "Assistant",
            Role::System => continue,
        };
        buffer.push('\n');
        buffer.push_str(prefix);
        buffer.push_str(": ");
        buffer.push_str(&msg.content);
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript() -> Vec<ChatMessage> {
        vec![
            ChatMessage::system("ignored"),
            ChatMessage::user("a".repeat(40)),
            ChatMessage::assistant("b".repeat(40)),
            ChatMessage::user("c".repeat(40)),
            ChatMessage::assistant("d".repeat(40)),
        ]
    }

    #[test]
    fn keeps_everything_under_budget() {
        let memory = TokenBufferMemory::new(1800);
        let window = memory.window(&transcript());
        assert_eq!(window.len(), 4);
        assert!(window.iter().all(|m| m.role != Role::System));
    }

    #[test]
    fn drops_oldest_first_and_stays_within_budget() {
        // Each message is 10 tokens.
        let memory = TokenBufferMemory::new(25);
        let window = memory.window(&transcript());

        assert_eq!(window.len(), 2);
        assert!(window[0].content.starts_with('c'));
        assert!(window[1].content.starts_with('d'));
        let total: usize = window.iter().map(ChatMessage::tokens).sum();
        assert!(total <= 25);
    }

    #[test]
    fn oversized_latest_message_empties_the_buffer() {
        let memory = TokenBufferMemory::new(5);
        assert!(memory.window(&transcript()).is_empty());
    }

    #[test]
    fn history_is_formatted_as_dialogue() {
        let history = vec![
            ChatMessage::user("What is gout?"),
            ChatMessage::assistant("Urate crystal deposition."),
        ];
        assert_eq!(
            format_history(&history),
            "\nHuman: What is gout?\nAssistant: Urate crystal deposition."
        );
        assert_eq!(format_history(&[]), "");
    }
}
