use serde::{Deserialize, Serialize};

use crate::core::ReviewError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered, append-only message history sent to the LLM.
///
/// Messages can only be pushed; nothing already in the history is ever
/// rewritten or dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a conversation with the four opening messages in their fixed order.
    pub fn seeded(
        system: impl Into<String>,
        description: impl Into<String>,
        diff: impl Into<String>,
        final_instruction: impl Into<String>,
    ) -> Self {
        Self {
            messages: vec![
                Message::system(system),
                Message::user(description),
                Message::user(diff),
                Message::user(final_instruction),
            ],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Rejects conversations that cannot be sent to a backend.
    pub fn ensure_sendable(&self) -> Result<(), ReviewError> {
        if self.is_empty() {
            return Err(ReviewError::Configuration(
                "cannot send an empty conversation".to_string(),
            ));
        }
        Ok(())
    }

    /// Message contents joined by newlines, as shown by `--show-prompt`.
    pub fn render(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_order_is_fixed() {
        let conversation = Conversation::seeded("sys", "desc", "diff", "final");
        let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::User, Role::User]);
        assert_eq!(conversation.messages()[2].content, "diff");
    }

    #[test]
    fn empty_conversation_is_not_sendable() {
        let err = Conversation::new().ensure_sendable().unwrap_err();
        assert!(matches!(err, ReviewError::Configuration(_)));
    }

    #[test]
    fn serializes_as_role_content_array() {
        let mut conversation = Conversation::new();
        conversation.push(Message::assistant("hi"));
        let json = serde_json::to_value(&conversation).unwrap();
        assert_eq!(json, serde_json::json!([{"role": "assistant", "content": "hi"}]));
    }

    #[test]
    fn render_joins_contents() {
        let conversation = Conversation::seeded("a", "b", "c", "d");
        assert_eq!(conversation.render(), "a\nb\nc\nd");
    }
}
