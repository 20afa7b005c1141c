use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub content: String,
    pub role: Role,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: Role::User,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: Role::Assistant,
        }
    }
}

/// Conversation turns in the order they happened.
///
/// Only the trailing assistant message is ever rewritten or removed.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Overwrites the trailing assistant message. Returns false when the
    /// transcript does not end with one.
    pub fn replace_last_assistant(&mut self, content: &str) -> bool {
        match self.messages.last_mut() {
            Some(last) if last.role == Role::Assistant => {
                last.content.clear();
                last.content.push_str(content);
                true
            }
            _ => false,
        }
    }

    pub fn pop_last_assistant(&mut self) -> Option<ChatMessage> {
        match self.messages.last() {
            Some(last) if last.role == Role::Assistant => self.messages.pop(),
            _ => None,
        }
    }
}

/// Renders turns as `"<Role>: <content>"` blocks separated by blank lines,
/// closed by an `"Assistant:"` cue for the model to continue from.
pub fn format_prompt(turns: &[ChatMessage]) -> String {
    turns
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .chain(std::iter::once(format!("{}:", Role::Assistant.label())))
        .collect::<Vec<_>>()
        .join("\n\n")
}
