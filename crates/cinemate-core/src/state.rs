//! UI-agnostic conversation state types
//!
//! This module contains data structures that are shared by every front end
//! and don't depend on any specific UI framework.

use serde::{Deserialize, Serialize};

use crate::prompts;

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Conversation style, selects the system instruction sent with every request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Chat,
    Quiz,
}

impl Mode {
    pub fn toggled(self) -> Self {
        match self {
            Mode::Chat => Mode::Quiz,
            Mode::Quiz => Mode::Chat,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mode::Chat => "CHAT",
            Mode::Quiz => "QUIZ",
        }
    }

    pub fn system_instruction(&self) -> &'static str {
        match self {
            Mode::Chat => prompts::CHAT_INSTRUCTION,
            Mode::Quiz => prompts::QUIZ_INSTRUCTION,
        }
    }
}

/// Append-only, ordered message history.
///
/// Insertion order is both the render order and the turn order sent to the
/// model. There is deliberately no way to remove or edit an entry.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// A fresh conversation holding only the assistant greeting
    pub fn seeded() -> Self {
        Self {
            messages: vec![ChatMessage::assistant(prompts::WELCOME_MESSAGE)],
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

}

impl Default for Conversation {
    fn default() -> Self {
        Self::seeded()
    }
}

/// Which observable parts of the controller changed since the last drain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeSet {
    pub history: bool,
    pub draft: bool,
    pub mode: bool,
    pub loading: bool,
    pub error: bool,
    pub credential: bool,
}

impl ChangeSet {
    pub fn any(&self) -> bool {
        self.history || self.draft || self.mode || self.loading || self.error || self.credential
    }

    /// History or loading moved, so the message view should follow the tail
    pub fn needs_scroll(&self) -> bool {
        self.history || self.loading
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_conversation_has_single_welcome() {
        let conversation = Conversation::seeded();
        assert_eq!(conversation.messages().len(), 1);
        let first = &conversation.messages()[0];
        assert_eq!(first.role, ChatRole::Assistant);
        assert_eq!(first.content, prompts::WELCOME_MESSAGE);
    }

    #[test]
    fn test_mode_toggle_flips() {
        assert_eq!(Mode::Chat.toggled(), Mode::Quiz);
        assert_eq!(Mode::Quiz.toggled(), Mode::Chat);
        assert_eq!(Mode::default(), Mode::Chat);
    }

    #[test]
    fn test_mode_selects_instruction() {
        assert!(Mode::Chat.system_instruction().starts_with("You are a film and series"));
        assert!(Mode::Quiz.system_instruction().starts_with("You are a film-and-soul mentor"));
    }

    #[test]
    fn test_change_set_scroll_only_for_history_or_loading() {
        let draft_only = ChangeSet {
            draft: true,
            ..Default::default()
        };
        assert!(draft_only.any());
        assert!(!draft_only.needs_scroll());

        let loading = ChangeSet {
            loading: true,
            ..Default::default()
        };
        assert!(loading.needs_scroll());
        assert!(!ChangeSet::default().any());
    }
}
