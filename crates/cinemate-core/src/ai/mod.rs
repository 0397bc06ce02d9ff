pub mod gemini;

pub use gemini::GeminiClient;

use anyhow::Result;
use async_trait::async_trait;

use crate::state::{ChatMessage, ChatRole, Mode};

/// One outbound turn of a generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: ChatRole,
    pub text: String,
}

impl Turn {
    /// The leading directive turn. The API has no system role inside
    /// `contents`, so it travels as a user turn.
    pub fn instruction(mode: Mode) -> Self {
        Self {
            role: ChatRole::User,
            text: mode.system_instruction().to_string(),
        }
    }
}

impl From<&ChatMessage> for Turn {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            text: message.content.clone(),
        }
    }
}

/// Remote text generation.
///
/// `Ok(None)` (or an empty string) means the call succeeded but carried no
/// reply text.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, model: &str, turns: &[Turn], credential: &str) -> Result<Option<String>>;
}
