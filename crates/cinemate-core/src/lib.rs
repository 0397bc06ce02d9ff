pub mod ai;
pub mod config;
pub mod controller;
pub mod error;
pub mod prompts;
pub mod state;

// Re-export main types for convenience
pub use ai::{GeminiClient, Generator, Turn};
pub use config::Config;
pub use controller::{ConversationController, PendingRequest, RequestId};
pub use error::ChatError;
pub use state::{ChangeSet, ChatMessage, ChatRole, Conversation, Mode};
