use thiserror::Error;

use crate::prompts;

/// Failures surfaced to the user through the error banner.
///
/// Neither kind is fatal: the controller stays usable and the user may
/// simply resubmit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// No credential entered yet, detected before any remote call
    #[error("{}", prompts::MISSING_CREDENTIAL)]
    MissingCredential,

    /// The generation call failed; holds the failure's description
    #[error("{0}")]
    Remote(String),
}

impl ChatError {
    /// Render a transport error with its full context chain
    pub fn from_remote(err: anyhow::Error) -> Self {
        ChatError::Remote(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn test_missing_credential_message() {
        assert_eq!(ChatError::MissingCredential.to_string(), "credential required");
    }

    #[test]
    fn test_remote_keeps_plain_description() {
        let err = ChatError::from_remote(anyhow!("boom"));
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_remote_includes_context_chain() {
        let result: anyhow::Result<()> = Err(anyhow!("connection reset")).context("Gemini request failed");
        let err = ChatError::from_remote(result.unwrap_err());
        assert_eq!(err.to_string(), "Gemini request failed: connection reset");
    }
}
