//! Conversation state and request lifecycle
//!
//! [`ConversationController`] owns everything a chat session needs: the
//! history, the draft, the mode, the loading flag, the last error and the
//! in-memory credential. Front ends mutate it only through the methods here
//! and learn about mutations by draining [`ChangeSet`]s.
//!
//! A send is split in two so an event loop never has to block on the
//! network: [`ConversationController::begin_send`] validates and returns a
//! [`PendingRequest`], the caller runs it wherever it likes, and
//! [`ConversationController::finish_send`] reconciles the outcome.
//! [`ConversationController::send_message`] does both around a single await.

use std::fmt;

use crate::ai::{Generator, Turn};
use crate::error::ChatError;
use crate::prompts;
use crate::state::{ChangeSet, ChatMessage, Conversation, Mode};

pub type RequestId = u64;

/// Everything needed to perform one generation call, detached from the
/// controller so it can be moved onto another task.
#[derive(Clone)]
pub struct PendingRequest {
    pub id: RequestId,
    pub model: String,
    pub turns: Vec<Turn>,
    pub credential: String,
}

impl PendingRequest {
    pub async fn run(&self, generator: &dyn Generator) -> Result<Option<String>, ChatError> {
        generator
            .generate(&self.model, &self.turns, &self.credential)
            .await
            .map_err(ChatError::from_remote)
    }
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("id", &self.id)
            .field("model", &self.model)
            .field("turns", &self.turns.len())
            .finish_non_exhaustive()
    }
}

pub struct ConversationController {
    conversation: Conversation,
    draft: String,
    mode: Mode,
    loading: bool,
    last_error: Option<String>,
    credential: Option<String>,
    model: String,
    in_flight: Option<RequestId>,
    next_request_id: RequestId,
    changes: ChangeSet,
}

impl ConversationController {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            conversation: Conversation::seeded(),
            draft: String::new(),
            mode: Mode::default(),
            loading: false,
            last_error: None,
            credential: None,
            model: model.into(),
            in_flight: None,
            next_request_id: 1,
            changes: ChangeSet::default(),
        }
    }

    // Snapshot access

    pub fn messages(&self) -> &[ChatMessage] {
        self.conversation.messages()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn in_flight(&self) -> Option<RequestId> {
        self.in_flight
    }

    pub fn quick_prompts(&self) -> &'static [&'static str] {
        &prompts::QUICK_PROMPTS
    }

    /// Drain the record of what changed since the previous call
    pub fn take_changes(&mut self) -> ChangeSet {
        std::mem::take(&mut self.changes)
    }

    // Mutations

    pub fn append_message(&mut self, message: ChatMessage) {
        self.conversation.push(message);
        self.changes.history = true;
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
        self.changes.draft = true;
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.changes.mode = true;
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
        self.changes.loading = true;
    }

    pub fn set_error(&mut self, text: impl Into<String>) {
        self.last_error = Some(text.into());
        self.changes.error = true;
    }

    pub fn clear_error(&mut self) {
        if self.last_error.take().is_some() {
            self.changes.error = true;
        }
    }

    /// Blank input unsets the credential
    pub fn set_credential(&mut self, text: &str) {
        let trimmed = text.trim();
        self.credential = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self.changes.credential = true;
        tracing::debug!(configured = self.credential.is_some(), "credential updated");
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    // Request lifecycle

    /// Validate and start a send.
    ///
    /// Uses `explicit` when given, otherwise the draft. Returns `Ok(None)`
    /// when the send is silently suppressed (blank content, or a request is
    /// already in flight) and `Err` when no credential is configured; in the
    /// latter case the error is also recorded for display and nothing else
    /// changes.
    pub fn begin_send(&mut self, explicit: Option<&str>) -> Result<Option<PendingRequest>, ChatError> {
        let from_draft = explicit.is_none();
        let content = explicit.unwrap_or(self.draft.as_str()).trim().to_string();

        if content.is_empty() {
            return Ok(None);
        }

        if self.loading {
            tracing::debug!(in_flight = ?self.in_flight, "send suppressed, request already in flight");
            return Ok(None);
        }

        let Some(credential) = self.credential.clone() else {
            let err = ChatError::MissingCredential;
            self.set_error(err.to_string());
            tracing::info!("send rejected, no credential configured");
            return Err(err);
        };

        self.clear_error();
        self.set_loading(true);
        self.append_message(ChatMessage::user(content));
        if from_draft {
            self.set_draft(String::new());
        }

        let id = self.next_request_id;
        self.next_request_id += 1;
        self.in_flight = Some(id);

        let turns: Vec<Turn> = std::iter::once(Turn::instruction(self.mode))
            .chain(self.conversation.messages().iter().map(Turn::from))
            .collect();

        tracing::debug!(
            id,
            mode = self.mode.label(),
            turns = turns.len(),
            "request started"
        );

        Ok(Some(PendingRequest {
            id,
            model: self.model.clone(),
            turns,
            credential,
        }))
    }

    /// Reconcile the outcome of request `id`.
    ///
    /// Outcomes for anything other than the current in-flight request are
    /// dropped untouched.
    pub fn finish_send(&mut self, id: RequestId, result: Result<Option<String>, ChatError>) {
        if self.in_flight != Some(id) {
            tracing::warn!(id, in_flight = ?self.in_flight, "discarding reply for stale request");
            return;
        }
        self.in_flight = None;

        match result {
            Ok(text) => {
                let text = text
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| prompts::EMPTY_REPLY_PLACEHOLDER.to_string());
                tracing::debug!(id, reply_chars = text.chars().count(), "request succeeded");
                self.append_message(ChatMessage::assistant(text));
            }
            Err(err) => {
                tracing::warn!(id, error = %err, "request failed");
                self.set_error(err.to_string());
            }
        }

        self.set_loading(false);
    }

    /// Send `explicit` (or the draft) and wait for the reply.
    ///
    /// `loading` is back to false whenever this returns, and also if the
    /// future is dropped before the call resolves.
    pub async fn send_message(
        &mut self,
        explicit: Option<&str>,
        generator: &dyn Generator,
    ) -> Result<(), ChatError> {
        let Some(request) = self.begin_send(explicit)? else {
            return Ok(());
        };
        self.run_pending(request, generator).await
    }

    /// Flip between chat and quiz. Entering quiz mode starts the kickoff
    /// turn; leaving it sends nothing.
    pub fn toggle_mode(&mut self) -> Result<Option<PendingRequest>, ChatError> {
        let mode = self.mode.toggled();
        self.set_mode(mode);
        tracing::debug!(mode = mode.label(), "mode toggled");

        match mode {
            Mode::Quiz => self.begin_send(Some(prompts::QUIZ_KICKOFF)),
            Mode::Chat => Ok(None),
        }
    }

    pub async fn toggle_mode_with(&mut self, generator: &dyn Generator) -> Result<(), ChatError> {
        let Some(request) = self.toggle_mode()? else {
            return Ok(());
        };
        self.run_pending(request, generator).await
    }

    /// Send the quick prompt at `index`, leaving the draft alone
    pub fn quick_prompt(&mut self, index: usize) -> Result<Option<PendingRequest>, ChatError> {
        match prompts::QUICK_PROMPTS.get(index).copied() {
            Some(text) => self.begin_send(Some(text)),
            None => Ok(None),
        }
    }

    pub async fn quick_prompt_with(&mut self, index: usize, generator: &dyn Generator) -> Result<(), ChatError> {
        let Some(request) = self.quick_prompt(index)? else {
            return Ok(());
        };
        self.run_pending(request, generator).await
    }

    async fn run_pending(&mut self, request: PendingRequest, generator: &dyn Generator) -> Result<(), ChatError> {
        let guard = InFlightGuard {
            controller: self,
            id: request.id,
        };
        let result = request.run(generator).await;
        let outcome = result.as_ref().map(|_| ()).map_err(|e| e.clone());
        guard.settle(result);
        outcome
    }
}

impl Default for ConversationController {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MODEL)
    }
}

impl fmt::Debug for ConversationController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationController")
            .field("messages", &self.conversation.messages().len())
            .field("mode", &self.mode)
            .field("loading", &self.loading)
            .field("last_error", &self.last_error)
            .field("has_credential", &self.credential.is_some())
            .field("model", &self.model)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

/// Settles the in-flight request if the awaiting future is dropped early
struct InFlightGuard<'a> {
    controller: &'a mut ConversationController,
    id: RequestId,
}

impl InFlightGuard<'_> {
    fn settle(self, result: Result<Option<String>, ChatError>) {
        let mut this = std::mem::ManuallyDrop::new(self);
        let id = this.id;
        this.controller.finish_send(id, result);
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.controller
            .finish_send(self.id, Err(ChatError::Remote("request cancelled".to_string())));
    }
}
