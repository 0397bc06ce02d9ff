use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use cinemate_core::{
    ChangeSet, ChatError, Config, ConversationController, GeminiClient, Generator, PendingRequest,
    RequestId,
};
use futures_util::FutureExt;
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::tui::AppEvent;
use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub controller: ConversationController,

    // Composer
    pub draft_cursor: usize, // cursor position in the draft, in chars

    // Chat view
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // API key input state
    pub show_credential_input: bool,
    pub credential_input: String,
    pub credential_cursor: usize,

    // Model picker state
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,

    // Preferences
    config: Config,
    config_path: Option<PathBuf>,

    // Remote generation
    generator: Arc<dyn Generator>,
    events: UnboundedSender<AppEvent>,
    request_task: Option<JoinHandle<()>>,
}

impl App {
    pub fn new(
        config: Config,
        config_path: Option<PathBuf>,
        generator: Arc<dyn Generator>,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        let controller = ConversationController::new(config.model());

        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            controller,

            draft_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,

            animation_frame: 0,

            show_credential_input: false,
            credential_input: String::new(),
            credential_cursor: 0,

            show_model_picker: false,
            available_models: Vec::new(),
            model_picker_state: ListState::default(),

            config,
            config_path,

            generator,
            events,
            request_task: None,
        }
    }

    /// App wired to the real Gemini endpoint
    pub fn with_gemini(config: Config, config_path: Option<PathBuf>, events: UnboundedSender<AppEvent>) -> Self {
        let generator: Arc<dyn Generator> = Arc::new(GeminiClient::new(config.api_base()));
        Self::new(config, config_path, generator, events)
    }

    // Request lifecycle

    pub fn submit_draft(&mut self) {
        let started = self.controller.begin_send(None);
        self.launch(started);
    }

    pub fn toggle_mode(&mut self) {
        let started = self.controller.toggle_mode();
        self.launch(started);
    }

    pub fn quick_prompt(&mut self, index: usize) {
        let started = self.controller.quick_prompt(index);
        self.launch(started);
    }

    fn launch(&mut self, started: Result<Option<PendingRequest>, ChatError>) {
        match started {
            Ok(Some(request)) => self.dispatch(request),
            Ok(None) => {}
            // Already recorded on the controller for the error banner
            Err(err) => tracing::debug!(error = %err, "send not started"),
        }
    }

    /// Run the request on a background task that reports back as an event.
    /// A reply is posted on every path, including a panic inside the
    /// generator. If the app is gone by then the reply is dropped.
    fn dispatch(&mut self, request: PendingRequest) {
        let generator = Arc::clone(&self.generator);
        let events = self.events.clone();

        self.request_task = Some(tokio::spawn(async move {
            let id = request.id;
            let result = match AssertUnwindSafe(request.run(generator.as_ref()))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(panic_info) => {
                    let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        (*s).to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "unknown panic".to_string()
                    };
                    tracing::error!(id, "request task panicked: {}", panic_msg);
                    Err(ChatError::Remote(format!("request crashed: {}", panic_msg)))
                }
            };
            if events.send(AppEvent::Reply { id, result }).is_err() {
                tracing::debug!(id, "app closed, dropping reply");
            }
        }));
    }

    pub fn on_reply(&mut self, id: RequestId, result: Result<Option<String>, ChatError>) {
        self.controller.finish_send(id, result);
        if self.controller.in_flight().is_none() {
            self.request_task = None;
        }
    }

    pub fn request_running(&self) -> bool {
        self.request_task.is_some()
    }

    /// Abort any in-flight request before the app is dropped
    pub fn shutdown(&mut self) {
        if let Some(task) = self.request_task.take() {
            task.abort();
        }
    }

    /// Apply side effects of controller mutations since the last call
    pub fn sync(&mut self) -> ChangeSet {
        let changes = self.controller.take_changes();

        if changes.draft {
            let char_count = self.controller.draft().chars().count();
            self.draft_cursor = self.draft_cursor.min(char_count);
        }

        if changes.needs_scroll() {
            self.scroll_chat_to_bottom();
        }

        changes
    }

    // Chat scrolling

    /// Number of rendered rows the chat needs at the current width
    pub fn chat_line_count(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 { self.chat_width } else { 50 };

        let rows = ui::chat_paragraph(self).line_count(wrap_width);
        u16::try_from(rows).unwrap_or(u16::MAX)
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    fn max_scroll(&self) -> u16 {
        self.chat_line_count().saturating_sub(self.visible_height())
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        self.chat_scroll = self.max_scroll();
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll());
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down((self.visible_height() / 2).max(1));
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up((self.visible_height() / 2).max(1));
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.controller.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // API key popup

    pub fn open_credential_input(&mut self) {
        self.show_credential_input = true;
        self.credential_input.clear();
        self.credential_cursor = 0;
    }

    pub fn confirm_credential(&mut self) {
        if !self.credential_input.is_empty() {
            self.controller.set_credential(&self.credential_input);
        }
        self.close_credential_input();
    }

    pub fn close_credential_input(&mut self) {
        self.show_credential_input = false;
        self.credential_input.clear();
        self.credential_cursor = 0;
    }

    // Model picker methods

    pub fn open_model_picker(&mut self) {
        self.available_models = GeminiClient::list_models();
        let current = self
            .available_models
            .iter()
            .position(|m| m == self.controller.model())
            .unwrap_or(0);
        self.model_picker_state.select(Some(current));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) {
        if let Some(i) = self.model_picker_state.selected() {
            if let Some(model) = self.available_models.get(i).cloned() {
                self.controller.set_model(model.clone());
                self.show_model_picker = false;

                // Save to config
                self.config.default_model = Some(model);
                if let Some(path) = &self.config_path {
                    if let Err(err) = self.config.save_to(path) {
                        tracing::warn!(error = %err, "could not save model choice");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use cinemate_core::{ChatMessage, Turn};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    /// Generator that answers every request with the same text
    pub(crate) struct Echo(pub &'static str);

    #[async_trait]
    impl Generator for Echo {
        async fn generate(&self, _model: &str, _turns: &[Turn], _credential: &str) -> Result<Option<String>> {
            Ok(Some(self.0.to_string()))
        }
    }

    struct Crash;

    #[async_trait]
    impl Generator for Crash {
        async fn generate(&self, _model: &str, _turns: &[Turn], _credential: &str) -> Result<Option<String>> {
            panic!("generator blew up");
        }
    }

    pub(crate) fn test_app(reply: &'static str) -> (App, UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = App::new(Config::new(), None, Arc::new(Echo(reply)), tx);
        (app, rx)
    }

    /// Wait for the request task to post its reply and feed it back in
    pub(crate) async fn deliver_reply(app: &mut App, rx: &mut UnboundedReceiver<AppEvent>) {
        match rx.recv().await {
            Some(AppEvent::Reply { id, result }) => app.on_reply(id, result),
            other => panic!("expected reply event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_round_trip_through_events() {
        let (mut app, mut rx) = test_app("Try Spirited Away");
        app.controller.set_credential("key");
        app.controller.set_draft("something gentle");

        app.submit_draft();
        assert!(app.controller.is_loading());
        assert!(app.request_running());

        deliver_reply(&mut app, &mut rx).await;

        assert!(!app.controller.is_loading());
        assert!(!app.request_running());
        assert_eq!(app.controller.messages().len(), 3);
        assert_eq!(app.controller.messages()[2], ChatMessage::assistant("Try Spirited Away"));
    }

    #[tokio::test]
    async fn test_quick_prompt_dispatches() {
        let (mut app, mut rx) = test_app("ok");
        app.controller.set_credential("key");

        app.quick_prompt(0);
        deliver_reply(&mut app, &mut rx).await;

        assert_eq!(app.controller.messages()[1].content, app.controller.quick_prompts()[0]);
    }

    #[test]
    fn test_submit_without_credential_spawns_nothing() {
        let (mut app, _rx) = test_app("unused");
        app.controller.set_draft("hello");

        app.submit_draft();

        assert!(!app.request_running());
        assert_eq!(app.controller.last_error(), Some("credential required"));
    }

    #[test]
    fn test_line_count_wraps_and_counts_loading() {
        let (mut app, _rx) = test_app("unused");
        app.chat_width = 10;
        let base = app.chat_line_count();

        app.controller.append_message(ChatMessage::user("x".repeat(25)));
        // role + 3 wrapped rows + blank
        assert_eq!(app.chat_line_count(), base + 5);

        app.controller.set_loading(true);
        assert_eq!(app.chat_line_count(), base + 7);
    }

    #[test]
    fn test_sync_follows_tail_on_history_change() {
        let (mut app, _rx) = test_app("unused");
        app.chat_width = 40;
        app.chat_height = 4;
        app.sync();

        for i in 0..10 {
            app.controller.append_message(ChatMessage::user(format!("line {}", i)));
        }
        let changes = app.sync();

        assert!(changes.history);
        assert_eq!(app.chat_scroll, app.chat_line_count() - 4);

        app.scroll_up(3);
        app.controller.set_draft("typing");
        app.sync();
        assert_eq!(app.chat_scroll, app.chat_line_count() - 7);
    }

    #[test]
    fn test_scroll_down_is_clamped() {
        let (mut app, _rx) = test_app("unused");
        app.chat_height = 100;
        app.scroll_down(50);
        assert_eq!(app.chat_scroll, 0);
    }

    #[test]
    fn test_confirm_credential() {
        let (mut app, _rx) = test_app("unused");
        app.open_credential_input();
        app.credential_input.push_str("abc123");
        app.confirm_credential();

        assert!(app.controller.has_credential());
        assert!(!app.show_credential_input);
        assert!(app.credential_input.is_empty());
    }

    #[test]
    fn test_model_picker_selects_model() {
        let (mut app, _rx) = test_app("unused");
        app.open_model_picker();
        assert_eq!(app.model_picker_state.selected(), Some(0));

        app.model_picker_nav_down();
        app.select_model();

        assert_eq!(app.controller.model(), GeminiClient::list_models()[1]);
        assert!(!app.show_model_picker);
    }

    #[test]
    fn test_model_choice_saved_when_path_given() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(Config::new(), Some(path.clone()), Arc::new(Echo("x")), tx);

        app.open_model_picker();
        app.model_picker_nav_down();
        app.select_model();

        let saved = Config::load_from(&path).unwrap();
        assert_eq!(saved.model(), GeminiClient::list_models()[1]);
    }

    #[tokio::test]
    async fn test_generator_panic_still_clears_loading() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut app = App::new(Config::new(), None, Arc::new(Crash), tx);
        app.controller.set_credential("key");
        app.controller.set_draft("anything");

        app.submit_draft();
        assert!(app.controller.is_loading());

        deliver_reply(&mut app, &mut rx).await;

        assert!(!app.controller.is_loading());
        assert!(!app.request_running());
        assert!(app.controller.last_error().unwrap().contains("generator blew up"));

        // Single-flight released: a later send goes out
        app.controller.set_draft("again");
        app.submit_draft();
        assert!(app.controller.is_loading());
    }
}
