use std::path::PathBuf;

use anyhow::anyhow;
use homete_core::{Exchange, ExchangeTicket, GeminiClient, Gateway, TranscriptController};
use tokio::task::JoinHandle;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Typing into the message box
    Editing,
    /// Image path popup is open
    ImagePicker,
}

/// The exchange currently waiting on the gateway
pub struct InFlight {
    ticket: ExchangeTicket,
    task: JoinHandle<anyhow::Result<String>>,
}

pub struct App<G = GeminiClient> {
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Transcript and the single-flight guard live in the controller
    pub controller: TranscriptController,
    pub in_flight: Option<InFlight>,

    // Message input
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Image picker popup
    pub image_path_input: String,
    pub image_path_cursor: usize,

    // Chat view state (sizes updated during render)
    pub chat_scroll: u16,
    pub chat_max_scroll: u16,
    pub chat_height: u16,
    pub follow_tail: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    pub gateway: G,
}

impl<G> App<G>
where
    G: Gateway + Clone + Send + Sync + 'static,
{
    pub fn new(gateway: G) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            controller: TranscriptController::new(),
            in_flight: None,

            input: String::new(),
            cursor: 0,

            image_path_input: String::new(),
            image_path_cursor: 0,

            chat_scroll: 0,
            chat_max_scroll: 0,
            chat_height: 0,
            follow_tail: true,

            animation_frame: 0,

            gateway,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.controller.is_pending()
    }

    /// Send the message box contents. No-op while pending or when the box is empty.
    pub fn submit_text(&mut self) {
        if let Some(exchange) = self.controller.submit_text(&mut self.input) {
            self.cursor = 0;
            self.start_exchange(exchange);
        }
    }

    /// Send the image named in the picker. No-op while pending or when no path was given.
    pub fn submit_image(&mut self) {
        let Some(path) = parse_image_path(&self.image_path_input) else {
            return;
        };

        if let Some(exchange) = self.controller.submit_image(path) {
            self.close_image_picker();
            self.start_exchange(exchange);
        }
    }

    fn start_exchange(&mut self, exchange: Exchange) {
        let Exchange { ticket, request } = exchange;
        debug!(slot = ticket.slot(), "starting exchange");

        let gateway = self.gateway.clone();
        let task = tokio::spawn(async move { request.send(&gateway).await });

        self.in_flight = Some(InFlight { ticket, task });
        self.follow_tail = true;
    }

    /// Resolve the in-flight exchange if its task has finished
    pub async fn poll_exchange(&mut self) {
        let finished = self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.task.is_finished());
        if !finished {
            return;
        }

        self.finish_exchange().await;
    }

    /// Wait for the in-flight exchange, however long it takes, and resolve it
    pub async fn finish_exchange(&mut self) {
        let Some(InFlight { ticket, task }) = self.in_flight.take() else {
            return;
        };

        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("exchange task panicked or was cancelled: {}", e);
                Err(anyhow!("exchange task failed: {}", e))
            }
        };
        self.controller.resolve(ticket, outcome);
        self.follow_tail = true;
    }
}

impl<G> App<G> {
    pub fn open_image_picker(&mut self) {
        self.input_mode = InputMode::ImagePicker;
    }

    pub fn close_image_picker(&mut self) {
        self.input_mode = InputMode::Editing;
        self.image_path_input.clear();
        self.image_path_cursor = 0;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.controller.is_pending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Chat scrolling
    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_tail = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.chat_max_scroll);
        self.follow_tail = self.chat_scroll >= self.chat_max_scroll;
    }

    pub fn scroll_page_up(&mut self) {
        self.scroll_up((self.chat_height / 2).max(1));
    }

    pub fn scroll_page_down(&mut self) {
        self.scroll_down((self.chat_height / 2).max(1));
    }
}

/// Turn picker input into a path: trims whitespace and the quotes terminals add when a file
/// is dropped, and expands a leading `~/`.
fn parse_image_path(raw: &str) -> Option<PathBuf> {
    let trimmed = raw.trim().trim_matches(|c| c == '\'' || c == '"').trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(rest) = trimmed.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return Some(home.join(rest));
        }
    }
    Some(PathBuf::from(trimmed))
}
