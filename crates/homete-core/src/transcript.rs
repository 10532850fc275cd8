//! Transcript controller: owns the chat history and the single in-flight exchange.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, warn};

use crate::gateway::ExchangeRequest;
use crate::state::{ChatEntry, ImageRef};

/// Shown in place of a reply whenever an exchange fails, whatever the cause.
pub const ERROR_MESSAGE: &str =
    "エラーが発生しました。少し待ってからもう一度試してみてください。";

/// Handle to the loading slot of an in-flight exchange.
///
/// Not `Clone`: `resolve` consumes it, so a slot is resolved at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct ExchangeTicket {
    slot: usize,
}

impl ExchangeTicket {
    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// A submission accepted by the controller, waiting to be sent to the gateway
#[derive(Debug)]
pub struct Exchange {
    pub ticket: ExchangeTicket,
    pub request: ExchangeRequest,
}

#[derive(Debug, Default)]
pub struct TranscriptController {
    entries: Vec<ChatEntry>,
    // Index of the loading placeholder while an exchange is in flight
    pending: Option<usize>,
}

impl TranscriptController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Submit the text in `input`. The buffer is emptied when the submission is accepted.
    ///
    /// Returns `None` without touching anything if an exchange is already in flight or the
    /// buffer is empty.
    pub fn submit_text(&mut self, input: &mut String) -> Option<Exchange> {
        if self.is_pending() || input.is_empty() {
            return None;
        }

        let text = std::mem::take(input);
        debug!(chars = text.chars().count(), "submitting text");
        self.entries.push(ChatEntry::UserText(text.clone()));
        Some(self.open_exchange(ExchangeRequest::Text(text)))
    }

    /// Submit an image file. Returns `None` if an exchange is already in flight.
    pub fn submit_image(&mut self, path: impl Into<PathBuf>) -> Option<Exchange> {
        if self.is_pending() {
            return None;
        }

        let path = path.into();
        debug!(path = %path.display(), "submitting image");
        self.entries.push(ChatEntry::UserImage(ImageRef::new(path.clone())));
        Some(self.open_exchange(ExchangeRequest::Image(path)))
    }

    fn open_exchange(&mut self, request: ExchangeRequest) -> Exchange {
        let slot = self.entries.len();
        self.entries.push(ChatEntry::Loading);
        self.pending = Some(slot);
        Exchange {
            ticket: ExchangeTicket { slot },
            request,
        }
    }

    /// Replace the loading placeholder with the reply, or with [`ERROR_MESSAGE`] on failure.
    pub fn resolve(&mut self, ticket: ExchangeTicket, outcome: Result<String>) {
        let content = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                warn!("exchange failed: {:#}", e);
                ERROR_MESSAGE.to_string()
            }
        };

        match self.entries.get_mut(ticket.slot) {
            Some(entry) if entry.is_loading() => *entry = ChatEntry::System(content),
            _ => warn!(slot = ticket.slot, "no loading entry at resolved slot"),
        }

        if self.pending == Some(ticket.slot) {
            self.pending = None;
        }
    }
}
