//! Transport Seam
//!
//! The chat gateway is an external collaborator. The core only needs to
//! send text (with an optional keyboard) to a recipient and to receive
//! text or button events.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::DeliveryError;
use crate::recipient::RecipientId;

/// How the gateway should interpret the message text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum FormatHint {
    #[default]
    Plain,
    Html,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Button {
    pub label: String,
    pub callback_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Keyboard {
    /// Buttons attached to the message; presses arrive as button events
    Inline(Vec<Vec<Button>>),
    /// Persistent reply keyboard; presses arrive as plain text
    Menu(Vec<Vec<String>>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub text: String,
    pub format: FormatHint,
    pub keyboard: Option<Keyboard>,
}

impl OutboundMessage {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), format: FormatHint::Plain, keyboard: None }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self { text: text.into(), format: FormatHint::Html, keyboard: None }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Inbound event from the gateway
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    Text { from: RecipientId, text: String },
    Button { from: RecipientId, callback_id: String },
}

impl InboundEvent {
    pub fn from(&self) -> RecipientId {
        match self {
            InboundEvent::Text { from, .. } | InboundEvent::Button { from, .. } => *from,
        }
    }
}

/// Outbound side of the chat gateway
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, to: RecipientId, message: &OutboundMessage) -> Result<(), DeliveryError>;

    fn name(&self) -> &str;
}

/// Transport that records messages instead of sending them (for
/// development/testing). Selected recipients can be made to fail.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(RecipientId, OutboundMessage)>>,
    failing: HashSet<RecipientId>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliveries to any of `ids` fail with a rejection
    pub fn failing_for(ids: impl IntoIterator<Item = RecipientId>) -> Self {
        Self {
            sent: Mutex::default(),
            failing: ids.into_iter().collect(),
        }
    }

    pub async fn sent(&self) -> Vec<(RecipientId, OutboundMessage)> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_to(&self, id: RecipientId) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(to, _)| *to == id)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, to: RecipientId, message: &OutboundMessage) -> Result<(), DeliveryError> {
        if self.failing.contains(&to) {
            return Err(DeliveryError::Rejected {
                status: 403,
                description: "Forbidden: bot was blocked by the user".into(),
            });
        }
        self.sent.lock().await.push((to, message.clone()));
        Ok(())
    }

    fn name(&self) -> &str {
        "Recording"
    }
}
