//! The transport port.
//!
//! The navigation engine and the dispatchers emit UI through [`Messenger`];
//! the core never touches chat-platform types. Texts handed to the port are
//! MarkdownV2, so user-supplied fragments must go through
//! [`crate::text::escape_markdown`] before interpolation.

use async_trait::async_trait;
use thiserror::Error;

use crate::actions::ShopAction;

/// One inline button: a label plus the typed action it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: ShopAction,
}

impl Button {
    pub fn new(label: impl Into<String>, action: ShopAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Reply markup attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    /// Inline keyboard rows of typed actions.
    Inline(Vec<Vec<Button>>),
    /// Reply keyboard with a contact-request button and a Cancel row.
    PhonePrompt,
    /// The persistent main-menu reply keyboard (Shop / My Orders).
    MainMenu,
    /// Remove any reply keyboard.
    Clear,
}

/// Identifier of a delivered message, used for later cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub message_id: i32,
}

/// A message-level delivery failure. Best-effort callers log it; the
/// few that must report it convert into [`crate::ShopError::Transport`].
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Outbound messaging operations the core depends on.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send one MarkdownV2 text message.
    async fn send_text(&self, chat_id: i64, text: &str, markup: Option<Markup>) -> Result<SentMessage, TransportError>;

    /// Send up to ten images as a single grouped album, caption on the
    /// first item. Implementations may return fewer message ids than
    /// images if the transport collapses the group.
    async fn send_album(&self, chat_id: i64, image_urls: &[String], caption: &str) -> Result<Vec<SentMessage>, TransportError>;

    /// Delete one previously sent message.
    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), TransportError>;
}

/// Attempt a sequence of deletions, each independently. Returns the
/// per-message outcomes; never fails as a whole. Callers log failures,
/// because cleanup must never block rendering the next menu.
pub async fn delete_all(
    messenger: &dyn Messenger,
    chat_id: i64,
    message_ids: &[i32],
) -> Vec<(i32, Result<(), TransportError>)> {
    let mut results = Vec::with_capacity(message_ids.len());
    for &id in message_ids {
        results.push((id, messenger.delete_message(chat_id, id).await));
    }
    results
}
