//! Subscriber fan-out.
//!
//! Broadcasts are serial with a fixed inter-recipient delay to stay
//! under the transport's rate limits, and every recipient is isolated:
//! one failure is tallied and the loop moves on. Partial completion is a
//! normal outcome, not something to roll back.

use std::time::Duration;

use crate::actions::ShopAction;
use crate::config;
use crate::models::{Product, Subscriber};
use crate::outbound::{Button, Markup, Messenger, TransportError};
use crate::text::escape_markdown;

/// Images per grouped album the transport accepts.
pub const MAX_ALBUM_IMAGES: usize = 10;

/// A rendered new-product announcement.
#[derive(Debug, Clone)]
pub struct ProductAnnouncement {
    pub product_id: i64,
    pub caption: String,
    pub image_urls: Vec<String>,
}

/// Render the announcement for a newly created product (MarkdownV2).
pub fn product_announcement(product: &Product) -> ProductAnnouncement {
    let mut caption = format!(
        "💫 *New product\\!* 💫\n\n🛍 *{}*\n💰 {} ETB",
        escape_markdown(&product.name),
        product.price
    );
    if let Some(desc) = product.description.as_deref().filter(|d| !d.trim().is_empty()) {
        caption.push_str("\n\n");
        caption.push_str(&escape_markdown(desc));
    }
    ProductAnnouncement {
        product_id: product.id,
        caption,
        image_urls: product.image_urls.clone(),
    }
}

/// Per-recipient outcome tally of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Serial fan-out with rate-limit pacing.
pub struct Broadcaster {
    delay: Duration,
}

impl Broadcaster {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Broadcaster with the deployed pacing (BROADCAST_DELAY_MS).
    pub fn from_config() -> Self {
        Self::new(config::broadcast::delay())
    }

    /// Announce a product to every recipient: the image album (capped at
    /// ten items, caption on the first) followed by a separate
    /// order-button message. Returns the per-recipient tally.
    pub async fn broadcast_product(
        &self,
        messenger: &dyn Messenger,
        recipients: &[Subscriber],
        announcement: &ProductAnnouncement,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for (i, subscriber) in recipients.iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            // A chat id that cannot address anything is a failed
            // recipient, not a reason to stop.
            if subscriber.chat_id <= 0 {
                log::warn!("Skipping malformed subscriber chat id {}", subscriber.chat_id);
                report.failed += 1;
                continue;
            }

            match self.deliver_one(messenger, subscriber.chat_id, announcement).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    log::warn!("Broadcast to chat {} failed: {}", subscriber.chat_id, e);
                    report.failed += 1;
                }
            }
        }

        log::info!(
            "Broadcast for product {}: {} delivered, {} failed",
            announcement.product_id,
            report.delivered,
            report.failed
        );
        report
    }

    async fn deliver_one(
        &self,
        messenger: &dyn Messenger,
        chat_id: i64,
        announcement: &ProductAnnouncement,
    ) -> Result<(), TransportError> {
        let images = &announcement.image_urls[..announcement.image_urls.len().min(MAX_ALBUM_IMAGES)];

        if images.is_empty() {
            messenger.send_text(chat_id, &announcement.caption, None).await?;
        } else {
            messenger.send_album(chat_id, images, &announcement.caption).await?;
        }

        // Albums cannot carry buttons; the action rides a follow-up message.
        let button = Markup::Inline(vec![vec![Button::new(
            "🛒 Order now",
            ShopAction::InitiateOrder(announcement.product_id),
        )]]);
        messenger
            .send_text(chat_id, "Order this product now\\!", Some(button))
            .await?;

        Ok(())
    }
}

/// Direct mode: one message to one recipient. The failure is reported to
/// the caller; there is no automatic retry.
pub async fn send_direct(messenger: &dyn Messenger, chat_id: i64, text: &str) -> Result<(), TransportError> {
    messenger.send_text(chat_id, text, None).await.map(|_| ())
}
