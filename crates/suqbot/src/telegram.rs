//! Telegram implementation of the core's `Messenger` port.
//!
//! All text goes out as MarkdownV2. A message that still fails to parse
//! (a template with an unescaped character slipping through) is retried
//! fully escaped rather than dropped.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, InputMedia, InputMediaPhoto, KeyboardButton,
    KeyboardMarkup, KeyboardRemove, ParseMode,
};
use teloxide::RequestError;

use suqcore::broadcast::MAX_ALBUM_IMAGES;
use suqcore::outbound::{Markup, Messenger, SentMessage, TransportError};
use suqcore::text::escape_markdown;

/// Labels of the persistent reply keyboard; the text handler routes on
/// these exact strings.
pub const MENU_SHOP: &str = "🛒 Shop";
pub const MENU_ORDERS: &str = "🧾 My Orders";
pub const MENU_CANCEL: &str = "Cancel";

pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn inline_keyboard(rows: Vec<Vec<suqcore::outbound::Button>>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        rows.into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|b| InlineKeyboardButton::callback(b.label, b.action.encode()))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>(),
    )
}

fn phone_prompt_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new("📱 Share contact").request(ButtonRequest::Contact)],
        vec![KeyboardButton::new(MENU_CANCEL)],
    ])
    .resize_keyboard()
    .one_time_keyboard()
}

fn main_menu_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(MENU_SHOP), KeyboardButton::new(MENU_ORDERS)]]).resize_keyboard()
}

fn is_markdown_parse_error(err: &RequestError) -> bool {
    err.to_string().to_lowercase().contains("can't parse entities")
}

fn to_transport(err: RequestError) -> TransportError {
    TransportError(err.to_string())
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, chat_id: i64, text: &str, markup: Option<Markup>) -> Result<SentMessage, TransportError> {
        let send = |body: String| {
            let mut req = self.bot.send_message(ChatId(chat_id), body).parse_mode(ParseMode::MarkdownV2);
            match markup.clone() {
                Some(Markup::Inline(rows)) => req = req.reply_markup(inline_keyboard(rows)),
                Some(Markup::PhonePrompt) => req = req.reply_markup(phone_prompt_keyboard()),
                Some(Markup::MainMenu) => req = req.reply_markup(main_menu_keyboard()),
                Some(Markup::Clear) => req = req.reply_markup(KeyboardRemove::new()),
                None => {}
            }
            req
        };

        let msg = match send(text.to_string()).await {
            Ok(msg) => msg,
            Err(e) if is_markdown_parse_error(&e) => {
                log::warn!("MarkdownV2 parse error for chat {}, retrying escaped", chat_id);
                send(escape_markdown(text)).await.map_err(to_transport)?
            }
            Err(e) => return Err(to_transport(e)),
        };

        Ok(SentMessage { message_id: msg.id.0 })
    }

    async fn send_album(
        &self,
        chat_id: i64,
        image_urls: &[String],
        caption: &str,
    ) -> Result<Vec<SentMessage>, TransportError> {
        let mut media = Vec::new();
        for raw_url in image_urls.iter().take(MAX_ALBUM_IMAGES) {
            let url = match url::Url::parse(raw_url) {
                Ok(url) => url,
                Err(e) => {
                    log::warn!("Skipping unparseable image URL {:?}: {}", raw_url, e);
                    continue;
                }
            };
            let mut photo = InputMediaPhoto::new(InputFile::url(url));
            if media.is_empty() {
                // Caption rides the first usable item of the group
                photo = photo.caption(caption).parse_mode(ParseMode::MarkdownV2);
            }
            media.push(InputMedia::Photo(photo));
        }

        if media.is_empty() {
            return Err(TransportError("no usable image URLs in album".to_string()));
        }

        let messages = self
            .bot
            .send_media_group(ChatId(chat_id), media)
            .await
            .map_err(to_transport)?;

        Ok(messages
            .into_iter()
            .map(|m| SentMessage { message_id: m.id.0 })
            .collect())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), TransportError> {
        self.bot
            .delete_message(ChatId(chat_id), teloxide::types::MessageId(message_id))
            .await
            .map(|_| ())
            .map_err(to_transport)
    }
}
