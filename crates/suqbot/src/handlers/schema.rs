//! Dispatcher schema and handler chain builders.
//!
//! Raw update payloads are decoded exactly once here (commands, menu
//! shortcuts, callback actions); everything below this layer works with
//! typed values.

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use suqcore::actions::ShopAction;
use suqcore::nav;
use suqcore::ShopResult;

use super::types::{HandlerDeps, HandlerError};
use crate::bot::Command;
use crate::telegram::{MENU_CANCEL, MENU_ORDERS, MENU_SHOP};

/// Creates the main dispatcher schema for the Telegram bot.
///
/// The same handler tree serves production and integration tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_contact = deps.clone();
    let deps_text = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        // Commands first: /start, /shop, /orders, /cancel
        .branch(command_handler(deps_commands))
        // Shared-contact payloads (phone collection)
        .branch(contact_handler(deps_contact))
        // Menu shortcuts and free text (phone numbers)
        .branch(text_handler(deps_text))
        // Inline keyboard presses
        .branch(callback_handler(deps_callback))
}

/// Log a handler failure and give the user a generic retry message.
/// Business-rule feedback already happened inside the navigation engine;
/// only unexpected failures (persistence, bugs) land here.
async fn report(deps: &HandlerDeps, chat_id: i64, result: ShopResult<()>) {
    if let Err(e) = result {
        log::error!("Handler failed for chat {}: {}", chat_id, e);
        let _ = deps
            .nav
            .messenger
            .send_text(chat_id, "⚠️ Something went wrong\\. Please try again\\.", None)
            .await;
    }
}

/// Handler for bot commands
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                let chat_id = msg.chat.id.0;
                log::info!("Received command {:?} from chat {}", cmd, chat_id);

                let result = match cmd {
                    Command::Start => {
                        let username = msg.from.as_ref().and_then(|u| u.username.as_deref());
                        let first_name = msg.from.as_ref().map(|u| u.first_name.as_str());
                        nav::register_subscriber(&deps.nav, chat_id, username, first_name).await
                    }
                    Command::Shop => nav::open_catalog(&deps.nav, chat_id).await,
                    Command::Orders => nav::my_orders(&deps.nav, chat_id).await,
                    Command::Cancel => nav::cancel(&deps.nav, chat_id).await.map(|_| ()),
                };
                report(&deps, chat_id, result).await;
                Ok(())
            }
        },
    ))
}

/// Handler for shared-contact payloads
fn contact_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.contact().is_some())
        .endpoint(move |msg: Message| {
            let deps = deps.clone();
            async move {
                let chat_id = msg.chat.id.0;
                if let Some(contact) = msg.contact() {
                    let result = nav::submit_contact(&deps.nav, chat_id, &contact.phone_number)
                        .await
                        .map(|_| ());
                    report(&deps, chat_id, result).await;
                }
                Ok(())
            }
        })
}

/// Handler for plain text: menu shortcuts, then phone-number input
fn text_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some())
        .endpoint(move |msg: Message| {
            let deps = deps.clone();
            async move {
                let chat_id = msg.chat.id.0;
                let text = msg.text().unwrap_or_default().trim().to_string();

                let result = match text.as_str() {
                    MENU_SHOP | "Shop" => nav::open_catalog(&deps.nav, chat_id).await,
                    MENU_ORDERS | "My Orders" => nav::my_orders(&deps.nav, chat_id).await,
                    MENU_CANCEL | "cancel" => nav::cancel(&deps.nav, chat_id).await.map(|_| ()),
                    _ => {
                        // Free text is only meaningful while a phone number
                        // is being collected; anything else is ignored.
                        match nav::submit_phone(&deps.nav, chat_id, &text).await {
                            Ok(consumed) => {
                                if !consumed {
                                    log::debug!("Ignoring text from chat {} with no active flow", chat_id);
                                }
                                Ok(())
                            }
                            Err(e) => Err(e),
                        }
                    }
                };
                report(&deps, chat_id, result).await;
                Ok(())
            }
        })
}

/// Handler for callback queries (inline keyboard buttons)
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            // Ack right away so the button stops spinning even if the
            // operation below takes a while.
            let _ = bot.answer_callback_query(q.id.clone()).await;

            let Some(data) = q.data.as_deref() else {
                return Ok(());
            };
            let Some(message) = q.message.as_ref() else {
                return Ok(());
            };
            let chat_id = message.chat().id.0;
            let origin = Some(message.id().0);

            let Some(action) = ShopAction::parse(data) else {
                log::warn!("Unknown callback payload {:?} from chat {}", data, chat_id);
                return Ok(());
            };

            let result = match action {
                ShopAction::SelectCategory(id) => nav::select_category(&deps.nav, chat_id, id, origin).await,
                ShopAction::SelectProduct(id) => nav::select_product(&deps.nav, chat_id, id, origin).await,
                ShopAction::InitiateOrder(id) => nav::initiate_order(&deps.nav, chat_id, id, origin).await,
                ShopAction::BackToCategories => nav::back_to_categories(&deps.nav, chat_id, origin).await,
                ShopAction::BackToProducts(id) => nav::back_to_products(&deps.nav, chat_id, id, origin).await,
            };
            report(&deps, chat_id, result).await;
            Ok(())
        }
    })
}
