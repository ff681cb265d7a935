//! The navigation engine.
//!
//! Turns decoded chat events into catalog views and drives the session
//! store through the ordering flow. Handlers here run concurrently with
//! other events for the same chat (every send suspends), so the rule is:
//! re-read the session and check its phase right before every
//! side-effecting step, and let the database guard decide duplicate
//! orders instead of an in-memory lock.

use std::sync::Arc;

use crate::actions::ShopAction;
use crate::config;
use crate::error::{ShopError, ShopResult};
use crate::lifecycle;
use crate::models::{Category, Product};
use crate::outbound::{delete_all, Button, Markup, Messenger, SentMessage};
use crate::phone::PhoneValidator;
use crate::session::{Phase, Session, SessionStore};
use crate::storage::{self, catalog, orders, subscribers, DbPool};
use crate::text::escape_markdown;

/// Shared dependencies of every navigation operation.
#[derive(Clone)]
pub struct NavContext {
    pub db: Arc<DbPool>,
    pub sessions: Arc<dyn SessionStore>,
    pub messenger: Arc<dyn Messenger>,
    pub phone: PhoneValidator,
}

const SOMETHING_WRONG: &str = "⚠️ Something went wrong\\. Please try again\\.";
const ALREADY_PENDING: &str = "⚠️ You already have a pending order for this product\\. We'll contact you soon\\.";

// ─── Message helpers ───

/// Best-effort send: transport failures are logged, never propagated.
async fn send(ctx: &NavContext, chat_id: i64, text: &str, markup: Option<Markup>) -> Option<SentMessage> {
    match ctx.messenger.send_text(chat_id, text, markup).await {
        Ok(msg) => Some(msg),
        Err(e) => {
            log::warn!("Send to chat {} failed: {}", chat_id, e);
            None
        }
    }
}

/// Delete the given messages one by one; each failure is logged and
/// ignored so cleanup can never block rendering the next menu.
async fn cleanup(ctx: &NavContext, chat_id: i64, mut ids: Vec<i32>) {
    ids.sort_unstable();
    ids.dedup();
    for (id, result) in delete_all(ctx.messenger.as_ref(), chat_id, &ids).await {
        if let Err(e) = result {
            log::debug!("Failed to delete message {} in chat {}: {}", id, chat_id, e);
        }
    }
}

/// Messages to remove when leaving the current menu level: whatever the
/// session tracked plus the message the pressed button was attached to.
fn ids_to_clean(session: Option<&Session>, origin: Option<i32>) -> Vec<i32> {
    let mut ids: Vec<i32> = session.map(|s| s.tracked_message_ids.clone()).unwrap_or_default();
    if let Some(origin) = origin {
        ids.push(origin);
    }
    ids
}

// ─── Keyboards ───

fn two_column<T>(items: &[T], to_button: impl Fn(&T) -> Button) -> Vec<Vec<Button>> {
    items.chunks(2).map(|pair| pair.iter().map(&to_button).collect()).collect()
}

fn category_keyboard(categories: &[Category]) -> Markup {
    Markup::Inline(two_column(categories, |c| {
        Button::new(c.name.clone(), ShopAction::SelectCategory(c.id))
    }))
}

fn product_keyboard(products: &[Product]) -> Markup {
    let mut rows = two_column(products, |p| Button::new(p.name.clone(), ShopAction::SelectProduct(p.id)));
    rows.push(vec![Button::new("« Back to categories", ShopAction::BackToCategories)]);
    Markup::Inline(rows)
}

fn product_caption(product: &Product) -> String {
    let mut caption = format!("🛍 *{}*\n💰 {} ETB", escape_markdown(&product.name), product.price);
    if let Some(desc) = product.description.as_deref().filter(|d| !d.trim().is_empty()) {
        caption.push_str("\n\n");
        caption.push_str(&escape_markdown(desc));
    }
    caption
}

// ─── Entry / registration ───

/// First contact (or a repeat `/start`): record the chat identity in the
/// subscriber registry and show the main menu.
pub async fn register_subscriber(
    ctx: &NavContext,
    chat_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
) -> ShopResult<()> {
    let is_new = {
        let conn = storage::get_connection(&ctx.db)?;
        subscribers::upsert_subscriber(&conn, chat_id, username, first_name)?
    };

    let greeting = if is_new {
        log::info!("New subscriber: chat_id={}, username={:?}", chat_id, username);
        "👋 *Welcome to our store\\!*\n\nTap Shop to browse the catalog\\."
    } else {
        "Welcome back\\! Tap Shop to browse the catalog\\."
    };
    send(ctx, chat_id, greeting, Some(Markup::MainMenu)).await;
    Ok(())
}

// ─── Catalog browsing ───

/// Show the category picker (the top menu level). Clears any session.
pub async fn open_catalog(ctx: &NavContext, chat_id: i64) -> ShopResult<()> {
    let categories = {
        let conn = storage::get_connection(&ctx.db)?;
        catalog::list_categories(&conn)?
    };

    ctx.sessions.clear(chat_id);

    if categories.is_empty() {
        send(ctx, chat_id, "🛍 No categories yet\\. Check back soon\\!", None).await;
        return Ok(());
    }

    send(ctx, chat_id, "🛍 Choose a category:", Some(category_keyboard(&categories))).await;
    Ok(())
}

/// Show the product list for one category, replacing the previous menu.
pub async fn select_category(ctx: &NavContext, chat_id: i64, category_id: i64, origin: Option<i32>) -> ShopResult<()> {
    let prior = ctx.sessions.get(chat_id);
    cleanup(ctx, chat_id, ids_to_clean(prior.as_ref(), origin)).await;
    render_product_list(ctx, chat_id, category_id).await
}

/// Back from a product detail to its category's product list. Depends
/// only on the category id carried in the button, so it works even after
/// the session was cleared.
pub async fn back_to_products(ctx: &NavContext, chat_id: i64, category_id: i64, origin: Option<i32>) -> ShopResult<()> {
    select_category(ctx, chat_id, category_id, origin).await
}

/// Back to the category picker.
pub async fn back_to_categories(ctx: &NavContext, chat_id: i64, origin: Option<i32>) -> ShopResult<()> {
    let prior = ctx.sessions.get(chat_id);
    cleanup(ctx, chat_id, ids_to_clean(prior.as_ref(), origin)).await;
    open_catalog(ctx, chat_id).await
}

async fn render_product_list(ctx: &NavContext, chat_id: i64, category_id: i64) -> ShopResult<()> {
    let (category, products) = {
        let conn = storage::get_connection(&ctx.db)?;
        let category = catalog::get_category(&conn, category_id)?;
        match category {
            Some(category) => {
                let products = catalog::list_products_by_category(&conn, category_id)?;
                (category, products)
            }
            None => {
                drop(conn);
                send(ctx, chat_id, "⚠️ Category not found\\.", None).await;
                // NotFound never leaves the user on a dead end; fall back
                // to the top menu level.
                return open_catalog(ctx, chat_id).await;
            }
        }
    };

    if products.is_empty() {
        let back_row = Markup::Inline(vec![vec![Button::new("« Back to categories", ShopAction::BackToCategories)]]);
        let text = format!("📦 No products in *{}* yet\\.", escape_markdown(&category.name));
        let msg = send(ctx, chat_id, &text, Some(back_row)).await;
        ctx.sessions.set(
            Session::new(chat_id, Phase::Browsing, None)
                .with_messages(msg.into_iter().map(|m| m.message_id).collect()),
        );
        return Ok(());
    }

    let text = format!("📦 Products in *{}*:", escape_markdown(&category.name));
    let msg = send(ctx, chat_id, &text, Some(product_keyboard(&products))).await;
    ctx.sessions.set(
        Session::new(chat_id, Phase::Browsing, None).with_messages(msg.into_iter().map(|m| m.message_id).collect()),
    );
    Ok(())
}

/// Show a product's detail: image album plus an action row.
pub async fn select_product(ctx: &NavContext, chat_id: i64, product_id: i64, origin: Option<i32>) -> ShopResult<()> {
    let product = {
        let conn = storage::get_connection(&ctx.db)?;
        catalog::get_product(&conn, product_id)?
    };
    let Some(product) = product else {
        send(ctx, chat_id, "⚠️ Product not found\\.", None).await;
        return open_catalog(ctx, chat_id).await;
    };

    let prior = ctx.sessions.get(chat_id);
    cleanup(ctx, chat_id, ids_to_clean(prior.as_ref(), origin)).await;

    let caption = product_caption(&product);
    let mut tracked = Vec::new();

    if product.image_urls.is_empty() {
        if let Some(msg) = send(ctx, chat_id, &caption, None).await {
            tracked.push(msg.message_id);
        }
    } else {
        match ctx.messenger.send_album(chat_id, &product.image_urls, &caption).await {
            Ok(msgs) => tracked.extend(msgs.iter().map(|m| m.message_id)),
            Err(e) => {
                // Detail must still render when the album fails
                log::warn!("Album for product {} failed: {}", product.id, e);
                if let Some(msg) = send(ctx, chat_id, &caption, None).await {
                    tracked.push(msg.message_id);
                }
            }
        }
    }

    let back = match product.category_id {
        Some(category_id) => Button::new("🔙 Back to list", ShopAction::BackToProducts(category_id)),
        None => Button::new("🔙 Back to categories", ShopAction::BackToCategories),
    };
    let actions = Markup::Inline(vec![vec![Button::new("🛒 Order now", ShopAction::InitiateOrder(product.id)), back]]);
    if let Some(msg) = send(ctx, chat_id, "Select an option:", Some(actions)).await {
        tracked.push(msg.message_id);
    }

    ctx.sessions
        .set(Session::new(chat_id, Phase::ViewingProduct, Some(product.id)).with_messages(tracked));
    Ok(())
}

// ─── Ordering flow ───

/// Start collecting a phone number for one product. Aborts without
/// touching the session when a non-terminal order for the pair exists.
pub async fn initiate_order(ctx: &NavContext, chat_id: i64, product_id: i64, origin: Option<i32>) -> ShopResult<()> {
    let product = {
        let conn = storage::get_connection(&ctx.db)?;
        let product = catalog::get_product(&conn, product_id)?;
        match product {
            Some(product) => {
                if orders::has_active_order(&conn, chat_id, product_id)? {
                    drop(conn);
                    send(ctx, chat_id, ALREADY_PENDING, None).await;
                    return Ok(());
                }
                product
            }
            None => {
                drop(conn);
                send(ctx, chat_id, "⚠️ Product not found\\.", None).await;
                return open_catalog(ctx, chat_id).await;
            }
        }
    };

    let prior = ctx.sessions.get(chat_id);
    cleanup(ctx, chat_id, ids_to_clean(prior.as_ref(), origin)).await;

    let prompt = format!(
        "📱 Ordering *{}*\\.\n\nPlease send your phone number, or share your contact:",
        escape_markdown(&product.name)
    );
    let msg = send(ctx, chat_id, &prompt, Some(Markup::PhonePrompt)).await;

    ctx.sessions.set(
        Session::new(chat_id, Phase::AwaitingPhone, Some(product_id))
            .with_messages(msg.into_iter().map(|m| m.message_id).collect()),
    );
    Ok(())
}

/// A typed phone number. Only acts when the chat is in a fresh
/// `AwaitingPhone` phase; returns whether the event was consumed.
pub async fn submit_phone(ctx: &NavContext, chat_id: i64, raw: &str) -> ShopResult<bool> {
    let Some(session) = awaiting_phone_session(ctx, chat_id) else {
        return Ok(false);
    };

    if !ctx.phone.is_valid(raw) {
        send(
            ctx,
            chat_id,
            "That doesn't look like a valid phone number\\. Try again, or tap Cancel\\.",
            None,
        )
        .await;
        // Validation errors mutate nothing: still AwaitingPhone
        return Ok(true);
    }

    place_order(ctx, session, raw.trim()).await
}

/// A shared-contact payload. The number came from the platform, so the
/// typed-input pattern does not apply.
pub async fn submit_contact(ctx: &NavContext, chat_id: i64, phone_number: &str) -> ShopResult<bool> {
    let Some(session) = awaiting_phone_session(ctx, chat_id) else {
        return Ok(false);
    };
    place_order(ctx, session, phone_number).await
}

/// Cancel the phone-collection phase. A no-op in any other phase, and
/// idempotent: repeated cancels find no session and do nothing.
pub async fn cancel(ctx: &NavContext, chat_id: i64) -> ShopResult<bool> {
    let Some(session) = ctx.sessions.get(chat_id) else {
        return Ok(false);
    };
    if session.phase != Phase::AwaitingPhone {
        return Ok(false);
    }

    cleanup(ctx, chat_id, session.tracked_message_ids.clone()).await;
    ctx.sessions.clear(chat_id);
    send(
        ctx,
        chat_id,
        "❌ Order canceled\\. You can shop again anytime\\!",
        Some(Markup::MainMenu),
    )
    .await;
    Ok(true)
}

fn awaiting_phone_session(ctx: &NavContext, chat_id: i64) -> Option<Session> {
    let session = ctx.sessions.get(chat_id)?;
    if session.phase != Phase::AwaitingPhone {
        return None;
    }
    if session.is_stale(config::session::stale_after()) {
        log::debug!("Ignoring stale AwaitingPhone session for chat {}", chat_id);
        return None;
    }
    Some(session)
}

async fn place_order(ctx: &NavContext, session: Session, phone: &str) -> ShopResult<bool> {
    let chat_id = session.chat_id;
    let Some(product_id) = session.product_id else {
        // A phone prompt without a product is a corrupt session; reset.
        ctx.sessions.clear(chat_id);
        send(ctx, chat_id, SOMETHING_WRONG, Some(Markup::MainMenu)).await;
        return Ok(true);
    };

    // Re-check the store right before the side-effecting step: a second
    // phone event for this chat (typed number and shared contact arriving
    // together) may have replaced or consumed the session meanwhile.
    match ctx.sessions.get(chat_id) {
        Some(current) if current.phase == Phase::AwaitingPhone && current.created_at == session.created_at => {}
        _ => return Ok(false),
    }

    let order = match lifecycle::create_order(&ctx.db, chat_id, product_id, phone) {
        Ok(order) => order,
        Err(ShopError::NotFound(_)) => {
            cleanup(ctx, chat_id, session.tracked_message_ids.clone()).await;
            ctx.sessions.clear(chat_id);
            send(
                ctx,
                chat_id,
                "⚠️ That product is no longer available\\.",
                Some(Markup::MainMenu),
            )
            .await;
            return Ok(true);
        }
        Err(ShopError::DuplicateActiveOrder) => {
            cleanup(ctx, chat_id, session.tracked_message_ids.clone()).await;
            ctx.sessions.clear(chat_id);
            send(ctx, chat_id, ALREADY_PENDING, Some(Markup::MainMenu)).await;
            return Ok(true);
        }
        Err(e @ (ShopError::Database(_) | ShopError::Pool(_))) => {
            // Store unavailable: generic retry message, session kept in
            // its pre-failure phase so the user can try again.
            log::error!("Order creation failed for chat {}: {}", chat_id, e);
            send(ctx, chat_id, SOMETHING_WRONG, None).await;
            return Ok(true);
        }
        Err(e) => return Err(e),
    };

    let product = {
        let conn = storage::get_connection(&ctx.db)?;
        catalog::get_product(&conn, product_id)?
    };

    cleanup(ctx, chat_id, session.tracked_message_ids.clone()).await;
    ctx.sessions.clear(chat_id);

    let confirmation = match &product {
        Some(p) => format!(
            "✅ *Order confirmed\\!*\n\n\
             🛍 Product: *{}*\n\
             💰 Price: {} ETB\n\
             📱 Phone: {}\n\n\
             We'll contact you shortly\\. Thank you\\!",
            escape_markdown(&p.name),
            p.price,
            escape_markdown(phone)
        ),
        None => format!(
            "✅ *Order confirmed\\!*\n\n📱 Phone: {}\n\nWe'll contact you shortly\\. Thank you\\!",
            escape_markdown(phone)
        ),
    };
    send(ctx, chat_id, &confirmation, Some(Markup::MainMenu)).await;

    log::info!("Order {} confirmed for chat {}", order.id, chat_id);
    Ok(true)
}

// ─── Buyer order list ───

/// List the chat's own orders with their current status.
pub async fn my_orders(ctx: &NavContext, chat_id: i64) -> ShopResult<()> {
    let list = {
        let conn = storage::get_connection(&ctx.db)?;
        orders::list_orders_for_buyer(&conn, chat_id)?
    };

    if list.is_empty() {
        send(
            ctx,
            chat_id,
            "You have no orders yet\\. Tap Shop to browse the catalog\\!",
            Some(Markup::MainMenu),
        )
        .await;
        return Ok(());
    }

    let mut text = String::from("🧾 *Your orders:*\n");
    for item in &list {
        let name = item.product_name.as_deref().unwrap_or("(removed product)");
        text.push_str(&format!("\n• *{}* \\- {}", escape_markdown(name), item.order.status));
    }
    send(ctx, chat_id, &text, Some(Markup::MainMenu)).await;
    Ok(())
}
