//! Order lifecycle controller.
//!
//! Owns the persisted status state machine. Creation is invoked by the
//! navigation engine, transitions by the operator surface; every
//! successful transition triggers a direct notification to the buyer.
//! The status change is the durable fact; notification delivery is
//! best-effort and never rolls it back.

use crate::config;
use crate::error::{ShopError, ShopResult};
use crate::models::{Order, OrderStatus};
use crate::outbound::Messenger;
use crate::storage::{self, catalog, orders, DbPool};
use crate::text::escape_markdown;

/// Create a `Pending` order for one product.
///
/// Fails with `NotFound` when the product is gone and with
/// `DuplicateActiveOrder` when the (buyer, product) pair already has a
/// non-terminal order. The database index is the single authority for
/// that invariant, so concurrent attempts cannot both succeed.
pub fn create_order(pool: &DbPool, buyer_id: i64, product_id: i64, phone: &str) -> ShopResult<Order> {
    let mut conn = storage::get_connection(pool)?;

    if catalog::get_product(&conn, product_id)?.is_none() {
        return Err(ShopError::NotFound("product"));
    }

    let order = orders::insert_order(&mut conn, buyer_id, product_id, phone)?;
    log::info!(
        "Order {} created: buyer={}, product={}, phone={}",
        order.id,
        buyer_id,
        product_id,
        phone
    );
    Ok(order)
}

/// Move an order along one workflow edge and persist the result.
///
/// Any edge not in the `OrderStatus::can_transition_to` table fails with
/// `InvalidTransition` and leaves the order untouched.
pub fn transition(pool: &DbPool, order_id: i64, target: OrderStatus, note: Option<&str>) -> ShopResult<Order> {
    let conn = storage::get_connection(pool)?;

    let order = orders::get_order(&conn, order_id)?.ok_or(ShopError::NotFound("order"))?;

    if !order.status.can_transition_to(target) {
        return Err(ShopError::InvalidTransition {
            from: order.status,
            to: target,
        });
    }

    orders::update_status(&conn, order_id, target, note)?;
    log::info!("Order {}: {} -> {}", order_id, order.status, target);

    orders::get_order(&conn, order_id)?.ok_or(ShopError::NotFound("order"))
}

/// Operator action: transition, then notify the buyer with the
/// status-specific template. Notification failure is logged and swallowed;
/// the caller still gets the updated order.
pub async fn process_order(
    pool: &DbPool,
    messenger: &dyn Messenger,
    order_id: i64,
    target: OrderStatus,
    note: Option<&str>,
) -> ShopResult<Order> {
    let order = transition(pool, order_id, target, note)?;

    let product_name = {
        let conn = storage::get_connection(pool)?;
        catalog::get_product(&conn, order.product_id)?.map(|p| p.name)
    };

    let text = status_message(target, product_name.as_deref(), note);
    if let Err(e) = crate::broadcast::send_direct(messenger, order.buyer_id, &text).await {
        log::warn!(
            "Status notification for order {} to chat {} failed: {}",
            order.id,
            order.buyer_id,
            e
        );
    }

    Ok(order)
}

/// Render the buyer-facing notification for a status change (MarkdownV2).
pub fn status_message(status: OrderStatus, product_name: Option<&str>, note: Option<&str>) -> String {
    let product = escape_markdown(product_name.unwrap_or("order"));
    let support = config::SUPPORT_PHONE
        .as_deref()
        .map(escape_markdown)
        .unwrap_or_else(|| "our support line".to_string());

    let mut text = match status {
        OrderStatus::Accepted => format!(
            "✅ *Order accepted\\!*\n\n\
             Your *{}* has been confirmed\\.\n\n\
             💳 Please contact us at {} to complete payment\\. \
             We'll prepare your order once payment is confirmed\\.",
            product, support
        ),
        OrderStatus::Rejected => format!(
            "❌ *Order rejected*\n\n\
             We couldn't process your *{}*\\. \
             Please contact {} if you believe this is a mistake\\.",
            product, support
        ),
        OrderStatus::Paid => format!(
            "💳 *Payment received\\!*\n\n\
             Your *{}* is being prepared for shipment\\.",
            product
        ),
        OrderStatus::Shipped => format!(
            "🚚 *Order shipped\\!*\n\n\
             Your *{}* is on the way\\! Contact {} for any delivery questions\\.",
            product, support
        ),
        OrderStatus::Completed => format!(
            "🎉 *Order delivered*\n\n\
             Enjoy your *{}*\\! Thank you for shopping with us\\.",
            product
        ),
        // Pending is never a transition target; keep a sane fallback.
        OrderStatus::Pending => format!("Your order for *{}* was received\\.", product),
    };

    if let Some(note) = note.filter(|n| !n.trim().is_empty()) {
        text.push_str("\n\n📝 ");
        text.push_str(&escape_markdown(note));
    }

    text
}
