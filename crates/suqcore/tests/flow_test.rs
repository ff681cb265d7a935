//! Conversational flow: catalog navigation, phone collection, ordering.

mod common;

use common::{order_count, seed_shoes, test_ctx};
use pretty_assertions::assert_eq;

use suqcore::actions::ShopAction;
use suqcore::lifecycle;
use suqcore::models::OrderStatus;
use suqcore::nav;
use suqcore::outbound::Markup;
use suqcore::session::{Phase, Session};
use suqcore::storage;

const CHAT: i64 = 100;

#[tokio::test]
async fn end_to_end_order_flow() {
    let t = test_ctx();
    let (category_id, product_id) = seed_shoes(&t.pool);

    // Open the catalog: category picker, session cleared
    nav::open_catalog(&t.ctx, CHAT).await.unwrap();
    let picker = t.messenger.last_text_for(CHAT).unwrap();
    assert!(picker.contains("Choose a category"));
    match t.messenger.last_markup_for(CHAT).unwrap() {
        Markup::Inline(rows) => {
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0][0].action, ShopAction::SelectCategory(category_id));
        }
        other => panic!("expected inline keyboard, got {:?}", other),
    }

    // Pick the category: two-column grid with a trailing back row
    nav::select_category(&t.ctx, CHAT, category_id, Some(1)).await.unwrap();
    match t.messenger.last_markup_for(CHAT).unwrap() {
        Markup::Inline(rows) => {
            assert_eq!(rows[0][0].action, ShopAction::SelectProduct(product_id));
            assert_eq!(rows.last().unwrap()[0].action, ShopAction::BackToCategories);
        }
        other => panic!("expected inline keyboard, got {:?}", other),
    }

    // Pick the product: album + action row, session tracks the messages
    nav::select_product(&t.ctx, CHAT, product_id, Some(2)).await.unwrap();
    let albums = t.messenger.albums_for(CHAT);
    assert_eq!(albums.len(), 1);
    assert!(albums[0].1.contains("Runner"));
    let session = t.ctx.sessions.get(CHAT).unwrap();
    assert_eq!(session.phase, Phase::ViewingProduct);
    assert_eq!(session.product_id, Some(product_id));
    assert!(!session.tracked_message_ids.is_empty());

    // Order it: phone prompt
    nav::initiate_order(&t.ctx, CHAT, product_id, None).await.unwrap();
    let session = t.ctx.sessions.get(CHAT).unwrap();
    assert_eq!(session.phase, Phase::AwaitingPhone);
    assert!(t.messenger.last_text_for(CHAT).unwrap().contains("phone number"));

    // Submit the phone: exactly one pending order, session cleared
    let handled = nav::submit_phone(&t.ctx, CHAT, "0912345678").await.unwrap();
    assert!(handled);
    assert_eq!(order_count(&t.pool, CHAT), 1);
    assert!(t.ctx.sessions.get(CHAT).is_none());

    let conn = storage::get_connection(&t.pool).unwrap();
    let orders = storage::orders::list_orders_for_buyer(&conn, CHAT).unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order.status, OrderStatus::Pending);
    assert_eq!(orders[0].order.phone, "0912345678");
    assert_eq!(orders[0].order.product_id, product_id);

    let confirmation = t.messenger.last_text_for(CHAT).unwrap();
    assert!(confirmation.contains("Runner"));
    assert!(confirmation.contains("1200"));
    assert!(confirmation.contains("0912345678"));

    // The flow's interim messages were cleaned up along the way
    assert!(!t.messenger.deleted_for(CHAT).is_empty());
}

#[tokio::test]
async fn invalid_phone_leaves_session_awaiting() {
    let t = test_ctx();
    let (_, product_id) = seed_shoes(&t.pool);

    nav::initiate_order(&t.ctx, CHAT, product_id, None).await.unwrap();

    for bad in ["12345", "0812345678", "hello", "+252912345678"] {
        let handled = nav::submit_phone(&t.ctx, CHAT, bad).await.unwrap();
        assert!(handled, "validation feedback expected for {:?}", bad);
        assert_eq!(order_count(&t.pool, CHAT), 0);
        let session = t.ctx.sessions.get(CHAT).unwrap();
        assert_eq!(session.phase, Phase::AwaitingPhone, "session must survive {:?}", bad);
    }
}

#[tokio::test]
async fn phone_outside_awaiting_phase_is_ignored() {
    let t = test_ctx();
    let (category_id, _) = seed_shoes(&t.pool);

    // No session at all
    assert!(!nav::submit_phone(&t.ctx, CHAT, "0912345678").await.unwrap());

    // Browsing session
    nav::select_category(&t.ctx, CHAT, category_id, None).await.unwrap();
    assert_eq!(t.ctx.sessions.get(CHAT).unwrap().phase, Phase::Browsing);
    assert!(!nav::submit_phone(&t.ctx, CHAT, "0912345678").await.unwrap());
    assert_eq!(order_count(&t.pool, CHAT), 0);
}

#[tokio::test]
async fn shared_contact_bypasses_the_typed_pattern() {
    let t = test_ctx();
    let (_, product_id) = seed_shoes(&t.pool);

    nav::initiate_order(&t.ctx, CHAT, product_id, None).await.unwrap();
    // A foreign number the local pattern would reject
    let handled = nav::submit_contact(&t.ctx, CHAT, "+14155550100").await.unwrap();
    assert!(handled);

    let conn = storage::get_connection(&t.pool).unwrap();
    let orders = storage::orders::list_orders_for_buyer(&conn, CHAT).unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order.phone, "+14155550100");
}

#[tokio::test]
async fn duplicate_initiate_is_rejected_without_session_change() {
    let t = test_ctx();
    let (_, product_id) = seed_shoes(&t.pool);

    nav::initiate_order(&t.ctx, CHAT, product_id, None).await.unwrap();
    nav::submit_phone(&t.ctx, CHAT, "0912345678").await.unwrap();
    assert_eq!(order_count(&t.pool, CHAT), 1);

    // Second attempt while the first order is still pending
    nav::initiate_order(&t.ctx, CHAT, product_id, None).await.unwrap();
    assert!(t
        .messenger
        .last_text_for(CHAT)
        .unwrap()
        .contains("already have a pending order"));
    assert!(t.ctx.sessions.get(CHAT).is_none(), "no phone prompt session created");

    // And the persistence guard agrees
    let err = lifecycle::create_order(&t.pool, CHAT, product_id, "0912345678").unwrap_err();
    assert!(matches!(err, suqcore::ShopError::DuplicateActiveOrder));
    assert_eq!(order_count(&t.pool, CHAT), 1);
}

#[tokio::test]
async fn second_phone_event_after_success_is_a_no_op() {
    let t = test_ctx();
    let (_, product_id) = seed_shoes(&t.pool);

    nav::initiate_order(&t.ctx, CHAT, product_id, None).await.unwrap();
    assert!(nav::submit_phone(&t.ctx, CHAT, "0912345678").await.unwrap());
    // The session was consumed; a trailing duplicate event does nothing
    assert!(!nav::submit_phone(&t.ctx, CHAT, "0912345678").await.unwrap());
    assert_eq!(order_count(&t.pool, CHAT), 1);
}

#[tokio::test]
async fn cancel_clears_session_and_creates_nothing() {
    let t = test_ctx();
    let (_, product_id) = seed_shoes(&t.pool);

    nav::initiate_order(&t.ctx, CHAT, product_id, None).await.unwrap();
    assert!(nav::cancel(&t.ctx, CHAT).await.unwrap());
    assert!(t.ctx.sessions.get(CHAT).is_none());
    assert_eq!(order_count(&t.pool, CHAT), 0);
    assert!(t.messenger.last_text_for(CHAT).unwrap().contains("canceled"));

    // Cancel is idempotent
    assert!(!nav::cancel(&t.ctx, CHAT).await.unwrap());
    assert!(!nav::cancel(&t.ctx, CHAT).await.unwrap());
    assert_eq!(order_count(&t.pool, CHAT), 0);
}

#[tokio::test]
async fn stale_awaiting_phone_session_is_ignored() {
    let t = test_ctx();
    let (_, product_id) = seed_shoes(&t.pool);

    let mut session = Session::new(CHAT, Phase::AwaitingPhone, Some(product_id));
    session.created_at = chrono::Utc::now() - chrono::Duration::minutes(31);
    t.ctx.sessions.set(session);

    assert!(!nav::submit_phone(&t.ctx, CHAT, "0912345678").await.unwrap());
    assert_eq!(order_count(&t.pool, CHAT), 0);
}

#[tokio::test]
async fn product_removed_mid_flow_resets_the_session() {
    let t = test_ctx();
    let (_, product_id) = seed_shoes(&t.pool);

    nav::initiate_order(&t.ctx, CHAT, product_id, None).await.unwrap();

    {
        let conn = storage::get_connection(&t.pool).unwrap();
        conn.execute("DELETE FROM products WHERE id = ?1", rusqlite::params![product_id])
            .unwrap();
    }

    let handled = nav::submit_phone(&t.ctx, CHAT, "0912345678").await.unwrap();
    assert!(handled);
    assert_eq!(order_count(&t.pool, CHAT), 0);
    assert!(t.ctx.sessions.get(CHAT).is_none());
    assert!(t.messenger.last_text_for(CHAT).unwrap().contains("no longer available"));
}

#[tokio::test]
async fn cleanup_failures_never_block_rendering() {
    let t = test_ctx();
    let (category_id, product_id) = seed_shoes(&t.pool);

    nav::open_catalog(&t.ctx, CHAT).await.unwrap();
    t.messenger.fail_deletes_for(CHAT);

    // Every deletion fails, but menus keep rendering and the flow works
    nav::select_category(&t.ctx, CHAT, category_id, Some(1)).await.unwrap();
    nav::select_product(&t.ctx, CHAT, product_id, Some(2)).await.unwrap();
    nav::initiate_order(&t.ctx, CHAT, product_id, None).await.unwrap();
    assert!(nav::submit_phone(&t.ctx, CHAT, "0912345678").await.unwrap());
    assert_eq!(order_count(&t.pool, CHAT), 1);
}

#[tokio::test]
async fn back_navigation_works_without_a_session() {
    let t = test_ctx();
    let (category_id, product_id) = seed_shoes(&t.pool);

    // No prior session: back events still render their target level
    nav::back_to_products(&t.ctx, CHAT, category_id, Some(5)).await.unwrap();
    match t.messenger.last_markup_for(CHAT).unwrap() {
        Markup::Inline(rows) => assert_eq!(rows[0][0].action, ShopAction::SelectProduct(product_id)),
        other => panic!("expected inline keyboard, got {:?}", other),
    }

    nav::back_to_categories(&t.ctx, CHAT, None).await.unwrap();
    assert!(t.messenger.last_text_for(CHAT).unwrap().contains("Choose a category"));
}

#[tokio::test]
async fn missing_category_falls_back_to_the_catalog() {
    let t = test_ctx();
    seed_shoes(&t.pool);

    nav::select_category(&t.ctx, CHAT, 9999, None).await.unwrap();
    let texts = t.messenger.texts_for(CHAT);
    assert!(texts.iter().any(|text| text.contains("Category not found")));
    // Not a dead end: the category picker follows
    assert!(texts.last().unwrap().contains("Choose a category"));
}

#[tokio::test]
async fn registration_is_an_upsert() {
    let t = test_ctx();

    nav::register_subscriber(&t.ctx, CHAT, Some("abebe"), Some("Abebe"))
        .await
        .unwrap();
    assert!(t.messenger.last_text_for(CHAT).unwrap().contains("Welcome to our store"));

    nav::register_subscriber(&t.ctx, CHAT, Some("abebe"), Some("Abebe"))
        .await
        .unwrap();
    assert!(t.messenger.last_text_for(CHAT).unwrap().contains("Welcome back"));

    let conn = storage::get_connection(&t.pool).unwrap();
    let subs = storage::subscribers::list_subscribed(&conn).unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].chat_id, CHAT);
}
