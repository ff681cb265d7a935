//! Broadcast fan-out: isolation, pacing shape, album limits.

mod common;

use std::time::Duration;

use common::{subscriber, test_ctx, MockMessenger};
use pretty_assertions::assert_eq;

use suqcore::actions::ShopAction;
use suqcore::broadcast::{product_announcement, BroadcastReport, Broadcaster, MAX_ALBUM_IMAGES};
use suqcore::models::Product;
use suqcore::outbound::Markup;

fn product(images: usize) -> Product {
    Product {
        id: 42,
        name: "Runner".to_string(),
        price: 1200,
        category_id: Some(1),
        description: Some("Light road shoe".to_string()),
        image_urls: (0..images).map(|i| format!("https://img.example/{}.jpg", i)).collect(),
    }
}

#[tokio::test]
async fn one_failing_recipient_does_not_abort_the_fan_out() {
    let t = test_ctx();
    let broadcaster = Broadcaster::new(Duration::ZERO);
    let recipients: Vec<_> = (1..=5).map(subscriber).collect();
    t.messenger.fail_sends_for(3);

    let announcement = product_announcement(&product(2));
    let report = broadcaster
        .broadcast_product(t.messenger.as_ref(), &recipients, &announcement)
        .await;

    assert_eq!(
        report,
        BroadcastReport {
            delivered: 4,
            failed: 1
        }
    );
    for chat in [1, 2, 4, 5] {
        assert_eq!(t.messenger.albums_for(chat).len(), 1, "chat {} got the album", chat);
        assert_eq!(t.messenger.texts_for(chat).len(), 1, "chat {} got the button", chat);
    }
    assert!(t.messenger.albums_for(3).is_empty());
}

#[tokio::test]
async fn album_is_capped_at_ten_images() {
    let t = test_ctx();
    let broadcaster = Broadcaster::new(Duration::ZERO);

    let announcement = product_announcement(&product(13));
    broadcaster
        .broadcast_product(t.messenger.as_ref(), &[subscriber(1)], &announcement)
        .await;

    let albums = t.messenger.albums_for(1);
    assert_eq!(albums.len(), 1);
    assert_eq!(albums[0].0.len(), MAX_ALBUM_IMAGES);
}

#[tokio::test]
async fn follow_up_button_carries_the_order_action() {
    let t = test_ctx();
    let broadcaster = Broadcaster::new(Duration::ZERO);

    let announcement = product_announcement(&product(1));
    broadcaster
        .broadcast_product(t.messenger.as_ref(), &[subscriber(1)], &announcement)
        .await;

    match t.messenger.last_markup_for(1).unwrap() {
        Markup::Inline(rows) => assert_eq!(rows[0][0].action, ShopAction::InitiateOrder(42)),
        other => panic!("expected inline keyboard, got {:?}", other),
    }
}

#[tokio::test]
async fn imageless_product_falls_back_to_a_text_announcement() {
    let t = test_ctx();
    let broadcaster = Broadcaster::new(Duration::ZERO);

    let announcement = product_announcement(&product(0));
    let report = broadcaster
        .broadcast_product(t.messenger.as_ref(), &[subscriber(1)], &announcement)
        .await;

    assert_eq!(report.delivered, 1);
    assert!(t.messenger.albums_for(1).is_empty());
    let texts = t.messenger.texts_for(1);
    assert_eq!(texts.len(), 2);
    assert!(texts[0].contains("Runner"));
}

#[tokio::test]
async fn malformed_chat_ids_are_tallied_not_sent() {
    let messenger = MockMessenger::new();
    let broadcaster = Broadcaster::new(Duration::ZERO);

    let recipients = vec![subscriber(0), subscriber(-5), subscriber(7)];
    let announcement = product_announcement(&product(1));
    let report = broadcaster
        .broadcast_product(&messenger, &recipients, &announcement)
        .await;

    assert_eq!(
        report,
        BroadcastReport {
            delivered: 1,
            failed: 2
        }
    );
    assert_eq!(messenger.calls_for(0), 0);
    assert_eq!(messenger.calls_for(-5), 0);
}

#[tokio::test]
async fn empty_recipient_list_is_a_clean_zero_report() {
    let t = test_ctx();
    let broadcaster = Broadcaster::new(Duration::ZERO);

    let report = broadcaster
        .broadcast_product(t.messenger.as_ref(), &[], &product_announcement(&product(1)))
        .await;
    assert_eq!(report, BroadcastReport::default());
}
