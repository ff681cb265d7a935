//! Shared helpers: a temp-file database and a recording mock messenger.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use suqcore::models::{NewProduct, Subscriber};
use suqcore::nav::NavContext;
use suqcore::outbound::{Markup, Messenger, SentMessage, TransportError};
use suqcore::phone::PhoneValidator;
use suqcore::session::InMemorySessionStore;
use suqcore::storage::{self, catalog, DbPool};

/// One recorded messenger call.
#[derive(Debug, Clone)]
pub enum Call {
    Text {
        chat_id: i64,
        text: String,
        markup: Option<Markup>,
    },
    Album {
        chat_id: i64,
        images: Vec<String>,
        caption: String,
    },
    Delete {
        chat_id: i64,
        message_id: i32,
    },
}

/// Messenger double: records every call, hands out increasing message
/// ids, and can be scripted to fail sends or deletes per chat.
#[derive(Default)]
pub struct MockMessenger {
    next_id: AtomicI32,
    pub calls: Mutex<Vec<Call>>,
    fail_send: Mutex<HashSet<i64>>,
    fail_delete: Mutex<HashSet<i64>>,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI32::new(1),
            ..Default::default()
        }
    }

    pub fn fail_sends_for(&self, chat_id: i64) {
        self.fail_send.lock().unwrap().insert(chat_id);
    }

    pub fn fail_deletes_for(&self, chat_id: i64) {
        self.fail_delete.lock().unwrap().insert(chat_id);
    }

    pub fn texts_for(&self, chat_id: i64) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                Call::Text { chat_id: id, text, .. } if *id == chat_id => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_text_for(&self, chat_id: i64) -> Option<String> {
        self.texts_for(chat_id).pop()
    }

    pub fn last_markup_for(&self, chat_id: i64) -> Option<Markup> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|c| match c {
                Call::Text { chat_id: id, markup, .. } if *id == chat_id => markup.clone(),
                _ => None,
            })
    }

    pub fn albums_for(&self, chat_id: i64) -> Vec<(Vec<String>, String)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                Call::Album {
                    chat_id: id,
                    images,
                    caption,
                } if *id == chat_id => Some((images.clone(), caption.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn deleted_for(&self, chat_id: i64) -> Vec<i32> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                Call::Delete { chat_id: id, message_id } if *id == chat_id => Some(*message_id),
                _ => None,
            })
            .collect()
    }

    pub fn calls_for(&self, chat_id: i64) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| match c {
                Call::Text { chat_id: id, .. } => *id == chat_id,
                Call::Album { chat_id: id, .. } => *id == chat_id,
                Call::Delete { chat_id: id, .. } => *id == chat_id,
            })
            .count()
    }
}

#[async_trait]
impl Messenger for MockMessenger {
    async fn send_text(&self, chat_id: i64, text: &str, markup: Option<Markup>) -> Result<SentMessage, TransportError> {
        if self.fail_send.lock().unwrap().contains(&chat_id) {
            return Err(TransportError("simulated send failure".to_string()));
        }
        self.calls.lock().unwrap().push(Call::Text {
            chat_id,
            text: text.to_string(),
            markup,
        });
        Ok(SentMessage {
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn send_album(
        &self,
        chat_id: i64,
        image_urls: &[String],
        caption: &str,
    ) -> Result<Vec<SentMessage>, TransportError> {
        if self.fail_send.lock().unwrap().contains(&chat_id) {
            return Err(TransportError("simulated send failure".to_string()));
        }
        self.calls.lock().unwrap().push(Call::Album {
            chat_id,
            images: image_urls.to_vec(),
            caption: caption.to_string(),
        });
        let ids = image_urls
            .iter()
            .map(|_| SentMessage {
                message_id: self.next_id.fetch_add(1, Ordering::SeqCst),
            })
            .collect();
        Ok(ids)
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), TransportError> {
        if self.fail_delete.lock().unwrap().contains(&chat_id) {
            return Err(TransportError("simulated delete failure".to_string()));
        }
        self.calls.lock().unwrap().push(Call::Delete { chat_id, message_id });
        Ok(())
    }
}

/// Fresh database in a temp dir. Keep the `TempDir` alive for the test.
pub fn test_pool() -> (DbPool, TempDir) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.sqlite");
    let pool = storage::create_pool(path.to_str().unwrap()).unwrap();
    (pool, dir)
}

/// A navigation context over a fresh database and mock messenger.
pub struct TestCtx {
    pub ctx: NavContext,
    pub messenger: Arc<MockMessenger>,
    pub pool: Arc<DbPool>,
    _dir: TempDir,
}

pub fn test_ctx() -> TestCtx {
    let (pool, dir) = test_pool();
    let pool = Arc::new(pool);
    let messenger = Arc::new(MockMessenger::new());
    let ctx = NavContext {
        db: Arc::clone(&pool),
        sessions: Arc::new(InMemorySessionStore::new()),
        messenger: messenger.clone(),
        phone: PhoneValidator::default(),
    };
    TestCtx {
        ctx,
        messenger,
        pool,
        _dir: dir,
    }
}

/// Seed the canonical fixture: category "Shoes" with product "Runner"
/// at 1200. Returns (category_id, product_id).
pub fn seed_shoes(pool: &DbPool) -> (i64, i64) {
    let conn = storage::get_connection(pool).unwrap();
    let category = catalog::create_category(&conn, "Shoes", None).unwrap();
    let product = catalog::create_product(
        &conn,
        &NewProduct {
            name: "Runner".to_string(),
            price: 1200,
            category_id: Some(category.id),
            description: Some("Light road shoe".to_string()),
            image_urls: vec!["https://img.example/runner.jpg".to_string()],
        },
    )
    .unwrap();
    (category.id, product.id)
}

pub fn subscriber(chat_id: i64) -> Subscriber {
    Subscriber {
        chat_id,
        username: None,
        first_name: None,
        subscribed: true,
    }
}

/// Count orders for a buyer, any status.
pub fn order_count(pool: &DbPool, buyer_id: i64) -> i64 {
    let conn = storage::get_connection(pool).unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM orders WHERE buyer_id = ?1",
        rusqlite::params![buyer_id],
        |row| row.get(0),
    )
    .unwrap()
}
