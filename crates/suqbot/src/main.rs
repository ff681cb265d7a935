//! suqbot: Telegram storefront bot with an operator HTTP surface.
//!
//! The binary wires the platform-free core (`suqcore`) to Telegram and
//! axum: one dispatcher for chat updates, one HTTP server for the
//! operator, one SQLite pool underneath both.

mod admin;
mod bot;
mod handlers;
mod logging;
mod telegram;

use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use teloxide::prelude::*;

use suqcore::config;
use suqcore::nav::NavContext;
use suqcore::outbound::Messenger;
use suqcore::phone::PhoneValidator;
use suqcore::session::{InMemorySessionStore, SessionStore};
use suqcore::storage;

use admin::{run_admin_server, AdminState};
use bot::{create_bot, setup_bot_commands};
use handlers::{schema, HandlerDeps};
use telegram::TelegramMessenger;

#[tokio::main]
async fn main() -> Result<()> {
    // Log dispatcher panics instead of dying silently
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    // Load .env before any Lazy config is read
    let _ = dotenv();

    logging::init_logger(&config::LOG_FILE_PATH)?;

    let db = Arc::new(storage::create_pool(&config::DATABASE_PATH)?);
    log::info!("Database ready at {}", config::DATABASE_PATH.as_str());

    let bot = create_bot()?;
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let messenger: Arc<dyn Messenger> = Arc::new(TelegramMessenger::new(bot.clone()));
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let nav = Arc::new(NavContext {
        db: Arc::clone(&db),
        sessions,
        messenger: Arc::clone(&messenger),
        phone: PhoneValidator::from_env(),
    });

    let admin_state = AdminState { db, messenger };
    let admin_task = tokio::spawn(run_admin_server(*config::admin::PORT, admin_state));

    let mut dispatcher = Dispatcher::builder(bot, schema(HandlerDeps { nav }))
        .dependencies(DependencyMap::new())
        .enable_ctrlc_handler()
        .build();

    log::info!("suqbot is up");
    tokio::select! {
        _ = dispatcher.dispatch() => {
            log::info!("Dispatcher shut down");
        }
        result = admin_task => {
            match result {
                Ok(Ok(())) => log::info!("Admin server stopped"),
                Ok(Err(e)) => log::error!("Admin server failed: {}", e),
                Err(e) => log::error!("Admin server task panicked: {}", e),
            }
        }
    }

    Ok(())
}
