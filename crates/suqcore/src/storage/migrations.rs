use rusqlite::Connection;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use crate::error::{ShopError, ShopResult};

mod embedded {
    use refinery::embed_migrations;

    embed_migrations!("./migrations");
}

static MIGRATION_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Run embedded schema migrations. Serialized per-process so concurrent
/// pool initializations on multi-instance startups cannot interleave.
pub fn run_migrations(conn: &mut Connection) -> ShopResult<()> {
    let mutex = MIGRATION_LOCK.get_or_init(|| Mutex::new(()));
    // Recover a poisoned lock: migrations are idempotent.
    let _guard = match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Migration lock was poisoned, recovering...");
            poisoned.into_inner()
        }
    };

    conn.busy_timeout(Duration::from_secs(30))?;

    embedded::migrations::runner()
        .run(conn)
        .map(|_| ())
        .map_err(|e| ShopError::Migration(e.to_string()))
}
