//! Subscriber registry: append-only upsert by chat identity.

use rusqlite::{params, Connection};

use crate::error::ShopResult;
use crate::models::Subscriber;

/// Record (or refresh) a chat identity. Returns `true` when the
/// subscriber is new. Entries are never deleted by the core.
pub fn upsert_subscriber(
    conn: &Connection,
    chat_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
) -> ShopResult<bool> {
    let existed: i64 = conn.query_row(
        "SELECT COUNT(*) FROM subscribers WHERE chat_id = ?1",
        params![chat_id],
        |row| row.get(0),
    )?;

    conn.execute(
        "INSERT INTO subscribers (chat_id, username, first_name, subscribed) VALUES (?1, ?2, ?3, 1)
         ON CONFLICT(chat_id) DO UPDATE SET
           username = COALESCE(?2, username),
           first_name = COALESCE(?3, first_name),
           subscribed = 1,
           updated_at = datetime('now')",
        params![chat_id, username, first_name],
    )?;

    Ok(existed == 0)
}

fn parse_subscriber(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subscriber> {
    Ok(Subscriber {
        chat_id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        subscribed: row.get::<_, i32>(3)? != 0,
    })
}

/// All identities that should receive broadcasts.
pub fn list_subscribed(conn: &Connection) -> ShopResult<Vec<Subscriber>> {
    let mut stmt = conn.prepare(
        "SELECT chat_id, username, first_name, subscribed FROM subscribers WHERE subscribed = 1 ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map([], parse_subscriber)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
