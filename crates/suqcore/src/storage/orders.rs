//! Order persistence.
//!
//! The one-active-order-per-(buyer, product) invariant is enforced by a
//! partial unique index; `insert_order` surfaces a violation as
//! `DuplicateActiveOrder` so callers never query-then-create.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{ShopError, ShopResult};
use crate::models::{Order, OrderStatus};
use crate::storage::db::DbConnection;

const ORDER_COLS: &str = "id, buyer_id, product_id, phone, status, note, created_at, updated_at";

fn parse_order(row: &rusqlite::Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: row.get(0)?,
        buyer_id: row.get(1)?,
        product_id: row.get(2)?,
        phone: row.get(3)?,
        status: row.get(4)?,
        note: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// An order joined with a summary of its product, for operator listings
/// and the buyer's own order list. The product side is optional because
/// products can be deleted out from under historical orders.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderWithProduct {
    #[serde(flatten)]
    pub order: Order,
    pub product_name: Option<String>,
    pub product_price: Option<i64>,
}

fn parse_order_with_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderWithProduct> {
    Ok(OrderWithProduct {
        order: parse_order(row)?,
        product_name: row.get(8)?,
        product_price: row.get(9)?,
    })
}

const JOINED_SELECT: &str = "SELECT o.id, o.buyer_id, o.product_id, o.phone, o.status, o.note, o.created_at, o.updated_at, \
     p.name, p.price \
     FROM orders o LEFT JOIN products p ON p.id = o.product_id";

fn map_insert_err(e: rusqlite::Error) -> ShopError {
    // Only a unique-index hit means "duplicate active order"; other
    // constraint failures (e.g. a dangling product FK) stay database errors.
    match &e {
        rusqlite::Error::SqliteFailure(err, _) if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => {
            ShopError::DuplicateActiveOrder
        }
        _ => ShopError::Database(e),
    }
}

/// Persist a new `Pending` order. Fails with `DuplicateActiveOrder` when a
/// non-terminal order for the same (buyer, product) pair already exists.
pub fn insert_order(conn: &mut DbConnection, buyer_id: i64, product_id: i64, phone: &str) -> ShopResult<Order> {
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO orders (buyer_id, product_id, phone, status) VALUES (?1, ?2, ?3, ?4)",
        params![buyer_id, product_id, phone, OrderStatus::Pending],
    )
    .map_err(map_insert_err)?;
    let id = tx.last_insert_rowid();

    let order = tx
        .query_row(&format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLS), params![id], parse_order)?;
    tx.commit()?;

    Ok(order)
}

pub fn get_order(conn: &Connection, id: i64) -> ShopResult<Option<Order>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLS),
            params![id],
            parse_order,
        )
        .optional()?)
}

/// Whether the pair currently has a non-terminal order.
pub fn has_active_order(conn: &Connection, buyer_id: i64, product_id: i64) -> ShopResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM orders \
         WHERE buyer_id = ?1 AND product_id = ?2 AND status NOT IN ('rejected', 'completed')",
        params![buyer_id, product_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Persist a status change (with an optional operator note) and bump
/// `updated_at`. Edge validation happens in the lifecycle layer.
pub fn update_status(conn: &Connection, id: i64, status: OrderStatus, note: Option<&str>) -> ShopResult<()> {
    let changed = conn.execute(
        "UPDATE orders SET status = ?2, note = COALESCE(?3, note), updated_at = datetime('now') WHERE id = ?1",
        params![id, status, note],
    )?;
    if changed == 0 {
        return Err(ShopError::NotFound("order"));
    }
    Ok(())
}

pub fn list_orders(conn: &Connection) -> ShopResult<Vec<OrderWithProduct>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY o.created_at DESC", JOINED_SELECT))?;
    let rows = stmt.query_map([], parse_order_with_product)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn get_order_detail(conn: &Connection, id: i64) -> ShopResult<Option<OrderWithProduct>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE o.id = ?1", JOINED_SELECT),
            params![id],
            parse_order_with_product,
        )
        .optional()?)
}

pub fn list_orders_for_buyer(conn: &Connection, buyer_id: i64) -> ShopResult<Vec<OrderWithProduct>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE o.buyer_id = ?1 ORDER BY o.created_at DESC",
        JOINED_SELECT
    ))?;
    let rows = stmt.query_map(params![buyer_id], parse_order_with_product)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
