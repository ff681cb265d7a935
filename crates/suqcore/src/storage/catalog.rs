//! Catalog queries: categories and products.
//!
//! Read-only to the conversational core; the operator surface also
//! creates rows here. `image_urls` is stored as a JSON array column.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::ShopResult;
use crate::models::{Category, NewProduct, Product};

fn parse_category(row: &rusqlite::Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
    })
}

fn parse_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    let images_json: String = row.get(5)?;
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        price: row.get(2)?,
        category_id: row.get(3)?,
        description: row.get(4)?,
        image_urls: serde_json::from_str(&images_json).unwrap_or_default(),
    })
}

const PRODUCT_COLS: &str = "id, name, price, category_id, description, image_urls";

pub fn create_category(conn: &Connection, name: &str, description: Option<&str>) -> ShopResult<Category> {
    conn.execute(
        "INSERT INTO categories (name, description) VALUES (?1, ?2)",
        params![name, description],
    )?;
    let id = conn.last_insert_rowid();
    Ok(Category {
        id,
        name: name.to_string(),
        description: description.map(str::to_string),
    })
}

pub fn list_categories(conn: &Connection) -> ShopResult<Vec<Category>> {
    let mut stmt = conn.prepare("SELECT id, name, description FROM categories ORDER BY name ASC")?;
    let rows = stmt.query_map([], parse_category)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn get_category(conn: &Connection, id: i64) -> ShopResult<Option<Category>> {
    Ok(conn
        .query_row(
            "SELECT id, name, description FROM categories WHERE id = ?1",
            params![id],
            parse_category,
        )
        .optional()?)
}

pub fn create_product(conn: &Connection, new: &NewProduct) -> ShopResult<Product> {
    let images_json = serde_json::to_string(&new.image_urls).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "INSERT INTO products (name, price, category_id, description, image_urls) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![new.name, new.price, new.category_id, new.description, images_json],
    )?;
    let id = conn.last_insert_rowid();
    Ok(Product {
        id,
        name: new.name.clone(),
        price: new.price,
        category_id: new.category_id,
        description: new.description.clone(),
        image_urls: new.image_urls.clone(),
    })
}

pub fn get_product(conn: &Connection, id: i64) -> ShopResult<Option<Product>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLS),
            params![id],
            parse_product,
        )
        .optional()?)
}

pub fn list_products(conn: &Connection) -> ShopResult<Vec<Product>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM products ORDER BY name ASC", PRODUCT_COLS))?;
    let rows = stmt.query_map([], parse_product)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn list_products_by_category(conn: &Connection, category_id: i64) -> ShopResult<Vec<Product>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM products WHERE category_id = ?1 ORDER BY name ASC",
        PRODUCT_COLS
    ))?;
    let rows = stmt.query_map(params![category_id], parse_product)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
