use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::error::ShopResult;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a connection pool over the SQLite file at `database_path` and
/// bring the schema up to date.
pub fn create_pool(database_path: &str) -> ShopResult<DbPool> {
    let manager =
        SqliteConnectionManager::file(database_path).with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = Pool::builder().max_size(10).build(manager)?;

    let mut conn = pool.get()?;
    super::migrations::run_migrations(&mut conn)?;

    Ok(pool)
}

/// Get a connection from the pool; returned to the pool on drop.
pub fn get_connection(pool: &DbPool) -> ShopResult<DbConnection> {
    Ok(pool.get()?)
}
