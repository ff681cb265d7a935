use thiserror::Error;

use crate::models::OrderStatus;
use crate::outbound::TransportError;

/// Centralized error types for the application.
///
/// Business-rule rejections (`InvalidTransition`, `DuplicateActiveOrder`)
/// are ordinary variants here rather than panics or ad hoc strings: callers
/// are expected to match on them and report to the actor without mutating
/// anything.
#[derive(Error, Debug)]
pub enum ShopError {
    /// Database-level errors
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Schema migration errors
    #[error("migration error: {0}")]
    Migration(String),

    /// A referenced entity does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Malformed input (bad phone number, missing product fields, ...)
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested order status change is not an allowed edge
    #[error("invalid order status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// A non-terminal order already exists for this (buyer, product) pair
    #[error("an order for this product is already in progress")]
    DuplicateActiveOrder,

    /// Message delivery failure surfaced to a caller that asked for it
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<TransportError> for ShopError {
    fn from(err: TransportError) -> Self {
        ShopError::Transport(err.0)
    }
}

/// Type alias for Result with ShopError
pub type ShopResult<T> = Result<T, ShopError>;
