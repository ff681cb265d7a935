use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Fulfillment status of an order.
///
/// The workflow is a small state machine; `can_transition_to` is the only
/// source of truth for which operator actions are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Paid,
    Shipped,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
        }
    }

    /// Terminal statuses never change again and free the (buyer, product)
    /// pair for a new order.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Rejected | OrderStatus::Completed)
    }

    /// The allowed workflow edges:
    ///
    /// ```text
    /// Pending  -> Accepted | Rejected
    /// Accepted -> Paid | Rejected
    /// Paid     -> Shipped
    /// Shipped  -> Completed
    /// ```
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (*self, target),
            (Pending, Accepted)
                | (Pending, Rejected)
                | (Accepted, Rejected)
                | (Accepted, Paid)
                | (Paid, Shipped)
                | (Shipped, Completed)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "accepted" => Ok(OrderStatus::Accepted),
            "rejected" => Ok(OrderStatus::Rejected),
            "paid" => Ok(OrderStatus::Paid),
            "shipped" => Ok(OrderStatus::Shipped),
            "completed" => Ok(OrderStatus::Completed),
            _ => Err(format!("Unknown order status: {}", s)),
        }
    }
}

// rusqlite FromSql: read status from a TEXT column
impl rusqlite::types::FromSql for OrderStatus {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        let s = value.as_str()?;
        OrderStatus::from_str(s).map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(std::io::Error::other(e))))
    }
}

// rusqlite ToSql: write status as TEXT
impl rusqlite::types::ToSql for OrderStatus {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        Ok(rusqlite::types::ToSqlOutput::Borrowed(rusqlite::types::ValueRef::Text(
            self.as_str().as_bytes(),
        )))
    }
}

/// A catalog category.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// A catalog product. `price` is in whole birr.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: i64,
    pub category_id: Option<i64>,
    pub description: Option<String>,
    pub image_urls: Vec<String>,
}

/// Input for product creation from the operator surface.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: i64,
    pub category_id: Option<i64>,
    pub description: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

/// A chat identity eligible for broadcasts.
#[derive(Debug, Clone, Serialize)]
pub struct Subscriber {
    pub chat_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub subscribed: bool,
}

/// A persisted purchase request, tracked through the status workflow.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: i64,
    pub buyer_id: i64,
    pub product_id: i64,
    pub phone: String,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
