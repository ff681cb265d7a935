//! Operator-facing HTTP surface.
//!
//! JSON over axum, consumed by the admin web UI. Order processing and
//! product creation route through the core (lifecycle + broadcast); the
//! rest is catalog plumbing.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use suqcore::broadcast::{product_announcement, Broadcaster};
use suqcore::lifecycle;
use suqcore::models::{NewProduct, OrderStatus};
use suqcore::outbound::Messenger;
use suqcore::storage::{self, catalog, orders, subscribers, DbPool};
use suqcore::ShopError;

/// Shared state for the admin server.
#[derive(Clone)]
pub struct AdminState {
    pub db: Arc<DbPool>,
    pub messenger: Arc<dyn Messenger>,
}

/// Maps the core error taxonomy onto HTTP statuses.
pub struct ApiError(ShopError);

impl From<ShopError> for ApiError {
    fn from(e: ShopError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ShopError::NotFound(_) => StatusCode::NOT_FOUND,
            ShopError::Validation(_) => StatusCode::BAD_REQUEST,
            // Expected business-rule rejections, not server faults
            ShopError::InvalidTransition { .. } | ShopError::DuplicateActiveOrder => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("Admin request failed: {}", self.0);
        }
        (status, Json(json!({ "success": false, "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/api/orders", get(list_orders))
        .route("/api/orders/:id", get(order_detail))
        .route("/api/orders/process", post(process_order))
        .route("/api/categories", get(list_categories).post(create_category))
        .route("/api/products", post(create_product))
        .route("/api/products/:category", get(products_by_category))
        .route("/api/product/:id", get(product_detail))
        .route("/health", get(health))
        // The operator UI is a browser app on another origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the admin API server.
pub async fn run_admin_server(port: u16, state: AdminState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log::info!("Starting admin API on http://{}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, admin_router(state)).await?;

    Ok(())
}

/// GET /health — simple health check.
async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// GET /api/orders — all orders with product summaries joined in.
async fn list_orders(State(state): State<AdminState>) -> ApiResult<Json<serde_json::Value>> {
    let conn = storage::get_connection(&state.db)?;
    let orders = orders::list_orders(&conn)?;
    Ok(Json(json!({ "success": true, "count": orders.len(), "data": orders })))
}

/// GET /api/orders/:id — one order's detail.
async fn order_detail(State(state): State<AdminState>, Path(id): Path<i64>) -> ApiResult<Json<serde_json::Value>> {
    let conn = storage::get_connection(&state.db)?;
    let detail = orders::get_order_detail(&conn, id)?.ok_or(ShopError::NotFound("order"))?;
    Ok(Json(json!({ "success": true, "data": detail })))
}

/// Operator action on one order.
#[derive(Debug, Deserialize)]
pub struct ProcessOrderRequest {
    pub action: OrderStatus,
    #[serde(alias = "orderId")]
    pub order_id: i64,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default, alias = "buyerId")]
    pub buyer_id: Option<i64>,
}

/// POST /api/orders/process — move an order along the workflow and
/// notify the buyer. Invalid edges come back as 409.
async fn process_order(
    State(state): State<AdminState>,
    Json(req): Json<ProcessOrderRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let order = lifecycle::process_order(
        &state.db,
        state.messenger.as_ref(),
        req.order_id,
        req.action,
        req.note.as_deref(),
    )
    .await?;

    // The order's stored buyer is authoritative; a mismatching payload
    // field is suspicious enough to log.
    if let Some(buyer_id) = req.buyer_id {
        if buyer_id != order.buyer_id {
            log::warn!(
                "process-order buyer_id {} does not match order {} buyer {}",
                buyer_id,
                order.id,
                order.buyer_id
            );
        }
    }

    Ok(Json(json!({ "success": true, "message": "Order processed successfully", "data": order })))
}

/// GET /api/categories
async fn list_categories(State(state): State<AdminState>) -> ApiResult<Json<serde_json::Value>> {
    let conn = storage::get_connection(&state.db)?;
    let categories = catalog::list_categories(&conn)?;
    Ok(Json(json!({ "success": true, "data": categories })))
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// POST /api/categories
async fn create_category(
    State(state): State<AdminState>,
    Json(req): Json<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ShopError::Validation("category name is required".to_string()).into());
    }

    let conn = storage::get_connection(&state.db)?;
    let category = catalog::create_category(&conn, name, req.description.as_deref())?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Category created successfully", "data": category })),
    ))
}

/// POST /api/products — persist a product, then announce it to every
/// subscriber in the background.
async fn create_product(
    State(state): State<AdminState>,
    Json(req): Json<NewProduct>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    if req.name.trim().is_empty() {
        return Err(ShopError::Validation("product name is required".to_string()).into());
    }
    if req.price <= 0 {
        return Err(ShopError::Validation("price must be positive".to_string()).into());
    }

    let (product, recipients) = {
        let conn = storage::get_connection(&state.db)?;
        if let Some(category_id) = req.category_id {
            if catalog::get_category(&conn, category_id)?.is_none() {
                return Err(ShopError::NotFound("category").into());
            }
        }
        let product = catalog::create_product(&conn, &req)?;
        let recipients = subscribers::list_subscribed(&conn)?;
        (product, recipients)
    };

    // The fan-out is paced per recipient; don't make the operator's
    // request wait for it. The per-recipient tally lands in the log.
    let announcement = product_announcement(&product);
    let messenger = Arc::clone(&state.messenger);
    tokio::spawn(async move {
        Broadcaster::from_config()
            .broadcast_product(messenger.as_ref(), &recipients, &announcement)
            .await;
    });

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Product created successfully", "data": product })),
    ))
}

/// GET /api/products/:category — products of one category, or all of
/// them for the literal id `all`.
async fn products_by_category(
    State(state): State<AdminState>,
    Path(category): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let conn = storage::get_connection(&state.db)?;
    let products = if category == "all" {
        catalog::list_products(&conn)?
    } else {
        let id: i64 = category
            .parse()
            .map_err(|_| ShopError::Validation(format!("invalid category id: {}", category)))?;
        catalog::list_products_by_category(&conn, id)?
    };
    Ok(Json(json!({ "success": true, "data": products })))
}

/// GET /api/product/:id
async fn product_detail(State(state): State<AdminState>, Path(id): Path<i64>) -> ApiResult<Json<serde_json::Value>> {
    let conn = storage::get_connection(&state.db)?;
    let product = catalog::get_product(&conn, id)?.ok_or(ShopError::NotFound("product"))?;
    Ok(Json(json!({ "success": true, "data": product })))
}
