//! HTTP surface: route table and shared handler helpers.

pub mod cart;
pub mod orders;
pub mod products;
pub mod users;

use axum::routing::{delete, get, post, put};
use axum::{Json, Router};

use crate::error::Error;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/products", get(products::list).post(products::create))
        .route(
            "/api/products/:id",
            get(products::get).put(products::update).delete(products::remove),
        )
        .route("/api/cart", get(cart::show))
        .route("/api/cart/items", get(cart::list_items).post(cart::add_item))
        .route("/api/carts/stale", delete(cart::purge_stale))
        .route("/api/orders", get(orders::list).post(orders::create))
        .route("/api/orders/:id", get(orders::get))
        .route("/api/users", post(users::register))
        .route("/api/users/me", get(users::me))
        .route("/api/users/me/profile", put(users::update_profile))
        .route("/api/auth/login", post(users::login))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy", "service": "storefront"}))
}

pub(crate) fn validation_error(errors: validator::ValidationErrors) -> Error {
    Error::Validation(errors.to_string())
}
