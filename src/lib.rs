//! Storefront — self-hosted storefront backend.
//!
//! ## Features
//! - Product catalog with role-shaped stock visibility
//! - Shopping carts for authenticated and anonymous (session) shoppers
//! - Anonymous-cart merge on login
//! - Transactional checkout with row-locked inventory deduction

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod inventory;
pub mod models;
pub mod routes;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::CredentialVerifier;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub nats: Option<async_nats::Client>,
    pub verifier: Arc<dyn CredentialVerifier>,
}

/// Builds the application router with tracing and CORS layers applied.
pub fn app(state: AppState) -> axum::Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
