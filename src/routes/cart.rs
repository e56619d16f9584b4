//! Cart endpoints, shared by authenticated and anonymous shoppers.
//!
//! Anonymous responses that minted a session carry the token back in the
//! `x-session-token` header; the client presents it on follow-up requests
//! to keep addressing the same cart.

use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::policy::{self, Action, Resource};
use crate::auth::{RequestContext, SESSION_HEADER};
use crate::cart::store::{self, CartItemDetail};
use crate::cart::resolver;
use crate::error::Error;
use crate::routes::validation_error;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CartItemBody {
    pub id: Uuid,
    pub product: Uuid,
    pub product_name: String,
    pub product_price: Decimal,
    pub quantity: i32,
    pub price: Decimal,
    pub available_stock: i32,
    pub total_price: Decimal,
}

impl From<CartItemDetail> for CartItemBody {
    fn from(detail: CartItemDetail) -> Self {
        let total_price = detail.total_price();
        Self {
            id: detail.id,
            product: detail.product_id,
            product_name: detail.product_name,
            product_price: detail.product_price,
            quantity: detail.quantity,
            price: detail.price,
            available_stock: detail.available_stock,
            total_price,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartBody {
    pub id: Uuid,
    pub user: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<CartItemBody>,
    pub total_price: Decimal,
}

fn with_session(mut response: Response, minted: Option<String>) -> Response {
    if let Some(token) = minted {
        if let Ok(value) = HeaderValue::from_str(&token) {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
    }
    response
}

pub async fn show(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response, Error> {
    policy::authorize(ctx.actor.as_ref(), Action::Read, Resource::Cart)?;
    let resolved = resolver::resolve(&state.db, &ctx).await?;
    let items = store::items(&state.db, resolved.cart.id).await?;
    let body = CartBody {
        id: resolved.cart.id,
        user: resolved.cart.user_id,
        created_at: resolved.cart.created_at,
        updated_at: resolved.cart.updated_at,
        total_price: store::cart_total(&items),
        items: items.into_iter().map(Into::into).collect(),
    };
    Ok(with_session(Json(body).into_response(), resolved.minted_session))
}

pub async fn list_items(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response, Error> {
    policy::authorize(ctx.actor.as_ref(), Action::Read, Resource::Cart)?;
    let resolved = resolver::resolve(&state.db, &ctx).await?;
    let items = store::items(&state.db, resolved.cart.id).await?;
    let body: Vec<CartItemBody> = items.into_iter().map(Into::into).collect();
    Ok(with_session(Json(body).into_response(), resolved.minted_session))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

pub async fn add_item(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<AddItemRequest>,
) -> Result<Response, Error> {
    policy::authorize(ctx.actor.as_ref(), Action::Create, Resource::Cart)?;
    req.validate().map_err(validation_error)?;

    let resolved = resolver::resolve(&state.db, &ctx).await?;
    let detail = store::add_item(&state.db, &resolved.cart, req.product, req.quantity).await?;

    let response =
        (StatusCode::CREATED, Json(CartItemBody::from(detail))).into_response();
    Ok(with_session(response, resolved.minted_session))
}

#[derive(Debug, Deserialize)]
pub struct PurgeParams {
    pub days: Option<i64>,
}

/// Staff-triggered retention sweep for abandoned anonymous carts.
pub async fn purge_stale(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(params): Query<PurgeParams>,
) -> Result<Json<serde_json::Value>, Error> {
    policy::authorize(ctx.actor.as_ref(), Action::Delete, Resource::StaleCarts)?;
    let days = params.days.unwrap_or(30);
    if days < 1 {
        return Err(Error::Validation("days must be at least 1".to_string()));
    }
    let cutoff = Utc::now() - Duration::days(days);
    let purged = store::purge_stale_anonymous(&state.db, cutoff).await?;
    Ok(Json(serde_json::json!({ "purged": purged })))
}
