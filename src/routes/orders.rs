//! Order endpoints: checkout and owner-scoped reads.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::policy::{self, Action, Capability, Resource};
use crate::auth::RequestContext;
use crate::checkout;
use crate::domain::pricing;
use crate::error::Error;
use crate::events::{self, DomainEvent};
use crate::models::Order;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct OrderItemBody {
    pub id: Uuid,
    pub product: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct OrderBody {
    pub id: Uuid,
    pub user: Uuid,
    pub user_email: String,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemBody>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemDetail {
    id: Uuid,
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    price: Decimal,
}

async fn order_body(db: &sqlx::PgPool, order: &Order) -> Result<OrderBody, Error> {
    let user_email: String = sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
        .bind(order.user_id)
        .fetch_one(db)
        .await?;

    let items = sqlx::query_as::<_, OrderItemDetail>(
        "SELECT oi.id, oi.product_id, p.name AS product_name, oi.quantity, oi.price \
         FROM order_items oi \
         JOIN products p ON p.id = oi.product_id \
         WHERE oi.order_id = $1 \
         ORDER BY oi.id",
    )
    .bind(order.id)
    .fetch_all(db)
    .await?;

    Ok(OrderBody {
        id: order.id,
        user: order.user_id,
        user_email,
        total_price: order.total_price,
        created_at: order.created_at,
        updated_at: order.updated_at,
        items: items
            .into_iter()
            .map(|item| OrderItemBody {
                id: item.id,
                product: item.product_id,
                product_name: item.product_name,
                quantity: item.quantity,
                price: item.price,
                total_price: pricing::line_total(item.price, item.quantity),
            })
            .collect(),
    })
}

/// POST /api/orders — checkout the caller's cart.
pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<(StatusCode, Json<OrderBody>), Error> {
    policy::authorize(ctx.actor.as_ref(), Action::Create, Resource::Order { owner: None })?;
    let actor = ctx.require_actor()?;

    let order = checkout::place_order(&state.db, actor).await?;

    events::publish(
        state.nats.as_ref(),
        DomainEvent::OrderPlaced {
            order_id: order.id,
            user_id: order.user_id,
            total_price: order.total_price,
        },
    )
    .await;

    let body = order_body(&state.db, &order).await?;
    Ok((StatusCode::CREATED, Json(body)))
}

/// GET /api/orders — the caller's orders; staff see every order.
pub async fn list(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<Vec<OrderBody>>, Error> {
    let actor = ctx.require_actor()?;
    policy::authorize(
        Some(actor),
        Action::Read,
        Resource::Order { owner: Some(actor.id) },
    )?;

    let orders = if policy::has(Some(actor), Capability::ViewAllOrders) {
        sqlx::query_as::<_, Order>("SELECT * FROM orders ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?
    } else {
        sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(actor.id)
        .fetch_all(&state.db)
        .await?
    };

    let mut bodies = Vec::with_capacity(orders.len());
    for order in &orders {
        bodies.push(order_body(&state.db, order).await?);
    }
    Ok(Json(bodies))
}

pub async fn get(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderBody>, Error> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(Error::NotFound("order"))?;

    policy::authorize(
        ctx.actor.as_ref(),
        Action::Read,
        Resource::Order { owner: Some(order.user_id) },
    )?;

    Ok(Json(order_body(&state.db, &order).await?))
}
