//! Product catalog endpoints. Reads are public; writes are staff-only.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::policy::{self, Action, Resource};
use crate::auth::RequestContext;
use crate::error::Error;
use crate::events::{self, DomainEvent};
use crate::models::Product;
use crate::routes::validation_error;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ProductBody {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub description: String,
    /// Exact count, staff only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i32>,
    /// Availability flag shown to shoppers instead of the count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn product_body(product: Product, staff: bool) -> ProductBody {
    let (stock, status) = if staff {
        (Some(product.stock), None)
    } else if product.stock > 0 {
        (None, Some("In stock"))
    } else {
        (None, Some("Out of stock"))
    };
    ProductBody {
        id: product.id,
        name: product.name,
        price: product.price,
        description: product.description,
        stock,
        status,
        created_at: product.created_at,
        updated_at: product.updated_at,
    }
}

fn is_staff(ctx: &RequestContext) -> bool {
    ctx.actor.as_ref().is_some_and(|u| u.role.is_staff())
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    pub price: Decimal,
    #[validate(range(min = 0))]
    pub stock: i32,
    #[serde(default)]
    pub description: String,
}

fn validate_product(req: &ProductRequest) -> Result<(), Error> {
    req.validate().map_err(validation_error)?;
    if req.price < Decimal::ZERO {
        return Err(Error::Validation("Price must not be negative".to_string()));
    }
    Ok(())
}

pub async fn list(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<Vec<ProductBody>>, Error> {
    policy::authorize(ctx.actor.as_ref(), Action::Read, Resource::Catalog)?;
    let products =
        sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?;
    let staff = is_staff(&ctx);
    Ok(Json(products.into_iter().map(|p| product_body(p, staff)).collect()))
}

pub async fn get(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductBody>, Error> {
    policy::authorize(ctx.actor.as_ref(), Action::Read, Resource::Catalog)?;
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(Error::NotFound("product"))?;
    Ok(Json(product_body(product, is_staff(&ctx))))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<ProductRequest>,
) -> Result<(StatusCode, Json<ProductBody>), Error> {
    policy::authorize(ctx.actor.as_ref(), Action::Create, Resource::Catalog)?;
    validate_product(&req)?;

    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (id, name, price, stock, description) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&req.name)
    .bind(req.price)
    .bind(req.stock)
    .bind(&req.description)
    .fetch_one(&state.db)
    .await?;

    events::publish(
        state.nats.as_ref(),
        DomainEvent::ProductCreated { product_id: product.id, name: product.name.clone() },
    )
    .await;

    Ok((StatusCode::CREATED, Json(product_body(product, true))))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(req): Json<ProductRequest>,
) -> Result<Json<ProductBody>, Error> {
    policy::authorize(ctx.actor.as_ref(), Action::Update, Resource::Catalog)?;
    validate_product(&req)?;

    let product = sqlx::query_as::<_, Product>(
        "UPDATE products SET name = $2, price = $3, stock = $4, description = $5, \
         updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&req.name)
    .bind(req.price)
    .bind(req.stock)
    .bind(&req.description)
    .fetch_optional(&state.db)
    .await?
    .ok_or(Error::NotFound("product"))?;

    Ok(Json(product_body(product, true)))
}

pub async fn remove(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Error> {
    policy::authorize(ctx.actor.as_ref(), Action::Delete, Resource::Catalog)?;
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound("product"));
    }
    Ok(StatusCode::NO_CONTENT)
}
