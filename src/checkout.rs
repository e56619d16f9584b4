//! Checkout engine: converts a cart into an immutable order.
//!
//! The whole conversion is one transaction. Product rows are locked in
//! ascending id order, every line is validated against the locked stock,
//! the order and its items are written, stock is decremented, and the
//! cart is emptied. Any failure unwinds everything: no stock change, no
//! order rows, cart intact.

use std::collections::BTreeMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::cart::store;
use crate::domain::{pricing, stock};
use crate::error::{Error, Result};
use crate::inventory;
use crate::models::{Cart, CartItem, Order, Product, User};

/// Places an order from the actor's cart.
///
/// Rejections: `NotFound("cart")` when the actor has never had a cart,
/// `EmptyCart` for a cart with no lines, `InsufficientStock` when any
/// locked line exceeds the product's current stock.
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn place_order(db: &PgPool, user: &User) -> Result<Order> {
    let mut tx = db.begin().await?;

    let cart = sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE user_id = $1")
        .bind(user.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(Error::NotFound("cart"))?;

    let items = sqlx::query_as::<_, CartItem>(
        "SELECT * FROM cart_items WHERE cart_id = $1 ORDER BY product_id",
    )
    .bind(cart.id)
    .fetch_all(&mut *tx)
    .await?;
    if items.is_empty() {
        return Err(Error::EmptyCart);
    }

    // Lock every referenced product, then decide success against the
    // locked snapshots: a concurrent checkout that got there first has
    // already decremented what we are about to read.
    let product_ids = stock::lock_order(items.iter().map(|item| item.product_id));
    let products = inventory::lock_for_checkout(&mut *tx, &product_ids).await?;
    let products: BTreeMap<Uuid, Product> =
        products.into_iter().map(|p| (p.id, p)).collect();

    stock::validate_lines(&items, &products)?;
    let total_price = pricing::order_total(&items, &products);

    let order = sqlx::query_as::<_, Order>(
        "INSERT INTO orders (id, user_id, total_price) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user.id)
    .bind(total_price)
    .fetch_one(&mut *tx)
    .await?;

    for item in &items {
        let product =
            inventory::reserve_and_decrement(&mut *tx, item.product_id, item.quantity).await?;
        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_id, quantity, price) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::now_v7())
        .bind(order.id)
        .bind(product.id)
        .bind(item.quantity)
        .bind(product.price)
        .execute(&mut *tx)
        .await?;
    }

    store::clear(&mut *tx, cart.id).await?;
    store::touch(&mut *tx, cart.id).await?;

    tx.commit().await?;
    tracing::info!(order_id = %order.id, total = %order.total_price, "order placed");
    Ok(order)
}
