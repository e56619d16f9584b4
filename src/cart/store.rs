//! Cart line-item storage.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::{pricing, stock};
use crate::error::{Error, Result};
use crate::models::{Cart, CartItem, Product};

/// A cart line joined with its product: captured price alongside the live
/// price and remaining stock.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CartItemDetail {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_price: Decimal,
    pub available_stock: i32,
    pub quantity: i32,
    pub price: Decimal,
}

impl CartItemDetail {
    pub fn total_price(&self) -> Decimal {
        pricing::line_total(self.price, self.quantity)
    }
}

/// Adds a product to the cart, or increments the existing line.
///
/// The requested quantity is validated against current stock; on an
/// increment the captured price is refreshed to the product's current
/// price. The combined line quantity is NOT re-checked here — checkout
/// re-validates every line under row locks.
pub async fn add_item(
    db: &PgPool,
    cart: &Cart,
    product_id: Uuid,
    quantity: i32,
) -> Result<CartItemDetail> {
    let mut tx = db.begin().await?;

    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(Error::NotFound("product"))?;

    stock::validate_add(quantity, product.stock)?;

    let item = sqlx::query_as::<_, CartItem>(
        "INSERT INTO cart_items (id, cart_id, product_id, quantity, price) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (cart_id, product_id) DO UPDATE \
         SET quantity = cart_items.quantity + EXCLUDED.quantity, price = EXCLUDED.price \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(cart.id)
    .bind(product.id)
    .bind(quantity)
    .bind(product.price)
    .fetch_one(&mut *tx)
    .await?;

    touch(&mut *tx, cart.id).await?;
    tx.commit().await?;

    Ok(CartItemDetail {
        id: item.id,
        product_id: product.id,
        product_name: product.name,
        product_price: product.price,
        available_stock: product.stock,
        quantity: item.quantity,
        price: item.price,
    })
}

/// The cart's lines in insertion order, joined with product data.
pub async fn items(db: &PgPool, cart_id: Uuid) -> Result<Vec<CartItemDetail>> {
    let items = sqlx::query_as::<_, CartItemDetail>(
        "SELECT ci.id, ci.product_id, p.name AS product_name, p.price AS product_price, \
                p.stock AS available_stock, ci.quantity, ci.price \
         FROM cart_items ci \
         JOIN products p ON p.id = ci.product_id \
         WHERE ci.cart_id = $1 \
         ORDER BY ci.id",
    )
    .bind(cart_id)
    .fetch_all(db)
    .await?;
    Ok(items)
}

/// Cart-level total: captured price × quantity, summed.
pub fn cart_total(items: &[CartItemDetail]) -> Decimal {
    pricing::total(items.iter().map(|item| (item.price, item.quantity)))
}

/// Deletes every line of the cart. The checkout engine calls this inside
/// its transaction after order rows are written.
pub(crate) async fn clear(conn: &mut PgConnection, cart_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn touch(conn: &mut PgConnection, cart_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Deletes anonymous carts untouched since the cutoff; their items go
/// with them. Returns the number of carts removed.
pub async fn purge_stale_anonymous(db: &PgPool, cutoff: DateTime<Utc>) -> Result<u64> {
    let result =
        sqlx::query("DELETE FROM carts WHERE user_id IS NULL AND updated_at < $1")
            .bind(cutoff)
            .execute(db)
            .await?;
    Ok(result.rows_affected())
}
