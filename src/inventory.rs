//! Inventory ledger: exclusive product-row locks and checked decrements.
//!
//! Both operations run against a caller-owned transaction; the locks live
//! exactly as long as that transaction does.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Product;

/// Locks every listed product row `FOR UPDATE`, in ascending id order so
/// overlapping checkouts acquire locks in the same sequence. Returns the
/// locked snapshots (also ascending).
pub async fn lock_for_checkout(
    conn: &mut PgConnection,
    product_ids: &[Uuid],
) -> Result<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE",
    )
    .bind(product_ids)
    .fetch_all(&mut *conn)
    .await?;
    Ok(products)
}

/// Decrements stock by `quantity` iff enough remains, returning the
/// updated row. Fails with `InsufficientStock` (carrying the current
/// available count) when the guard does not hold.
pub async fn reserve_and_decrement(
    conn: &mut PgConnection,
    product_id: Uuid,
    quantity: i32,
) -> Result<Product> {
    let updated = sqlx::query_as::<_, Product>(
        "UPDATE products SET stock = stock - $2, updated_at = NOW() \
         WHERE id = $1 AND stock >= $2 RETURNING *",
    )
    .bind(product_id)
    .bind(quantity)
    .fetch_optional(&mut *conn)
    .await?;

    match updated {
        Some(product) => Ok(product),
        None => {
            let available: Option<i32> =
                sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                    .bind(product_id)
                    .fetch_optional(&mut *conn)
                    .await?;
            match available {
                Some(available) => Err(Error::InsufficientStock { product_id, available }),
                None => Err(Error::NotFound("product")),
            }
        }
    }
}
