//! Merge-on-login: fold an anonymous session cart into the actor's cart.
//!
//! The fold is computed as a pure plan over both item sets, then executed
//! as SQL inside one transaction: either the anonymous cart is fully
//! absorbed and deleted, or nothing changes and it remains for retry.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::cart::{resolver, store};
use crate::error::{unique_violation, Error, Result};
use crate::models::{Cart, CartItem, User};

/// One absorbed line: the source quantity lands on an existing target line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Increment {
    pub target_item: Uuid,
    pub source_item: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Default)]
pub struct MergePlan {
    pub increments: Vec<Increment>,
    /// Source lines with no counterpart on the target cart; re-parented,
    /// not copied.
    pub reparent: Vec<Uuid>,
}

impl MergePlan {
    pub fn is_empty(&self) -> bool {
        self.increments.is_empty() && self.reparent.is_empty()
    }
}

/// Plans the fold of `source_items` into a cart already holding
/// `target_items`. Shared products add quantities onto the target line
/// (captured prices are left as-is on the target); the rest transfer.
pub fn plan(target_items: &[CartItem], source_items: &[CartItem]) -> MergePlan {
    let by_product: HashMap<Uuid, &CartItem> =
        target_items.iter().map(|item| (item.product_id, item)).collect();

    let mut merged = MergePlan::default();
    for source in source_items {
        match by_product.get(&source.product_id) {
            Some(target) => merged.increments.push(Increment {
                target_item: target.id,
                source_item: source.id,
                quantity: source.quantity,
            }),
            None => merged.reparent.push(source.id),
        }
    }
    merged
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub cart_id: Uuid,
    pub moved_items: usize,
}

/// Absorbs the anonymous cart behind `session_token` into `user`'s cart.
/// Returns `None` when no anonymous cart exists (re-running a completed
/// merge is a no-op).
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn merge_on_login(
    db: &PgPool,
    user: &User,
    session_token: &str,
) -> Result<Option<MergeOutcome>> {
    let mut tx = db.begin().await?;

    // Lock the anonymous cart row so a concurrent merge of the same
    // session serializes behind this one and then sees it gone.
    let anon_cart = sqlx::query_as::<_, Cart>(
        "SELECT * FROM carts WHERE session_token = $1 FOR UPDATE",
    )
    .bind(session_token)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(anon_cart) = anon_cart else {
        return Ok(None);
    };

    let user_cart = resolver::user_cart(&mut *tx, user.id).await?;

    let anon_items = cart_items(&mut *tx, anon_cart.id).await?;
    let user_items = cart_items(&mut *tx, user_cart.id).await?;
    let moved_items = anon_items.len();
    let merged = plan(&user_items, &anon_items);

    for increment in &merged.increments {
        sqlx::query("UPDATE cart_items SET quantity = quantity + $2 WHERE id = $1")
            .bind(increment.target_item)
            .bind(increment.quantity)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(increment.source_item)
            .execute(&mut *tx)
            .await?;
    }

    for item_id in &merged.reparent {
        sqlx::query("UPDATE cart_items SET cart_id = $2 WHERE id = $1")
            .bind(item_id)
            .bind(user_cart.id)
            .execute(&mut *tx)
            .await
            .map_err(conflict_on_unique)?;
    }

    sqlx::query("DELETE FROM carts WHERE id = $1")
        .bind(anon_cart.id)
        .execute(&mut *tx)
        .await?;
    store::touch(&mut *tx, user_cart.id).await?;

    tx.commit().await?;
    tracing::info!(cart_id = %user_cart.id, moved_items, "merged anonymous cart");
    Ok(Some(MergeOutcome { cart_id: user_cart.id, moved_items }))
}

async fn cart_items(
    conn: &mut sqlx::PgConnection,
    cart_id: Uuid,
) -> Result<Vec<CartItem>> {
    let items =
        sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE cart_id = $1 ORDER BY id")
            .bind(cart_id)
            .fetch_all(&mut *conn)
            .await?;
    Ok(items)
}

/// A unique-key loss here means the user's cart changed under the merge;
/// the transaction unwinds and the caller may retry against fresh state.
fn conflict_on_unique(err: sqlx::Error) -> Error {
    match unique_violation(&err) {
        Some(_) => Error::Conflict("cart changed concurrently during merge".to_string()),
        None => err.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn item(cart_id: Uuid, product_id: Uuid, quantity: i32) -> CartItem {
        CartItem {
            id: Uuid::now_v7(),
            cart_id,
            product_id,
            quantity,
            price: Decimal::new(1000, 2),
        }
    }

    #[test]
    fn test_plan_folds_shared_products_and_transfers_the_rest() {
        let user_cart = Uuid::from_u128(1);
        let anon_cart = Uuid::from_u128(2);
        let p1 = Uuid::from_u128(10);
        let p2 = Uuid::from_u128(20);

        let user_p1 = item(user_cart, p1, 1);
        let anon_p1 = item(anon_cart, p1, 2);
        let anon_p2 = item(anon_cart, p2, 1);

        let merged = plan(
            std::slice::from_ref(&user_p1),
            &[anon_p1.clone(), anon_p2.clone()],
        );

        assert_eq!(
            merged.increments,
            vec![Increment {
                target_item: user_p1.id,
                source_item: anon_p1.id,
                quantity: 2,
            }]
        );
        assert_eq!(merged.reparent, vec![anon_p2.id]);
    }

    #[test]
    fn test_plan_with_no_anonymous_items_is_empty() {
        let user_items = vec![item(Uuid::from_u128(1), Uuid::from_u128(10), 3)];
        assert!(plan(&user_items, &[]).is_empty());
    }

    #[test]
    fn test_plan_into_empty_user_cart_transfers_everything() {
        let anon_cart = Uuid::from_u128(2);
        let items = vec![
            item(anon_cart, Uuid::from_u128(10), 2),
            item(anon_cart, Uuid::from_u128(20), 1),
        ];
        let merged = plan(&[], &items);
        assert!(merged.increments.is_empty());
        assert_eq!(merged.reparent.len(), 2);
    }
}
