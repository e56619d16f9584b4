//! Stock rules: add-time validation and the post-lock checkout check.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::error::Error;
use crate::models::{CartItem, Product};

/// Validates a requested add/increment quantity against the product's
/// current stock. Only the requested delta is checked; the combined line
/// quantity is re-validated at checkout, which holds the locks.
pub fn validate_add(requested: i32, available: i32) -> Result<(), Error> {
    if requested < 1 {
        return Err(Error::Validation("Quantity must be at least 1".to_string()));
    }
    if requested > available {
        return Err(Error::Validation(format!(
            "Only {available} items available in stock"
        )));
    }
    Ok(())
}

/// Distinct product ids in ascending order — the lock acquisition order
/// shared by every checkout, so overlapping checkouts cannot deadlock.
pub fn lock_order(product_ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = product_ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Validates every cart line against the locked product snapshots. The
/// first oversold line rejects the whole checkout.
pub fn validate_lines(
    items: &[CartItem],
    products: &BTreeMap<Uuid, Product>,
) -> Result<(), Error> {
    for item in items {
        let product = products
            .get(&item.product_id)
            .ok_or(Error::NotFound("product"))?;
        if item.quantity > product.stock {
            return Err(Error::InsufficientStock {
                product_id: product.id,
                available: product.stock,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn product(id: Uuid, stock: i32) -> Product {
        Product {
            id,
            name: "Widget".into(),
            price: Decimal::new(1000, 2),
            stock,
            description: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(product_id: Uuid, quantity: i32) -> CartItem {
        CartItem {
            id: Uuid::now_v7(),
            cart_id: Uuid::nil(),
            product_id,
            quantity,
            price: Decimal::new(1000, 2),
        }
    }

    #[test]
    fn test_add_within_stock() {
        assert!(validate_add(3, 5).is_ok());
        assert!(validate_add(5, 5).is_ok());
    }

    #[test]
    fn test_add_rejects_non_positive() {
        assert!(validate_add(0, 5).is_err());
        assert!(validate_add(-2, 5).is_err());
    }

    #[test]
    fn test_add_rejects_oversell_with_available_count() {
        let err = validate_add(6, 5).unwrap_err();
        assert_eq!(err.to_string(), "Only 5 items available in stock");
    }

    #[test]
    fn test_lock_order_sorted_and_deduped() {
        let a = Uuid::from_u128(3);
        let b = Uuid::from_u128(1);
        let c = Uuid::from_u128(2);
        assert_eq!(lock_order([a, b, c, b]), vec![b, c, a]);
    }

    #[test]
    fn test_validate_lines_ok() {
        let p = Uuid::from_u128(1);
        let products = BTreeMap::from([(p, product(p, 5))]);
        assert!(validate_lines(&[item(p, 5)], &products).is_ok());
    }

    #[test]
    fn test_validate_lines_rejects_oversell() {
        let p = Uuid::from_u128(1);
        let products = BTreeMap::from([(p, product(p, 5))]);
        let err = validate_lines(&[item(p, 10)], &products).unwrap_err();
        match err {
            Error::InsufficientStock { product_id, available } => {
                assert_eq!(product_id, p);
                assert_eq!(available, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_lines_second_line_rejects() {
        let p1 = Uuid::from_u128(1);
        let p2 = Uuid::from_u128(2);
        let products =
            BTreeMap::from([(p1, product(p1, 10)), (p2, product(p2, 1))]);
        let err = validate_lines(&[item(p1, 2), item(p2, 2)], &products).unwrap_err();
        assert!(matches!(err, Error::InsufficientStock { available: 1, .. }));
    }
}
