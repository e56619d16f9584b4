//! Price arithmetic for cart and order renditions.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{CartItem, Product};

/// Line total: unit price × quantity. Computed on read, never persisted.
pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Cart-level total over (unit price, quantity) pairs.
pub fn total(lines: impl IntoIterator<Item = (Decimal, i32)>) -> Decimal {
    lines
        .into_iter()
        .fold(Decimal::ZERO, |acc, (price, qty)| acc + line_total(price, qty))
}

/// Order total at checkout: the *live* price of each locked product times
/// the cart quantity. Order items capture the same price, so the stored
/// total always equals the sum of its line totals.
pub fn order_total(items: &[CartItem], products: &BTreeMap<Uuid, Product>) -> Decimal {
    total(items.iter().filter_map(|item| {
        products
            .get(&item.product_id)
            .map(|p| (p.price, item.quantity))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(id: Uuid, price: Decimal, stock: i32) -> Product {
        Product {
            id,
            name: "Widget".into(),
            price,
            stock,
            description: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(product_id: Uuid, quantity: i32, price: Decimal) -> CartItem {
        CartItem {
            id: Uuid::now_v7(),
            cart_id: Uuid::nil(),
            product_id,
            quantity,
            price,
        }
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(Decimal::new(1050, 2), 3), Decimal::new(3150, 2));
    }

    #[test]
    fn test_cart_total_sums_lines() {
        let lines = vec![(Decimal::new(1000, 2), 2), (Decimal::new(550, 2), 1)];
        assert_eq!(total(lines), Decimal::new(2550, 2));
    }

    #[test]
    fn test_empty_total_is_zero() {
        assert_eq!(total(Vec::new()), Decimal::ZERO);
    }

    #[test]
    fn test_order_total_uses_live_price() {
        let p1 = Uuid::now_v7();
        let products = BTreeMap::from([(p1, product(p1, Decimal::new(1200, 2), 5))]);
        // Captured cart price (10.00) is stale; the order prices at 12.00.
        let items = vec![item(p1, 2, Decimal::new(1000, 2))];
        assert_eq!(order_total(&items, &products), Decimal::new(2400, 2));
    }
}
