//! Best-effort domain event publication over NATS.
//!
//! Events go out after the owning transaction commits; a publish failure
//! is logged and otherwise ignored, so the bus can be absent entirely.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    ProductCreated {
        product_id: Uuid,
        name: String,
    },
    CartMerged {
        user_id: Uuid,
        cart_id: Uuid,
        moved_items: usize,
    },
    OrderPlaced {
        order_id: Uuid,
        user_id: Uuid,
        total_price: Decimal,
    },
}

impl DomainEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            DomainEvent::ProductCreated { .. } => "storefront.product.created",
            DomainEvent::CartMerged { .. } => "storefront.cart.merged",
            DomainEvent::OrderPlaced { .. } => "storefront.order.placed",
        }
    }
}

pub async fn publish(nats: Option<&async_nats::Client>, event: DomainEvent) {
    let Some(client) = nats else { return };
    let payload = match serde_json::to_vec(&event) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(error = %err, "failed to encode domain event");
            return;
        }
    };
    if let Err(err) = client.publish(event.subject().to_string(), payload.into()).await {
        tracing::warn!(subject = event.subject(), error = %err, "event publish failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_subjects() {
        let event = DomainEvent::OrderPlaced {
            order_id: Uuid::nil(),
            user_id: Uuid::nil(),
            total_price: Decimal::ZERO,
        };
        assert_eq!(event.subject(), "storefront.order.placed");
    }

    #[test]
    fn test_events_tag_their_type() {
        let event = DomainEvent::ProductCreated {
            product_id: Uuid::nil(),
            name: "Widget".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "product_created");
        assert_eq!(json["name"], "Widget");
    }
}
