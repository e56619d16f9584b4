//! Error taxonomy with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    /// Client-correctable input problem, surfaced with a field-scoped message.
    #[error("{0}")]
    Validation(String),

    /// Checkout attempted against a cart with no items.
    #[error("Cart is empty")]
    EmptyCart,

    /// A cart line requests more units than the locked product row holds.
    #[error("Product quantity exceeds stock")]
    InsufficientStock { product_id: Uuid, available: i32 },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Permission denied")]
    PermissionDenied,

    /// Concurrent cart-creation race that survived the internal retry.
    #[error("{0}")]
    Conflict(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::EmptyCart | Error::InsufficientStock { .. } => {
                StatusCode::BAD_REQUEST
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Error::Database(err) => {
                tracing::error!(error = %err, "database error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Postgres unique-constraint violation, keyed by constraint name when known.
pub fn unique_violation(err: &sqlx::Error) -> Option<String> {
    if let sqlx::Error::Database(db_err) = err {
        if db_err.code().as_deref() == Some("23505") {
            return Some(db_err.constraint().unwrap_or_default().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::EmptyCart.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::InsufficientStock { product_id: Uuid::nil(), available: 5 }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::NotFound("cart").status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::NotAuthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::PermissionDenied.status(), StatusCode::FORBIDDEN);
        assert_eq!(Error::Conflict("cart".into()).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_wire_messages() {
        assert_eq!(Error::EmptyCart.to_string(), "Cart is empty");
        assert_eq!(
            Error::InsufficientStock { product_id: Uuid::nil(), available: 0 }.to_string(),
            "Product quantity exceeds stock"
        );
        assert_eq!(Error::NotFound("cart").to_string(), "cart not found");
    }
}
