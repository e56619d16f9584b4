//! Cart identity resolution.
//!
//! Maps a request to exactly one cart: by actor for authenticated
//! requests, by session token otherwise. Carts (and sessions) are created
//! lazily on first access, so resolution is idempotent and its only
//! failure source is storage.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::auth::{self, RequestContext};
use crate::error::{Error, Result};
use crate::models::Cart;

pub struct ResolvedCart {
    pub cart: Cart,
    /// A session token minted during this resolution; the handler returns
    /// it to the client so follow-up requests reuse the same cart.
    pub minted_session: Option<String>,
}

pub async fn resolve(db: &PgPool, ctx: &RequestContext) -> Result<ResolvedCart> {
    let mut conn = db.acquire().await?;

    if let Some(actor) = &ctx.actor {
        let cart = user_cart(&mut conn, actor.id).await?;
        return Ok(ResolvedCart { cart, minted_session: None });
    }

    let (token, minted) = match &ctx.session_token {
        Some(token) => (token.clone(), false),
        None => (auth::mint_token(), true),
    };
    ensure_session(&mut conn, &token).await?;
    let cart = session_cart(&mut conn, &token).await?;
    Ok(ResolvedCart { cart, minted_session: minted.then_some(token) })
}

/// Lookup-or-create the durable cart for an actor. A lost insert race
/// falls back to re-reading the winner's row once; if that also comes up
/// empty the caller gets a conflict rather than a duplicate cart.
pub(crate) async fn user_cart(conn: &mut PgConnection, user_id: Uuid) -> Result<Cart> {
    if let Some(cart) = sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
    {
        return Ok(cart);
    }

    if let Some(cart) = sqlx::query_as::<_, Cart>(
        "INSERT INTO carts (id, user_id) VALUES ($1, $2) \
         ON CONFLICT (user_id) DO NOTHING RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    {
        return Ok(cart);
    }

    sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::Conflict("cart ownership changed concurrently".to_string()))
}

async fn session_cart(conn: &mut PgConnection, token: &str) -> Result<Cart> {
    if let Some(cart) = sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE session_token = $1")
        .bind(token)
        .fetch_optional(&mut *conn)
        .await?
    {
        return Ok(cart);
    }

    if let Some(cart) = sqlx::query_as::<_, Cart>(
        "INSERT INTO carts (id, session_token) VALUES ($1, $2) \
         ON CONFLICT (session_token) DO NOTHING RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(token)
    .fetch_optional(&mut *conn)
    .await?
    {
        return Ok(cart);
    }

    sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE session_token = $1")
        .bind(token)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::Conflict("session cart changed concurrently".to_string()))
}

/// Persisting a previously unseen session token is itself an observable
/// effect of anonymous resolution.
async fn ensure_session(conn: &mut PgConnection, token: &str) -> Result<()> {
    sqlx::query("INSERT INTO sessions (token) VALUES ($1) ON CONFLICT (token) DO NOTHING")
        .bind(token)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
