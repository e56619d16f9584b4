//! Request identity: bearer-token actors and anonymous session tokens.
//!
//! Every handler receives a [`RequestContext`] extracted once per request.
//! The token probe is best-effort: a missing, unknown, or unreadable token
//! leaves the request anonymous rather than failing it.

pub mod policy;

use std::fmt::Write as _;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::User;
use crate::AppState;

pub const SESSION_HEADER: &str = "x-session-token";
const TOKEN_SCHEME: &str = "Token ";

/// Mints an opaque token (32 hex chars). Used for both auth tokens and
/// anonymous session keys; only digests of auth tokens are persisted.
pub fn mint_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// SHA-256 hex digest of an opaque token.
pub fn token_digest(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Seam to the identity collaborator that owns credential mechanics.
/// The storefront never sees plaintext secrets at rest.
pub trait CredentialVerifier: Send + Sync {
    fn digest(&self, secret: &str) -> String;
    fn verify(&self, candidate: &str, stored: &str) -> bool;
}

/// Digest-comparison verifier. A deployment substitutes its own
/// implementation (KDF, remote IdP) without touching call sites.
#[derive(Debug, Default)]
pub struct Sha256Verifier;

impl CredentialVerifier for Sha256Verifier {
    fn digest(&self, secret: &str) -> String {
        token_digest(secret)
    }

    fn verify(&self, candidate: &str, stored: &str) -> bool {
        self.digest(candidate) == stored
    }
}

/// Request-scoped identity: an authenticated actor, an anonymous session
/// token, or neither (first anonymous contact).
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub actor: Option<User>,
    pub session_token: Option<String>,
}

impl RequestContext {
    pub fn require_actor(&self) -> Result<&User> {
        self.actor.as_ref().ok_or(Error::NotAuthenticated)
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(TOKEN_SCHEME)
        .map(str::trim)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let actor = match bearer_token(parts) {
            Some(token) => match lookup_actor(&state.db, token).await {
                Ok(actor) => actor,
                Err(err) => {
                    tracing::debug!(error = %err, "auth probe failed, continuing anonymous");
                    None
                }
            },
            None => None,
        };

        let session_token = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|t| !t.is_empty())
            .map(str::to_owned);

        Ok(Self { actor, session_token })
    }
}

async fn lookup_actor(db: &sqlx::PgPool, token: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT u.* FROM users u \
         JOIN auth_tokens t ON t.user_id = u.id \
         WHERE t.digest = $1 AND u.is_active",
    )
    .bind(token_digest(token))
    .fetch_optional(db)
    .await?;
    Ok(user)
}

/// Issues a fresh auth token for the user, persisting only its digest.
pub async fn issue_token(db: &sqlx::PgPool, user_id: Uuid) -> Result<String> {
    let token = mint_token();
    sqlx::query("INSERT INTO auth_tokens (digest, user_id) VALUES ($1, $2)")
        .bind(token_digest(&token))
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_digest_is_hex_sha256() {
        let digest = token_digest("abc");
        assert_eq!(digest.len(), 64);
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_verifier_round_trip() {
        let verifier = Sha256Verifier;
        let stored = verifier.digest("hunter2");
        assert!(verifier.verify("hunter2", &stored));
        assert!(!verifier.verify("hunter3", &stored));
    }

    #[test]
    fn test_minted_tokens_are_opaque_and_distinct() {
        let a = mint_token();
        let b = mint_token();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_require_actor_when_anonymous() {
        let ctx = RequestContext::default();
        assert!(matches!(ctx.require_actor(), Err(Error::NotAuthenticated)));
    }
}
