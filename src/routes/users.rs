//! Registration, login (with cart merge), and profile endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::policy::{self, Action, Resource};
use crate::auth::{self, RequestContext};
use crate::cart::merge;
use crate::error::{unique_violation, Error};
use crate::events::{self, DomainEvent};
use crate::models::{Profile, Role, User};
use crate::routes::validation_error;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UserBody {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserBody {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileBody {
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub loyalty_points: i32,
}

impl From<Profile> for ProfileBody {
    fn from(profile: Profile) -> Self {
        Self {
            phone_number: profile.phone_number,
            address: profile.address,
            date_of_birth: profile.date_of_birth,
            loyalty_points: profile.loyalty_points,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
}

/// POST /api/users — the explicit create-actor workflow: the user row and
/// its profile are written in the same transaction.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserBody>), Error> {
    req.validate().map_err(validation_error)?;

    let mut tx = state.db.begin().await?;
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (id, username, email, password_digest) \
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&req.username)
    .bind(&req.email)
    .bind(state.verifier.digest(&req.password))
    .fetch_one(&mut *tx)
    .await
    .map_err(register_conflict)?;

    sqlx::query("INSERT INTO profiles (user_id) VALUES ($1)")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(user_id = %user.id, "registered user");
    Ok((StatusCode::CREATED, Json(user.into())))
}

fn register_conflict(err: sqlx::Error) -> Error {
    match unique_violation(&err).as_deref() {
        Some("users_email_key") => Error::Validation("This email is already in use".to_string()),
        Some("users_username_key") => {
            Error::Validation("This username is already taken".to_string())
        }
        _ => err.into(),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginBody {
    pub token: String,
    pub user: UserBody,
}

/// POST /api/auth/login — issues an opaque token and, before responding,
/// folds any anonymous session cart into the actor's durable cart.
pub async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginBody>, Error> {
    req.validate().map_err(validation_error)?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(&req.username)
        .fetch_optional(&state.db)
        .await?;
    let user = match user {
        Some(user) if state.verifier.verify(&req.password, &user.password_digest) => user,
        _ => return Err(Error::Validation("Invalid credentials".to_string())),
    };
    if !user.is_active {
        return Err(Error::Validation("User is not active".to_string()));
    }

    let token = auth::issue_token(&state.db, user.id).await?;

    if let Some(session_token) = &ctx.session_token {
        if let Some(outcome) = merge::merge_on_login(&state.db, &user, session_token).await? {
            events::publish(
                state.nats.as_ref(),
                DomainEvent::CartMerged {
                    user_id: user.id,
                    cart_id: outcome.cart_id,
                    moved_items: outcome.moved_items,
                },
            )
            .await;
        }
    }

    Ok(Json(LoginBody { token, user: user.into() }))
}

#[derive(Debug, Serialize)]
pub struct MeBody {
    #[serde(flatten)]
    pub user: UserBody,
    pub profile: Option<ProfileBody>,
}

pub async fn me(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<MeBody>, Error> {
    let actor = ctx.require_actor()?;
    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = $1")
        .bind(actor.id)
        .fetch_optional(&state.db)
        .await?;
    Ok(Json(MeBody {
        user: actor.clone().into(),
        profile: profile.map(Into::into),
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileRequest {
    #[validate(length(max = 32))]
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

/// PUT /api/users/me/profile — loyalty points are read-only here.
pub async fn update_profile(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<ProfileRequest>,
) -> Result<Json<ProfileBody>, Error> {
    let actor = ctx.require_actor()?;
    policy::authorize(Some(actor), Action::Update, Resource::Profile { owner: actor.id })?;
    req.validate().map_err(validation_error)?;

    let profile = sqlx::query_as::<_, Profile>(
        "UPDATE profiles SET phone_number = $2, address = $3, date_of_birth = $4 \
         WHERE user_id = $1 RETURNING *",
    )
    .bind(actor.id)
    .bind(&req.phone_number)
    .bind(&req.address)
    .bind(req.date_of_birth)
    .fetch_optional(&state.db)
    .await?
    .ok_or(Error::NotFound("profile"))?;

    Ok(Json(profile.into()))
}
