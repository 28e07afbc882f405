//! Login, logout and the current-user lookup.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use optics_core::admin::{Permission, User};

use crate::auth::{clear_session_cookie, session_cookie, verify_password, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: User,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub full_name: Option<String>,
    pub permissions: Vec<Permission>,
}

async fn login(State(state): State<Arc<AppState>>, Json(req): Json<LoginRequest>) -> Result<Response, ApiError> {
    let users = state.db.users();
    let user = users
        .find_by_username(&req.username)
        .await?
        .filter(|user| verify_password(&req.password, &user.password_hash));

    let Some(user) = user else {
        warn!(username = %req.username.trim(), "Login failed");
        return Err(ApiError::new("INVALID_CREDENTIALS", "Invalid username or password"));
    };
    if !user.is_active {
        warn!(user_id = %user.id, "Login refused for inactive account");
        return Err(ApiError::new("ACCOUNT_DISABLED", "This account is disabled"));
    }

    let ttl = state.config.session_ttl(req.remember);
    let token = users.create_session(&user.id, req.remember, ttl).await?;
    let permissions = users.permissions(&user).await?;

    let max_age = req.remember.then(|| ttl.num_seconds());
    let cookie = session_cookie(&token, max_age, state.config.cookie_secure);

    info!(user_id = %user.id, remember = req.remember, "User logged in");
    let body = LoginResponse {
        token,
        expires_in: ttl.num_seconds(),
        user,
        permissions: permissions.granted(),
    };
    Ok(([(SET_COOKIE, cookie)], Json(body)).into_response())
}

async fn logout(State(state): State<Arc<AppState>>, current: CurrentUser) -> Result<Response, ApiError> {
    state.db.users().delete_session(&current.token).await?;
    info!(user_id = %current.user.id, "User logged out");

    let cookie = clear_session_cookie(state.config.cookie_secure);
    Ok(([(SET_COOKIE, cookie)], Json(serde_json::json!({ "logged_out": true }))).into_response())
}

async fn me(State(state): State<Arc<AppState>>, current: CurrentUser) -> ApiResult<MeResponse> {
    let full_name = state
        .db
        .employees()
        .for_user(&current.user.id)
        .await?
        .map(|e| e.full_name);

    Ok(Json(MeResponse {
        permissions: current.permissions.granted(),
        full_name,
        user: current.user,
    }))
}
