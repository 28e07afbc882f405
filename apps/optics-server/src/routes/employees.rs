//! Employee administration. Every route needs `manage_settings`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use optics_core::admin::{EmployeeProfile, Permission};
use optics_core::validation::parse_filter;
use optics_db::repository::employee::{EmployeeDetail, EmployeeFilter, EmployeeInput, EmployeeStats};

use crate::auth::{check_password_strength, client_ip, hash_password, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/stats", get(stats))
        .route("/{id}", get(detail).put(update))
        .route("/{id}/toggle-active", post(toggle_active))
}

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub position: Option<String>,
    pub group: Option<String>,
}

impl From<EmployeeQuery> for EmployeeFilter {
    fn from(q: EmployeeQuery) -> Self {
        let is_active = match q.status.as_deref().map(str::trim) {
            Some("active") => Some(true),
            Some("inactive") => Some(false),
            _ => None,
        };
        EmployeeFilter {
            search: q.search.filter(|s| !s.trim().is_empty()),
            is_active,
            position: parse_filter(q.position.as_deref()),
            group_id: q.group.filter(|s| !s.trim().is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EmployeeList {
    pub employees: Vec<EmployeeProfile>,
    pub stats: EmployeeStats,
}

/// Add/edit body: the profile plus an optional plain-text password.
#[derive(Debug, Deserialize)]
pub struct EmployeeForm {
    #[serde(flatten)]
    pub employee: EmployeeInput,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToggleRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

async fn list(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Query(query): Query<EmployeeQuery>,
) -> ApiResult<EmployeeList> {
    current.require(Permission::ManageSettings)?;
    let employees = state.db.employees();
    Ok(Json(EmployeeList {
        employees: employees.list(&query.into()).await?,
        stats: employees.stats().await?,
    }))
}

async fn stats(State(state): State<Arc<AppState>>, current: CurrentUser) -> ApiResult<EmployeeStats> {
    current.require(Permission::ManageSettings)?;
    Ok(Json(state.db.employees().stats().await?))
}

async fn create(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    headers: HeaderMap,
    Json(form): Json<EmployeeForm>,
) -> ApiResult<EmployeeDetail> {
    current.require(Permission::ManageSettings)?;
    let password = form
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::new("VALIDATION_ERROR", "password: required"))?;
    check_password_strength(password)?;
    let hash = hash_password(password)?;

    let ip = client_ip(&headers);
    Ok(Json(
        state
            .db
            .employees()
            .create(&form.employee, &hash, ip.as_deref())
            .await?,
    ))
}

async fn detail(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<EmployeeDetail> {
    current.require(Permission::ManageSettings)?;
    Ok(Json(state.db.employees().detail(&id).await?))
}

/// Edits the profile; a non-empty password replaces the current one.
async fn update(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(form): Json<EmployeeForm>,
) -> ApiResult<EmployeeDetail> {
    current.require(Permission::ManageSettings)?;
    let hash = match form.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => {
            check_password_strength(password)?;
            Some(hash_password(password)?)
        }
        None => None,
    };

    let ip = client_ip(&headers);
    Ok(Json(
        state
            .db
            .employees()
            .update(&id, &form.employee, hash.as_deref(), ip.as_deref())
            .await?,
    ))
}

async fn toggle_active(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<EmployeeProfile> {
    current.require(Permission::ManageSettings)?;
    // The body is optional: activating needs no reason.
    let request: ToggleRequest = if body.is_empty() {
        ToggleRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::bad_request(e.to_string()))?
    };
    let reason = request.reason;
    let ip = client_ip(&headers);
    Ok(Json(
        state
            .db
            .employees()
            .toggle_active(&id, reason.as_deref(), ip.as_deref())
            .await?,
    ))
}
