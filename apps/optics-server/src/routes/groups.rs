//! Employee groups and their permission flags.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use optics_core::admin::{EmployeeGroup, Permission};
use optics_db::repository::group::{GroupDetail, GroupInput};

use super::Deleted;
use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(detail).put(update).delete(delete))
}

async fn list(State(state): State<Arc<AppState>>, current: CurrentUser) -> ApiResult<Vec<EmployeeGroup>> {
    current.require(Permission::ManageSettings)?;
    Ok(Json(state.db.groups().list().await?))
}

async fn detail(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<GroupDetail> {
    current.require(Permission::ManageSettings)?;
    Ok(Json(state.db.groups().detail(&id).await?))
}

async fn create(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(input): Json<GroupInput>,
) -> ApiResult<EmployeeGroup> {
    current.require(Permission::ManageSettings)?;
    Ok(Json(state.db.groups().create(&input).await?))
}

async fn update(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<GroupInput>,
) -> ApiResult<EmployeeGroup> {
    current.require(Permission::ManageSettings)?;
    Ok(Json(state.db.groups().update(&id, &input).await?))
}

async fn delete(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Deleted> {
    current.require(Permission::ManageSettings)?;
    state.db.groups().delete(&id).await?;
    Ok(Deleted::ok())
}
