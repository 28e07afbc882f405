//! Service catalog (eye exams, fittings, repairs) offered on invoices.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use optics_core::admin::Permission;
use optics_core::invoice::Service;
use optics_db::repository::service::ServiceInput;

use super::Deleted;
use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_one).put(update).delete(delete))
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceQuery {
    #[serde(default)]
    pub active_only: bool,
}

async fn list(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Query(query): Query<ServiceQuery>,
) -> ApiResult<Vec<Service>> {
    Ok(Json(state.db.services().list(query.active_only).await?))
}

async fn get_one(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Service> {
    Ok(Json(state.db.services().get(&id).await?))
}

async fn create(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(input): Json<ServiceInput>,
) -> ApiResult<Service> {
    current.require(Permission::ManageSales)?;
    Ok(Json(state.db.services().create(&input).await?))
}

async fn update(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<ServiceInput>,
) -> ApiResult<Service> {
    current.require(Permission::ManageSales)?;
    Ok(Json(state.db.services().update(&id, &input).await?))
}

async fn delete(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Deleted> {
    current.require(Permission::ManageSales)?;
    state.db.services().delete(&id).await?;
    Ok(Deleted::ok())
}
