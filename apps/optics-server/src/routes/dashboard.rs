//! Landing page figures.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use optics_db::repository::report::MainDashboard;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::AppState;

pub async fn main_dashboard(State(state): State<Arc<AppState>>, _current: CurrentUser) -> ApiResult<MainDashboard> {
    Ok(Json(state.db.reports().main_dashboard().await?))
}
