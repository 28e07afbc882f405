//! HTTP route modules, one per area of the shop.

pub mod auth;
pub mod customers;
pub mod dashboard;
pub mod employees;
pub mod groups;
pub mod reports;
pub mod sales;
pub mod services;
pub mod settings;
pub mod stock;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router())
        .nest("/api", api_router())
}

fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(dashboard::main_dashboard))
        .nest("/customers", customers::router())
        .nest("/exams", customers::exam_router())
        .nest("/sales", sales::router())
        .nest("/services", services::router())
        .nest("/stock", stock::router())
        .nest("/employees", employees::router())
        .nest("/groups", groups::router())
        .nest("/reports", reports::router())
        .nest("/settings", settings::router())
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    database: bool,
}

async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Health>) {
    if state.db.health_check().await {
        (StatusCode::OK, Json(Health { status: "ok", database: true }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Health { status: "degraded", database: false }),
        )
    }
}

/// Raw date-range query. Values are parsed leniently: anything that is not
/// `YYYY-MM-DD` is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeQuery {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

/// `{"deleted": true}` for DELETE routes.
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: bool,
}

impl Deleted {
    pub fn ok() -> Json<Deleted> {
        Json(Deleted { deleted: true })
    }
}
