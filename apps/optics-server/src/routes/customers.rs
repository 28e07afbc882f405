//! Customer directory: customers, eye exams and the notification log.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use optics_core::admin::Permission;
use optics_core::customer::{Customer, EyeExam, Notification, NotificationPreferences};
use optics_core::validation::{parse_filter, parse_filter_date};
use optics_db::repository::customer::{CustomerFilter, CustomerInput, CustomerListItem, CustomerProfile, CustomerStats};
use optics_db::repository::exam::EyeExamInput;
use optics_db::repository::notification::NotificationInput;
use optics_db::Page;

use super::Deleted;
use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::AppState;

/// Notifications returned by the per-customer log.
const NOTIFICATION_LOG_LIMIT: i64 = 50;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/stats", get(stats))
        .route("/{id}", get(profile).put(update).delete(delete))
        .route("/{id}/preferences", axum::routing::put(update_preferences))
        .route("/{id}/exams", get(list_exams).post(create_exam))
        .route("/{id}/exams/latest", get(latest_exam))
        .route("/{id}/notifications", get(list_notifications).post(log_notification))
}

/// Routes addressing an exam by its own id, mounted at `/api/exams`.
pub fn exam_router() -> Router<Arc<AppState>> {
    Router::new().route("/{id}", get(get_exam).put(update_exam).delete(delete_exam))
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    pub search: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: Option<String>,
}

impl From<CustomerQuery> for CustomerFilter {
    fn from(q: CustomerQuery) -> Self {
        CustomerFilter {
            search: q.search.filter(|s| !s.trim().is_empty()),
            date_from: parse_filter_date(q.date_from.as_deref()),
            date_to: parse_filter_date(q.date_to.as_deref()),
            page: parse_filter(q.page.as_deref()).unwrap_or(1),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerList {
    #[serde(flatten)]
    pub page: Page<CustomerListItem>,
    pub stats: CustomerStats,
}

async fn list(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Query(query): Query<CustomerQuery>,
) -> ApiResult<CustomerList> {
    let customers = state.db.customers();
    let page = customers.list(&query.into()).await?;
    let stats = customers.stats().await?;
    Ok(Json(CustomerList { page, stats }))
}

async fn stats(State(state): State<Arc<AppState>>, _current: CurrentUser) -> ApiResult<CustomerStats> {
    Ok(Json(state.db.customers().stats().await?))
}

async fn create(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(input): Json<CustomerInput>,
) -> ApiResult<Customer> {
    current.require(Permission::ManageCustomers)?;
    Ok(Json(state.db.customers().create(&input).await?))
}

async fn profile(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<CustomerProfile> {
    Ok(Json(state.db.customers().profile(&id).await?))
}

async fn update(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<CustomerInput>,
) -> ApiResult<Customer> {
    current.require(Permission::ManageCustomers)?;
    Ok(Json(state.db.customers().update(&id, &input).await?))
}

async fn update_preferences(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(prefs): Json<NotificationPreferences>,
) -> ApiResult<Customer> {
    current.require(Permission::ManageCustomers)?;
    Ok(Json(state.db.customers().update_preferences(&id, prefs).await?))
}

async fn delete(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Deleted> {
    current.require(Permission::ManageCustomers)?;
    state.db.customers().delete(&id).await?;
    Ok(Deleted::ok())
}

// =============================================================================
// Eye exams
// =============================================================================

async fn list_exams(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Vec<EyeExam>> {
    state.db.customers().get(&id).await?;
    Ok(Json(state.db.eye_exams().list_for_customer(&id).await?))
}

async fn latest_exam(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Option<EyeExam>> {
    state.db.customers().get(&id).await?;
    Ok(Json(state.db.eye_exams().latest(&id).await?))
}

async fn create_exam(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<EyeExamInput>,
) -> ApiResult<EyeExam> {
    current.require(Permission::ManageCustomers)?;
    Ok(Json(state.db.eye_exams().create(&id, &input).await?))
}

async fn get_exam(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<EyeExam> {
    Ok(Json(state.db.eye_exams().get(&id).await?))
}

async fn update_exam(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<EyeExamInput>,
) -> ApiResult<EyeExam> {
    current.require(Permission::ManageCustomers)?;
    Ok(Json(state.db.eye_exams().update(&id, &input).await?))
}

async fn delete_exam(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Deleted> {
    current.require(Permission::ManageCustomers)?;
    state.db.eye_exams().delete(&id).await?;
    Ok(Deleted::ok())
}

// =============================================================================
// Notifications
// =============================================================================

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Vec<Notification>> {
    state.db.customers().get(&id).await?;
    Ok(Json(
        state
            .db
            .notifications()
            .list_for_customer(&id, NOTIFICATION_LOG_LIMIT)
            .await?,
    ))
}

async fn log_notification(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<NotificationInput>,
) -> ApiResult<Notification> {
    current.require(Permission::ManageCustomers)?;
    Ok(Json(state.db.notifications().log(&id, &input).await?))
}
