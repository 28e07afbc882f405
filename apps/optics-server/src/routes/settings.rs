//! Company settings, payment method catalog and attachment metadata.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use optics_core::admin::{Attachment, CompanySettings, PaymentMethodConfig, Permission};
use optics_db::repository::settings::{AttachmentInput, PaymentMethodInput};

use super::Deleted;
use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/company", get(company).put(update_company))
        .route("/payment-methods", get(list_payment_methods).post(create_payment_method))
        .route(
            "/payment-methods/{id}",
            get(get_payment_method)
                .put(update_payment_method)
                .delete(delete_payment_method),
        )
        .route("/attachments", get(list_attachments).post(create_attachment))
        .route(
            "/attachments/{id}",
            get(get_attachment).put(update_attachment).delete(delete_attachment),
        )
}

// =============================================================================
// Company
// =============================================================================

async fn company(State(state): State<Arc<AppState>>, _current: CurrentUser) -> ApiResult<CompanySettings> {
    Ok(Json(state.db.settings().company().await?))
}

async fn update_company(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(settings): Json<CompanySettings>,
) -> ApiResult<CompanySettings> {
    current.require(Permission::ManageSettings)?;
    Ok(Json(state.db.settings().update_company(&settings).await?))
}

// =============================================================================
// Payment methods
// =============================================================================

async fn list_payment_methods(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
) -> ApiResult<Vec<PaymentMethodConfig>> {
    Ok(Json(state.db.settings().payment_methods().await?))
}

async fn get_payment_method(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<PaymentMethodConfig> {
    Ok(Json(state.db.settings().payment_method(&id).await?))
}

async fn create_payment_method(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(input): Json<PaymentMethodInput>,
) -> ApiResult<PaymentMethodConfig> {
    current.require(Permission::ManageSettings)?;
    Ok(Json(state.db.settings().create_payment_method(&input).await?))
}

async fn update_payment_method(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<PaymentMethodInput>,
) -> ApiResult<PaymentMethodConfig> {
    current.require(Permission::ManageSettings)?;
    Ok(Json(state.db.settings().update_payment_method(&id, &input).await?))
}

async fn delete_payment_method(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Deleted> {
    current.require(Permission::ManageSettings)?;
    state.db.settings().delete_payment_method(&id).await?;
    Ok(Deleted::ok())
}

// =============================================================================
// Attachments
// =============================================================================

async fn list_attachments(State(state): State<Arc<AppState>>, _current: CurrentUser) -> ApiResult<Vec<Attachment>> {
    Ok(Json(state.db.settings().attachments().await?))
}

async fn get_attachment(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Attachment> {
    Ok(Json(state.db.settings().attachment(&id).await?))
}

async fn create_attachment(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(input): Json<AttachmentInput>,
) -> ApiResult<Attachment> {
    current.require(Permission::ManageSettings)?;
    Ok(Json(state.db.settings().create_attachment(&input).await?))
}

async fn update_attachment(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<AttachmentInput>,
) -> ApiResult<Attachment> {
    current.require(Permission::ManageSettings)?;
    Ok(Json(state.db.settings().update_attachment(&id, &input).await?))
}

async fn delete_attachment(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Deleted> {
    current.require(Permission::ManageSettings)?;
    state.db.settings().delete_attachment(&id).await?;
    Ok(Deleted::ok())
}
