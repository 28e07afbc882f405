//! Invoice engine: invoices, payments, credit/debit notes and receipts.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use optics_core::admin::Permission;
use optics_core::invoice::{Payment, Sale};
use optics_core::validation::{parse_filter, parse_filter_date};
use optics_db::repository::product::ProductInfo;
use optics_db::repository::sale::{
    DebitNoteInput, PaymentInput, SaleDetail, SaleEdit, SaleFilter, SaleInput, SaleList, SalePrint, SaleSummaryRow,
};

use super::Deleted;
use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::AppState;

/// Open invoices shown on the "current" board.
const CURRENT_LIMIT: i64 = 50;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/current", get(current))
        .route("/product-info/{product_id}", get(product_info))
        .route("/number/{order_number}", get(by_number))
        .route("/{id}", get(detail).put(edit).delete(delete))
        .route("/{id}/payments", post(add_payment))
        .route("/{id}/credit-note", post(credit_note))
        .route("/{id}/debit-note", post(debit_note))
        .route("/{id}/print", get(print))
}

#[derive(Debug, Default, Deserialize)]
pub struct SaleQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: Option<String>,
}

impl From<SaleQuery> for SaleFilter {
    fn from(q: SaleQuery) -> Self {
        SaleFilter {
            search: q.search.filter(|s| !s.trim().is_empty()),
            status: parse_filter(q.status.as_deref()),
            payment_status: parse_filter(q.payment_status.as_deref()),
            date_from: parse_filter_date(q.date_from.as_deref()),
            date_to: parse_filter_date(q.date_to.as_deref()),
            page: parse_filter(q.page.as_deref()).unwrap_or(1),
        }
    }
}

async fn list(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Query(query): Query<SaleQuery>,
) -> ApiResult<SaleList> {
    Ok(Json(state.db.sales().list(&query.into()).await?))
}

async fn current(State(state): State<Arc<AppState>>, _current: CurrentUser) -> ApiResult<Vec<SaleSummaryRow>> {
    Ok(Json(state.db.sales().current(CURRENT_LIMIT).await?))
}

async fn create(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(input): Json<SaleInput>,
) -> ApiResult<SaleDetail> {
    current.require(Permission::ManageSales)?;
    Ok(Json(state.db.sales().create(&input, current.id()).await?))
}

async fn detail(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<SaleDetail> {
    Ok(Json(state.db.sales().detail(&id).await?))
}

async fn by_number(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(order_number): Path<String>,
) -> ApiResult<SaleDetail> {
    let sale = state.db.sales().get_by_number(&order_number).await?;
    Ok(Json(state.db.sales().detail(&sale.id).await?))
}

async fn edit(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<SaleEdit>,
) -> ApiResult<Sale> {
    current.require(Permission::ManageSales)?;
    Ok(Json(state.db.sales().edit(&id, &input, current.id()).await?))
}

async fn delete(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Deleted> {
    current.require(Permission::ManageSales)?;
    state.db.sales().delete(&id, current.id()).await?;
    Ok(Deleted::ok())
}

async fn add_payment(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<PaymentInput>,
) -> ApiResult<Payment> {
    current.require(Permission::ManageSales)?;
    Ok(Json(state.db.sales().add_payment(&id, &input, current.id()).await?))
}

async fn credit_note(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<SaleDetail> {
    current.require(Permission::ManageSales)?;
    Ok(Json(state.db.sales().credit_note(&id, current.id()).await?))
}

async fn debit_note(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<DebitNoteInput>,
) -> ApiResult<SaleDetail> {
    current.require(Permission::ManageSales)?;
    Ok(Json(state.db.sales().debit_note(&id, &input, current.id()).await?))
}

async fn print(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<SalePrint> {
    Ok(Json(state.db.sales().print(&id).await?))
}

/// Price and stock of a product for the invoice form.
async fn product_info(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(product_id): Path<String>,
) -> ApiResult<ProductInfo> {
    Ok(Json(state.db.products().info(&product_id).await?))
}
