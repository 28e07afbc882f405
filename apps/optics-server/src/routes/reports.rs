//! Read-only reports. All need `view_reports`; the money reports also need
//! `view_financial`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use optics_core::admin::Permission;
use optics_core::validation::{parse_filter, parse_filter_date};
use optics_db::repository::report::{
    DailyBalanceReport, DashboardReport, InventoryFilter, InventoryReport, ProfitReport, ReportWindow, RevenueReport,
    SalesReport, VatReport,
};

use super::DateRangeQuery;
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/daily-balance", get(daily_balance))
        .route("/revenue", get(revenue))
        .route("/inventory", get(inventory))
        .route("/sales", get(sales))
        .route("/profit", get(profit))
        .route("/vat", get(vat))
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn last_days(q: &DateRangeQuery, days: i64) -> ReportWindow {
    ReportWindow::last_days(
        parse_filter_date(q.date_from.as_deref()),
        parse_filter_date(q.date_to.as_deref()),
        days,
        today(),
    )
}

fn require_financial(current: &CurrentUser) -> Result<(), ApiError> {
    current.require(Permission::ViewReports)?;
    current.require(Permission::ViewFinancial)
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Query(q): Query<DateRangeQuery>,
) -> ApiResult<DashboardReport> {
    current.require(Permission::ViewReports)?;
    Ok(Json(state.db.reports().dashboard(last_days(&q, 30)).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct DayQuery {
    pub date: Option<String>,
}

async fn daily_balance(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Query(q): Query<DayQuery>,
) -> ApiResult<DailyBalanceReport> {
    require_financial(&current)?;
    let date = parse_filter_date(q.date.as_deref()).unwrap_or_else(today);
    Ok(Json(state.db.reports().daily_balance(date).await?))
}

async fn revenue(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Query(q): Query<DateRangeQuery>,
) -> ApiResult<RevenueReport> {
    require_financial(&current)?;
    Ok(Json(state.db.reports().revenue(last_days(&q, 30)).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct InventoryQuery {
    pub category: Option<String>,
    pub stock_status: Option<String>,
}

async fn inventory(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Query(q): Query<InventoryQuery>,
) -> ApiResult<InventoryReport> {
    current.require(Permission::ViewReports)?;
    let filter = InventoryFilter {
        category_id: q.category.filter(|s| !s.trim().is_empty()),
        stock_status: parse_filter(q.stock_status.as_deref()),
    };
    Ok(Json(state.db.reports().inventory(&filter).await?))
}

async fn sales(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Query(q): Query<DateRangeQuery>,
) -> ApiResult<SalesReport> {
    current.require(Permission::ViewReports)?;
    Ok(Json(state.db.reports().sales(last_days(&q, 7)).await?))
}

async fn profit(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Query(q): Query<DateRangeQuery>,
) -> ApiResult<ProfitReport> {
    require_financial(&current)?;
    Ok(Json(state.db.reports().profit(last_days(&q, 30)).await?))
}

async fn vat(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Query(q): Query<DateRangeQuery>,
) -> ApiResult<VatReport> {
    require_financial(&current)?;
    let window = ReportWindow::month_of(
        parse_filter_date(q.date_from.as_deref()),
        parse_filter_date(q.date_to.as_deref()),
        today(),
    );
    Ok(Json(state.db.reports().vat(window).await?))
}
