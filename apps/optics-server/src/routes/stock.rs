//! Inventory ledger: products, categories, suppliers, laboratories and the
//! stock movement log.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use optics_core::admin::Permission;
use optics_core::inventory::{Category, Partner, PartnerKind, Product, ProductView, StockMovement};
use optics_core::validation::{parse_filter, parse_filter_date};
use optics_core::MovementType;
use optics_db::repository::category::CategoryInput;
use optics_db::repository::partner::{PartnerInput, PartnerRepository};
use optics_db::repository::product::{ProductDetail, ProductFilter, ProductInfo, ProductInput};
use optics_db::repository::stock::{MovementFilter, StockChange, StockDashboard};
use optics_db::Page;

use super::Deleted;
use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/movements", get(movements))
        .route("/products", get(list_products).post(create_product))
        .route("/products/barcode/{barcode}", get(product_by_barcode))
        .route("/products/{id}", get(product_detail).put(update_product).delete(delete_product))
        .route("/products/{id}/info", get(product_info))
        .route("/products/{id}/adjust", post(adjust))
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/{id}", get(get_category).put(update_category).delete(delete_category))
        .nest("/suppliers", partner_router(PartnerKind::Supplier))
        .nest("/laboratories", partner_router(PartnerKind::Laboratory))
}

async fn dashboard(State(state): State<Arc<AppState>>, _current: CurrentUser) -> ApiResult<StockDashboard> {
    Ok(Json(state.db.stock().dashboard().await?))
}

// =============================================================================
// Movements
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct MovementQuery {
    pub product_id: Option<String>,
    pub movement_type: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: Option<String>,
}

async fn movements(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Query(q): Query<MovementQuery>,
) -> ApiResult<Page<StockMovement>> {
    let filter = MovementFilter {
        product_id: q.product_id.filter(|s| !s.trim().is_empty()),
        movement_type: parse_filter(q.movement_type.as_deref()),
        date_from: parse_filter_date(q.date_from.as_deref()),
        date_to: parse_filter_date(q.date_to.as_deref()),
        page: parse_filter(q.page.as_deref()).unwrap_or(1),
    };
    Ok(Json(state.db.stock().list_movements(&filter).await?))
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub movement_type: MovementType,
    pub quantity: i64,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

async fn adjust(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<AdjustRequest>,
) -> ApiResult<StockChange> {
    current.require(Permission::ManageInventory)?;
    let change = state
        .db
        .stock()
        .adjust(
            &id,
            req.movement_type,
            req.quantity,
            req.reference.as_deref(),
            req.notes.as_deref(),
            current.id(),
        )
        .await?;
    Ok(Json(change))
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Query(q): Query<ProductQuery>,
) -> ApiResult<Vec<ProductView>> {
    let filter = ProductFilter {
        search: q.search.filter(|s| !s.trim().is_empty()),
        category_id: q.category.filter(|s| !s.trim().is_empty()),
        status: parse_filter(q.status.as_deref()),
        include_inactive: q.include_inactive,
    };
    Ok(Json(state.db.products().list(&filter).await?))
}

async fn product_detail(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<ProductDetail> {
    Ok(Json(state.db.products().detail(&id).await?))
}

async fn product_info(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<ProductInfo> {
    Ok(Json(state.db.products().info(&id).await?))
}

async fn product_by_barcode(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(barcode): Path<String>,
) -> ApiResult<Product> {
    Ok(Json(state.db.products().get_by_barcode(&barcode).await?))
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(input): Json<ProductInput>,
) -> ApiResult<ProductView> {
    current.require(Permission::ManageInventory)?;
    Ok(Json(state.db.products().create(&input, current.id()).await?))
}

async fn update_product(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<ProductInput>,
) -> ApiResult<ProductView> {
    current.require(Permission::ManageInventory)?;
    Ok(Json(state.db.products().update(&id, &input, current.id()).await?))
}

async fn delete_product(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Deleted> {
    current.require(Permission::ManageInventory)?;
    state.db.products().delete(&id).await?;
    Ok(Deleted::ok())
}

// =============================================================================
// Categories
// =============================================================================

async fn list_categories(State(state): State<Arc<AppState>>, _current: CurrentUser) -> ApiResult<Vec<Category>> {
    Ok(Json(state.db.categories().list().await?))
}

async fn get_category(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Category> {
    Ok(Json(state.db.categories().get(&id).await?))
}

async fn create_category(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(input): Json<CategoryInput>,
) -> ApiResult<Category> {
    current.require(Permission::ManageInventory)?;
    Ok(Json(state.db.categories().create(&input).await?))
}

async fn update_category(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<CategoryInput>,
) -> ApiResult<Category> {
    current.require(Permission::ManageInventory)?;
    Ok(Json(state.db.categories().update(&id, &input).await?))
}

async fn delete_category(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Deleted> {
    current.require(Permission::ManageInventory)?;
    state.db.categories().delete(&id).await?;
    Ok(Deleted::ok())
}

// =============================================================================
// Suppliers & laboratories
// =============================================================================

type AppStateRef = State<Arc<AppState>>;

/// The same five routes for either partner table.
fn partner_router(kind: PartnerKind) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            get(move |s: AppStateRef, c: CurrentUser, q: Query<PartnerQuery>| list_partners(kind, s, c, q)).post(
                move |s: AppStateRef, c: CurrentUser, b: Json<PartnerInput>| create_partner(kind, s, c, b),
            ),
        )
        .route(
            "/{id}",
            get(move |s: AppStateRef, c: CurrentUser, p: Path<String>| get_partner(kind, s, c, p))
                .put(move |s: AppStateRef, c: CurrentUser, p: Path<String>, b: Json<PartnerInput>| {
                    update_partner(kind, s, c, p, b)
                })
                .delete(move |s: AppStateRef, c: CurrentUser, p: Path<String>| delete_partner(kind, s, c, p)),
        )
}

fn partners(state: &AppState, kind: PartnerKind) -> PartnerRepository {
    match kind {
        PartnerKind::Supplier => state.db.suppliers(),
        PartnerKind::Laboratory => state.db.laboratories(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PartnerQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

async fn list_partners(
    kind: PartnerKind,
    State(state): AppStateRef,
    _current: CurrentUser,
    Query(q): Query<PartnerQuery>,
) -> ApiResult<Vec<Partner>> {
    Ok(Json(partners(&state, kind).list(q.include_inactive).await?))
}

async fn get_partner(
    kind: PartnerKind,
    State(state): AppStateRef,
    _current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Partner> {
    Ok(Json(partners(&state, kind).get(&id).await?))
}

async fn create_partner(
    kind: PartnerKind,
    State(state): AppStateRef,
    current: CurrentUser,
    Json(input): Json<PartnerInput>,
) -> ApiResult<Partner> {
    current.require(Permission::ManageSuppliers)?;
    Ok(Json(partners(&state, kind).create(&input).await?))
}

async fn update_partner(
    kind: PartnerKind,
    State(state): AppStateRef,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<PartnerInput>,
) -> ApiResult<Partner> {
    current.require(Permission::ManageSuppliers)?;
    Ok(Json(partners(&state, kind).update(&id, &input).await?))
}

async fn delete_partner(
    kind: PartnerKind,
    State(state): AppStateRef,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Deleted> {
    current.require(Permission::ManageSuppliers)?;
    partners(&state, kind).delete(&id).await?;
    Ok(Deleted::ok())
}
