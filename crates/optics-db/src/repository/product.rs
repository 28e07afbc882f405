//! # Product Repository
//!
//! Product CRUD and lookups. Quantity edits made through the product form
//! go through [`move_stock`](super::stock) so they land in the movement
//! log like every other change.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use optics_core::inventory::{Product, ProductView, StockMovement, StockStatus};
use optics_core::validation::{
    optional_text, validate_barcode, validate_price_cents, validate_required, validate_stock_level,
};
use optics_core::{MovementType, ValidationError, DEFAULT_MIN_QUANTITY};

use super::stock::{move_stock, MovementContext, StockRepository};
use super::{like_pattern, new_id};
use crate::error::{DbError, DbResult};

/// Product columns plus the category and supplier names.
pub(crate) const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.item_name, p.barcode, p.sku, p.category_id, c.name AS category_name,
        p.supplier_id, s.company_name AS supplier_name, p.quantity, p.min_quantity,
        p.box_number, p.cost_price_cents, p.selling_price_cents, p.description, p.notes,
        p.is_active, p.is_featured, p.created_at, p.updated_at
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN suppliers s ON s.id = p.supplier_id
"#;

/// Movements shown on the product page.
const DETAIL_MOVEMENTS: i64 = 20;

// =============================================================================
// Inputs & read models
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductInput {
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub barcode: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub supplier_id: Option<String>,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub min_quantity: Option<i64>,
    #[serde(default)]
    pub box_number: Option<String>,
    #[serde(default)]
    pub cost_price_cents: i64,
    #[serde(default)]
    pub selling_price_cents: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_featured: bool,
}

struct ValidProduct {
    item_name: String,
    barcode: String,
    sku: Option<String>,
    category_id: Option<String>,
    supplier_id: Option<String>,
    min_quantity: i64,
    box_number: Option<String>,
    description: Option<String>,
    notes: Option<String>,
}

impl ProductInput {
    /// `current_quantity` is the stored level when editing. Sales may have
    /// taken it below zero; sending it back unchanged is not a new count.
    fn validate(&self, current_quantity: Option<i64>) -> DbResult<ValidProduct> {
        let min_quantity = self.min_quantity.unwrap_or(DEFAULT_MIN_QUANTITY);
        if current_quantity != Some(self.quantity) {
            validate_stock_level("quantity", self.quantity)?;
        }
        validate_stock_level("min_quantity", min_quantity)?;
        validate_price_cents("cost_price", self.cost_price_cents)?;
        validate_price_cents("selling_price", self.selling_price_cents)?;

        Ok(ValidProduct {
            item_name: validate_required("item_name", &self.item_name, 200)?,
            barcode: validate_barcode(&self.barcode)?,
            sku: optional_text("sku", self.sku.as_deref(), 50)?,
            category_id: optional_text("category_id", self.category_id.as_deref(), 36)?,
            supplier_id: optional_text("supplier_id", self.supplier_id.as_deref(), 36)?,
            min_quantity,
            box_number: optional_text("box_number", self.box_number.as_deref(), 50)?,
            description: optional_text("description", self.description.as_deref(), 2000)?,
            notes: optional_text("notes", self.notes.as_deref(), 2000)?,
        })
    }
}

/// Product list filters. Unknown status values are dropped upstream.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category_id: Option<String>,
    pub status: Option<StockStatus>,
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    pub product: ProductView,
    pub movements: Vec<StockMovement>,
}

/// What the invoice form needs after picking a product.
#[derive(Debug, Clone, Serialize)]
pub struct ProductInfo {
    pub id: String,
    pub name: String,
    pub barcode: String,
    pub price_cents: i64,
    pub quantity: i64,
    pub category: Option<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by ID.
    pub async fn get(&self, id: &str) -> DbResult<Product> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.id = ?1");
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Looks a product up by its barcode (scanner input).
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Product> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.barcode = ?1");
        sqlx::query_as::<_, Product>(&sql)
            .bind(barcode.trim())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product", barcode))
    }

    /// Newest first.
    pub async fn list(&self, filter: &ProductFilter) -> DbResult<Vec<ProductView>> {
        debug!(?filter, "Listing products");

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("{PRODUCT_SELECT} WHERE 1 = 1"));

        if !filter.include_inactive {
            qb.push(" AND p.is_active = 1");
        }
        if let Some(term) = &filter.search {
            let pattern = like_pattern(term);
            qb.push(" AND (p.item_name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR p.barcode LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR p.sku LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(category_id) = &filter.category_id {
            qb.push(" AND p.category_id = ").push_bind(category_id.clone());
        }
        match filter.status {
            Some(StockStatus::Low) => {
                qb.push(" AND p.quantity > 0 AND p.quantity <= p.min_quantity");
            }
            Some(StockStatus::Out) => {
                qb.push(" AND p.quantity = 0");
            }
            Some(StockStatus::Available) => {
                qb.push(" AND p.quantity != 0 AND NOT (p.quantity > 0 AND p.quantity <= p.min_quantity)");
            }
            None => {}
        }
        qb.push(" ORDER BY p.created_at DESC");

        let products = qb.build_query_as::<Product>().fetch_all(&self.pool).await?;
        Ok(products.into_iter().map(Product::into_view).collect())
    }

    /// Product page: derived fields plus the last 20 movements.
    pub async fn detail(&self, id: &str) -> DbResult<ProductDetail> {
        let product = self.get(id).await?.into_view();
        let movements = StockRepository::new(self.pool.clone())
            .product_movements(id, DETAIL_MOVEMENTS)
            .await?;

        Ok(ProductDetail { product, movements })
    }

    pub async fn info(&self, id: &str) -> DbResult<ProductInfo> {
        let product = self.get(id).await?;
        Ok(ProductInfo {
            id: product.id,
            name: product.item_name,
            barcode: product.barcode,
            price_cents: product.selling_price_cents,
            quantity: product.quantity,
            category: product.category_name,
        })
    }

    /// Creates a product.
    ///
    /// ## Errors
    /// `Validation(Duplicate)` when the barcode is taken.
    pub async fn create(&self, input: &ProductInput, user_id: Option<&str>) -> DbResult<ProductView> {
        let valid = input.validate(None)?;
        self.ensure_barcode_free(&valid.barcode, None).await?;

        let id = new_id();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO products (
                id, item_name, barcode, sku, category_id, supplier_id, quantity, min_quantity,
                box_number, cost_price_cents, selling_price_cents, description, notes,
                is_active, is_featured, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16)
            "#,
        )
        .bind(&id)
        .bind(&valid.item_name)
        .bind(&valid.barcode)
        .bind(&valid.sku)
        .bind(&valid.category_id)
        .bind(&valid.supplier_id)
        .bind(input.quantity)
        .bind(valid.min_quantity)
        .bind(&valid.box_number)
        .bind(input.cost_price_cents)
        .bind(input.selling_price_cents)
        .bind(&valid.description)
        .bind(&valid.notes)
        .bind(input.is_active.unwrap_or(true))
        .bind(input.is_featured)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(product_id = %id, barcode = %valid.barcode, user_id = ?user_id, "Product created");
        Ok(self.get(&id).await?.into_view())
    }

    /// Updates a product. A changed quantity is logged as an adjustment.
    pub async fn update(&self, id: &str, input: &ProductInput, user_id: Option<&str>) -> DbResult<ProductView> {
        let existing = self.get(id).await?;
        let valid = input.validate(Some(existing.quantity))?;
        self.ensure_barcode_free(&valid.barcode, Some(id)).await?;

        let mut tx = self.pool.begin().await?;

        if input.quantity != existing.quantity {
            move_stock(
                &mut tx,
                id,
                MovementType::Adjustment,
                input.quantity,
                MovementContext {
                    reference: None,
                    notes: Some("Quantity edited on product form"),
                    created_by: user_id,
                },
            )
            .await?;
        }

        sqlx::query(
            r#"
            UPDATE products SET
                item_name = ?2, barcode = ?3, sku = ?4, category_id = ?5, supplier_id = ?6,
                min_quantity = ?7, box_number = ?8, cost_price_cents = ?9, selling_price_cents = ?10,
                description = ?11, notes = ?12, is_active = ?13, is_featured = ?14, updated_at = ?15
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&valid.item_name)
        .bind(&valid.barcode)
        .bind(&valid.sku)
        .bind(&valid.category_id)
        .bind(&valid.supplier_id)
        .bind(valid.min_quantity)
        .bind(&valid.box_number)
        .bind(input.cost_price_cents)
        .bind(input.selling_price_cents)
        .bind(&valid.description)
        .bind(&valid.notes)
        .bind(input.is_active.unwrap_or(existing.is_active))
        .bind(input.is_featured)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(product_id = %id, "Product updated");
        Ok(self.get(id).await?.into_view())
    }

    /// Deletes a product with its movement log. Invoice lines keep their
    /// prices and lose the product link.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    async fn ensure_barcode_free(&self, barcode: &str, except_id: Option<&str>) -> DbResult<()> {
        let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE barcode = ?1 AND id != ?2")
            .bind(barcode)
            .bind(except_id.unwrap_or(""))
            .fetch_one(&self.pool)
            .await?;

        if taken > 0 {
            return Err(ValidationError::Duplicate {
                field: "barcode".to_string(),
                value: barcode.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::category::CategoryInput;
    use crate::{Database, DbConfig};
    use optics_core::CoreError;

    fn input(name: &str, barcode: &str, quantity: i64) -> ProductInput {
        ProductInput {
            item_name: name.to_string(),
            barcode: barcode.to_string(),
            quantity,
            cost_price_cents: 10000,
            selling_price_cents: 15000,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_derived_fields() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let view = db.products().create(&input("Frame", "FR-1", 4), None).await.unwrap();

        assert_eq!(view.product.min_quantity, DEFAULT_MIN_QUANTITY);
        assert!(view.is_low_stock);
        assert_eq!(view.profit_amount_cents, 5000);
        assert!((view.profit_margin - 50.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_duplicate_barcode() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().create(&input("A", "DUP-1", 1), None).await.unwrap();

        let err = db.products().create(&input("B", "DUP-1", 1), None).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));
    }

    #[tokio::test]
    async fn test_quantity_edit_logs_adjustment() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let created = repo.create(&input("Lens", "LN-1", 10), None).await.unwrap();

        repo.update(&created.product.id, &input("Lens", "LN-1", 6), None).await.unwrap();
        repo.update(&created.product.id, &input("Lens pair", "LN-1", 6), None).await.unwrap();

        let detail = repo.detail(&created.product.id).await.unwrap();
        assert_eq!(detail.product.product.quantity, 6);
        assert_eq!(detail.movements.len(), 1);
        assert_eq!(detail.movements[0].movement_type, MovementType::Adjustment);
        assert_eq!(detail.movements[0].previous_quantity, 10);
    }

    #[tokio::test]
    async fn test_oversold_product_stays_editable() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let created = repo.create(&input("Contact lens", "CL-1", 0), None).await.unwrap();
        let id = created.product.id;
        db.stock()
            .adjust(&id, MovementType::Out, 3, None, None, None)
            .await
            .unwrap();

        let renamed = repo.update(&id, &input("Daily contact lens", "CL-1", -3), None).await.unwrap();
        assert_eq!(renamed.product.item_name, "Daily contact lens");
        assert_eq!(renamed.product.quantity, -3);

        // A new negative count is still rejected.
        let err = repo.update(&id, &input("Daily contact lens", "CL-1", -5), None).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert_eq!(repo.detail(&id).await.unwrap().movements.len(), 1);
    }

    #[tokio::test]
    async fn test_filters() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let category = db
            .categories()
            .create(&CategoryInput {
                name: "Sunglasses".to_string(),
                is_active: true,
                ..Default::default()
            })
            .await
            .unwrap();

        let mut sun = input("Aviator", "SUN-1", 0);
        sun.category_id = Some(category.id.clone());
        db.products().create(&sun, None).await.unwrap();
        db.products().create(&input("Cleaner", "CL-1", 2), None).await.unwrap();
        db.products().create(&input("Case", "CS-1", 50), None).await.unwrap();

        let repo = db.products();
        let out = repo
            .list(&ProductFilter {
                status: Some(StockStatus::Out),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].product.category_name.as_deref(), Some("Sunglasses"));

        let low = repo
            .list(&ProductFilter {
                status: Some(StockStatus::Low),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(low[0].product.barcode, "CL-1");

        let search = repo
            .list(&ProductFilter {
                search: Some("cs-".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(search.len(), 1);

        let by_category = repo
            .list(&ProductFilter {
                category_id: Some(category.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_category.len(), 1);

        let info = repo.info(&out[0].product.id).await.unwrap();
        assert_eq!(info.price_cents, 15000);
    }

    #[tokio::test]
    async fn test_category_delete_uncategorizes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let category = db
            .categories()
            .create(&CategoryInput {
                name: "Frames".to_string(),
                is_active: true,
                ..Default::default()
            })
            .await
            .unwrap();
        let mut frame = input("Frame", "FR-9", 3);
        frame.category_id = Some(category.id.clone());
        let product = db.products().create(&frame, None).await.unwrap();

        db.categories().delete(&category.id).await.unwrap();

        let reloaded = db.products().get(&product.product.id).await.unwrap();
        assert!(reloaded.category_id.is_none());
    }
}
