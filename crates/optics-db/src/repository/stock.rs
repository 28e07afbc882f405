//! # Stock Repository
//!
//! The movement log and the one primitive every quantity change goes
//! through.
//!
//! ## Quantity Change Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  caller (inside its own transaction)                                    │
//! │       │                                                                 │
//! │       │  move_stock(&mut tx, product, type, qty, reference, ...)        │
//! │       ▼                                                                 │
//! │  SELECT quantity          ──► previous                                  │
//! │  apply_movement()         ──► new (optics-core)                         │
//! │  UPDATE products          ──► quantity = new                            │
//! │  INSERT stock_movements   ──► previous, new, qty, type                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use optics_core::inventory::{apply_movement, ProductView, StockMovement};
use optics_core::validation::{optional_text, validate_stock_level};
use optics_core::{MovementType, ValidationError, PAGE_SIZE};

use super::product::PRODUCT_SELECT;
use super::{new_id, page_offset, Page};
use crate::error::{DbError, DbResult};

pub(crate) const MOVEMENT_SELECT: &str = r#"
    SELECT m.id, m.product_id, p.item_name AS product_name, m.movement_type, m.quantity,
        m.previous_quantity, m.new_quantity, m.reference, m.notes, m.created_by, m.created_at
    FROM stock_movements m
    JOIN products p ON p.id = m.product_id
"#;

// =============================================================================
// Movement primitive
// =============================================================================

/// Quantities before and after one movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockChange {
    pub previous_quantity: i64,
    pub new_quantity: i64,
}

/// Who and why, attached to a movement row.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MovementContext<'a> {
    pub reference: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub created_by: Option<&'a str>,
}

/// Applies one movement to a product and logs it.
///
/// Runs on the caller's connection so the quantity update and the log row
/// share the caller's transaction.
pub(crate) async fn move_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    movement_type: MovementType,
    quantity: i64,
    ctx: MovementContext<'_>,
) -> DbResult<StockChange> {
    let previous: i64 = sqlx::query_scalar("SELECT quantity FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Product", product_id))?;

    let new = apply_movement(previous, movement_type, quantity);
    let now = Utc::now();

    sqlx::query("UPDATE products SET quantity = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(product_id)
        .bind(new)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, product_id, movement_type, quantity, previous_quantity, new_quantity,
            reference, notes, created_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(new_id())
    .bind(product_id)
    .bind(movement_type)
    .bind(quantity)
    .bind(previous)
    .bind(new)
    .bind(ctx.reference)
    .bind(ctx.notes)
    .bind(ctx.created_by)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    debug!(product_id, %movement_type, quantity, previous, new, "Stock moved");
    Ok(StockChange {
        previous_quantity: previous,
        new_quantity: new,
    })
}

// =============================================================================
// Read models
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub product_id: Option<String>,
    pub movement_type: Option<MovementType>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: i64,
}

/// A category tile on the stock dashboard.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryStock {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub products_count: i64,
    pub total_quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockDashboard {
    pub total_products: i64,
    pub active_products: i64,
    pub low_stock_count: i64,
    pub out_of_stock_count: i64,
    pub total_cost_value_cents: i64,
    pub total_selling_value_cents: i64,
    pub active_suppliers: i64,
    pub active_laboratories: i64,
    /// Lowest quantities first, at most 5.
    pub low_stock_products: Vec<ProductView>,
    /// Top 5 by active product count.
    pub top_categories: Vec<CategoryStock>,
    /// Last 10 movements.
    pub recent_movements: Vec<StockMovement>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the movement log and the stock dashboard.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Manual adjustment from the stock screen.
    ///
    /// `quantity` is the amount moved, or the counted shelf quantity for
    /// `adjustment`. In/out/return amounts must be positive.
    pub async fn adjust(
        &self,
        product_id: &str,
        movement_type: MovementType,
        quantity: i64,
        reference: Option<&str>,
        notes: Option<&str>,
        user_id: Option<&str>,
    ) -> DbResult<StockChange> {
        match movement_type {
            MovementType::Adjustment => validate_stock_level("quantity", quantity)?,
            _ if quantity <= 0 => {
                return Err(ValidationError::MustBePositive {
                    field: "quantity".to_string(),
                }
                .into())
            }
            _ => validate_stock_level("quantity", quantity)?,
        }
        let reference = optional_text("reference", reference, 100)?;
        let notes = optional_text("notes", notes, 1000)?;

        let mut tx = self.pool.begin().await?;
        let change = move_stock(
            &mut tx,
            product_id,
            movement_type,
            quantity,
            MovementContext {
                reference: reference.as_deref(),
                notes: notes.as_deref(),
                created_by: user_id,
            },
        )
        .await?;
        tx.commit().await?;

        info!(
            product_id,
            %movement_type,
            quantity,
            previous = change.previous_quantity,
            new = change.new_quantity,
            "Stock adjusted"
        );
        Ok(change)
    }

    /// Movement log, newest first, 10 per page.
    pub async fn list_movements(&self, filter: &MovementFilter) -> DbResult<Page<StockMovement>> {
        let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) FROM stock_movements m JOIN products p ON p.id = m.product_id WHERE 1 = 1",
        );
        push_movement_filters(&mut count_qb, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let (page, offset) = page_offset(filter.page);
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("{MOVEMENT_SELECT} WHERE 1 = 1"));
        push_movement_filters(&mut qb, filter);
        qb.push(" ORDER BY m.created_at DESC LIMIT ")
            .push_bind(PAGE_SIZE)
            .push(" OFFSET ")
            .push_bind(offset);

        let items = qb.build_query_as::<StockMovement>().fetch_all(&self.pool).await?;
        Ok(Page::new(items, total, page))
    }

    /// Last `limit` movements of one product.
    pub async fn product_movements(&self, product_id: &str, limit: i64) -> DbResult<Vec<StockMovement>> {
        let sql = format!("{MOVEMENT_SELECT} WHERE m.product_id = ?1 ORDER BY m.created_at DESC LIMIT ?2");
        let rows = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(product_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn dashboard(&self) -> DbResult<StockDashboard> {
        let (total_products, active_products, low_stock_count, out_of_stock_count, cost_value, selling_value): (
            i64,
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN is_active = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN is_active = 1 AND quantity > 0 AND quantity <= min_quantity
                    THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN is_active = 1 AND quantity = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN is_active = 1 THEN quantity * cost_price_cents ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN is_active = 1 THEN quantity * selling_price_cents ELSE 0 END), 0)
            FROM products
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let low_sql = format!(
            "{PRODUCT_SELECT} WHERE p.is_active = 1 AND p.quantity > 0 AND p.quantity <= p.min_quantity \
             ORDER BY p.quantity ASC LIMIT 5"
        );
        let low_stock_products = sqlx::query_as::<_, optics_core::inventory::Product>(&low_sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|p| p.into_view())
            .collect();

        let top_categories = sqlx::query_as::<_, CategoryStock>(
            r#"
            SELECT c.id, c.name, c.icon, c.color,
                COUNT(p.id) AS products_count,
                COALESCE(SUM(p.quantity), 0) AS total_quantity
            FROM categories c
            LEFT JOIN products p ON p.category_id = c.id AND p.is_active = 1
            WHERE c.is_active = 1
            GROUP BY c.id
            ORDER BY products_count DESC, c.name
            LIMIT 5
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let recent_sql = format!("{MOVEMENT_SELECT} ORDER BY m.created_at DESC LIMIT 10");
        let recent_movements = sqlx::query_as::<_, StockMovement>(&recent_sql)
            .fetch_all(&self.pool)
            .await?;

        let active_suppliers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM suppliers WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;
        let active_laboratories: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM laboratories WHERE is_active = 1")
                .fetch_one(&self.pool)
                .await?;

        Ok(StockDashboard {
            total_products,
            active_products,
            low_stock_count,
            out_of_stock_count,
            total_cost_value_cents: cost_value,
            total_selling_value_cents: selling_value,
            active_suppliers,
            active_laboratories,
            low_stock_products,
            top_categories,
            recent_movements,
        })
    }
}

fn push_movement_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &MovementFilter) {
    if let Some(product_id) = &filter.product_id {
        qb.push(" AND m.product_id = ").push_bind(product_id.clone());
    }
    if let Some(movement_type) = filter.movement_type {
        qb.push(" AND m.movement_type = ").push_bind(movement_type);
    }
    if let Some(from) = filter.date_from {
        qb.push(" AND date(m.created_at) >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        qb.push(" AND date(m.created_at) <= ").push_bind(to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::product::ProductInput;
    use crate::{Database, DbConfig};

    async fn product(db: &Database, barcode: &str, quantity: i64) -> String {
        db.products()
            .create(
                &ProductInput {
                    item_name: format!("Item {barcode}"),
                    barcode: barcode.to_string(),
                    quantity,
                    min_quantity: Some(5),
                    cost_price_cents: 1000,
                    selling_price_cents: 2500,
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap()
            .product
            .id
    }

    #[tokio::test]
    async fn test_adjust_each_type() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let id = product(&db, "ADJ-1", 10).await;
        let stock = db.stock();

        let c = stock.adjust(&id, MovementType::In, 5, None, None, None).await.unwrap();
        assert_eq!((c.previous_quantity, c.new_quantity), (10, 15));

        let c = stock.adjust(&id, MovementType::Out, 20, None, None, None).await.unwrap();
        assert_eq!(c.new_quantity, -5);

        let c = stock.adjust(&id, MovementType::Adjustment, 7, Some("count"), None, None).await.unwrap();
        assert_eq!((c.previous_quantity, c.new_quantity), (-5, 7));

        let page = stock
            .list_movements(&MovementFilter {
                product_id: Some(id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items[0].movement_type, MovementType::Adjustment);
    }

    #[tokio::test]
    async fn test_adjust_rejects_non_positive_moves() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let id = product(&db, "ADJ-2", 10).await;

        assert!(db.stock().adjust(&id, MovementType::In, 0, None, None, None).await.is_err());
        assert!(matches!(
            db.stock().adjust("missing", MovementType::In, 1, None, None, None).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_dashboard_counts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        product(&db, "D-1", 0).await;
        product(&db, "D-2", 3).await;
        product(&db, "D-3", 40).await;

        let dash = db.stock().dashboard().await.unwrap();
        assert_eq!(dash.total_products, 3);
        assert_eq!(dash.out_of_stock_count, 1);
        assert_eq!(dash.low_stock_count, 1);
        assert_eq!(dash.low_stock_products.len(), 1);
        assert_eq!(dash.total_cost_value_cents, 43 * 1000);
        assert_eq!(dash.total_selling_value_cents, 43 * 2500);
    }
}
