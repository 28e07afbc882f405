//! # Category Repository
//!
//! Product categories. Counts are computed over active products at read
//! time; nothing is denormalized.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use optics_core::inventory::{Category, DEFAULT_CATEGORY_COLOR, DEFAULT_CATEGORY_ICON};
use optics_core::validation::{optional_text, validate_required};
use optics_core::ValidationError;

use super::new_id;
use crate::error::{not_found, DbError, DbResult};

const CATEGORY_SELECT: &str = r#"
    SELECT
        c.id, c.name, c.description, c.icon, c.color, c.is_active, c.created_at,
        (SELECT COUNT(*) FROM products p WHERE p.category_id = c.id AND p.is_active = 1)
            AS products_count,
        (SELECT COALESCE(SUM(p.quantity), 0) FROM products p WHERE p.category_id = c.id AND p.is_active = 1)
            AS total_quantity
    FROM categories c
"#;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl CategoryInput {
    fn validate(&self) -> DbResult<(String, Option<String>, String, String)> {
        let name = validate_required("name", &self.name, 100)?;
        let description = optional_text("description", self.description.as_deref(), 500)?;
        let icon = optional_text("icon", self.icon.as_deref(), 50)?
            .unwrap_or_else(|| DEFAULT_CATEGORY_ICON.to_string());
        let color = optional_text("color", self.color.as_deref(), 7)?
            .unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string());

        if !is_hex_color(&color) {
            return Err(ValidationError::InvalidFormat {
                field: "color".to_string(),
                reason: "must be #RRGGBB".to_string(),
            }
            .into());
        }

        Ok((name, description, icon, color))
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Repository for product categories.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    /// Creates a new CategoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// All categories by name.
    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let sql = format!("{CATEGORY_SELECT} ORDER BY c.name");
        let rows = sqlx::query_as::<_, Category>(&sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    pub async fn get(&self, id: &str) -> DbResult<Category> {
        let sql = format!("{CATEGORY_SELECT} WHERE c.id = ?1");
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found("Category", id))?;
        Ok(category)
    }

    /// Creates a category. Icon and color fall back to the defaults.
    pub async fn create(&self, input: &CategoryInput) -> DbResult<Category> {
        let (name, description, icon, color) = input.validate()?;
        let id = new_id();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, icon, color, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
        )
        .bind(&id)
        .bind(&name)
        .bind(&description)
        .bind(&icon)
        .bind(&color)
        .bind(input.is_active)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, name.clone()),
            other => other,
        })?;

        info!(category_id = %id, name = %name, "Category created");
        self.get(&id).await
    }

    pub async fn update(&self, id: &str, input: &CategoryInput) -> DbResult<Category> {
        let (name, description, icon, color) = input.validate()?;

        let result = sqlx::query(
            r#"
            UPDATE categories SET name = ?2, description = ?3, icon = ?4, color = ?5,
                is_active = ?6, updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&name)
        .bind(&description)
        .bind(&icon)
        .bind(&color)
        .bind(input.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, name.clone()),
            other => other,
        })?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        info!(category_id = %id, "Category updated");
        self.get(id).await
    }

    /// Deletes a category; its products become uncategorized.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        info!(category_id = %id, "Category deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn input(name: &str) -> CategoryInput {
        CategoryInput {
            name: name.to_string(),
            is_active: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_uses_defaults() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let category = db.categories().create(&input("Frames")).await.unwrap();

        assert_eq!(category.icon, DEFAULT_CATEGORY_ICON);
        assert_eq!(category.color, DEFAULT_CATEGORY_COLOR);
        assert_eq!(category.products_count, 0);
    }

    #[tokio::test]
    async fn test_duplicate_name() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.categories().create(&input("Lenses")).await.unwrap();

        let err = db.categories().create(&input("Lenses")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == "Lenses"));
    }

    #[tokio::test]
    async fn test_bad_color_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut bad = input("Cases");
        bad.color = Some("blue".to_string());

        assert!(matches!(db.categories().create(&bad).await, Err(DbError::Domain(_))));
    }
}
