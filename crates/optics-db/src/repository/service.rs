//! # Service Repository
//!
//! The catalog of sellable services. Invoice lines copy the service name
//! and price, so editing or deleting a service never touches old invoices.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use optics_core::invoice::Service;
use optics_core::validation::{optional_text, validate_price_cents, validate_required};

use super::new_id;
use crate::error::{DbError, DbResult};

const SERVICE_COLUMNS: &str =
    "id, service_code, service_name, cost_cents, price_cents, is_active, description, created_at";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceInput {
    #[serde(default)]
    pub service_code: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub cost_cents: i64,
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
}

struct ValidService {
    service_code: String,
    service_name: String,
    description: Option<String>,
}

impl ServiceInput {
    fn validate(&self) -> DbResult<ValidService> {
        validate_price_cents("cost", self.cost_cents)?;
        validate_price_cents("price", self.price_cents)?;
        Ok(ValidService {
            service_code: validate_required("service_code", &self.service_code, 50)?,
            service_name: validate_required("service_name", &self.service_name, 200)?,
            description: optional_text("description", self.description.as_deref(), 1000)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServiceRepository {
    pool: SqlitePool,
}

impl ServiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ServiceRepository { pool }
    }

    /// All services by name; `active_only` for the invoice form.
    pub async fn list(&self, active_only: bool) -> DbResult<Vec<Service>> {
        let filter = if active_only { " WHERE is_active = 1" } else { "" };
        let sql = format!("SELECT {SERVICE_COLUMNS} FROM services{filter} ORDER BY service_name");
        Ok(sqlx::query_as::<_, Service>(&sql).fetch_all(&self.pool).await?)
    }

    pub async fn get(&self, id: &str) -> DbResult<Service> {
        let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1");
        sqlx::query_as::<_, Service>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Service", id))
    }

    pub async fn create(&self, input: &ServiceInput) -> DbResult<Service> {
        let valid = input.validate()?;
        let id = new_id();

        sqlx::query(
            r#"
            INSERT INTO services (
                id, service_code, service_name, cost_cents, price_cents, is_active, description, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&id)
        .bind(&valid.service_code)
        .bind(&valid.service_name)
        .bind(input.cost_cents)
        .bind(input.price_cents)
        .bind(input.is_active.unwrap_or(true))
        .bind(&valid.description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_code(e, &valid.service_code))?;

        info!(service_id = %id, code = %valid.service_code, "Service created");
        self.get(&id).await
    }

    pub async fn update(&self, id: &str, input: &ServiceInput) -> DbResult<Service> {
        let valid = input.validate()?;
        let existing = self.get(id).await?;

        sqlx::query(
            r#"
            UPDATE services SET
                service_code = ?2, service_name = ?3, cost_cents = ?4, price_cents = ?5,
                is_active = ?6, description = ?7
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&valid.service_code)
        .bind(&valid.service_name)
        .bind(input.cost_cents)
        .bind(input.price_cents)
        .bind(input.is_active.unwrap_or(existing.is_active))
        .bind(&valid.description)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_code(e, &valid.service_code))?;

        info!(service_id = %id, "Service updated");
        self.get(id).await
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM services WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Service", id));
        }

        info!(service_id = %id, "Service deleted");
        Ok(())
    }
}

fn duplicate_code(err: sqlx::Error, code: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::duplicate("service_code", code),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn input(code: &str, name: &str) -> ServiceInput {
        ServiceInput {
            service_code: code.to_string(),
            service_name: name.to_string(),
            cost_cents: 2000,
            price_cents: 5000,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_crud_and_profit() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.services();

        let exam = repo.create(&input("SRV-1", "Eye exam")).await.unwrap();
        assert!(exam.is_active);
        assert_eq!(exam.profit().cents(), 3000);
        assert_eq!(exam.profit_percentage(), 150.0);

        let mut edit = input("SRV-1", "Eye exam");
        edit.is_active = Some(false);
        repo.update(&exam.id, &edit).await.unwrap();
        assert!(repo.list(true).await.unwrap().is_empty());
        assert_eq!(repo.list(false).await.unwrap().len(), 1);

        repo.delete(&exam.id).await.unwrap();
        assert!(matches!(repo.get(&exam.id).await, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.services().create(&input("SRV-1", "Eye exam")).await.unwrap();

        let err = db.services().create(&input("SRV-1", "Tinting")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "service_code"));
    }
}
