//! # Partner Repository
//!
//! Suppliers and laboratories share one repository: the tables have the
//! same shape and differ only in their code series and in what links to
//! them (products for suppliers, invoices for laboratories).

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use optics_core::inventory::{Partner, PartnerKind};
use optics_core::validation::{optional_text, validate_customer_phone, validate_email, validate_required};

use super::{new_id, next_number};
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartnerInput {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub representative_name: Option<String>,
    #[serde(default)]
    pub representative_phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

struct ValidPartner {
    company_name: String,
    phone: String,
    email: Option<String>,
    address: Option<String>,
    representative_name: Option<String>,
    representative_phone: Option<String>,
    notes: Option<String>,
}

impl PartnerInput {
    fn validate(&self) -> DbResult<ValidPartner> {
        Ok(ValidPartner {
            company_name: validate_required("company_name", &self.company_name, 200)?,
            phone: validate_customer_phone(&self.phone)?,
            email: validate_email(self.email.as_deref())?,
            address: optional_text("address", self.address.as_deref(), 300)?,
            representative_name: optional_text("representative_name", self.representative_name.as_deref(), 200)?,
            representative_phone: optional_text("representative_phone", self.representative_phone.as_deref(), 20)?,
            notes: optional_text("notes", self.notes.as_deref(), 2000)?,
        })
    }
}

/// Repository for one partner table.
#[derive(Debug, Clone)]
pub struct PartnerRepository {
    pool: SqlitePool,
    kind: PartnerKind,
}

impl PartnerRepository {
    pub fn new(pool: SqlitePool, kind: PartnerKind) -> Self {
        PartnerRepository { pool, kind }
    }

    pub fn kind(&self) -> PartnerKind {
        self.kind
    }

    fn table(&self) -> &'static str {
        match self.kind {
            PartnerKind::Supplier => "suppliers",
            PartnerKind::Laboratory => "laboratories",
        }
    }

    fn select(&self) -> String {
        let linked = match self.kind {
            PartnerKind::Supplier => {
                "(SELECT COUNT(*) FROM products p WHERE p.supplier_id = t.id AND p.is_active = 1)"
            }
            PartnerKind::Laboratory => "(SELECT COUNT(*) FROM sales s WHERE s.laboratory_id = t.id)",
        };
        format!(
            r#"SELECT t.id, t.code, t.company_name, t.phone, t.email, t.address,
                t.representative_name, t.representative_phone, t.notes, t.is_active,
                {linked} AS linked_count, t.created_at, t.updated_at
            FROM {} t"#,
            self.table()
        )
    }

    /// Newest first. Inactive partners are hidden unless asked for.
    pub async fn list(&self, include_inactive: bool) -> DbResult<Vec<Partner>> {
        let filter = if include_inactive { "" } else { " WHERE t.is_active = 1" };
        let sql = format!("{}{filter} ORDER BY t.created_at DESC", self.select());
        let rows = sqlx::query_as::<_, Partner>(&sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Detail lookup used by the edit dialogs.
    pub async fn get(&self, id: &str) -> DbResult<Partner> {
        let sql = format!("{} WHERE t.id = ?1", self.select());
        sqlx::query_as::<_, Partner>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found(self.kind.label(), id))
    }

    /// Creates a partner with the next `SUP-`/`LAB-` code.
    pub async fn create(&self, input: &PartnerInput) -> DbResult<Partner> {
        let valid = input.validate()?;
        let id = new_id();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let code = next_number(&mut tx, self.kind.sequence()).await?;

        let sql = format!(
            r#"INSERT INTO {} (
                id, code, company_name, phone, email, address, representative_name,
                representative_phone, notes, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)"#,
            self.table()
        );
        sqlx::query(&sql)
            .bind(&id)
            .bind(&code)
            .bind(&valid.company_name)
            .bind(&valid.phone)
            .bind(&valid.email)
            .bind(&valid.address)
            .bind(&valid.representative_name)
            .bind(&valid.representative_phone)
            .bind(&valid.notes)
            .bind(input.is_active.unwrap_or(true))
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(kind = self.kind.label(), partner_id = %id, code = %code, "Partner created");
        self.get(&id).await
    }

    /// Updates contact details. The code never changes.
    pub async fn update(&self, id: &str, input: &PartnerInput) -> DbResult<Partner> {
        let valid = input.validate()?;
        let existing = self.get(id).await?;

        let sql = format!(
            r#"UPDATE {} SET
                company_name = ?2, phone = ?3, email = ?4, address = ?5,
                representative_name = ?6, representative_phone = ?7, notes = ?8,
                is_active = ?9, updated_at = ?10
            WHERE id = ?1"#,
            self.table()
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(&valid.company_name)
            .bind(&valid.phone)
            .bind(&valid.email)
            .bind(&valid.address)
            .bind(&valid.representative_name)
            .bind(&valid.representative_phone)
            .bind(&valid.notes)
            .bind(input.is_active.unwrap_or(existing.is_active))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        info!(kind = self.kind.label(), partner_id = %id, "Partner updated");
        self.get(id).await
    }

    /// Deletes a partner. Linked products and invoices keep existing with
    /// the reference cleared.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", self.table());
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(self.kind.label(), id));
        }

        info!(kind = self.kind.label(), partner_id = %id, "Partner deleted");
        Ok(())
    }

    /// Active partner count for the stock dashboard.
    pub async fn count_active(&self) -> DbResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE is_active = 1", self.table());
        Ok(sqlx::query_scalar(&sql).fetch_one(&self.pool).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn input(name: &str) -> PartnerInput {
        PartnerInput {
            company_name: name.to_string(),
            phone: "511111111".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_codes_are_per_kind() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let s1 = db.suppliers().create(&input("Essilor")).await.unwrap();
        let s2 = db.suppliers().create(&input("Zeiss")).await.unwrap();
        let l1 = db.laboratories().create(&input("Vision Lab")).await.unwrap();

        assert_eq!(s1.code, "SUP-0001");
        assert_eq!(s2.code, "SUP-0002");
        assert_eq!(l1.code, "LAB-0001");
        assert_eq!(db.suppliers().list(false).await.unwrap().len(), 2);
        assert_eq!(db.laboratories().count_active().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_inactive_hidden_and_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.laboratories();
        let lab = repo.create(&input("Old Lab")).await.unwrap();

        let mut edit = input("Old Lab");
        edit.is_active = Some(false);
        repo.update(&lab.id, &edit).await.unwrap();

        assert!(repo.list(false).await.unwrap().is_empty());
        assert_eq!(repo.list(true).await.unwrap().len(), 1);

        repo.delete(&lab.id).await.unwrap();
        assert!(matches!(repo.get(&lab.id).await, Err(DbError::NotFound { .. })));
    }
}
