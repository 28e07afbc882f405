//! # Settings Repository
//!
//! The company singleton, card-terminal fee configs and PDF attachment
//! metadata.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use optics_core::admin::{Attachment, CompanySettings, PaymentMethodConfig};
use optics_core::validation::{
    optional_text, validate_email, validate_pdf_file_name, validate_percentage_bps, validate_required,
};

use super::new_id;
use crate::error::{DbError, DbResult};

const COMPANY_COLUMNS: &str = r#"
    company_name_ar, company_name_en, unified_number, commercial_register, tax_number,
    national_address, location_url, contact_phone, contact_email, owner_name,
    owner_id_number, owner_phone, owner_email
"#;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentMethodInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub percentage_bps: i64,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttachmentInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    // =========================================================================
    // Company
    // =========================================================================

    /// Returns the company row, creating the empty one on first use.
    pub async fn company(&self) -> DbResult<CompanySettings> {
        sqlx::query("INSERT OR IGNORE INTO company_settings (id, updated_at) VALUES (1, ?1)")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        let sql = format!("SELECT {COMPANY_COLUMNS} FROM company_settings WHERE id = 1");
        Ok(sqlx::query_as::<_, CompanySettings>(&sql).fetch_one(&self.pool).await?)
    }

    /// Replaces every company field.
    pub async fn update_company(&self, settings: &CompanySettings) -> DbResult<CompanySettings> {
        validate_email(Some(settings.contact_email.as_str()))?;
        validate_email(Some(settings.owner_email.as_str()))?;
        self.company().await?;

        sqlx::query(
            r#"
            UPDATE company_settings SET
                company_name_ar = ?1, company_name_en = ?2, unified_number = ?3,
                commercial_register = ?4, tax_number = ?5, national_address = ?6,
                location_url = ?7, contact_phone = ?8, contact_email = ?9, owner_name = ?10,
                owner_id_number = ?11, owner_phone = ?12, owner_email = ?13, updated_at = ?14
            WHERE id = 1
            "#,
        )
        .bind(settings.company_name_ar.trim())
        .bind(settings.company_name_en.trim())
        .bind(settings.unified_number.trim())
        .bind(settings.commercial_register.trim())
        .bind(settings.tax_number.trim())
        .bind(settings.national_address.trim())
        .bind(settings.location_url.trim())
        .bind(settings.contact_phone.trim())
        .bind(settings.contact_email.trim())
        .bind(settings.owner_name.trim())
        .bind(settings.owner_id_number.trim())
        .bind(settings.owner_phone.trim())
        .bind(settings.owner_email.trim())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!("Company settings updated");
        self.company().await
    }

    // =========================================================================
    // Payment method configs
    // =========================================================================

    pub async fn payment_methods(&self) -> DbResult<Vec<PaymentMethodConfig>> {
        let rows = sqlx::query_as::<_, PaymentMethodConfig>(
            "SELECT id, name, company, percentage_bps, is_active, created_at FROM payment_method_configs ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn payment_method(&self, id: &str) -> DbResult<PaymentMethodConfig> {
        sqlx::query_as::<_, PaymentMethodConfig>(
            "SELECT id, name, company, percentage_bps, is_active, created_at FROM payment_method_configs WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("PaymentMethod", id))
    }

    pub async fn create_payment_method(&self, input: &PaymentMethodInput) -> DbResult<PaymentMethodConfig> {
        let name = validate_required("name", &input.name, 100)?;
        let company = optional_text("company", input.company.as_deref(), 100)?;
        validate_percentage_bps("percentage", input.percentage_bps)?;
        let id = new_id();

        sqlx::query(
            r#"
            INSERT INTO payment_method_configs (id, name, company, percentage_bps, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&id)
        .bind(&name)
        .bind(&company)
        .bind(input.percentage_bps)
        .bind(input.is_active.unwrap_or(true))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(payment_method_id = %id, name = %name, "Payment method created");
        self.payment_method(&id).await
    }

    pub async fn update_payment_method(&self, id: &str, input: &PaymentMethodInput) -> DbResult<PaymentMethodConfig> {
        let name = validate_required("name", &input.name, 100)?;
        let company = optional_text("company", input.company.as_deref(), 100)?;
        validate_percentage_bps("percentage", input.percentage_bps)?;
        let existing = self.payment_method(id).await?;

        sqlx::query(
            "UPDATE payment_method_configs SET name = ?2, company = ?3, percentage_bps = ?4, is_active = ?5 WHERE id = ?1",
        )
        .bind(id)
        .bind(&name)
        .bind(&company)
        .bind(input.percentage_bps)
        .bind(input.is_active.unwrap_or(existing.is_active))
        .execute(&self.pool)
        .await?;

        info!(payment_method_id = %id, "Payment method updated");
        self.payment_method(id).await
    }

    pub async fn delete_payment_method(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM payment_method_configs WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PaymentMethod", id));
        }
        info!(payment_method_id = %id, "Payment method deleted");
        Ok(())
    }

    // =========================================================================
    // Attachments
    // =========================================================================

    /// Newest first.
    pub async fn attachments(&self) -> DbResult<Vec<Attachment>> {
        let rows = sqlx::query_as::<_, Attachment>(
            "SELECT id, title, file_name, description, uploaded_at FROM attachments ORDER BY uploaded_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn attachment(&self, id: &str) -> DbResult<Attachment> {
        sqlx::query_as::<_, Attachment>(
            "SELECT id, title, file_name, description, uploaded_at FROM attachments WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Attachment", id))
    }

    /// Records an uploaded PDF. Anything but `.pdf` is refused.
    pub async fn create_attachment(&self, input: &AttachmentInput) -> DbResult<Attachment> {
        let title = validate_required("title", &input.title, 200)?;
        let file_name = validate_pdf_file_name(&input.file_name)?;
        let description = optional_text("description", input.description.as_deref(), 1000)?;
        let id = new_id();

        sqlx::query(
            "INSERT INTO attachments (id, title, file_name, description, uploaded_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&id)
        .bind(&title)
        .bind(&file_name)
        .bind(&description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(attachment_id = %id, file_name = %file_name, "Attachment added");
        self.attachment(&id).await
    }

    pub async fn update_attachment(&self, id: &str, input: &AttachmentInput) -> DbResult<Attachment> {
        let title = validate_required("title", &input.title, 200)?;
        let file_name = validate_pdf_file_name(&input.file_name)?;
        let description = optional_text("description", input.description.as_deref(), 1000)?;

        let result = sqlx::query("UPDATE attachments SET title = ?2, file_name = ?3, description = ?4 WHERE id = ?1")
            .bind(id)
            .bind(&title)
            .bind(&file_name)
            .bind(&description)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Attachment", id));
        }

        info!(attachment_id = %id, "Attachment updated");
        self.attachment(id).await
    }

    pub async fn delete_attachment(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM attachments WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Attachment", id));
        }
        info!(attachment_id = %id, "Attachment deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use optics_core::{CoreError, ValidationError};

    #[tokio::test]
    async fn test_company_get_or_create_and_update() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.settings();

        let empty = repo.company().await.unwrap();
        assert_eq!(empty.tax_number, "");

        let updated = repo
            .update_company(&CompanySettings {
                company_name_ar: "بصريات النور".to_string(),
                tax_number: " 300000000000003 ".to_string(),
                ..empty
            })
            .await
            .unwrap();
        assert_eq!(updated.tax_number, "300000000000003");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM company_settings")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_payment_method_fee_range() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.settings();

        let mada = repo
            .create_payment_method(&PaymentMethodInput {
                name: "Mada".to_string(),
                percentage_bps: 80,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(mada.is_active);

        let err = repo
            .update_payment_method(
                &mada.id,
                &PaymentMethodInput {
                    name: "Mada".to_string(),
                    percentage_bps: 10_001,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        repo.delete_payment_method(&mada.id).await.unwrap();
        assert!(repo.payment_methods().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attachments_pdf_only() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.settings();

        let pdf = repo
            .create_attachment(&AttachmentInput {
                title: "Commercial register".to_string(),
                file_name: "cr.pdf".to_string(),
                description: None,
            })
            .await
            .unwrap();
        assert_eq!(repo.attachments().await.unwrap().len(), 1);

        let err = repo
            .update_attachment(
                &pdf.id,
                &AttachmentInput {
                    title: "Logo".to_string(),
                    file_name: "logo.png".to_string(),
                    description: None,
                },
            )
            .await;
        assert!(err.is_err());
        assert_eq!(repo.attachment(&pdf.id).await.unwrap().file_name, "cr.pdf");
    }
}
