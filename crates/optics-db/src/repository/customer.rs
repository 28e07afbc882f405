//! # Customer Repository
//!
//! Customer records, list statistics and the profile page.
//!
//! ## List Behaviour
//! ```text
//! no search, no dates  ──► the 10 newest customers, single page
//! any filter set       ──► all matches, 10 per page
//! invalid dates        ──► parsed to None upstream, so they never filter
//! ```

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use optics_core::customer::{Customer, EyeExam, Notification, NotificationPreferences};
use optics_core::invoice::Sale;
use optics_core::numbering::Sequence;
use optics_core::validation::{
    optional_text, validate_age, validate_customer_phone, validate_email, validate_required,
};
use optics_core::{CoreError, Gender, ValidationError, PAGE_SIZE};

use super::sale::SALE_COLUMNS;
use super::{like_pattern, new_id, next_number, page_offset, Page};
use crate::error::{not_found, DbResult};

const CUSTOMER_COLUMNS: &str = r#"
    c.id, c.customer_code, c.name, c.phone, c.email, c.address, c.gender, c.age,
    c.join_date, c.notify_whatsapp, c.notify_sms, c.notify_email,
    c.created_at, c.updated_at
"#;

// =============================================================================
// Inputs & read models
// =============================================================================

/// Add/edit form for a customer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub age: Option<i64>,
    /// Defaults to today on create; left unchanged on edit when absent.
    #[serde(default)]
    pub join_date: Option<NaiveDate>,
}

struct ValidCustomer {
    name: String,
    phone: String,
    email: Option<String>,
    address: Option<String>,
    gender: Gender,
    age: Option<i64>,
}

impl CustomerInput {
    fn validate(&self) -> DbResult<ValidCustomer> {
        let name = validate_required("name", &self.name, 200)?;
        let phone = validate_customer_phone(&self.phone)?;
        let gender = self.gender.ok_or_else(|| ValidationError::Required {
            field: "gender".to_string(),
        })?;
        validate_age(self.age)?;

        Ok(ValidCustomer {
            name,
            phone,
            email: validate_email(self.email.as_deref())?,
            address: optional_text("address", self.address.as_deref(), 300)?,
            gender,
            age: self.age,
        })
    }
}

/// List filters. Dates are already parsed; unparseable input is `None`.
#[derive(Debug, Clone, Default)]
pub struct CustomerFilter {
    pub search: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: i64,
}

impl CustomerFilter {
    fn is_filtering(&self) -> bool {
        self.search.is_some() || self.date_from.is_some() || self.date_to.is_some()
    }
}

/// A customer row in the list with invoice figures.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CustomerListItem {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub customer: Customer,
    pub invoices_count: i64,
    pub total_purchases_cents: i64,
}

/// Header cards of the customer list.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CustomerStats {
    pub total: i64,
    pub male: i64,
    pub female: i64,
    pub new_this_month: i64,
}

/// Invoice totals on the profile page.
#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
pub struct CustomerInvoiceStats {
    pub count: i64,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub remaining_cents: i64,
}

/// Everything the profile page shows.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerProfile {
    pub customer: Customer,
    pub invoices: Vec<Sale>,
    pub invoice_stats: CustomerInvoiceStats,
    pub eye_exams: Vec<EyeExam>,
    pub latest_exam: Option<EyeExam>,
    pub notifications: Vec<Notification>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Gets a customer by ID.
    pub async fn get(&self, id: &str) -> DbResult<Customer> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers c WHERE c.id = ?1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found("Customer", id))?;

        Ok(customer)
    }

    /// Lists customers with invoice counts and purchase totals.
    pub async fn list(&self, filter: &CustomerFilter) -> DbResult<Page<CustomerListItem>> {
        debug!(?filter, "Listing customers");

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            r#"SELECT {CUSTOMER_COLUMNS},
                (SELECT COUNT(*) FROM sales s WHERE s.customer_id = c.id) AS invoices_count,
                (SELECT COALESCE(SUM(s.total_cents), 0) FROM sales s WHERE s.customer_id = c.id)
                    AS total_purchases_cents
            FROM customers c WHERE 1 = 1"#
        ));
        push_customer_filters(&mut qb, filter);
        qb.push(" ORDER BY c.created_at DESC, c.customer_code DESC");

        if !filter.is_filtering() {
            qb.push(" LIMIT ").push_bind(PAGE_SIZE);
            let items = qb.build_query_as::<CustomerListItem>().fetch_all(&self.pool).await?;
            let total = items.len() as i64;
            return Ok(Page::new(items, total, 1));
        }

        let mut count_qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM customers c WHERE 1 = 1");
        push_customer_filters(&mut count_qb, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let (page, offset) = page_offset(filter.page);
        qb.push(" LIMIT ").push_bind(PAGE_SIZE).push(" OFFSET ").push_bind(offset);
        let items = qb.build_query_as::<CustomerListItem>().fetch_all(&self.pool).await?;

        Ok(Page::new(items, total, page))
    }

    /// Totals over all customers, ignoring filters.
    pub async fn stats(&self) -> DbResult<CustomerStats> {
        let today = Utc::now().date_naive();
        let month_start = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);

        let (total, male, female, new_this_month): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN gender = 'male' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN gender = 'female' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN join_date >= ?1 THEN 1 ELSE 0 END), 0)
            FROM customers
            "#,
        )
        .bind(month_start)
        .fetch_one(&self.pool)
        .await?;

        Ok(CustomerStats {
            total,
            male,
            female,
            new_this_month,
        })
    }

    /// Registers a customer and assigns the next `C-NNN` code.
    ///
    /// ## Errors
    /// - `Validation(Required)` for a missing name, phone or gender
    /// - `Validation(Duplicate)` when the phone is already registered
    pub async fn create(&self, input: &CustomerInput) -> DbResult<Customer> {
        let valid = input.validate()?;
        self.ensure_phone_free(&valid.phone, None).await?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let code = next_number(&mut tx, Sequence::Customer).await?;

        let customer = Customer {
            id: new_id(),
            customer_code: code,
            name: valid.name,
            phone: valid.phone,
            email: valid.email,
            address: valid.address,
            gender: valid.gender,
            age: valid.age,
            join_date: input.join_date.unwrap_or_else(|| now.date_naive()),
            notify_whatsapp: NotificationPreferences::default().whatsapp,
            notify_sms: NotificationPreferences::default().sms,
            notify_email: NotificationPreferences::default().email,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, customer_code, name, phone, email, address, gender, age, join_date,
                notify_whatsapp, notify_sms, notify_email, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.customer_code)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(customer.gender)
        .bind(customer.age)
        .bind(customer.join_date)
        .bind(customer.notify_whatsapp)
        .bind(customer.notify_sms)
        .bind(customer.notify_email)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(customer_id = %customer.id, code = %customer.customer_code, "Customer created");
        Ok(customer)
    }

    /// Updates contact details. The code and preferences are untouched.
    pub async fn update(&self, id: &str, input: &CustomerInput) -> DbResult<Customer> {
        let valid = input.validate()?;
        let existing = self.get(id).await?;
        self.ensure_phone_free(&valid.phone, Some(id)).await?;

        sqlx::query(
            r#"
            UPDATE customers SET
                name = ?2, phone = ?3, email = ?4, address = ?5, gender = ?6, age = ?7,
                join_date = ?8, updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&valid.name)
        .bind(&valid.phone)
        .bind(&valid.email)
        .bind(&valid.address)
        .bind(valid.gender)
        .bind(valid.age)
        .bind(input.join_date.unwrap_or(existing.join_date))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(customer_id = %id, "Customer updated");
        self.get(id).await
    }

    /// Replaces the notification preference flags.
    pub async fn update_preferences(&self, id: &str, prefs: NotificationPreferences) -> DbResult<Customer> {
        let result = sqlx::query(
            r#"
            UPDATE customers SET notify_whatsapp = ?2, notify_sms = ?3, notify_email = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(prefs.whatsapp)
        .bind(prefs.sms)
        .bind(prefs.email)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(crate::DbError::not_found("Customer", id));
        }

        self.get(id).await
    }

    /// Deletes a customer with their exams and notifications.
    ///
    /// ## Errors
    /// `Domain(InUse)` while invoices reference the customer.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let customer = self.get(id).await?;

        let invoices: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE customer_id = ?1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        if invoices > 0 {
            return Err(CoreError::InUse {
                entity: format!("Customer {}", customer.name),
                count: invoices,
                dependents: "invoices".to_string(),
            }
            .into());
        }

        sqlx::query("DELETE FROM customers WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!(customer_id = %id, "Customer deleted");
        Ok(())
    }

    /// Profile page: customer, invoices, exams and the last 10 notifications.
    pub async fn profile(&self, id: &str) -> DbResult<CustomerProfile> {
        let customer = self.get(id).await?;

        let invoices_sql =
            format!("SELECT {SALE_COLUMNS} FROM sales s WHERE s.customer_id = ?1 ORDER BY s.order_date DESC");
        let invoices = sqlx::query_as::<_, Sale>(&invoices_sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        let invoice_stats = sqlx::query_as::<_, CustomerInvoiceStats>(
            r#"
            SELECT
                COUNT(*) AS count,
                COALESCE(SUM(total_cents), 0) AS total_cents,
                COALESCE(SUM(paid_cents), 0) AS paid_cents,
                COALESCE(SUM(total_cents - paid_cents), 0) AS remaining_cents
            FROM sales WHERE customer_id = ?1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        let exams = super::exam::EyeExamRepository::new(self.pool.clone());
        let eye_exams = exams.list_for_customer(id).await?;
        let latest_exam = eye_exams.first().cloned();

        let notifications = super::notification::NotificationRepository::new(self.pool.clone())
            .list_for_customer(id, 10)
            .await?;

        Ok(CustomerProfile {
            customer,
            invoices,
            invoice_stats,
            eye_exams,
            latest_exam,
            notifications,
        })
    }

    async fn ensure_phone_free(&self, phone: &str, except_id: Option<&str>) -> DbResult<()> {
        let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE phone = ?1 AND id != ?2")
            .bind(phone)
            .bind(except_id.unwrap_or(""))
            .fetch_one(&self.pool)
            .await?;

        if taken > 0 {
            return Err(ValidationError::Duplicate {
                field: "phone".to_string(),
                value: phone.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn push_customer_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &CustomerFilter) {
    if let Some(term) = &filter.search {
        let pattern = like_pattern(term);
        qb.push(" AND (c.name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR c.phone LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR c.customer_code LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(from) = filter.date_from {
        qb.push(" AND c.join_date >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        qb.push(" AND c.join_date <= ").push_bind(to);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
