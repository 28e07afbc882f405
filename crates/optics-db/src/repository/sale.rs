//! # Sale Repository
//!
//! The invoice engine's persistence: invoices, their lines and payments,
//! plus credit and debit notes.
//!
//! ## Transaction Boundaries
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create       next INV number, header, lines, stock out, first payment  │
//! │  delete       stock back for every product line, then the invoice       │
//! │  add_payment  balance check, payment row, paid_cents += amount          │
//! │  credit_note  CN header, negated lines, stock back                      │
//! │  debit_note   DN header                                                 │
//! │                                                                         │
//! │  Each row above is one BEGIN ... COMMIT. A failure anywhere rolls the   │
//! │  whole operation back, counters included.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use optics_core::admin::CompanySettings;
use optics_core::invoice::{
    check_payment, price_new_invoice, receipt_qr_text, InvoiceTotals, Payment, ProductLine, Sale, SaleItem,
    ServiceLine,
};
use optics_core::numbering::{credit_note_number, debit_note_number, Sequence};
use optics_core::validation::{optional_text, validate_payment_amount, validate_price_cents, validate_required};
use optics_core::{
    CoreError, Money, MovementType, PaymentMethod, PaymentStatus, SaleStatus, ValidationError, PAGE_SIZE, VAT_RATE,
};

use super::stock::{move_stock, MovementContext};
use super::{like_pattern, new_id, next_number, page_offset, Page};
use crate::error::{DbError, DbResult};

/// Sale header columns, aliased `s`.
pub(crate) const SALE_COLUMNS: &str = r#"
    s.id, s.order_number, s.customer_id, s.laboratory_id, s.status, s.order_date,
    s.delivery_date, s.completed_date, s.subtotal_cents, s.discount_cents, s.tax_cents,
    s.total_cents, s.payment_method, s.paid_cents, s.notes, s.prescription_notes,
    s.created_by, s.updated_by, s.created_at, s.updated_at
"#;

const INITIAL_PAYMENT_NOTE: &str = "Initial payment at invoice creation";

// =============================================================================
// Inputs
// =============================================================================

/// New invoice form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleInput {
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub laboratory_id: Option<String>,
    #[serde(default)]
    pub products: Vec<ProductLine>,
    #[serde(default)]
    pub services: Vec<ServiceLine>,
    #[serde(default)]
    pub discount_cents: i64,
    /// Paid at the counter when the invoice is created.
    #[serde(default)]
    pub paid_cents: i64,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub prescription_notes: Option<String>,
}

/// Edit form. Money fields are not editable; absent optional fields are
/// cleared, as on the HTML form this replaces.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleEdit {
    #[serde(default)]
    pub status: Option<SaleStatus>,
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub prescription_notes: Option<String>,
    #[serde(default)]
    pub laboratory_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentInput {
    #[serde(default)]
    pub amount_cents: i64,
    /// Defaults to the invoice's method.
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DebitNoteInput {
    #[serde(default)]
    pub amount_cents: i64,
    #[serde(default)]
    pub reason: String,
}

/// List filters. Invalid values were already dropped by the caller.
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub search: Option<String>,
    pub status: Option<SaleStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: i64,
}

// =============================================================================
// Read models
// =============================================================================

/// An invoice line with its product name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SaleLine {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub item: SaleItem,
    pub product_name: Option<String>,
    pub product_barcode: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct SaleRow {
    #[sqlx(flatten)]
    sale: Sale,
    customer_name: String,
    customer_phone: String,
    customer_code: String,
    laboratory_name: Option<String>,
}

/// Invoice header with customer fields and derived balance.
#[derive(Debug, Clone, Serialize)]
pub struct SaleSummaryRow {
    #[serde(flatten)]
    pub sale: Sale,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_code: String,
    pub laboratory_name: Option<String>,
    pub remaining_cents: i64,
    pub payment_status: PaymentStatus,
}

impl From<SaleRow> for SaleSummaryRow {
    fn from(row: SaleRow) -> Self {
        SaleSummaryRow {
            remaining_cents: row.sale.remaining().cents(),
            payment_status: row.sale.payment_status(),
            sale: row.sale,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            customer_code: row.customer_code,
            laboratory_name: row.laboratory_name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleDetail {
    #[serde(flatten)]
    pub header: SaleSummaryRow,
    pub is_paid: bool,
    pub items: Vec<SaleLine>,
    /// Newest first.
    pub payments: Vec<Payment>,
}

#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
pub struct SaleTotals {
    pub count: i64,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub remaining_cents: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: SaleStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleList {
    #[serde(flatten)]
    pub page: Page<SaleSummaryRow>,
    pub totals: SaleTotals,
    pub status_counts: Vec<StatusCount>,
}

/// Everything a printed tax invoice needs.
#[derive(Debug, Clone, Serialize)]
pub struct SalePrint {
    pub invoice: SaleDetail,
    pub company: CompanySettings,
    pub qr_text: String,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for invoices, invoice lines and payments.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets an invoice header by ID.
    pub async fn get(&self, id: &str) -> DbResult<Sale> {
        let mut conn = self.pool.acquire().await?;
        fetch_sale(&mut conn, id).await
    }

    pub async fn get_by_number(&self, order_number: &str) -> DbResult<Sale> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales s WHERE s.order_number = ?1");
        sqlx::query_as::<_, Sale>(&sql)
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", order_number))
    }

    /// Creates an invoice.
    ///
    /// ## What Happens
    /// 1. Lines and money fields are priced and checked (optics-core)
    /// 2. The next `INV-NNNNN` number is taken
    /// 3. Header and lines are written; every product line moves stock out,
    ///    even below zero
    /// 4. A positive `paid_cents` becomes the first payment row
    pub async fn create(&self, input: &SaleInput, user_id: Option<&str>) -> DbResult<SaleDetail> {
        let customer_id = validate_required("customer_id", &input.customer_id, 36)?;
        let notes = optional_text("notes", input.notes.as_deref(), 2000)?;
        let prescription_notes = optional_text("prescription_notes", input.prescription_notes.as_deref(), 2000)?;
        let laboratory_id = optional_text("laboratory_id", input.laboratory_id.as_deref(), 36)?;
        for line in &input.services {
            validate_required("service_name", &line.service_name, 200)?;
        }

        let totals = price_new_invoice(
            &input.products,
            &input.services,
            Money::from_cents(input.discount_cents),
            Money::from_cents(input.paid_cents),
            VAT_RATE,
        )?;

        let mut tx = self.pool.begin().await?;

        ensure_exists(&mut tx, "customers", "Customer", &customer_id).await?;
        if let Some(lab) = &laboratory_id {
            ensure_exists(&mut tx, "laboratories", "Laboratory", lab).await?;
        }

        let order_number = next_number(&mut tx, Sequence::Sale).await?;
        let now = Utc::now();

        let mut sale = Sale {
            id: new_id(),
            order_number,
            customer_id,
            laboratory_id,
            status: SaleStatus::Created,
            order_date: now,
            delivery_date: input.delivery_date,
            completed_date: None,
            subtotal_cents: totals.subtotal.cents(),
            discount_cents: totals.discount.cents(),
            tax_cents: totals.tax.cents(),
            total_cents: 0,
            payment_method: input.payment_method,
            paid_cents: input.paid_cents,
            notes,
            prescription_notes,
            created_by: user_id.map(str::to_string),
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        insert_sale(&mut tx, &mut sale).await?;

        for line in &input.products {
            let mut item = SaleItem {
                id: new_id(),
                sale_id: sale.id.clone(),
                product_id: Some(line.product_id.clone()),
                service_name: None,
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                total_price_cents: 0,
                prescription_right: optional_text("prescription_right", line.prescription_right.as_deref(), 200)?,
                prescription_left: optional_text("prescription_left", line.prescription_left.as_deref(), 200)?,
                created_at: now,
            };
            move_stock(
                &mut tx,
                &line.product_id,
                MovementType::Out,
                line.quantity,
                MovementContext {
                    reference: Some(&sale.order_number),
                    notes: Some("Sold on invoice"),
                    created_by: user_id,
                },
            )
            .await?;
            insert_item(&mut tx, &mut item).await?;
        }

        for line in &input.services {
            let mut item = SaleItem {
                id: new_id(),
                sale_id: sale.id.clone(),
                product_id: None,
                service_name: Some(line.service_name.trim().to_string()),
                quantity: 1,
                unit_price_cents: line.price_cents,
                total_price_cents: 0,
                prescription_right: None,
                prescription_left: None,
                created_at: now,
            };
            insert_item(&mut tx, &mut item).await?;
        }

        if input.paid_cents > 0 {
            insert_payment(
                &mut tx,
                &Payment {
                    id: new_id(),
                    sale_id: sale.id.clone(),
                    amount_cents: input.paid_cents,
                    payment_method: input.payment_method,
                    payment_date: now,
                    reference: None,
                    notes: Some(INITIAL_PAYMENT_NOTE.to_string()),
                    created_by: user_id.map(str::to_string),
                },
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            order_number = %sale.order_number,
            total_cents = sale.total_cents,
            items = input.products.len() + input.services.len(),
            "Invoice created"
        );
        self.detail(&sale.id).await
    }

    /// Applies the edit form. Status may move in any direction; reaching
    /// `received` or `completed` stamps `completed_date` once.
    pub async fn edit(&self, id: &str, edit: &SaleEdit, user_id: Option<&str>) -> DbResult<Sale> {
        let notes = optional_text("notes", edit.notes.as_deref(), 2000)?;
        let prescription_notes = optional_text("prescription_notes", edit.prescription_notes.as_deref(), 2000)?;
        let laboratory_id = optional_text("laboratory_id", edit.laboratory_id.as_deref(), 36)?;

        let mut tx = self.pool.begin().await?;
        let mut sale = fetch_sale(&mut tx, id).await?;

        if let Some(lab) = &laboratory_id {
            ensure_exists(&mut tx, "laboratories", "Laboratory", lab).await?;
        }

        let now = Utc::now();
        if let Some(status) = edit.status {
            sale.set_status(status, now);
        }

        sqlx::query(
            r#"
            UPDATE sales SET
                status = ?2, delivery_date = ?3, completed_date = ?4, notes = ?5,
                prescription_notes = ?6, laboratory_id = ?7, updated_by = ?8, updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(sale.status)
        .bind(edit.delivery_date)
        .bind(sale.completed_date)
        .bind(&notes)
        .bind(&prescription_notes)
        .bind(&laboratory_id)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(sale_id = %id, order_number = %sale.order_number, status = %sale.status, "Invoice updated");
        self.get(id).await
    }

    /// Deletes an invoice and puts its products back on the shelf.
    pub async fn delete(&self, id: &str, user_id: Option<&str>) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let sale = fetch_sale(&mut tx, id).await?;
        let items = fetch_items(&mut tx, id).await?;

        for item in &items {
            if let Some(product_id) = &item.product_id {
                restock(&mut tx, product_id, item.quantity, &sale.order_number, "Invoice deleted", user_id).await?;
            }
        }

        sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(sale_id = %id, order_number = %sale.order_number, "Invoice deleted");
        Ok(())
    }

    /// Records a payment against the outstanding balance.
    ///
    /// ## Errors
    /// - `InvalidPaymentAmount` for zero or negative amounts
    /// - `PaymentExceedsBalance` when `amount > total − paid`; nothing is
    ///   written in that case
    pub async fn add_payment(&self, id: &str, input: &PaymentInput, user_id: Option<&str>) -> DbResult<Payment> {
        let reference = optional_text("reference", input.reference.as_deref(), 100)?;
        let notes = optional_text("notes", input.notes.as_deref(), 1000)?;

        let mut tx = self.pool.begin().await?;
        let sale = fetch_sale(&mut tx, id).await?;

        let amount = Money::from_cents(input.amount_cents);
        check_payment(amount, sale.total(), sale.paid())?;

        let now = Utc::now();
        let payment = Payment {
            id: new_id(),
            sale_id: sale.id.clone(),
            amount_cents: amount.cents(),
            payment_method: input.payment_method.unwrap_or(sale.payment_method),
            payment_date: now,
            reference,
            notes,
            created_by: user_id.map(str::to_string),
        };
        insert_payment(&mut tx, &payment).await?;

        sqlx::query("UPDATE sales SET paid_cents = paid_cents + ?2, updated_by = ?3, updated_at = ?4 WHERE id = ?1")
            .bind(id)
            .bind(amount.cents())
            .bind(user_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            sale_id = %id,
            order_number = %sale.order_number,
            amount_cents = amount.cents(),
            "Payment added"
        );
        Ok(payment)
    }

    /// Issues `CN-<number>`: a cancelled invoice with negated amounts and
    /// lines. Product lines go back into stock.
    pub async fn credit_note(&self, id: &str, user_id: Option<&str>) -> DbResult<SaleDetail> {
        let mut tx = self.pool.begin().await?;
        let original = fetch_sale(&mut tx, id).await?;
        ensure_not_note(&original)?;

        let order_number = credit_note_number(&original.order_number);
        ensure_number_free(&mut tx, &order_number).await?;

        let totals = InvoiceTotals::from_parts(
            Money::from_cents(original.subtotal_cents),
            Money::from_cents(original.discount_cents),
            Money::from_cents(original.tax_cents),
        )
        .negated();
        let now = Utc::now();

        let mut note = Sale {
            id: new_id(),
            order_number,
            customer_id: original.customer_id.clone(),
            laboratory_id: None,
            status: SaleStatus::Cancelled,
            order_date: now,
            delivery_date: None,
            completed_date: None,
            subtotal_cents: totals.subtotal.cents(),
            discount_cents: totals.discount.cents(),
            tax_cents: totals.tax.cents(),
            total_cents: 0,
            payment_method: original.payment_method,
            paid_cents: 0,
            notes: Some(format!("Credit note for invoice {}", original.order_number)),
            prescription_notes: None,
            created_by: user_id.map(str::to_string),
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        insert_sale(&mut tx, &mut note).await?;

        for line in fetch_items(&mut tx, id).await? {
            let mut item = SaleItem {
                id: new_id(),
                sale_id: note.id.clone(),
                product_id: line.product_id.clone(),
                service_name: line.service_name.clone(),
                quantity: -line.quantity,
                unit_price_cents: line.unit_price_cents,
                total_price_cents: 0,
                prescription_right: None,
                prescription_left: None,
                created_at: now,
            };
            insert_item(&mut tx, &mut item).await?;

            if let Some(product_id) = &line.product_id {
                restock(&mut tx, product_id, line.quantity, &note.order_number, "Credit note", user_id).await?;
            }
        }

        tx.commit().await?;

        info!(
            sale_id = %note.id,
            order_number = %note.order_number,
            original = %original.order_number,
            "Credit note issued"
        );
        self.detail(&note.id).await
    }

    /// Issues `DN-<number>`: a completed invoice charging `amount` plus VAT.
    pub async fn debit_note(&self, id: &str, input: &DebitNoteInput, user_id: Option<&str>) -> DbResult<SaleDetail> {
        validate_payment_amount(input.amount_cents).map_err(|_| ValidationError::MustBePositive {
            field: "amount".to_string(),
        })?;
        validate_price_cents("amount", input.amount_cents)?;
        let reason = optional_text("reason", Some(input.reason.as_str()), 500)?;

        let mut tx = self.pool.begin().await?;
        let original = fetch_sale(&mut tx, id).await?;
        ensure_not_note(&original)?;

        let order_number = debit_note_number(&original.order_number);
        ensure_number_free(&mut tx, &order_number).await?;

        let totals = InvoiceTotals::for_amount(Money::from_cents(input.amount_cents), VAT_RATE);
        let now = Utc::now();
        let notes = match reason {
            Some(reason) => format!("Debit note for invoice {}: {}", original.order_number, reason),
            None => format!("Debit note for invoice {}", original.order_number),
        };

        let mut note = Sale {
            id: new_id(),
            order_number,
            customer_id: original.customer_id.clone(),
            laboratory_id: None,
            status: SaleStatus::Created,
            order_date: now,
            delivery_date: None,
            completed_date: None,
            subtotal_cents: totals.subtotal.cents(),
            discount_cents: 0,
            tax_cents: totals.tax.cents(),
            total_cents: 0,
            payment_method: original.payment_method,
            paid_cents: 0,
            notes: Some(notes),
            prescription_notes: None,
            created_by: user_id.map(str::to_string),
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        note.set_status(SaleStatus::Completed, now);
        insert_sale(&mut tx, &mut note).await?;

        tx.commit().await?;

        info!(
            sale_id = %note.id,
            order_number = %note.order_number,
            original = %original.order_number,
            total_cents = note.total_cents,
            "Debit note issued"
        );
        self.detail(&note.id).await
    }

    /// Header, lines, payments and balance.
    pub async fn detail(&self, id: &str) -> DbResult<SaleDetail> {
        let sql = format!("{} WHERE s.id = ?1", sale_row_select());
        let row = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))?;

        let items = sqlx::query_as::<_, SaleLine>(
            r#"
            SELECT i.id, i.sale_id, i.product_id, i.service_name, i.quantity, i.unit_price_cents,
                i.total_price_cents, i.prescription_right, i.prescription_left, i.created_at,
                p.item_name AS product_name, p.barcode AS product_barcode
            FROM sale_items i
            LEFT JOIN products p ON p.id = i.product_id
            WHERE i.sale_id = ?1
            ORDER BY i.created_at, i.rowid
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, sale_id, amount_cents, payment_method, payment_date, reference, notes, created_by
            FROM payments WHERE sale_id = ?1
            ORDER BY payment_date DESC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let header = SaleSummaryRow::from(row);
        Ok(SaleDetail {
            is_paid: header.sale.is_paid(),
            header,
            items,
            payments,
        })
    }

    /// Tax invoice print data.
    pub async fn print(&self, id: &str) -> DbResult<SalePrint> {
        let invoice = self.detail(id).await?;
        let company = super::settings::SettingsRepository::new(self.pool.clone())
            .company()
            .await?;

        let sale = &invoice.header.sale;
        let qr_text = receipt_qr_text(
            &company.company_name_ar,
            &company.tax_number,
            sale.order_date,
            sale.total(),
            Money::from_cents(sale.tax_cents),
        );

        Ok(SalePrint {
            invoice,
            company,
            qr_text,
        })
    }

    /// Filtered invoice list with totals and per-status counts over the
    /// whole filtered set.
    pub async fn list(&self, filter: &SaleFilter) -> DbResult<SaleList> {
        debug!(?filter, "Listing invoices");

        let from = "FROM sales s JOIN customers c ON c.id = s.customer_id WHERE 1 = 1";

        let mut totals_qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            r#"SELECT COUNT(*) AS count,
                COALESCE(SUM(s.total_cents), 0) AS total_cents,
                COALESCE(SUM(s.paid_cents), 0) AS paid_cents,
                COALESCE(SUM(s.total_cents - s.paid_cents), 0) AS remaining_cents
            {from}"#
        ));
        push_sale_filters(&mut totals_qb, filter);
        let totals = totals_qb.build_query_as::<SaleTotals>().fetch_one(&self.pool).await?;

        let mut counts_qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT s.status AS status, COUNT(*) AS count {from}"));
        push_sale_filters(&mut counts_qb, filter);
        counts_qb.push(" GROUP BY s.status");
        let found = counts_qb.build_query_as::<StatusCount>().fetch_all(&self.pool).await?;
        let status_counts = SaleStatus::ALL
            .iter()
            .map(|status| StatusCount {
                status: *status,
                count: found.iter().find(|c| c.status == *status).map_or(0, |c| c.count),
            })
            .collect();

        let (page, offset) = page_offset(filter.page);
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("{} WHERE 1 = 1", sale_row_select()));
        push_sale_filters(&mut qb, filter);
        qb.push(" ORDER BY s.order_date DESC LIMIT ")
            .push_bind(PAGE_SIZE)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = qb.build_query_as::<SaleRow>().fetch_all(&self.pool).await?;

        Ok(SaleList {
            page: Page::new(rows.into_iter().map(SaleSummaryRow::from).collect(), totals.count, page),
            totals,
            status_counts,
        })
    }

    /// Open invoices (not completed, not cancelled), newest first.
    pub async fn current(&self, limit: i64) -> DbResult<Vec<SaleSummaryRow>> {
        let sql = format!(
            "{} WHERE s.status NOT IN ('completed', 'cancelled') ORDER BY s.order_date DESC LIMIT ?1",
            sale_row_select()
        );
        let rows = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(SaleSummaryRow::from).collect())
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================

fn sale_row_select() -> String {
    format!(
        r#"SELECT {SALE_COLUMNS},
            c.name AS customer_name, c.phone AS customer_phone, c.customer_code AS customer_code,
            l.company_name AS laboratory_name
        FROM sales s
        JOIN customers c ON c.id = s.customer_id
        LEFT JOIN laboratories l ON l.id = s.laboratory_id"#
    )
}

fn push_sale_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &SaleFilter) {
    if let Some(term) = &filter.search {
        let pattern = like_pattern(term);
        qb.push(" AND (s.order_number LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR c.name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR c.phone LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR c.customer_code LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(status) = filter.status {
        qb.push(" AND s.status = ").push_bind(status);
    }
    match filter.payment_status {
        Some(PaymentStatus::Unpaid) => {
            qb.push(" AND s.paid_cents = 0");
        }
        Some(PaymentStatus::Partial) => {
            qb.push(" AND s.paid_cents > 0 AND s.paid_cents < s.total_cents");
        }
        Some(PaymentStatus::Paid) => {
            qb.push(" AND s.paid_cents != 0 AND s.paid_cents >= s.total_cents");
        }
        None => {}
    }
    if let Some(from) = filter.date_from {
        qb.push(" AND date(s.order_date) >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        qb.push(" AND date(s.order_date) <= ").push_bind(to);
    }
}

async fn fetch_sale(conn: &mut SqliteConnection, id: &str) -> DbResult<Sale> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM sales s WHERE s.id = ?1");
    sqlx::query_as::<_, Sale>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Sale", id))
}

async fn fetch_items(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
    let items = sqlx::query_as::<_, SaleItem>(
        r#"
        SELECT id, sale_id, product_id, service_name, quantity, unit_price_cents, total_price_cents,
            prescription_right, prescription_left, created_at
        FROM sale_items WHERE sale_id = ?1
        ORDER BY created_at, rowid
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

async fn ensure_exists(conn: &mut SqliteConnection, table: &str, entity: &str, id: &str) -> DbResult<()> {
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE id = ?1");
    let found: i64 = sqlx::query_scalar(&sql).bind(id).fetch_one(&mut *conn).await?;
    if found == 0 {
        return Err(DbError::not_found(entity, id));
    }
    Ok(())
}

fn ensure_not_note(sale: &Sale) -> DbResult<()> {
    if sale.is_note() {
        return Err(CoreError::NoteOfNote {
            order_number: sale.order_number.clone(),
        }
        .into());
    }
    Ok(())
}

async fn ensure_number_free(conn: &mut SqliteConnection, order_number: &str) -> DbResult<()> {
    let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE order_number = ?1")
        .bind(order_number)
        .fetch_one(&mut *conn)
        .await?;
    if taken > 0 {
        return Err(DbError::duplicate("order_number", order_number));
    }
    Ok(())
}

/// Puts `quantity` units back. Negative quantities (credit-note lines)
/// take them out again.
async fn restock(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    reference: &str,
    notes: &str,
    user_id: Option<&str>,
) -> DbResult<()> {
    let (movement_type, amount) = if quantity >= 0 {
        (MovementType::Return, quantity)
    } else {
        (MovementType::Out, -quantity)
    };

    move_stock(
        conn,
        product_id,
        movement_type,
        amount,
        MovementContext {
            reference: Some(reference),
            notes: Some(notes),
            created_by: user_id,
        },
    )
    .await?;
    Ok(())
}

/// Writes a header. `total_cents` is recomputed first.
async fn insert_sale(conn: &mut SqliteConnection, sale: &mut Sale) -> DbResult<()> {
    sale.recompute_total();

    sqlx::query(
        r#"
        INSERT INTO sales (
            id, order_number, customer_id, laboratory_id, status, order_date, delivery_date,
            completed_date, subtotal_cents, discount_cents, tax_cents, total_cents, payment_method,
            paid_cents, notes, prescription_notes, created_by, updated_by, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.order_number)
    .bind(&sale.customer_id)
    .bind(&sale.laboratory_id)
    .bind(sale.status)
    .bind(sale.order_date)
    .bind(sale.delivery_date)
    .bind(sale.completed_date)
    .bind(sale.subtotal_cents)
    .bind(sale.discount_cents)
    .bind(sale.tax_cents)
    .bind(sale.total_cents)
    .bind(sale.payment_method)
    .bind(sale.paid_cents)
    .bind(&sale.notes)
    .bind(&sale.prescription_notes)
    .bind(&sale.created_by)
    .bind(&sale.updated_by)
    .bind(sale.created_at)
    .bind(sale.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Writes a line. `total_price_cents` is recomputed first.
async fn insert_item(conn: &mut SqliteConnection, item: &mut SaleItem) -> DbResult<()> {
    item.recompute_total();

    sqlx::query(
        r#"
        INSERT INTO sale_items (
            id, sale_id, product_id, service_name, quantity, unit_price_cents, total_price_cents,
            prescription_right, prescription_left, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(&item.service_name)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.total_price_cents)
    .bind(&item.prescription_right)
    .bind(&item.prescription_left)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO payments (id, sale_id, amount_cents, payment_method, payment_date, reference, notes, created_by)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.sale_id)
    .bind(payment.amount_cents)
    .bind(payment.payment_method)
    .bind(payment.payment_date)
    .bind(&payment.reference)
    .bind(&payment.notes)
    .bind(&payment.created_by)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::customer::CustomerInput;
    use crate::repository::product::ProductInput;
    use crate::{Database, DbConfig};
    use optics_core::Gender;

    struct Fixture {
        db: Database,
        customer_id: String,
        product_id: String,
    }

    async fn fixture(stock: i64) -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer_id = db
            .customers()
            .create(&CustomerInput {
                name: "Nora".to_string(),
                phone: "566666666".to_string(),
                gender: Some(Gender::Female),
                ..Default::default()
            })
            .await
            .unwrap()
            .id;
        let product_id = db
            .products()
            .create(
                &ProductInput {
                    item_name: "Titanium frame".to_string(),
                    barcode: "TF-100".to_string(),
                    quantity: stock,
                    cost_price_cents: 20000,
                    selling_price_cents: 40000,
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap()
            .product
            .id;
        Fixture {
            db,
            customer_id,
            product_id,
        }
    }

    fn invoice(f: &Fixture, quantity: i64, unit_price_cents: i64, paid_cents: i64) -> SaleInput {
        SaleInput {
            customer_id: f.customer_id.clone(),
            products: vec![ProductLine {
                product_id: f.product_id.clone(),
                quantity,
                unit_price_cents,
                prescription_right: Some("-1.25".to_string()),
                prescription_left: None,
            }],
            paid_cents,
            ..Default::default()
        }
    }

    async fn quantity(f: &Fixture) -> i64 {
        f.db.products().get(&f.product_id).await.unwrap().quantity
    }

    #[tokio::test]
    async fn test_create_prices_numbers_and_moves_stock() {
        let f = fixture(10).await;
        let sales = f.db.sales();

        let first = sales.create(&invoice(&f, 1, 10000, 5000), None).await.unwrap();
        let second = sales.create(&invoice(&f, 2, 10000, 0), None).await.unwrap();

        assert_eq!(first.header.sale.order_number, "INV-00001");
        assert_eq!(second.header.sale.order_number, "INV-00002");

        assert_eq!(first.header.sale.subtotal_cents, 10000);
        assert_eq!(first.header.sale.tax_cents, 1500);
        assert_eq!(first.header.sale.total_cents, 11500);
        assert_eq!(first.header.payment_status, PaymentStatus::Partial);
        assert_eq!(first.payments.len(), 1);
        assert_eq!(first.payments[0].notes.as_deref(), Some(INITIAL_PAYMENT_NOTE));
        assert_eq!(first.items[0].product_name.as_deref(), Some("Titanium frame"));

        assert_eq!(quantity(&f).await, 7);
    }

    #[tokio::test]
    async fn test_selling_from_empty_shelf_goes_negative() {
        let f = fixture(0).await;
        f.db.sales().create(&invoice(&f, 3, 10000, 0), None).await.unwrap();
        assert_eq!(quantity(&f).await, -3);
    }

    #[tokio::test]
    async fn test_failed_create_rolls_back_number_and_stock() {
        let f = fixture(5).await;
        let mut bad = invoice(&f, 1, 10000, 0);
        bad.products.push(ProductLine {
            product_id: "missing".to_string(),
            quantity: 1,
            unit_price_cents: 100,
            prescription_right: None,
            prescription_left: None,
        });

        assert!(matches!(
            f.db.sales().create(&bad, None).await,
            Err(DbError::NotFound { .. })
        ));
        assert_eq!(quantity(&f).await, 5);

        let ok = f.db.sales().create(&invoice(&f, 1, 10000, 0), None).await.unwrap();
        assert_eq!(ok.header.sale.order_number, "INV-00001");
    }

    #[tokio::test]
    async fn test_overpayment_rejected_and_balance_kept() {
        let f = fixture(5).await;
        let sales = f.db.sales();
        let sale = sales.create(&invoice(&f, 1, 10000, 10000), None).await.unwrap();
        let id = sale.header.sale.id.clone();

        let err = sales
            .add_payment(
                &id,
                &PaymentInput {
                    amount_cents: 1501,
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::PaymentExceedsBalance { .. })));
        assert_eq!(sales.get(&id).await.unwrap().paid_cents, 10000);

        sales
            .add_payment(
                &id,
                &PaymentInput {
                    amount_cents: 1500,
                    payment_method: Some(PaymentMethod::Mada),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        let detail = sales.detail(&id).await.unwrap();
        assert!(detail.is_paid);
        assert_eq!(detail.payments.len(), 2);
    }

    #[tokio::test]
    async fn test_edit_stamps_completion_once() {
        let f = fixture(5).await;
        let sales = f.db.sales();
        let id = sales.create(&invoice(&f, 1, 10000, 0), None).await.unwrap().header.sale.id;

        let received = sales
            .edit(
                &id,
                &SaleEdit {
                    status: Some(SaleStatus::Received),
                    notes: Some("Picked up".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        let stamped = received.completed_date.unwrap();
        assert_eq!(received.total_cents, 11500);

        let completed = sales
            .edit(
                &id,
                &SaleEdit {
                    status: Some(SaleStatus::Completed),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(completed.completed_date, Some(stamped));
        assert!(completed.notes.is_none());
    }

    #[tokio::test]
    async fn test_delete_restores_stock() {
        let f = fixture(10).await;
        let sales = f.db.sales();
        let id = sales.create(&invoice(&f, 4, 10000, 0), None).await.unwrap().header.sale.id;
        assert_eq!(quantity(&f).await, 6);

        sales.delete(&id, None).await.unwrap();
        assert_eq!(quantity(&f).await, 10);
        assert!(matches!(sales.get(&id).await, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_credit_note() {
        let f = fixture(10).await;
        let sales = f.db.sales();
        let original = sales.create(&invoice(&f, 2, 10000, 0), None).await.unwrap();
        let id = original.header.sale.id.clone();

        let note = sales.credit_note(&id, None).await.unwrap();
        assert_eq!(note.header.sale.order_number, "CN-INV-00001");
        assert_eq!(note.header.sale.status, SaleStatus::Cancelled);
        assert_eq!(note.header.sale.total_cents, -original.header.sale.total_cents);
        assert_eq!(note.items[0].item.quantity, -2);
        assert_eq!(note.items[0].item.total_price_cents, -20000);
        assert_eq!(quantity(&f).await, 10);

        assert!(matches!(
            sales.credit_note(&id, None).await,
            Err(DbError::UniqueViolation { .. })
        ));
        assert!(matches!(
            sales.credit_note(&note.header.sale.id, None).await,
            Err(DbError::Domain(CoreError::NoteOfNote { .. }))
        ));
    }

    #[tokio::test]
    async fn test_debit_note() {
        let f = fixture(10).await;
        let sales = f.db.sales();
        let id = sales.create(&invoice(&f, 1, 10000, 0), None).await.unwrap().header.sale.id;

        let note = sales
            .debit_note(
                &id,
                &DebitNoteInput {
                    amount_cents: 5000,
                    reason: "Extra coating".to_string(),
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(note.header.sale.order_number, "DN-INV-00001");
        assert_eq!(note.header.sale.status, SaleStatus::Completed);
        assert_eq!(note.header.sale.total_cents, 5750);
        assert!(note.header.sale.notes.unwrap().contains("Extra coating"));
    }

    #[tokio::test]
    async fn test_debit_note_amount_is_capped() {
        let f = fixture(10).await;
        let sales = f.db.sales();
        let id = sales.create(&invoice(&f, 1, 10000, 0), None).await.unwrap().header.sale.id;

        let err = sales
            .debit_note(
                &id,
                &DebitNoteInput {
                    amount_cents: i64::MAX,
                    reason: String::new(),
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert!(sales.get_by_number("DN-INV-00001").await.is_err());
    }

    #[tokio::test]
    async fn test_list_filters_and_totals() {
        let f = fixture(10).await;
        let sales = f.db.sales();
        sales.create(&invoice(&f, 1, 10000, 11500), None).await.unwrap();
        sales.create(&invoice(&f, 1, 20000, 0), None).await.unwrap();

        let all = sales.list(&SaleFilter::default()).await.unwrap();
        assert_eq!(all.totals.count, 2);
        assert_eq!(all.totals.total_cents, 11500 + 23000);
        assert_eq!(all.totals.remaining_cents, 23000);
        let created = all.status_counts.iter().find(|c| c.status == SaleStatus::Created).unwrap();
        assert_eq!(created.count, 2);

        let unpaid = sales
            .list(&SaleFilter {
                payment_status: Some(PaymentStatus::Unpaid),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(unpaid.page.items.len(), 1);
        assert_eq!(unpaid.page.items[0].sale.order_number, "INV-00002");

        let by_phone = sales
            .list(&SaleFilter {
                search: Some("5666".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_phone.totals.count, 2);

        let future = sales
            .list(&SaleFilter {
                date_from: NaiveDate::from_ymd_opt(2999, 1, 1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(future.totals.count, 0);
    }

    #[tokio::test]
    async fn test_customer_with_invoices_cannot_be_deleted() {
        let f = fixture(10).await;
        f.db.sales().create(&invoice(&f, 1, 10000, 0), None).await.unwrap();

        assert!(matches!(
            f.db.customers().delete(&f.customer_id).await,
            Err(DbError::Domain(CoreError::InUse { .. }))
        ));
    }
}
