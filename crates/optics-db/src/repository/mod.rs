//! # Repository Module
//!
//! Database repository implementations for the optics shop.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  axum handler                                                          │
//! │       │                                                                 │
//! │       │  db.sales().add_payment(id, payment, user)                     │
//! │       ▼                                                                 │
//! │  SaleRepository                                                        │
//! │  ├── validate input (optics-core)                                      │
//! │  ├── BEGIN                                                             │
//! │  ├── read current row, apply business rule (optics-core)              │
//! │  ├── write rows                                                        │
//! │  └── COMMIT                                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! | Repository | Tables |
//! |------------|--------|
//! | [`customer::CustomerRepository`] | customers |
//! | [`exam::EyeExamRepository`] | eye_exams |
//! | [`notification::NotificationRepository`] | notifications |
//! | [`product::ProductRepository`] | products, stock_movements |
//! | [`category::CategoryRepository`] | categories |
//! | [`partner::PartnerRepository`] | suppliers, laboratories |
//! | [`stock::StockRepository`] | stock_movements, dashboard |
//! | [`sale::SaleRepository`] | sales, sale_items, payments |
//! | [`service::ServiceRepository`] | services |
//! | [`report::ReportRepository`] | read-only aggregations |
//! | [`settings::SettingsRepository`] | company_settings, payment_method_configs, attachments |
//! | [`user::UserRepository`] | users, sessions |
//! | [`employee::EmployeeRepository`] | employee_profiles, employee_activities |
//! | [`group::GroupRepository`] | employee_groups, user_groups |

use serde::Serialize;
use sqlx::SqliteConnection;
use uuid::Uuid;

use optics_core::numbering::Sequence;
use optics_core::PAGE_SIZE;

use crate::error::DbResult;

pub mod category;
pub mod customer;
pub mod employee;
pub mod exam;
pub mod group;
pub mod notification;
pub mod partner;
pub mod product;
pub mod report;
pub mod sale;
pub mod service;
pub mod settings;
pub mod stock;
pub mod user;

// =============================================================================
// Shared helpers
// =============================================================================

/// Generates a new primary key.
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Advances a business number counter and formats the result.
///
/// Must run on the connection of the transaction that inserts the numbered
/// row: the counter update and the insert commit or roll back together, so
/// a number is never handed out twice.
pub(crate) async fn next_number(conn: &mut SqliteConnection, sequence: Sequence) -> DbResult<String> {
    let value: i64 = sqlx::query_scalar(
        "UPDATE number_sequences SET last_value = last_value + 1 WHERE name = ?1 RETURNING last_value",
    )
    .bind(sequence.key())
    .fetch_one(&mut *conn)
    .await?;

    Ok(sequence.format(value))
}

/// `%term%` for case-insensitive LIKE searches, with `%`, `_` and `\`
/// in the term matched literally. Every LIKE using it must end in
/// `ESCAPE '\'`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// One page of a list plus the numbers a pager needs.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub(crate) fn new(items: Vec<T>, total: i64, page: i64) -> Self {
        Page {
            items,
            total,
            page,
            total_pages: (total + PAGE_SIZE - 1) / PAGE_SIZE,
        }
    }
}

/// Clamps a 1-based page number and returns its row offset.
///
/// A page past the end of `i64` saturates and reads as an empty page.
pub(crate) fn page_offset(page: i64) -> (i64, i64) {
    let page = page.max(1);
    (page, (page - 1).saturating_mul(PAGE_SIZE))
}
