//! SQLite storage for the optics shop.
//!
//! Each repository owns the SQL for one area of the shop and returns
//! `optics-core` types. Writes that touch several tables (an invoice with
//! its stock movements, or a credit note) run inside a
//! single transaction opened by the repository method itself.
//!
//! - [`pool`]: opening the file, pool settings, repository accessors
//! - [`migrations`]: schema embedded from `migrations/sqlite/`
//! - [`error`]: [`DbError`] and the sqlx error mapping
//! - [`repository`]: customers, inventory, invoices, reports, staff
//!
//! ## Usage
//!
//! ```rust,ignore
//! use optics_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("data/optics.db")).await?;
//! let invoice = db.sales().create(&input, Some(&user.id)).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::Page;

// Repository re-exports for convenience
pub use repository::category::CategoryRepository;
pub use repository::customer::CustomerRepository;
pub use repository::employee::EmployeeRepository;
pub use repository::exam::EyeExamRepository;
pub use repository::group::GroupRepository;
pub use repository::notification::NotificationRepository;
pub use repository::partner::PartnerRepository;
pub use repository::product::ProductRepository;
pub use repository::report::ReportRepository;
pub use repository::sale::SaleRepository;
pub use repository::service::ServiceRepository;
pub use repository::settings::SettingsRepository;
pub use repository::stock::StockRepository;
pub use repository::user::UserRepository;
