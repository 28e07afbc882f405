//! # optics-core: Pure Business Logic for the Optics Shop
//!
//! Domain types and rules for the shop back end: invoices and their money
//! math, inventory, customers and eye exams, employees and permissions.
//! Nothing in this crate performs I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Optics Shop Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Web UI (separate client)                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON over HTTP                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    optics-server (axum)                         │   │
//! │  │    auth, permission checks, routes                              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ optics-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌───────────┐ ┌───────────────┐   │   │
//! │  │   │  money   │ │ invoice  │ │ inventory │ │ customer      │   │   │
//! │  │   │  Money   │ │ totals   │ │ Product   │ │ EyeExam       │   │   │
//! │  │   │  VAT     │ │ payments │ │ movements │ │ Notification  │   │   │
//! │  │   └──────────┘ └──────────┘ └───────────┘ └───────────────┘   │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌───────────┐                     │   │
//! │  │   │  admin   │ │numbering │ │validation │                     │   │
//! │  │   └──────────┘ └──────────┘ └───────────┘                     │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    optics-db (Database Layer)                   │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Enumerations and the tax rate
//! - [`money`] - Money type with integer arithmetic
//! - [`invoice`] - Sale/SaleItem/Payment rows and invoice math
//! - [`inventory`] - Products, categories, partners, stock movements
//! - [`customer`] - Customers, eye exams, notifications
//! - [`admin`] - Settings, users, employees, groups, permissions
//! - [`numbering`] - Business number formats (`INV-00001`, `C-001`...)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use optics_core::money::Money;
//! use optics_core::VAT_RATE;
//!
//! let subtotal = Money::from_cents(10000); // SAR 100.00
//! let vat = subtotal.calculate_tax(VAT_RATE);
//! assert_eq!((subtotal + vat).cents(), 11500);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod admin;
pub mod customer;
pub mod error;
pub mod inventory;
pub mod invoice;
pub mod money;
pub mod numbering;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Saudi VAT, 15%. Applied to every invoice subtotal.
pub const VAT_RATE: TaxRate = TaxRate::from_bps(1500);

/// Maximum quantity of a single invoice line.
///
/// Catches typing 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest price, discount, payment or invoice subtotal accepted, in
/// halalas (SAR 100,000,000).
///
/// Keeps every line total and invoice total far inside `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 10_000_000_000;

/// Largest shelf quantity a product may be given or moved by at once.
pub const MAX_STOCK_LEVEL: i64 = 1_000_000;

/// Low-stock threshold for new products.
pub const DEFAULT_MIN_QUANTITY: i64 = 5;

/// Rows per page in paginated lists.
pub const PAGE_SIZE: i64 = 10;
