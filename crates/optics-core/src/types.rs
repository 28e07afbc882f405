//! # Domain Types
//!
//! Shared value types and enumerations used throughout the optics shop.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Enums                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   SaleStatus    │   │  PaymentMethod  │   │  PaymentStatus  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  created        │   │  cash           │   │  unpaid         │       │
//! │  │  lab            │   │  card           │   │  partial        │       │
//! │  │  ready          │   │  transfer       │   │  paid           │       │
//! │  │  received       │   │  mada           │   │  (derived only) │       │
//! │  │  completed      │   │  later          │   └─────────────────┘       │
//! │  │  cancelled      │   └─────────────────┘                              │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  MovementType  Gender  NotificationChannel  MessageType  Position      │
//! │  TaxRate (bps, 1500 = 15% VAT)                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4, immutable, used for database relations
//! - Business ID: (`order_number`, `customer_code`, `code`) human-readable

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so Saudi VAT of 15% is 1500 bps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a whole-number percentage (for reports).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// String-backed enums
// =============================================================================

/// Implements `as_str`, `Display` and `FromStr` for a unit-only enum whose
/// wire, database and query-string form are the same lowercase word.
macro_rules! string_enum {
    ($name:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The stored/serialized form.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ValidationError::NotAllowed {
                        field: $field.to_string(),
                        allowed: $name::ALL.iter().map(|v| v.as_str().to_string()).collect(),
                    }),
                }
            }
        }
    };
}

// =============================================================================
// Sale Status
// =============================================================================

/// Fulfillment status of an invoice.
///
/// There is no enforced transition graph: the edit form may move an
/// invoice from any status to any other.
///
/// ```text
/// created ──► lab ──► ready ──► received ──► completed
///    │
///    └──────────── (any) ──────────────► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    /// Invoice created, nothing sent out yet.
    Created,
    /// Lenses are at the laboratory.
    Lab,
    /// Glasses are ready for pickup.
    Ready,
    /// Customer received the glasses.
    Received,
    /// Invoice closed.
    Completed,
    /// Invoice cancelled (also used by credit notes).
    Cancelled,
}

string_enum!(SaleStatus, "status", {
    Created => "created",
    Lab => "lab",
    Ready => "ready",
    Received => "received",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl SaleStatus {
    /// Statuses that stamp `completed_date` the first time they are set.
    pub const fn stamps_completion(&self) -> bool {
        matches!(self, SaleStatus::Received | SaleStatus::Completed)
    }

    /// Statuses shown on the "current invoices" board.
    pub const fn is_open(&self) -> bool {
        !matches!(self, SaleStatus::Completed | SaleStatus::Cancelled)
    }
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Created
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How an invoice or a payment was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    /// Saudi domestic debit network.
    Mada,
    /// Pay on pickup.
    Later,
}

string_enum!(PaymentMethod, "payment_method", {
    Cash => "cash",
    Card => "card",
    Transfer => "transfer",
    Mada => "mada",
    Later => "later",
});

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Derived settlement state of an invoice. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

string_enum!(PaymentStatus, "payment_status", {
    Unpaid => "unpaid",
    Partial => "partial",
    Paid => "paid",
});

// =============================================================================
// Stock Movement Type
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    /// Goods received.
    In,
    /// Goods sold or written off.
    Out,
    /// Quantity set to an absolute value after a count.
    Adjustment,
    /// Goods returned to stock.
    Return,
}

string_enum!(MovementType, "movement_type", {
    In => "in",
    Out => "out",
    Adjustment => "adjustment",
    Return => "return",
});

// =============================================================================
// People
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

string_enum!(Gender, "gender", {
    Male => "male",
    Female => "female",
});

impl Default for Gender {
    fn default() -> Self {
        Gender::Male
    }
}

/// Job title of an employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum EmployeePosition {
    Manager,
    Accountant,
    Sales,
    Inventory,
    Technician,
    Cashier,
    Other,
}

string_enum!(EmployeePosition, "position", {
    Manager => "manager",
    Accountant => "accountant",
    Sales => "sales",
    Inventory => "inventory",
    Technician => "technician",
    Cashier => "cashier",
    Other => "other",
});

// =============================================================================
// Notifications
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Whatsapp,
    Sms,
    Email,
}

string_enum!(NotificationChannel, "channel", {
    Whatsapp => "whatsapp",
    Sms => "sms",
    Email => "email",
});

/// What a customer notification was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Exam,
    Delivery,
    Pickup,
    Invoice,
    Confirmation,
    Reminder,
}

string_enum!(MessageType, "message_type", {
    Exam => "exam",
    Delivery => "delivery",
    Pickup => "pickup",
    Invoice => "invoice",
    Confirmation => "confirmation",
    Reminder => "reminder",
});

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(1500);
        assert_eq!(rate.bps(), 1500);
        assert!((rate.percentage() - 15.0).abs() < 0.001);
    }

    #[test]
    fn test_sale_status_parse() {
        assert_eq!("lab".parse::<SaleStatus>().unwrap(), SaleStatus::Lab);
        assert_eq!(" completed ".parse::<SaleStatus>().unwrap(), SaleStatus::Completed);
        assert!("shipped".parse::<SaleStatus>().is_err());
    }

    #[test]
    fn test_status_flags() {
        assert!(SaleStatus::Received.stamps_completion());
        assert!(SaleStatus::Completed.stamps_completion());
        assert!(!SaleStatus::Ready.stamps_completion());

        assert!(SaleStatus::Lab.is_open());
        assert!(!SaleStatus::Cancelled.is_open());
    }

    #[test]
    fn test_serde_uses_lowercase() {
        let json = serde_json::to_string(&PaymentMethod::Mada).unwrap();
        assert_eq!(json, "\"mada\"");

        let parsed: MovementType = serde_json::from_str("\"return\"").unwrap();
        assert_eq!(parsed, MovementType::Return);
    }

    #[test]
    fn test_not_allowed_lists_variants() {
        let err = "wire".parse::<PaymentMethod>().unwrap_err();
        match err {
            ValidationError::NotAllowed { field, allowed } => {
                assert_eq!(field, "payment_method");
                assert_eq!(allowed.len(), PaymentMethod::ALL.len());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
