//! # Inventory Ledger Types
//!
//! Products, categories, suppliers, laboratories and the stock movement log.
//!
//! ## Quantity Changes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every quantity change produces exactly one StockMovement row            │
//! │                                                                         │
//! │  sale created      ──► out         previous − qty                       │
//! │  sale deleted      ──► return      previous + qty                       │
//! │  credit note       ──► return      previous + qty                       │
//! │  manual in/return  ──► in/return   previous + qty                       │
//! │  manual out        ──► out         previous − qty                       │
//! │  count / edit      ──► adjustment  set to qty                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Quantity is not clamped at zero: selling stock the shop does not have
//! drives it negative and the shelf count is corrected later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::invoice::percentage_of;
use crate::money::Money;
use crate::types::MovementType;

// =============================================================================
// Product
// =============================================================================

/// A stocked item (frame, lens, solution, accessory).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub item_name: String,
    pub barcode: String,
    pub sku: Option<String>,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub supplier_id: Option<String>,
    pub supplier_name: Option<String>,
    pub quantity: i64,
    /// Low stock threshold.
    pub min_quantity: i64,
    /// Shelf/box location in the store room.
    pub box_number: Option<String>,
    pub cost_price_cents: i64,
    pub selling_price_cents: i64,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// `0 < quantity ≤ min_quantity`.
    pub fn is_low_stock(&self) -> bool {
        self.quantity > 0 && self.quantity <= self.min_quantity
    }

    /// Exactly zero. Negative stock is neither low nor out.
    pub fn is_out_of_stock(&self) -> bool {
        self.quantity == 0
    }

    pub fn stock_status(&self) -> StockStatus {
        if self.is_out_of_stock() {
            StockStatus::Out
        } else if self.is_low_stock() {
            StockStatus::Low
        } else {
            StockStatus::Available
        }
    }

    /// Profit per unit.
    pub fn profit_amount(&self) -> Money {
        Money::from_cents(self.selling_price_cents - self.cost_price_cents)
    }

    /// `(sell − cost) / cost × 100`, or 0 when cost is 0.
    pub fn profit_margin(&self) -> f64 {
        percentage_of(self.profit_amount(), Money::from_cents(self.cost_price_cents))
    }

    pub fn total_cost_value(&self) -> Money {
        Money::from_cents(self.cost_price_cents.saturating_mul(self.quantity))
    }

    pub fn total_selling_value(&self) -> Money {
        Money::from_cents(self.selling_price_cents.saturating_mul(self.quantity))
    }

    /// Wraps the product with its derived read-time fields.
    pub fn into_view(self) -> ProductView {
        ProductView {
            is_low_stock: self.is_low_stock(),
            is_out_of_stock: self.is_out_of_stock(),
            stock_status: self.stock_status(),
            profit_margin: self.profit_margin(),
            profit_amount_cents: self.profit_amount().cents(),
            total_cost_value_cents: self.total_cost_value().cents(),
            total_selling_value_cents: self.total_selling_value().cents(),
            product: self,
        }
    }
}

/// A product as the UI sees it: stored fields plus derived ones.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub is_low_stock: bool,
    pub is_out_of_stock: bool,
    pub stock_status: StockStatus,
    pub profit_margin: f64,
    pub profit_amount_cents: i64,
    pub total_cost_value_cents: i64,
    pub total_selling_value_cents: i64,
}

/// Stock level bucket, also used as a list filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    /// `0 < quantity ≤ min_quantity`
    Low,
    /// `quantity == 0`
    Out,
    /// Anything else, including negative counts.
    #[serde(rename = "in")]
    Available,
}

impl std::str::FromStr for StockStatus {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "low" => Ok(StockStatus::Low),
            "out" => Ok(StockStatus::Out),
            "in" => Ok(StockStatus::Available),
            _ => Err(crate::error::ValidationError::NotAllowed {
                field: "stock_status".to_string(),
                allowed: vec!["low".to_string(), "out".to_string(), "in".to_string()],
            }),
        }
    }
}

// =============================================================================
// Category
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Icon class name shown in the UI.
    pub icon: String,
    /// `#RRGGBB`
    pub color: String,
    pub is_active: bool,
    /// Active products in this category.
    pub products_count: i64,
    /// Units on hand across those products.
    pub total_quantity: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

pub const DEFAULT_CATEGORY_ICON: &str = "fas fa-cube";
pub const DEFAULT_CATEGORY_COLOR: &str = "#4A9EAD";

// =============================================================================
// Suppliers & Laboratories
// =============================================================================

/// Which partner table a [`Partner`] row comes from.
///
/// Suppliers deliver stock; laboratories grind lenses for invoices. Both
/// carry the same contact card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PartnerKind {
    Supplier,
    Laboratory,
}

impl PartnerKind {
    pub const fn sequence(&self) -> crate::numbering::Sequence {
        match self {
            PartnerKind::Supplier => crate::numbering::Sequence::Supplier,
            PartnerKind::Laboratory => crate::numbering::Sequence::Laboratory,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            PartnerKind::Supplier => "Supplier",
            PartnerKind::Laboratory => "Laboratory",
        }
    }
}

/// A supplier or a laboratory.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Partner {
    pub id: String,
    /// `SUP-0001` or `LAB-0001`.
    pub code: String,
    pub company_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub representative_name: Option<String>,
    pub representative_phone: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    /// Active products (suppliers) or invoices (laboratories) linked to it.
    pub linked_count: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Append-only audit row for one quantity change.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    /// Free text, usually the invoice number.
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Computes the quantity after a movement.
///
/// `quantity` is always the positive amount entered by the user; the
/// movement type decides the direction. For `adjustment` it is the counted
/// shelf quantity.
///
/// ```rust
/// use optics_core::inventory::apply_movement;
/// use optics_core::types::MovementType;
///
/// assert_eq!(apply_movement(10, MovementType::Out, 3), 7);
/// assert_eq!(apply_movement(10, MovementType::Adjustment, 4), 4);
/// ```
pub fn apply_movement(previous: i64, movement_type: MovementType, quantity: i64) -> i64 {
    match movement_type {
        MovementType::In | MovementType::Return => previous.saturating_add(quantity),
        MovementType::Out => previous.saturating_sub(quantity),
        MovementType::Adjustment => quantity,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(quantity: i64, min: i64, cost: i64, sell: i64) -> Product {
        let now = Utc::now();
        Product {
            id: "p1".to_string(),
            item_name: "Ray-Ban frame".to_string(),
            barcode: "RB-001".to_string(),
            sku: None,
            category_id: None,
            category_name: None,
            supplier_id: None,
            supplier_name: None,
            quantity,
            min_quantity: min,
            box_number: None,
            cost_price_cents: cost,
            selling_price_cents: sell,
            description: None,
            notes: None,
            is_active: true,
            is_featured: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_stock_flags() {
        assert!(product(3, 5, 0, 0).is_low_stock());
        assert!(product(5, 5, 0, 0).is_low_stock());
        assert!(!product(6, 5, 0, 0).is_low_stock());

        let empty = product(0, 5, 0, 0);
        assert!(empty.is_out_of_stock());
        assert!(!empty.is_low_stock());
        assert_eq!(empty.stock_status(), StockStatus::Out);

        let oversold = product(-2, 5, 0, 0);
        assert!(!oversold.is_out_of_stock());
        assert!(!oversold.is_low_stock());
    }

    #[test]
    fn test_margins_and_values() {
        let p = product(4, 5, 10000, 15000);
        assert_eq!(p.profit_amount().cents(), 5000);
        assert!((p.profit_margin() - 50.0).abs() < 1e-9);
        assert_eq!(p.total_cost_value().cents(), 40000);
        assert_eq!(p.total_selling_value().cents(), 60000);

        let free = product(1, 5, 0, 15000);
        assert_eq!(free.profit_margin(), 0.0);
    }

    #[test]
    fn test_view_serializes_flat() {
        let json = serde_json::to_value(product(2, 5, 100, 150).into_view()).unwrap();
        assert_eq!(json["item_name"], "Ray-Ban frame");
        assert_eq!(json["is_low_stock"], true);
        assert_eq!(json["stock_status"], "low");
    }

    #[test]
    fn test_apply_movement() {
        assert_eq!(apply_movement(0, MovementType::Out, 2), -2);
        assert_eq!(apply_movement(-2, MovementType::Return, 2), 0);
        assert_eq!(apply_movement(7, MovementType::In, 5), 12);
        assert_eq!(apply_movement(7, MovementType::Adjustment, 0), 0);
    }

    #[test]
    fn test_stock_status_filter_parse() {
        assert_eq!("low".parse::<StockStatus>().unwrap(), StockStatus::Low);
        assert_eq!("in".parse::<StockStatus>().unwrap(), StockStatus::Available);
        assert!("none".parse::<StockStatus>().is_err());
    }
}
