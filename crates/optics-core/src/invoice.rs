//! # Invoice Engine (pure part)
//!
//! Invoice rows and every calculation the invoice lifecycle needs. The
//! database layer calls into this module so that totals, balances and
//! payment checks have exactly one definition.
//!
//! ## Invoice Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Invoice Lifecycle                                │
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     lines ──► checked_subtotal() ──► InvoiceTotals::for_lines()        │
//! │                                 subtotal, 15% VAT, total               │
//! │     optional initial payment ──► check_payment()                       │
//! │                                                                         │
//! │  2. EDIT (status, dates, notes)                                        │
//! │     Sale::set_status() stamps completed_date on received/completed     │
//! │                                                                         │
//! │  3. PAY                                                                │
//! │     check_payment(amount, total, paid) ──► paid += amount              │
//! │                                                                         │
//! │  4. NOTES                                                              │
//! │     credit: InvoiceTotals::negated()   debit: for_amount()             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Save-time invariants
//! - `total = subtotal − discount + tax`, always recomputed from the three
//!   stored fields, never from the line items.
//! - `item.total_price = quantity × unit_price`, always recomputed.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{PaymentMethod, PaymentStatus, SaleStatus, TaxRate};
use crate::validation::{validate_payment_amount, validate_price_cents, validate_quantity};
use crate::MAX_AMOUNT_CENTS;

// =============================================================================
// Sale
// =============================================================================

/// An invoice header.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// `INV-00001`, `CN-INV-00001`, `DN-INV-00001`.
    pub order_number: String,
    pub customer_id: String,
    pub laboratory_id: Option<String>,
    pub status: SaleStatus,
    #[ts(as = "String")]
    pub order_date: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub delivery_date: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub completed_date: Option<DateTime<Utc>>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub paid_cents: i64,
    pub notes: Option<String>,
    pub prescription_notes: Option<String>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    /// Returns `total − paid`.
    pub fn remaining(&self) -> Money {
        self.total() - self.paid()
    }

    /// True once payments cover the total.
    pub fn is_paid(&self) -> bool {
        self.paid() >= self.total()
    }

    pub fn payment_status(&self) -> PaymentStatus {
        payment_status(self.paid(), self.total())
    }

    /// Recomputes `total_cents` from subtotal, discount and tax.
    ///
    /// Called before every write of the header.
    pub fn recompute_total(&mut self) {
        let totals = InvoiceTotals::from_parts(
            Money::from_cents(self.subtotal_cents),
            Money::from_cents(self.discount_cents),
            Money::from_cents(self.tax_cents),
        );
        self.total_cents = totals.total.cents();
    }

    /// Applies a status change from the edit form.
    ///
    /// Any status may follow any other. Moving to `received` or `completed`
    /// stamps `completed_date` unless it is already set.
    pub fn set_status(&mut self, status: SaleStatus, now: DateTime<Utc>) {
        self.status = status;
        if status.stamps_completion() && self.completed_date.is_none() {
            self.completed_date = Some(now);
        }
    }

    /// True for credit (`CN-`) and debit (`DN-`) notes.
    pub fn is_note(&self) -> bool {
        crate::numbering::is_note_number(&self.order_number)
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// One invoice line: a product or a free-text service.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    /// Set for product lines.
    pub product_id: Option<String>,
    /// Set for service lines (eye test, fitting, lens coating...).
    pub service_name: Option<String>,
    /// Negative on credit-note lines.
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub total_price_cents: i64,
    pub prescription_right: Option<String>,
    pub prescription_left: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Recomputes `total_price_cents = quantity × unit_price_cents`.
    pub fn recompute_total(&mut self) {
        self.total_price_cents = line_total(self.quantity, Money::from_cents(self.unit_price_cents)).cents();
    }

    /// Display name: the service name, or the given product name.
    pub fn label<'a>(&'a self, product_name: Option<&'a str>) -> &'a str {
        self.service_name
            .as_deref()
            .or(product_name)
            .unwrap_or("-")
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment applied against an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    pub amount_cents: i64,
    pub payment_method: PaymentMethod,
    #[ts(as = "String")]
    pub payment_date: DateTime<Utc>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Service Catalog
// =============================================================================

/// A sellable service (eye exam, frame adjustment, lens tinting...).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Service {
    pub id: String,
    pub service_code: String,
    pub service_name: String,
    pub cost_cents: i64,
    pub price_cents: i64,
    pub is_active: bool,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Service {
    /// `price − cost`.
    pub fn profit(&self) -> Money {
        Money::from_cents(self.price_cents - self.cost_cents)
    }

    /// Profit as a percentage of cost; zero when the service costs nothing.
    pub fn profit_percentage(&self) -> f64 {
        percentage_of(self.profit(), Money::from_cents(self.cost_cents))
    }
}

// =============================================================================
// Totals
// =============================================================================

/// The four money fields of an invoice header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
}

impl InvoiceTotals {
    /// Builds totals from stored fields: `total = subtotal − discount + tax`.
    ///
    /// ## Example
    /// ```rust
    /// use optics_core::invoice::InvoiceTotals;
    /// use optics_core::Money;
    ///
    /// let t = InvoiceTotals::from_parts(
    ///     Money::from_cents(10000),
    ///     Money::zero(),
    ///     Money::from_cents(1500),
    /// );
    /// assert_eq!(t.total.cents(), 11500);
    /// ```
    pub fn from_parts(subtotal: Money, discount: Money, tax: Money) -> Self {
        InvoiceTotals {
            subtotal,
            discount,
            tax,
            total: subtotal - discount + tax,
        }
    }

    /// Builds totals for a new invoice.
    ///
    /// Tax is charged on the subtotal before discount.
    pub fn for_lines<I>(line_totals: I, discount: Money, rate: TaxRate) -> Self
    where
        I: IntoIterator<Item = Money>,
    {
        let subtotal: Money = line_totals.into_iter().sum();
        let tax = subtotal.calculate_tax(rate);
        InvoiceTotals::from_parts(subtotal, discount, tax)
    }

    /// Builds totals for a debit note of `amount` (no discount).
    pub fn for_amount(amount: Money, rate: TaxRate) -> Self {
        InvoiceTotals::from_parts(amount, Money::zero(), amount.calculate_tax(rate))
    }

    /// Totals of a credit note reversing these totals.
    pub fn negated(&self) -> Self {
        InvoiceTotals::from_parts(-self.subtotal, -self.discount, -self.tax)
    }
}

/// `quantity × unit_price`.
#[inline]
pub fn line_total(quantity: i64, unit_price: Money) -> Money {
    unit_price.multiply_quantity(quantity)
}

/// Derives the payment status.
///
/// ## Rules
/// ```text
/// paid == 0          → unpaid
/// 0 < paid < total   → partial
/// paid ≥ total       → paid
/// ```
pub fn payment_status(paid: Money, total: Money) -> PaymentStatus {
    if paid.is_zero() {
        PaymentStatus::Unpaid
    } else if paid < total {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Paid
    }
}

/// Checks a payment against the outstanding balance.
///
/// ## Errors
/// - `InvalidPaymentAmount` when `amount` is not positive
/// - `PaymentExceedsBalance` when `amount > total − paid`
pub fn check_payment(amount: Money, total: Money, paid: Money) -> CoreResult<()> {
    validate_payment_amount(amount.cents()).map_err(|e| CoreError::InvalidPaymentAmount {
        reason: e.to_string(),
    })?;

    let remaining = total - paid;
    if amount > remaining {
        return Err(CoreError::PaymentExceedsBalance {
            remaining,
            requested: amount,
        });
    }

    Ok(())
}

/// `part / whole × 100`, or 0 when `whole` is not positive.
pub fn percentage_of(part: Money, whole: Money) -> f64 {
    if whole.is_positive() {
        part.cents() as f64 / whole.cents() as f64 * 100.0
    } else {
        0.0
    }
}

// =============================================================================
// New Invoice Input
// =============================================================================

/// A product line as submitted by the invoice form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    #[serde(default)]
    pub prescription_right: Option<String>,
    #[serde(default)]
    pub prescription_left: Option<String>,
}

/// A service line as submitted by the invoice form. Quantity is always 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLine {
    pub service_name: String,
    pub price_cents: i64,
}

/// Validates the lines and money fields of a new invoice and returns its
/// totals.
///
/// ## Rules
/// - at least one product or service
/// - product quantities 1..=999, prices ≥ 0, discount ≥ 0 and ≤ subtotal
/// - the initial payment, if any, may not exceed the total
///
/// Stock levels are deliberately not consulted: selling from an empty
/// shelf drives the product quantity negative.
pub fn price_new_invoice(
    products: &[ProductLine],
    services: &[ServiceLine],
    discount: Money,
    initial_payment: Money,
    rate: TaxRate,
) -> CoreResult<InvoiceTotals> {
    if products.is_empty() && services.is_empty() {
        return Err(CoreError::EmptyInvoice);
    }

    for line in products {
        validate_quantity(line.quantity)?;
        validate_price_cents("unit_price", line.unit_price_cents)?;
    }
    for line in services {
        validate_price_cents("service price", line.price_cents)?;
    }
    validate_price_cents("discount", discount.cents())?;
    validate_price_cents("paid_amount", initial_payment.cents())?;

    let subtotal = checked_subtotal(products, services)?;
    let totals = InvoiceTotals::for_lines([subtotal], discount, rate);

    if totals.discount > totals.subtotal {
        return Err(CoreError::DiscountExceedsSubtotal {
            discount: totals.discount,
            subtotal: totals.subtotal,
        });
    }

    if initial_payment.is_positive() {
        check_payment(initial_payment, totals.total, Money::zero())?;
    }

    Ok(totals)
}

/// Sum of the lines, rejected once it passes [`MAX_AMOUNT_CENTS`].
///
/// The cap leaves room for VAT on top, so the invoice total cannot
/// overflow either.
fn checked_subtotal(products: &[ProductLine], services: &[ServiceLine]) -> CoreResult<Money> {
    let too_large = || ValidationError::OutOfRange {
        field: "subtotal".to_string(),
        min: 0,
        max: MAX_AMOUNT_CENTS,
    };

    let lines = products
        .iter()
        .map(|l| Money::from_cents(l.unit_price_cents).checked_multiply_quantity(l.quantity))
        .chain(services.iter().map(|s| Some(Money::from_cents(s.price_cents))));

    let mut subtotal = Money::zero();
    for line in lines {
        subtotal = line
            .and_then(|line| subtotal.checked_add(line))
            .filter(|sum| sum.cents() <= MAX_AMOUNT_CENTS)
            .ok_or_else(too_large)?;
    }
    Ok(subtotal)
}

/// Text encoded in the QR code printed on a tax invoice: seller, VAT
/// number, timestamp, total and VAT, one per line.
pub fn receipt_qr_text(seller: &str, tax_number: &str, issued_at: DateTime<Utc>, total: Money, tax: Money) -> String {
    format!(
        "Seller: {}\nVAT Number: {}\nDate: {}\nTotal: {}\nVAT: {}",
        seller,
        tax_number,
        issued_at.format("%Y-%m-%d %H:%M"),
        total,
        tax
    )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VAT_RATE;

    fn sale(subtotal: i64, discount: i64, tax: i64, paid: i64) -> Sale {
        let now = Utc::now();
        let mut s = Sale {
            id: "s1".to_string(),
            order_number: "INV-00001".to_string(),
            customer_id: "c1".to_string(),
            laboratory_id: None,
            status: SaleStatus::Created,
            order_date: now,
            delivery_date: None,
            completed_date: None,
            subtotal_cents: subtotal,
            discount_cents: discount,
            tax_cents: tax,
            total_cents: 0,
            payment_method: PaymentMethod::Cash,
            paid_cents: paid,
            notes: None,
            prescription_notes: None,
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        s.recompute_total();
        s
    }

    #[test]
    fn test_hundred_plus_vat_is_one_fifteen() {
        let totals = InvoiceTotals::for_lines([Money::from_cents(10000)], Money::zero(), VAT_RATE);
        assert_eq!(totals.subtotal.cents(), 10000);
        assert_eq!(totals.tax.cents(), 1500);
        assert_eq!(totals.total.cents(), 11500);
    }

    #[test]
    fn test_recompute_total_ignores_stale_total() {
        let mut s = sale(10000, 1000, 1500, 0);
        assert_eq!(s.total_cents, 10500);

        s.total_cents = 1;
        s.recompute_total();
        assert_eq!(s.total_cents, 10500);
    }

    #[test]
    fn test_item_total_recomputed() {
        let mut item = SaleItem {
            id: "i1".to_string(),
            sale_id: "s1".to_string(),
            product_id: Some("p1".to_string()),
            service_name: None,
            quantity: 3,
            unit_price_cents: 2500,
            total_price_cents: 0,
            prescription_right: None,
            prescription_left: None,
            created_at: Utc::now(),
        };
        item.recompute_total();
        assert_eq!(item.total_price_cents, 7500);

        item.quantity = -3;
        item.recompute_total();
        assert_eq!(item.total_price_cents, -7500);
    }

    #[test]
    fn test_balance_and_status() {
        let unpaid = sale(10000, 0, 1500, 0);
        assert_eq!(unpaid.remaining().cents(), 11500);
        assert_eq!(unpaid.payment_status(), PaymentStatus::Unpaid);
        assert!(!unpaid.is_paid());

        let partial = sale(10000, 0, 1500, 5000);
        assert_eq!(partial.payment_status(), PaymentStatus::Partial);

        let paid = sale(10000, 0, 1500, 11500);
        assert_eq!(paid.payment_status(), PaymentStatus::Paid);
        assert!(paid.is_paid());
        assert!(paid.remaining().is_zero());
    }

    #[test]
    fn test_check_payment() {
        let total = Money::from_cents(11500);
        let paid = Money::from_cents(10000);

        assert!(check_payment(Money::from_cents(1500), total, paid).is_ok());
        assert!(matches!(
            check_payment(Money::from_cents(1501), total, paid),
            Err(CoreError::PaymentExceedsBalance { .. })
        ));
        assert!(matches!(
            check_payment(Money::zero(), total, paid),
            Err(CoreError::InvalidPaymentAmount { .. })
        ));
    }

    #[test]
    fn test_set_status_stamps_completion_once() {
        let mut s = sale(100, 0, 15, 0);
        let first = Utc::now();

        s.set_status(SaleStatus::Lab, first);
        assert!(s.completed_date.is_none());

        s.set_status(SaleStatus::Received, first);
        assert_eq!(s.completed_date, Some(first));

        let later = first + chrono::Duration::hours(2);
        s.set_status(SaleStatus::Completed, later);
        assert_eq!(s.completed_date, Some(first));

        // Any transition is allowed, including backwards
        s.set_status(SaleStatus::Created, later);
        assert_eq!(s.status, SaleStatus::Created);
    }

    #[test]
    fn test_credit_note_totals() {
        let original = InvoiceTotals::from_parts(
            Money::from_cents(20000),
            Money::from_cents(2000),
            Money::from_cents(3000),
        );
        let credit = original.negated();
        assert_eq!(credit.subtotal.cents(), -20000);
        assert_eq!(credit.discount.cents(), -2000);
        assert_eq!(credit.tax.cents(), -3000);
        assert_eq!(credit.total.cents(), -original.total.cents());
    }

    #[test]
    fn test_debit_note_totals() {
        let debit = InvoiceTotals::for_amount(Money::from_cents(5000), VAT_RATE);
        assert_eq!(debit.tax.cents(), 750);
        assert_eq!(debit.total.cents(), 5750);
    }

    #[test]
    fn test_price_new_invoice() {
        let products = vec![ProductLine {
            product_id: "p1".to_string(),
            quantity: 2,
            unit_price_cents: 4000,
            prescription_right: None,
            prescription_left: None,
        }];
        let services = vec![ServiceLine {
            service_name: "Eye test".to_string(),
            price_cents: 2000,
        }];

        let totals = price_new_invoice(&products, &services, Money::zero(), Money::zero(), VAT_RATE).unwrap();
        assert_eq!(totals.subtotal.cents(), 10000);
        assert_eq!(totals.total.cents(), 11500);
    }

    #[test]
    fn test_price_new_invoice_rejections() {
        assert!(matches!(
            price_new_invoice(&[], &[], Money::zero(), Money::zero(), VAT_RATE),
            Err(CoreError::EmptyInvoice)
        ));

        let services = vec![ServiceLine {
            service_name: "Fitting".to_string(),
            price_cents: 1000,
        }];
        assert!(matches!(
            price_new_invoice(&[], &services, Money::from_cents(1001), Money::zero(), VAT_RATE),
            Err(CoreError::DiscountExceedsSubtotal { .. })
        ));
        assert!(matches!(
            price_new_invoice(&[], &services, Money::zero(), Money::from_cents(1151), VAT_RATE),
            Err(CoreError::PaymentExceedsBalance { .. })
        ));
    }

    #[test]
    fn test_oversized_invoice_is_rejected_not_wrapped() {
        let frame = |unit_price_cents| ProductLine {
            product_id: "p1".to_string(),
            quantity: 3,
            unit_price_cents,
            prescription_right: None,
            prescription_left: None,
        };

        assert!(matches!(
            price_new_invoice(&[frame(i64::MAX / 2)], &[], Money::zero(), Money::zero(), VAT_RATE),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        // Each line is within bounds; together they pass the invoice cap.
        let lines = vec![frame(MAX_AMOUNT_CENTS); 2];
        assert!(matches!(
            price_new_invoice(&lines, &[], Money::zero(), Money::zero(), VAT_RATE),
            Err(CoreError::Validation(ValidationError::OutOfRange { ref field, .. })) if field == "subtotal"
        ));

        let lines = vec![frame(MAX_AMOUNT_CENTS / 3)];
        let totals = price_new_invoice(&lines, &[], Money::zero(), Money::zero(), VAT_RATE).unwrap();
        assert_eq!(totals.total, totals.subtotal + totals.tax);
    }

    #[test]
    fn test_receipt_qr_text() {
        let at = DateTime::parse_from_rfc3339("2025-02-01T10:30:00Z").unwrap().with_timezone(&Utc);
        let text = receipt_qr_text("Modern Optics", "300000000000003", at, Money::from_cents(11500), Money::from_cents(1500));
        assert_eq!(
            text,
            "Seller: Modern Optics\nVAT Number: 300000000000003\nDate: 2025-02-01 10:30\nTotal: SAR 115.00\nVAT: SAR 15.00"
        );
    }

    #[test]
    fn test_service_profit() {
        let svc = Service {
            id: "x".to_string(),
            service_code: "SRV-1".to_string(),
            service_name: "Tint".to_string(),
            cost_cents: 2000,
            price_cents: 5000,
            is_active: true,
            description: None,
            created_at: Utc::now(),
        };
        assert_eq!(svc.profit().cents(), 3000);
        assert!((svc.profit_percentage() - 150.0).abs() < 1e-9);
    }
}
