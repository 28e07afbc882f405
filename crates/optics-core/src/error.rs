//! Domain errors.
//!
//! [`ValidationError`] rejects malformed input before any write happens.
//! [`CoreError`] rejects well-formed requests that break a shop rule, such as
//! overpaying an invoice or crediting a credit note. Both render as messages
//! the counter staff can act on; `optics-db` wraps them in `DbError::Domain`
//! and the server maps each variant to an error code.

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A payment would take the invoice past its total.
    ///
    /// ## When This Occurs
    /// ```text
    /// Invoice total 1150.00, paid 1000.00 → remaining 150.00
    ///      │
    ///      ▼
    /// add_payment(200.00)
    ///      │
    ///      ▼
    /// PaymentExceedsBalance { remaining: 150.00, requested: 200.00 }
    ///      │
    ///      ▼
    /// paid_amount is left untouched
    /// ```
    #[error("Payment of {requested} exceeds the remaining balance of {remaining}")]
    PaymentExceedsBalance { remaining: Money, requested: Money },

    /// Payment amount is zero or negative.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// An invoice was submitted without products or services.
    #[error("An invoice needs at least one product or service")]
    EmptyInvoice,

    /// Discount larger than the invoice subtotal.
    #[error("Discount {discount} exceeds subtotal {subtotal}")]
    DiscountExceedsSubtotal { discount: Money, subtotal: Money },

    /// A note (credit/debit) was requested for an invoice that is itself a note.
    ///
    /// ## When This Occurs
    /// - Issuing a credit note for `CN-INV-00001`
    /// - Issuing a debit note for `DN-INV-00001`
    #[error("{order_number} is already a credit or debit note")]
    NoteOfNote { order_number: String },

    /// Record still referenced by other records.
    ///
    /// ## When This Occurs
    /// - Deleting a customer who has invoices
    /// - Deleting a category that still has products
    #[error("{entity} is still in use by {count} {dependents}")]
    InUse {
        entity: String,
        count: i64,
        dependents: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when user input doesn't meet requirements and are raised
/// before anything touches the database.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., phone, UUID, file extension).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., duplicate phone or barcode).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_error_message() {
        let err = CoreError::PaymentExceedsBalance {
            remaining: Money::from_cents(15000),
            requested: Money::from_cents(20000),
        };
        assert_eq!(
            err.to_string(),
            "Payment of SAR 200.00 exceeds the remaining balance of SAR 150.00"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "phone".to_string(),
        };
        assert_eq!(err.to_string(), "phone is required");

        let err = ValidationError::Duplicate {
            field: "phone".to_string(),
            value: "512345678".to_string(),
        };
        assert_eq!(err.to_string(), "phone '512345678' already exists");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::Required {
            field: "name".to_string(),
        }
        .into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
