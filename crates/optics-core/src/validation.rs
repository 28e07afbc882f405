//! Input checks shared by every repository.
//!
//! Each validator returns the cleaned value (trimmed text, `None` for blanks)
//! so callers store exactly what was checked. SQLite still enforces UNIQUE,
//! NOT NULL and foreign keys underneath; these checks exist to name the
//! offending field in the error.
//!
//! Report and list filters are the exception: a malformed filter value is
//! dropped, never rejected. See [`parse_filter_date`].

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::{MAX_AMOUNT_CENTS, MAX_ITEM_QUANTITY, MAX_STOCK_LEVEL};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates that a text field is present and not longer than `max`.
///
/// ## Returns
/// The trimmed value.
///
/// ## Example
/// ```rust
/// use optics_core::validation::validate_required;
///
/// assert_eq!(validate_required("name", "  Sara ", 200).unwrap(), "Sara");
/// assert!(validate_required("name", "   ", 200).is_err());
/// ```
pub fn validate_required(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// Normalizes an optional text field: trims it and maps blank to `None`.
pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> ValidationResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        Some(v) => Ok(Some(v.to_string())),
    }
}

/// Validates a customer, supplier or laboratory mobile number.
///
/// ## Rules
/// Nine digits starting with `5` (local Saudi mobile without the leading 0).
///
/// ## Example
/// ```rust
/// use optics_core::validation::validate_customer_phone;
///
/// assert!(validate_customer_phone("512345678").is_ok());
/// assert!(validate_customer_phone("0512345678").is_err());
/// ```
pub fn validate_customer_phone(phone: &str) -> ValidationResult<String> {
    validate_mobile(phone, "5", 9)
}

/// Validates an employee mobile number.
///
/// ## Rules
/// Ten digits starting with `05`.
pub fn validate_employee_phone(phone: &str) -> ValidationResult<String> {
    validate_mobile(phone, "05", 10)
}

fn validate_mobile(phone: &str, prefix: &str, len: usize) -> ValidationResult<String> {
    let phone = phone.trim();

    if phone.is_empty() {
        return Err(ValidationError::Required {
            field: "phone".to_string(),
        });
    }

    if phone.len() != len || !phone.starts_with(prefix) || !phone.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: format!("must be {} digits starting with {}", len, prefix),
        });
    }

    Ok(phone.to_string())
}

/// Validates an optional email address.
///
/// Only the shape `local@domain.tld` is checked.
pub fn validate_email(email: Option<&str>) -> ValidationResult<Option<String>> {
    let email = match optional_text("email", email, 254)? {
        Some(e) => e,
        None => return Ok(None),
    };

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@example.com".to_string(),
        });
    }

    Ok(Some(email))
}

/// Validates a product barcode.
///
/// ## Rules
/// - 1 to 50 characters
/// - Letters, digits and hyphens only
pub fn validate_barcode(barcode: &str) -> ValidationResult<String> {
    let barcode = validate_required("barcode", barcode, 50)?;

    if !barcode.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must contain only letters, numbers and hyphens".to_string(),
        });
    }

    Ok(barcode)
}

/// Validates an optional ten-digit national ID.
pub fn validate_national_id(id: Option<&str>) -> ValidationResult<Option<String>> {
    match optional_text("national_id", id, 10)? {
        Some(v) if v.len() != 10 || !v.chars().all(|c| c.is_ascii_digit()) => {
            Err(ValidationError::InvalidFormat {
                field: "national_id".to_string(),
                reason: "must be 10 digits".to_string(),
            })
        }
        other => Ok(other),
    }
}

/// Validates an attachment file name. Only PDF documents are accepted.
///
/// ## Example
/// ```rust
/// use optics_core::validation::validate_pdf_file_name;
///
/// assert!(validate_pdf_file_name("license.PDF").is_ok());
/// assert!(validate_pdf_file_name("logo.png").is_err());
/// ```
pub fn validate_pdf_file_name(name: &str) -> ValidationResult<String> {
    let name = validate_required("file_name", name, 255)?;

    if !name.to_ascii_lowercase().ends_with(".pdf") || name.len() <= 4 {
        return Err(ValidationError::InvalidFormat {
            field: "file_name".to_string(),
            reason: "only PDF files are allowed".to_string(),
        });
    }

    Ok(name)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a sold quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a stock level typed in by hand (product form, stock count).
///
/// ## Rules
/// - 0..=MAX_STOCK_LEVEL
pub fn validate_stock_level(field: &str, qty: i64) -> ValidationResult<()> {
    if !(0..=MAX_STOCK_LEVEL).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_STOCK_LEVEL,
        });
    }

    Ok(())
}

/// Validates a price in minor units. Zero is allowed (free service).
///
/// ## Rules
/// - 0..=MAX_AMOUNT_CENTS
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_AMOUNT_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT_CENTS,
        });
    }

    Ok(())
}

/// Validates a payment amount in minor units.
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a percentage expressed in basis points (0% to 100%).
pub fn validate_percentage_bps(field: &str, bps: i64) -> ValidationResult<()> {
    if !(0..=10_000).contains(&bps) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

/// Validates an optional customer age.
pub fn validate_age(age: Option<i64>) -> ValidationResult<()> {
    match age {
        Some(a) if !(0..=150).contains(&a) => Err(ValidationError::OutOfRange {
            field: "age".to_string(),
            min: 0,
            max: 150,
        }),
        _ => Ok(()),
    }
}

/// Validates an optional cylinder axis in degrees.
pub fn validate_axis(field: &str, axis: Option<i64>) -> ValidationResult<()> {
    match axis {
        Some(a) if !(0..=180).contains(&a) => Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 180,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Filters
// =============================================================================

/// Parses an optional `YYYY-MM-DD` filter value.
///
/// Invalid input yields `None` so that list and report pages keep working
/// with the filter dropped.
///
/// ## Example
/// ```rust
/// use optics_core::validation::parse_filter_date;
///
/// assert!(parse_filter_date(Some("2025-03-01")).is_some());
/// assert!(parse_filter_date(Some("01/03/2025")).is_none());
/// assert!(parse_filter_date(None).is_none());
/// ```
pub fn parse_filter_date(value: Option<&str>) -> Option<NaiveDate> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok())
}

/// Parses an optional enum filter, dropping unknown values.
pub fn parse_filter<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SaleStatus;

    #[test]
    fn test_validate_required() {
        assert_eq!(validate_required("name", " Ali ", 10).unwrap(), "Ali");
        assert!(validate_required("name", "", 10).is_err());
        assert!(validate_required("name", &"a".repeat(11), 10).is_err());
    }

    #[test]
    fn test_optional_text_blank_is_none() {
        assert_eq!(optional_text("notes", Some("   "), 10).unwrap(), None);
        assert_eq!(optional_text("notes", None, 10).unwrap(), None);
        assert_eq!(optional_text("notes", Some(" x "), 10).unwrap(), Some("x".to_string()));
    }

    #[test]
    fn test_customer_phone() {
        assert!(validate_customer_phone("512345678").is_ok());
        assert!(validate_customer_phone("412345678").is_err());
        assert!(validate_customer_phone("51234567").is_err());
        assert!(validate_customer_phone("51234567a").is_err());
        assert!(validate_customer_phone("").is_err());
    }

    #[test]
    fn test_employee_phone() {
        assert!(validate_employee_phone("0512345678").is_ok());
        assert!(validate_employee_phone("512345678").is_err());
        assert!(validate_employee_phone("0612345678").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email(None).unwrap(), None);
        assert_eq!(validate_email(Some("")).unwrap(), None);
        assert!(validate_email(Some("a@b.sa")).unwrap().is_some());
        assert!(validate_email(Some("nobody")).is_err());
        assert!(validate_email(Some("a@b")).is_err());
        assert!(validate_email(Some("@b.sa")).is_err());
    }

    #[test]
    fn test_validate_barcode() {
        assert!(validate_barcode("6281234567890").is_ok());
        assert!(validate_barcode("RB-3025").is_ok());
        assert!(validate_barcode("has space").is_err());
        assert!(validate_barcode("").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_pdf_only() {
        assert!(validate_pdf_file_name("cr.pdf").is_ok());
        assert!(validate_pdf_file_name(".pdf").is_err());
        assert!(validate_pdf_file_name("photo.jpg").is_err());
    }

    #[test]
    fn test_national_id() {
        assert_eq!(validate_national_id(None).unwrap(), None);
        assert!(validate_national_id(Some("1234567890")).is_ok());
        assert!(validate_national_id(Some("12345")).is_err());
    }

    #[test]
    fn test_ranges() {
        assert!(validate_percentage_bps("percentage", 250).is_ok());
        assert!(validate_percentage_bps("percentage", 10_001).is_err());
        assert!(validate_age(Some(151)).is_err());
        assert!(validate_axis("right_axis", Some(180)).is_ok());
        assert!(validate_axis("right_axis", Some(181)).is_err());
        assert!(validate_stock_level("quantity", -1).is_err());
        assert!(validate_stock_level("quantity", MAX_STOCK_LEVEL).is_ok());
        assert!(validate_stock_level("quantity", MAX_STOCK_LEVEL + 1).is_err());
    }

    #[test]
    fn test_price_bounds() {
        assert!(validate_price_cents("unit_price", 0).is_ok());
        assert!(validate_price_cents("unit_price", MAX_AMOUNT_CENTS).is_ok());
        assert!(validate_price_cents("unit_price", -1).is_err());
        assert!(matches!(
            validate_price_cents("unit_price", i64::MAX / 2),
            Err(ValidationError::OutOfRange { max: MAX_AMOUNT_CENTS, .. })
        ));
    }

    #[test]
    fn test_invalid_filters_are_dropped() {
        assert_eq!(
            parse_filter_date(Some("2025-02-28")),
            NaiveDate::from_ymd_opt(2025, 2, 28)
        );
        assert_eq!(parse_filter_date(Some("2025-02-30")), None);
        assert_eq!(parse_filter_date(Some("")), None);

        assert_eq!(parse_filter::<SaleStatus>(Some("ready")), Some(SaleStatus::Ready));
        assert_eq!(parse_filter::<SaleStatus>(Some("bogus")), None);
    }
}
