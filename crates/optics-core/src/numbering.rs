//! Human-readable business numbers.
//!
//! Every entity keeps a UUID primary key; the numbers here are what staff
//! read on screen and print on paper. The counters themselves live in the
//! `number_sequences` table and are advanced atomically by optics-db; this
//! module only formats them.
//!
//! ```text
//! Sale        INV-00001   (5 digits)
//! Customer    C-001       (3 digits)
//! Supplier    SUP-0001    (4 digits)
//! Laboratory  LAB-0001    (4 digits)
//! Credit note CN-<original order number>
//! Debit note  DN-<original order number>
//! ```
//!
//! Padding is a minimum width; counters past the width simply grow.

use serde::{Deserialize, Serialize};

const CREDIT_NOTE_PREFIX: &str = "CN-";
const DEBIT_NOTE_PREFIX: &str = "DN-";

/// A numbered series backed by one `number_sequences` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sequence {
    Sale,
    Customer,
    Supplier,
    Laboratory,
}

impl Sequence {
    /// Primary key of the counter row.
    pub const fn key(&self) -> &'static str {
        match self {
            Sequence::Sale => "sale",
            Sequence::Customer => "customer",
            Sequence::Supplier => "supplier",
            Sequence::Laboratory => "laboratory",
        }
    }

    const fn prefix(&self) -> &'static str {
        match self {
            Sequence::Sale => "INV",
            Sequence::Customer => "C",
            Sequence::Supplier => "SUP",
            Sequence::Laboratory => "LAB",
        }
    }

    const fn width(&self) -> usize {
        match self {
            Sequence::Sale => 5,
            Sequence::Customer => 3,
            Sequence::Supplier | Sequence::Laboratory => 4,
        }
    }

    /// Formats counter value `n`.
    ///
    /// ```rust
    /// use optics_core::numbering::Sequence;
    ///
    /// assert_eq!(Sequence::Sale.format(1), "INV-00001");
    /// assert_eq!(Sequence::Customer.format(42), "C-042");
    /// ```
    pub fn format(&self, n: i64) -> String {
        format!("{}-{:0width$}", self.prefix(), n, width = self.width())
    }
}

/// Order number of the credit note that reverses `order_number`.
pub fn credit_note_number(order_number: &str) -> String {
    format!("{CREDIT_NOTE_PREFIX}{order_number}")
}

/// Order number of a debit note raised against `order_number`.
pub fn debit_note_number(order_number: &str) -> String {
    format!("{DEBIT_NOTE_PREFIX}{order_number}")
}

/// True for credit and debit note numbers.
pub fn is_note_number(order_number: &str) -> bool {
    order_number.starts_with(CREDIT_NOTE_PREFIX) || order_number.starts_with(DEBIT_NOTE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formats() {
        assert_eq!(Sequence::Sale.format(2), "INV-00002");
        assert_eq!(Sequence::Customer.format(1), "C-001");
        assert_eq!(Sequence::Supplier.format(12), "SUP-0012");
        assert_eq!(Sequence::Laboratory.format(3), "LAB-0003");
    }

    #[test]
    fn test_width_is_a_minimum() {
        assert_eq!(Sequence::Customer.format(1234), "C-1234");
    }

    #[test]
    fn test_notes() {
        assert_eq!(credit_note_number("INV-00001"), "CN-INV-00001");
        assert_eq!(debit_note_number("INV-00001"), "DN-INV-00001");
        assert!(is_note_number("CN-INV-00001"));
        assert!(is_note_number("DN-INV-00007"));
        assert!(!is_note_number("INV-00001"));
    }
}
