//! # Customer Directory Types
//!
//! Customers, their eye exams and the notification log.
//!
//! ```text
//! Customer (C-001)
//!   ├── EyeExam*        newest exam_date first, deleted with the customer
//!   ├── Notification*   log only, nothing is actually sent
//!   └── Sale*           RESTRICT: a customer with invoices cannot be deleted
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{Gender, MessageType, NotificationChannel};

// =============================================================================
// Customer
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    /// `C-001`
    pub customer_code: String,
    pub name: String,
    /// Nine digits starting with 5, unique.
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub gender: Gender,
    pub age: Option<i64>,
    #[ts(as = "String")]
    pub join_date: NaiveDate,
    pub notify_whatsapp: bool,
    pub notify_sms: bool,
    pub notify_email: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// `C-001 - Name`, as shown in pickers.
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.customer_code, self.name)
    }

    /// Channels the customer agreed to be contacted on.
    pub fn enabled_channels(&self) -> Vec<NotificationChannel> {
        let mut channels = Vec::with_capacity(3);
        if self.notify_whatsapp {
            channels.push(NotificationChannel::Whatsapp);
        }
        if self.notify_sms {
            channels.push(NotificationChannel::Sms);
        }
        if self.notify_email {
            channels.push(NotificationChannel::Email);
        }
        channels
    }
}

/// Notification preference flags. New customers get WhatsApp and SMS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NotificationPreferences {
    pub whatsapp: bool,
    pub sms: bool,
    pub email: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        NotificationPreferences {
            whatsapp: true,
            sms: true,
            email: false,
        }
    }
}

// =============================================================================
// Eye Exam
// =============================================================================

/// Refraction for one visit.
///
/// Sphere, cylinder and add are diopters. Axis is whole degrees 0..=180.
/// PD is millimetres; the exam form takes a single PD and stores it on both
/// eyes.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct EyeExam {
    pub id: String,
    pub customer_id: String,
    #[ts(as = "String")]
    pub exam_date: NaiveDate,
    pub right_sphere: Option<f64>,
    pub right_cylinder: Option<f64>,
    pub right_axis: Option<i64>,
    pub right_add: Option<f64>,
    pub right_pd: Option<f64>,
    pub left_sphere: Option<f64>,
    pub left_cylinder: Option<f64>,
    pub left_axis: Option<i64>,
    pub left_add: Option<f64>,
    pub left_pd: Option<f64>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Measurements for one eye.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EyeMeasurement {
    pub sphere: Option<f64>,
    pub cylinder: Option<f64>,
    pub axis: Option<i64>,
    pub add: Option<f64>,
}

impl EyeExam {
    pub fn right(&self) -> EyeMeasurement {
        EyeMeasurement {
            sphere: self.right_sphere,
            cylinder: self.right_cylinder,
            axis: self.right_axis,
            add: self.right_add,
        }
    }

    pub fn left(&self) -> EyeMeasurement {
        EyeMeasurement {
            sphere: self.left_sphere,
            cylinder: self.left_cylinder,
            axis: self.left_axis,
            add: self.left_add,
        }
    }

    /// The PD, preferring the right eye's value.
    pub fn pd(&self) -> Option<f64> {
        self.right_pd.or(self.left_pd)
    }
}

// =============================================================================
// Notification
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Notification {
    pub id: String,
    pub customer_id: String,
    pub channel: NotificationChannel,
    pub message_type: MessageType,
    pub message: Option<String>,
    #[ts(as = "String")]
    pub sent_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exam(right_pd: Option<f64>, left_pd: Option<f64>) -> EyeExam {
        EyeExam {
            id: "e1".to_string(),
            customer_id: "c1".to_string(),
            exam_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            right_sphere: Some(-1.25),
            right_cylinder: Some(-0.5),
            right_axis: Some(90),
            right_add: None,
            right_pd,
            left_sphere: Some(-1.0),
            left_cylinder: None,
            left_axis: None,
            left_add: None,
            left_pd,
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_exam_sides() {
        let e = exam(Some(62.0), Some(62.0));
        assert_eq!(e.right().axis, Some(90));
        assert_eq!(e.left().sphere, Some(-1.0));
        assert_eq!(e.pd(), Some(62.0));
        assert_eq!(exam(None, Some(60.0)).pd(), Some(60.0));
    }

    #[test]
    fn test_default_preferences() {
        let prefs = NotificationPreferences::default();
        assert!(prefs.whatsapp && prefs.sms && !prefs.email);
    }

    #[test]
    fn test_enabled_channels() {
        let now = Utc::now();
        let customer = Customer {
            id: "c1".to_string(),
            customer_code: "C-001".to_string(),
            name: "Sara Ahmed".to_string(),
            phone: "512345678".to_string(),
            email: None,
            address: None,
            gender: Gender::Female,
            age: Some(31),
            join_date: now.date_naive(),
            notify_whatsapp: true,
            notify_sms: false,
            notify_email: true,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(
            customer.enabled_channels(),
            vec![NotificationChannel::Whatsapp, NotificationChannel::Email]
        );
        assert_eq!(customer.display_name(), "C-001 - Sara Ahmed");
    }
}
