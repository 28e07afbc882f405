//! # Settings & Employee Admin Types
//!
//! Company settings, payment method catalog, attachments, user accounts,
//! employee profiles, permission groups and the activity log.
//!
//! ## Permission Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  User ──┬── is_superuser ──────────────────► every permission           │
//! │         │                                                               │
//! │         └── member of EmployeeGroup* ──► union of the group flags       │
//! │                                                                         │
//! │  view_reports  manage_sales  manage_inventory  manage_customers         │
//! │  manage_suppliers  view_financial  manage_settings                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{EmployeePosition, Gender};

// =============================================================================
// Company Settings
// =============================================================================

/// Singleton row (id = 1) holding the shop's legal and contact details.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(default)]
pub struct CompanySettings {
    pub company_name_ar: String,
    pub company_name_en: String,
    pub unified_number: String,
    pub commercial_register: String,
    /// VAT registration number printed on invoices.
    pub tax_number: String,
    pub national_address: String,
    pub location_url: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub owner_name: String,
    pub owner_id_number: String,
    pub owner_phone: String,
    pub owner_email: String,
}

/// A card/terminal provider and its fee.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentMethodConfig {
    pub id: String,
    pub name: String,
    pub company: Option<String>,
    /// Fee in basis points.
    pub percentage_bps: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Metadata for a PDF stored in object storage.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Attachment {
    pub id: String,
    pub title: String,
    pub file_name: String,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub uploaded_at: DateTime<Utc>,
}

// =============================================================================
// Users
// =============================================================================

/// A login account.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    #[ts(skip)]
    pub password_hash: String,
    pub email: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    #[ts(as = "Option<String>")]
    pub last_login: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Permissions
// =============================================================================

/// One permission flag of an employee group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewReports,
    ManageSales,
    ManageInventory,
    ManageCustomers,
    ManageSuppliers,
    ViewFinancial,
    ManageSettings,
}

impl Permission {
    pub const ALL: [Permission; 7] = [
        Permission::ViewReports,
        Permission::ManageSales,
        Permission::ManageInventory,
        Permission::ManageCustomers,
        Permission::ManageSuppliers,
        Permission::ViewFinancial,
        Permission::ManageSettings,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewReports => "view_reports",
            Permission::ManageSales => "manage_sales",
            Permission::ManageInventory => "manage_inventory",
            Permission::ManageCustomers => "manage_customers",
            Permission::ManageSuppliers => "manage_suppliers",
            Permission::ViewFinancial => "view_financial",
            Permission::ManageSettings => "manage_settings",
        }
    }
}

/// The seven permission flags, as stored on a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PermissionSet {
    #[serde(default)]
    pub view_reports: bool,
    #[serde(default)]
    pub manage_sales: bool,
    #[serde(default)]
    pub manage_inventory: bool,
    #[serde(default)]
    pub manage_customers: bool,
    #[serde(default)]
    pub manage_suppliers: bool,
    #[serde(default)]
    pub view_financial: bool,
    #[serde(default)]
    pub manage_settings: bool,
}

impl PermissionSet {
    /// Every flag set; what a superuser effectively holds.
    pub const fn all() -> Self {
        PermissionSet {
            view_reports: true,
            manage_sales: true,
            manage_inventory: true,
            manage_customers: true,
            manage_suppliers: true,
            view_financial: true,
            manage_settings: true,
        }
    }

    pub const fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::ViewReports => self.view_reports,
            Permission::ManageSales => self.manage_sales,
            Permission::ManageInventory => self.manage_inventory,
            Permission::ManageCustomers => self.manage_customers,
            Permission::ManageSuppliers => self.manage_suppliers,
            Permission::ViewFinancial => self.view_financial,
            Permission::ManageSettings => self.manage_settings,
        }
    }

    /// Flag-wise OR, used to merge the groups a user belongs to.
    pub fn union(self, other: PermissionSet) -> PermissionSet {
        PermissionSet {
            view_reports: self.view_reports || other.view_reports,
            manage_sales: self.manage_sales || other.manage_sales,
            manage_inventory: self.manage_inventory || other.manage_inventory,
            manage_customers: self.manage_customers || other.manage_customers,
            manage_suppliers: self.manage_suppliers || other.manage_suppliers,
            view_financial: self.view_financial || other.view_financial,
            manage_settings: self.manage_settings || other.manage_settings,
        }
    }

    /// The granted flags as a list, for `/auth/me`.
    pub fn granted(&self) -> Vec<Permission> {
        Permission::ALL
            .into_iter()
            .filter(|p| self.allows(*p))
            .collect()
    }
}

impl FromIterator<PermissionSet> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = PermissionSet>>(iter: I) -> Self {
        iter.into_iter().fold(PermissionSet::default(), PermissionSet::union)
    }
}

// =============================================================================
// Employees
// =============================================================================

/// HR record attached 1:1 to a [`User`].
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct EmployeeProfile {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub email: Option<String>,
    /// Entered by hand, e.g. `EMP001`.
    pub employee_id: String,
    pub full_name: String,
    pub position: EmployeePosition,
    pub gender: Gender,
    /// Ten digits starting with 05.
    pub phone: String,
    pub national_id: Option<String>,
    #[ts(as = "String")]
    pub hire_date: NaiveDate,
    pub department: Option<String>,
    pub salary_cents: i64,
    pub is_active: bool,
    #[ts(as = "Option<String>")]
    pub termination_date: Option<NaiveDate>,
    pub termination_reason: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl EmployeeProfile {
    /// Deactivation records the date and reason.
    pub fn deactivate(&mut self, today: NaiveDate, reason: Option<String>) {
        self.is_active = false;
        self.termination_date = Some(today);
        self.termination_reason = reason;
    }

    /// Activation clears both.
    pub fn activate(&mut self) {
        self.is_active = true;
        self.termination_date = None;
        self.termination_reason = None;
    }
}

/// A permission group.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct EmployeeGroup {
    pub id: String,
    pub name: String,
    pub name_arabic: String,
    pub description: Option<String>,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    #[ts(flatten)]
    pub permissions: PermissionSet,
    pub members_count: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// One line of an employee's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct EmployeeActivity {
    pub id: String,
    pub employee_id: String,
    pub action: String,
    pub description: Option<String>,
    pub ip_address: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Login name derived from an e-mail address: the part before `@`.
pub fn username_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .unwrap_or(email)
        .trim()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_of_groups() {
        let sales = PermissionSet {
            manage_sales: true,
            manage_customers: true,
            ..Default::default()
        };
        let stock = PermissionSet {
            manage_inventory: true,
            ..Default::default()
        };

        let merged: PermissionSet = [sales, stock].into_iter().collect();
        assert!(merged.allows(Permission::ManageSales));
        assert!(merged.allows(Permission::ManageInventory));
        assert!(!merged.allows(Permission::ManageSettings));
        assert_eq!(merged.granted().len(), 3);
    }

    #[test]
    fn test_all_grants_everything() {
        let all = PermissionSet::all();
        assert!(Permission::ALL.iter().all(|p| all.allows(*p)));
    }

    #[test]
    fn test_permission_serializes_snake_case() {
        let json = serde_json::to_string(&Permission::ViewFinancial).unwrap();
        assert_eq!(json, "\"view_financial\"");
        assert_eq!(Permission::ViewFinancial.as_str(), "view_financial");
    }

    #[test]
    fn test_username_from_email() {
        assert_eq!(username_from_email("Ahmed.Ali@shop.sa"), "ahmed.ali");
    }

    #[test]
    fn test_toggle_active() {
        let mut e = EmployeeProfile {
            id: "e1".to_string(),
            user_id: "u1".to_string(),
            username: "ahmed".to_string(),
            email: None,
            employee_id: "EMP001".to_string(),
            full_name: "Ahmed Ali".to_string(),
            position: EmployeePosition::Sales,
            gender: Gender::Male,
            phone: "0512345678".to_string(),
            national_id: None,
            hire_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            department: None,
            salary_cents: 500000,
            is_active: true,
            termination_date: None,
            termination_reason: None,
            address: None,
            notes: None,
            created_at: Utc::now(),
        };

        let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        e.deactivate(today, Some("Resigned".to_string()));
        assert!(!e.is_active);
        assert_eq!(e.termination_date, Some(today));

        e.activate();
        assert!(e.is_active);
        assert!(e.termination_date.is_none());
        assert!(e.termination_reason.is_none());
    }
}
