//! # Employee Repository
//!
//! HR profiles attached 1:1 to login accounts, group membership and the
//! per-employee activity log.
//!
//! ## Account Coupling
//! ```text
//! create        users row + employee_profiles row + user_groups rows + activity
//! deactivate    profile.is_active = 0 (date, reason) AND users.is_active = 0
//! activate      both back to 1, date and reason cleared
//! ```
//! The login name is the lowercased local part of the e-mail address.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use optics_core::admin::{username_from_email, EmployeeActivity, EmployeeProfile};
use optics_core::validation::{
    optional_text, validate_email, validate_employee_phone, validate_national_id, validate_price_cents,
    validate_required,
};
use optics_core::{EmployeePosition, Gender, ValidationError};

use super::user::{has_live_session, insert_user, NewUser};
use super::{like_pattern, new_id};
use crate::error::{DbError, DbResult};

const EMPLOYEE_SELECT: &str = r#"
    SELECT e.id, e.user_id, u.username, u.email, e.employee_id, e.full_name, e.position,
        e.gender, e.phone, e.national_id, e.hire_date, e.department, e.salary_cents,
        e.is_active, e.termination_date, e.termination_reason, e.address, e.notes, e.created_at
    FROM employee_profiles e
    JOIN users u ON u.id = e.user_id
"#;

/// Activities shown on the detail page.
const RECENT_ACTIVITIES: i64 = 10;

// =============================================================================
// Inputs & read models
// =============================================================================

/// Add/edit form. The password travels separately, already hashed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeeInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub employee_id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub position: Option<EmployeePosition>,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub national_id: Option<String>,
    #[serde(default)]
    pub hire_date: Option<NaiveDate>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub salary_cents: i64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub group_ids: Vec<String>,
}

struct ValidEmployee {
    email: String,
    employee_id: String,
    full_name: String,
    position: EmployeePosition,
    phone: String,
    national_id: Option<String>,
    department: Option<String>,
    address: Option<String>,
    notes: Option<String>,
}

impl EmployeeInput {
    fn validate(&self) -> DbResult<ValidEmployee> {
        let email = validate_email(Some(self.email.as_str()))?.ok_or_else(|| ValidationError::Required {
            field: "email".to_string(),
        })?;
        let position = self.position.ok_or_else(|| ValidationError::Required {
            field: "position".to_string(),
        })?;
        validate_price_cents("salary", self.salary_cents)?;

        Ok(ValidEmployee {
            email,
            employee_id: validate_required("employee_id", &self.employee_id, 20)?,
            full_name: validate_required("full_name", &self.full_name, 200)?,
            position,
            phone: validate_employee_phone(&self.phone)?,
            national_id: validate_national_id(self.national_id.as_deref())?,
            department: optional_text("department", self.department.as_deref(), 100)?,
            address: optional_text("address", self.address.as_deref(), 300)?,
            notes: optional_text("notes", self.notes.as_deref(), 2000)?,
        })
    }
}

/// List filters; unknown values were dropped by the caller.
#[derive(Debug, Clone, Default)]
pub struct EmployeeFilter {
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub position: Option<EmployeePosition>,
    pub group_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq, sqlx::FromRow)]
pub struct EmployeeStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
}

/// A group as listed on an employee.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GroupRef {
    pub id: String,
    pub name: String,
    pub name_arabic: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeDetail {
    #[serde(flatten)]
    pub profile: EmployeeProfile,
    pub groups: Vec<GroupRef>,
    /// Newest first, at most ten.
    pub activities: Vec<EmployeeActivity>,
    /// Holds a session that has not expired.
    pub is_online: bool,
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct EmployeeRepository {
    pool: SqlitePool,
}

impl EmployeeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        EmployeeRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<EmployeeProfile> {
        let mut conn = self.pool.acquire().await?;
        fetch_profile(&mut conn, id).await
    }

    /// Profile of a login account, if it has one.
    pub async fn for_user(&self, user_id: &str) -> DbResult<Option<EmployeeProfile>> {
        let sql = format!("{EMPLOYEE_SELECT} WHERE e.user_id = ?1");
        Ok(sqlx::query_as::<_, EmployeeProfile>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Newest first.
    pub async fn list(&self, filter: &EmployeeFilter) -> DbResult<Vec<EmployeeProfile>> {
        debug!(?filter, "Listing employees");

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("{EMPLOYEE_SELECT} WHERE 1 = 1"));
        if let Some(term) = &filter.search {
            let pattern = like_pattern(term);
            qb.push(" AND (e.full_name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR e.employee_id LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR e.phone LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR u.email LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(active) = filter.is_active {
            qb.push(" AND e.is_active = ").push_bind(active);
        }
        if let Some(position) = filter.position {
            qb.push(" AND e.position = ").push_bind(position);
        }
        if let Some(group_id) = &filter.group_id {
            qb.push(" AND EXISTS (SELECT 1 FROM user_groups ug WHERE ug.user_id = e.user_id AND ug.group_id = ")
                .push_bind(group_id.clone())
                .push(")");
        }
        qb.push(" ORDER BY e.created_at DESC");

        Ok(qb.build_query_as::<EmployeeProfile>().fetch_all(&self.pool).await?)
    }

    pub async fn stats(&self) -> DbResult<EmployeeStats> {
        let stats = sqlx::query_as::<_, EmployeeStats>(
            r#"
            SELECT COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN is_active = 1 THEN 1 ELSE 0 END), 0) AS active,
                COALESCE(SUM(CASE WHEN is_active = 0 THEN 1 ELSE 0 END), 0) AS inactive
            FROM employee_profiles
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    /// Creates the login account, the profile and the group memberships
    /// in one transaction, then logs a `created` activity.
    pub async fn create(
        &self,
        input: &EmployeeInput,
        password_hash: &str,
        actor_ip: Option<&str>,
    ) -> DbResult<EmployeeDetail> {
        let valid = input.validate()?;
        let username = username_from_email(&valid.email);
        let now = Utc::now();
        let id = new_id();

        let mut tx = self.pool.begin().await?;

        ensure_employee_id_free(&mut tx, &valid.employee_id, None).await?;
        let user_id = insert_user(
            &mut tx,
            &NewUser {
                username: &username,
                password_hash,
                email: Some(&valid.email),
                is_superuser: false,
            },
        )
        .await?;

        sqlx::query(
            r#"
            INSERT INTO employee_profiles (
                id, user_id, employee_id, full_name, position, gender, phone, national_id,
                hire_date, department, salary_cents, is_active, address, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 1, ?12, ?13, ?14, ?14)
            "#,
        )
        .bind(&id)
        .bind(&user_id)
        .bind(&valid.employee_id)
        .bind(&valid.full_name)
        .bind(valid.position)
        .bind(input.gender)
        .bind(&valid.phone)
        .bind(&valid.national_id)
        .bind(input.hire_date.unwrap_or_else(|| now.date_naive()))
        .bind(&valid.department)
        .bind(input.salary_cents)
        .bind(&valid.address)
        .bind(&valid.notes)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        replace_groups(&mut tx, &user_id, &input.group_ids).await?;
        insert_activity(&mut tx, &id, "created", Some("Employee account created"), actor_ip).await?;

        tx.commit().await?;

        info!(employee_id = %id, code = %valid.employee_id, username = %username, "Employee created");
        self.detail(&id).await
    }

    /// Profile, groups, the ten newest activities and online status.
    pub async fn detail(&self, id: &str) -> DbResult<EmployeeDetail> {
        let mut conn = self.pool.acquire().await?;
        let profile = fetch_profile(&mut conn, id).await?;

        let groups = sqlx::query_as::<_, GroupRef>(
            r#"
            SELECT g.id, g.name, g.name_arabic
            FROM employee_groups g
            JOIN user_groups ug ON ug.group_id = g.id
            WHERE ug.user_id = ?1
            ORDER BY g.name
            "#,
        )
        .bind(&profile.user_id)
        .fetch_all(&mut *conn)
        .await?;

        let activities = sqlx::query_as::<_, EmployeeActivity>(
            r#"
            SELECT id, employee_id, action, description, ip_address, created_at
            FROM employee_activities
            WHERE employee_id = ?1
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(id)
        .bind(RECENT_ACTIVITIES)
        .fetch_all(&mut *conn)
        .await?;

        let is_online = has_live_session(&mut conn, &profile.user_id, Utc::now()).await?;

        Ok(EmployeeDetail {
            profile,
            groups,
            activities,
            is_online,
        })
    }

    /// Applies the edit form. A `Some` password hash replaces the old one;
    /// group membership is replaced wholesale.
    pub async fn update(
        &self,
        id: &str,
        input: &EmployeeInput,
        password_hash: Option<&str>,
        actor_ip: Option<&str>,
    ) -> DbResult<EmployeeDetail> {
        let valid = input.validate()?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let existing = fetch_profile(&mut tx, id).await?;
        ensure_employee_id_free(&mut tx, &valid.employee_id, Some(id)).await?;

        sqlx::query(
            r#"
            UPDATE employee_profiles SET
                employee_id = ?2, full_name = ?3, position = ?4, gender = ?5, phone = ?6,
                national_id = ?7, hire_date = ?8, department = ?9, salary_cents = ?10,
                address = ?11, notes = ?12, updated_at = ?13
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&valid.employee_id)
        .bind(&valid.full_name)
        .bind(valid.position)
        .bind(input.gender)
        .bind(&valid.phone)
        .bind(&valid.national_id)
        .bind(input.hire_date.unwrap_or(existing.hire_date))
        .bind(&valid.department)
        .bind(input.salary_cents)
        .bind(&valid.address)
        .bind(&valid.notes)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE users SET email = ?2 WHERE id = ?1")
            .bind(&existing.user_id)
            .bind(&valid.email)
            .execute(&mut *tx)
            .await?;

        if let Some(hash) = password_hash {
            sqlx::query("UPDATE users SET password_hash = ?2 WHERE id = ?1")
                .bind(&existing.user_id)
                .bind(hash)
                .execute(&mut *tx)
                .await?;
        }

        replace_groups(&mut tx, &existing.user_id, &input.group_ids).await?;
        let description = if password_hash.is_some() {
            "Profile updated, password changed"
        } else {
            "Profile updated"
        };
        insert_activity(&mut tx, id, "updated", Some(description), actor_ip).await?;

        tx.commit().await?;

        info!(employee_id = %id, password_changed = password_hash.is_some(), "Employee updated");
        self.detail(id).await
    }

    /// Flips the active flag on both the profile and the login account.
    pub async fn toggle_active(
        &self,
        id: &str,
        reason: Option<&str>,
        actor_ip: Option<&str>,
    ) -> DbResult<EmployeeProfile> {
        let reason = optional_text("termination_reason", reason, 500)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let mut profile = fetch_profile(&mut tx, id).await?;

        let action = if profile.is_active {
            profile.deactivate(now.date_naive(), reason);
            "deactivated"
        } else {
            profile.activate();
            "activated"
        };

        sqlx::query(
            r#"
            UPDATE employee_profiles SET
                is_active = ?2, termination_date = ?3, termination_reason = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(profile.is_active)
        .bind(profile.termination_date)
        .bind(&profile.termination_reason)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE users SET is_active = ?2 WHERE id = ?1")
            .bind(&profile.user_id)
            .bind(profile.is_active)
            .execute(&mut *tx)
            .await?;

        insert_activity(&mut tx, id, action, profile.termination_reason.as_deref(), actor_ip).await?;
        tx.commit().await?;

        info!(employee_id = %id, action, "Employee status changed");
        Ok(profile)
    }

    /// Appends one line to an employee's audit trail.
    pub async fn log_activity(
        &self,
        employee_id: &str,
        action: &str,
        description: Option<&str>,
        ip_address: Option<&str>,
    ) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_activity(&mut conn, employee_id, action, description, ip_address).await
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================

async fn fetch_profile(conn: &mut SqliteConnection, id: &str) -> DbResult<EmployeeProfile> {
    let sql = format!("{EMPLOYEE_SELECT} WHERE e.id = ?1");
    sqlx::query_as::<_, EmployeeProfile>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Employee", id))
}

async fn ensure_employee_id_free(conn: &mut SqliteConnection, code: &str, except: Option<&str>) -> DbResult<()> {
    let taken: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM employee_profiles WHERE employee_id = ?1 AND id != COALESCE(?2, '')",
    )
    .bind(code)
    .bind(except)
    .fetch_one(&mut *conn)
    .await?;

    if taken > 0 {
        return Err(ValidationError::Duplicate {
            field: "employee_id".to_string(),
            value: code.to_string(),
        }
        .into());
    }
    Ok(())
}

async fn replace_groups(conn: &mut SqliteConnection, user_id: &str, group_ids: &[String]) -> DbResult<()> {
    sqlx::query("DELETE FROM user_groups WHERE user_id = ?1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    for group_id in group_ids {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employee_groups WHERE id = ?1")
            .bind(group_id)
            .fetch_one(&mut *conn)
            .await?;
        if exists == 0 {
            return Err(DbError::not_found("Group", group_id.as_str()));
        }

        sqlx::query("INSERT OR IGNORE INTO user_groups (user_id, group_id) VALUES (?1, ?2)")
            .bind(user_id)
            .bind(group_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn insert_activity(
    conn: &mut SqliteConnection,
    employee_id: &str,
    action: &str,
    description: Option<&str>,
    ip_address: Option<&str>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO employee_activities (id, employee_id, action, description, ip_address, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(new_id())
    .bind(employee_id)
    .bind(action)
    .bind(description)
    .bind(ip_address)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::group::GroupInput;
    use crate::{Database, DbConfig};
    use chrono::Duration;
    use optics_core::admin::{Permission, PermissionSet};
    use optics_core::CoreError;

    fn input(email: &str, code: &str) -> EmployeeInput {
        EmployeeInput {
            email: email.to_string(),
            employee_id: code.to_string(),
            full_name: "Sara Ali".to_string(),
            position: Some(EmployeePosition::Cashier),
            gender: Gender::Female,
            phone: "0551234567".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_derives_username_and_groups() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let group = db
            .groups()
            .create(&GroupInput {
                name: "Cashiers".to_string(),
                name_arabic: "الكاشير".to_string(),
                permissions: PermissionSet {
                    manage_sales: true,
                    ..Default::default()
                },
                ..Default::default()
            })
            .await
            .unwrap();

        let mut form = input("Sara.Ali@Example.com", "EMP001");
        form.group_ids = vec![group.id.clone()];
        let created = db.employees().create(&form, "hash", Some("127.0.0.1")).await.unwrap();

        assert_eq!(created.profile.username, "sara.ali");
        assert_eq!(created.groups.len(), 1);
        assert_eq!(created.activities.len(), 1);
        assert!(!created.is_online);

        let user = db.users().get(&created.profile.user_id).await.unwrap();
        let perms = db.users().permissions(&user).await.unwrap();
        assert!(perms.allows(Permission::ManageSales));
        assert!(!perms.allows(Permission::ViewFinancial));

        let in_group = db
            .employees()
            .list(&EmployeeFilter {
                group_id: Some(group.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(in_group.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_employee_id_rolls_back_user() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.employees().create(&input("a@example.com", "EMP001"), "hash", None).await.unwrap();

        let err = db
            .employees()
            .create(&input("b@example.com", "EMP001"), "hash", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));
        assert!(db.users().find_by_username("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_toggle_active_couples_user() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let created = db.employees().create(&input("a@example.com", "EMP001"), "hash", None).await.unwrap();
        let id = created.profile.id.clone();
        let token = db
            .users()
            .create_session(&created.profile.user_id, false, Duration::hours(1))
            .await
            .unwrap();
        assert!(db.employees().detail(&id).await.unwrap().is_online);

        let off = db.employees().toggle_active(&id, Some("Resigned"), None).await.unwrap();
        assert!(!off.is_active);
        assert_eq!(off.termination_reason.as_deref(), Some("Resigned"));
        assert!(db.users().session_user(&token).await.unwrap().is_none());
        assert_eq!(
            db.employees().stats().await.unwrap(),
            EmployeeStats {
                total: 1,
                active: 0,
                inactive: 1
            }
        );

        let on = db.employees().toggle_active(&id, None, None).await.unwrap();
        assert!(on.is_active);
        assert!(on.termination_date.is_none());
        assert_eq!(db.employees().detail(&id).await.unwrap().activities.len(), 3);
    }

    #[tokio::test]
    async fn test_update_changes_password_only_when_given() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let created = db.employees().create(&input("a@example.com", "EMP001"), "old", None).await.unwrap();
        let id = created.profile.id.clone();

        db.employees().update(&id, &input("a@example.com", "EMP002"), None, None).await.unwrap();
        let user = db.users().get(&created.profile.user_id).await.unwrap();
        assert_eq!(user.password_hash, "old");

        let updated = db
            .employees()
            .update(&id, &input("a@example.com", "EMP002"), Some("new"), None)
            .await
            .unwrap();
        assert_eq!(updated.profile.employee_id, "EMP002");
        let user = db.users().get(&created.profile.user_id).await.unwrap();
        assert_eq!(user.password_hash, "new");
    }
}
