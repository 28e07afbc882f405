//! # Group Repository
//!
//! Permission groups. A user's effective permissions are the union of the
//! groups they belong to; see `UserRepository::permissions`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use optics_core::admin::{EmployeeGroup, PermissionSet};
use optics_core::validation::{optional_text, validate_required};

use super::new_id;
use crate::error::{DbError, DbResult};

const GROUP_SELECT: &str = r#"
    SELECT g.id, g.name, g.name_arabic, g.description,
        g.view_reports, g.manage_sales, g.manage_inventory, g.manage_customers,
        g.manage_suppliers, g.view_financial, g.manage_settings,
        (SELECT COUNT(*) FROM user_groups ug WHERE ug.group_id = g.id) AS members_count,
        g.created_at
    FROM employee_groups g
"#;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub name_arabic: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub permissions: PermissionSet,
}

/// A member row on the group page.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GroupMember {
    pub user_id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: EmployeeGroup,
    pub members: Vec<GroupMember>,
}

#[derive(Debug, Clone)]
pub struct GroupRepository {
    pool: SqlitePool,
}

impl GroupRepository {
    pub fn new(pool: SqlitePool) -> Self {
        GroupRepository { pool }
    }

    /// All groups by name with member counts.
    pub async fn list(&self) -> DbResult<Vec<EmployeeGroup>> {
        let sql = format!("{GROUP_SELECT} ORDER BY g.name");
        Ok(sqlx::query_as::<_, EmployeeGroup>(&sql).fetch_all(&self.pool).await?)
    }

    pub async fn get(&self, id: &str) -> DbResult<EmployeeGroup> {
        let sql = format!("{GROUP_SELECT} WHERE g.id = ?1");
        sqlx::query_as::<_, EmployeeGroup>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Group", id))
    }

    pub async fn detail(&self, id: &str) -> DbResult<GroupDetail> {
        let group = self.get(id).await?;
        let members = sqlx::query_as::<_, GroupMember>(
            r#"
            SELECT u.id AS user_id, u.username, e.full_name, u.is_active
            FROM user_groups ug
            JOIN users u ON u.id = ug.user_id
            LEFT JOIN employee_profiles e ON e.user_id = u.id
            WHERE ug.group_id = ?1
            ORDER BY u.username
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(GroupDetail { group, members })
    }

    pub async fn create(&self, input: &GroupInput) -> DbResult<EmployeeGroup> {
        let name = validate_required("name", &input.name, 150)?;
        let name_arabic = validate_required("name_arabic", &input.name_arabic, 150)?;
        let description = optional_text("description", input.description.as_deref(), 1000)?;
        let p = &input.permissions;
        let id = new_id();

        sqlx::query(
            r#"
            INSERT INTO employee_groups (
                id, name, name_arabic, description, view_reports, manage_sales, manage_inventory,
                manage_customers, manage_suppliers, view_financial, manage_settings, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
            "#,
        )
        .bind(&id)
        .bind(&name)
        .bind(&name_arabic)
        .bind(&description)
        .bind(p.view_reports)
        .bind(p.manage_sales)
        .bind(p.manage_inventory)
        .bind(p.manage_customers)
        .bind(p.manage_suppliers)
        .bind(p.view_financial)
        .bind(p.manage_settings)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_name(e, &name))?;

        info!(group_id = %id, name = %name, "Group created");
        self.get(&id).await
    }

    pub async fn update(&self, id: &str, input: &GroupInput) -> DbResult<EmployeeGroup> {
        let name = validate_required("name", &input.name, 150)?;
        let name_arabic = validate_required("name_arabic", &input.name_arabic, 150)?;
        let description = optional_text("description", input.description.as_deref(), 1000)?;
        let p = &input.permissions;

        let result = sqlx::query(
            r#"
            UPDATE employee_groups SET
                name = ?2, name_arabic = ?3, description = ?4, view_reports = ?5, manage_sales = ?6,
                manage_inventory = ?7, manage_customers = ?8, manage_suppliers = ?9,
                view_financial = ?10, manage_settings = ?11, updated_at = ?12
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&name)
        .bind(&name_arabic)
        .bind(&description)
        .bind(p.view_reports)
        .bind(p.manage_sales)
        .bind(p.manage_inventory)
        .bind(p.manage_customers)
        .bind(p.manage_suppliers)
        .bind(p.view_financial)
        .bind(p.manage_settings)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_name(e, &name))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Group", id));
        }

        info!(group_id = %id, "Group updated");
        self.get(id).await
    }

    /// Deletes a group; members simply lose its permissions.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM employee_groups WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Group", id));
        }

        info!(group_id = %id, "Group deleted");
        Ok(())
    }
}

fn duplicate_name(err: sqlx::Error, name: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::duplicate("name", name),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::user::NewUser;
    use crate::{Database, DbConfig};
    use optics_core::admin::Permission;

    fn input(name: &str) -> GroupInput {
        GroupInput {
            name: name.to_string(),
            name_arabic: "مجموعة".to_string(),
            permissions: PermissionSet {
                view_reports: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_members_and_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let group = db.groups().create(&input("Reports")).await.unwrap();
        assert!(group.permissions.allows(Permission::ViewReports));
        assert_eq!(group.members_count, 0);

        let user = db
            .users()
            .create(&NewUser {
                username: "ahmed",
                password_hash: "hash",
                ..Default::default()
            })
            .await
            .unwrap();
        sqlx::query("INSERT INTO user_groups (user_id, group_id) VALUES (?1, ?2)")
            .bind(&user.id)
            .bind(&group.id)
            .execute(db.pool())
            .await
            .unwrap();

        let detail = db.groups().detail(&group.id).await.unwrap();
        assert_eq!(detail.group.members_count, 1);
        assert_eq!(detail.members[0].username, "ahmed");
        assert!(detail.members[0].full_name.is_none());

        db.groups().delete(&group.id).await.unwrap();
        let perms = db.users().permissions(&user).await.unwrap();
        assert!(!perms.allows(Permission::ViewReports));
    }

    #[tokio::test]
    async fn test_duplicate_name() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.groups().create(&input("Sales")).await.unwrap();
        assert!(matches!(
            db.groups().create(&input("Sales")).await,
            Err(DbError::UniqueViolation { .. })
        ));
    }
}
