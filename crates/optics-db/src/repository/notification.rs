//! # Notification Repository
//!
//! Log of messages sent to customers. Delivery is out of scope: a row
//! records that staff sent something through one of the channels.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use optics_core::customer::Notification;
use optics_core::validation::optional_text;
use optics_core::{MessageType, NotificationChannel};

use super::new_id;
use crate::error::DbResult;

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationInput {
    pub channel: NotificationChannel,
    pub message_type: MessageType,
    #[serde(default)]
    pub message: Option<String>,
}

/// Repository for the notification log.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: SqlitePool,
}

impl NotificationRepository {
    /// Creates a new NotificationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        NotificationRepository { pool }
    }

    /// Logs a notification for an existing customer.
    pub async fn log(&self, customer_id: &str, input: &NotificationInput) -> DbResult<Notification> {
        super::customer::CustomerRepository::new(self.pool.clone())
            .get(customer_id)
            .await?;

        let notification = Notification {
            id: new_id(),
            customer_id: customer_id.to_string(),
            channel: input.channel,
            message_type: input.message_type,
            message: optional_text("message", input.message.as_deref(), 2000)?,
            sent_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO notifications (id, customer_id, channel, message_type, message, sent_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&notification.id)
        .bind(&notification.customer_id)
        .bind(notification.channel)
        .bind(notification.message_type)
        .bind(&notification.message)
        .bind(notification.sent_at)
        .execute(&self.pool)
        .await?;

        info!(
            customer_id = %customer_id,
            channel = %notification.channel,
            message_type = %notification.message_type,
            "Notification logged"
        );
        Ok(notification)
    }

    /// Most recent notifications first.
    pub async fn list_for_customer(&self, customer_id: &str, limit: i64) -> DbResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, customer_id, channel, message_type, message, sent_at
            FROM notifications
            WHERE customer_id = ?1
            ORDER BY sent_at DESC
            LIMIT ?2
            "#,
        )
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::customer::CustomerInput;
    use crate::{Database, DbConfig};
    use optics_core::Gender;

    #[tokio::test]
    async fn test_log_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = db
            .customers()
            .create(&CustomerInput {
                name: "Huda".to_string(),
                phone: "533333333".to_string(),
                gender: Some(Gender::Female),
                ..Default::default()
            })
            .await
            .unwrap();

        let repo = db.notifications();
        repo.log(
            &customer.id,
            &NotificationInput {
                channel: NotificationChannel::Whatsapp,
                message_type: MessageType::Pickup,
                message: Some("Your glasses are ready".to_string()),
            },
        )
        .await
        .unwrap();

        let rows = repo.list_for_customer(&customer.id, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].message_type, MessageType::Pickup);

        let profile = db.customers().profile(&customer.id).await.unwrap();
        assert_eq!(profile.notifications.len(), 1);
        assert_eq!(profile.invoice_stats.count, 0);
    }
}
