//! Notification log operations

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{format_datetime, parse_datetime, Database};
use crate::error::Result;
use crate::models::{
    AlertKind, NewNotification, Notification, NotificationType, Priority, SubjectKey,
};
use crate::store::NotificationLog;

const NOTIFICATION_COLUMNS: &str = r#"
    id, user_id, alert_kind, notification_type, priority, title, message,
    subject_key, metadata, is_read, created_at
"#;

impl Database {
    /// Newest first
    pub fn list_notifications(
        &self,
        user_id: i64,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM notifications
            WHERE user_id = ? AND (? = FALSE OR is_read = FALSE)
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
            NOTIFICATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let notifications = stmt
            .query_map(params![user_id, unread_only, limit], Self::row_to_notification)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(notifications)
    }

    pub fn get_notification(&self, user_id: i64, id: i64) -> Result<Option<Notification>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM notifications WHERE user_id = ? AND id = ?",
            NOTIFICATION_COLUMNS
        );
        let notification = conn
            .query_row(&sql, params![user_id, id], Self::row_to_notification)
            .optional()?;
        Ok(notification)
    }

    pub fn unread_count(&self, user_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = FALSE",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Returns false when the notification does not exist for this user
    pub fn mark_notification_read(&self, user_id: i64, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE notifications SET is_read = TRUE WHERE user_id = ? AND id = ?",
            params![user_id, id],
        )?;
        Ok(updated > 0)
    }

    /// Returns how many notifications changed
    pub fn mark_all_notifications_read(&self, user_id: i64) -> Result<usize> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE notifications SET is_read = TRUE WHERE user_id = ? AND is_read = FALSE",
            params![user_id],
        )?;
        Ok(updated)
    }

    fn row_to_notification(row: &Row) -> rusqlite::Result<Notification> {
        let kind: String = row.get(2)?;
        let notification_type: String = row.get(3)?;
        let priority: String = row.get(4)?;
        let subject_key: Option<String> = row.get(7)?;
        let metadata: String = row.get(8)?;
        let created_at: String = row.get(10)?;

        Ok(Notification {
            id: row.get(0)?,
            user_id: row.get(1)?,
            kind: kind.parse().unwrap_or(AlertKind::Anomaly),
            notification_type: notification_type.parse().unwrap_or(NotificationType::Info),
            priority: priority.parse().unwrap_or(Priority::Medium),
            title: row.get(5)?,
            message: row.get(6)?,
            subject_key: subject_key.map(SubjectKey::from),
            metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
            is_read: row.get(9)?,
            created_at: parse_datetime(&created_at),
        })
    }
}

impl NotificationLog for Database {
    fn create_notification(&self, notification: &NewNotification) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO notifications
                (user_id, alert_kind, notification_type, priority, title, message, subject_key, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                notification.user_id,
                notification.kind.as_str(),
                notification.notification_type.as_str(),
                notification.priority.as_str(),
                notification.title,
                notification.message,
                notification.subject_key.as_ref().map(|s| s.as_str()),
                serde_json::to_string(&notification.metadata)?,
                format_datetime(notification.created_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn find_recent(
        &self,
        user_id: i64,
        kind: AlertKind,
        subject: &SubjectKey,
        since: DateTime<Utc>,
    ) -> Result<Option<Notification>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM notifications
            WHERE user_id = ? AND alert_kind = ? AND subject_key = ? AND created_at > ?
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
            NOTIFICATION_COLUMNS
        );
        let notification = conn
            .query_row(
                &sql,
                params![user_id, kind.as_str(), subject.as_str(), format_datetime(since)],
                Self::row_to_notification,
            )
            .optional()?;
        Ok(notification)
    }
}
