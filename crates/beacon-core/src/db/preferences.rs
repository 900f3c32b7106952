//! Notification preference documents

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::Result;
use crate::models::NotificationPreferences;
use crate::store::PreferencesStore;

impl Database {
    /// Validate and store a user's preferences, replacing any existing document
    pub fn update_preferences(&self, user_id: i64, prefs: &NotificationPreferences) -> Result<()> {
        prefs.validate()?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO notification_preferences (user_id, preferences, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(user_id) DO UPDATE SET
                preferences = excluded.preferences,
                updated_at = CURRENT_TIMESTAMP
            "#,
            params![user_id, serde_json::to_string(prefs)?],
        )?;
        Ok(())
    }
}

impl PreferencesStore for Database {
    fn get_preferences(&self, user_id: i64) -> Result<NotificationPreferences> {
        let conn = self.conn()?;
        let stored: Option<String> = conn
            .query_row(
                "SELECT preferences FROM notification_preferences WHERE user_id = ?",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(NotificationPreferences::default()),
        }
    }
}
