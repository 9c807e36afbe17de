use anyhow::Result;

use super::schema::Database;
use super::types::{merge_settings, merge_settings_update, Settings, SettingsUpdate};
use super::Store;

/// Key holding the JSON array of tracked handles.
pub(crate) const HANDLES_KEY: &str = "handles";
/// Key holding the JSON object of saved settings.
pub(crate) const SETTINGS_KEY: &str = "settings";

impl Database {
    // ========================================================================
    // Preference Operations
    // ========================================================================

    /// Get a single stored value by key, or `None` if never set.
    pub async fn get_preference(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM preferences WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Set a stored value (UPSERT), refreshing its timestamp.
    pub async fn set_preference(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO preferences (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Remove a stored value. Missing keys are not an error.
    pub async fn delete_preference(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM preferences WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

impl Store for Database {
    async fn get_handles(&self) -> Result<Vec<String>> {
        let Some(raw) = self.get_preference(HANDLES_KEY).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(handles) => Ok(handles),
            Err(e) => {
                tracing::warn!(error = %e, "Stored handle list is unreadable, starting empty");
                Ok(Vec::new())
            }
        }
    }

    async fn set_handles(&self, handles: &[String]) -> Result<()> {
        let raw = serde_json::to_string(handles)?;
        self.set_preference(HANDLES_KEY, &raw).await
    }

    async fn get_settings(&self) -> Result<Settings> {
        Ok(match self.get_preference(SETTINGS_KEY).await? {
            Some(raw) => merge_settings(&self.defaults, &raw),
            None => self.defaults.clone(),
        })
    }

    async fn set_settings(&self, settings: &Settings) -> Result<()> {
        let raw = serde_json::to_string(settings)?;
        self.set_preference(SETTINGS_KEY, &raw).await
    }

    async fn update_settings(&self, update: &SettingsUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let stored = self.get_preference(SETTINGS_KEY).await?;
        let raw = merge_settings_update(stored.as_deref(), update)?;
        self.set_preference(SETTINGS_KEY, &raw).await
    }

    async fn reset_settings(&self) -> Result<()> {
        self.delete_preference(SETTINGS_KEY).await
    }
}
