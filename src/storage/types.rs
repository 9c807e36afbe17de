use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of toptweets appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Map lock-related sqlx errors to [`DatabaseError::InstanceLocked`].
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Settings
// ============================================================================

pub const DEFAULT_SOURCE_BASE: &str = "https://nitter.net";
pub const DEFAULT_PER_HANDLE_LIMIT: usize = 8;
pub const DEFAULT_TOP_N: usize = 12;

/// User-editable settings read once at the start of every run.
///
/// Missing fields deserialize to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the mirror serving `/{handle}/rss`.
    pub source_base: String,
    /// How many entries to keep from each handle's feed, in feed order.
    pub per_handle_limit: usize,
    /// How many ranked items to show overall.
    pub top_n: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_base: DEFAULT_SOURCE_BASE.to_string(),
            per_handle_limit: DEFAULT_PER_HANDLE_LIMIT,
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl Settings {
    /// Counts below 1 become 1; a blank source base becomes the default mirror.
    pub fn clamped(mut self) -> Self {
        self.per_handle_limit = self.per_handle_limit.max(1);
        self.top_n = self.top_n.max(1);
        let trimmed = self.source_base.trim();
        self.source_base = if trimmed.is_empty() {
            DEFAULT_SOURCE_BASE.to_string()
        } else {
            trimmed.to_string()
        };
        self
    }
}

/// A partial settings change: only the `Some` fields are saved.
///
/// Fields left `None` keep following the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_handle_limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.source_base.is_none() && self.per_handle_limit.is_none() && self.top_n.is_none()
    }

    /// `settings` with every `Some` field of this update written over it.
    pub fn apply_to(&self, mut settings: Settings) -> Settings {
        if let Some(base) = &self.source_base {
            settings.source_base = base.clone();
        }
        if let Some(n) = self.per_handle_limit {
            settings.per_handle_limit = n;
        }
        if let Some(n) = self.top_n {
            settings.top_n = n;
        }
        settings
    }

    /// Combines two updates; fields set in `newer` win.
    pub fn then(self, newer: &SettingsUpdate) -> Self {
        Self {
            source_base: newer.source_base.clone().or(self.source_base),
            per_handle_limit: newer.per_handle_limit.or(self.per_handle_limit),
            top_n: newer.top_n.or(self.top_n),
        }
    }
}

impl From<&Settings> for SettingsUpdate {
    fn from(settings: &Settings) -> Self {
        Self {
            source_base: Some(settings.source_base.clone()),
            per_handle_limit: Some(settings.per_handle_limit),
            top_n: Some(settings.top_n),
        }
    }
}

/// Writes the fields of `update` into a stored settings JSON object.
///
/// Keys the update leaves out are kept as stored. Unreadable stored JSON is
/// replaced.
pub fn merge_settings_update(
    stored: Option<&str>,
    update: &SettingsUpdate,
) -> serde_json::Result<String> {
    let mut object = match stored.map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(map))) => map,
        Some(_) => {
            tracing::warn!("Stored settings are unreadable, replacing them");
            serde_json::Map::new()
        }
        None => serde_json::Map::new(),
    };

    if let Value::Object(changes) = serde_json::to_value(update)? {
        object.extend(changes);
    }
    serde_json::to_string(&Value::Object(object))
}

/// Layers a stored settings JSON object over `defaults`, field by field.
///
/// Fields absent (or `null`) in `stored` keep the default. Unreadable JSON or
/// a field of the wrong type yields `defaults` unchanged, with a warning.
pub fn merge_settings(defaults: &Settings, stored: &str) -> Settings {
    let overrides = match serde_json::from_str::<Value>(stored) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            tracing::warn!("Stored settings are not a JSON object, using defaults");
            return defaults.clone();
        }
        Err(e) => {
            tracing::warn!(error = %e, "Stored settings are not valid JSON, using defaults");
            return defaults.clone();
        }
    };

    let mut merged = match serde_json::to_value(defaults) {
        Ok(Value::Object(map)) => map,
        _ => return defaults.clone(),
    };
    for (key, value) in overrides {
        if !value.is_null() {
            merged.insert(key, value);
        }
    }

    serde_json::from_value(Value::Object(merged)).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Stored settings have invalid fields, using defaults");
        defaults.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert_eq!(s.source_base, "https://nitter.net");
        assert_eq!(s.per_handle_limit, 8);
        assert_eq!(s.top_n, 12);
    }

    #[test]
    fn test_missing_fields_deserialize_to_defaults() {
        let s: Settings = serde_json::from_str(r#"{"top_n": 5}"#).unwrap();
        assert_eq!(s.top_n, 5);
        assert_eq!(s.per_handle_limit, 8);
        assert_eq!(s.source_base, "https://nitter.net");
    }

    #[test]
    fn test_clamped_raises_zero_counts() {
        let s = Settings {
            source_base: "  https://mirror.example  ".into(),
            per_handle_limit: 0,
            top_n: 0,
        }
        .clamped();
        assert_eq!(s.per_handle_limit, 1);
        assert_eq!(s.top_n, 1);
        assert_eq!(s.source_base, "https://mirror.example");
    }

    #[test]
    fn test_clamped_blank_source_uses_default() {
        let s = Settings {
            source_base: "   ".into(),
            ..Settings::default()
        }
        .clamped();
        assert_eq!(s.source_base, DEFAULT_SOURCE_BASE);
    }

    #[test]
    fn test_merge_overlays_present_fields_only() {
        let defaults = Settings {
            source_base: "https://from-config.example".into(),
            per_handle_limit: 3,
            top_n: 4,
        };
        let merged = merge_settings(&defaults, r#"{"top_n": 20, "source_base": null}"#);
        assert_eq!(merged.top_n, 20);
        assert_eq!(merged.per_handle_limit, 3);
        assert_eq!(merged.source_base, "https://from-config.example");
    }

    #[test]
    fn test_update_only_writes_given_fields() {
        let update = SettingsUpdate {
            top_n: Some(3),
            ..SettingsUpdate::default()
        };
        let stored = merge_settings_update(Some(r#"{"per_handle_limit": 2}"#), &update).unwrap();

        let defaults = Settings {
            source_base: "https://later-config.example".into(),
            ..Settings::default()
        };
        let merged = merge_settings(&defaults, &stored);
        assert_eq!(merged.top_n, 3);
        assert_eq!(merged.per_handle_limit, 2);
        assert_eq!(merged.source_base, "https://later-config.example");
    }

    #[test]
    fn test_update_replaces_unreadable_stored_json() {
        let update = SettingsUpdate {
            top_n: Some(3),
            ..SettingsUpdate::default()
        };
        let stored = merge_settings_update(Some("{oops"), &update).unwrap();
        assert_eq!(stored, r#"{"top_n":3}"#);
    }

    #[test]
    fn test_update_then_and_apply() {
        let older = SettingsUpdate {
            top_n: Some(3),
            per_handle_limit: Some(2),
            ..SettingsUpdate::default()
        };
        let newer = SettingsUpdate {
            top_n: Some(9),
            ..SettingsUpdate::default()
        };
        let combined = older.then(&newer);
        assert_eq!(combined.top_n, Some(9));
        assert_eq!(combined.per_handle_limit, Some(2));
        assert!(combined.source_base.is_none());

        let applied = combined.apply_to(Settings::default());
        assert_eq!(applied.top_n, 9);
        assert_eq!(applied.source_base, DEFAULT_SOURCE_BASE);
        assert!(SettingsUpdate::default().is_empty());
    }

    #[test]
    fn test_merge_garbage_falls_back_to_defaults() {
        let defaults = Settings::default();
        assert_eq!(merge_settings(&defaults, "{not json"), defaults);
        assert_eq!(merge_settings(&defaults, "[1, 2]"), defaults);
        assert_eq!(merge_settings(&defaults, r#"{"top_n": "many"}"#), defaults);
    }
}
