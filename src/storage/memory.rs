use std::sync::Mutex;

use anyhow::{anyhow, Result};

use super::types::{Settings, SettingsUpdate};
use super::Store;

/// In-process [`Store`] for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    handles: Mutex<Vec<String>>,
    /// Saved fields only; the rest come from `defaults`.
    saved: Mutex<SettingsUpdate>,
    defaults: Settings,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with `handles` and default settings.
    pub fn with_handles<I, S>(handles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            handles: Mutex::new(handles.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> anyhow::Error {
    anyhow!("memory store lock poisoned")
}

impl Store for MemoryStore {
    async fn get_handles(&self) -> Result<Vec<String>> {
        Ok(self.handles.lock().map_err(poisoned)?.clone())
    }

    async fn set_handles(&self, handles: &[String]) -> Result<()> {
        *self.handles.lock().map_err(poisoned)? = handles.to_vec();
        Ok(())
    }

    async fn get_settings(&self) -> Result<Settings> {
        let saved = self.saved.lock().map_err(poisoned)?;
        Ok(saved.apply_to(self.defaults.clone()))
    }

    async fn set_settings(&self, settings: &Settings) -> Result<()> {
        *self.saved.lock().map_err(poisoned)? = SettingsUpdate::from(settings);
        Ok(())
    }

    async fn update_settings(&self, update: &SettingsUpdate) -> Result<()> {
        let mut saved = self.saved.lock().map_err(poisoned)?;
        *saved = std::mem::take(&mut *saved).then(update);
        Ok(())
    }

    async fn reset_settings(&self) -> Result<()> {
        *self.saved.lock().map_err(poisoned)? = SettingsUpdate::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeded_handles() {
        let store = MemoryStore::with_handles(["jack", "naval"]);
        assert_eq!(store.get_handles().await.unwrap(), vec!["jack", "naval"]);
    }

    #[tokio::test]
    async fn test_settings_round_trip_and_reset() {
        let store = MemoryStore::new();
        assert_eq!(store.get_settings().await.unwrap(), Settings::default());

        let custom = Settings {
            per_handle_limit: 2,
            ..Settings::default()
        };
        store.set_settings(&custom).await.unwrap();
        assert_eq!(store.get_settings().await.unwrap(), custom);

        store.reset_settings().await.unwrap();
        assert_eq!(store.get_settings().await.unwrap(), Settings::default());
    }

    #[tokio::test]
    async fn test_update_settings_is_field_level() {
        let store = MemoryStore::new();
        store
            .update_settings(&SettingsUpdate {
                top_n: Some(4),
                ..SettingsUpdate::default()
            })
            .await
            .unwrap();
        store
            .update_settings(&SettingsUpdate {
                source_base: Some("https://mirror.example".into()),
                ..SettingsUpdate::default()
            })
            .await
            .unwrap();

        let settings = store.get_settings().await.unwrap();
        assert_eq!(settings.top_n, 4);
        assert_eq!(settings.source_base, "https://mirror.example");
        assert_eq!(settings.per_handle_limit, 8);
    }
}
