//! Runtime-tunable settings storage.
//!
//! Persists operator-adjustable settings to disk at
//! `{working_dir}/.simforge/settings.json`. Environment-derived config is
//! used as the initial default when no settings file exists. Changing the
//! provider here takes effect after `ProviderFactory::reset`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Operator-adjustable settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Content provider override ("openai", "anthropic", "mock").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// In-memory store for runtime settings with disk persistence.
#[derive(Debug)]
pub struct SettingsStore {
    settings: RwLock<Settings>,
    storage_path: PathBuf,
}

impl SettingsStore {
    /// Create a new settings store, loading from disk if available.
    pub async fn new(working_dir: &PathBuf) -> Self {
        let storage_path = working_dir.join(".simforge/settings.json");

        let settings = if storage_path.exists() {
            match Self::load_from_path(&storage_path) {
                Ok(s) => {
                    tracing::info!("Loaded settings from {}", storage_path.display());
                    s
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to load settings from {}: {}, using defaults",
                        storage_path.display(),
                        e
                    );
                    Settings::default()
                }
            }
        } else {
            Settings::default()
        };

        Self {
            settings: RwLock::new(settings),
            storage_path,
        }
    }

    fn load_from_path(path: &PathBuf) -> Result<Settings, std::io::Error> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    async fn save_to_disk(&self) -> Result<(), std::io::Error> {
        let settings = self.settings.read().await;

        if let Some(parent) = self.storage_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(&*settings)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        std::fs::write(&self.storage_path, contents)?;
        tracing::debug!("Saved settings to {}", self.storage_path.display());
        Ok(())
    }

    /// Get a clone of the current settings.
    pub async fn get(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Get the provider override.
    pub async fn get_provider(&self) -> Option<String> {
        self.settings.read().await.provider.clone()
    }

    /// Update the provider override.
    ///
    /// Returns the previous value if it changed, or None if unchanged.
    pub async fn set_provider(
        &self,
        provider: Option<String>,
    ) -> Result<Option<String>, std::io::Error> {
        let mut settings = self.settings.write().await;
        let previous = settings.provider.clone();

        if previous != provider {
            settings.provider = provider;
            drop(settings); // Release lock before saving
            self.save_to_disk().await?;
            Ok(previous)
        } else {
            Ok(None) // No change
        }
    }
}

/// Shared settings store wrapped in Arc for concurrent access.
pub type SharedSettingsStore = Arc<SettingsStore>;
