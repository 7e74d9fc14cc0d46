//! Provider resolution.
//!
//! Configuration is resolved into a concrete client exactly once per
//! process and memoized; `reset` forces re-resolution (tests, or a hot
//! provider change through the settings store). The resolved client is
//! read-only after construction and safe to share across concurrent
//! workflow runs.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::Config;
use crate::settings::SharedSettingsStore;

use super::{AnthropicClient, LlmClient, LlmError, MockClient, OpenAiClient};

/// Resolves and memoizes the process-wide content provider.
pub struct ProviderFactory {
    config: Config,
    settings: SharedSettingsStore,
    client: RwLock<Option<Arc<dyn LlmClient>>>,
}

impl ProviderFactory {
    pub fn new(config: Config, settings: SharedSettingsStore) -> Self {
        Self {
            config,
            settings,
            client: RwLock::new(None),
        }
    }

    /// Get the resolved provider, resolving on first use.
    pub async fn get(&self) -> Result<Arc<dyn LlmClient>, LlmError> {
        if let Some(client) = self.client.read().await.as_ref() {
            return Ok(Arc::clone(client));
        }

        let mut guard = self.client.write().await;
        // Another caller may have resolved while we waited for the lock.
        if let Some(client) = guard.as_ref() {
            return Ok(Arc::clone(client));
        }

        let name = self
            .settings
            .get_provider()
            .await
            .unwrap_or_else(|| self.config.provider.clone());
        let client = self.resolve(&name)?;
        tracing::info!(provider = %name, "resolved content provider");
        *guard = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Drop the memoized provider so the next `get` re-resolves.
    pub async fn reset(&self) {
        *self.client.write().await = None;
        tracing::info!("provider factory reset");
    }

    fn resolve(&self, name: &str) -> Result<Arc<dyn LlmClient>, LlmError> {
        match name {
            "mock" => Ok(Arc::new(MockClient::new())),
            "openai" => {
                let key = self.config.openai_api_key.as_deref().ok_or_else(|| {
                    LlmError::configuration("provider \"openai\" selected but OPENAI_API_KEY is not set")
                })?;
                Ok(Arc::new(OpenAiClient::new(
                    key,
                    self.config.model_for("openai"),
                    self.config.request_timeout,
                )))
            }
            "anthropic" => {
                let key = self.config.anthropic_api_key.as_deref().ok_or_else(|| {
                    LlmError::configuration(
                        "provider \"anthropic\" selected but ANTHROPIC_API_KEY is not set",
                    )
                })?;
                Ok(Arc::new(AnthropicClient::new(
                    key,
                    self.config.model_for("anthropic"),
                    self.config.request_timeout,
                )))
            }
            other => Err(LlmError::configuration(format!(
                "unknown provider {other:?}; expected one of: openai, anthropic, mock"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmErrorKind;
    use crate::settings::SettingsStore;

    async fn factory_with(config: Config) -> (ProviderFactory, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let settings = Arc::new(SettingsStore::new(&dir.path().to_path_buf()).await);
        (ProviderFactory::new(config, settings), dir)
    }

    #[tokio::test]
    async fn mock_resolves_without_credentials() {
        let (factory, _dir) = factory_with(Config::default()).await;
        let client = factory.get().await.unwrap();
        assert_eq!(client.name(), "mock");
    }

    #[tokio::test]
    async fn get_memoizes_until_reset() {
        let (factory, _dir) = factory_with(Config::default()).await;
        let first = factory.get().await.unwrap();
        let second = factory.get().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        factory.reset().await;
        let third = factory.get().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[tokio::test]
    async fn missing_key_is_a_configuration_error() {
        let config = Config {
            provider: "openai".to_string(),
            ..Config::default()
        };
        let (factory, _dir) = factory_with(config).await;
        let err = match factory.get().await {
            Ok(_) => panic!("called `Result::unwrap_err()` on an `Ok` value"),
            Err(e) => e,
        };
        assert_eq!(err.kind, LlmErrorKind::Configuration);
        assert!(err.message.contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn anthropic_resolves_with_key() {
        let config = Config {
            provider: "anthropic".to_string(),
            anthropic_api_key: Some("sk-ant-test".to_string()),
            ..Config::default()
        };
        let (factory, _dir) = factory_with(config).await;
        let client = factory.get().await.unwrap();
        assert_eq!(client.name(), "anthropic");
    }

    #[tokio::test]
    async fn unknown_provider_is_a_configuration_error() {
        let config = Config {
            provider: "palm".to_string(),
            ..Config::default()
        };
        let (factory, _dir) = factory_with(config).await;
        let err = match factory.get().await {
            Ok(_) => panic!("called `Result::unwrap_err()` on an `Ok` value"),
            Err(e) => e,
        };
        assert_eq!(err.kind, LlmErrorKind::Configuration);
    }

    #[tokio::test]
    async fn settings_override_wins_after_reset() {
        let config = Config {
            provider: "openai".to_string(),
            openai_api_key: Some("sk-test".to_string()),
            ..Config::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let settings = Arc::new(SettingsStore::new(&dir.path().to_path_buf()).await);
        let factory = ProviderFactory::new(config, Arc::clone(&settings));

        assert_eq!(factory.get().await.unwrap().name(), "openai");

        settings.set_provider(Some("mock".to_string())).await.unwrap();
        factory.reset().await;
        assert_eq!(factory.get().await.unwrap().name(), "mock");
    }
}
