//! Builds the completion provider from settings.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::info;

use verso_core::LlmProvider;
use verso_llm::{AnthropicConfig, AnthropicProvider, MockProvider, ReliableConfig, ReliableProvider};
use verso_settings::{LlmSettings, ProviderKind};

/// `mock_script` wins over the configured provider kind.
pub fn build_provider(settings: &LlmSettings, mock_script: Option<&Path>) -> Result<Arc<dyn LlmProvider>> {
    if let Some(path) = mock_script {
        return mock_from_script(path);
    }

    match settings.provider {
        ProviderKind::Mock => bail!("the mock provider needs a response script; pass --mock <FILE>"),
        ProviderKind::Anthropic => {
            let Some(api_key) = settings.api_key.clone() else {
                bail!("ANTHROPIC_API_KEY is not set");
            };
            let mut config = AnthropicConfig::new(api_key);
            config.model = settings.model.clone();
            config.request_timeout = settings.request_timeout_ms.map(Duration::from_millis);

            let inner = AnthropicProvider::new(config).context("failed to build Anthropic client")?;
            let reliable = ReliableConfig {
                max_retries: settings.max_retries,
                base_delay: Duration::from_millis(settings.base_delay_ms),
                ..Default::default()
            };
            info!(model = inner.model(), retries = settings.max_retries, "using anthropic provider");
            Ok(Arc::new(ReliableProvider::new(inner, reliable)))
        }
    }
}

/// A JSON array of strings, served in order.
fn mock_from_script(path: &Path) -> Result<Arc<dyn LlmProvider>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read mock script {}", path.display()))?;
    let responses: Vec<String> = serde_json::from_str(&raw)
        .with_context(|| format!("mock script {} must be a JSON array of strings", path.display()))?;
    info!(responses = responses.len(), "using scripted mock provider");
    Ok(Arc::new(MockProvider::texts(responses)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anthropic_without_key_fails() {
        let settings = LlmSettings::default();
        let err = build_provider(&settings, None).err().unwrap();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn mock_kind_requires_script() {
        let settings = LlmSettings {
            provider: ProviderKind::Mock,
            ..Default::default()
        };
        assert!(build_provider(&settings, None).is_err());
    }

    #[tokio::test]
    async fn script_feeds_mock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        std::fs::write(&path, r#"["first", "second"]"#).unwrap();

        let provider = build_provider(&LlmSettings::default(), Some(&path)).unwrap();
        assert_eq!(provider.name(), "mock");
        let request = verso_core::CompletionRequest::new("hi");
        assert_eq!(provider.complete(&request).await.unwrap(), "first");
        assert_eq!(provider.complete(&request).await.unwrap(), "second");
    }

    #[test]
    fn bad_script_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        std::fs::write(&path, r#"{"not": "a list"}"#).unwrap();
        let err = build_provider(&LlmSettings::default(), Some(&path)).err().unwrap();
        assert!(err.to_string().contains("JSON array"));
    }
}
