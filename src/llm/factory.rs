use super::anthropic::AnthropicProvider;
use super::gemini::GeminiProvider;
use super::traits::Provider;
use crate::config::{Config, ProviderKind};
use std::sync::Arc;

/// Build the configured model client.
pub fn create_provider(config: &Config) -> Arc<dyn Provider> {
    let model = config.resolved_model();
    let api_key = config.api_key.as_deref();
    let base_url = config.base_url.as_deref();
    tracing::info!(provider = %config.provider, model, "creating model client");

    match config.provider {
        ProviderKind::Anthropic => Arc::new(
            AnthropicProvider::with_base_url(api_key, base_url, model)
                .with_max_tokens(config.max_output_tokens)
                .with_thinking_budget(config.thinking_budget),
        ),
        ProviderKind::Gemini => Arc::new(
            GeminiProvider::with_base_url(api_key, base_url, model)
                .with_max_tokens(config.max_output_tokens)
                .with_thinking_budget(config.thinking_budget),
        ),
    }
}
