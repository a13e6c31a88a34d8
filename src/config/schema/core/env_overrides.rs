use super::{Config, ProviderKind};

impl Config {
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Credentials and model ids are read from the provider-specific variables
    /// of whichever provider is active after `AI_PROVIDER` is applied.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(provider) = var("AI_PROVIDER") {
            match provider.parse::<ProviderKind>() {
                Ok(kind) => self.provider = kind,
                Err(e) => tracing::warn!("ignoring AI_PROVIDER override: {e}"),
            }
        }

        let (model_var, key_vars, url_var): (&str, &[&str], &str) = match self.provider {
            ProviderKind::Anthropic => ("CLAUDE_MODEL", &["ANTHROPIC_API_KEY"], "ANTHROPIC_BASE_URL"),
            ProviderKind::Gemini => (
                "GEMINI_MODEL",
                &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
                "GEMINI_BASE_URL",
            ),
        };

        if let Some(model) = var(model_var) {
            self.model = Some(model);
        }
        if let Some(key) = key_vars.iter().find_map(|name| var(name)) {
            self.api_key = Some(key);
        }
        if let Some(url) = var(url_var) {
            self.base_url = Some(url);
        }
        if let Some(level) = var("CODEBUDDY_LOG_LEVEL") {
            self.log_level = level;
        }
    }
}
