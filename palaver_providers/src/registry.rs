//! Model-id to backend lookup.

use crate::{DeepSeekBackend, GeminiBackend, GrokBackend, OpenRouterBackend};
use palaver_core::{ChatBackend, ProviderFamily, find_model};

/// API keys for every configured family. A family left keyless still
/// constructs; its requests fail upstream with a 401.
#[derive(Debug, Clone, Default)]
pub struct ProviderKeys {
    pub openrouter: String,
    pub deepseek: String,
    pub grok: String,
    pub gemini: String,
}

pub struct ProviderRegistry {
    openrouter: OpenRouterBackend,
    deepseek: DeepSeekBackend,
    grok: GrokBackend,
    gemini: GeminiBackend,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new(keys: ProviderKeys) -> Self {
        Self {
            openrouter: OpenRouterBackend::new(keys.openrouter),
            deepseek: DeepSeekBackend::new(keys.deepseek),
            grok: GrokBackend::new(keys.grok),
            gemini: GeminiBackend::new(keys.gemini),
        }
    }

    /// Backend for a selectable model id; `None` for anything outside the
    /// capability table.
    #[must_use]
    pub fn backend_for(&self, model: &str) -> Option<&dyn ChatBackend> {
        let spec = find_model(model)?;
        Some(match spec.family {
            ProviderFamily::OpenRouter => &self.openrouter,
            ProviderFamily::DeepSeek => &self.deepseek,
            ProviderFamily::Grok => &self.grok,
            ProviderFamily::Gemini => &self.gemini,
        })
    }

    /// The Grok backend doubles as the image generator and the
    /// intent-optimization model.
    #[must_use]
    pub const fn grok(&self) -> &GrokBackend {
        &self.grok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_core::{DEFAULT_MODEL, SUPPORTED_MODELS};

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new(ProviderKeys::default())
    }

    #[test]
    fn test_default_model_routes_to_grok() {
        let registry = registry();
        let Some(backend) = registry.backend_for(DEFAULT_MODEL) else {
            panic!("default model must resolve");
        };
        assert_eq!(backend.family(), ProviderFamily::Grok);
    }

    #[test]
    fn test_every_supported_model_resolves() {
        let registry = registry();
        for spec in SUPPORTED_MODELS {
            let Some(backend) = registry.backend_for(spec.id) else {
                panic!("{} must resolve", spec.id);
            };
            assert_eq!(backend.family(), spec.family);
        }
    }

    #[test]
    fn test_unknown_model_has_no_backend() {
        assert!(registry().backend_for("gpt-5").is_none());
    }
}
