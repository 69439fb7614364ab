//! Provider registry: maps a provider name to the client that serves it.

use std::collections::HashMap;

use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::AiConfig;
use crate::llm_client::{CompatibleBackend, LlmBackend, LlmError, OpenAiBackend};

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const MINIMAX_BASE_URL: &str = "https://api.minimaxi.com/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// API key plus optional routing overrides, pushed to a session at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize, new)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    api_key: String,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
}

impl Credential {
    /// A credential that only carries a key.
    pub fn key_only(api_key: impl Into<String>) -> Self {
        Self::new(api_key.into(), None, None, None)
    }
}

/// The model a request will actually be sent to.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct ResolvedModel {
    provider: String,
    model: String,
    api_key: Option<String>,
    base_url: Option<String>,
}

impl ResolvedModel {
    /// Takes each field from `runtime` when set, else from the static config.
    #[instrument(skip(runtime, config), fields(has_runtime = runtime.is_some()))]
    pub fn resolve(runtime: Option<&Credential>, config: &AiConfig) -> Self {
        let non_empty = |s: &Option<String>| s.clone().filter(|v| !v.is_empty());
        let resolved = Self {
            provider: runtime
                .and_then(|c| non_empty(&c.provider))
                .unwrap_or_else(|| config.provider().clone()),
            model: runtime
                .and_then(|c| non_empty(&c.model))
                .unwrap_or_else(|| config.model().clone()),
            api_key: runtime
                .map(|c| c.api_key.clone())
                .filter(|k| !k.is_empty())
                .or_else(|| non_empty(config.api_key())),
            base_url: runtime
                .and_then(|c| non_empty(&c.base_url))
                .or_else(|| non_empty(config.base_url())),
        };
        debug!(provider = %resolved.provider, model = %resolved.model, "Resolved model");
        resolved
    }
}

/// Which client implementation serves a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    /// async-openai against the official API.
    OpenAi,
    /// Plain HTTP against an OpenAI-compatible endpoint.
    Compatible,
}

/// How to build a client for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct ProviderSpec {
    kind: ClientKind,
    client_name: String,
    default_base_url: String,
    api_key_env: String,
    headers: Vec<(String, String)>,
    honours_base_url: bool,
}

impl ProviderSpec {
    /// An OpenAI-compatible provider that accepts a base URL override.
    pub fn compatible(
        client_name: impl Into<String>,
        default_base_url: impl Into<String>,
        api_key_env: impl Into<String>,
    ) -> Self {
        Self {
            kind: ClientKind::Compatible,
            client_name: client_name.into(),
            default_base_url: default_base_url.into(),
            api_key_env: api_key_env.into(),
            headers: Vec::new(),
            honours_base_url: true,
        }
    }

    /// The official OpenAI API.
    pub fn openai() -> Self {
        Self {
            kind: ClientKind::OpenAi,
            client_name: "openai".to_string(),
            default_base_url: OPENAI_BASE_URL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            headers: Vec::new(),
            honours_base_url: false,
        }
    }

    /// Adds a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Always use the default base URL, ignoring configured overrides.
    pub fn pinned(mut self) -> Self {
        self.honours_base_url = false;
        self
    }

    fn openrouter(client_name: &str) -> Self {
        Self::compatible(client_name, OPENROUTER_BASE_URL, "OPENROUTER_API_KEY")
            .with_header("HTTP-Referer", "https://mojo.monad.xyz")
            .with_header("X-Title", "AI Werewolf Game")
    }

    /// Base URL a request will use given an optional override.
    pub fn base_url_for(&self, requested: Option<&str>) -> String {
        match requested {
            Some(url) if self.honours_base_url => url.to_string(),
            _ => self.default_base_url.clone(),
        }
    }
}

/// Builds a backend for a resolved model.
pub trait ModelFactory: Send + Sync + std::fmt::Debug {
    /// Creates the backend that will serve `model`.
    fn build(&self, model: &ResolvedModel) -> Result<Box<dyn LlmBackend>, LlmError>;
}

/// Provider name → client spec, with an explicit default entry.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderSpec>,
    fallback: ProviderSpec,
}

impl ProviderRegistry {
    /// An empty registry that routes everything to `fallback`.
    pub fn with_fallback(fallback: ProviderSpec) -> Self {
        Self {
            providers: HashMap::new(),
            fallback,
        }
    }

    /// Adds or replaces a named provider.
    #[instrument(skip(self, spec))]
    pub fn register(&mut self, name: &str, spec: ProviderSpec) {
        debug!(provider = name, "Registering provider");
        self.providers.insert(name.to_string(), spec);
    }

    /// The spec for `name`, or the default entry when the name is unknown.
    #[instrument(skip(self))]
    pub fn resolve(&self, name: &str) -> &ProviderSpec {
        self.providers.get(name).unwrap_or_else(|| {
            debug!(provider = name, "Unknown provider, using default");
            &self.fallback
        })
    }

    /// Whether `name` has its own entry.
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        let mut registry = Self::with_fallback(ProviderSpec::openrouter("openrouter").pinned());
        registry.register("openai", ProviderSpec::openai());
        registry.register(
            "minimax",
            ProviderSpec::compatible("minimax", MINIMAX_BASE_URL, "MINIMAX_API_KEY"),
        );
        registry.register("openrouter", ProviderSpec::openrouter("openrouter"));
        registry.register(
            "custom",
            ProviderSpec::compatible("custom", OPENROUTER_BASE_URL, "OPENROUTER_API_KEY"),
        );
        registry
    }
}

impl ModelFactory for ProviderRegistry {
    #[instrument(skip(self, model), fields(provider = %model.provider(), model = %model.model()))]
    fn build(&self, model: &ResolvedModel) -> Result<Box<dyn LlmBackend>, LlmError> {
        let spec = self.resolve(model.provider());
        let api_key = model
            .api_key()
            .clone()
            .or_else(|| std::env::var(spec.api_key_env()).ok())
            .unwrap_or_else(|| {
                warn!(env = %spec.api_key_env(), "No API key resolved for provider");
                String::new()
            });

        info!(client = %spec.client_name(), "Building model client");
        match spec.kind() {
            ClientKind::OpenAi => Ok(Box::new(OpenAiBackend::new(
                api_key,
                model.model().clone(),
            ))),
            ClientKind::Compatible => Ok(Box::new(CompatibleBackend::new(
                spec.client_name().clone(),
                spec.base_url_for(model.base_url().as_deref()),
                api_key,
                model.model().clone(),
                spec.headers(),
            )?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_uses_pinned_default() {
        let registry = ProviderRegistry::default();
        let spec = registry.resolve("does-not-exist");
        assert_eq!(spec.client_name(), "openrouter");
        assert_eq!(
            spec.base_url_for(Some("https://example.test/v1")),
            OPENROUTER_BASE_URL
        );
        assert_eq!(spec.headers().len(), 2);
    }

    #[test]
    fn test_known_providers() {
        let registry = ProviderRegistry::default();
        for name in ["openai", "minimax", "openrouter", "custom"] {
            assert!(registry.contains(name), "missing provider {name}");
        }
        assert_eq!(registry.resolve("openai").kind(), &ClientKind::OpenAi);
        assert_eq!(
            registry
                .resolve("custom")
                .base_url_for(Some("https://example.test/v1")),
            "https://example.test/v1"
        );
        assert!(registry.resolve("custom").headers().is_empty());
        assert_eq!(
            registry.resolve("minimax").base_url_for(None),
            MINIMAX_BASE_URL
        );
    }

    #[test]
    fn test_resolve_prefers_runtime_fields() {
        let config = AiConfig::default()
            .with_api_key("config-key")
            .with_base_url("https://config.test/v1");
        let runtime = Credential::new(
            "runtime-key".to_string(),
            Some("minimax".to_string()),
            None,
            None,
        );

        let resolved = ResolvedModel::resolve(Some(&runtime), &config);
        assert_eq!(resolved.provider(), "minimax");
        assert_eq!(resolved.model(), config.model());
        assert_eq!(resolved.api_key().as_deref(), Some("runtime-key"));
        assert_eq!(resolved.base_url().as_deref(), Some("https://config.test/v1"));

        let static_only = ResolvedModel::resolve(None, &config);
        assert_eq!(static_only.api_key().as_deref(), Some("config-key"));
        assert_eq!(static_only.provider(), "openrouter");
    }
}
