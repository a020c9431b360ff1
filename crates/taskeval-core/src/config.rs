use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::backend::{BackendSelector, RouteRule};
use crate::provider::{anthropic, openai, AnthropicClient, OpenAiClient, Providers};
use crate::retrieval::{DocumentStore, HttpEmbedder, Retriever};
use crate::tasks::Harness;
use crate::tools::ToolRegistry;

/// Top-level YAML document. Every field has a default, so an empty file is
/// a valid config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    #[serde(default)]
    pub data: Option<DataConfig>,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default = "BackendSelector::default_rules")]
    pub routing: Vec<RouteRule>,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

fn default_concurrency() -> usize {
    8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub path: PathBuf,
}

/// Provider blocks may be partial; every omitted field, `api_key_env`
/// included, takes that provider's default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawProvidersConfig")]
pub struct ProvidersConfig {
    pub openai: ProviderConfig,
    pub anthropic: ProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: ProviderConfig::openai(),
            anthropic: ProviderConfig::anthropic(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderConfig {
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Deserialize)]
struct RawProvidersConfig {
    #[serde(default)]
    openai: Option<RawProviderConfig>,
    #[serde(default)]
    anthropic: Option<RawProviderConfig>,
}

#[derive(Deserialize)]
struct RawProviderConfig {
    #[serde(default)]
    api_key_env: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

impl RawProviderConfig {
    fn over(self, defaults: ProviderConfig) -> ProviderConfig {
        ProviderConfig {
            api_key_env: self.api_key_env.unwrap_or(defaults.api_key_env),
            base_url: self.base_url.or(defaults.base_url),
            timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
        }
    }
}

impl From<RawProvidersConfig> for ProvidersConfig {
    fn from(raw: RawProvidersConfig) -> Self {
        let fill = |block: Option<RawProviderConfig>, defaults: ProviderConfig| match block {
            Some(block) => block.over(defaults),
            None => defaults,
        };
        Self {
            openai: fill(raw.openai, ProviderConfig::openai()),
            anthropic: fill(raw.anthropic, ProviderConfig::anthropic()),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

impl ProviderConfig {
    fn openai() -> Self {
        Self {
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    fn anthropic() -> Self {
        Self {
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// The key from the environment, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .context("Failed to build HTTP client")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default)]
    pub embedding: Option<EmbeddingConfig>,
}

fn default_top_k() -> usize {
    5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            embedding: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            data: None,
            models: Vec::new(),
            concurrency: default_concurrency(),
            providers: ProvidersConfig::default(),
            routing: BackendSelector::default_rules(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl EvalConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).context("Invalid taskeval config")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        Self::from_yaml(&text).with_context(|| format!("Failed to parse config {:?}", path))
    }

    /// Provider clients for every provider whose key is present in the
    /// environment. Missing keys surface later, when a task is routed there.
    pub fn providers(&self) -> Result<Providers> {
        let mut providers = Providers::new();

        let cfg = &self.providers.openai;
        if let Some(key) = cfg.api_key() {
            let client = OpenAiClient::new(key)
                .with_base_url(cfg.base_url.as_deref().unwrap_or(openai::DEFAULT_BASE_URL))
                .with_http_client(cfg.http_client()?);
            providers = providers.with_primary(Arc::new(client));
        } else {
            tracing::debug!(env = %cfg.api_key_env, "OpenAI key not set");
        }

        let cfg = &self.providers.anthropic;
        if let Some(key) = cfg.api_key() {
            let client = AnthropicClient::new(key)
                .with_base_url(cfg.base_url.as_deref().unwrap_or(anthropic::DEFAULT_BASE_URL))
                .with_http_client(cfg.http_client()?);
            providers = providers.with_secondary(Arc::new(client));
        } else {
            tracing::debug!(env = %cfg.api_key_env, "Anthropic key not set");
        }

        Ok(providers)
    }

    pub fn retriever(&self) -> Retriever {
        let Some(embedding) = &self.retrieval.embedding else {
            return Retriever::keyword();
        };
        let mut embedder = HttpEmbedder::new(&embedding.base_url, &embedding.model);
        if let Some(key) = embedding
            .api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
        {
            embedder = embedder.with_api_key(key);
        }
        Retriever::with_embedder(Arc::new(embedder))
    }
}

impl Harness {
    /// Build a harness from config, using the process-wide document store.
    pub fn from_config(config: &EvalConfig) -> Result<Self> {
        Ok(Harness::builder()
            .providers(config.providers()?)
            .selector(BackendSelector::new(config.routing.clone()))
            .tools(ToolRegistry::builtin())
            .retriever(config.retriever())
            .documents(DocumentStore::global())
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;

    #[test]
    fn test_empty_document_is_default() {
        let config = EvalConfig::from_yaml("").unwrap();
        assert_eq!(config.concurrency, 8);
        assert!(config.models.is_empty());
        assert_eq!(config.routing, BackendSelector::default_rules());
        assert_eq!(config.providers.openai.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.retrieval.default_top_k, 5);
    }

    #[test]
    fn test_full_document() {
        let yaml = r#"
data:
  path: suites/smoke.jsonl
models: [gpt-4o-mini, claude-3-haiku, local-mock]
concurrency: 2
providers:
  openai:
    api_key_env: TASKEVAL_TEST_OPENAI
    base_url: http://localhost:9999
    timeout_secs: 5
routing:
  - prefix: gpt-
    backend: primary
  - prefix: mistral-
    backend: secondary
retrieval:
  default_top_k: 3
  embedding:
    base_url: http://localhost:8080
    model: text-embedding-3-small
"#;
        let config = EvalConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.data.as_ref().unwrap().path, PathBuf::from("suites/smoke.jsonl"));
        assert_eq!(config.models.len(), 3);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.providers.openai.timeout_secs, 5);
        assert_eq!(config.providers.anthropic.api_key_env, "ANTHROPIC_API_KEY");

        let selector = BackendSelector::new(config.routing.clone());
        assert_eq!(selector.select("mistral-large"), Backend::Secondary);
        assert_eq!(selector.select("claude-3"), Backend::Fallback);
        assert!(config.retriever().is_semantic());
    }

    #[test]
    fn test_partial_provider_block_keeps_defaults() {
        let yaml = "providers:\n  openai:\n    base_url: http://localhost:9999\n";
        let config = EvalConfig::from_yaml(yaml).unwrap();
        let openai = &config.providers.openai;
        assert_eq!(openai.api_key_env, "OPENAI_API_KEY");
        assert_eq!(openai.base_url.as_deref(), Some("http://localhost:9999"));
        assert_eq!(openai.timeout_secs, 60);
        assert_eq!(config.providers.anthropic.api_key_env, "ANTHROPIC_API_KEY");

        let config = EvalConfig::from_yaml("providers:\n  anthropic:\n    timeout_secs: 5\n").unwrap();
        assert_eq!(config.providers.anthropic.api_key_env, "ANTHROPIC_API_KEY");
        assert_eq!(config.providers.anthropic.timeout_secs, 5);

        let config = EvalConfig::from_yaml("providers:\n  openai: {}\n").unwrap();
        assert_eq!(config.providers.openai.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let err = EvalConfig::from_yaml("routing:\n  - prefix: x\n    backend: tertiary\n").unwrap_err();
        assert!(format!("{err:#}").contains("tertiary"));
    }

    #[test]
    fn test_missing_keys_leave_providers_unconfigured() {
        let yaml = "providers:\n  openai:\n    api_key_env: TASKEVAL_TEST_UNSET_OPENAI\n  anthropic:\n    api_key_env: TASKEVAL_TEST_UNSET_ANTHROPIC\n";
        let config = EvalConfig::from_yaml(yaml).unwrap();
        let providers = config.providers().unwrap();
        assert!(!providers.is_configured(Backend::Primary));
        assert!(!providers.is_configured(Backend::Secondary));
        assert!(providers.is_configured(Backend::Fallback));
    }
}
