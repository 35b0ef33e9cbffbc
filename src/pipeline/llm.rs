//! Text-generation seam: the one place that talks to a model.
//!
//! [`TextGenerator`] is the interface the rest of the pipeline depends on:
//! one system prompt plus one user message in, one text reply out. The
//! production implementation, [`LlmGenerator`], forwards to any
//! `edgequake-llm` provider; tests plug in a canned generator instead.
//!
//! Calls are made one at a time and never retried. When
//! `api_timeout_secs` is set, each call is bounded by `tokio::time::timeout`.

use crate::config::{RateCardConfig, DEFAULT_MODEL};
use crate::error::{BlockError, RateCardError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::time::{timeout, Duration};
use tracing::debug;

/// A completed model reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl Completion {
    /// A reply with no token accounting.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Error reported by a [`TextGenerator`].
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct GeneratorError(pub String);

/// Anything that can turn a prompt into a reply.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send `system` + `user` and wait for the complete reply.
    async fn complete(&self, system: &str, user: &str) -> Result<Completion, GeneratorError>;
}

/// [`TextGenerator`] backed by an `edgequake-llm` provider.
pub struct LlmGenerator {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &RateCardConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

#[async_trait]
impl TextGenerator for LlmGenerator {
    async fn complete(&self, system: &str, user: &str) -> Result<Completion, GeneratorError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| GeneratorError(e.to_string()))?;
        Ok(Completion {
            content: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

/// Build `CompletionOptions` from the run config.
fn build_options(config: &RateCardConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        ..Default::default()
    }
}

/// Issue one call on behalf of `block_id`, applying the configured timeout.
pub async fn call(
    generator: &dyn TextGenerator,
    block_id: &str,
    system: &str,
    user: &str,
    api_timeout_secs: Option<u64>,
) -> Result<Completion, BlockError> {
    let start = Instant::now();
    let result = match api_timeout_secs {
        Some(secs) => timeout(Duration::from_secs(secs), generator.complete(system, user))
            .await
            .map_err(|_| BlockError::Timeout {
                block_id: block_id.to_string(),
                secs,
            })?,
        None => generator.complete(system, user).await,
    };

    let completion = result.map_err(|e| BlockError::ServiceFailed {
        block_id: block_id.to_string(),
        detail: e.to_string(),
    })?;
    debug!(
        "{}: {} input tokens, {} output tokens, {:?}",
        block_id,
        completion.input_tokens,
        completion.output_tokens,
        start.elapsed()
    );
    Ok(completion)
}

/// Resolve the generator for a run, from most-specific to least-specific:
///
/// 1. `config.generator` as-is.
/// 2. `config.provider` wrapped in [`LlmGenerator`].
/// 3. `config.provider_name` + model through [`ProviderFactory`].
/// 4. `RATECARD_PROVIDER` + `RATECARD_MODEL`, when both are set.
/// 5. OpenAI, when `OPENAI_API_KEY` is set.
/// 6. [`ProviderFactory::from_env`] auto-detection.
pub fn resolve_generator(config: &RateCardConfig) -> Result<Arc<dyn TextGenerator>, RateCardError> {
    if let Some(ref generator) = config.generator {
        return Ok(Arc::clone(generator));
    }

    if let Some(ref provider) = config.provider {
        return Ok(Arc::new(LlmGenerator::new(Arc::clone(provider), config)));
    }

    let provider = resolve_provider(config)?;
    Ok(Arc::new(LlmGenerator::new(provider, config)))
}

fn resolve_provider(config: &RateCardConfig) -> Result<Arc<dyn LLMProvider>, RateCardError> {
    let env_model = std::env::var("RATECARD_MODEL").ok();
    let model = pick_model(config.model.as_deref(), env_model.clone());

    if let Some(ref name) = config.provider_name {
        return create_provider(name, &model);
    }

    if let (Ok(prov), Some(env_model)) = (std::env::var("RATECARD_PROVIDER"), env_model) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", &model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| RateCardError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

/// Explicit model, then a non-empty `RATECARD_MODEL`, then [`DEFAULT_MODEL`].
fn pick_model(configured: Option<&str>, env_model: Option<String>) -> String {
    configured
        .map(str::to_string)
        .or(env_model.filter(|m| !m.is_empty()))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, RateCardError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        RateCardError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
