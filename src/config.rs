//! Configuration types for a rate-card run.
//!
//! Every knob of a run lives in [`RateCardConfig`], built via its
//! [`RateCardConfigBuilder`]. The CLI maps its flags onto the builder; library
//! callers set only what they need and rely on the defaults for the rest.
//! Nothing in the pipeline reads process environment directly except provider
//! auto-detection, and that only when no provider was configured here.

use crate::error::RateCardError;
use crate::pipeline::llm::TextGenerator;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-5-mini";

/// Configuration for a rate-card run.
///
/// # Example
/// ```rust
/// use ubr_ratecard::{FailurePolicy, RateCardConfig, ReplyPolicy};
///
/// let config = RateCardConfig::builder()
///     .model("gpt-5-mini")
///     .learners(12)
///     .days(3)
///     .reply_policy(ReplyPolicy::Strict)
///     .failure_policy(FailurePolicy::Abort)
///     .build()
///     .unwrap();
/// assert_eq!(config.learners, Some(12));
/// ```
#[derive(Clone)]
pub struct RateCardConfig {
    /// LLM model identifier. If None, provider resolution uses `RATECARD_MODEL`
    /// when set, otherwise [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider` and `generator`, the provider is
    /// auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed `edgequake-llm` provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed text generator. Takes precedence over everything else.
    pub generator: Option<Arc<dyn TextGenerator>>,

    /// Sampling temperature. Default: None (provider default).
    ///
    /// Some reasoning models only accept their own default temperature, so
    /// nothing is sent unless a value is set here.
    pub temperature: Option<f32>,

    /// Maximum tokens per reply. Default: None (provider default).
    pub max_tokens: Option<usize>,

    /// Fixed learner count. When both `learners` and `days` are set, the
    /// dispatch step is skipped and every block goes straight to the rate
    /// card request. A value set here always overrides the model's choice.
    pub learners: Option<u32>,

    /// Fixed day count. See `learners`.
    pub days: Option<u32>,

    /// How replies are checked before they are accepted. Default: pass through.
    pub reply_policy: ReplyPolicy,

    /// What a failed block does to the rest of the run. Default: continue.
    pub failure_policy: FailurePolicy,

    /// Reuse completed replies recorded in an existing manifest. Default: false.
    ///
    /// Only meaningful for [`crate::run::run_to_file`], which owns the manifest.
    pub resume: bool,

    /// Declared input format. Default: [`DocumentFormat::Auto`].
    pub format: DocumentFormat,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Per-service-call timeout in seconds. Default: None (wait indefinitely).
    pub api_timeout_secs: Option<u64>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-block progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RateCardConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            generator: None,
            temperature: None,
            max_tokens: None,
            learners: None,
            days: None,
            reply_policy: ReplyPolicy::default(),
            failure_policy: FailurePolicy::default(),
            resume: false,
            format: DocumentFormat::default(),
            password: None,
            api_timeout_secs: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RateCardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateCardConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("generator", &self.generator.as_ref().map(|_| "<dyn TextGenerator>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("learners", &self.learners)
            .field("days", &self.days)
            .field("reply_policy", &self.reply_policy)
            .field("failure_policy", &self.failure_policy)
            .field("resume", &self.resume)
            .field("format", &self.format)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .finish()
    }
}

impl RateCardConfig {
    /// Create a new builder for `RateCardConfig`.
    pub fn builder() -> RateCardConfigBuilder {
        RateCardConfigBuilder {
            config: Self::default(),
        }
    }

    /// `(learners, days)` when both are fixed, so the dispatch step can be skipped.
    pub fn fixed_parameters(&self) -> Option<(u32, u32)> {
        self.learners.zip(self.days)
    }

    /// The configured model, or [`DEFAULT_MODEL`].
    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`RateCardConfig`].
pub struct RateCardConfigBuilder {
    config: RateCardConfig,
}

impl fmt::Debug for RateCardConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateCardConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl RateCardConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.config.generator = Some(generator);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn learners(mut self, n: u32) -> Self {
        self.config.learners = Some(n);
        self
    }

    pub fn days(mut self, n: u32) -> Self {
        self.config.days = Some(n);
        self
    }

    pub fn reply_policy(mut self, policy: ReplyPolicy) -> Self {
        self.config.reply_policy = policy;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn resume(mut self, v: bool) -> Self {
        self.config.resume = v;
        self
    }

    pub fn format(mut self, format: DocumentFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RateCardConfig, RateCardError> {
        let c = &self.config;
        if c.learners == Some(0) {
            return Err(RateCardError::InvalidConfig(
                "Learner count must be ≥ 1".into(),
            ));
        }
        if c.days == Some(0) {
            return Err(RateCardError::InvalidConfig("Day count must be ≥ 1".into()));
        }
        if let Some(t) = c.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(RateCardError::InvalidConfig(format!(
                    "Temperature must be 0.0–2.0, got {}",
                    t
                )));
            }
        }
        if c.api_timeout_secs == Some(0) {
            return Err(RateCardError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(RateCardError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }
        if matches!(c.model.as_deref(), Some(m) if m.trim().is_empty()) {
            return Err(RateCardError::InvalidConfig("Model must not be empty".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Declared format of the input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Detect from the file extension, then from the `%PDF` magic bytes. (default)
    #[default]
    Auto,
    /// UTF-8 plain text.
    Text,
    /// PDF; text is extracted page by page.
    Pdf,
}

/// How a reply is checked before it is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyPolicy {
    /// Write the reply through verbatim. (default)
    #[default]
    PassThrough,
    /// Parse the reply as a rate card; reject anything that does not match
    /// the four-line format and write the canonical rendering.
    Strict,
}

/// What happens to the rest of the run when one block fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and move on to the next block. (default)
    #[default]
    Continue,
    /// Stop at the first failed block and return [`RateCardError::BlockFailed`].
    Abort,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_through_and_continue() {
        let config = RateCardConfig::default();
        assert_eq!(config.reply_policy, ReplyPolicy::PassThrough);
        assert_eq!(config.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.format, DocumentFormat::Auto);
        assert_eq!(config.api_timeout_secs, None);
        assert_eq!(config.model_name(), DEFAULT_MODEL);
        assert_eq!(config.fixed_parameters(), None);
    }

    #[test]
    fn zero_learners_rejected() {
        let err = RateCardConfig::builder().learners(0).build().unwrap_err();
        assert!(err.to_string().contains("Learner"));
    }

    #[test]
    fn zero_days_rejected() {
        assert!(RateCardConfig::builder().days(0).build().is_err());
    }

    #[test]
    fn temperature_out_of_range_rejected() {
        assert!(RateCardConfig::builder().temperature(3.5).build().is_err());
        assert!(RateCardConfig::builder().temperature(0.2).build().is_ok());
    }

    #[test]
    fn zero_api_timeout_rejected() {
        assert!(RateCardConfig::builder().api_timeout_secs(0).build().is_err());
    }

    #[test]
    fn fixed_parameters_need_both_counts() {
        let one = RateCardConfig::builder().learners(5).build().unwrap();
        assert_eq!(one.fixed_parameters(), None);
        let both = RateCardConfig::builder().learners(5).days(2).build().unwrap();
        assert_eq!(both.fixed_parameters(), Some((5, 2)));
    }

    #[test]
    fn debug_redacts_password() {
        let config = RateCardConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{:?}", config);
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn policies_deserialize_from_snake_case() {
        let p: ReplyPolicy = serde_json::from_str("\"strict\"").unwrap();
        assert_eq!(p, ReplyPolicy::Strict);
        let f: FailurePolicy = serde_json::from_str("\"abort\"").unwrap();
        assert_eq!(f, FailurePolicy::Abort);
        let d: DocumentFormat = serde_json::from_str("\"pdf\"").unwrap();
        assert_eq!(d, DocumentFormat::Pdf);
    }
}
