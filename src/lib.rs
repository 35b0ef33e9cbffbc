//! # ubr-ratecard
//!
//! Turn the UBR pricing rules of a text or PDF document into rate cards
//! using a Large Language Model.
//!
//! A UBR document is a sequence of blocks, each introduced by a delimiter
//! such as `UBR 12:` and followed by free-text pricing instructions. Every
//! block is sent to the model, which either answers directly or asks for a
//! rate card priced for a number of learners and days. The replies are
//! written, in document order, to a single output file.
//!
//! ## Pipeline Overview
//!
//! ```text
//! text / PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Document  read UTF-8 text, or extract page text via pdfium
//!  ├─ 3. Extract   split into ordered `UBR <n>:` blocks
//!  ├─ 4. Dispatch  per block: decide, then price with the rate card prompt
//!  ├─ 5. Check     pass the reply through or enforce the rate card format
//!  └─ 6. Output    replies joined by a blank line + per-block stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ubr_ratecard::{run_to_file, RateCardConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = RateCardConfig::default();
//!     let stats = run_to_file("UBR.txt", "UBR_Complete.txt", &config).await?;
//!     eprintln!("{}/{} blocks", stats.completed_blocks, stats.total_blocks);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ratecard` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! ubr-ratecard = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    DocumentFormat, FailurePolicy, RateCardConfig, RateCardConfigBuilder, ReplyPolicy,
    DEFAULT_MODEL,
};
pub use error::{BlockError, RateCardError};
pub use manifest::Manifest;
pub use output::{BlockResult, RunOutput, RunStats};
pub use pipeline::dispatch::Decision;
pub use pipeline::extract::{extract_blocks, Block, BlockMap};
pub use pipeline::llm::{Completion, GeneratorError, TextGenerator};
pub use pipeline::rate::RateRequest;
pub use pipeline::reply::RateCard;
pub use progress::{NoopProgressCallback, ProgressCallback, RunProgressCallback};
pub use run::{extract, run, run_sync, run_to_file};
pub use stream::{run_stream, BlockStream};
