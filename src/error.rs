//! Error types for the ubr-ratecard library.
//!
//! Two error types for two failure modes:
//!
//! * [`RateCardError`] is **fatal**: the run cannot proceed (unreadable
//!   input, broken PDF, provider not configured, output not writable).
//!   Returned as `Err(RateCardError)` from the top-level `run*` functions.
//!
//! * [`BlockError`] is **per block**: one UBR block could not be resolved
//!   (service error, timeout, malformed reply). Stored inside
//!   [`crate::output::BlockResult`]; the run continues with the next block
//!   unless [`crate::config::FailurePolicy::Abort`] is selected.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ubr-ratecard library.
#[derive(Debug, Error)]
pub enum RateCardError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Any other I/O failure while reading the input.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// A plain-text input is not valid UTF-8.
    #[error("Input '{path}' is not valid UTF-8 text (invalid byte at offset {offset})")]
    InvalidEncoding { path: PathBuf, offset: usize },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The file was declared (or detected) as PDF but is not one.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF structure is corrupt and cannot be opened.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first PDF read.\n\
If the auto-download failed, you can:\n\
  • Check your internet connection and try again.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Convert the document to plain text and pass --format text.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The document contains no `UBR <n>:` delimiter at all.
    #[error("No UBR blocks found in '{input}'\nBlocks must start with a delimiter such as 'UBR 1:'.")]
    NoBlocksFound { input: String },

    // ── Service errors ────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// A block failed and the failure policy is `Abort`.
    #[error("Block '{block_id}' failed: {source}")]
    BlockFailed {
        block_id: String,
        #[source]
        source: BlockError,
    },

    /// Every block failed; output would be empty.
    #[error("All {total} blocks failed.\nFirst error: {first_error}")]
    AllBlocksFailed { total: usize, first_error: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not read, parse or write the run manifest.
    #[error("Manifest '{path}' unusable: {detail}")]
    ManifestFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure confined to one UBR block.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum BlockError {
    /// The text-generation service returned an error or was unreachable.
    #[error("{block_id}: service call failed: {detail}")]
    ServiceFailed { block_id: String, detail: String },

    /// The service call exceeded `api_timeout_secs`.
    #[error("{block_id}: service call timed out after {secs}s")]
    Timeout { block_id: String, secs: u64 },

    /// Strict reply checking rejected the reply.
    #[error("{block_id}: malformed rate card reply: {detail}")]
    MalformedReply { block_id: String, detail: String },

    /// Learner or day count was not a positive integer.
    #[error("{block_id}: invalid rate request: {detail}")]
    InvalidRequest { block_id: String, detail: String },
}

impl BlockError {
    /// The identifier of the block this error belongs to.
    pub fn block_id(&self) -> &str {
        match self {
            BlockError::ServiceFailed { block_id, .. }
            | BlockError::Timeout { block_id, .. }
            | BlockError::MalformedReply { block_id, .. }
            | BlockError::InvalidRequest { block_id, .. } => block_id,
        }
    }
}
