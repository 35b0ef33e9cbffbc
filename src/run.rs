//! Run entry points: read a document, resolve every block, collect replies.
//!
//! Blocks are processed strictly one after another in document order. A
//! block-level failure is recorded in its [`BlockResult`] and, under the
//! default [`FailurePolicy::Continue`], the run moves on. Fatal errors
//! (unreadable input, provider not configured, output not writable) abort
//! immediately.
//!
//! [`run_to_file`] flushes the output file and the manifest after every
//! block, so replies already produced survive a later abort or crash. An
//! existing output file is only replaced once the run has a reply to write.

use crate::config::{FailurePolicy, RateCardConfig};
use crate::error::RateCardError;
use crate::manifest::{manifest_path, Manifest};
use crate::output::{assemble_output, compute_stats, BlockResult, RunOutput, RunStats};
use crate::pipeline::extract::{extract_blocks, Block, BlockMap};
use crate::pipeline::llm::{resolve_generator, TextGenerator};
use crate::pipeline::{dispatch, document, input};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Resolve every UBR block of a text or PDF document.
///
/// # Arguments
/// * `input` : Local file path or HTTP/HTTPS URL
/// * `config`: Run configuration
///
/// # Returns
/// `Ok(RunOutput)` when at least one block produced a reply, even if others
/// failed (check `output.stats.failed_blocks`).
///
/// # Errors
/// - Input missing, unreadable, not UTF-8, or a broken PDF
/// - No UBR block in the document
/// - Provider not configured
/// - A block failed under [`FailurePolicy::Abort`]
/// - Every block failed
pub async fn run(
    input_str: impl AsRef<str>,
    config: &RateCardConfig,
) -> Result<RunOutput, RateCardError> {
    execute(input_str.as_ref(), config, None).await
}

/// Resolve every block and write the replies to `output_path`.
///
/// The output file (replies joined by a blank line) and its manifest
/// (`<output>.manifest.json`) are rewritten atomically after every block.
/// With `config.resume`, completed entries of an existing manifest whose ID
/// and body still match are reused without a service call.
pub async fn run_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &RateCardConfig,
) -> Result<RunStats, RateCardError> {
    let input_str = input_str.as_ref();
    let mut sink = OutputSink::open(output_path.as_ref(), input_str, config.resume).await?;
    let output = execute(input_str, config, Some(&mut sink)).await?;
    info!("Wrote {} replies to {}", output.stats.completed_blocks, sink.output.display());
    Ok(output.stats)
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(
    input_str: impl AsRef<str>,
    config: &RateCardConfig,
) -> Result<RunOutput, RateCardError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| RateCardError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run(input_str, config))
}

/// Read a document and extract its blocks without calling any service.
///
/// Honours `config.format`, `config.password` and `config.download_timeout_secs`.
/// An empty map is returned as-is; only runs treat it as an error.
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &RateCardConfig,
) -> Result<BlockMap, RateCardError> {
    let text = read_input(input_str.as_ref(), config).await?;
    Ok(extract_blocks(&text))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve the input and read it to text. Temp downloads are dropped here.
pub(crate) async fn read_input(
    input_str: &str,
    config: &RateCardConfig,
) -> Result<String, RateCardError> {
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    document::read_document(resolved.path(), config.format, config.password.as_deref()).await
}

/// Read and extract, failing when the document has no block.
pub(crate) async fn load_blocks(
    input_str: &str,
    config: &RateCardConfig,
) -> Result<BlockMap, RateCardError> {
    let text = read_input(input_str, config).await?;
    let blocks = extract_blocks(&text);
    if blocks.is_empty() {
        return Err(RateCardError::NoBlocksFound {
            input: input_str.to_string(),
        });
    }
    info!("Extracted {} UBR blocks", blocks.len());
    Ok(blocks)
}

async fn execute(
    input_str: &str,
    config: &RateCardConfig,
    mut sink: Option<&mut OutputSink>,
) -> Result<RunOutput, RateCardError> {
    let total_start = Instant::now();
    info!("Starting run: {}", input_str);

    // ── Step 1: Read and extract ─────────────────────────────────────────
    let read_start = Instant::now();
    let blocks = load_blocks(input_str, config).await?;
    let read_duration_ms = read_start.elapsed().as_millis() as u64;
    let total = blocks.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    // ── Step 2: Resolve blocks in order ──────────────────────────────────
    // The generator is created on first use so a fully resumed run needs
    // no provider.
    let mut generator: Option<Arc<dyn TextGenerator>> = None;
    let mut results: Vec<BlockResult> = Vec::with_capacity(total);
    let llm_start = Instant::now();

    for (i, block) in blocks.iter().enumerate() {
        let index = i + 1;

        let reused = sink.as_deref().and_then(|s| s.reusable_reply(block));
        let result = match reused {
            Some(reply) => {
                debug!("{}: reusing reply from manifest", block.id);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_block_reused(&block.id, index, total);
                }
                BlockResult::reused(block.id.clone(), reply)
            }
            None => {
                let gen = match generator.clone() {
                    Some(g) => g,
                    None => {
                        let g = resolve_generator(config)?;
                        generator = Some(Arc::clone(&g));
                        g
                    }
                };
                if let Some(ref cb) = config.progress_callback {
                    cb.on_block_start(&block.id, index, total);
                }
                let result = dispatch::process_block(gen.as_ref(), block, config).await;
                if let Some(ref cb) = config.progress_callback {
                    match &result.error {
                        None => cb.on_block_complete(&block.id, index, total, &result.reply),
                        Some(e) => cb.on_block_error(&block.id, index, total, &e.to_string()),
                    }
                }
                result
            }
        };

        let failure = result.error.clone();
        results.push(result);

        if let Some(s) = sink.as_deref_mut() {
            s.flush(block, &results).await?;
        }

        if let Some(source) = failure {
            if config.failure_policy == FailurePolicy::Abort {
                warn!(
                    "Aborting after {}: {} of {} blocks attempted",
                    block.id, index, total
                );
                return Err(RateCardError::BlockFailed {
                    block_id: block.id.clone(),
                    source,
                });
            }
        }
    }
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

    // ── Step 3: Assemble and report ──────────────────────────────────────
    let mut stats = compute_stats(total, &results);
    stats.read_duration_ms = read_duration_ms;
    stats.llm_duration_ms = llm_duration_ms;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total, stats.completed_blocks);
    }

    if stats.completed_blocks == 0 {
        let first_error = results
            .iter()
            .find_map(|r| r.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(RateCardError::AllBlocksFailed { total, first_error });
    }

    info!(
        "Run complete: {}/{} blocks, {}ms total",
        stats.completed_blocks, total, stats.total_duration_ms
    );

    Ok(RunOutput {
        text: assemble_output(&results),
        blocks: results,
        stats,
    })
}

/// Output file + manifest, rewritten after every block.
struct OutputSink {
    output: PathBuf,
    manifest_path: PathBuf,
    manifest: Manifest,
    previous: Option<Manifest>,
}

impl OutputSink {
    async fn open(output: &Path, input_str: &str, resume: bool) -> Result<Self, RateCardError> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RateCardError::OutputWriteFailed {
                    path: output.to_path_buf(),
                    source: e,
                })?;
        }

        let manifest_path = manifest_path(output);
        let previous = if resume {
            let previous = Manifest::load(&manifest_path).await?;
            if let Some(ref m) = previous {
                info!(
                    "Resuming: {} completed blocks in {}",
                    m.completed_ids().len(),
                    manifest_path.display()
                );
            }
            previous
        } else {
            None
        };

        Ok(Self {
            output: output.to_path_buf(),
            manifest_path,
            manifest: Manifest::new(input_str),
            previous,
        })
    }

    fn reusable_reply(&self, block: &Block) -> Option<String> {
        self.previous
            .as_ref()
            .and_then(|m| m.reusable_reply(block))
            .map(str::to_string)
    }

    /// Record the latest block and rewrite the manifest. The output file is
    /// left untouched until the run has at least one accepted reply.
    async fn flush(&mut self, block: &Block, results: &[BlockResult]) -> Result<(), RateCardError> {
        if let Some(last) = results.last() {
            self.manifest.record(block, last);
        }
        if results.iter().any(BlockResult::is_success) {
            write_atomic(&self.output, assemble_output(results).as_bytes()).await?;
        }
        self.manifest.save(&self.manifest_path).await
    }
}

/// Write to a sibling temp file, then rename over `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), RateCardError> {
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| RateCardError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| RateCardError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_atomic_overwrites_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("UBR_Complete.txt");
        write_atomic(&path, b"first").await.unwrap();
        write_atomic(&path, b"second").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert!(!dir.path().join("UBR_Complete.txt.tmp").exists());
    }

    #[tokio::test]
    async fn sink_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested/deeper/out.txt");
        let sink = OutputSink::open(&output, "UBR.txt", false).await.unwrap();
        assert!(output.parent().unwrap().is_dir());
        assert!(sink.previous.is_none());
    }

    #[tokio::test]
    async fn load_blocks_rejects_blockless_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        std::fs::write(&path, "a rate sheet without any delimiters").unwrap();

        let config = RateCardConfig::default();
        let err = load_blocks(path.to_str().unwrap(), &config).await.unwrap_err();
        assert!(matches!(err, RateCardError::NoBlocksFound { .. }));

        let map = extract(path.to_str().unwrap(), &config).await.unwrap();
        assert!(map.is_empty());
    }
}
