//! Result types produced by a run.

use crate::error::BlockError;
use serde::{Deserialize, Serialize};

/// Separator placed between replies in the output document (one blank line).
pub const REPLY_SEPARATOR: &str = "\n\n";

/// Outcome of resolving one UBR block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockResult {
    /// Block identifier, e.g. `"UBR 12"`.
    pub block_id: String,
    /// Accepted reply text. Empty when `error` is set.
    pub reply: String,
    /// The rate card request was issued for this block.
    pub tool_invoked: bool,
    /// The reply came from a previous run's manifest.
    #[serde(default)]
    pub reused: bool,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub error: Option<BlockError>,
}

impl BlockResult {
    /// A failed block with no reply.
    pub fn failed(block_id: impl Into<String>, error: BlockError, duration_ms: u64) -> Self {
        Self {
            block_id: block_id.into(),
            reply: String::new(),
            tool_invoked: false,
            reused: false,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms,
            error: Some(error),
        }
    }

    /// A block whose reply was taken from the manifest.
    pub fn reused(block_id: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            block_id: block_id.into(),
            reply: reply.into(),
            tool_invoked: false,
            reused: true,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate statistics for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Blocks found in the document.
    pub total_blocks: usize,
    /// Blocks with an accepted reply (including reused ones).
    pub completed_blocks: usize,
    pub failed_blocks: usize,
    /// Blocks taken from the manifest without a service call.
    pub reused_blocks: usize,
    /// Blocks never attempted because the run aborted.
    pub skipped_blocks: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub read_duration_ms: u64,
    pub llm_duration_ms: u64,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    /// Output document: accepted replies joined by [`REPLY_SEPARATOR`].
    pub text: String,
    /// Per-block outcomes in document order.
    pub blocks: Vec<BlockResult>,
    pub stats: RunStats,
}

/// Join the accepted replies of `blocks` in order.
pub fn assemble_output(blocks: &[BlockResult]) -> String {
    blocks
        .iter()
        .filter(|b| b.is_success())
        .map(|b| b.reply.as_str())
        .collect::<Vec<_>>()
        .join(REPLY_SEPARATOR)
}

/// Compute stats over `blocks`.
pub fn compute_stats(total_blocks: usize, blocks: &[BlockResult]) -> RunStats {
    let completed = blocks.iter().filter(|b| b.is_success()).count();
    RunStats {
        total_blocks,
        completed_blocks: completed,
        failed_blocks: blocks.len() - completed,
        reused_blocks: blocks.iter().filter(|b| b.reused).count(),
        skipped_blocks: total_blocks.saturating_sub(blocks.len()),
        total_input_tokens: blocks.iter().map(|b| b.input_tokens as u64).sum(),
        total_output_tokens: blocks.iter().map(|b| b.output_tokens as u64).sum(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(id: &str, reply: &str) -> BlockResult {
        BlockResult {
            block_id: id.into(),
            reply: reply.into(),
            tool_invoked: true,
            reused: false,
            input_tokens: 10,
            output_tokens: 5,
            duration_ms: 1,
            error: None,
        }
    }

    #[test]
    fn assemble_skips_failed_blocks() {
        let blocks = vec![
            ok("UBR 1", "first"),
            BlockResult::failed(
                "UBR 2",
                BlockError::ServiceFailed {
                    block_id: "UBR 2".into(),
                    detail: "500".into(),
                },
                3,
            ),
            ok("UBR 3", "third"),
        ];
        assert_eq!(assemble_output(&blocks), "first\n\nthird");
    }

    #[test]
    fn assemble_empty_is_empty() {
        assert_eq!(assemble_output(&[]), "");
    }

    #[test]
    fn stats_count_everything() {
        let blocks = vec![ok("UBR 1", "a"), BlockResult::reused("UBR 2", "b")];
        let stats = compute_stats(4, &blocks);
        assert_eq!(stats.completed_blocks, 2);
        assert_eq!(stats.failed_blocks, 0);
        assert_eq!(stats.reused_blocks, 1);
        assert_eq!(stats.skipped_blocks, 2);
        assert_eq!(stats.total_input_tokens, 10);
        assert_eq!(stats.total_output_tokens, 5);
    }
}
