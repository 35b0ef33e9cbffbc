//! Run manifest: the record that makes incremental flushing resumable.
//!
//! [`crate::run::run_to_file`] rewrites the manifest after every block, next
//! to the output file as `<output>.manifest.json`. Each entry records the
//! block ID, the body it was resolved from, and either the accepted reply or
//! the error. A later run with `resume = true` reuses every completed entry
//! whose ID and body still match.

use crate::error::RateCardError;
use crate::output::BlockResult;
use crate::pipeline::extract::Block;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Status of one manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Completed,
    Failed,
}

/// One attempted block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub block_id: String,
    pub body: String,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything attempted so far in a run, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Input the run was started with.
    pub input: String,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            entries: Vec::new(),
        }
    }

    /// Record the outcome of `block`.
    pub fn record(&mut self, block: &Block, result: &BlockResult) {
        let entry = match &result.error {
            None => ManifestEntry {
                block_id: block.id.clone(),
                body: block.body.clone(),
                status: EntryStatus::Completed,
                reply: Some(result.reply.clone()),
                error: None,
            },
            Some(e) => ManifestEntry {
                block_id: block.id.clone(),
                body: block.body.clone(),
                status: EntryStatus::Failed,
                reply: None,
                error: Some(e.to_string()),
            },
        };
        self.entries.push(entry);
    }

    /// IDs of completed entries, in order.
    pub fn completed_ids(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.status == EntryStatus::Completed)
            .map(|e| e.block_id.as_str())
            .collect()
    }

    /// The reusable reply for `block`, if a completed entry still matches it.
    pub fn reusable_reply(&self, block: &Block) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| {
                e.status == EntryStatus::Completed && e.block_id == block.id && e.body == block.body
            })
            .and_then(|e| e.reply.as_deref())
    }

    /// Load a manifest; a missing file is `Ok(None)`.
    pub async fn load(path: &Path) -> Result<Option<Self>, RateCardError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RateCardError::ManifestFailed {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                })
            }
        };
        let manifest = serde_json::from_slice(&bytes).map_err(|e| RateCardError::ManifestFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        debug!("Loaded manifest {}", path.display());
        Ok(Some(manifest))
    }

    /// Write the manifest atomically (temp file + rename).
    pub async fn save(&self, path: &Path) -> Result<(), RateCardError> {
        let failed = |detail: String| RateCardError::ManifestFailed {
            path: path.to_path_buf(),
            detail,
        };
        let json = serde_json::to_vec_pretty(self).map_err(|e| failed(e.to_string()))?;
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|e| failed(e.to_string()))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| failed(e.to_string()))
    }
}

/// Manifest location for an output file: `<output>.manifest.json`.
pub fn manifest_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".manifest.json");
    output.with_file_name(name)
}
