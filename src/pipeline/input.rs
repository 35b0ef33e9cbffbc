//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! pdfium needs a file-system path, so URL inputs are downloaded into a
//! `TempDir` that is removed when the returned [`ResolvedInput`] is dropped.
//! Format checks happen later in [`crate::pipeline::document`]; this stage
//! only guarantees the file exists and can be opened.

use crate::error::RateCardError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The resolved input, either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the document was downloaded to a temp directory.
    /// The `TempDir` is kept alive until processing completes.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Get the path to the document regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local file path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, RateCardError> {
    if input.trim().is_empty() {
        return Err(RateCardError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Resolve a local file path, validating existence and read permission.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, RateCardError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(RateCardError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(RateCardError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    match std::fs::File::open(&path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(RateCardError::PermissionDenied { path });
        }
        Err(e) => {
            return Err(RateCardError::ReadFailed { path, source: e });
        }
    }

    debug!("Resolved local input: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, RateCardError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RateCardError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            RateCardError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            RateCardError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(RateCardError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = filename_from_url(url);

    let temp_dir = TempDir::new().map_err(|e| RateCardError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| RateCardError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| RateCardError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL when it looks like a file name.
///
/// The extension matters: format auto-detection looks at it first.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/ubr.pdf"));
        assert!(is_url("http://example.com/ubr.txt"));
        assert!(!is_url("/tmp/ubr.txt"));
        assert!(!is_url("ubr.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_keeps_extension() {
        assert_eq!(filename_from_url("https://example.com/docs/UBR.pdf"), "UBR.pdf");
        assert_eq!(filename_from_url("https://example.com/docs/"), "downloaded");
        assert_eq!(filename_from_url("https://example.com/rules"), "downloaded");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = resolve_input("/definitely/not/here/UBR.txt", 5)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RateCardError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn empty_input_is_invalid() {
        let err = resolve_input("   ", 5).await.err().unwrap();
        assert!(matches!(err, RateCardError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn directory_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_input(dir.path().to_str().unwrap(), 5)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RateCardError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn existing_file_resolves_locally() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "UBR 1: fee").unwrap();
        let resolved = resolve_input(tmp.path().to_str().unwrap(), 5).await.unwrap();
        assert!(matches!(resolved, ResolvedInput::Local(_)));
        assert_eq!(resolved.path(), tmp.path());
    }
}
