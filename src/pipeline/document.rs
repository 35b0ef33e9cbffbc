//! Document reading: turn a local file into one text blob.
//!
//! Plain text is decoded as UTF-8 with no transformation. PDF text is
//! extracted page by page through pdfium; the binding is blocking and keeps
//! thread-local state, so all pdfium work runs inside `spawn_blocking`.
//! A page without extractable text contributes an empty segment rather than
//! failing the document.

use crate::config::DocumentFormat;
use crate::error::RateCardError;
use pdfium_render::prelude::PdfiumError;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Separator placed between the text of consecutive PDF pages.
pub const PAGE_SEPARATOR: &str = "\n";

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Decide the concrete format of `path`.
///
/// `Auto` means: `.pdf` extension (any case) → PDF; otherwise the first four
/// bytes decide; anything else is text.
pub fn detect_format(path: &Path, declared: DocumentFormat) -> Result<DocumentFormat, RateCardError> {
    match declared {
        DocumentFormat::Text | DocumentFormat::Pdf => Ok(declared),
        DocumentFormat::Auto => {
            let by_extension = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false);
            if by_extension {
                return Ok(DocumentFormat::Pdf);
            }
            match read_magic(path)? {
                Some(magic) if &magic == PDF_MAGIC => Ok(DocumentFormat::Pdf),
                _ => Ok(DocumentFormat::Text),
            }
        }
    }
}

/// Read the whole document at `path` as text.
pub async fn read_document(
    path: &Path,
    format: DocumentFormat,
    password: Option<&str>,
) -> Result<String, RateCardError> {
    let format = detect_format(path, format)?;
    debug!("Reading {} as {:?}", path.display(), format);
    match format {
        DocumentFormat::Pdf => read_pdf(path, password).await,
        _ => read_text(path).await,
    }
}

/// Read a UTF-8 text file verbatim.
pub async fn read_text(path: &Path) -> Result<String, RateCardError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| io_error(path, e))?;
    String::from_utf8(bytes).map_err(|e| RateCardError::InvalidEncoding {
        path: path.to_path_buf(),
        offset: e.utf8_error().valid_up_to(),
    })
}

/// Extract the text of every page of a PDF, in page order.
pub async fn read_pdf(path: &Path, password: Option<&str>) -> Result<String, RateCardError> {
    match read_magic(path)? {
        Some(magic) if &magic == PDF_MAGIC => {}
        Some(magic) => {
            return Err(RateCardError::NotAPdf {
                path: path.to_path_buf(),
                magic,
            })
        }
        None => {
            return Err(RateCardError::CorruptPdf {
                path: path.to_path_buf(),
                detail: "file is shorter than a PDF header".into(),
            })
        }
    }

    let path = path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || read_pdf_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| RateCardError::Internal(format!("PDF text task panicked: {}", e)))?
}

/// Blocking implementation of PDF text extraction.
fn read_pdf_blocking(pdf_path: &Path, password: Option<&str>) -> Result<String, RateCardError> {
    let pdfium = pdfium_auto::bind_pdfium_silent()
        .map_err(|e| RateCardError::PdfiumBindingFailed(e.to_string()))?;

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e: PdfiumError| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                RateCardError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                RateCardError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            RateCardError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let segments: Vec<Option<String>> = pages
        .iter()
        .enumerate()
        .map(|(idx, page)| match page.text() {
            Ok(text) => Some(text.all()),
            Err(e) => {
                warn!("Page {}: no extractable text ({:?})", idx + 1, e);
                None
            }
        })
        .collect();

    Ok(join_pages(segments))
}

/// Join per-page text, treating pages without text as empty segments.
pub fn join_pages<I>(pages: I) -> String
where
    I: IntoIterator<Item = Option<String>>,
{
    pages
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR)
}

/// First four bytes of the file, or `None` when it is shorter than that.
fn read_magic(path: &Path) -> Result<Option<[u8; 4]>, RateCardError> {
    let mut f = std::fs::File::open(path).map_err(|e| io_error(path, e))?;
    let mut magic = [0u8; 4];
    match f.read_exact(&mut magic) {
        Ok(()) => Ok(Some(magic)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(io_error(path, e)),
    }
}

fn io_error(path: &Path, e: std::io::Error) -> RateCardError {
    match e.kind() {
        std::io::ErrorKind::NotFound => RateCardError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => RateCardError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => RateCardError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    }
}
