//! Pipeline stages for rate-card resolution.
//!
//! Each submodule implements one step; the orchestrators in [`crate::run`]
//! and [`crate::stream`] wire them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ document ──▶ extract ──▶ dispatch ──▶ rate ──▶ reply
//! (URL/path)  (text/pdf)   (blocks)    (decide)    (LLM)    (check)
//! ```
//!
//! 1. [`input`]   : canonicalise the user-supplied path or URL to a local file
//! 2. [`document`]: read UTF-8 text, or extract PDF page text via pdfium
//! 3. [`extract`] : split the text into ordered `UBR <n>:` blocks
//! 4. [`dispatch`]: decide whether a block needs the rate card capability
//! 5. [`rate`]    : build the rate card prompt and issue the call
//! 6. [`reply`]   : pass the reply through or enforce the rate card format
//!
//! [`llm`] is the seam every network call goes through.

pub mod dispatch;
pub mod document;
pub mod extract;
pub mod input;
pub mod llm;
pub mod rate;
pub mod reply;
