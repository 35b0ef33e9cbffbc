//! Progress-callback trait for per-block run events.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::RateCardConfigBuilder::progress_callback`] to receive
//! events as the orchestrator resolves each UBR block. Blocks are processed
//! strictly in document order, so events for block N always precede events
//! for block N+1.
//!
//! # Example
//!
//! ```rust
//! use ubr_ratecard::{RateCardConfig, RunProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl RunProgressCallback for CountingCallback {
//!     fn on_block_complete(&self, block_id: &str, index: usize, total: usize, reply: &str) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{} ({}/{}): {} chars", block_id, index, total, reply.len());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = RateCardConfig::builder()
//!     .progress_callback(counter as Arc<dyn RunProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each block.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` is 1-based.
pub trait RunProgressCallback: Send + Sync {
    /// Called once, after extraction, before the first block is sent.
    fn on_run_start(&self, total_blocks: usize) {
        let _ = total_blocks;
    }

    /// Called just before the first service request for a block.
    fn on_block_start(&self, block_id: &str, index: usize, total: usize) {
        let _ = (block_id, index, total);
    }

    /// Called when a block produced an accepted reply.
    fn on_block_complete(&self, block_id: &str, index: usize, total: usize, reply: &str) {
        let _ = (block_id, index, total, reply);
    }

    /// Called when a block was taken from the manifest instead of the service.
    fn on_block_reused(&self, block_id: &str, index: usize, total: usize) {
        let _ = (block_id, index, total);
    }

    /// Called when a block failed.
    fn on_block_error(&self, block_id: &str, index: usize, total: usize, error: &str) {
        let _ = (block_id, index, total, error);
    }

    /// Called once after the last block was attempted.
    fn on_run_complete(&self, total_blocks: usize, success_count: usize) {
        let _ = (total_blocks, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RateCardConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCallback {
        events: Mutex<Vec<String>>,
    }

    impl RunProgressCallback for RecordingCallback {
        fn on_run_start(&self, total_blocks: usize) {
            self.events.lock().unwrap().push(format!("start {total_blocks}"));
        }

        fn on_block_start(&self, block_id: &str, index: usize, total: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("begin {block_id} {index}/{total}"));
        }

        fn on_block_complete(&self, block_id: &str, _index: usize, _total: usize, reply: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done {block_id} {}", reply.len()));
        }

        fn on_block_error(&self, block_id: &str, _index: usize, _total: usize, _error: &str) {
            self.events.lock().unwrap().push(format!("fail {block_id}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(2);
        cb.on_block_start("UBR 1", 1, 2);
        cb.on_block_complete("UBR 1", 1, 2, "reply");
        cb.on_block_reused("UBR 2", 2, 2);
        cb.on_block_error("UBR 2", 2, 2, "boom");
        cb.on_run_complete(2, 1);
    }

    #[test]
    fn recording_callback_sees_events_in_order() {
        let cb = RecordingCallback::default();
        cb.on_run_start(2);
        cb.on_block_start("UBR 1", 1, 2);
        cb.on_block_complete("UBR 1", 1, 2, "abc");
        cb.on_block_start("UBR 2", 2, 2);
        cb.on_block_error("UBR 2", 2, 2, "timeout");
        // Default method, not recorded.
        cb.on_run_complete(2, 1);

        let events = cb.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                "start 2",
                "begin UBR 1 1/2",
                "done UBR 1 3",
                "begin UBR 2 2/2",
                "fail UBR 2",
            ]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn RunProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_run_start(1);
        cb.on_block_complete("UBR 9", 1, 1, "ok");
    }
}
