//! Streaming API: emit block results as they complete.
//!
//! Unlike the eager [`crate::run::run`], which returns only after every
//! block is resolved, [`run_stream`] yields one item per block through a
//! `Stream`. Blocks are resolved one at a time, so items always arrive in
//! document order.
//!
//! The stream carries no failure policy: a failed block is yielded as
//! `Err(BlockError)` and the next block is still attempted. Stop polling to
//! abort.

use crate::config::RateCardConfig;
use crate::error::{BlockError, RateCardError};
use crate::output::BlockResult;
use crate::pipeline::dispatch;
use crate::pipeline::llm::resolve_generator;
use crate::run::load_blocks;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of block results.
pub type BlockStream = Pin<Box<dyn Stream<Item = Result<BlockResult, BlockError>> + Send>>;

/// Resolve every block of a document, streaming results in document order.
///
/// # Returns
/// - `Ok(BlockStream)`: a stream of `Result<BlockResult, BlockError>`
/// - `Err(RateCardError)`: fatal error (unreadable input, no blocks,
///   provider not configured)
///
/// # Example
/// ```rust,no_run
/// use ubr_ratecard::{run_stream, RateCardConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RateCardConfig::default();
/// let mut stream = run_stream("UBR.txt", &config).await?;
/// while let Some(block) = stream.next().await {
///     match block {
///         Ok(b) => println!("{}\n\n", b.reply),
///         Err(e) => eprintln!("Error: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn run_stream(
    input_str: impl AsRef<str>,
    config: &RateCardConfig,
) -> Result<BlockStream, RateCardError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming run: {}", input_str);

    let blocks = load_blocks(input_str, config).await?;
    let generator = resolve_generator(config)?;
    let config = config.clone();

    let s = stream::iter(blocks.into_blocks()).then(move |block| {
        let generator = Arc::clone(&generator);
        let cfg = config.clone();
        async move {
            let mut result = dispatch::process_block(generator.as_ref(), &block, &cfg).await;
            match result.error.take() {
                None => Ok(result),
                Some(err) => Err(err),
            }
        }
    });

    Ok(Box::pin(s))
}
