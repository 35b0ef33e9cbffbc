//! Rate resolution: price one UBR block for a learner and day count.
//!
//! This is the pricing capability the dispatch step can invoke. It is a
//! plain async function with a typed input ([`RateRequest`]) and the raw
//! reply text as output; one call to the generator per invocation.

use crate::error::BlockError;
use crate::pipeline::llm::{self, Completion, TextGenerator};
use crate::prompts::{rate_card_prompt, RATE_CARD_SYSTEM_PROMPT};
use std::num::NonZeroU32;
use tracing::debug;

/// Input of the rate card capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateRequest {
    block_id: String,
    body: String,
    learners: NonZeroU32,
    days: NonZeroU32,
}

impl RateRequest {
    /// Build a request; zero learners or days is rejected.
    pub fn new(
        block_id: impl Into<String>,
        body: impl Into<String>,
        learners: u32,
        days: u32,
    ) -> Result<Self, BlockError> {
        let block_id = block_id.into();
        let invalid = |what: &str| BlockError::InvalidRequest {
            block_id: block_id.clone(),
            detail: format!("{what} must be a positive integer"),
        };
        let learners = NonZeroU32::new(learners).ok_or_else(|| invalid("learner count"))?;
        let days = NonZeroU32::new(days).ok_or_else(|| invalid("day count"))?;
        Ok(Self {
            block_id,
            body: body.into(),
            learners,
            days,
        })
    }

    pub fn block_id(&self) -> &str {
        &self.block_id
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn learners(&self) -> u32 {
        self.learners.get()
    }

    pub fn days(&self) -> u32 {
        self.days.get()
    }
}

/// Send the rate card prompt for `request` and return the raw reply.
pub async fn resolve_rate(
    generator: &dyn TextGenerator,
    request: &RateRequest,
    api_timeout_secs: Option<u64>,
) -> Result<Completion, BlockError> {
    debug!(
        "{}: rate card for {} learners, {} days",
        request.block_id(),
        request.learners(),
        request.days()
    );
    llm::call(
        generator,
        request.block_id(),
        RATE_CARD_SYSTEM_PROMPT,
        &rate_card_prompt(request),
        api_timeout_secs,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::GeneratorError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for Recorder {
        async fn complete(&self, _system: &str, user: &str) -> Result<Completion, GeneratorError> {
            self.prompts.lock().unwrap().push(user.to_string());
            Ok(Completion::text("UBR 1:\nCurrency = EUR\nCourse_Fee = 1200\nTerm = 3 days"))
        }
    }

    #[test]
    fn zero_counts_are_rejected() {
        let err = RateRequest::new("UBR 1", "x", 0, 2).unwrap_err();
        assert!(matches!(err, BlockError::InvalidRequest { ref detail, .. } if detail.contains("learner")));
        let err = RateRequest::new("UBR 1", "x", 2, 0).unwrap_err();
        assert!(matches!(err, BlockError::InvalidRequest { ref detail, .. } if detail.contains("day")));
    }

    #[tokio::test]
    async fn one_call_per_request_no_dedup() {
        let recorder = Recorder::default();
        let req = RateRequest::new("UBR 1", "EUR 400 per day", 10, 3).unwrap();
        let first = resolve_rate(&recorder, &req, None).await.unwrap();
        let second = resolve_rate(&recorder, &req, None).await.unwrap();
        assert_eq!(first, second);

        let prompts = recorder.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("- Learners: 10"));
        assert!(prompts[0].contains("- Days: 3"));
    }
}
