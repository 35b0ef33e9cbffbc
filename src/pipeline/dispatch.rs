//! Dispatch: decide per block whether to invoke the rate card capability.
//!
//! Two explicit steps replace a model-driven tool call:
//!
//! 1. **Decide**: the task description for the block goes to the model with
//!    [`DISPATCH_SYSTEM_PROMPT`]; the answer is parsed into a [`Decision`].
//! 2. **Dispatch**: [`Decision::RateCard`] calls
//!    [`crate::pipeline::rate::resolve_rate`]; [`Decision::Reply`] is final.
//!
//! With both learner and day counts fixed in the config the decide step is
//! skipped entirely.

use crate::config::RateCardConfig;
use crate::error::BlockError;
use crate::output::BlockResult;
use crate::pipeline::extract::Block;
use crate::pipeline::llm::{self, TextGenerator};
use crate::pipeline::rate::{resolve_rate, RateRequest};
use crate::pipeline::reply::check_reply;
use crate::prompts::{task_message, DISPATCH_SYSTEM_PROMPT};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?```$").unwrap());

/// Outcome of the decide step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    /// Price the block with the rate card capability.
    RateCard { learners: u32, days: u32 },
    /// The model answered directly.
    Reply { text: String },
}

/// Parse the model's decide-step answer.
///
/// Accepts bare JSON, JSON inside a code fence, or JSON embedded in
/// surrounding prose. Returns `None` when no decision object can be found.
pub fn parse_decision(raw: &str) -> Option<Decision> {
    let trimmed = raw.trim();
    let candidate = RE_JSON_FENCE
        .captures(trimmed)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_else(|| trimmed.to_string());

    if let Ok(decision) = serde_json::from_str::<Decision>(&candidate) {
        return Some(decision);
    }

    let start = candidate.find('{')?;
    let end = candidate.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Decision>(&candidate[start..=end]).ok()
}

/// Resolve one block into a [`BlockResult`].
///
/// Never returns an error: failures are stored in `BlockResult::error` so
/// the orchestrator can apply its failure policy.
pub async fn process_block(
    generator: &dyn TextGenerator,
    block: &Block,
    config: &RateCardConfig,
) -> BlockResult {
    let start = Instant::now();
    match resolve_block(generator, block, config).await {
        Ok(mut result) => {
            result.duration_ms = start.elapsed().as_millis() as u64;
            result
        }
        Err(e) => {
            warn!("{}: {}", block.id, e);
            BlockResult::failed(block.id.clone(), e, start.elapsed().as_millis() as u64)
        }
    }
}

async fn resolve_block(
    generator: &dyn TextGenerator,
    block: &Block,
    config: &RateCardConfig,
) -> Result<BlockResult, BlockError> {
    let mut input_tokens = 0;
    let mut output_tokens = 0;

    let decision = match config.fixed_parameters() {
        Some((learners, days)) => Decision::RateCard { learners, days },
        None => {
            let answer = llm::call(
                generator,
                &block.id,
                DISPATCH_SYSTEM_PROMPT,
                &task_message(&block.id, &block.body),
                config.api_timeout_secs,
            )
            .await?;
            input_tokens += answer.input_tokens;
            output_tokens += answer.output_tokens;
            match parse_decision(&answer.content) {
                Some(decision) => decision,
                None => {
                    warn!("{}: no decision in model answer; using it as the reply", block.id);
                    Decision::Reply {
                        text: answer.content,
                    }
                }
            }
        }
    };
    debug!("{}: decision {:?}", block.id, decision);

    let (reply, tool_invoked) = match decision {
        Decision::RateCard { learners, days } => {
            let request = RateRequest::new(
                block.id.clone(),
                block.body.clone(),
                config.learners.unwrap_or(learners),
                config.days.unwrap_or(days),
            )?;
            let completion = resolve_rate(generator, &request, config.api_timeout_secs).await?;
            input_tokens += completion.input_tokens;
            output_tokens += completion.output_tokens;
            (completion.content, true)
        }
        Decision::Reply { text } => (text, false),
    };

    let reply = check_reply(config.reply_policy, &block.id, reply)?;

    Ok(BlockResult {
        block_id: block.id.clone(),
        reply,
        tool_invoked,
        reused: false,
        input_tokens,
        output_tokens,
        duration_ms: 0,
        error: None,
    })
}
