//! Prompt templates for rate-card resolution.
//!
//! Every prompt the crate sends lives here, so unit tests can inspect them
//! without a model and a wording change touches exactly one file.

use crate::pipeline::extract::display_id;
use crate::pipeline::rate::RateRequest;

/// System prompt for the dispatch step.
///
/// The model decides whether the block needs the pricing capability and, if
/// so, which learner and day counts to price it for.
pub const DISPATCH_SYSTEM_PROMPT: &str = r#"You prepare rate cards from UBR pricing instructions.

You have one capability available:

  rate_card(learners: positive integer, days: positive integer)
    Calculates the course fee for the UBR block under discussion.

Read the block and answer with ONE JSON object and nothing else:

  - To price the block:  {"action": "rate_card", "learners": <int>, "days": <int>}
  - To answer directly:  {"action": "reply", "text": "<your answer>"}

Take learner and day counts from the instructions. If the instructions do
not state them, use 1 learner and 1 day. Do not wrap the JSON in code fences."#;

/// System prompt for the rate card request itself.
pub const RATE_CARD_SYSTEM_PROMPT: &str =
    "You calculate training course fees from UBR pricing instructions. Follow the requested output format exactly.";

/// Task description sent to the dispatch step for one block.
pub fn task_message(block_id: &str, body: &str) -> String {
    format!("Generate rate card for {}: {}", display_id(block_id), body)
}

/// Render the rate card prompt for one request.
///
/// The reply format is a contract with the model only; it is checked solely
/// under [`crate::config::ReplyPolicy::Strict`].
pub fn rate_card_prompt(request: &RateRequest) -> String {
    format!(
        "UBR ID: {id}\n\
Instructions: {body}\n\
\n\
Parameters:\n\
- Learners: {learners}\n\
- Days: {days}\n\
\n\
Task:\n\
Calculate the course fee based on the UBR instructions.\n\
Return ONLY in this exact format (no extra text):\n\
\n\
{id}:\n\
Currency = <value>\n\
Course_Fee = <value>\n\
Term = <value>",
        id = display_id(request.block_id()),
        body = request.body(),
        learners = request.learners(),
        days = request.days(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_message_names_block() {
        assert_eq!(
            task_message("UBR 4", "EUR 100 per learner"),
            "Generate rate card for UBR 4: EUR 100 per learner"
        );
    }

    #[test]
    fn rate_card_prompt_carries_parameters_and_format() {
        let req = RateRequest::new("UBR 4", "EUR 100 per learner per day", 12, 3).unwrap();
        let prompt = rate_card_prompt(&req);
        assert!(prompt.starts_with("UBR ID: UBR 4\n"));
        assert!(prompt.contains("Instructions: EUR 100 per learner per day"));
        assert!(prompt.contains("- Learners: 12"));
        assert!(prompt.contains("- Days: 3"));
        assert!(prompt.ends_with("UBR 4:\nCurrency = <value>\nCourse_Fee = <value>\nTerm = <value>"));
    }

    #[test]
    fn prompts_collapse_whitespace_in_block_id() {
        assert_eq!(task_message("UBR\n8", "flat fee"), "Generate rate card for UBR 8: flat fee");

        let req = RateRequest::new("UBR\n8", "flat fee", 1, 1).unwrap();
        let prompt = rate_card_prompt(&req);
        assert!(prompt.starts_with("UBR ID: UBR 8\n"));
        assert!(prompt.contains("\nUBR 8:\nCurrency = <value>"));
        assert!(!prompt.contains("UBR\n8"));
    }

    #[test]
    fn dispatch_prompt_documents_both_actions() {
        assert!(DISPATCH_SYSTEM_PROMPT.contains(r#""action": "rate_card""#));
        assert!(DISPATCH_SYSTEM_PROMPT.contains(r#""action": "reply""#));
    }
}
