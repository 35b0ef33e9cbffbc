//! Reply checking: accept a reply verbatim or enforce the rate card format.
//!
//! The expected format is
//!
//! ```text
//! <block id>:
//! Currency = <value>
//! Course_Fee = <value>
//! Term = <value>
//! ```
//!
//! Under [`ReplyPolicy::PassThrough`] nothing is checked. Under
//! [`ReplyPolicy::Strict`] the reply is parsed into a [`RateCard`]; outer code
//! fences, CRLF line endings and blank lines are tolerated, anything else
//! that deviates is rejected.

use crate::config::ReplyPolicy;
use crate::error::BlockError;
use crate::pipeline::extract::display_id;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\n(.*)\n```\s*$").unwrap());

static RE_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_]+)\s*=\s*(.*?)\s*$").unwrap());

const FIELDS: [&str; 3] = ["Currency", "Course_Fee", "Term"];

/// A parsed rate card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateCard {
    pub block_id: String,
    pub currency: String,
    pub course_fee: String,
    pub term: String,
}

impl RateCard {
    /// Parse `reply` as the rate card for `block_id`. The header is compared
    /// against the ID with whitespace runs collapsed, as the prompt shows it.
    pub fn parse(block_id: &str, reply: &str) -> Result<Self, String> {
        let block_id = display_id(block_id);
        let normalised = strip_outer_fences(&reply.replace("\r\n", "\n"));
        let mut lines = normalised.lines().map(str::trim).filter(|l| !l.is_empty());

        let header = lines.next().ok_or("reply is empty")?;
        let expected = format!("{}:", block_id);
        if header != expected {
            return Err(format!("expected header '{expected}', got '{header}'"));
        }

        let mut values = Vec::with_capacity(FIELDS.len());
        for key in FIELDS {
            let line = lines.next().ok_or_else(|| format!("missing '{key}' line"))?;
            let caps = RE_FIELD
                .captures(line)
                .ok_or_else(|| format!("'{line}' is not a 'Key = value' line"))?;
            if &caps[1] != key {
                return Err(format!("expected '{key}', got '{}'", &caps[1]));
            }
            if caps[2].is_empty() {
                return Err(format!("'{key}' has no value"));
            }
            values.push(caps[2].to_string());
        }

        if let Some(extra) = lines.next() {
            return Err(format!("unexpected trailing text '{extra}'"));
        }

        let mut values = values.into_iter();
        Ok(Self {
            block_id,
            currency: values.next().unwrap_or_default(),
            course_fee: values.next().unwrap_or_default(),
            term: values.next().unwrap_or_default(),
        })
    }
}

impl fmt::Display for RateCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:\nCurrency = {}\nCourse_Fee = {}\nTerm = {}",
            self.block_id, self.currency, self.course_fee, self.term
        )
    }
}

/// Apply `policy` to a reply, returning the text to write.
pub fn check_reply(policy: ReplyPolicy, block_id: &str, reply: String) -> Result<String, BlockError> {
    match policy {
        ReplyPolicy::PassThrough => Ok(reply),
        ReplyPolicy::Strict => RateCard::parse(block_id, &reply)
            .map(|card| card.to_string())
            .map_err(|detail| BlockError::MalformedReply {
                block_id: block_id.to_string(),
                detail,
            }),
    }
}

fn strip_outer_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}
