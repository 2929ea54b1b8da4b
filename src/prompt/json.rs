//! Lenient recovery of a JSON object from model output.
//!
//! Stages run in order and a later stage only runs when every earlier one
//! failed:
//!
//! 1. the whole text parses as an object
//! 2. the body of a fenced code block parses as an object
//! 3. the span from a `{` to its matching `}` parses as an object, trying
//!    each `{` in turn and finally the first `{` to the last `}`
//! 4. an empty object, with the raw text logged at `warn`

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::types::AssistantReply;

/// Which stage produced the object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    Direct,
    CodeFence,
    BraceScan,
    Empty,
}

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("fence pattern is valid")
    })
}

fn as_object(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn from_fence(text: &str) -> Option<Value> {
    fence_pattern()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find_map(|body| as_object(body.as_str()))
}

/// Span from the first `{` to the brace that closes it, ignoring braces
/// inside string literals.
fn balanced_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn from_braces(text: &str) -> Option<Value> {
    for (start, _) in text.match_indices('{') {
        if let Some(value) = balanced_span(&text[start..]).and_then(as_object) {
            return Some(value);
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    as_object(&text[start..=end])
}

/// Recover an object from `text`, reporting the stage that succeeded
pub fn recover(text: &str) -> (Value, Recovery) {
    if let Some(value) = as_object(text) {
        return (value, Recovery::Direct);
    }
    if let Some(value) = from_fence(text) {
        debug!("recovered JSON from code fence");
        return (value, Recovery::CodeFence);
    }
    if let Some(value) = from_braces(text) {
        debug!("recovered JSON by brace scan");
        return (value, Recovery::BraceScan);
    }
    warn!(raw = %text, "could not recover a JSON object from model output");
    (Value::Object(Map::new()), Recovery::Empty)
}

/// Recover an object from `text`; never fails
pub fn parse_json_object(text: &str) -> Value {
    recover(text).0
}

/// Structured payload of a reply: the function call arguments when the
/// model called a function, otherwise the message text.
pub fn reply_payload(reply: &AssistantReply) -> Value {
    match &reply.function_call {
        Some(call) => parse_json_object(&call.arguments),
        None => parse_json_object(&reply.content),
    }
}
