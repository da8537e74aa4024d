//! Domain services: analysis, decomposition, dependency resolution,
//! agent registry, scheduling and event distribution.

pub mod agent_registry;
pub mod complexity_analyzer;
pub mod dependency_resolver;
pub mod event_bus;
pub mod scheduler;
pub mod task_decomposer;

pub use agent_registry::{AgentRegistry, RegisteredAgent};
pub use complexity_analyzer::ComplexityAnalyzer;
pub use dependency_resolver::DependencyResolver;
pub use event_bus::{
    BusEvent, EventBus, EventHandler, EventId, EventName, EventSeverity, EventSubscription,
    SchedulingEvent, SequenceNumber, SubscriptionId,
};
pub use scheduler::{Scheduler, SchedulerStatus, UnregisterReport};
pub use task_decomposer::TaskDecomposer;

use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};

/// Extract the first JSON object from an oracle reply.
///
/// Fenced code blocks are searched first, then the raw text. A candidate
/// is a balanced `{...}` span (braces inside strings are ignored) that
/// parses as a JSON object.
pub fn extract_json_from_response(response: &str) -> Option<&str> {
    fenced_blocks(response)
        .into_iter()
        .chain(std::iter::once(response))
        .find_map(first_json_object)
}

/// Run an oracle call with a bounded wait. Elapsed time becomes
/// [`DomainError::OracleUnavailable`].
pub(crate) async fn with_oracle_timeout<F>(timeout: Duration, call: F) -> DomainResult<String>
where
    F: Future<Output = DomainResult<String>>,
{
    tokio::time::timeout(timeout, call).await.map_err(|_| {
        DomainError::OracleUnavailable(format!("no reply within {}s", timeout.as_secs_f64()))
    })?
}

/// Parse an extracted reply into its top-level object.
pub(crate) fn parse_object(json: &str) -> DomainResult<Map<String, Value>> {
    match serde_json::from_str::<Value>(json)? {
        Value::Object(object) => Ok(object),
        _ => Err(DomainError::MalformedOracleReply(
            "reply is not a JSON object".to_string(),
        )),
    }
}

/// First non-null value stored under any of `keys`.
pub(crate) fn field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

/// Numeric field; any other JSON type reads as absent.
pub(crate) fn number_field(object: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    field(object, keys).and_then(Value::as_f64)
}

/// Non-blank string field; any other JSON type reads as absent.
pub(crate) fn string_field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    field(object, keys)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Non-blank strings of an array field. Anything but an array reads as
/// empty and non-string items are skipped.
pub(crate) fn string_list_field(object: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    match field(object, keys) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        // Skip the info string (e.g. `json`) up to the end of the line
        let body_start = after_fence.find('\n').map_or(after_fence.len(), |nl| nl + 1);
        let body = &after_fence[body_start..];
        let Some(close) = body.find("```") else {
            break;
        };
        blocks.push(&body[..close]);
        rest = &body[close + 3..];
    }
    blocks
}

fn first_json_object(text: &str) -> Option<&str> {
    text.char_indices()
        .filter(|&(_, c)| c == '{')
        .find_map(|(start, _)| {
            let end = balanced_end(&text[start..])?;
            let candidate = &text[start..start + end];
            matches!(
                serde_json::from_str::<serde_json::Value>(candidate),
                Ok(serde_json::Value::Object(_))
            )
            .then_some(candidate)
        })
}

/// Byte length of the balanced object starting at the first byte of `text`.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}
