//! Input sanitization stage
//!
//! Walks every argument recursively before the continuation runs and rewrites
//! the shared argument list in place:
//! - `javascript:` URIs and inline event-handler attributes are stripped
//! - script tags are treated as an attack and reject the whole request, as does
//!   a script tag reassembled by the stripping itself
//! - object keys that can pollute prototypes (`__*`, `constructor`,
//!   `prototype`) are dropped along with their values

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{HandlerResult, Invocation, Middleware, Next};
use crate::error::PipelineError;

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<\s*script\b.*?<\s*/\s*script\s*>").expect("script block pattern"));
static SCRIPT_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*script\b").expect("script open pattern"));
static JAVASCRIPT_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)javascript\s*:").expect("javascript uri pattern"));
static EVENT_HANDLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bon[a-z]{3,}\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]*)"#).expect("event handler pattern")
});

/// Keys dropped from objects
pub fn is_pollution_key(key: &str) -> bool {
    key.starts_with("__") || key == "constructor" || key == "prototype"
}

/// Clean one string; `path` names its location for the rejection message
pub fn sanitize_str(value: &str, path: &str) -> Result<String, PipelineError> {
    let had_script = SCRIPT_BLOCK.is_match(value);
    let without_scripts = SCRIPT_BLOCK.replace_all(value, "");
    let without_uris = JAVASCRIPT_URI.replace_all(&without_scripts, "");
    let cleaned = EVENT_HANDLER.replace_all(&without_uris, "");

    if had_script || SCRIPT_OPEN.is_match(&cleaned) {
        warn!(path = %path, "Script content rejected");
        return Err(PipelineError::SecurityViolation {
            path: path.to_string(),
        });
    }

    if cleaned.len() != value.len() {
        debug!(path = %path, "String sanitized");
    }
    Ok(cleaned.into_owned())
}

/// Recursively sanitize `value`
pub fn sanitize_value(value: Value, path: &str) -> Result<Value, PipelineError> {
    match value {
        Value::String(s) => sanitize_str(&s, path).map(Value::String),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| sanitize_value(item, &format!("{}[{}]", path, idx)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut cleaned = Map::with_capacity(map.len());
            for (key, item) in map {
                if is_pollution_key(&key) {
                    warn!(path = %path, key = %key, "Dropped prototype-pollution key");
                    continue;
                }
                let child = format!("{}.{}", path, key);
                let item = sanitize_value(item, &child)?;
                cleaned.insert(key, item);
            }
            Ok(Value::Object(cleaned))
        }
        other => Ok(other),
    }
}

#[derive(Debug, Default)]
pub struct SanitizeStage;

impl SanitizeStage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for SanitizeStage {
    fn name(&self) -> &'static str {
        "sanitize"
    }

    async fn handle(&self, invocation: &mut Invocation, next: Next<'_>) -> HandlerResult {
        for (idx, arg) in invocation.args.iter_mut().enumerate() {
            let raw = arg.take();
            *arg = sanitize_value(raw, &format!("args[{}]", idx))?;
        }
        next.run(invocation).await
    }
}
