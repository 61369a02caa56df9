//! Schema validation gate
//!
//! For channels with a configured rule, the first positional argument is
//! treated as a record and every required field must be present and non-null.
//! All missing fields are reported in a single fault.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::{HandlerResult, Invocation, Middleware, Next};
use crate::error::PipelineError;

/// Required fields for one channel
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SchemaRule {
    pub channel: String,
    pub required: Vec<String>,
}

impl SchemaRule {
    pub fn new<I, S>(channel: impl Into<String>, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channel: channel.into(),
            required: required.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SchemaStage {
    rules: HashMap<String, Vec<String>>,
}

impl SchemaStage {
    pub fn new(rules: Vec<SchemaRule>) -> Self {
        Self {
            rules: rules.into_iter().map(|r| (r.channel, r.required)).collect(),
        }
    }
}

/// Required fields absent or null in `payload`, in rule order
pub fn missing_fields(payload: Option<&Value>, required: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|field| {
            matches!(
                payload.and_then(|p| p.get(field.as_str())),
                None | Some(Value::Null)
            )
        })
        .cloned()
        .collect()
}

#[async_trait]
impl Middleware for SchemaStage {
    fn name(&self) -> &'static str {
        "schema"
    }

    async fn handle(&self, invocation: &mut Invocation, next: Next<'_>) -> HandlerResult {
        if let Some(required) = self.rules.get(&invocation.channel) {
            let missing = missing_fields(invocation.payload(), required);
            if !missing.is_empty() {
                return Err(PipelineError::SchemaViolation { missing });
            }
        }
        next.run(invocation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::testing::{echo_pipeline, CountingHandler};
    use crate::middleware::Caller;
    use serde_json::json;
    use std::sync::Arc;

    fn required(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_absent_and_null_fields_are_missing() {
        let payload = json!({"validationName": "x", "ou": null, "period": {"year": 2024, "month": 1}});

        let missing = missing_fields(Some(&payload), &required(&["validationName", "ou", "period", "extra"]));

        assert_eq!(missing, vec!["ou", "extra"]);
    }

    #[test]
    fn test_non_object_payload_misses_everything() {
        let missing = missing_fields(Some(&json!("text")), &required(&["a", "b"]));
        assert_eq!(missing, vec!["a", "b"]);

        let missing = missing_fields(None, &required(&["a"]));
        assert_eq!(missing, vec!["a"]);
    }

    #[tokio::test]
    async fn test_all_missing_fields_reported_together() {
        let stage: Arc<dyn Middleware> = Arc::new(SchemaStage::new(vec![SchemaRule::new(
            "validation:run-all",
            ["ou", "period"],
        )]));
        let handler = CountingHandler::new();
        let pipeline = echo_pipeline(vec![stage], handler.clone());

        let err = pipeline
            .invoke(Caller::authenticated("w"), "validation:run-all", vec![json!({})])
            .await
            .unwrap_err();

        match err {
            PipelineError::SchemaViolation { missing } => assert_eq!(missing, vec!["ou", "period"]),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(handler.calls(), 0);

        // Channels without a rule are not inspected
        pipeline
            .invoke(Caller::authenticated("w"), "validation:stats", vec![])
            .await
            .unwrap();
        assert_eq!(handler.calls(), 1);
    }
}
