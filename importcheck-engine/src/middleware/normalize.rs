//! Error normalization stage
//!
//! Wraps any fault escaping the continuation into the uniform
//! [`Fault`](crate::error::Fault) shape. Codes already carried by the fault are
//! kept; anything else becomes `INTERNAL_ERROR`. Sits last before the terminal
//! handler, so gate rejections raised earlier never pass through it.

use async_trait::async_trait;
use tracing::debug;

use super::{HandlerResult, Invocation, Middleware, Next};
use crate::error::PipelineError;

#[derive(Debug, Default)]
pub struct ErrorNormalizationStage;

impl ErrorNormalizationStage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for ErrorNormalizationStage {
    fn name(&self) -> &'static str {
        "normalize"
    }

    async fn handle(&self, invocation: &mut Invocation, next: Next<'_>) -> HandlerResult {
        next.run(invocation).await.map_err(|e| {
            let fault = e.to_fault();
            debug!(channel = %invocation.channel, code = %fault.code, "Fault normalized");
            PipelineError::Normalized(fault)
        })
    }
}
