//! Authentication gate
//!
//! Rejects unauthenticated callers before anything downstream runs. An
//! optional allow-list further restricts which caller ids may pass.

use async_trait::async_trait;
use std::collections::HashSet;
use tracing::debug;

use super::{HandlerResult, Invocation, Middleware, Next};
use crate::config::AuthConfig;
use crate::error::PipelineError;

#[derive(Debug, Default)]
pub struct AuthStage {
    allowed: HashSet<String>,
}

impl AuthStage {
    /// Any authenticated caller passes
    pub fn new() -> Self {
        Self::default()
    }

    /// Only authenticated callers whose id is listed pass
    pub fn with_allowed<I, S>(callers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: callers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::with_allowed(config.allowed_callers.iter().cloned())
    }

    fn admits(&self, invocation: &Invocation) -> bool {
        let caller = &invocation.caller;
        caller.authenticated && (self.allowed.is_empty() || self.allowed.contains(&caller.id))
    }
}

#[async_trait]
impl Middleware for AuthStage {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn handle(&self, invocation: &mut Invocation, next: Next<'_>) -> HandlerResult {
        if !self.admits(invocation) {
            debug!(caller = %invocation.caller.id, channel = %invocation.channel, "Caller rejected");
            return Err(PipelineError::Unauthenticated {
                caller: invocation.caller.id.clone(),
            });
        }
        next.run(invocation).await
    }
}
