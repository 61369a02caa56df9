//! Request logging stage
//!
//! Logs entry, then elapsed time and outcome. Never alters the result.

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use super::{HandlerResult, Invocation, Middleware, Next};

#[derive(Debug, Default)]
pub struct LoggingStage;

impl LoggingStage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for LoggingStage {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn handle(&self, invocation: &mut Invocation, next: Next<'_>) -> HandlerResult {
        let request_id = Uuid::new_v4();
        let caller = invocation.caller.id.clone();
        let channel = invocation.channel.clone();

        info!(
            %request_id,
            caller = %caller,
            channel = %channel,
            args = invocation.args.len(),
            "Request received"
        );

        let started = Instant::now();
        let result = next.run(invocation).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => info!(%request_id, channel = %channel, elapsed_ms, "Request completed"),
            Err(e) => warn!(
                %request_id,
                caller = %caller,
                channel = %channel,
                code = e.code(),
                error = %e,
                elapsed_ms,
                "Request failed"
            ),
        }

        result
    }
}
