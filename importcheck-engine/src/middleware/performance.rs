//! Performance monitoring stage
//!
//! Times the continuation and warns when it exceeds the configured threshold.
//! Never blocks or fails the call.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

use super::{HandlerResult, Invocation, Middleware, Next};
use crate::config::PerformanceConfig;

#[derive(Debug)]
pub struct PerformanceStage {
    threshold: Duration,
    slow_calls: AtomicU64,
}

impl PerformanceStage {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            slow_calls: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &PerformanceConfig) -> Self {
        Self::new(config.threshold())
    }

    /// Calls that exceeded the threshold since startup
    pub fn slow_calls(&self) -> u64 {
        self.slow_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Middleware for PerformanceStage {
    fn name(&self) -> &'static str {
        "performance"
    }

    async fn handle(&self, invocation: &mut Invocation, next: Next<'_>) -> HandlerResult {
        let started = Instant::now();
        let result = next.run(invocation).await;
        let elapsed = started.elapsed();

        if elapsed > self.threshold {
            self.slow_calls.fetch_add(1, Ordering::Relaxed);
            warn!(
                channel = %invocation.channel,
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.threshold.as_millis() as u64,
                "Slow request"
            );
        }

        result
    }
}
