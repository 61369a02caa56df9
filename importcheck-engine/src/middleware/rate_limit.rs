//! Fixed-window rate limiter
//!
//! Keeps one counter and one reset instant per (caller, channel). Each call
//! first rolls the window over when `now > reset_at`, then either rejects
//! (counter already at max, not incremented) or increments and proceeds.
//! Bursts straddling a window boundary can reach twice the limit.
//!
//! Check-and-increment happens under a synchronous lock with no `.await` in
//! between, so concurrent requests cannot both slip under the limit.
//!
//! Caller ids and channel names come from the client. Expired windows are
//! swept under the same lock at most once per window length, which bounds the
//! table to the keys seen in roughly the last two windows.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::{HandlerResult, Invocation, Middleware, Next};
use crate::config::RateLimitConfig;
use crate::error::PipelineError;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

type WindowKey = (String, String);

#[derive(Debug)]
struct WindowTable {
    entries: HashMap<WindowKey, Window>,
    next_sweep: Instant,
}

impl WindowTable {
    /// Drop every window that has already rolled over
    fn sweep(&mut self, now: Instant, window: Duration) {
        if now < self.next_sweep {
            return;
        }
        let before = self.entries.len();
        self.entries.retain(|_, w| now <= w.reset_at);
        self.next_sweep = now + window;

        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), "Expired rate limit windows swept");
        }
    }
}

#[derive(Debug)]
pub struct RateLimitStage {
    max_requests: u32,
    window: Duration,
    windows: Mutex<WindowTable>,
}

impl RateLimitStage {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(WindowTable {
                entries: HashMap::new(),
                next_sweep: Instant::now() + window,
            }),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
    }

    /// Count the call against its window; returns the new count
    pub fn try_acquire(&self, caller: &str, channel: &str) -> Result<u32, PipelineError> {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.sweep(now, self.window);

        let window = windows
            .entries
            .entry((caller.to_string(), channel.to_string()))
            .or_insert(Window {
                count: 0,
                reset_at: now + self.window,
            });

        if now > window.reset_at {
            window.count = 0;
            window.reset_at = now + self.window;
        }

        if window.count >= self.max_requests {
            return Err(PipelineError::RateLimited {
                caller: caller.to_string(),
                channel: channel.to_string(),
                max: self.max_requests,
                window_ms: self.window.as_millis() as u64,
            });
        }

        window.count += 1;
        Ok(window.count)
    }

    /// Calls counted in the current window for (caller, channel)
    pub fn current_count(&self, caller: &str, channel: &str) -> u32 {
        let windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows
            .entries
            .get(&(caller.to_string(), channel.to_string()))
            .map_or(0, |w| w.count)
    }

    /// (caller, channel) windows currently held
    pub fn tracked_windows(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}

#[async_trait]
impl Middleware for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn handle(&self, invocation: &mut Invocation, next: Next<'_>) -> HandlerResult {
        let count = self.try_acquire(&invocation.caller.id, &invocation.channel)?;
        debug!(
            caller = %invocation.caller.id,
            channel = %invocation.channel,
            count,
            max = self.max_requests,
            "Rate limit check passed"
        );
        next.run(invocation).await
    }
}
