//! Terminal handlers for stage unit tests

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{Handler, HandlerResult, Invocation, Middleware, Pipeline};
use crate::error::PipelineError;

/// Echoes channel and args back, counting calls
#[derive(Clone, Default)]
pub struct CountingHandler {
    calls: Arc<AtomicUsize>,
    last_args: Arc<Mutex<Vec<Value>>>,
}

impl CountingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_args(&self) -> Vec<Value> {
        self.last_args.lock().unwrap().clone()
    }
}

#[async_trait]
impl Handler for CountingHandler {
    async fn call(&self, invocation: &mut Invocation) -> HandlerResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_args.lock().unwrap() = invocation.args.clone();
        Ok(json!({"channel": invocation.channel, "args": invocation.args}))
    }
}

/// Always fails with an uncoded internal error
pub struct FailingHandler;

#[async_trait]
impl Handler for FailingHandler {
    async fn call(&self, _invocation: &mut Invocation) -> HandlerResult {
        Err(PipelineError::Internal(anyhow::anyhow!("registry exploded")))
    }
}

/// Sleeps on the tokio clock before answering `null`
pub struct SlowHandler(pub Duration);

#[async_trait]
impl Handler for SlowHandler {
    async fn call(&self, _invocation: &mut Invocation) -> HandlerResult {
        tokio::time::sleep(self.0).await;
        Ok(Value::Null)
    }
}

pub fn echo_pipeline(stages: Vec<Arc<dyn Middleware>>, handler: CountingHandler) -> Pipeline<CountingHandler> {
    Pipeline::new(stages, handler)
}
