//! Request middleware pipeline
//!
//! Every cross-process call passes through an ordered list of [`Middleware`]
//! stages before reaching a terminal [`Handler`]. Each stage either calls
//! [`Next::run`] (possibly after inspecting or mutating the arguments) or
//! short-circuits by returning an error, which unwinds the chain without
//! reaching later stages or the terminal handler.
//!
//! # Default order
//! ```text
//! logging → auth → rate_limit → sanitize → schema → performance → normalize → handler
//! ```
//! Error normalization sits last so it reshapes handler faults while gate
//! rejections from earlier stages pass through with their own codes.

pub mod auth;
pub mod logging;
pub mod normalize;
pub mod performance;
pub mod rate_limit;
pub mod sanitize;
pub mod schema;

pub use auth::AuthStage;
pub use logging::LoggingStage;
pub use normalize::ErrorNormalizationStage;
pub use performance::PerformanceStage;
pub use rate_limit::RateLimitStage;
pub use sanitize::SanitizeStage;
pub use schema::{SchemaRule, SchemaStage};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::PipelineError;

pub type HandlerResult = Result<Value, PipelineError>;

/// Identity of the process or window that issued a request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Caller {
    pub id: String,
    pub authenticated: bool,
}

impl Caller {
    pub fn authenticated(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            authenticated: true,
        }
    }

    pub fn anonymous(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            authenticated: false,
        }
    }
}

/// One request travelling through the pipeline
///
/// `args` is shared by every stage; sanitization rewrites it in place.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub caller: Caller,
    pub channel: String,
    pub args: Vec<Value>,
}

impl Invocation {
    pub fn new(caller: Caller, channel: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            caller,
            channel: channel.into(),
            args,
        }
    }

    /// First positional argument, treated as the request record
    pub fn payload(&self) -> Option<&Value> {
        self.args.first()
    }
}

/// Terminal handler at the end of the pipeline
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, invocation: &mut Invocation) -> HandlerResult;
}

/// Cross-cutting stage
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, invocation: &mut Invocation, next: Next<'_>) -> HandlerResult;
}

/// Continuation to the remaining stages and the terminal handler
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    terminal: &'a dyn Handler,
}

impl<'a> Next<'a> {
    pub async fn run(self, invocation: &mut Invocation) -> HandlerResult {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    terminal: self.terminal,
                };
                stage.handle(invocation, next).await
            }
            None => self.terminal.call(invocation).await,
        }
    }
}

/// Stages composed around a terminal handler
pub struct Pipeline<H> {
    stages: Vec<Arc<dyn Middleware>>,
    terminal: H,
}

impl<H: Handler> Pipeline<H> {
    /// Compose `stages` (outermost first) around `terminal`
    pub fn new(stages: Vec<Arc<dyn Middleware>>, terminal: H) -> Self {
        Self { stages, terminal }
    }

    pub fn builder(terminal: H) -> PipelineBuilder<H> {
        PipelineBuilder {
            stages: Vec::new(),
            terminal,
        }
    }

    /// Standard stage order configured from `config`
    pub fn standard(config: &EngineConfig, terminal: H) -> Self {
        Self::builder(terminal)
            .stage(LoggingStage::new())
            .stage(AuthStage::from_config(&config.auth))
            .stage(RateLimitStage::from_config(&config.rate_limit))
            .stage(SanitizeStage::new())
            .stage(SchemaStage::new(config.schema.clone()))
            .stage(PerformanceStage::from_config(&config.performance))
            .stage(ErrorNormalizationStage::new())
            .build()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn terminal(&self) -> &H {
        &self.terminal
    }

    pub async fn dispatch(&self, invocation: &mut Invocation) -> HandlerResult {
        let next = Next {
            stages: &self.stages,
            terminal: &self.terminal,
        };
        next.run(invocation).await
    }

    pub async fn invoke(&self, caller: Caller, channel: &str, args: Vec<Value>) -> HandlerResult {
        let mut invocation = Invocation::new(caller, channel, args);
        self.dispatch(&mut invocation).await
    }
}

pub struct PipelineBuilder<H> {
    stages: Vec<Arc<dyn Middleware>>,
    terminal: H,
}

impl<H: Handler> PipelineBuilder<H> {
    pub fn stage(mut self, stage: impl Middleware + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn build(self) -> Pipeline<H> {
        Pipeline::new(self.stages, self.terminal)
    }
}

#[cfg(test)]
pub(crate) mod testing;
