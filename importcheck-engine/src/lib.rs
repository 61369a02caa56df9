//! importcheck-engine library interface
//!
//! Validation registry, processors, request middleware and the HTTP adapter
//! the front-end uses to reach them. Exposed as a library for integration
//! testing.

pub mod api;
pub mod channels;
pub mod config;
pub mod error;
pub mod middleware;
pub mod processors;
pub mod registry;
pub mod types;

pub use crate::error::{ApiError, ApiResult, PipelineError, ProcessorError};
pub use crate::registry::ValidationRegistry;

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::channels::ValidationDispatcher;
use crate::config::EngineConfig;
use crate::middleware::Pipeline;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Middleware chain ending in the channel dispatcher
    pub pipeline: Arc<Pipeline<ValidationDispatcher>>,
    /// Token callers must present; `None` treats every caller as authenticated
    pub shared_secret: Option<String>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last pipeline error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// Wrap `registry` in the standard pipeline configured by `config`
    pub fn new(registry: Arc<ValidationRegistry>, config: &EngineConfig) -> Self {
        let dispatcher = ValidationDispatcher::new(registry);
        Self::with_pipeline(
            Pipeline::standard(config, dispatcher),
            config.auth.shared_secret.clone(),
        )
    }

    pub fn with_pipeline(pipeline: Pipeline<ValidationDispatcher>, shared_secret: Option<String>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            shared_secret,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn registry(&self) -> &Arc<ValidationRegistry> {
        self.pipeline.terminal().registry()
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::invoke_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
