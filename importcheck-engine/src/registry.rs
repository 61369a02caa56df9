//! Processor registry
//!
//! Owns the registered processors, resolves lookups and drives execution.
//!
//! # Lifecycle
//! `uninitialized → initialized` happens lazily on the first lookup, register
//! or execute call, populating the set from the registry's catalogue in order.
//! [`ValidationRegistry::cleanup`] releases every processor and returns the
//! registry to `uninitialized`; the next access re-populates it.
//!
//! # Concurrency
//! State lives behind a `tokio::sync::RwLock`. Processors are cloned out as
//! `Arc`s before any hook runs, so no lock is held across data-store I/O.

use futures::future::join_all;
use importcheck_common::DataStore;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{ProcessorError, ProcessorResult};
use crate::processors::{self, SharedProcessor};
use crate::types::{
    ExecutionResponse, PreviewInfo, ProcessorMetadata, RegistryStatistics, ValidationOptions,
    ValidationResult, UNIVERSAL_OU,
};

/// Produces the fixed, ordered set of processors registered on initialization
pub type Catalogue = Box<dyn Fn() -> Vec<SharedProcessor> + Send + Sync>;

#[derive(Default)]
struct RegistryState {
    initialized: bool,
    /// Registration order; replacement keeps the original slot
    processors: Vec<SharedProcessor>,
    database: Option<Arc<dyn DataStore>>,
}

impl RegistryState {
    fn position(&self, id: &str) -> Option<usize> {
        self.processors.iter().position(|p| p.metadata().id == id)
    }

    fn filtered<F>(&self, predicate: F) -> Vec<SharedProcessor>
    where
        F: Fn(&ProcessorMetadata) -> bool,
    {
        self.processors
            .iter()
            .filter(|p| predicate(p.metadata()))
            .cloned()
            .collect()
    }
}

/// Explicit registry context, constructed once and shared via `Arc`
pub struct ValidationRegistry {
    catalogue: Catalogue,
    state: RwLock<RegistryState>,
}

impl ValidationRegistry {
    pub fn new(catalogue: Catalogue) -> Self {
        Self {
            catalogue,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Registry over the built-in processors
    pub fn with_builtin() -> Self {
        Self::new(Box::new(processors::builtin))
    }

    /// Registry whose catalogue is empty; processors come from `register`
    pub fn empty() -> Self {
        Self::new(Box::new(Vec::new))
    }

    // ========================================
    // Lifecycle
    // ========================================

    /// Populate from the catalogue; no-op once initialized
    pub async fn initialize(&self) {
        let mut state = self.state.write().await;
        if state.initialized {
            return;
        }

        for processor in (self.catalogue)() {
            Self::insert(&mut state, processor).await;
        }
        state.initialized = true;

        info!(processors = state.processors.len(), "Validation registry initialized");
    }

    async fn ensure_initialized(&self) {
        if !self.state.read().await.initialized {
            self.initialize().await;
        }
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.initialized
    }

    /// Number of registered processors without triggering initialization
    pub async fn len(&self) -> usize {
        self.state.read().await.processors.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Release every processor in parallel, clear the set, reset to uninitialized
    ///
    /// The data-store handle is kept and pushed into processors on the next
    /// initialization.
    pub async fn cleanup(&self) {
        let processors = {
            let mut state = self.state.write().await;
            state.initialized = false;
            std::mem::take(&mut state.processors)
        };

        let outcomes = join_all(processors.iter().map(|p| async move {
            (p.metadata().id.clone(), p.cleanup().await)
        }))
        .await;

        for (id, outcome) in outcomes {
            if let Err(e) = outcome {
                warn!(processor = %id, error = %e, "Processor cleanup failed");
            }
        }

        info!(released = processors.len(), "Validation registry cleaned up");
    }

    // ========================================
    // Registration
    // ========================================

    async fn insert(state: &mut RegistryState, processor: SharedProcessor) {
        if let Some(db) = &state.database {
            processor.set_database(Arc::clone(db)).await;
        }

        let id = processor.metadata().id.clone();
        match state.position(&id) {
            Some(idx) => {
                warn!(processor = %id, "Processor already registered; replacing previous entry");
                state.processors[idx] = processor;
            }
            None => {
                debug!(processor = %id, "Processor registered");
                state.processors.push(processor);
            }
        }
    }

    /// Insert or replace by id; injects the data store if one is configured
    pub async fn register(&self, processor: SharedProcessor) {
        self.ensure_initialized().await;
        let mut state = self.state.write().await;
        Self::insert(&mut state, processor).await;
    }

    /// Store the handle and push it into every registered processor
    pub async fn set_database(&self, db: Arc<dyn DataStore>) {
        let mut state = self.state.write().await;
        for processor in &state.processors {
            processor.set_database(Arc::clone(&db)).await;
        }
        state.database = Some(db);
        debug!(processors = state.processors.len(), "Database handle distributed");
    }

    /// Remove by id; the processor's cleanup failure is logged, not returned
    pub async fn unregister(&self, id: &str) -> bool {
        self.ensure_initialized().await;
        let removed = {
            let mut state = self.state.write().await;
            state.position(id).map(|idx| state.processors.remove(idx))
        };

        match removed {
            Some(processor) => {
                if let Err(e) = processor.cleanup().await {
                    warn!(processor = %id, error = %e, "Processor cleanup failed during unregister");
                }
                info!(processor = %id, "Processor unregistered");
                true
            }
            None => false,
        }
    }

    // ========================================
    // Lookups
    // ========================================

    pub async fn get(&self, id: &str) -> Option<SharedProcessor> {
        self.ensure_initialized().await;
        let state = self.state.read().await;
        state.position(id).map(|idx| Arc::clone(&state.processors[idx]))
    }

    pub async fn all(&self) -> Vec<SharedProcessor> {
        self.ensure_initialized().await;
        self.state.read().await.processors.clone()
    }

    pub async fn by_category(&self, category: &str) -> Vec<SharedProcessor> {
        self.ensure_initialized().await;
        self.state.read().await.filtered(|m| m.category == category)
    }

    pub async fn by_required(&self, required: bool) -> Vec<SharedProcessor> {
        self.ensure_initialized().await;
        self.state.read().await.filtered(|m| m.required == required)
    }

    /// Processors scoped to `ou` plus every universal processor
    pub async fn for_ou(&self, ou: &str) -> Vec<SharedProcessor> {
        self.ensure_initialized().await;
        self.state.read().await.filtered(|m| m.applies_to_ou(ou))
    }

    /// Processors carrying any of `tags`
    pub async fn by_tags(&self, tags: &[&str]) -> Vec<SharedProcessor> {
        self.ensure_initialized().await;
        self.state
            .read()
            .await
            .filtered(|m| tags.iter().any(|tag| m.tags.contains(*tag)))
    }

    /// Metadata of every processor, ascending by sequence
    pub async fn metadata(&self, ou: Option<&str>) -> Vec<ProcessorMetadata> {
        let processors = match ou {
            Some(ou) => self.for_ou(ou).await,
            None => self.all().await,
        };
        sorted_by_sequence(processors)
            .iter()
            .map(|p| p.metadata().clone())
            .collect()
    }

    pub async fn statistics(&self) -> RegistryStatistics {
        self.ensure_initialized().await;
        let state = self.state.read().await;

        let mut stats = RegistryStatistics {
            total: state.processors.len(),
            ..RegistryStatistics::default()
        };
        for processor in &state.processors {
            let metadata = processor.metadata();
            *stats.by_category.entry(metadata.category.clone()).or_default() += 1;
            let ou = metadata.ou.clone().unwrap_or_else(|| UNIVERSAL_OU.to_string());
            *stats.by_ou.entry(ou).or_default() += 1;
            if metadata.required {
                stats.required += 1;
            }
        }
        stats
    }

    // ========================================
    // Execution
    // ========================================

    /// Run one processor: `pre_validation → validate → post_validation`
    ///
    /// Never returns a fault; a missing processor or a failing hook yields an
    /// envelope with `success: false`.
    pub async fn execute(&self, id: &str, options: &ValidationOptions) -> ExecutionResponse {
        let started = Instant::now();

        let Some(processor) = self.get(id).await else {
            warn!(processor = %id, "Validation requested for unknown processor");
            return ExecutionResponse::failed(
                id,
                ProcessorError::NotFound(id.to_string()).to_string(),
                elapsed_ms(started),
            );
        };

        if options.skip {
            debug!(processor = %id, "Validation skipped");
            return ExecutionResponse::completed(id, ValidationResult::skipped(id), elapsed_ms(started));
        }

        match run_lifecycle(&processor, options).await {
            Ok(result) => ExecutionResponse::completed(id, result, elapsed_ms(started)),
            Err(e) => {
                warn!(processor = %id, error = %e, "Validation execution failed");
                ExecutionResponse::failed(id, e.to_string(), elapsed_ms(started))
            }
        }
    }

    /// Sequential execution in the given order
    ///
    /// With `stop_on_first_error`, the loop halts after the first response that
    /// either faulted or carries a failing result.
    pub async fn execute_many(&self, ids: &[String], options: &ValidationOptions) -> Vec<ExecutionResponse> {
        let mut responses = Vec::with_capacity(ids.len());
        for id in ids {
            let response = self.execute(id, options).await;
            let halt = options.stop_on_first_error && response.is_failure();
            responses.push(response);
            if halt {
                info!(processor = %id, remaining = ids.len() - responses.len(), "Stopping after first failure");
                break;
            }
        }
        responses
    }

    /// Every processor applicable to `ou`, ascending by sequence
    pub async fn execute_all_for_ou(&self, ou: &str, options: &ValidationOptions) -> Vec<ExecutionResponse> {
        let ids: Vec<String> = sorted_by_sequence(self.for_ou(ou).await)
            .iter()
            .map(|p| p.metadata().id.clone())
            .collect();
        info!(ou = %ou, processors = ids.len(), "Running all validations for OU");

        let mut options = options.clone();
        options.ou.get_or_insert_with(|| ou.to_string());
        self.execute_many(&ids, &options).await
    }

    pub async fn preview(&self, id: &str, options: &ValidationOptions) -> ProcessorResult<PreviewInfo> {
        let processor = self
            .get(id)
            .await
            .ok_or_else(|| ProcessorError::NotFound(id.to_string()))?;
        processor.preview(options).await
    }
}

async fn run_lifecycle(processor: &SharedProcessor, options: &ValidationOptions) -> ProcessorResult<ValidationResult> {
    processor.pre_validation(options).await?;
    let result = processor.validate(options).await?;
    processor.post_validation(&result, options).await;
    Ok(result)
}

/// Stable sort, so equal sequences keep registration order
fn sorted_by_sequence(mut processors: Vec<SharedProcessor>) -> Vec<SharedProcessor> {
    processors.sort_by_key(|p| p.metadata().sequence);
    processors
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
