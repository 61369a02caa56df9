//! Shared processor scaffolding
//!
//! [`ProcessorBase`] owns one processor's metadata, its injected data-store
//! handle and its `initialized` flag. Nothing here is shared between
//! processor instances.

use chrono::{DateTime, Utc};
use importcheck_common::{DataStore, Row, SqlValue, Statement};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{ProcessorError, ProcessorResult};
use crate::types::{PreviewInfo, ProcessorMetadata, ValidationOptions, ValidationResult};

/// Sample rows kept per error detail unless `custom.sampleLimit` says otherwise
pub const DEFAULT_SAMPLE_LIMIT: usize = 5;

/// Parameterized `WHERE` clause built from options
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    clauses: Vec<String>,
    args: Vec<SqlValue>,
}

impl RecordFilter {
    /// Restrict to `options.ou` and `options.period` when present
    pub fn from_options(options: &ValidationOptions) -> Self {
        let mut filter = Self::default();
        if let Some(ou) = &options.ou {
            filter = filter.and("ou = ?", ou.as_str());
        }
        if let Some(period) = &options.period {
            filter = filter.and("period = ?", period.key());
        }
        filter
    }

    pub fn and(mut self, clause: impl Into<String>, arg: impl Into<SqlValue>) -> Self {
        self.clauses.push(clause.into());
        self.args.push(arg.into());
        self
    }

    /// Clause without a bound argument
    pub fn and_raw(mut self, clause: impl Into<String>) -> Self {
        self.clauses.push(clause.into());
        self
    }

    /// ` WHERE a AND b`, or empty when unfiltered
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn args(&self) -> Vec<SqlValue> {
        self.args.clone()
    }
}

/// Default lifecycle behavior and helpers for concrete processors
pub struct ProcessorBase {
    metadata: ProcessorMetadata,
    database: RwLock<Option<Arc<dyn DataStore>>>,
    initialized: AtomicBool,
}

impl ProcessorBase {
    pub fn new(metadata: ProcessorMetadata) -> Self {
        Self {
            metadata,
            database: RwLock::new(None),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn metadata(&self) -> &ProcessorMetadata {
        &self.metadata
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub async fn set_database(&self, db: Arc<dyn DataStore>) {
        *self.database.write().await = Some(db);
        debug!(processor = %self.metadata.id, "Database handle injected");
    }

    pub async fn has_database(&self) -> bool {
        self.database.read().await.is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// One-time initialization; returns `true` only for the call that did it
    pub fn initialize(&self) -> bool {
        let first = !self.initialized.swap(true, Ordering::SeqCst);
        if first {
            debug!(processor = %self.metadata.id, "Processor initialized");
        }
        first
    }

    /// Initialize, then require an injected data store
    pub async fn pre_validation(&self) -> ProcessorResult<()> {
        self.initialize();
        if !self.has_database().await {
            return Err(ProcessorError::NoDatabase(self.metadata.id.clone()));
        }
        Ok(())
    }

    pub fn post_validation(&self, result: &ValidationResult) {
        info!(
            processor = %self.metadata.id,
            success = result.success,
            records = result.record_count,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            duration_ms = result.stats.duration,
            "Validation finished"
        );
    }

    /// Static estimate: metadata duration, zero records
    pub fn preview(&self) -> PreviewInfo {
        PreviewInfo {
            description: self.metadata.description.clone(),
            records_to_check: 0,
            estimated_duration: self.metadata.estimated_duration,
        }
    }

    /// Drop the data-store handle and reset the initialized flag
    pub async fn release(&self) {
        self.database.write().await.take();
        self.initialized.store(false, Ordering::SeqCst);
    }

    async fn database(&self) -> ProcessorResult<Arc<dyn DataStore>> {
        self.database
            .read()
            .await
            .clone()
            .ok_or_else(|| ProcessorError::NoDatabase(self.metadata.id.clone()))
    }

    // ========================================
    // Query helpers
    // ========================================

    pub async fn query(&self, sql: &str, args: Vec<SqlValue>) -> ProcessorResult<Vec<Row>> {
        let db = self.database().await?;
        let output = db.execute(Statement::with_args(sql, args)).await?;
        Ok(output.rows)
    }

    /// First column of the first row
    pub async fn query_scalar(&self, sql: &str, args: Vec<SqlValue>) -> ProcessorResult<Option<SqlValue>> {
        let rows = self.query(sql, args).await?;
        Ok(rows.into_iter().next().and_then(|row| row.first().cloned()))
    }

    /// `COUNT(*)` over `table` restricted by `filter`; 0 when nothing comes back
    pub async fn count_records(&self, table: &str, filter: &RecordFilter) -> ProcessorResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}{}", table, filter.where_clause());
        let count = self
            .query_scalar(&sql, filter.args())
            .await?
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        Ok(count.max(0) as u64)
    }

    // ========================================
    // Result formatting
    // ========================================

    /// Stamp wall-clock timing measured from `started`
    pub fn stamp_stats(result: &mut ValidationResult, started: DateTime<Utc>) {
        let ended = Utc::now();
        result.stats.start_time = Some(started);
        result.stats.end_time = Some(ended);
        result.stats.duration = ended
            .signed_duration_since(started)
            .num_milliseconds()
            .max(0) as u64;
    }

    /// Apply option-driven formatting and derive `success` from `errors`
    ///
    /// `success` is computed before `maxErrors` truncation so a truncated list
    /// still fails. A `maxErrors` of 0 means no limit.
    pub fn finish(
        &self,
        mut result: ValidationResult,
        options: &ValidationOptions,
        started: DateTime<Utc>,
    ) -> ValidationResult {
        result.success = result.success && result.errors.is_empty();
        let total_errors = result.errors.len();

        if let Some(max) = options.max_errors.filter(|max| *max > 0) {
            if total_errors > max {
                result.errors.truncate(max);
                result.warnings.push(format!(
                    "{} additional errors suppressed (maxErrors={})",
                    total_errors - max,
                    max
                ));
            }
        }

        if options.detailed {
            let limit = options.custom.sample_limit.unwrap_or(DEFAULT_SAMPLE_LIMIT);
            for detail in &mut result.error_details {
                detail.samples.truncate(limit);
            }
        } else {
            result.error_details.clear();
        }

        result.stats.records_checked = result.record_count;
        result.stats.issues_found = (total_errors + result.warnings.len()) as u64;

        let metadata = &mut result.metadata;
        metadata.processor_id.get_or_insert_with(|| self.metadata.id.clone());
        if metadata.ou.is_none() {
            metadata.ou = options.ou.clone();
        }
        if metadata.period.is_none() {
            metadata.period = options.period.map(|p| p.key());
        }

        Self::stamp_stats(&mut result, started);
        result
    }
}
