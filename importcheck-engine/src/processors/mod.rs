//! Validation processors
//!
//! A processor is one pluggable check against the imported records. Every
//! processor satisfies the [`Processor`] contract; the concrete checks build on
//! [`ProcessorBase`] for lifecycle defaults, query helpers and result formatting.
//!
//! # Processors
//! 1. **duplicate_records** - same account/department/period imported twice
//! 2. **blank_department** - records missing a department
//! 3. **a3_accounts** - informational review of A3 accounts

pub mod a3_accounts;
pub mod base;
pub mod blank_department;
pub mod duplicate_records;

pub use a3_accounts::A3Accounts;
pub use base::{ProcessorBase, RecordFilter};
pub use blank_department::BlankDepartment;
pub use duplicate_records::DuplicateRecords;

use async_trait::async_trait;
use importcheck_common::DataStore;
use std::sync::Arc;

use crate::error::ProcessorResult;
use crate::types::{PreviewInfo, ProcessorMetadata, ValidationOptions, ValidationResult};

/// Capability every validation processor exposes
///
/// Business findings are returned in the [`ValidationResult`]; an `Err` means
/// the check could not run (missing connection, data store failure).
#[async_trait]
pub trait Processor: Send + Sync {
    fn metadata(&self) -> &ProcessorMetadata;

    /// Receive the data-store handle pushed by the registry
    async fn set_database(&self, db: Arc<dyn DataStore>);

    /// Run the check
    async fn validate(&self, options: &ValidationOptions) -> ProcessorResult<ValidationResult>;

    /// Setup before `validate`; an `Err` aborts the execution
    async fn pre_validation(&self, _options: &ValidationOptions) -> ProcessorResult<()> {
        Ok(())
    }

    /// Side effects after `validate`; cannot change the response
    async fn post_validation(&self, _result: &ValidationResult, _options: &ValidationOptions) {}

    /// Read-only cost/shape estimate
    async fn preview(&self, _options: &ValidationOptions) -> ProcessorResult<PreviewInfo> {
        let metadata = self.metadata();
        Ok(PreviewInfo {
            description: metadata.description.clone(),
            records_to_check: 0,
            estimated_duration: metadata.estimated_duration,
        })
    }

    /// Idempotent resource release
    async fn cleanup(&self) -> ProcessorResult<()> {
        Ok(())
    }
}

pub type SharedProcessor = Arc<dyn Processor>;

/// Built-in processors in registration order
pub fn builtin() -> Vec<SharedProcessor> {
    vec![
        Arc::new(DuplicateRecords::new()),
        Arc::new(BlankDepartment::new()),
        Arc::new(A3Accounts::new()),
    ]
}
