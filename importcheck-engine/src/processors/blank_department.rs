//! Blank Department processor
//!
//! Records imported without a department cannot be allocated; they are
//! reported as a single error line carrying the affected count.

use async_trait::async_trait;
use chrono::Utc;
use importcheck_common::{DataStore, Row};
use std::sync::Arc;

use super::base::{ProcessorBase, RecordFilter, DEFAULT_SAMPLE_LIMIT};
use super::Processor;
use crate::error::ProcessorResult;
use crate::types::{ErrorDetail, ProcessorMetadata, ValidationOptions, ValidationResult};

pub const ID: &str = "blank-department";

const BLANK: &str = "TRIM(department) = ''";

pub struct BlankDepartment {
    base: ProcessorBase,
}

impl BlankDepartment {
    pub fn new() -> Self {
        let metadata = ProcessorMetadata::new(ID, "Blank Department")
            .with_description("Flags records imported without a department")
            .with_category("completeness")
            .with_sequence(20)
            .with_estimated_duration(500)
            .with_tags(["completeness", "departments"]);
        Self {
            base: ProcessorBase::new(metadata),
        }
    }
}

impl Default for BlankDepartment {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Processor for BlankDepartment {
    fn metadata(&self) -> &ProcessorMetadata {
        self.base.metadata()
    }

    async fn set_database(&self, db: Arc<dyn DataStore>) {
        self.base.set_database(db).await;
    }

    async fn pre_validation(&self, _options: &ValidationOptions) -> ProcessorResult<()> {
        self.base.pre_validation().await
    }

    async fn validate(&self, options: &ValidationOptions) -> ProcessorResult<ValidationResult> {
        let started = Utc::now();
        let filter = RecordFilter::from_options(options);
        let blank_filter = filter.clone().and_raw(BLANK);

        let record_count = self.base.count_records("records", &filter).await?;
        let blank = self.base.count_records("records", &blank_filter).await?;

        let mut result = ValidationResult {
            record_count,
            ..ValidationResult::default()
        };

        if blank > 0 {
            let message = format!("{} records have no department", blank);
            if options.detailed {
                let limit = options.custom.sample_limit.unwrap_or(DEFAULT_SAMPLE_LIMIT);
                let sql = format!(
                    "SELECT id, account, period, ou FROM records{} ORDER BY id LIMIT {}",
                    blank_filter.where_clause(),
                    limit
                );
                let samples = self.base.query(&sql, blank_filter.args()).await?;
                result.error_details.push(ErrorDetail {
                    kind: "blank_department".to_string(),
                    message: message.clone(),
                    count: blank,
                    samples: samples.iter().map(Row::to_json).collect(),
                });
            }
            result.errors.push(message);
        }

        Ok(self.base.finish(result, options, started))
    }

    async fn post_validation(&self, result: &ValidationResult, _options: &ValidationOptions) {
        self.base.post_validation(result);
    }

    async fn cleanup(&self) -> ProcessorResult<()> {
        self.base.release().await;
        Ok(())
    }
}
