//! Duplicate Records processor
//!
//! Groups imported records by their natural key (account, department, period).
//! Every group seen more than once becomes one error line; a single warning
//! summarizes how many records are in excess overall.

use async_trait::async_trait;
use chrono::Utc;
use importcheck_common::{DataStore, Row};
use serde_json::Value;
use std::sync::Arc;

use super::base::{ProcessorBase, RecordFilter, DEFAULT_SAMPLE_LIMIT};
use super::Processor;
use crate::error::ProcessorResult;
use crate::types::{ErrorDetail, PreviewInfo, ProcessorMetadata, ValidationOptions, ValidationResult};

pub const ID: &str = "duplicate-records";

pub struct DuplicateRecords {
    base: ProcessorBase,
}

impl DuplicateRecords {
    pub fn new() -> Self {
        let metadata = ProcessorMetadata::new(ID, "Duplicate Records")
            .with_description("Detects records sharing account, department and period")
            .with_category("integrity")
            .with_required(true)
            .with_sequence(10)
            .with_estimated_duration(2000)
            .with_tags(["duplicates", "integrity"]);
        Self {
            base: ProcessorBase::new(metadata),
        }
    }

    async fn samples(
        &self,
        filter: &RecordFilter,
        key: (&str, &str, &str),
        limit: usize,
    ) -> ProcessorResult<Vec<Row>> {
        let (account, department, period) = key;
        let filter = filter
            .clone()
            .and("account = ?", account)
            .and("department = ?", department)
            .and("period = ?", period);
        let sql = format!(
            "SELECT id, account, department, period, amount FROM records{} ORDER BY id LIMIT {}",
            filter.where_clause(),
            limit
        );
        self.base.query(&sql, filter.args()).await
    }
}

impl Default for DuplicateRecords {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Processor for DuplicateRecords {
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

        let record_count = self.base.count_records("records", &filter).await?;
        let sql = format!(
            "SELECT account, department, period, COUNT(*) AS cnt FROM records{} \
             GROUP BY account, department, period HAVING COUNT(*) > 1 \
             ORDER BY cnt DESC, account, department, period",
            filter.where_clause()
        );
        let groups = self.base.query(&sql, filter.args()).await?;

        let mut result = ValidationResult {
            record_count,
            ..ValidationResult::default()
        };
        let sample_limit = options.custom.sample_limit.unwrap_or(DEFAULT_SAMPLE_LIMIT);
        let mut excess = 0u64;

        for group in &groups {
            let account = group.get_str("account").unwrap_or_default();
            let department = group.get_str("department").unwrap_or_default();
            let period = group.get_str("period").unwrap_or_default();
            let count = group.get_i64("cnt").unwrap_or(0).max(0) as u64;
            excess += count.saturating_sub(1);

            let message = format!(
                "Duplicate record: account={}, department={}, period={} (count {})",
                account, department, period, count
            );

            if options.detailed {
                let samples = self
                    .samples(&filter, (account, department, period), sample_limit)
                    .await?;
                result.error_details.push(ErrorDetail {
                    kind: "duplicate".to_string(),
                    message: message.clone(),
                    count,
                    samples: samples.iter().map(Row::to_json).collect(),
                });
            }
            result.errors.push(message);
        }

        if excess > 0 {
            result.warnings.push(format!(
                "{} excess duplicate records across {} groups",
                excess,
                groups.len()
            ));
        } else {
            result
                .info
                .push(format!("No duplicates among {} records", record_count));
        }
        result
            .metadata
            .extra
            .insert("excessRecords".to_string(), Value::from(excess));

        Ok(self.base.finish(result, options, started))
    }

    async fn post_validation(&self, result: &ValidationResult, _options: &ValidationOptions) {
        self.base.post_validation(result);
    }

    async fn preview(&self, options: &ValidationOptions) -> ProcessorResult<PreviewInfo> {
        let filter = RecordFilter::from_options(options);
        let records = self.base.count_records("records", &filter).await?;
        Ok(PreviewInfo {
            description: format!(
                "Check {} records for duplicate account/department/period keys",
                records
            ),
            records_to_check: records,
            estimated_duration: self.base.metadata().estimated_duration,
        })
    }

    async fn cleanup(&self) -> ProcessorResult<()> {
        self.base.release().await;
        Ok(())
    }
}
