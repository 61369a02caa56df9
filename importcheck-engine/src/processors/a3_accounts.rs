//! A3 Accounts processor (informational)
//!
//! Lists accounts whose code starts with `A3` (case-sensitive). Findings go to `info`, so the
//! check always passes; past a soft threshold of unique accounts a warning is
//! added for manual review.

use async_trait::async_trait;
use chrono::Utc;
use importcheck_common::DataStore;
use serde_json::Value;
use std::sync::Arc;

use super::base::{ProcessorBase, RecordFilter};
use super::Processor;
use crate::error::ProcessorResult;
use crate::types::{ProcessorMetadata, ValidationOptions, ValidationResult};

pub const ID: &str = "a3-accounts";

/// Unique A3 accounts tolerated before a warning is raised
pub const DEFAULT_THRESHOLD: u64 = 10;

pub struct A3Accounts {
    base: ProcessorBase,
}

impl A3Accounts {
    pub fn new() -> Self {
        let metadata = ProcessorMetadata::new(ID, "A3 Accounts")
            .with_description("Reports records booked on A3 accounts")
            .with_category("accounts")
            .with_sequence(50)
            .with_estimated_duration(800)
            .with_tags(["accounts", "informational"]);
        Self {
            base: ProcessorBase::new(metadata),
        }
    }
}

impl Default for A3Accounts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Processor for A3Accounts {
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
        let a3_filter = filter.clone().and("account GLOB ?", "A3*");
        let threshold = options.custom.threshold.unwrap_or(DEFAULT_THRESHOLD);

        let record_count = self.base.count_records("records", &filter).await?;
        let sql = format!(
            "SELECT account, COUNT(*) AS cnt FROM records{} GROUP BY account ORDER BY account",
            a3_filter.where_clause()
        );
        let accounts = self.base.query(&sql, a3_filter.args()).await?;

        let unique = accounts.len() as u64;
        let matched: i64 = accounts.iter().filter_map(|row| row.get_i64("cnt")).sum();

        let mut result = ValidationResult {
            record_count,
            ..ValidationResult::default()
        };

        if unique == 0 {
            result.info.push("No A3 accounts found".to_string());
        } else {
            result.info.push(format!(
                "Found {} unique A3 accounts across {} records",
                unique, matched
            ));
            for row in &accounts {
                result.info.push(format!(
                    "A3 account {}: {} records",
                    row.get_str("account").unwrap_or_default(),
                    row.get_i64("cnt").unwrap_or(0)
                ));
            }
        }

        if unique > threshold {
            result.warnings.push(format!(
                "{} unique A3 accounts exceed the review threshold of {}",
                unique, threshold
            ));
        }

        result.metadata.threshold = Some(threshold);
        result
            .metadata
            .extra
            .insert("uniqueAccounts".to_string(), Value::from(unique));
        result
            .metadata
            .extra
            .insert("matchedRecords".to_string(), Value::from(matched));

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
