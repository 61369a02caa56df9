//! Core data model shared by processors, the registry and the channel layer
//!
//! Every type here crosses the request channel, so serde renames fields to
//! camelCase for the front-end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// Processor metadata
// ============================================================================

/// Immutable descriptor of a registered processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorMetadata {
    /// Unique key within a registry
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    /// Required processors must pass before an import is accepted
    pub required: bool,
    /// Execution order, ascending; ties keep registration order
    pub sequence: i32,
    /// Rough cost estimate in milliseconds
    pub estimated_duration: u64,
    pub tags: BTreeSet<String>,
    pub version: String,
    /// Scope restriction; `None` means the processor applies to every OU
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ou: Option<String>,
}

impl ProcessorMetadata {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category: "general".to_string(),
            required: false,
            sequence: 100,
            estimated_duration: 1000,
            tags: BTreeSet::new(),
            version: "1.0.0".to_string(),
            ou: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_sequence(mut self, sequence: i32) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_estimated_duration(mut self, millis: u64) -> Self {
        self.estimated_duration = millis;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ou(mut self, ou: impl Into<String>) -> Self {
        self.ou = Some(ou.into());
        self
    }

    /// A processor without an OU restriction matches every scope
    pub fn applies_to_ou(&self, ou: &str) -> bool {
        self.ou.as_deref().map_or(true, |own| own == ou)
    }
}

// ============================================================================
// Options
// ============================================================================

/// Accounting period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// Period key as stored on records, e.g. `2024-01`
    pub fn key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// Recognized custom option keys plus a free-form escape hatch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomOptions {
    /// Overrides a processor's soft threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u64>,
    /// Max sample records kept per error detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_limit: Option<usize>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-invocation configuration handed to every lifecycle hook
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationOptions {
    pub skip: bool,
    pub detailed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_errors: Option<usize>,
    pub stop_on_first_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ou: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    pub custom: CustomOptions,
}

impl ValidationOptions {
    pub fn for_ou(ou: impl Into<String>) -> Self {
        Self {
            ou: Some(ou.into()),
            ..Self::default()
        }
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = Some(period);
        self
    }

    pub fn stop_on_first_error(mut self) -> Self {
        self.stop_on_first_error = true;
        self
    }
}

// ============================================================================
// Results
// ============================================================================

/// Grouped error information, filled when `detailed` is requested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub count: u64,
    pub samples: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStats {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Milliseconds
    pub duration: u64,
    pub records_checked: u64,
    pub issues_found: u64,
}

/// Result metadata: recognized keys plus free-form `extra`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ou: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Outcome of one processor's business check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub success: bool,
    pub record_count: u64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub info: Vec<String>,
    pub error_details: Vec<ErrorDetail>,
    pub stats: ValidationStats,
    pub metadata: ResultMetadata,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            success: true,
            record_count: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            info: Vec::new(),
            error_details: Vec::new(),
            stats: ValidationStats::default(),
            metadata: ResultMetadata::default(),
        }
    }
}

impl ValidationResult {
    /// Result reported for a processor skipped via `ValidationOptions::skip`
    pub fn skipped(processor_id: &str) -> Self {
        Self {
            info: vec![format!("Validation '{}' skipped", processor_id)],
            metadata: ResultMetadata {
                processor_id: Some(processor_id.to_string()),
                ..ResultMetadata::default()
            },
            ..Self::default()
        }
    }
}

/// Registry-level execution envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResponse {
    /// Whether the processor ran to completion without a fault
    pub success: bool,
    pub validation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Milliseconds
    pub duration: u64,
}

impl ExecutionResponse {
    pub fn completed(validation_id: impl Into<String>, result: ValidationResult, duration: u64) -> Self {
        Self {
            success: true,
            validation_id: validation_id.into(),
            result: Some(result),
            error: None,
            duration,
        }
    }

    pub fn failed(validation_id: impl Into<String>, error: impl Into<String>, duration: u64) -> Self {
        Self {
            success: false,
            validation_id: validation_id.into(),
            result: None,
            error: Some(error.into()),
            duration,
        }
    }

    /// True when the envelope faulted or the embedded business check failed
    pub fn is_failure(&self) -> bool {
        !self.success || self.result.as_ref().map_or(false, |r| !r.success)
    }
}

/// Read-only cost/shape estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewInfo {
    pub description: String,
    pub records_to_check: u64,
    /// Milliseconds
    pub estimated_duration: u64,
}

/// Aggregate projection over current registrations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatistics {
    pub total: usize,
    pub required: usize,
    pub by_category: BTreeMap<String, usize>,
    /// Processors without an OU are counted under [`UNIVERSAL_OU`]
    pub by_ou: BTreeMap<String, usize>,
}

/// Statistics bucket for processors that apply to every OU
pub const UNIVERSAL_OU: &str = "universal";
