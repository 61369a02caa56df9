//! Shared fixtures for importcheck-engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use importcheck_common::db::{connect_in_memory, SqliteStore};
use importcheck_common::{DataStore, QueryOutput, Statement};
use importcheck_engine::error::{ProcessorError, ProcessorResult};
use importcheck_engine::processors::Processor;
use importcheck_engine::types::{ProcessorMetadata, ValidationOptions, ValidationResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One imported record: (account, department, period, ou)
pub type Record<'a> = (&'a str, &'a str, &'a str, Option<&'a str>);

/// In-memory SQLite store with the records table populated from `records`
pub async fn seeded_store(records: &[Record<'_>]) -> Arc<dyn DataStore> {
    let pool = connect_in_memory().await.unwrap();
    let store = SqliteStore::new(pool);

    for (account, department, period, ou) in records {
        let statement = Statement::new(
            "INSERT INTO records (account, department, period, ou, amount) VALUES (?, ?, ?, ?, 100.0)",
        )
        .bind(*account)
        .bind(*department)
        .bind(*period)
        .bind(*ou);
        store.execute(statement).await.unwrap();
    }

    Arc::new(store)
}

/// Data store that refuses every statement
pub struct UnavailableStore;

#[async_trait]
impl DataStore for UnavailableStore {
    async fn execute(&self, _statement: Statement) -> importcheck_common::Result<QueryOutput> {
        Err(importcheck_common::Error::Unavailable("connection refused".to_string()))
    }
}

/// What a [`StubProcessor`] does when executed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Pass,
    /// Business check reports one error
    Fail,
    /// `validate` returns a fault
    Fault,
    /// `pre_validation` returns a fault
    PreFault,
}

/// Scripted processor recording execution order and injected handles
pub struct StubProcessor {
    metadata: ProcessorMetadata,
    outcome: Outcome,
    journal: Arc<Mutex<Vec<String>>>,
    databases: AtomicUsize,
    cleanups: Arc<AtomicUsize>,
}

impl StubProcessor {
    pub fn new(metadata: ProcessorMetadata, outcome: Outcome, journal: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            metadata,
            outcome,
            journal,
            databases: AtomicUsize::new(0),
            cleanups: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Passing processor with the given id and sequence
    pub fn passing(id: &str, sequence: i32, journal: &Arc<Mutex<Vec<String>>>) -> Self {
        Self::new(
            ProcessorMetadata::new(id, id).with_sequence(sequence),
            Outcome::Pass,
            Arc::clone(journal),
        )
    }

    pub fn databases_received(&self) -> usize {
        self.databases.load(Ordering::SeqCst)
    }

    pub fn cleanup_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.cleanups)
    }

    fn record(&self, event: &str) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.metadata.id, event));
    }
}

#[async_trait]
impl Processor for StubProcessor {
    fn metadata(&self) -> &ProcessorMetadata {
        &self.metadata
    }

    async fn set_database(&self, _db: Arc<dyn DataStore>) {
        self.databases.fetch_add(1, Ordering::SeqCst);
    }

    async fn pre_validation(&self, _options: &ValidationOptions) -> ProcessorResult<()> {
        self.record("pre");
        if self.outcome == Outcome::PreFault {
            return Err(ProcessorError::Failed("setup refused".to_string()));
        }
        Ok(())
    }

    async fn validate(&self, options: &ValidationOptions) -> ProcessorResult<ValidationResult> {
        self.record("validate");
        let mut result = ValidationResult {
            record_count: 1,
            ..ValidationResult::default()
        };
        result.metadata.ou = options.ou.clone();
        match self.outcome {
            Outcome::Fail => {
                result.success = false;
                result.errors.push("stub failure".to_string());
            }
            Outcome::Fault => return Err(ProcessorError::Failed("stub fault".to_string())),
            Outcome::Pass | Outcome::PreFault => {}
        }
        Ok(result)
    }

    async fn post_validation(&self, _result: &ValidationResult, _options: &ValidationOptions) {
        self.record("post");
    }

    async fn cleanup(&self) -> ProcessorResult<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn journal() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(journal: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    journal.lock().unwrap().clone()
}
