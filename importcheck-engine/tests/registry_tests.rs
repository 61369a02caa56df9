//! Validation registry integration tests
//!
//! Registration semantics, lookups, lifecycle and the execution envelope.

mod helpers;

use helpers::{entries, journal, seeded_store, Outcome, StubProcessor, UnavailableStore};
use importcheck_engine::error::ProcessorError;
use importcheck_engine::processors::{duplicate_records, SharedProcessor};
use importcheck_engine::registry::ValidationRegistry;
use importcheck_engine::types::{ProcessorMetadata, ValidationOptions};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn ids(processors: &[SharedProcessor]) -> Vec<String> {
    processors.iter().map(|p| p.metadata().id.clone()).collect()
}

#[tokio::test]
async fn test_builtin_registry_initializes_lazily() {
    // Given: a registry over the built-in catalogue
    let registry = ValidationRegistry::with_builtin();
    assert!(!registry.is_initialized().await);
    assert_eq!(registry.len().await, 0);

    // When: the first lookup happens
    let all = registry.all().await;

    // Then: the catalogue is registered in order
    assert!(registry.is_initialized().await);
    assert_eq!(ids(&all), vec!["duplicate-records", "blank-department", "a3-accounts"]);
}

#[tokio::test]
async fn test_register_same_id_replaces_in_place() {
    let log = journal();
    let registry = ValidationRegistry::empty();
    registry.register(Arc::new(StubProcessor::passing("first", 1, &log))).await;
    registry.register(Arc::new(StubProcessor::passing("second", 2, &log))).await;

    // Re-register "first" with different metadata
    let replacement = StubProcessor::new(
        ProcessorMetadata::new("first", "Replacement").with_sequence(99),
        Outcome::Pass,
        Arc::clone(&log),
    );
    registry.register(Arc::new(replacement)).await;

    let all = registry.all().await;
    assert_eq!(ids(&all), vec!["first", "second"]);
    let first = registry.get("first").await.unwrap();
    assert_eq!(first.metadata().name, "Replacement");
    assert_eq!(first.metadata().sequence, 99);
}

#[tokio::test]
async fn test_metadata_sorted_by_sequence_with_stable_ties() {
    let log = journal();
    let registry = ValidationRegistry::empty();
    registry.register(Arc::new(StubProcessor::passing("late", 30, &log))).await;
    registry.register(Arc::new(StubProcessor::passing("tie-a", 20, &log))).await;
    registry.register(Arc::new(StubProcessor::passing("early", 10, &log))).await;
    registry.register(Arc::new(StubProcessor::passing("tie-b", 20, &log))).await;

    let order: Vec<String> = registry
        .metadata(None)
        .await
        .into_iter()
        .map(|m| m.id)
        .collect();

    assert_eq!(order, vec!["early", "tie-a", "tie-b", "late"]);
}

#[tokio::test]
async fn test_lookups_by_category_required_tags_and_ou() {
    let log = journal();
    let registry = ValidationRegistry::empty();
    let processors = [
        ProcessorMetadata::new("dup", "Dup")
            .with_category("integrity")
            .with_required(true)
            .with_tags(["duplicates", "integrity"]),
        ProcessorMetadata::new("accounts", "Accounts")
            .with_category("accounts")
            .with_tags(["accounts"])
            .with_ou("OU1"),
        ProcessorMetadata::new("other-ou", "Other")
            .with_category("accounts")
            .with_ou("OU2"),
    ];
    for metadata in processors {
        registry
            .register(Arc::new(StubProcessor::new(metadata, Outcome::Pass, Arc::clone(&log))))
            .await;
    }

    assert_eq!(ids(&registry.by_category("accounts").await), vec!["accounts", "other-ou"]);
    assert_eq!(ids(&registry.by_required(true).await), vec!["dup"]);
    assert_eq!(ids(&registry.by_required(false).await), vec!["accounts", "other-ou"]);

    // Tags match any
    assert_eq!(
        ids(&registry.by_tags(&["accounts", "duplicates"]).await),
        vec!["dup", "accounts"]
    );
    assert!(registry.by_tags(&["nothing"]).await.is_empty());

    // Universal processors apply to every OU
    assert_eq!(ids(&registry.for_ou("OU1").await), vec!["dup", "accounts"]);
    assert_eq!(ids(&registry.for_ou("OU3").await), vec!["dup"]);
}

#[tokio::test]
async fn test_statistics_buckets_universal_processors() {
    let registry = ValidationRegistry::with_builtin();
    let log = journal();
    registry
        .register(Arc::new(StubProcessor::new(
            ProcessorMetadata::new("scoped", "Scoped")
                .with_category("accounts")
                .with_ou("OU1"),
            Outcome::Pass,
            log,
        )))
        .await;

    let stats = registry.statistics().await;

    assert_eq!(stats.total, 4);
    assert_eq!(stats.required, 1);
    assert_eq!(stats.by_category.get("accounts"), Some(&2));
    assert_eq!(stats.by_category.get("integrity"), Some(&1));
    assert_eq!(stats.by_ou.get("universal"), Some(&3));
    assert_eq!(stats.by_ou.get("OU1"), Some(&1));
}

#[tokio::test]
async fn test_set_database_reaches_existing_and_later_processors() {
    let log = journal();
    let registry = ValidationRegistry::empty();
    let early = Arc::new(StubProcessor::passing("early", 1, &log));
    registry.register(early.clone()).await;

    registry.set_database(seeded_store(&[]).await).await;
    assert_eq!(early.databases_received(), 1);

    let late = Arc::new(StubProcessor::passing("late", 2, &log));
    registry.register(late.clone()).await;
    assert_eq!(late.databases_received(), 1);
}

#[tokio::test]
async fn test_execute_runs_hooks_in_order() {
    let log = journal();
    let registry = ValidationRegistry::empty();
    registry.register(Arc::new(StubProcessor::passing("stub", 1, &log))).await;

    let response = registry.execute("stub", &ValidationOptions::default()).await;

    assert!(response.success);
    assert_eq!(response.validation_id, "stub");
    assert!(response.result.unwrap().success);
    assert_eq!(entries(&log), vec!["stub:pre", "stub:validate", "stub:post"]);
}

#[tokio::test]
async fn test_execute_unknown_processor_returns_failed_envelope() {
    let registry = ValidationRegistry::with_builtin();

    let response = registry.execute("nope", &ValidationOptions::default()).await;

    assert!(!response.success);
    assert!(response.result.is_none());
    assert_eq!(
        response.error.as_deref(),
        Some("Validation processor not found: nope")
    );
}

#[tokio::test]
async fn test_preview_unknown_processor_is_not_found() {
    let registry = ValidationRegistry::with_builtin();

    let err = registry
        .preview("nope", &ValidationOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProcessorError::NotFound(ref id) if id == "nope"));
}

#[tokio::test]
async fn test_pre_validation_fault_skips_validate() {
    let log = journal();
    let registry = ValidationRegistry::empty();
    registry
        .register(Arc::new(StubProcessor::new(
            ProcessorMetadata::new("guarded", "Guarded"),
            Outcome::PreFault,
            Arc::clone(&log),
        )))
        .await;

    let response = registry.execute("guarded", &ValidationOptions::default()).await;

    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("setup refused"));
    assert_eq!(entries(&log), vec!["guarded:pre"]);
}

#[tokio::test]
async fn test_builtin_without_database_reports_missing_connection() {
    let registry = ValidationRegistry::with_builtin();

    let response = registry
        .execute(duplicate_records::ID, &ValidationOptions::for_ou("OU1"))
        .await;

    assert!(!response.success);
    assert!(response.error.unwrap().contains("no database connection"));
}

#[tokio::test]
async fn test_unavailable_store_surfaces_as_failed_envelope() {
    let registry = ValidationRegistry::with_builtin();
    registry.set_database(Arc::new(UnavailableStore)).await;

    let response = registry
        .execute(duplicate_records::ID, &ValidationOptions::for_ou("OU1"))
        .await;

    assert!(!response.success);
    assert!(response.error.unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_skip_option_bypasses_lifecycle() {
    let log = journal();
    let registry = ValidationRegistry::empty();
    registry.register(Arc::new(StubProcessor::passing("stub", 1, &log))).await;
    let options = ValidationOptions {
        skip: true,
        ..ValidationOptions::default()
    };

    let response = registry.execute("stub", &options).await;

    assert!(response.success);
    let result = response.result.unwrap();
    assert!(result.success);
    assert_eq!(result.info, vec!["Validation 'stub' skipped"]);
    assert!(entries(&log).is_empty());
}

#[tokio::test]
async fn test_stop_on_first_error_halts_after_failing_result() {
    let log = journal();
    let registry = ValidationRegistry::empty();
    registry.register(Arc::new(StubProcessor::passing("a", 1, &log))).await;
    registry
        .register(Arc::new(StubProcessor::new(
            ProcessorMetadata::new("b", "B").with_sequence(2),
            Outcome::Fail,
            Arc::clone(&log),
        )))
        .await;
    registry.register(Arc::new(StubProcessor::passing("c", 3, &log))).await;
    let requested = vec!["a".to_string(), "b".to_string(), "c".to_string()];

    // Without the flag every processor runs
    let all = registry.execute_many(&requested, &ValidationOptions::default()).await;
    assert_eq!(all.len(), 3);

    // With the flag the loop stops at "b"
    let halted = registry
        .execute_many(&requested, &ValidationOptions::default().stop_on_first_error())
        .await;
    assert_eq!(halted.len(), 2);
    assert_eq!(halted[1].validation_id, "b");
    assert!(halted[1].success);
    assert!(!halted[1].result.as_ref().unwrap().success);
}

#[tokio::test]
async fn test_stop_on_first_error_halts_after_fault() {
    let log = journal();
    let registry = ValidationRegistry::empty();
    registry
        .register(Arc::new(StubProcessor::new(
            ProcessorMetadata::new("broken", "Broken"),
            Outcome::Fault,
            Arc::clone(&log),
        )))
        .await;
    registry.register(Arc::new(StubProcessor::passing("after", 2, &log))).await;

    let responses = registry
        .execute_many(
            &["broken".to_string(), "after".to_string()],
            &ValidationOptions::default().stop_on_first_error(),
        )
        .await;

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].error.as_deref(), Some("stub fault"));
    assert!(!entries(&log).iter().any(|e| e.starts_with("after")));
}

#[tokio::test]
async fn test_execute_all_for_ou_orders_by_sequence_and_scopes() {
    let log = journal();
    let registry = ValidationRegistry::empty();
    registry.register(Arc::new(StubProcessor::passing("third", 30, &log))).await;
    registry.register(Arc::new(StubProcessor::passing("first", 10, &log))).await;
    registry
        .register(Arc::new(StubProcessor::new(
            ProcessorMetadata::new("elsewhere", "Elsewhere")
                .with_sequence(5)
                .with_ou("OU2"),
            Outcome::Pass,
            Arc::clone(&log),
        )))
        .await;

    let responses = registry
        .execute_all_for_ou("OU1", &ValidationOptions::default())
        .await;

    let order: Vec<&str> = responses.iter().map(|r| r.validation_id.as_str()).collect();
    assert_eq!(order, vec!["first", "third"]);
    // The OU is forwarded to every processor
    for response in &responses {
        assert_eq!(
            response.result.as_ref().unwrap().metadata.ou.as_deref(),
            Some("OU1")
        );
    }
}

#[tokio::test]
async fn test_unregister_cleans_up_and_removes() {
    let log = journal();
    let registry = ValidationRegistry::empty();
    let stub = StubProcessor::passing("gone", 1, &log);
    let cleanups = stub.cleanup_counter();
    registry.register(Arc::new(stub)).await;

    assert!(registry.unregister("gone").await);
    assert!(!registry.unregister("gone").await);
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    assert!(registry.get("gone").await.is_none());
}

#[tokio::test]
async fn test_cleanup_releases_all_and_reinitializes_on_next_use() {
    let log = journal();
    let registry = ValidationRegistry::with_builtin();
    let extra = StubProcessor::passing("extra", 1, &log);
    let cleanups = extra.cleanup_counter();
    registry.register(Arc::new(extra)).await;
    assert_eq!(registry.len().await, 4);

    registry.cleanup().await;

    assert!(!registry.is_initialized().await);
    assert_eq!(registry.len().await, 0);
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);

    // Next lookup repopulates from the catalogue only
    let all = registry.all().await;
    assert_eq!(all.len(), 3);
    assert!(registry.get("extra").await.is_none());
}

#[tokio::test]
async fn test_cleanup_on_empty_catalogue_stays_empty() {
    let registry = ValidationRegistry::empty();

    registry.cleanup().await;

    assert!(registry.all().await.is_empty());
    assert_eq!(registry.statistics().await.total, 0);
}

#[tokio::test]
async fn test_database_survives_cleanup() {
    let registry = ValidationRegistry::with_builtin();
    registry.set_database(seeded_store(&[("A1", "D1", "2024-01", Some("OU1"))]).await).await;
    registry.initialize().await;

    registry.cleanup().await;
    let response = registry
        .execute(duplicate_records::ID, &ValidationOptions::for_ou("OU1"))
        .await;

    assert!(response.success, "re-initialized processors get the stored handle");
    assert_eq!(response.result.unwrap().record_count, 1);
}
