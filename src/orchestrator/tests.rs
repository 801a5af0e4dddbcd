use std::collections::{BTreeSet, HashMap};

use super::*;
use crate::testing::{
    MemoryStore, RecordingPublisher, RecordingRewriter, ScriptedRunner, expected_fingerprint, module,
};

const HEAD_A: &str = "1111111111111111111111111111111111111111";
const HEAD_B: &str = "2222222222222222222222222222222222222222";
const HEAD_C: &str = "3333333333333333333333333333333333333333";

fn quiet() -> Logger {
    Logger::new(0, true)
}

fn orchestrator<'a>(runner: &'a ScriptedRunner, publisher: &'a RecordingPublisher) -> Orchestrator<'a> {
    Orchestrator::builder()
        .runner(runner)
        .publisher(publisher)
        .log(quiet())
        .build()
        .unwrap()
}

fn names(set: &[&str]) -> BTreeSet<String> {
    set.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_no_modules_runs_nothing() {
    let runner = ScriptedRunner::new();
    let publisher = RecordingPublisher::new();
    let mut store = MemoryStore::default();
    let mut rewriter = RecordingRewriter::default();

    let report = orchestrator(&runner, &publisher)
        .run(&[], &mut store, &mut rewriter)
        .unwrap();

    assert!(report.modules.is_empty());
    assert!(runner.calls().is_empty());
    assert!(rewriter.invocations.is_empty());
    assert_eq!(store.loads, 0);
}

#[test]
fn test_changed_module_published_and_clean_module_skipped() {
    let runner = ScriptedRunner::new();
    let a = module("com.example:a", "/work/a");
    let b = module("com.example:b", "/work/b");
    runner.git_repo(&a.location, HEAD_A, &[("New.kt", "blob-new")]);
    runner.git_repo(&b.location, HEAD_B, &[]);

    let publisher = RecordingPublisher::new();
    let mut store =
        MemoryStore::default().with_fingerprint("/work/b", &expected_fingerprint(HEAD_B, &[]));
    let mut rewriter = RecordingRewriter::default();

    let report = orchestrator(&runner, &publisher)
        .run(&[a.clone(), b.clone()], &mut store, &mut rewriter)
        .unwrap();

    assert_eq!(publisher.published(), vec!["com.example:a"]);
    assert_eq!(rewriter.invocations, vec![names(&["com.example:a"])]);

    let recorded = store.entries.get("/work/a").unwrap();
    assert_eq!(
        recorded.fingerprint,
        expected_fingerprint(HEAD_A, &["blob-new"]).as_str()
    );
    assert_eq!(recorded.version, 1);

    assert_eq!(report.published().count(), 1);
    assert_eq!(report.skipped().count(), 1);
    assert!(!report.has_failures());
    assert!(matches!(
        report.modules[0].outcome,
        PublishOutcome::Published { version: 1, .. }
    ));
    assert!(matches!(report.modules[1].outcome, PublishOutcome::Skipped));
}

#[test]
fn test_second_run_without_changes_publishes_nothing() {
    let runner = ScriptedRunner::new();
    let a = module("com.example:a", "/work/a");
    runner.git_repo(&a.location, HEAD_A, &[("New.kt", "blob-new")]);

    let publisher = RecordingPublisher::new();
    let mut store = MemoryStore::default();
    let mut rewriter = RecordingRewriter::default();
    let orchestrator = orchestrator(&runner, &publisher);
    let modules = [a];

    orchestrator.run(&modules, &mut store, &mut rewriter).unwrap();
    let second = orchestrator.run(&modules, &mut store, &mut rewriter).unwrap();

    assert_eq!(publisher.published().len(), 1);
    assert_eq!(second.skipped().count(), 1);
    assert_eq!(rewriter.invocations, vec![names(&["com.example:a"]), names(&[])]);
}

#[test]
fn test_failed_module_does_not_stop_siblings() {
    let runner = ScriptedRunner::new();
    let a = module("com.example:a", "/work/a");
    let b = module("com.example:b", "/work/b");
    let c = module("com.example:c", "/work/c");
    runner.git_repo(&a.location, HEAD_A, &[]);
    runner.git_repo(&b.location, HEAD_B, &[]);
    runner.git_repo(&c.location, HEAD_C, &[]);

    let publisher = RecordingPublisher::failing(&["com.example:b"]);
    let mut store = MemoryStore::default();
    let mut rewriter = RecordingRewriter::default();

    let report = orchestrator(&runner, &publisher)
        .run(&[a, b, c], &mut store, &mut rewriter)
        .unwrap();

    assert_eq!(publisher.published(), vec!["com.example:a", "com.example:c"]);
    assert_eq!(rewriter.invocations, vec![names(&["com.example:a", "com.example:c"])]);
    assert!(!store.entries.contains_key("/work/b"));

    let failed: Vec<_> = report.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0.module.local_path, "/work/b");
    assert!(matches!(failed[0].1, AutopublishError::BuildFailure { .. }));
}

#[test]
fn test_vcs_failure_is_isolated_and_not_published() {
    let runner = ScriptedRunner::new();
    let broken = module("com.example:broken", "/work/broken");
    let ok = module("com.example:ok", "/work/ok");
    runner.git_repo(&ok.location, HEAD_A, &[]);

    let publisher = RecordingPublisher::new();
    let mut store = MemoryStore::default();
    let mut rewriter = RecordingRewriter::default();

    let report = orchestrator(&runner, &publisher)
        .run(&[broken, ok], &mut store, &mut rewriter)
        .unwrap();

    assert_eq!(publisher.published(), vec!["com.example:ok"]);
    assert!(matches!(
        report.modules[0].outcome,
        PublishOutcome::Failed(AutopublishError::VcsQueryFailed { .. })
    ));
    assert_eq!(rewriter.invocations, vec![names(&["com.example:ok"])]);
}

#[test]
fn test_persist_failure_republishes_on_next_run() {
    let runner = ScriptedRunner::new();
    let a = module("com.example:a", "/work/a");
    runner.git_repo(&a.location, HEAD_A, &[]);

    let publisher = RecordingPublisher::new();
    let mut store = MemoryStore {
        fail_writes: true,
        ..MemoryStore::default()
    };
    let mut rewriter = RecordingRewriter::default();
    let orchestrator = orchestrator(&runner, &publisher);
    let modules = [a];

    let first = orchestrator.run(&modules, &mut store, &mut rewriter).unwrap();
    assert!(matches!(
        first.modules[0].outcome,
        PublishOutcome::Failed(AutopublishError::PersistFailure { .. })
    ));
    assert_eq!(rewriter.invocations, vec![names(&[])]);

    store.fail_writes = false;
    let second = orchestrator.run(&modules, &mut store, &mut rewriter).unwrap();

    assert_eq!(second.published().count(), 1);
    assert_eq!(publisher.published().len(), 2);
}

struct UnreadableStore;

impl StateStore for UnreadableStore {
    fn load_all(&mut self) -> Result<HashMap<String, Fingerprint>> {
        Err(AutopublishError::ConfigError("unreadable".to_string()))
    }

    fn max_version(&self) -> Option<u64> {
        None
    }

    fn upsert(&mut self, _local_path: &str, _status: ModuleStatus) -> Result<()> {
        unreachable!("nothing is recorded when loading fails")
    }
}

#[test]
fn test_unreadable_state_aborts_the_run() {
    let runner = ScriptedRunner::new();
    let a = module("com.example:a", "/work/a");
    runner.git_repo(&a.location, HEAD_A, &[]);

    let publisher = RecordingPublisher::new();
    let mut rewriter = RecordingRewriter::default();

    let err = orchestrator(&runner, &publisher)
        .run(&[a], &mut UnreadableStore, &mut rewriter)
        .unwrap_err();

    assert!(matches!(err, AutopublishError::ConfigError(_)));
    assert!(runner.calls().is_empty());
    assert!(rewriter.invocations.is_empty());
}

struct BrokenRewriter;

impl DependencyRewriter for BrokenRewriter {
    fn use_latest_local_artifacts(&mut self, _modules: &BTreeSet<Coordinate>) -> Result<()> {
        Err(AutopublishError::ConfigError("read-only build directory".to_string()))
    }
}

#[test]
fn test_rewriter_failure_is_returned_after_state_is_recorded() {
    let runner = ScriptedRunner::new();
    let a = module("com.example:a", "/work/a");
    runner.git_repo(&a.location, HEAD_A, &[]);

    let publisher = RecordingPublisher::new();
    let mut store = MemoryStore::default();

    let err = orchestrator(&runner, &publisher)
        .run(&[a], &mut store, &mut BrokenRewriter)
        .unwrap_err();

    assert!(err.to_string().contains("read-only build directory"));
    assert!(store.entries.contains_key("/work/a"));
}

#[test]
fn test_builder_requires_runner_and_publisher() {
    let publisher = RecordingPublisher::new();
    let runner = ScriptedRunner::new();

    assert!(Orchestrator::builder().publisher(&publisher).build().is_err());
    assert!(Orchestrator::builder().runner(&runner).build().is_err());
}
