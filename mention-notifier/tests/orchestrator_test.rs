mod common;

use clap::Parser;
use common::*;
use mention_notifier::{
    build_registry, FailurePolicy, Fetcher, NotifierError, Orchestrator, RunConfig, SeenStore, Source, SOURCE_NAMES,
};
use std::sync::{Arc, Mutex};

fn run_log() -> Arc<Mutex<Vec<&'static str>>> {
    Arc::new(Mutex::new(Vec::new()))
}

async fn orchestrator(registry: Vec<Box<dyn Source>>, policy: FailurePolicy) -> Orchestrator {
    let store = Arc::new(SeenStore::in_memory().await.unwrap());
    Orchestrator::new(registry, store, Arc::new(RecordingNotifier::new()), policy)
}

fn abc(log: &Arc<Mutex<Vec<&'static str>>>) -> Vec<Box<dyn Source>> {
    vec![
        Box::new(ScriptedSource::ints("a", [1]).logging_to(log.clone())),
        Box::new(ScriptedSource::new("b", POSTS, vec!["x".into()]).logging_to(log.clone())),
        Box::new(ScriptedSource::ints("c", [2]).logging_to(log.clone())),
    ]
}

#[tokio::test]
async fn allow_list_runs_only_named_sources() {
    init_tracing();
    let log = run_log();
    let orchestrator = orchestrator(abc(&log), FailurePolicy::FailFast).await;

    let report = orchestrator.run(|name| name == "b").await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["b"]);
    assert_eq!(report.ran(), vec!["b"]);
    assert_eq!(report.skipped, vec!["a", "c"]);
    assert_eq!(report.totals().inserted, 1);
}

#[tokio::test]
async fn sources_run_in_registry_order() {
    init_tracing();
    let log = run_log();
    let orchestrator = orchestrator(abc(&log), FailurePolicy::FailFast).await;

    assert_eq!(orchestrator.source_names(), vec!["a", "b", "c"]);
    orchestrator.run(|_| true).await.unwrap();
    orchestrator.run(|_| true).await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c", "a", "b", "c"]);
}

#[tokio::test]
async fn fail_fast_stops_at_first_failure() {
    init_tracing();
    let log = run_log();
    let registry: Vec<Box<dyn Source>> = vec![
        Box::new(ScriptedSource::ints("a", [1]).logging_to(log.clone())),
        Box::new(ScriptedSource::failing("b").logging_to(log.clone())),
        Box::new(ScriptedSource::ints("c", [2]).logging_to(log.clone())),
    ];
    let orchestrator = orchestrator(registry, FailurePolicy::FailFast).await;

    let err = orchestrator.run(|_| true).await.unwrap_err();

    assert!(matches!(err, NotifierError::SourceFailed { ref source_name, .. } if source_name == "b"));
    assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
}

#[tokio::test]
async fn isolation_keeps_going_and_reports_first_failure() {
    init_tracing();
    let log = run_log();
    let registry: Vec<Box<dyn Source>> = vec![
        Box::new(ScriptedSource::failing("a").logging_to(log.clone())),
        Box::new(ScriptedSource::ints("b", [1]).logging_to(log.clone())),
        Box::new(ScriptedSource::failing("c").logging_to(log.clone())),
    ];
    let orchestrator = orchestrator(registry, FailurePolicy::Isolate).await;

    let err = orchestrator.run(|_| true).await.unwrap_err();

    assert!(matches!(err, NotifierError::SourceFailed { ref source_name, .. } if source_name == "a"));
    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn production_registry_matches_source_names() {
    init_tracing();
    let config = RunConfig::try_parse_from(["mention-notifier", "--tag", "dokku"])
        .unwrap()
        .validate()
        .unwrap();
    let fetcher = Fetcher::new(&config.fetch_config()).unwrap();

    let registry = build_registry(&config, fetcher);
    let names: Vec<&str> = registry.iter().map(|s| s.name()).collect();

    assert_eq!(names, SOURCE_NAMES);
    // reddit and reddit-subreddit share one table.
    assert_eq!(registry[4].table(), registry[5].table());
}

#[tokio::test]
async fn skip_list_filters_the_production_registry() {
    init_tracing();
    let config = RunConfig::try_parse_from([
        "mention-notifier",
        "--tag",
        "dokku",
        "--sources",
        "github,devto,medium",
        "--skip-sources",
        "medium",
    ])
    .unwrap()
    .validate()
    .unwrap();

    let enabled: Vec<&str> = SOURCE_NAMES
        .iter()
        .copied()
        .filter(|name| config.source_enabled(name))
        .collect();
    assert_eq!(enabled, vec!["github", "devto"]);
}
