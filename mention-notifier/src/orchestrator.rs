use crate::pipeline::PipelineRunner;
use crate::traits::{DedupStore, Notifier, Source};
use crate::types::{NotifierError, Result, RunSummary};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// How a run reacts to a source that fails fatally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failing source.
    #[default]
    FailFast,
    /// Keep going and report the first failure once every source ran.
    Isolate,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub source: &'static str,
    pub summary: Option<RunSummary>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcomes: Vec<SourceOutcome>,
    pub skipped: Vec<&'static str>,
}

impl RunReport {
    pub fn totals(&self) -> RunSummary {
        self.outcomes
            .iter()
            .filter_map(|o| o.summary)
            .fold(RunSummary::default(), |acc, s| RunSummary {
                processed: acc.processed + s.processed,
                inserted: acc.inserted + s.inserted,
                notified: acc.notified + s.notified,
            })
    }

    pub fn ran(&self) -> Vec<&'static str> {
        self.outcomes.iter().map(|o| o.source).collect()
    }
}

/// Runs the enabled sources of a fixed registry one after another.
pub struct Orchestrator {
    registry: Vec<Box<dyn Source>>,
    runner: PipelineRunner,
    policy: FailurePolicy,
}

impl Orchestrator {
    pub fn new(
        registry: Vec<Box<dyn Source>>,
        store: Arc<dyn DedupStore>,
        notifier: Arc<dyn Notifier>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            registry,
            runner: PipelineRunner::new(store, notifier),
            policy,
        }
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.registry.iter().map(|s| s.name()).collect()
    }

    /// Runs every source `enabled` admits, in registry order.
    ///
    /// Under `FailFast` the first fatal source error ends the run. Under
    /// `Isolate` the remaining sources still run, and the first failure is
    /// returned afterwards. The report is only returned when no source failed.
    pub async fn run<F>(&self, enabled: F) -> Result<RunReport>
    where
        F: Fn(&str) -> bool,
    {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id);
        self.run_inner(run_id, enabled).instrument(span).await
    }

    async fn run_inner<F>(&self, run_id: Uuid, enabled: F) -> Result<RunReport>
    where
        F: Fn(&str) -> bool,
    {
        let mut report = RunReport {
            run_id,
            outcomes: Vec::new(),
            skipped: Vec::new(),
        };
        let mut first_failure: Option<NotifierError> = None;

        for source in &self.registry {
            let name = source.name();
            if !enabled(name) {
                info!(source = name, "skipping source");
                report.skipped.push(name);
                continue;
            }

            match self.runner.run(source.as_ref()).await {
                Ok(summary) => report.outcomes.push(SourceOutcome {
                    source: name,
                    summary: Some(summary),
                    error: None,
                }),
                Err(e) => {
                    error!(source = name, error = %e, "source failed");
                    report.outcomes.push(SourceOutcome {
                        source: name,
                        summary: None,
                        error: Some(e.to_string()),
                    });

                    let failure = NotifierError::SourceFailed {
                        source_name: name.to_string(),
                        error: Box::new(e),
                    };
                    match self.policy {
                        FailurePolicy::FailFast => return Err(failure),
                        FailurePolicy::Isolate => {
                            first_failure.get_or_insert(failure);
                        }
                    }
                }
            }
        }

        let totals = report.totals();
        info!(
            sources_run = report.outcomes.len(),
            sources_skipped = report.skipped.len(),
            processed_count = totals.processed,
            inserted_count = totals.inserted,
            notified_count = totals.notified,
            "Run finished"
        );

        match first_failure {
            Some(failure) => Err(failure),
            None => Ok(report),
        }
    }
}
