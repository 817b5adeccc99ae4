//! Runs a batch of extractors and folds their outcomes into one report.

use std::sync::Arc;

use buidl_adapters::{Extractor, ScrapeResult};
use buidl_core::Source;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

pub const MAX_CONCURRENT_SOURCES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRunResult {
    pub name: String,
    pub source: Source,
    pub found: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Records that could not be persisted.
    pub failed: usize,
    pub error: Option<String>,
}

impl SourceRunResult {
    fn succeeded(name: &str, source: Source, result: ScrapeResult) -> Self {
        Self {
            name: name.to_string(),
            source,
            found: result.found,
            created: result.created,
            updated: result.updated,
            unchanged: result.unchanged,
            failed: result.failed,
            error: None,
        }
    }

    fn failed(name: &str, source: Source, message: String) -> Self {
        Self {
            name: name.to_string(),
            source,
            found: 0,
            created: 0,
            updated: 0,
            unchanged: 0,
            failed: 0,
            error: Some(message),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub found: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<SourceRunResult>,
    pub totals: RunTotals,
    /// Extractors that errored out.
    pub failures: usize,
}

impl RunReport {
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        results: Vec<SourceRunResult>,
    ) -> Self {
        let totals = results
            .iter()
            .filter(|r| !r.is_failure())
            .fold(RunTotals::default(), |acc, r| RunTotals {
                found: acc.found + r.found,
                created: acc.created + r.created,
                updated: acc.updated + r.updated,
                unchanged: acc.unchanged + r.unchanged,
                failed: acc.failed + r.failed,
            });
        let failures = results.iter().filter(|r| r.is_failure()).count();
        Self {
            run_id,
            started_at,
            finished_at,
            results,
            totals,
            failures,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failures > 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Orchestrator {
    max_concurrent: usize,
}

impl Orchestrator {
    /// `max_concurrent` is clamped to `1..=3`.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.clamp(1, MAX_CONCURRENT_SOURCES),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Never fails: an extractor error becomes an entry with zero counts.
    /// Results keep the input order.
    pub async fn run_all(&self, extractors: &[Arc<dyn Extractor>]) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = info_span!("orchestrator_run", %run_id, sources = extractors.len());

        let runs: Vec<BoxFuture<'static, SourceRunResult>> = extractors
            .iter()
            .cloned()
            .map(|extractor| {
                async move {
                    match extractor.run().await {
                        Ok(result) => SourceRunResult::succeeded(extractor.name(), extractor.source(), result),
                        Err(err) => {
                            error!(source = %extractor.source(), error = %err, "extractor failed");
                            SourceRunResult::failed(extractor.name(), extractor.source(), err.to_string())
                        }
                    }
                }
                .boxed()
            })
            .collect();
        let results = stream::iter(runs)
            .buffered(self.max_concurrent)
            .collect::<Vec<_>>()
            .instrument(span)
            .await;

        let report = RunReport::new(run_id, started_at, Utc::now(), results);
        info!(
            %run_id,
            sources = report.results.len(),
            failures = report.failures,
            created = report.totals.created,
            updated = report.totals.updated,
            unchanged = report.totals.unchanged,
            "run complete"
        );
        report
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(1)
    }
}
