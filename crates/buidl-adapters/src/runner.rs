//! Drives one [`SourceAdapter`] through fetch, parse, enrich, map and
//! reconcile.

use std::collections::HashSet;

use async_trait::async_trait;
use buidl_core::Source;
use buidl_storage::ReconcileOutcome;
use futures::stream::{self, StreamExt};
use tracing::{info, info_span, warn, Instrument};

use crate::{
    AdapterContext, AdapterError, Extractor, ExtractorDeps, ListingTarget, MapContext,
    ScrapeResult, SourceAdapter,
};

/// Detail pages are fetched at most this many at a time per source.
pub const MAX_DETAIL_CONCURRENCY: usize = 3;

pub struct AdapterJob<A> {
    adapter: A,
    deps: ExtractorDeps,
    listing_override: Vec<String>,
}

impl<A: SourceAdapter> AdapterJob<A> {
    pub fn new(adapter: A, deps: ExtractorDeps) -> Self {
        Self {
            adapter,
            deps,
            listing_override: Vec::new(),
        }
    }

    /// Replaces the adapter's built-in listing pages; an empty list keeps them.
    pub fn with_listing_urls(mut self, urls: &[String]) -> Self {
        self.listing_override = urls.to_vec();
        self
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    fn targets(&self) -> Vec<ListingTarget> {
        if self.listing_override.is_empty() {
            self.adapter.listing_targets()
        } else {
            self.listing_override
                .iter()
                .map(|url| ListingTarget { url: url.clone() })
                .collect()
        }
    }

    async fn collect_candidates(&self, ctx: &AdapterContext) -> Result<Vec<A::Candidate>, AdapterError> {
        let source = self.adapter.source();
        let pages = self
            .adapter
            .fetch_listing(&self.deps.http, ctx, &self.targets())
            .await?;

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        let mut readable = 0;
        let mut last_error = None;
        for page in &pages {
            let parsed = match self.adapter.parse_listing(page) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(%source, url = %page.url, error = %err, "listing page unreadable");
                    last_error = Some(err);
                    continue;
                }
            };
            readable += 1;
            for item in parsed {
                match item {
                    Ok(candidate) => {
                        if seen.insert(self.adapter.candidate_id(&candidate)) {
                            candidates.push(candidate);
                        }
                    }
                    Err(err) => warn!(%source, url = %page.url, error = %err, "card skipped"),
                }
            }
        }
        match (readable, last_error) {
            (0, Some(err)) => Err(err),
            _ => Ok(candidates),
        }
    }

    async fn run_inner(&self, ctx: AdapterContext) -> Result<ScrapeResult, AdapterError> {
        let source = self.adapter.source();
        let candidates = self.collect_candidates(&ctx).await?;

        let limit = self.deps.detail_concurrency.clamp(1, MAX_DETAIL_CONCURRENCY);
        let adapter = &self.adapter;
        let http = self.deps.http.as_ref();
        let ctx_ref = &ctx;
        let enriched = stream::iter(candidates)
            .map(|candidate| async move {
                let id = adapter.candidate_id(&candidate);
                adapter
                    .enrich(http, ctx_ref, candidate)
                    .await
                    .map_err(|err| (id, err))
            })
            .buffered(limit)
            .filter_map(|result| async move {
                match result {
                    Ok(candidate) => Some(candidate),
                    Err((id, err)) => {
                        warn!(%source, source_id = %id, error = %err, "detail enrichment failed");
                        None
                    }
                }
            })
            .collect::<Vec<_>>()
            .await;

        let map_ctx = MapContext {
            scraped_at: ctx.fetched_at,
            rules: &self.deps.rules,
        };
        let mut result = ScrapeResult {
            found: enriched.len(),
            ..ScrapeResult::default()
        };
        for candidate in &enriched {
            let record = self.adapter.map_candidate(candidate, &map_ctx);
            match self.deps.reconciler.reconcile(&record).await {
                Ok(ReconcileOutcome::Created) => result.created += 1,
                Ok(ReconcileOutcome::Updated) => result.updated += 1,
                Ok(ReconcileOutcome::Unchanged) => result.unchanged += 1,
                Err(err) => {
                    result.failed += 1;
                    warn!(%source, source_id = %record.source_id(), error = %err, "reconcile failed");
                }
            }
        }

        info!(
            %source,
            found = result.found,
            created = result.created,
            updated = result.updated,
            unchanged = result.unchanged,
            failed = result.failed,
            "extractor finished"
        );
        Ok(result)
    }
}

#[async_trait]
impl<A: SourceAdapter + 'static> Extractor for AdapterJob<A> {
    fn name(&self) -> &str {
        self.adapter.source().display_name()
    }

    fn source(&self) -> Source {
        self.adapter.source()
    }

    async fn run(&self) -> Result<ScrapeResult, AdapterError> {
        let ctx = AdapterContext::new();
        let span = info_span!("extractor_run", source = %self.adapter.source(), run_id = %ctx.run_id);
        self.run_inner(ctx).instrument(span).await
    }
}
