//! Source adapter contracts and the per-site adapters built on them.

use std::sync::Arc;

use async_trait::async_trait;
use buidl_core::{CanonicalRecord, CategoryRules, Source};
use buidl_storage::{FetchError, HttpFetcher, Reconciler, StoreError};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

pub mod alchemy;
pub mod cards;
pub mod grants;
pub mod profiles;
pub mod runner;

pub use alchemy::{AlchemyGrantsAdapter, ListedGrant};
pub use cards::{CardAdapter, CardProfile, ChainStrategy, HackathonCard, IdStrategy, ShortDescription};
pub use grants::{FoundationGrantsAdapter, GrantCatalog, GrantEntry};
pub use runner::AdapterJob;

pub const CRATE_NAME: &str = "buidl-adapters";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedPage {
    pub url: String,
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

impl FetchedPage {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterContext {
    pub run_id: Uuid,
    pub fetched_at: DateTime<Utc>,
}

impl AdapterContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            fetched_at: Utc::now(),
        }
    }
}

impl Default for AdapterContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingTarget {
    pub url: String,
}

/// Inputs every mapper needs besides the candidate itself.
#[derive(Debug, Clone, Copy)]
pub struct MapContext<'a> {
    pub scraped_at: DateTime<Utc>,
    pub rules: &'a CategoryRules,
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("card {index} skipped: {reason}")]
    Card { index: usize, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("parsing catalog: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Counts for one extractor run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub found: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Per-site fetch/parse/map behavior. Adapters stay free of persistence;
/// [`AdapterJob`] drives them and owns reconciliation.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    type Candidate: Serialize + Clone + Send + Sync + 'static;

    fn source(&self) -> Source;
    fn listing_targets(&self) -> Vec<ListingTarget>;

    /// Fetches every target. A page that fails is logged and dropped; the
    /// call only fails when no page at all could be fetched.
    async fn fetch_listing(
        &self,
        http: &HttpFetcher,
        ctx: &AdapterContext,
        targets: &[ListingTarget],
    ) -> Result<Vec<FetchedPage>, AdapterError> {
        let mut pages = Vec::with_capacity(targets.len());
        let mut last_error = None;
        for target in targets {
            match http.fetch(self.source(), &target.url).await {
                Ok(resp) => pages.push(FetchedPage {
                    url: resp.final_url,
                    body: resp.body,
                    fetched_at: ctx.fetched_at,
                }),
                Err(err) => {
                    warn!(source = %self.source(), url = %target.url, error = %err, "listing fetch failed");
                    last_error = Some(err);
                }
            }
        }
        match (pages.is_empty(), last_error) {
            (true, Some(err)) => Err(AdapterError::Fetch(err)),
            _ => Ok(pages),
        }
    }

    /// Outer error: the page is unusable. Inner errors: single cards that
    /// could not be read; the runner logs and skips those.
    fn parse_listing(
        &self,
        page: &FetchedPage,
    ) -> Result<Vec<Result<Self::Candidate, AdapterError>>, AdapterError>;

    fn candidate_id(&self, candidate: &Self::Candidate) -> String;

    /// Optional detail-page pass. Errors drop the candidate.
    async fn enrich(
        &self,
        _http: &HttpFetcher,
        _ctx: &AdapterContext,
        candidate: Self::Candidate,
    ) -> Result<Self::Candidate, AdapterError> {
        Ok(candidate)
    }

    /// Pure; the returned record carries its content hash.
    fn map_candidate(&self, candidate: &Self::Candidate, ctx: &MapContext<'_>) -> CanonicalRecord;
}

/// Object-safe handle the orchestrator schedules.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;
    fn source(&self) -> Source;
    async fn run(&self) -> Result<ScrapeResult, AdapterError>;
}

/// Shared handles injected into every extractor.
#[derive(Clone)]
pub struct ExtractorDeps {
    pub http: Arc<HttpFetcher>,
    pub reconciler: Reconciler,
    pub rules: Arc<CategoryRules>,
    pub detail_concurrency: usize,
}

pub fn card_adapter_for_source(source: Source) -> Option<CardAdapter> {
    profiles::profile_for(source).map(CardAdapter::new)
}

/// Registry: one runnable extractor per source. `listing_urls` replaces the
/// adapter's built-in listing pages when non-empty.
pub fn build_extractor(
    source: Source,
    deps: ExtractorDeps,
    listing_urls: &[String],
) -> Result<Arc<dyn Extractor>, AdapterError> {
    let extractor: Arc<dyn Extractor> = match source {
        Source::FoundationGrants => Arc::new(
            AdapterJob::new(FoundationGrantsAdapter::new(), deps).with_listing_urls(listing_urls),
        ),
        Source::AlchemyGrants => Arc::new(
            AdapterJob::new(AlchemyGrantsAdapter::new(), deps).with_listing_urls(listing_urls),
        ),
        _ => {
            let adapter = card_adapter_for_source(source)
                .ok_or_else(|| AdapterError::Message(format!("no adapter registered for {source}")))?;
            Arc::new(AdapterJob::new(adapter, deps).with_listing_urls(listing_urls))
        }
    };
    Ok(extractor)
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector, AdapterError> {
    Selector::parse(selector).map_err(|e| AdapterError::Message(e.to_string()))
}

pub(crate) fn text_or_none(value: String) -> Option<String> {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

pub(crate) fn element_text(el: ElementRef<'_>) -> Option<String> {
    text_or_none(el.text().collect::<Vec<_>>().join(" "))
}

pub(crate) fn select_first_text(document: &Html, selector: &str) -> Result<Option<String>, AdapterError> {
    let sel = parse_selector(selector)?;
    Ok(document.select(&sel).find_map(element_text))
}

pub(crate) fn select_first_attr(
    document: &Html,
    selector: &str,
    attr: &str,
) -> Result<Option<String>, AdapterError> {
    let sel = parse_selector(selector)?;
    Ok(document
        .select(&sel)
        .find_map(|n| n.value().attr(attr))
        .and_then(|s| text_or_none(s.to_string())))
}

/// Unnormalized text of every match; for `<script>` payloads.
pub(crate) fn select_all_raw_text(document: &Html, selector: &str) -> Result<Vec<String>, AdapterError> {
    let sel = parse_selector(selector)?;
    Ok(document
        .select(&sel)
        .map(|n| n.text().collect::<String>())
        .collect())
}
