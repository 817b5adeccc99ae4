//! Configuration, source registry, orchestration and scheduling.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use buidl_adapters::{build_extractor, Extractor, ExtractorDeps};
use buidl_core::{CategoryRules, CategoryRulesFile, EntityKind, Source};
use buidl_storage::{
    BackoffPolicy, HttpClientConfig, HttpFetcher, Reconciler, RecordStore, DEFAULT_USER_AGENT,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

pub mod orchestrator;
pub mod report;

pub use orchestrator::{Orchestrator, RunReport, RunTotals, SourceRunResult};
pub use report::{summary_markdown, write_reports};

pub const CRATE_NAME: &str = "buidl-sync";

pub const CATEGORY_RULES_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRegistry {
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub source: Source,
    pub entity_type: EntityKind,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Six-field cron expression (seconds first).
    #[serde(default)]
    pub schedule: Option<String>,
    /// Replaces the adapter's built-in listing pages when non-empty.
    #[serde(default)]
    pub listing_urls: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn enabled_by_default() -> bool {
    true
}

impl SourceRegistry {
    pub fn parse(text: &str) -> Result<Self> {
        let registry: SourceRegistry = serde_yaml::from_str(text).context("parsing sources.yaml")?;
        let mut seen = Vec::with_capacity(registry.sources.len());
        for entry in &registry.sources {
            if entry.source.entity_kind() != entry.entity_type {
                bail!(
                    "{} produces {} records, not {}",
                    entry.source,
                    entry.source.entity_kind(),
                    entry.entity_type
                );
            }
            if seen.contains(&entry.source) {
                bail!("{} is listed twice", entry.source);
            }
            seen.push(entry.source);
        }
        Ok(registry)
    }

    pub async fn load(workspace_root: &Path) -> Result<Self> {
        let path = workspace_root.join("sources.yaml");
        let text = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("loading {}", path.display()))
    }

    pub fn get(&self, source: Source) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.source == source)
    }

    pub fn enabled(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

/// `rules/categories.yaml` replaces the built-in keyword rules when present.
pub async fn load_category_rules(workspace_root: &Path) -> Result<CategoryRules> {
    let path = workspace_root.join("rules").join("categories.yaml");
    let text = match fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(CategoryRules::default());
        }
        Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
    };
    parse_category_rules(&text).with_context(|| format!("loading {}", path.display()))
}

pub fn parse_category_rules(text: &str) -> Result<CategoryRules> {
    let file: CategoryRulesFile = serde_yaml::from_str(text).context("parsing category rules")?;
    if file.version != CATEGORY_RULES_VERSION {
        bail!("unsupported category rules version {}", file.version);
    }
    if file.rules.is_empty() {
        return Ok(CategoryRules::default());
    }
    CategoryRules::new(file.rules).context("compiling category rules")
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub workspace_root: PathBuf,
    pub reports_dir: PathBuf,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub http_max_retries: usize,
    /// Gap between request starts against one source.
    pub request_spacing_ms: u64,
    pub max_concurrent_sources: usize,
    pub detail_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            workspace_root: PathBuf::from("."),
            reports_dir: PathBuf::from("./reports"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            http_timeout_secs: 30,
            http_max_retries: 2,
            request_spacing_ms: 0,
            max_concurrent_sources: 1,
            detail_concurrency: 2,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |key: &str, default: usize| {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        let workspace_root = lookup("BUIDL_WORKSPACE_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.workspace_root);
        Self {
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            reports_dir: lookup("BUIDL_REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| workspace_root.join("reports")),
            workspace_root,
            user_agent: lookup("BUIDL_USER_AGENT").unwrap_or(defaults.user_agent),
            http_timeout_secs: lookup("BUIDL_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.http_timeout_secs),
            http_max_retries: number("BUIDL_HTTP_MAX_RETRIES", defaults.http_max_retries),
            request_spacing_ms: lookup("BUIDL_REQUEST_SPACING_MS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.request_spacing_ms),
            max_concurrent_sources: number("BUIDL_MAX_CONCURRENT_SOURCES", defaults.max_concurrent_sources),
            detail_concurrency: number("BUIDL_DETAIL_CONCURRENCY", defaults.detail_concurrency),
        }
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: Duration::from_secs(self.http_timeout_secs),
            user_agent: Some(self.user_agent.clone()),
            request_spacing: Duration::from_millis(self.request_spacing_ms),
            backoff: BackoffPolicy {
                max_retries: self.http_max_retries,
                ..BackoffPolicy::default()
            },
            ..HttpClientConfig::default()
        }
    }
}

/// On-demand trigger for a single source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest {
    pub source: Source,
    #[serde(default)]
    pub entity_type: Option<EntityKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("{target} produces {actual} records, not {requested}")]
    EntityMismatch {
        target: Source,
        actual: EntityKind,
        requested: EntityKind,
    },
    #[error("{target} already has a run in progress")]
    Busy { target: Source },
}

impl ScrapeRequest {
    pub fn validate(&self) -> Result<(), RequestError> {
        let actual = self.source.entity_kind();
        match self.entity_type {
            Some(requested) if requested != actual => Err(RequestError::EntityMismatch {
                target: self.source,
                actual,
                requested,
            }),
            _ => Ok(()),
        }
    }
}

pub struct SyncPipeline {
    config: SyncConfig,
    registry: SourceRegistry,
    deps: ExtractorDeps,
    orchestrator: Orchestrator,
    locks: HashMap<Source, Arc<Mutex<()>>>,
}

impl SyncPipeline {
    pub fn new(
        config: SyncConfig,
        registry: SourceRegistry,
        rules: CategoryRules,
        store: Arc<dyn RecordStore>,
    ) -> Result<Self> {
        let http = HttpFetcher::new(config.http_client_config()).context("building http client")?;
        let deps = ExtractorDeps {
            http: Arc::new(http),
            reconciler: Reconciler::new(store),
            rules: Arc::new(rules),
            detail_concurrency: config.detail_concurrency,
        };
        let locks = Source::ALL
            .into_iter()
            .map(|source| (source, Arc::new(Mutex::new(()))))
            .collect();
        Ok(Self {
            orchestrator: Orchestrator::new(config.max_concurrent_sources),
            config,
            registry,
            deps,
            locks,
        })
    }

    /// Reads `sources.yaml` and the category rules from the workspace root.
    pub async fn load(config: SyncConfig, store: Arc<dyn RecordStore>) -> Result<Self> {
        let registry = SourceRegistry::load(&config.workspace_root).await?;
        let rules = load_category_rules(&config.workspace_root).await?;
        Self::new(config, registry, rules, store)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn extractor_for(&self, source: Source) -> Result<Arc<dyn Extractor>> {
        let listing_urls = self
            .registry
            .get(source)
            .map(|c| c.listing_urls.as_slice())
            .unwrap_or_default();
        build_extractor(source, self.deps.clone(), listing_urls)
            .with_context(|| format!("building extractor for {source}"))
    }

    /// Held for the whole run of `source`; `None` while another run has it.
    fn try_claim(&self, source: Source) -> Option<OwnedMutexGuard<()>> {
        let lock = self.locks.get(&source)?;
        Arc::clone(lock).try_lock_owned().ok()
    }

    /// Runs every enabled source once and writes the run reports. Sources
    /// that are still running from another trigger are left out.
    pub async fn run_once(&self) -> Result<RunReport> {
        let mut guards = Vec::new();
        let mut extractors = Vec::new();
        for entry in self.registry.enabled() {
            let Some(guard) = self.try_claim(entry.source) else {
                warn!(source = %entry.source, "run already in progress; source skipped");
                continue;
            };
            guards.push(guard);
            extractors.push(self.extractor_for(entry.source)?);
        }
        if extractors.is_empty() {
            warn!("no runnable sources");
        }
        let report = self.run_and_report(&extractors).await;
        drop(guards);
        report
    }

    pub async fn handle_request(&self, request: ScrapeRequest) -> Result<RunReport> {
        request.validate()?;
        if !self.registry.get(request.source).is_some_and(|c| c.enabled) {
            warn!(source = %request.source, "scraping a source that is disabled in sources.yaml");
        }
        let Some(_guard) = self.try_claim(request.source) else {
            return Err(RequestError::Busy {
                target: request.source,
            }
            .into());
        };
        self.run_and_report(&[self.extractor_for(request.source)?]).await
    }

    /// Skips the run when the previous run of `source` still holds its lock.
    pub async fn run_source_exclusive(&self, source: Source) -> Result<Option<RunReport>> {
        let Some(_guard) = self.try_claim(source) else {
            warn!(%source, "previous run still active; skipping tick");
            return Ok(None);
        };
        self.run_and_report(&[self.extractor_for(source)?]).await.map(Some)
    }

    pub fn source_lock(&self, source: Source) -> Option<Arc<Mutex<()>>> {
        self.locks.get(&source).cloned()
    }

    async fn run_and_report(&self, extractors: &[Arc<dyn Extractor>]) -> Result<RunReport> {
        let report = self.orchestrator.run_all(extractors).await;
        let dir = write_reports(&self.config.reports_dir, &report).await?;
        info!(run_id = %report.run_id, reports = %dir.display(), "reports written");
        Ok(report)
    }

    /// One cron job per enabled source that has a schedule.
    pub async fn build_scheduler(self: &Arc<Self>) -> Result<JobScheduler> {
        let sched = JobScheduler::new().await.context("creating scheduler")?;
        for entry in self.registry.enabled() {
            let Some(cron) = entry.schedule.as_deref() else {
                continue;
            };
            let source = entry.source;
            let pipeline = Arc::clone(self);
            let job = Job::new_async(cron, move |_uuid, _l| {
                let pipeline = Arc::clone(&pipeline);
                Box::pin(async move {
                    if let Err(err) = pipeline.run_source_exclusive(source).await {
                        warn!(%source, error = %err, "scheduled run failed");
                    }
                })
            })
            .with_context(|| format!("creating scheduler job for {source} ({cron})"))?;
            sched.add(job).await.context("adding scheduler job")?;
            info!(%source, %cron, "scheduled");
        }
        Ok(sched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buidl_storage::MemoryStore;

    const SOURCES: &str = r#"
sources:
  - source: ethglobal
    entity_type: hackathon
    schedule: "0 0 */6 * * *"
  - source: taikai
    entity_type: hackathon
    enabled: false
  - source: foundation_grants
    entity_type: grant
    schedule: "0 30 3 * * *"
    listing_urls: []
"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn config_defaults_and_overrides() {
        let config = SyncConfig::from_lookup(env(&[]));
        assert!(config.database_url.is_none());
        assert_eq!(config.http_timeout_secs, 30);
        assert_eq!(config.http_max_retries, 2);
        assert_eq!(config.max_concurrent_sources, 1);
        assert!(config.http_client_config().request_spacing.is_zero());
        assert_eq!(config.reports_dir, PathBuf::from("./reports"));

        let config = SyncConfig::from_lookup(env(&[
            ("DATABASE_URL", "postgres://buidl@localhost/buidl"),
            ("BUIDL_WORKSPACE_ROOT", "/srv/buidl"),
            ("BUIDL_MAX_CONCURRENT_SOURCES", "3"),
            ("BUIDL_HTTP_TIMEOUT_SECS", "not-a-number"),
            ("BUIDL_REQUEST_SPACING_MS", "750"),
        ]));
        assert_eq!(config.database_url.as_deref(), Some("postgres://buidl@localhost/buidl"));
        assert_eq!(config.reports_dir, PathBuf::from("/srv/buidl/reports"));
        assert_eq!(config.max_concurrent_sources, 3);
        assert_eq!(config.http_timeout_secs, 30);
        assert_eq!(config.http_client_config().backoff.max_retries, 2);
        assert_eq!(
            config.http_client_config().request_spacing,
            Duration::from_millis(750)
        );
    }

    #[test]
    fn registry_parses_and_filters_enabled() {
        let registry = SourceRegistry::parse(SOURCES).expect("valid registry");
        let enabled = registry.enabled().map(|s| s.source).collect::<Vec<_>>();
        assert_eq!(enabled, vec![Source::Ethglobal, Source::FoundationGrants]);
        assert_eq!(
            registry.get(Source::Ethglobal).and_then(|s| s.schedule.as_deref()),
            Some("0 0 */6 * * *")
        );
    }

    #[test]
    fn registry_rejects_wrong_entity_type_and_duplicates() {
        let wrong = "sources:\n  - source: devpost\n    entity_type: grant\n";
        assert!(SourceRegistry::parse(wrong).is_err());
        let twice = "sources:\n  - source: akindo\n    entity_type: hackathon\n  - source: akindo\n    entity_type: hackathon\n";
        assert!(SourceRegistry::parse(twice).is_err());
    }

    #[test]
    fn category_rule_file_overrides_builtins() {
        let rules = parse_category_rules(
            "version: 1\nrules:\n  - category: zk\n    contains_any: [\"zero knowledge\", \"snark\"]\n",
        )
        .expect("rules compile");
        assert_eq!(rules.matches(&["SNARK tooling"]), vec!["zk"]);
        assert!(parse_category_rules("version: 2\nrules: []\n").is_err());
    }

    #[test]
    fn scrape_request_rejects_mismatched_entity_type() {
        let request: ScrapeRequest =
            serde_json::from_str(r#"{"source":"foundation_grants","entityType":"hackathon"}"#).expect("request json");
        assert_eq!(
            request.validate(),
            Err(RequestError::EntityMismatch {
                target: Source::FoundationGrants,
                actual: EntityKind::Grant,
                requested: EntityKind::Hackathon,
            })
        );
        let ok = ScrapeRequest {
            source: Source::Devfolio,
            entity_type: None,
        };
        assert!(ok.validate().is_ok());
    }

    fn pipeline(reports: &Path, store: Arc<MemoryStore>) -> SyncPipeline {
        let config = SyncConfig {
            reports_dir: reports.to_path_buf(),
            ..SyncConfig::default()
        };
        let registry = SourceRegistry::parse(
            "sources:\n  - source: foundation_grants\n    entity_type: grant\n",
        )
        .expect("registry");
        SyncPipeline::new(config, registry, CategoryRules::default(), store).expect("pipeline")
    }

    #[tokio::test]
    async fn run_once_reconciles_and_writes_reports() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(tmp.path(), store.clone());

        let report = pipeline.run_once().await.expect("run");
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.totals.created, 43);
        assert!(!report.has_failures());
        assert_eq!(store.len().await, 43);

        let dir = tmp.path().join(report.run_id.to_string());
        assert!(dir.join(report::REPORT_JSON).exists());
        assert!(dir.join(report::SUMMARY_MD).exists());

        let again = pipeline
            .handle_request(ScrapeRequest {
                source: Source::FoundationGrants,
                entity_type: Some(EntityKind::Grant),
            })
            .await
            .expect("on-demand run");
        assert_eq!(again.totals.unchanged, 43);
    }

    #[tokio::test]
    async fn busy_source_skips_the_tick() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(tmp.path(), store.clone());

        let lock = pipeline.source_lock(Source::FoundationGrants).expect("lock");
        let held = lock.lock().await;
        let skipped = pipeline
            .run_source_exclusive(Source::FoundationGrants)
            .await
            .expect("skip is not an error");
        assert!(skipped.is_none());
        assert!(store.is_empty().await);
        drop(held);

        let ran = pipeline
            .run_source_exclusive(Source::FoundationGrants)
            .await
            .expect("run");
        assert_eq!(ran.map(|r| r.totals.created), Some(43));
    }

    #[tokio::test]
    async fn on_demand_and_batch_runs_respect_a_busy_source() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(tmp.path(), store.clone());

        let lock = pipeline.source_lock(Source::FoundationGrants).expect("lock");
        let held = lock.lock().await;

        let err = pipeline
            .handle_request(ScrapeRequest {
                source: Source::FoundationGrants,
                entity_type: None,
            })
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<RequestError>(),
            Some(&RequestError::Busy {
                target: Source::FoundationGrants
            })
        );

        let report = pipeline.run_once().await.expect("batch run");
        assert!(report.results.is_empty());
        assert!(store.is_empty().await);
        drop(held);

        let report = pipeline.run_once().await.expect("batch run");
        assert_eq!(report.totals.created, 43);
        assert!(lock.try_lock().is_ok(), "run releases the source");
    }

    #[tokio::test]
    async fn mismatched_request_never_runs() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(tmp.path(), store.clone());
        let err = pipeline
            .handle_request(ScrapeRequest {
                source: Source::Ethglobal,
                entity_type: Some(EntityKind::Grant),
            })
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<RequestError>().is_some());
        assert!(store.is_empty().await);
    }
}
