use std::sync::Arc;
use std::time::Duration;

use buidl_adapters::grants::BUILTIN_CATALOG;
use buidl_adapters::{
    build_extractor, AdapterError, AdapterJob, AlchemyGrantsAdapter, Extractor, ExtractorDeps,
    FoundationGrantsAdapter,
};
use buidl_core::{CanonicalRecord, CategoryRules, EntityKind, HackathonStatus, Source};
use buidl_storage::{BackoffPolicy, HttpClientConfig, HttpFetcher, MemoryStore, Reconciler};
use chrono::{Datelike, Timelike};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DORAHACKS_LISTING: &str = include_str!("../../../fixtures/dorahacks/listing.html");
const DORAHACKS_DETAIL: &str = include_str!("../../../fixtures/dorahacks/detail.html");
const DEVPOST_LISTING: &str = include_str!("../../../fixtures/devpost/listing.html");
const ALCHEMY_LISTING: &str = include_str!("../../../fixtures/alchemy_grants/listing.html");

fn deps(store: Arc<MemoryStore>) -> ExtractorDeps {
    let http = HttpFetcher::new(HttpClientConfig {
        timeout: Duration::from_secs(2),
        backoff: BackoffPolicy {
            max_retries: 0,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        },
        ..HttpClientConfig::default()
    })
    .expect("client builds");
    ExtractorDeps {
        http: Arc::new(http),
        reconciler: Reconciler::new(store),
        rules: Arc::new(CategoryRules::default()),
        detail_concurrency: 3,
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html")
}

async fn mount(server: &MockServer, route: &str, response: ResponseTemplate, calls: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .expect(calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn dorahacks_listing_is_enriched_deduped_and_idempotent() {
    let server = MockServer::start().await;
    mount(&server, "/hackathon", html(DORAHACKS_LISTING), 2).await;
    mount(&server, "/hackathon/sui-overflow", html(DORAHACKS_DETAIL), 2).await;

    let store = Arc::new(MemoryStore::new());
    let extractor = build_extractor(
        Source::Dorahacks,
        deps(store.clone()),
        &[format!("{}/hackathon", server.uri())],
    )
    .expect("extractor");
    assert_eq!(extractor.name(), "DoraHacks");

    let first = extractor.run().await.expect("first run");
    assert_eq!(first.found, 2);
    assert_eq!(first.created, 2);
    assert_eq!(first.failed, 0);

    let Some(CanonicalRecord::Hackathon(sui)) =
        store.get(EntityKind::Hackathon, Source::Dorahacks, "sui-overflow").await
    else {
        panic!("sui-overflow stored as a hackathon");
    };
    assert!(!sui.dates_estimated);
    assert_eq!((sui.start_date.month(), sui.start_date.day()), (5, 1));
    assert_eq!((sui.end_date.month(), sui.end_date.day(), sui.end_date.hour()), (6, 15, 23));
    assert_eq!(sui.participant_count, Some(1234));
    assert_eq!(sui.banner_url.as_deref(), Some("https://cdn.dorahacks.io/sui-overflow-banner.png"));
    assert_eq!(sui.short_description.as_deref(), Some("Organized by Sui Foundation"));
    assert_eq!(sui.chains, vec!["Sui"]);
    assert!(sui.is_official);

    let Some(CanonicalRecord::Hackathon(bnb)) =
        store.get(EntityKind::Hackathon, Source::Dorahacks, "bnb-hack").await
    else {
        panic!("bnb-hack stored as a hackathon");
    };
    assert_eq!(bnb.status, HackathonStatus::Ongoing);
    assert_eq!(bnb.prize_pool.as_ref().map(|m| m.amount), Some(100_000.0));
    assert_eq!(bnb.participant_count, Some(812));
    assert!(bnb.categories.contains(&"defi".to_string()));
    assert!(bnb.registration_url.as_deref().is_some_and(|u| !u.contains('?')));

    let writes = store.write_count();
    let second = extractor.run().await.expect("second run");
    assert_eq!(second.found, 2);
    assert_eq!(second.unchanged, 2);
    assert_eq!(second.created + second.updated, 0);
    assert_eq!(store.write_count(), writes);
}

#[tokio::test]
async fn failed_detail_page_drops_only_that_candidate() {
    let server = MockServer::start().await;
    mount(&server, "/hackathon", html(DORAHACKS_LISTING), 1).await;
    mount(&server, "/hackathon/sui-overflow", ResponseTemplate::new(500), 1).await;

    let store = Arc::new(MemoryStore::new());
    let extractor = build_extractor(
        Source::Dorahacks,
        deps(store.clone()),
        &[format!("{}/hackathon", server.uri())],
    )
    .expect("extractor");
    let result = extractor.run().await.expect("run survives a detail failure");
    assert_eq!(result.found, 1);
    assert_eq!(result.created, 1);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn listing_failure_is_fatal_only_when_no_page_loads() {
    let server = MockServer::start().await;
    mount(&server, "/gone", ResponseTemplate::new(404), 2).await;
    mount(&server, "/hackathon", html(DORAHACKS_LISTING), 1).await;
    mount(&server, "/hackathon/sui-overflow", html(DORAHACKS_DETAIL), 1).await;

    let store = Arc::new(MemoryStore::new());
    let gone = format!("{}/gone", server.uri());

    let dead = build_extractor(Source::Dorahacks, deps(store.clone()), &[gone.clone()]).expect("extractor");
    let err = dead.run().await.unwrap_err();
    assert!(matches!(err, AdapterError::Fetch(_)));
    assert!(store.is_empty().await);

    let partial = build_extractor(
        Source::Dorahacks,
        deps(store.clone()),
        &[gone, format!("{}/hackathon", server.uri())],
    )
    .expect("extractor");
    let result = partial.run().await.expect("one page is enough");
    assert_eq!(result.created, 2);
}

#[tokio::test]
async fn devpost_keeps_only_web3_tiles() {
    let server = MockServer::start().await;
    mount(&server, "/hackathons", html(DEVPOST_LISTING), 1).await;

    let store = Arc::new(MemoryStore::new());
    let extractor = build_extractor(
        Source::Devpost,
        deps(store.clone()),
        &[format!("{}/hackathons", server.uri())],
    )
    .expect("extractor");
    let result = extractor.run().await.expect("devpost run");
    assert_eq!(result.found, 1);

    let records = store.records().await;
    let CanonicalRecord::Hackathon(tile) = &records[0] else {
        panic!("devpost yields hackathons");
    };
    assert_eq!(tile.source_id, "ethdenver-buidlathon");
    assert_eq!(tile.status, HackathonStatus::Completed);
    assert_eq!(tile.sponsors, vec!["ETHDenver"]);
    assert!(!tile.is_official);
    assert!(tile.chains.contains(&"Ethereum".to_string()));
}

#[tokio::test]
async fn foundation_catalog_reconciles_per_program() {
    let store = Arc::new(MemoryStore::new());
    let extractor = build_extractor(Source::FoundationGrants, deps(store.clone()), &[]).expect("extractor");

    let first = extractor.run().await.expect("catalog run");
    assert_eq!(first.found, 43);
    assert_eq!(first.created, 43);

    let second = extractor.run().await.expect("catalog rerun");
    assert_eq!(second.unchanged, 43);

    let edited = BUILTIN_CATALOG.replacen("max_amount: 500000", "max_amount: 600000", 1);
    let job = AdapterJob::new(FoundationGrantsAdapter::with_catalog(edited), deps(store.clone()));
    let third = job.run().await.expect("edited catalog run");
    assert_eq!(third.updated, 1);
    assert_eq!(third.unchanged, 42);

    let Some(CanonicalRecord::Grant(ef)) =
        store.get(EntityKind::Grant, Source::FoundationGrants, "ef-grants").await
    else {
        panic!("ef-grants stored as a grant");
    };
    assert_eq!(ef.funding.and_then(|f| f.max_amount), Some(600_000.0));
}

#[tokio::test]
async fn unreadable_catalog_fails_the_run() {
    let store = Arc::new(MemoryStore::new());
    let job = AdapterJob::new(FoundationGrantsAdapter::with_catalog("foundations: [oops"), deps(store.clone()));
    let err = job.run().await.unwrap_err();
    assert!(matches!(err, AdapterError::Parse(_)));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn alchemy_article_reconciles_listed_programs() {
    let server = MockServer::start().await;
    mount(&server, "/best/web3-grants", html(ALCHEMY_LISTING), 2).await;

    let store = Arc::new(MemoryStore::new());
    let extractor = build_extractor(
        Source::AlchemyGrants,
        deps(store.clone()),
        &[format!("{}/best/web3-grants", server.uri())],
    )
    .expect("extractor");
    assert_eq!(extractor.name(), "Alchemy Grants");

    let first = extractor.run().await.expect("alchemy run");
    assert_eq!((first.found, first.created), (3, 3));

    let Some(CanonicalRecord::Grant(arbitrum)) = store
        .get(EntityKind::Grant, Source::AlchemyGrants, "arbitrum-dao-grants")
        .await
    else {
        panic!("arbitrum stored as a grant");
    };
    assert_eq!(arbitrum.application_url.as_deref(), Some("https://arbitrum.foundation/grants"));
    assert!(arbitrum.is_rolling);

    let Some(CanonicalRecord::Grant(gitcoin)) = store
        .get(EntityKind::Grant, Source::AlchemyGrants, "gitcoin-grants-stack")
        .await
    else {
        panic!("gitcoin stored as a grant");
    };
    assert_eq!(
        gitcoin.application_url,
        Some(format!("{}/grants/gitcoin", server.uri()))
    );

    let second = extractor.run().await.expect("alchemy rerun");
    assert_eq!(second.unchanged, 3);
}

#[tokio::test]
async fn alchemy_page_without_programs_is_an_error() {
    let server = MockServer::start().await;
    mount(&server, "/moved", html("<html><body><h1>Moved</h1></body></html>"), 1).await;
    let store = Arc::new(MemoryStore::new());
    let job = AdapterJob::new(AlchemyGrantsAdapter::new(), deps(store.clone()))
        .with_listing_urls(&[format!("{}/moved", server.uri())]);
    assert!(matches!(job.run().await, Err(AdapterError::Message(_))));
}
