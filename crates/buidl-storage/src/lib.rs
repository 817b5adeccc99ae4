//! HTTP fetching plus the record store and reconciler behind every extractor.

pub mod fetch;
pub mod reconcile;
pub mod store;

pub use fetch::{
    BackoffPolicy, FetchError, FetchedResponse, HttpClientConfig, HttpFetcher, DEFAULT_USER_AGENT,
};
pub use reconcile::{ReconcileOutcome, Reconciler};
pub use store::{MemoryStore, PgRecordStore, RecordStore, StoreError, StoredRef};

pub const CRATE_NAME: &str = "buidl-storage";
