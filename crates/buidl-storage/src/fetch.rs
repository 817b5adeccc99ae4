//! Polite HTTP access to source sites.
//!
//! Every request passes through two gates: a crate-wide cap on in-flight
//! requests and a per-source gate that bounds parallelism and, when
//! configured, keeps a minimum spacing between request starts against the
//! same source. Transient failures are retried with capped exponential
//! backoff; a `429` carrying `Retry-After` waits at least that long.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use buidl_core::Source;
use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; buidltown-scraper/0.1; +https://buidl.town)";

/// Capped exponential backoff between attempts.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl BackoffPolicy {
    /// Wait before retry number `retry` (zero based).
    pub fn pause_before(&self, retry: usize) -> Duration {
        u32::try_from(retry)
            .ok()
            .and_then(|exp| 2u32.checked_pow(exp))
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub global_concurrency: usize,
    pub per_source_concurrency: usize,
    /// Minimum gap between request starts against one source.
    pub request_spacing: Duration,
    pub backoff: BackoffPolicy,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            global_concurrency: 8,
            per_source_concurrency: 3,
            request_spacing: Duration::ZERO,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

impl FetchError {
    /// Timeouts, connection failures, `429` and `5xx` are worth another try.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            Self::HttpStatus { status, .. } => StatusCode::from_u16(*status)
                .map(|s| s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS)
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Per-source parallelism cap plus the earliest instant the next request may start.
#[derive(Debug)]
struct SourceGate {
    permits: Semaphore,
    next_start: Mutex<Instant>,
}

impl SourceGate {
    fn new(permits: usize) -> Self {
        Self {
            permits: Semaphore::new(permits),
            next_start: Mutex::new(Instant::now()),
        }
    }

    /// Reserves the next start slot and sleeps until it arrives.
    async fn wait_turn(&self, spacing: Duration) {
        if spacing.is_zero() {
            return;
        }
        let slot = {
            let mut next = self.next_start.lock().await;
            let slot = (*next).max(Instant::now());
            *next = slot + spacing;
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    in_flight: Semaphore,
    per_source_permits: usize,
    request_spacing: Duration,
    gates: Mutex<HashMap<Source, Arc<SourceGate>>>,
    backoff: BackoffPolicy,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);
        let builder = match &config.user_agent {
            Some(ua) => builder.user_agent(ua.as_str()),
            None => builder,
        };

        Ok(Self {
            client: builder.build()?,
            in_flight: Semaphore::new(config.global_concurrency.max(1)),
            per_source_permits: config.per_source_concurrency.max(1),
            request_spacing: config.request_spacing,
            gates: Mutex::new(HashMap::new()),
            backoff: config.backoff,
        })
    }

    async fn gate(&self, source: Source) -> Arc<SourceGate> {
        let mut gates = self.gates.lock().await;
        Arc::clone(
            gates
                .entry(source)
                .or_insert_with(|| Arc::new(SourceGate::new(self.per_source_permits))),
        )
    }

    /// GET `url` on behalf of `source`, retrying transient failures.
    pub async fn fetch(&self, source: Source, url: &str) -> Result<FetchedResponse, FetchError> {
        let span = info_span!("http_fetch", source = source.as_str(), url);
        async {
            let _slot = acquire(&self.in_flight).await;
            let gate = self.gate(source).await;
            let _source_slot = acquire(&gate.permits).await;

            let mut retry = 0;
            loop {
                gate.wait_turn(self.request_spacing).await;
                let started = Instant::now();
                let (result, hint) = match self.client.get(url).send().await {
                    Ok(resp) => {
                        let hint = retry_after(&resp);
                        (read_response(url, resp).await, hint)
                    }
                    Err(err) => (
                        Err(FetchError::Transport { url: url.to_string(), source: err }),
                        None,
                    ),
                };

                let err = match result {
                    Ok(resp) => {
                        debug!(
                            status = resp.status.as_u16(),
                            bytes = resp.body.len(),
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "fetched"
                        );
                        return Ok(resp);
                    }
                    Err(err) if err.is_transient() && retry < self.backoff.max_retries => err,
                    Err(err) => return Err(err),
                };

                let pause = self
                    .backoff
                    .pause_before(retry)
                    .max(hint.unwrap_or_default().min(self.backoff.max_delay));
                warn!(retry, error = %err, pause_ms = pause.as_millis() as u64, "transient fetch failure");
                tokio::time::sleep(pause).await;
                retry += 1;
            }
        }
        .instrument(span)
        .await
    }
}

/// The semaphores are owned by the fetcher and never closed while it lives.
async fn acquire(semaphore: &Semaphore) -> Option<SemaphorePermit<'_>> {
    semaphore.acquire().await.ok()
}

fn retry_after(resp: &Response) -> Option<Duration> {
    resp.headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

async fn read_response(url: &str, resp: Response) -> Result<FetchedResponse, FetchError> {
    let status = resp.status();
    let final_url = resp.url().to_string();
    if !status.is_success() {
        return Err(FetchError::HttpStatus {
            status: status.as_u16(),
            url: final_url,
        });
    }
    let body = resp
        .bytes()
        .await
        .map_err(|source| FetchError::Transport { url: url.to_string(), source })?;
    Ok(FetchedResponse {
        status,
        final_url,
        body: body.to_vec(),
    })
}
