//! Remote quote sources.
//!
//! A remote source hands out its current quote collection (`fetch_remote`)
//! and accepts locally modified quotes (`post_local`). Fetch failures are
//! errors; post failures are reported in the returned [`PostResult`].
//!
//! Implementations:
//! - [`HttpRemote`]: JSON over HTTP (`GET`/`POST {base}/quotes`)
//! - [`InMemoryRemote`]: in-process simulation with switchable failures

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{QuoteError, QuoteResult};
use crate::models::Quote;

/// Outcome of uploading dirty quotes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PostResult {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch the remote collection
    async fn fetch_remote(&self) -> QuoteResult<Vec<Quote>>;

    /// Upload locally modified quotes. Never fails; errors are in the result.
    async fn post_local(&self, dirty: &[Quote]) -> PostResult;
}

/// HTTP remote source
pub struct HttpRemote {
    client: Client,
    base_url: String,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> QuoteResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QuoteError::transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build from configuration; fails when no remote URL is configured
    pub fn from_config(config: &Config) -> QuoteResult<Self> {
        let url = config
            .remote_url()
            .ok_or_else(|| QuoteError::Config("sync.remote_url is not set".to_string()))?;
        Self::new(url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn quotes_url(&self) -> String {
        format!("{}/quotes", self.base_url)
    }
}

#[async_trait]
impl RemoteSource for HttpRemote {
    async fn fetch_remote(&self) -> QuoteResult<Vec<Quote>> {
        let response = self.client.get(self.quotes_url()).send().await?;

        if !response.status().is_success() {
            return Err(QuoteError::transport(format!(
                "Fetch failed with status {}",
                response.status()
            )));
        }

        response
            .json::<Vec<Quote>>()
            .await
            .map_err(|e| QuoteError::transport(format!("Failed to parse quotes: {}", e)))
    }

    async fn post_local(&self, dirty: &[Quote]) -> PostResult {
        tracing::debug!("POST {} ({} quotes)", self.quotes_url(), dirty.len());

        match self.client.post(self.quotes_url()).json(dirty).send().await {
            Ok(response) if response.status().is_success() => PostResult::success(),
            Ok(response) => {
                PostResult::failure(format!("Post failed with status {}", response.status()))
            }
            Err(e) => PostResult::failure(e.to_string()),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    quotes: Vec<Quote>,
    posted: Vec<Vec<Quote>>,
    fail_fetch: bool,
    fail_post: bool,
    latency: Option<Duration>,
    fetch_count: usize,
}

/// In-process remote source.
///
/// Clones share the same state. Posted quotes are upserted into the snapshot
/// when their version is not older than the stored one.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRemote {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRemote {
    pub fn new(quotes: Vec<Quote>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                quotes,
                ..Default::default()
            })),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    /// Replace the served snapshot
    pub fn set_quotes(&self, quotes: Vec<Quote>) {
        self.with_state(|s| s.quotes = quotes);
    }

    pub fn quotes(&self) -> Vec<Quote> {
        self.with_state(|s| s.quotes.clone())
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.with_state(|s| s.fail_fetch = fail);
    }

    pub fn set_fail_post(&self, fail: bool) {
        self.with_state(|s| s.fail_post = fail);
    }

    /// Delay applied to every fetch and post
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.with_state(|s| s.latency = latency);
    }

    /// Every accepted post batch, oldest first
    pub fn posted(&self) -> Vec<Vec<Quote>> {
        self.with_state(|s| s.posted.clone())
    }

    pub fn fetch_count(&self) -> usize {
        self.with_state(|s| s.fetch_count)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.with_state(|s| s.latency) {
            tokio::time::sleep(latency).await;
        }
    }
}

/// Upsert posted quotes into a snapshot, keeping the newer version.
pub(crate) fn upsert_quotes(snapshot: &mut Vec<Quote>, posted: &[Quote]) -> usize {
    let mut accepted = 0;
    for quote in posted {
        let mut incoming = quote.clone();
        incoming.dirty = false;
        incoming.conflict = false;

        match snapshot.iter_mut().find(|q| q.id == incoming.id) {
            Some(existing) if incoming.version >= existing.version => {
                *existing = incoming;
                accepted += 1;
            }
            Some(_) => {}
            None => {
                snapshot.push(incoming);
                accepted += 1;
            }
        }
    }
    accepted
}

#[async_trait]
impl RemoteSource for InMemoryRemote {
    async fn fetch_remote(&self) -> QuoteResult<Vec<Quote>> {
        self.simulate_latency().await;
        self.with_state(|s| {
            s.fetch_count += 1;
            if s.fail_fetch {
                Err(QuoteError::transport("simulated fetch failure"))
            } else {
                Ok(s.quotes.clone())
            }
        })
    }

    async fn post_local(&self, dirty: &[Quote]) -> PostResult {
        self.simulate_latency().await;
        self.with_state(|s| {
            if s.fail_post {
                return PostResult::failure("simulated post failure");
            }
            s.posted.push(dirty.to_vec());
            upsert_quotes(&mut s.quotes, dirty);
            PostResult::success()
        })
    }
}
