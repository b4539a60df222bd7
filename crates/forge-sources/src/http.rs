use std::sync::Arc;

use async_trait::async_trait;
use forge_core::{ForgeError, Paper};
use forge_store::{connector_cache_key, StateStore};
use serde::Deserialize;
use serde_json::json;

use crate::bucket::SourceRateLimiter;
use crate::connector::{with_retry, HealthStatus, SearchFilters, SourceConnector};

/// A connector to an external academic database reached over a JSON HTTP
/// API. The wire shape below (`results: [...]`, flat fields) is the common
/// denominator most such APIs converge on; connectors for sources with a
/// different shape would normalize in `parse_results` instead.
pub struct HttpSourceConnector {
    name: String,
    base_url: String,
    client: reqwest::Client,
    limiter: SourceRateLimiter,
    store: Arc<dyn StateStore>,
    default_ttl_secs: u64,
    max_attempts: u32,
    backoff_base_ms: u64,
    backoff_max_ms: u64,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawRecord>,
}

#[derive(Deserialize)]
struct RawRecord {
    id: String,
    title: String,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default, rename = "abstract")]
    abstract_text: String,
    #[serde(default)]
    venue: String,
    #[serde(default)]
    citation_count: u64,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl HttpSourceConnector {
    /// Builds a connector for `name`, reached at `base_url`, rate-limited per
    /// `requests_per_second`/`requests_per_minute`, caching responses through
    /// `store`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        requests_per_second: f64,
        requests_per_minute: f64,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            limiter: SourceRateLimiter::new(requests_per_second, requests_per_minute),
            store,
            default_ttl_secs: 3600,
            max_attempts: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 10_000,
        }
    }

    fn to_paper(&self, record: RawRecord) -> Paper {
        let url = record
            .url
            .unwrap_or_else(|| format!("{}/papers/{}", self.base_url, record.id));
        Paper {
            paper_id: record.id,
            title: record.title,
            authors: record.authors,
            year: record.year,
            abstract_text: record.abstract_text,
            venue: record.venue,
            citation_count: record.citation_count,
            doi: record.doi,
            url,
            source: self.name.clone(),
        }
    }

    async fn fetch_search(&self, query: &str, limit: usize, filters: &SearchFilters) -> Result<Vec<Paper>, ForgeError> {
        self.limiter.acquire().await;
        let resp = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("limit", &limit.to_string())])
            .json(filters)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                ForgeError::transient(format!("{} search failed: {status}", self.name))
            } else {
                ForgeError::permanent(format!("{} search failed: {status}", self.name))
            });
        }
        let parsed: SearchResponse = resp.json().await?;
        Ok(parsed.into_results().into_iter().map(|r| self.to_paper(r)).collect())
    }
}

impl SearchResponse {
    fn into_results(self) -> Vec<RawRecord> {
        self.results
    }
}

#[async_trait]
impl SourceConnector for HttpSourceConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
        use_cache: bool,
    ) -> Result<Vec<Paper>, ForgeError> {
        let cache_key = connector_cache_key(query, &filters.to_string(), &self.name);
        if use_cache {
            if let Some(cached) = self.store.get(&cache_key).await.map_err(store_err)? {
                if let Ok(papers) = serde_json::from_value::<Vec<Paper>>(cached) {
                    return Ok(papers);
                }
            }
        }

        let papers = with_retry(self.max_attempts, self.backoff_base_ms, self.backoff_max_ms, || {
            self.fetch_search(query, limit, filters)
        })
        .await?;

        if use_cache {
            let _ = self
                .store
                .set(&cache_key, json!(papers), self.default_ttl_secs)
                .await;
        }
        Ok(papers)
    }

    async fn get(&self, paper_id: &str, use_cache: bool) -> Result<Paper, ForgeError> {
        let cache_key = connector_cache_key(paper_id, "", &self.name);
        if use_cache {
            if let Some(cached) = self.store.get(&cache_key).await.map_err(store_err)? {
                if let Ok(paper) = serde_json::from_value::<Paper>(cached) {
                    return Ok(paper);
                }
            }
        }

        let paper = with_retry(self.max_attempts, self.backoff_base_ms, self.backoff_max_ms, || async {
            self.limiter.acquire().await;
            let resp = self
                .client
                .get(format!("{}/papers/{}", self.base_url, paper_id))
                .send()
                .await?;
            if !resp.status().is_success() {
                let status = resp.status();
                return Err(if status.is_server_error() || status.as_u16() == 429 {
                    ForgeError::transient(format!("{} get failed: {status}", self.name))
                } else {
                    ForgeError::permanent(format!("{} get failed: {status}", self.name))
                });
            }
            let record: RawRecord = resp.json().await?;
            Ok(self.to_paper(record))
        })
        .await?;

        if use_cache {
            let _ = self.store.set(&cache_key, json!(paper), self.default_ttl_secs).await;
        }
        Ok(paper)
    }

    async fn health(&self) -> HealthStatus {
        let healthy = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false);
        HealthStatus {
            source: self.name.clone(),
            healthy,
        }
    }
}

fn store_err(e: forge_store::StoreError) -> ForgeError {
    ForgeError::Internal(e.to_string())
}
