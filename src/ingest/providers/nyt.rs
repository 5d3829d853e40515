// src/ingest/providers/nyt.rs
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use metrics::{counter, histogram};

use crate::error::FetchError;
use crate::ingest::parse_feed_body;
use crate::ingest::types::{FeedSource, RawSnapshot};

pub const DEFAULT_NEWSWIRE_URL: &str = "https://api.nytimes.com/svc/news/v3/content/all/all.json";

/// NYT Times Newswire provider: `GET {url}?api-key={key}` returning `{"results": [...]}`.
pub struct NytNewswire {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl NytNewswire {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("news-galore/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout.min(Duration::from_secs(4)))
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::new(format!("building http client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            api_key: api_key.into(),
        })
    }

    async fn fetch_inner(&self) -> Result<RawSnapshot, FetchError> {
        // `without_url` keeps the api key (a query param) out of error messages and logs.
        let resp = self
            .http
            .get(&self.url)
            .query(&[("api-key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::new("provider request timed out")
                } else {
                    FetchError::new(format!("provider request failed: {}", e.without_url()))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::new(format!("provider returned HTTP {status}")));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::new(format!("reading provider body: {}", e.without_url())))?;
        let items = parse_feed_body(&body)?;
        Ok(RawSnapshot::new(items, Utc::now()))
    }
}

#[async_trait]
impl FeedSource for NytNewswire {
    async fn fetch(&self) -> Result<RawSnapshot, FetchError> {
        let t0 = Instant::now();
        let out = self.fetch_inner().await;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("news_fetch_ms").record(ms);
        match &out {
            Ok(snapshot) => {
                tracing::info!(target: "fetch", items = snapshot.len(), ms, "newswire fetched");
            }
            Err(e) => {
                counter!("news_fetch_errors_total").increment(1);
                tracing::error!(target: "fetch", error = %e, ms, "newswire fetch failed");
            }
        }
        out
    }

    fn name(&self) -> &'static str {
        "nyt-newswire"
    }
}
