use crate::sub_feed::FeedQuery;
use crate::traits::FeedClient;
use crate::types::{FetchConfig, RawRecord, Result, TrackerError, PAGE_SIZE};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

const API_KEY_HEADER: &str = "X-APIKEY";

#[derive(Deserialize)]
struct ApiResponse {
    results: Vec<RawRecord>,
}

pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    api_key: String,
}

impl Fetcher {
    pub fn new(config: FetchConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()
            .map_err(TrackerError::Transport)?;

        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }

    pub fn request_url(&self, query: &FeedQuery) -> Result<Url> {
        build_url(&self.config.api_url, query)
    }
}

/// `{api_url}/{resource}?{filter}&order=..&per_page=5&fields=a,b,c`
pub fn build_url(api_url: &str, query: &FeedQuery) -> Result<Url> {
    let mut url = Url::parse(api_url)?;
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .push(query.resource);

    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair(&query.filter.0, &query.filter.1);
        if let Some(order) = query.order {
            pairs.append_pair("order", order);
        }
        pairs.append_pair("per_page", &PAGE_SIZE.to_string());
        pairs.append_pair("fields", &query.fields_param());
    }

    Ok(url)
}

#[async_trait]
impl FeedClient for Fetcher {
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<RawRecord>> {
        let url = self.request_url(query)?;
        let start_time = Instant::now();

        debug!("Fetching {}: {}", query.resource, url);

        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(TrackerError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} request failed with HTTP {}", query.resource, status);
            return Err(TrackerError::upstream(
                Some(status.as_u16()),
                status.canonical_reason().unwrap_or("Unknown"),
            ));
        }

        let body = response.bytes().await.map_err(TrackerError::Transport)?;
        let parsed: ApiResponse = serde_json::from_slice(&body).map_err(|e| {
            TrackerError::upstream(Some(status.as_u16()), format!("unreadable response body: {}", e))
        })?;

        info!(
            "Fetched {} {} records in {}ms",
            parsed.results.len(),
            query.resource,
            start_time.elapsed().as_millis()
        );
        Ok(parsed.results)
    }
}
