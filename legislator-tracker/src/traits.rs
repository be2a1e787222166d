use crate::sub_feed::FeedQuery;
use crate::types::{RawRecord, Result};
use async_trait::async_trait;

/// Trait for pulling one page of raw records from the upstream API
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Issue a single projected, paginated fetch and return the `results`
    /// array. No retries: a failure is returned to the caller as-is.
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<RawRecord>>;
}

#[async_trait]
impl<T: FeedClient + ?Sized> FeedClient for std::sync::Arc<T> {
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<RawRecord>> {
        (**self).fetch(query).await
    }
}
