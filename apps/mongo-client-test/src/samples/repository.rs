use async_trait::async_trait;
use mongodb::bson::Document;

use super::error::SampleResult;
use super::models::Sample;

/// Data access for the sample collection
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SampleRepository: Send + Sync {
    /// Up to `limit` documents, unfiltered and untyped
    async fn find(&self, limit: i64) -> SampleResult<Vec<Document>>;

    /// Whether the collection exists in the database
    async fn collection_exists(&self) -> SampleResult<bool>;

    async fn count(&self) -> SampleResult<u64>;

    /// Insert samples, returning how many were written
    async fn insert_many(&self, samples: Vec<Sample>) -> SampleResult<usize>;
}
