//! MongoDB implementation of SampleRepository

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    Collection, Database,
    bson::{Document, doc},
    options::FindOptions,
};
use tracing::instrument;

use super::error::SampleResult;
use super::models::Sample;
use super::repository::SampleRepository;

pub struct MongoSampleRepository {
    db: Database,
    collection_name: String,
}

impl MongoSampleRepository {
    /// # Example
    /// ```ignore
    /// let db = client.database("demo");
    /// let repo = MongoSampleRepository::new(db, "Samples");
    /// ```
    pub fn new(db: Database, collection_name: impl Into<String>) -> Self {
        Self {
            db,
            collection_name: collection_name.into(),
        }
    }

    fn documents(&self) -> Collection<Document> {
        self.db.collection(&self.collection_name)
    }

    fn samples(&self) -> Collection<Sample> {
        self.db.collection(&self.collection_name)
    }
}

#[async_trait]
impl SampleRepository for MongoSampleRepository {
    async fn find(&self, limit: i64) -> SampleResult<Vec<Document>> {
        let options = FindOptions::builder().limit(limit).build();

        let cursor = self.documents().find(doc! {}).with_options(options).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        Ok(documents)
    }

    #[instrument(skip(self), fields(collection = %self.collection_name))]
    async fn collection_exists(&self) -> SampleResult<bool> {
        let names = self.db.list_collection_names().await?;
        Ok(names.iter().any(|name| *name == self.collection_name))
    }

    #[instrument(skip(self), fields(collection = %self.collection_name))]
    async fn count(&self) -> SampleResult<u64> {
        Ok(self.documents().count_documents(doc! {}).await?)
    }

    #[instrument(skip(self, samples), fields(collection = %self.collection_name, count = samples.len()))]
    async fn insert_many(&self, samples: Vec<Sample>) -> SampleResult<usize> {
        if samples.is_empty() {
            return Ok(0);
        }
        let result = self.samples().insert_many(samples).await?;
        Ok(result.inserted_ids.len())
    }
}
