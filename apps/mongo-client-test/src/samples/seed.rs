use tracing::info;

use super::error::SampleResult;
use super::models::Sample;
use super::repository::SampleRepository;

/// Number of placeholder documents written into an empty collection
pub const SEED_COUNT: usize = 5;

/// Seed the collection when it is missing or empty. Returns the number of
/// inserted documents.
pub async fn ensure_collection_not_empty<R>(repo: &R) -> SampleResult<usize>
where
    R: SampleRepository + ?Sized,
{
    if repo.collection_exists().await? {
        let count = repo.count().await?;
        if count > 0 {
            info!(count, "Collection already holds documents, skipping seed");
            return Ok(0);
        }
        info!("Collection is empty, seeding");
    } else {
        info!("Collection does not exist, seeding");
    }

    let inserted = repo.insert_many(Sample::placeholders(SEED_COUNT)).await?;
    info!(inserted, "Seeded sample documents");
    Ok(inserted)
}
