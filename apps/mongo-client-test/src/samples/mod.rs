//! Placeholder documents the poller reads.

mod error;
mod models;
mod mongodb;
mod repository;
mod seed;

pub use error::{SampleError, SampleResult};
pub use models::Sample;
pub use self::mongodb::MongoSampleRepository;
pub use repository::SampleRepository;
pub use seed::{SEED_COUNT, ensure_collection_not_empty};

#[cfg(test)]
pub use repository::MockSampleRepository;
