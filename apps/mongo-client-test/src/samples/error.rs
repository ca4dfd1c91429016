use thiserror::Error;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("Database error: {0}")]
    Database(String),
}

pub type SampleResult<T> = Result<T, SampleError>;

impl From<mongodb::error::Error> for SampleError {
    fn from(err: mongodb::error::Error) -> Self {
        SampleError::Database(err.to_string())
    }
}
