use mongodb::{
    Client, Database,
    bson::doc,
    event::{EventHandler, sdam::SdamEvent},
    options::ClientOptions,
};
use std::time::Duration;
use tracing::info;

use super::MongoConfig;

/// Error type for MongoDB operations
#[derive(Debug, thiserror::Error)]
pub enum MongoError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("No database in the connection string and none configured (set MONGO_DATABASE)")]
    MissingDatabase,
}

/// Connect using a MongoConfig
///
/// `sdam_handler` receives server, heartbeat and topology events for the
/// whole lifetime of the client; register it here because the driver
/// starts monitoring as soon as the client exists.
///
/// # Example
/// ```ignore
/// use database::mongodb::{MongoConfig, EventDispatcher, connect_from_config};
///
/// let config = MongoConfig::new("mongodb://localhost:27017/demo");
/// let client = connect_from_config(&config, Some(EventDispatcher::new().into_handler())).await?;
/// ```
pub async fn connect_from_config(
    config: &MongoConfig,
    sdam_handler: Option<EventHandler<SdamEvent>>,
) -> Result<Client, MongoError> {
    info!("Attempting to connect to MongoDB at {}", config.target());

    let mut options = ClientOptions::parse(&config.url).await?;

    // Apply config settings
    options.max_pool_size = Some(config.max_pool_size);
    options.min_pool_size = Some(config.min_pool_size);
    options.connect_timeout = Some(Duration::from_secs(config.connect_timeout_secs));
    options.server_selection_timeout =
        Some(Duration::from_secs(config.server_selection_timeout_secs));

    if let Some(ref app_name) = config.app_name {
        options.app_name = Some(app_name.clone());
    }

    options.sdam_event_handler = sdam_handler;

    let client = Client::with_options(options)?;

    // Verify connection
    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(|e| MongoError::ConnectionFailed(e.to_string()))?;

    info!("Successfully connected to MongoDB");
    Ok(client)
}

/// Pick the database to work with: the configured name, else the default
/// database of the connection string.
pub fn resolve_database(client: &Client, config: &MongoConfig) -> Result<Database, MongoError> {
    match config.database {
        Some(ref name) => Ok(client.database(name)),
        None => client.default_database().ok_or(MongoError::MissingDatabase),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_database_prefers_configured_name() {
        // Client construction does not contact the server
        let client = Client::with_uri_str("mongodb://localhost:27017/from_url")
            .await
            .unwrap();
        let config = MongoConfig::with_database("mongodb://localhost:27017/from_url", "explicit");
        let db = resolve_database(&client, &config).unwrap();
        assert_eq!(db.name(), "explicit");
    }

    #[tokio::test]
    async fn test_resolve_database_from_url() {
        let client = Client::with_uri_str("mongodb://localhost:27017/from_url")
            .await
            .unwrap();
        let config = MongoConfig::new("mongodb://localhost:27017/from_url");
        let db = resolve_database(&client, &config).unwrap();
        assert_eq!(db.name(), "from_url");
    }

    #[tokio::test]
    async fn test_resolve_database_missing() {
        let client = Client::with_uri_str("mongodb://localhost:27017").await.unwrap();
        let config = MongoConfig::new("mongodb://localhost:27017");
        let result = resolve_database(&client, &config);
        assert!(matches!(result, Err(MongoError::MissingDatabase)));
    }

    #[tokio::test]
    #[ignore] // Requires actual MongoDB
    async fn test_connect_from_config() {
        let config = MongoConfig::with_database("mongodb://localhost:27017", "test");
        let result = connect_from_config(&config, None).await;
        assert!(result.is_ok());
    }
}
