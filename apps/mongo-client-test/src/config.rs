use clap::Parser;
use core_config::{
    ConfigError, FromEnv, env_or_default, server::ServerConfig, tracing::LogConfig,
};

// Import MongoDB config from the database library
use database::mongodb::MongoConfig;

use crate::poller::PollerConfig;

pub const DEFAULT_COLLECTION: &str = "Samples";

/// Name reported to the server when `MONGODB_APP_NAME` is unset
pub const DEFAULT_APP_NAME: &str = "mongo-client-test";

/// Command line arguments
#[derive(Parser, Debug, Default)]
#[command(name = "mongo-client-test", version, about = "Poll MongoDB and export driver metrics")]
pub struct Cli {
    /// MongoDB connection string, takes precedence over MONGO_URL / MONGODB_URL
    pub url: Option<String>,
}

/// Application configuration
/// Composes shared config components from the `config` library
#[derive(Clone, Debug)]
pub struct Config {
    pub mongodb: MongoConfig,
    pub server: ServerConfig,
    pub log: LogConfig,
    pub poller: PollerConfig,
    /// `MONGO_COLLECTION_NAME`
    pub collection: String,
}

impl Config {
    pub fn load(cli: Cli) -> Result<Self, ConfigError> {
        let mut mongodb = MongoConfig::from_env_with_url(cli.url)?;
        if mongodb.app_name.is_none() {
            mongodb.app_name = Some(DEFAULT_APP_NAME.to_string());
        }

        Ok(Self {
            mongodb,
            server: ServerConfig::from_env()?,
            log: LogConfig::from_env()?,
            poller: PollerConfig::from_env()?,
            collection: env_or_default("MONGO_COLLECTION_NAME", DEFAULT_COLLECTION),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Cli::default())
    }
}
