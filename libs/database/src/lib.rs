//! Database library providing the MongoDB connector and driver event plumbing
//!
//! # Features
//!
//! - `mongodb` (default) - MongoDB support
//! - `config` - Configuration support with `core_config::FromEnv`
//! - `all` - All features
//!
//! # Examples
//!
//! ```ignore
//! use database::mongodb::{self, EventDispatcher, MongoConfig};
//! use core_config::FromEnv;
//!
//! let config = MongoConfig::from_env()?;
//! let dispatcher = EventDispatcher::new().with_listener(my_listener);
//! let client = mongodb::connect_from_config(&config, Some(dispatcher.into_handler())).await?;
//! let db = mongodb::resolve_database(&client, &config)?;
//! ```

#[cfg(feature = "mongodb")]
pub mod mongodb;
