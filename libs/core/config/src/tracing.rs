use crate::{env_flag, ConfigError, FromEnv};
use std::fmt::Write as _;
use tracing::{debug, info};
use tracing_subscriber::fmt::format::debug_fn;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Output format of the log lines
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// One flattened JSON object per line, for log shippers
    Json,
    /// Human-readable multi-line output
    Pretty,
}

/// Logging configuration
#[derive(Clone, Debug)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Lowers the default level from `info` to `debug`
    pub verbose: bool,
    /// Print structured fields next to the message. Only the pretty format
    /// honors this; JSON lines always carry their fields.
    pub attributes: bool,
}

impl LogConfig {
    pub fn new(format: LogFormat, verbose: bool) -> Self {
        Self {
            format,
            verbose,
            attributes: true,
        }
    }

    pub fn with_attributes(mut self, attributes: bool) -> Self {
        self.attributes = attributes;
        self
    }

    /// Level filter used when `RUST_LOG` is not set
    pub fn default_directive(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            verbose: false,
            attributes: true,
        }
    }
}

impl FromEnv for LogConfig {
    /// - `LOG_AS_JSON`: JSON output unless set to one of the false values
    /// - `VERBOSE`: debug level when set to one of the true values
    /// - `LOG_ATTRIBUTES`: fields in pretty output unless set to one of the false values
    fn from_env() -> Result<Self, ConfigError> {
        let format = if env_flag("LOG_AS_JSON", true) {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        };

        Ok(Self {
            format,
            verbose: env_flag("VERBOSE", false),
            attributes: env_flag("LOG_ATTRIBUTES", true),
        })
    }
}

/// Install color-eyre with a project-standard configuration.
///
/// Call this early in the main() before any fallible operations to ensure
/// colored error output. Safe to call multiple times.
///
/// Configuration:
/// - Shows file:line where errors occur
/// - Hides environment variables (less noise)
pub fn install_color_eyre() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install();
}

/// Initialize tracing with error span capture.
///
/// - **JSON** (`LOG_AS_JSON` unset or truthy): flattened JSON events, no
///   module targets
/// - **Pretty** (`LOG_AS_JSON=false`): human-readable output
/// - **Plain** (`LOG_AS_JSON=false`, `LOG_ATTRIBUTES=false`): one line per
///   event with the message only
///
/// Both include the `ErrorLayer` so eyre reports carry span traces.
/// `RUST_LOG` overrides the level filter derived from `VERBOSE`.
///
/// Safe to call multiple times; later calls are ignored (common in tests).
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let result = match (config.format, config.attributes) {
        (LogFormat::Json, _) => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init(),
        (LogFormat::Pretty, true) => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false)
                    .pretty(),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init(),
        (LogFormat::Pretty, false) => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .fmt_fields(debug_fn(|writer, field, value| {
                        if field.name() == "message" {
                            write!(writer, "{value:?}")
                        } else {
                            Ok(())
                        }
                    })),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init(),
    };

    match result {
        Ok(_) => {
            info!(
                format = ?config.format,
                verbose = config.verbose,
                attributes = config.attributes,
                "Tracing initialized"
            );
        }
        Err(_) => {
            debug!("Tracing already initialized, skipping re-initialization");
        }
    }
}
