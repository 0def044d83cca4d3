//! Loading the raw configuration tree.
//!
//! Sources, later ones overriding earlier ones:
//!  1. The file at `path`, if given. Its format follows the extension
//!     (`.yaml`, `.toml`, `.json`).
//!  2. Environment variables prefixed `MESSAGING__`, with `__` separating
//!     levels. `MESSAGING__RABBITMQ__QUEUES` and friends land under
//!     `rabbitmq.queues`.
//!
//! The result is handed to adapter constructors, which bind their own
//! section and tolerate it being absent.

use crate::error::ConfigurationError;
use std::path::Path;
use tracing::info;

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;

/// Prefix of environment variables read into the configuration tree
pub const ENV_PREFIX: &str = "MESSAGING";

/// Build the configuration tree from an optional file and the environment.
///
/// A file that is given but missing or malformed is an error.
pub fn load(path: Option<&Path>) -> Result<config::Config, ConfigurationError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        info!(path = %path.display(), "Loading messaging configuration file");
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let config = builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    Ok(config)
}
