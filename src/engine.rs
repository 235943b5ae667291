//! Engine Module
//!
//! Entry point for opening databases.
//!
//! ## Responsibilities
//! - Check once, up front, that this build can serve the given config
//! - Hand out [`Database`] handles for individual files

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::error::{DexError, Result};
use crate::handle::Database;

/// A validated configuration, ready to open databases
///
/// Holding an `Engine` means the capability check passed; individual
/// operations never re-check it.
#[derive(Debug, Clone)]
pub struct Engine {
    config: Config,
}

impl Engine {
    /// Validate `config` and the environment.
    ///
    /// Fails with `Unsupported` for a format version this build can't write
    /// or a system clock that can't produce timestamps, and with `Config`
    /// for out-of-range settings.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        if SystemTime::now().duration_since(UNIX_EPOCH).is_err() {
            return Err(DexError::Unsupported(
                "system clock is set before the unix epoch".to_string(),
            ));
        }

        tracing::debug!(?config, "Engine ready");
        Ok(Self { config })
    }

    /// Open or create the database at `path`
    pub fn open(&self, path: impl AsRef<Path>) -> Result<Database> {
        Database::open_with(path.as_ref(), self.config.clone())
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
