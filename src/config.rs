//! Configuration for fuzzdex
//!
//! Centralized configuration with sensible defaults.

use crate::error::{DexError, Result};
use crate::store::FORMAT_VERSION;

/// Configuration applied to every database opened through an [`Engine`](crate::Engine)
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Durability
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the record file
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Access Mode
    // -------------------------------------------------------------------------
    /// Open databases without write access. Mutations fail with `ReadOnly`.
    pub read_only: bool,

    // -------------------------------------------------------------------------
    // Compaction
    // -------------------------------------------------------------------------
    /// Don't consider compaction until the file holds at least this many records
    pub compaction_min_records: u64,

    /// Compact once dead records / total records exceeds this ratio (0.0, 1.0]
    pub compaction_dead_ratio: f64,

    // -------------------------------------------------------------------------
    // Format
    // -------------------------------------------------------------------------
    /// Format version stamped into newly created files
    pub format_version: u16,
}

/// Record file sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced records (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync_strategy: SyncStrategy::EveryWrite,
            read_only: false,
            compaction_min_records: 1024,
            compaction_dead_ratio: 0.5,
            format_version: FORMAT_VERSION,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check values that can't be expressed in the types alone.
    ///
    /// Unsupported format versions are reported as `Unsupported`, everything
    /// else as `Config`.
    pub fn validate(&self) -> Result<()> {
        if self.format_version == 0 || self.format_version > FORMAT_VERSION {
            return Err(DexError::Unsupported(format!(
                "format version {} (this build supports 1..={})",
                self.format_version, FORMAT_VERSION
            )));
        }

        if let SyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(DexError::Config(
                "EveryNEntries sync strategy needs a count greater than zero".to_string(),
            ));
        }

        let ratio = self.compaction_dead_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(DexError::Config(format!(
                "compaction_dead_ratio must be in (0.0, 1.0], got {}",
                ratio
            )));
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Open databases read-only
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    /// Set the minimum record count before automatic compaction is considered
    pub fn compaction_min_records(mut self, count: u64) -> Self {
        self.config.compaction_min_records = count;
        self
    }

    /// Set the dead-record ratio that triggers automatic compaction
    pub fn compaction_dead_ratio(mut self, ratio: f64) -> Self {
        self.config.compaction_dead_ratio = ratio;
        self
    }

    /// Set the format version used for new files
    pub fn format_version(mut self, version: u16) -> Self {
        self.config.format_version = version;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
