//! Error types for fuzzdex
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using DexError
pub type Result<T> = std::result::Result<T, DexError>;

/// Unified error type for fuzzdex operations
#[derive(Debug, Error)]
pub enum DexError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Storage Format Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt database file: {0}")]
    CorruptFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Handle State Errors
    // -------------------------------------------------------------------------
    /// Any call on a handle that is no longer open, including a second `close`
    #[error("Illegal call: database already closed")]
    DatabaseClosed,

    #[error("Illegal call: database opened read-only")]
    ReadOnly,

    #[error("Database already open in this process: {0}")]
    AlreadyOpen(PathBuf),

    // -------------------------------------------------------------------------
    // Engine / Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DexError {
    /// True for misuse of a handle (programmer errors), as opposed to
    /// runtime failures of the underlying storage.
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, DexError::DatabaseClosed | DexError::ReadOnly)
    }
}

impl From<bincode::Error> for DexError {
    fn from(e: bincode::Error) -> Self {
        DexError::Serialization(e.to_string())
    }
}
