//! # fuzzdex
//!
//! An embedded keyword-to-file index with:
//! - Exact and fuzzy (edit distance) lookup, optionally case-insensitive
//! - Per-file removal and freshness tracking
//! - Append-only, checksummed storage with crash recovery
//! - Single-writer/multi-reader concurrency per handle
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                               │
//! │            (config + capability check, opens)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   Database (handle)                          │
//! │       (RwLock: single writer / multi reader, lifecycle)      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ RecordStore │          │   Matcher   │
//!   │  (append,   │          │ (edit dist) │
//!   │   scan)     │          └─────────────┘
//!   └──────┬──────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │ Record file │
//!   │ (CRC, LSN)  │
//!   └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use fuzzdex::Database;
//!
//! let db = Database::open("/tmp/keywords.fzdx")?;
//! db.expand("report", "/tmp/a.txt")?;
//! assert_eq!(db.search("repot", 1, false)?, vec!["/tmp/a.txt".to_string()]);
//! db.close()?;
//! # Ok::<(), fuzzdex::DexError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod logging;

pub mod engine;
pub mod handle;
pub mod matcher;
pub mod registry;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, SyncStrategy};
pub use engine::Engine;
pub use error::{DexError, Result};
pub use handle::Database;
pub use store::{Association, CompactionStats, FileInfo};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of fuzzdex
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
