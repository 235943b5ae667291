//! Record Store Module
//!
//! Durable, file-backed persistence of the association set.
//!
//! ## Responsibilities
//! - Append new or refreshed associations without rewriting the file
//! - Tombstone records for per-file removal
//! - CRC32 checksums and Log Sequence Numbers (LSN) for corruption detection
//! - Recovery of interrupted appends on open
//! - Compaction of dead records
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Header (8 bytes)                        │
//! │ ┌──────────┬────────────┬─────────────┐ │
//! │ │"FZDX" (4)│Version u16 │Reserved (2) │ │
//! │ └──────────┴────────────┴─────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 1                                │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 2 ...                            │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Data is a bincode-encoded [`Operation`]; the CRC covers LSN, Len and Data.

mod compaction;
mod manager;
mod reader;
mod record;
mod table;
mod writer;

pub use compaction::CompactionStats;
pub use manager::{FileInfo, RecordStore, Scan};
pub use reader::{Recovery, RecoveryResult};
pub use record::{Operation, Record, MAX_PAYLOAD_SIZE, RECORD_HEADER_SIZE};
pub use table::{Association, AssociationTable};
pub use writer::RecordWriter;

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes identifying a fuzzdex database file
pub(crate) const MAGIC: &[u8; 4] = b"FZDX";

/// Newest format version this build reads and writes
pub const FORMAT_VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + Reserved (2) = 8 bytes
pub const FILE_HEADER_SIZE: usize = 8;
