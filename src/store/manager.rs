//! Record Store
//!
//! Owns the database file and the in-memory association table built from it.
//!
//! ## Responsibilities
//! - Create a new file or recover an existing one on open
//! - Write every mutation to the file before applying it in memory
//! - Serve scans from memory
//! - Compact when too many records are dead

use std::collections::btree_map;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{Config, SyncStrategy};
use crate::error::{DexError, Result};

use super::compaction::{self, CompactionStats};
use super::reader::Recovery;
use super::record::{Operation, Record};
use super::table::{Association, AssociationTable};
use super::writer::RecordWriter;

/// Per-file summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub filename: String,
    /// Newest timestamp among the file's associations
    pub last_modified: u64,
    /// Number of search strings linked to the file
    pub keywords: usize,
}

/// Durable association set backed by one file
///
/// ## Consistency:
/// - Mutations take `&mut self`, scans borrow `&self`, so a scan can never
///   overlap a mutation.
/// - A mutation is applied to the table only after its record is written.
pub struct RecordStore {
    path: PathBuf,

    /// Live associations
    table: AssociationTable,

    /// `None` when opened read-only, or after a failed compaction left the
    /// file at `path` unreachable
    writer: Option<RecordWriter>,

    read_only: bool,

    /// Format version of the file
    version: u16,

    /// Records currently in the file, live or not
    total_records: u64,

    sync_strategy: SyncStrategy,
}

impl RecordStore {
    /// Open or create the store at `path`
    ///
    /// On open:
    /// 1. Create the file with a header if it is missing or empty
    /// 2. Otherwise read every record, cutting off an interrupted append
    /// 3. Replay records into the association table
    pub fn open(path: &Path, config: &Config) -> Result<Self> {
        if config.read_only {
            return Self::open_read_only(path, config);
        }

        compaction::remove_stale_scratch(path)?;

        let is_new = match fs::metadata(path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };

        if is_new {
            let writer = RecordWriter::create(path, config.format_version, config.sync_strategy)?;
            tracing::info!(path = %path.display(), version = config.format_version, "Created database");

            return Ok(Self {
                path: path.to_path_buf(),
                table: AssociationTable::new(),
                writer: Some(writer),
                read_only: false,
                version: config.format_version,
                total_records: 0,
                sync_strategy: config.sync_strategy,
            });
        }

        let (records, recovery) = Recovery::recover(path)?;
        if recovery.torn_bytes > 0 {
            tracing::warn!(
                path = %path.display(),
                torn_bytes = recovery.torn_bytes,
                last_lsn = recovery.last_lsn,
                "Discarding interrupted append"
            );
        }

        let table = replay(records);
        let writer = RecordWriter::open(
            path,
            recovery.valid_len,
            recovery.last_lsn + 1,
            config.sync_strategy,
        )?;

        tracing::info!(
            path = %path.display(),
            records = recovery.records_recovered,
            associations = table.len(),
            files = table.file_count(),
            "Opened database"
        );

        Ok(Self {
            path: path.to_path_buf(),
            table,
            writer: Some(writer),
            read_only: false,
            version: recovery.version,
            total_records: recovery.records_recovered,
            sync_strategy: config.sync_strategy,
        })
    }

    fn open_read_only(path: &Path, config: &Config) -> Result<Self> {
        // An empty file is a database nobody has written to yet
        if fs::metadata(path)?.len() == 0 {
            tracing::info!(path = %path.display(), "Opened empty database read-only");
            return Ok(Self {
                path: path.to_path_buf(),
                table: AssociationTable::new(),
                writer: None,
                read_only: true,
                version: config.format_version,
                total_records: 0,
                sync_strategy: config.sync_strategy,
            });
        }

        let (records, recovery) = Recovery::recover(path)?;
        if recovery.torn_bytes > 0 {
            tracing::warn!(
                path = %path.display(),
                torn_bytes = recovery.torn_bytes,
                "Ignoring interrupted append (read-only)"
            );
        }

        let table = replay(records);
        tracing::info!(
            path = %path.display(),
            associations = table.len(),
            "Opened database read-only"
        );

        Ok(Self {
            path: path.to_path_buf(),
            table,
            writer: None,
            read_only: true,
            version: recovery.version,
            total_records: recovery.records_recovered,
            sync_strategy: config.sync_strategy,
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Insert a pair or refresh its timestamp, returning the stored timestamp.
    ///
    /// A refresh never moves the timestamp backwards.
    pub fn append_or_update(
        &mut self,
        search_string: &str,
        filename: &str,
        timestamp: u64,
    ) -> Result<u64> {
        let timestamp = match self.table.get(search_string, filename) {
            Some(previous) => previous.max(timestamp),
            None => timestamp,
        };

        self.writer_mut()?.append(Operation::Associate {
            search_string: search_string.to_string(),
            filename: filename.to_string(),
            timestamp,
        })?;

        self.table.upsert(search_string, filename, timestamp);
        self.total_records += 1;

        Ok(timestamp)
    }

    /// Remove every association for `filename`, returning how many went away.
    ///
    /// Unknown filenames are a no-op and write nothing.
    pub fn delete_all_for(&mut self, filename: &str) -> Result<usize> {
        if self.read_only {
            return Err(DexError::ReadOnly);
        }

        if !self.table.contains_file(filename) {
            return Ok(0);
        }

        self.writer_mut()?.append(Operation::Truncate {
            filename: filename.to_string(),
        })?;
        self.total_records += 1;

        Ok(self.table.remove_file(filename))
    }

    /// Rewrite the file with only live associations
    pub fn compact(&mut self) -> Result<CompactionStats> {
        let records_before = self.total_records;
        let writer = self.writer_mut()?;
        writer.sync()?;
        let bytes_before = writer.len();

        match compaction::rewrite(&self.path, self.version, self.table.iter(), self.sync_strategy) {
            Ok((writer, written)) => {
                let stats = CompactionStats {
                    records_before,
                    records_after: written,
                    bytes_before,
                    bytes_after: writer.len(),
                };
                self.writer = Some(writer);
                self.total_records = written;

                tracing::info!(
                    path = %self.path.display(),
                    records_before = stats.records_before,
                    records_after = stats.records_after,
                    bytes_before = stats.bytes_before,
                    bytes_after = stats.bytes_after,
                    "Compacted database"
                );
                Ok(stats)
            }
            Err(e) => {
                // The rename may or may not have happened. Until reattached to
                // whatever is at `path` now, the old writer must not be used.
                self.writer = None;
                if let Err(reattach_err) = self.reattach() {
                    tracing::error!(
                        path = %self.path.display(),
                        error = %reattach_err,
                        "Failed to reopen database after failed compaction; writes disabled"
                    );
                }
                Err(e)
            }
        }
    }

    fn reattach(&mut self) -> Result<()> {
        let (_, recovery) = Recovery::recover(&self.path)?;
        self.writer = Some(RecordWriter::open(
            &self.path,
            recovery.valid_len,
            recovery.last_lsn + 1,
            self.sync_strategy,
        )?);
        self.total_records = recovery.records_recovered;
        Ok(())
    }

    /// Whether dead records make up more than `dead_ratio` of a file that
    /// holds at least `min_records`
    pub fn should_compact(&self, min_records: u64, dead_ratio: f64) -> bool {
        if self.writer.is_none() || self.total_records == 0 {
            return false;
        }
        if self.total_records < min_records {
            return false;
        }
        self.dead_records() as f64 / self.total_records as f64 > dead_ratio
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        self.writer_mut()?.sync()
    }

    /// Sync all prior mutations, then release the file
    pub fn flush_and_close(mut self) -> Result<()> {
        self.sync()?;
        tracing::info!(
            path = %self.path.display(),
            associations = self.table.len(),
            "Closed database"
        );
        Ok(())
    }

    fn writer_mut(&mut self) -> Result<&mut RecordWriter> {
        if self.read_only {
            return Err(DexError::ReadOnly);
        }
        self.writer.as_mut().ok_or_else(|| {
            DexError::Io(io::Error::new(
                io::ErrorKind::Other,
                "database file detached after a failed compaction",
            ))
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Iterate over all live associations in first-insertion order.
    ///
    /// Call again to restart.
    pub fn scan(&self) -> Scan<'_> {
        Scan {
            inner: self.table.iter(),
        }
    }

    /// Iterate over the associations of one filename
    pub fn scan_file<'a>(&'a self, filename: &str) -> impl Iterator<Item = &'a Association> + 'a {
        self.table.iter_file(filename)
    }

    /// Summaries of every indexed file, sorted by filename
    pub fn files(&self) -> Vec<FileInfo> {
        self.table
            .files()
            .map(|(filename, keywords)| FileInfo {
                filename: filename.to_string(),
                last_modified: self
                    .table
                    .iter_file(filename)
                    .map(|a| a.timestamp)
                    .max()
                    .unwrap_or_default(),
                keywords,
            })
            .collect()
    }

    /// Number of live associations
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Number of distinct filenames
    pub fn file_count(&self) -> usize {
        self.table.file_count()
    }

    /// Records in the file, live or superseded
    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    /// Records that no longer contribute a live association
    pub fn dead_records(&self) -> u64 {
        self.total_records.saturating_sub(self.table.len() as u64)
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Lazy iteration over the live associations of a [`RecordStore`]
pub struct Scan<'a> {
    inner: btree_map::Values<'a, u64, Association>,
}

impl<'a> Iterator for Scan<'a> {
    type Item = &'a Association;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Rebuild the table from records in LSN order
fn replay(records: Vec<Record>) -> AssociationTable {
    let mut table = AssociationTable::new();

    for record in records {
        match record.operation {
            Operation::Associate {
                search_string,
                filename,
                timestamp,
            } => {
                table.upsert(&search_string, &filename, timestamp);
            }
            Operation::Truncate { filename } => {
                table.remove_file(&filename);
            }
        }
    }

    table
}
