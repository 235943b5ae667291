//! Record Writer
//!
//! Handles appending records to the database file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::error::Result;

use super::record::{encode_file_header, Operation, Record};

/// Appends records to the database file
pub struct RecordWriter {
    /// File opened in append mode
    file: File,

    /// Path of the file (for logging)
    path: PathBuf,

    /// LSN given to the next appended record
    next_lsn: u64,

    /// Length of the file up to the last complete record
    len: u64,

    sync_strategy: SyncStrategy,

    /// Records written since the last fsync
    unsynced: usize,
}

impl RecordWriter {
    /// Create a fresh file containing only the header, replacing anything at `path`
    pub fn create(path: &Path, version: u16, sync_strategy: SyncStrategy) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let header = encode_file_header(version);
        file.write_all(&header)?;
        file.sync_all()?;

        Self::open(path, header.len() as u64, 1, sync_strategy)
    }

    /// Open an existing file for appending.
    ///
    /// Anything past `valid_len` (an interrupted append) is cut off first.
    pub fn open(
        path: &Path,
        valid_len: u64,
        next_lsn: u64,
        sync_strategy: SyncStrategy,
    ) -> Result<Self> {
        let file = OpenOptions::new().append(true).open(path)?;

        if file.metadata()?.len() > valid_len {
            file.set_len(valid_len)?;
            file.sync_all()?;
        }

        Ok(Self {
            file,
            path: path.to_path_buf(),
            next_lsn,
            len: valid_len,
            sync_strategy,
            unsynced: 0,
        })
    }

    /// Append one record, returning its LSN.
    ///
    /// The frame goes out in a single write. If the write or a required sync
    /// fails, the file is cut back to its previous length.
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        let lsn = self.next_lsn;
        self.append_all(std::iter::once(operation))?;
        Ok(lsn)
    }

    /// Append a batch of records with one write, returning the last LSN.
    ///
    /// Returns `None` when the batch was empty.
    pub fn append_all<I>(&mut self, operations: I) -> Result<Option<u64>>
    where
        I: IntoIterator<Item = Operation>,
    {
        let mut buf = Vec::new();
        let mut lsn = self.next_lsn;
        let mut count = 0usize;

        for operation in operations {
            buf.extend_from_slice(&Record::new(lsn, operation).serialize()?);
            lsn += 1;
            count += 1;
        }

        if count == 0 {
            return Ok(None);
        }

        if let Err(e) = self.write_and_sync(&buf, count) {
            self.rollback();
            return Err(e);
        }

        self.next_lsn = lsn;
        self.len += buf.len() as u64;

        tracing::trace!(
            path = %self.path.display(),
            records = count,
            bytes = buf.len(),
            "Appended records"
        );

        Ok(Some(lsn - 1))
    }

    fn write_and_sync(&mut self, buf: &[u8], count: usize) -> Result<()> {
        self.file.write_all(buf)?;
        self.unsynced += count;

        let due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if due {
            self.sync()?;
        }

        Ok(())
    }

    /// Drop a partially written tail so the file ends on a record boundary
    fn rollback(&mut self) {
        if let Err(e) = self.file.set_len(self.len) {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "Failed to roll back partial append"
            );
        }
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// LSN the next appended record will get
    pub fn next_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Length of the file in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True when the file holds no records after the header
    pub fn is_empty(&self) -> bool {
        self.next_lsn == 1
    }
}
