//! Database Handle
//!
//! The live capability through which every operation on an open database
//! is performed.
//!
//! ## Lifecycle
//! `open` → Open → `close` → Closed. Closed is terminal: every call on a
//! closed handle, including a second `close`, fails with `DatabaseClosed`.
//! Dropping an open handle closes it.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{DexError, Result};
use crate::matcher::Matcher;
use crate::registry::PathClaim;
use crate::store::{CompactionStats, FileInfo, RecordStore};

/// State that exists only while the handle is open.
///
/// Field order matters: the store closes its file before the path claim is
/// released.
struct OpenState {
    store: RecordStore,
    _claim: PathClaim,
}

/// An open database
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader
///
/// - **Writes** (expand/truncate/compact/close): exclusive `RwLock` write
///   guard, so at most one mutation is in flight.
/// - **Reads** (search/last_modified/files/is_open): shared read guard; any
///   number run together and each sees the state fully before or fully after
///   a mutation.
pub struct Database {
    path: PathBuf,
    config: Config,
    state: RwLock<Option<OpenState>>,
}

impl Database {
    /// Open or create the database at `path` with the default config
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Engine::new(Config::default())?.open(path)
    }

    pub(crate) fn open_with(path: &Path, config: Config) -> Result<Self> {
        let claim = PathClaim::acquire(path)?;
        let store = RecordStore::open(path, &config)?;

        Ok(Self {
            path: path.to_path_buf(),
            config,
            state: RwLock::new(Some(OpenState {
                store,
                _claim: claim,
            })),
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Link `search_string` to `filename`, stamped with the current time.
    ///
    /// Returns `Ok(false)` if the record could not be written; the database
    /// is unchanged in that case. `Err` is reserved for misuse (closed or
    /// read-only handle).
    pub fn expand(&self, search_string: &str, filename: &str) -> Result<bool> {
        let mut guard = self.state.write();
        let store = open_store_mut(&mut guard)?;
        if store.is_read_only() {
            return Err(DexError::ReadOnly);
        }

        match store.append_or_update(search_string, filename, now_millis()) {
            Ok(timestamp) => {
                tracing::debug!(search_string, filename, timestamp, "Expanded");
                self.maybe_compact(store);
                Ok(true)
            }
            Err(e) => {
                tracing::error!(search_string, filename, error = %e, "Expand failed");
                Ok(false)
            }
        }
    }

    /// Remove every association for `filename`, returning how many went away.
    ///
    /// An unknown filename removes nothing and is not an error.
    pub fn truncate(&self, filename: &str) -> Result<usize> {
        let mut guard = self.state.write();
        let store = open_store_mut(&mut guard)?;

        let removed = store.delete_all_for(filename)?;
        tracing::debug!(filename, removed, "Truncated");

        self.maybe_compact(store);
        Ok(removed)
    }

    /// Remove every association for each of `filenames` under one lock
    pub fn truncate_multiple<S: AsRef<str>>(&self, filenames: &[S]) -> Result<usize> {
        let mut guard = self.state.write();
        let store = open_store_mut(&mut guard)?;

        let mut removed = 0;
        for filename in filenames {
            removed += store.delete_all_for(filename.as_ref())?;
        }
        tracing::debug!(files = filenames.len(), removed, "Truncated multiple");

        self.maybe_compact(store);
        Ok(removed)
    }

    /// Drop files that can no longer be accessed or aren't regular files.
    ///
    /// Returns the removed filenames.
    pub fn truncate_deleted(&self) -> Result<Vec<String>> {
        self.prune(false)
    }

    /// Like [`truncate_deleted`](Self::truncate_deleted), and also drop files
    /// modified on disk after they were last indexed.
    pub fn truncate_modified(&self) -> Result<Vec<String>> {
        self.prune(true)
    }

    fn prune(&self, check_modified: bool) -> Result<Vec<String>> {
        let mut guard = self.state.write();
        let store = open_store_mut(&mut guard)?;
        if store.is_read_only() {
            return Err(DexError::ReadOnly);
        }

        tracing::info!(
            files = store.file_count(),
            check_modified,
            "Scanning filesystem for obsolete entries"
        );

        let stale: Vec<String> = store
            .files()
            .into_iter()
            .filter(|info| is_stale(info, check_modified))
            .map(|info| info.filename)
            .collect();

        for filename in &stale {
            store.delete_all_for(filename)?;
        }

        self.maybe_compact(store);
        Ok(stale)
    }

    /// Rewrite the file without superseded records and tombstones
    pub fn compact(&self) -> Result<CompactionStats> {
        let mut guard = self.state.write();
        open_store_mut(&mut guard)?.compact()
    }

    /// Force every prior mutation to stable storage
    pub fn sync(&self) -> Result<()> {
        let mut guard = self.state.write();
        open_store_mut(&mut guard)?.sync()
    }

    /// Flush and release the file. The handle is closed afterwards even if
    /// the flush fails.
    pub fn close(&self) -> Result<()> {
        let state = self.state.write().take().ok_or(DexError::DatabaseClosed)?;
        state.store.flush_and_close()
    }

    fn maybe_compact(&self, store: &mut RecordStore) {
        if !store.should_compact(
            self.config.compaction_min_records,
            self.config.compaction_dead_ratio,
        ) {
            return;
        }

        if let Err(e) = store.compact() {
            tracing::warn!(path = %self.path.display(), error = %e, "Automatic compaction failed");
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Distinct filenames whose search strings match `query`, in the order
    /// their first matching association was added.
    pub fn search(&self, query: &str, fuzziness: u32, ignore_case: bool) -> Result<Vec<String>> {
        let guard = self.state.read();
        let store = open_store(&guard)?;

        let matcher = Matcher::new(query, fuzziness, ignore_case);
        let mut seen: HashSet<&str> = HashSet::new();
        let mut results = Vec::new();

        for association in store.scan() {
            if seen.contains(association.filename.as_str()) {
                continue;
            }
            if matcher.is_match(&association.search_string) {
                seen.insert(association.filename.as_str());
                results.push(association.filename.clone());
            }
        }

        tracing::debug!(query, fuzziness, ignore_case, hits = results.len(), "Searched");
        Ok(results)
    }

    /// Newest timestamp recorded for `filename`, or `None` if it has no
    /// associations
    pub fn last_modified(&self, filename: &str) -> Result<Option<u64>> {
        let guard = self.state.read();
        let store = open_store(&guard)?;

        Ok(store.scan_file(filename).map(|a| a.timestamp).max())
    }

    /// Every indexed file with its keyword count and last-modified time
    pub fn files(&self) -> Result<Vec<FileInfo>> {
        let guard = self.state.read();
        Ok(open_store(&guard)?.files())
    }

    /// Number of distinct indexed filenames
    pub fn file_count(&self) -> Result<usize> {
        let guard = self.state.read();
        Ok(open_store(&guard)?.file_count())
    }

    /// Number of distinct (search string, filename) pairs
    pub fn association_count(&self) -> Result<usize> {
        let guard = self.state.read();
        Ok(open_store(&guard)?.len())
    }

    /// Write every association as `filename<TAB>timestamp<TAB>search_string`
    pub fn dump<W: Write>(&self, mut out: W) -> Result<()> {
        let guard = self.state.read();
        let store = open_store(&guard)?;

        for association in store.scan() {
            writeln!(
                out,
                "{}\t{}\t{}",
                association.filename, association.timestamp, association.search_string
            )?;
        }
        out.flush()?;
        Ok(())
    }

    /// True from a successful open until `close`
    pub fn is_open(&self) -> bool {
        self.state.read().is_some()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Path the handle was opened with
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Some(state) = self.state.get_mut().take() {
            if let Err(e) = state.store.flush_and_close() {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to close database on drop");
            }
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

fn open_store<'a>(state: &'a Option<OpenState>) -> Result<&'a RecordStore> {
    state
        .as_ref()
        .map(|s| &s.store)
        .ok_or(DexError::DatabaseClosed)
}

fn open_store_mut<'a>(state: &'a mut Option<OpenState>) -> Result<&'a mut RecordStore> {
    state
        .as_mut()
        .map(|s| &mut s.store)
        .ok_or(DexError::DatabaseClosed)
}

/// Current time in unix milliseconds
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Whether an indexed file should be dropped from the index
fn is_stale(info: &FileInfo, check_modified: bool) -> bool {
    let meta = match fs::symlink_metadata(&info.filename) {
        Ok(meta) => meta,
        Err(e) => {
            let gone = matches!(
                e.kind(),
                io::ErrorKind::NotFound
                    | io::ErrorKind::PermissionDenied
                    | io::ErrorKind::NotADirectory
            ) || is_symlink_loop(&e);
            if gone {
                tracing::info!(filename = %info.filename, error = %e, "File not accessible, removing from index");
            }
            return gone;
        }
    };

    if !meta.is_file() {
        tracing::debug!(filename = %info.filename, "Not a regular file, removing from index");
        return true;
    }

    if !check_modified {
        return false;
    }

    let modified = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64);

    match modified {
        Some(mtime) if mtime > info.last_modified => {
            tracing::debug!(filename = %info.filename, mtime, indexed = info.last_modified, "File modified since indexing");
            true
        }
        _ => false,
    }
}

/// Too many levels of symbolic links while resolving a path
#[cfg(unix)]
fn is_symlink_loop(e: &io::Error) -> bool {
    e.raw_os_error() == Some(nix::errno::Errno::ELOOP as i32)
}

#[cfg(not(unix))]
fn is_symlink_loop(_e: &io::Error) -> bool {
    false
}
