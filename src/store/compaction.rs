//! Compaction
//!
//! Rewrites a database file so it holds exactly one record per live
//! association, dropping superseded updates and tombstones.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::error::Result;

use super::record::Operation;
use super::table::Association;
use super::writer::RecordWriter;

/// Outcome of a compaction run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionStats {
    pub records_before: u64,
    pub records_after: u64,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Path of the scratch file used while compacting `path`
pub(crate) fn scratch_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".compact");
    PathBuf::from(name)
}

/// Write `live` into a scratch file and atomically move it over `path`.
///
/// Returns a writer positioned at the end of the new file.
pub(crate) fn rewrite<'a, I>(
    path: &Path,
    version: u16,
    live: I,
    sync_strategy: SyncStrategy,
) -> Result<(RecordWriter, u64)>
where
    I: IntoIterator<Item = &'a Association>,
{
    let scratch = scratch_path(path);

    let (len, next_lsn, written) = {
        let mut writer = RecordWriter::create(&scratch, version, SyncStrategy::EveryWrite)?;
        let operations = live.into_iter().map(|a| Operation::Associate {
            search_string: a.search_string.clone(),
            filename: a.filename.clone(),
            timestamp: a.timestamp,
        });

        if let Err(e) = writer.append_all(operations) {
            drop(writer);
            let _ = fs::remove_file(&scratch);
            return Err(e);
        }

        (writer.len(), writer.next_lsn(), writer.next_lsn() - 1)
    };

    fs::rename(&scratch, path)?;
    if let Err(e) = sync_parent_dir(path) {
        tracing::warn!(path = %path.display(), error = %e, "Failed to sync directory after compaction");
    }

    let writer = RecordWriter::open(path, len, next_lsn, sync_strategy)?;
    Ok((writer, written))
}

/// Remove a scratch file left behind by an interrupted compaction
pub(crate) fn remove_stale_scratch(path: &Path) -> Result<()> {
    let scratch = scratch_path(path);
    if scratch.exists() {
        tracing::warn!(path = %scratch.display(), "Removing stale compaction file");
        fs::remove_file(&scratch)?;
    }
    Ok(())
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::File::open(parent)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}
