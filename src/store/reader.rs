//! Record Recovery
//!
//! Reads a database file back into records on open.

use std::fs;
use std::path::Path;

use crate::error::{DexError, Result};

use super::record::{decode_file_header, decode_frame, Frame, Record};
use super::FILE_HEADER_SIZE;

/// Result of reading a database file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Format version found in the header
    pub version: u16,

    /// Number of records successfully read
    pub records_recovered: u64,

    /// Last valid LSN (0 if the file holds no records)
    pub last_lsn: u64,

    /// Length of the valid prefix of the file (header + good records)
    pub valid_len: u64,

    /// Bytes past `valid_len` that belong to an interrupted append
    pub torn_bytes: u64,
}

/// Reads every record of a database file, validating as it goes
pub struct Recovery;

impl Recovery {
    /// Read all valid records from a file.
    ///
    /// An interrupted append at the end of the file (a short frame with no
    /// valid record after it, a frame whose checksum fails and is the last
    /// one, or a zero-filled tail) is reported through `torn_bytes` and
    /// excluded. Anything else that doesn't parse, including an oversized
    /// length field, is `CorruptFormat`.
    pub fn recover(path: &Path) -> Result<(Vec<Record>, RecoveryResult)> {
        let bytes = fs::read(path)?;
        Self::recover_bytes(&bytes)
    }

    /// Same as [`Recovery::recover`], over an in-memory copy of the file
    pub fn recover_bytes(bytes: &[u8]) -> Result<(Vec<Record>, RecoveryResult)> {
        let version = decode_file_header(bytes)?;

        let mut records = Vec::new();
        let mut pos = FILE_HEADER_SIZE;
        let mut last_lsn = 0u64;

        while pos < bytes.len() {
            let rest = &bytes[pos..];

            match decode_frame(rest) {
                Frame::Complete(record, consumed) => {
                    if record.lsn <= last_lsn {
                        return Err(DexError::CorruptFormat(format!(
                            "Non-increasing LSN {} after {} at offset {}",
                            record.lsn, last_lsn, pos
                        )));
                    }
                    last_lsn = record.lsn;
                    records.push(record);
                    pos += consumed;
                }
                Frame::Incomplete | Frame::ChecksumMismatch if is_torn_tail(rest, last_lsn) => {
                    break
                }
                Frame::Incomplete => {
                    return Err(DexError::CorruptFormat(format!(
                        "Record at offset {} runs past valid records that follow it",
                        pos
                    )));
                }
                Frame::ChecksumMismatch => {
                    return Err(DexError::CorruptFormat(format!(
                        "Checksum mismatch at offset {}",
                        pos
                    )));
                }
                Frame::BadLength(len) => {
                    return Err(DexError::CorruptFormat(format!(
                        "Record length {} exceeds maximum at offset {}",
                        len, pos
                    )));
                }
                Frame::Invalid(reason) => {
                    return Err(DexError::CorruptFormat(format!(
                        "{} (offset {})",
                        reason, pos
                    )));
                }
            }
        }

        let result = RecoveryResult {
            version,
            records_recovered: records.len() as u64,
            last_lsn,
            valid_len: pos as u64,
            torn_bytes: (bytes.len() - pos) as u64,
        };

        Ok((records, result))
    }
}

/// A bad frame is a torn append when it can only be the unfinished prefix of
/// the last frame: the rest is zero fill, or the frame reaches to EOF (or
/// past it) and no valid later record starts inside it.
///
/// Length fields above the maximum never get here: an interrupted write
/// leaves a prefix of a valid frame, so its length is always in range.
fn is_torn_tail(rest: &[u8], last_lsn: u64) -> bool {
    if rest.iter().all(|&b| b == 0) {
        return true;
    }

    if let Some(len) = frame_len(rest) {
        if len < rest.len() {
            return false;
        }
    }

    !(1..rest.len()).any(|offset| starts_valid_record(&rest[offset..], last_lsn))
}

fn starts_valid_record(bytes: &[u8], last_lsn: u64) -> bool {
    matches!(decode_frame(bytes), Frame::Complete(record, _) if record.lsn > last_lsn)
}

fn frame_len(rest: &[u8]) -> Option<usize> {
    let len_bytes = rest.get(12..16)?;
    let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]);
    Some(super::record::RECORD_HEADER_SIZE + len as usize)
}
