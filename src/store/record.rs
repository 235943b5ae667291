//! Record frames
//!
//! Encoding and decoding of the file header and of individual records.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{DexError, Result};

use super::{FILE_HEADER_SIZE, MAGIC};

/// Record header size: LSN (8) + CRC (4) + Len (4)
pub const RECORD_HEADER_SIZE: usize = 16;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Operations that can be recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Insert a (search string, filename) pair or refresh its timestamp
    Associate {
        search_string: String,
        filename: String,
        timestamp: u64,
    },

    /// Tombstone: drop every association for a filename
    Truncate { filename: String },
}

/// A single record in the database file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Log Sequence Number - strictly increasing within a file
    pub lsn: u64,

    /// The recorded operation
    pub operation: Operation,
}

/// Outcome of decoding one frame from the front of a byte slice
#[derive(Debug)]
pub(crate) enum Frame {
    /// A valid record and the number of bytes it occupied
    Complete(Record, usize),

    /// Not enough bytes for the header or the payload it announces
    Incomplete,

    /// Bytes are all there but the checksum doesn't match
    ChecksumMismatch,

    /// Header announces a payload longer than any record may be
    BadLength(u32),

    /// Checksum matched but the payload doesn't decode
    Invalid(String),
}

impl Record {
    pub fn new(lsn: u64, operation: Operation) -> Self {
        Self { lsn, operation }
    }

    /// Encode into a full frame: `[lsn][crc][len][payload]`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(&self.operation)?;
        if payload.len() > MAX_PAYLOAD_SIZE as usize {
            return Err(DexError::Serialization(format!(
                "Record payload too large: {} bytes (max {})",
                payload.len(),
                MAX_PAYLOAD_SIZE
            )));
        }

        let len = payload.len() as u32;
        let crc = compute_crc(self.lsn, len, &payload);

        let mut buf = BytesMut::with_capacity(RECORD_HEADER_SIZE + payload.len());
        buf.put_u64_le(self.lsn);
        buf.put_u32_le(crc);
        buf.put_u32_le(len);
        buf.put_slice(&payload);

        Ok(buf.to_vec())
    }

    /// Decode a single complete frame
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        match decode_frame(bytes) {
            Frame::Complete(record, _) => Ok(record),
            Frame::Incomplete => Err(DexError::CorruptFormat(format!(
                "Incomplete record: {} bytes",
                bytes.len()
            ))),
            Frame::ChecksumMismatch => {
                Err(DexError::CorruptFormat("Record checksum mismatch".to_string()))
            }
            Frame::BadLength(len) => Err(DexError::CorruptFormat(format!(
                "Record length {} exceeds maximum {}",
                len, MAX_PAYLOAD_SIZE
            ))),
            Frame::Invalid(reason) => Err(DexError::CorruptFormat(reason)),
        }
    }
}

/// CRC32 over LSN, length and payload
fn compute_crc(lsn: u64, len: u32, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&lsn.to_le_bytes());
    hasher.update(&len.to_le_bytes());
    hasher.update(payload);
    hasher.finalize()
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}

pub(crate) fn decode_frame(bytes: &[u8]) -> Frame {
    if bytes.len() < RECORD_HEADER_SIZE {
        return Frame::Incomplete;
    }

    let lsn = read_u64(bytes, 0);
    let stored_crc = read_u32(bytes, 8);
    let len = read_u32(bytes, 12);

    if len > MAX_PAYLOAD_SIZE {
        return Frame::BadLength(len);
    }

    let total = RECORD_HEADER_SIZE + len as usize;
    if bytes.len() < total {
        return Frame::Incomplete;
    }

    let payload = &bytes[RECORD_HEADER_SIZE..total];
    if compute_crc(lsn, len, payload) != stored_crc {
        return Frame::ChecksumMismatch;
    }

    match bincode::deserialize::<Operation>(payload) {
        Ok(operation) => Frame::Complete(Record { lsn, operation }, total),
        Err(e) => Frame::Invalid(format!("Undecodable record at lsn {}: {}", lsn, e)),
    }
}

// =============================================================================
// File Header
// =============================================================================

/// Encode the file header for the given format version
pub(crate) fn encode_file_header(version: u16) -> [u8; FILE_HEADER_SIZE] {
    let mut header = [0u8; FILE_HEADER_SIZE];
    header[0..4].copy_from_slice(MAGIC);
    header[4..6].copy_from_slice(&version.to_le_bytes());
    header
}

/// Validate the file header and return its format version
pub(crate) fn decode_file_header(bytes: &[u8]) -> Result<u16> {
    if bytes.len() < FILE_HEADER_SIZE {
        return Err(DexError::CorruptFormat(format!(
            "File too short for header: {} bytes",
            bytes.len()
        )));
    }

    if &bytes[0..4] != MAGIC {
        return Err(DexError::CorruptFormat(format!(
            "Invalid magic: expected FZDX, got {:?}",
            &bytes[0..4]
        )));
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version == 0 || version > super::FORMAT_VERSION {
        return Err(DexError::CorruptFormat(format!(
            "Unsupported format version: {}",
            version
        )));
    }

    Ok(version)
}
