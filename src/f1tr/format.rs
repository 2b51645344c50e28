//! F1TR binary structures: file header and entry framing.

use crate::packet::unix_nanos_now;
use crate::{Result, TelemetryError};

/// File magic, the first four bytes of every recording.
pub const MAGIC: [u8; 4] = *b"F1TR";

/// Newest format version this crate writes and understands.
pub const FORMAT_VERSION: u16 = 1;

/// Encoded size of the file header: magic + version + created + reserved.
pub const FILE_HEADER_SIZE: usize = 4 + 2 + 8 + RESERVED_SIZE;

/// Fixed per-entry framing overhead (timestamp + payload length).
pub const ENTRY_OVERHEAD: usize = 8 + 4;

const RESERVED_SIZE: usize = 32;

/// The fixed header written at the start of every recording file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Format version; readers accept `1..=FORMAT_VERSION`.
    pub version: u16,
    /// Recording creation time in Unix nanoseconds.
    pub created_at_nanos: i64,
}

impl FileHeader {
    /// Header for a recording created now, at the current format version.
    pub fn new() -> Self {
        Self { version: FORMAT_VERSION, created_at_nanos: unix_nanos_now() }
    }

    /// Encodes the header into its fixed on-disk layout.
    pub fn encode(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut buf = [0u8; FILE_HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..14].copy_from_slice(&self.created_at_nanos.to_le_bytes());
        // bytes 14..46 stay reserved (zero)
        buf
    }

    /// Parses and validates a file header from the start of `data`.
    ///
    /// Fails with a `Format` error when the data is too short, the magic does
    /// not match exactly, or the version is one this reader does not
    /// understand.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FILE_HEADER_SIZE {
            return Err(TelemetryError::format(format!(
                "file too short for header: {} bytes (need {})",
                data.len(),
                FILE_HEADER_SIZE
            )));
        }
        if data[0..4] != MAGIC {
            return Err(TelemetryError::format(format!(
                "bad magic {:02X?}, expected \"F1TR\"",
                &data[0..4]
            )));
        }

        let version = u16::from_le_bytes([data[4], data[5]]);
        if version == 0 || version > FORMAT_VERSION {
            return Err(TelemetryError::format(format!(
                "unsupported format version {version} (this reader understands 1..={FORMAT_VERSION})"
            )));
        }

        let created_at_nanos = i64::from_le_bytes([
            data[6], data[7], data[8], data[9], data[10], data[11], data[12], data[13],
        ]);

        Ok(Self { version, created_at_nanos })
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// One recorded packet as stored in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingEntry {
    /// Capture timestamp in Unix nanoseconds.
    pub timestamp_nanos: i64,
    /// The raw datagram, byte-for-byte as captured.
    pub payload: Vec<u8>,
}

/// Encodes the fixed-width framing that precedes an entry's payload.
pub fn encode_entry_framing(timestamp_nanos: i64, payload_len: u32) -> [u8; ENTRY_OVERHEAD] {
    let mut buf = [0u8; ENTRY_OVERHEAD];
    buf[0..8].copy_from_slice(&timestamp_nanos.to_le_bytes());
    buf[8..12].copy_from_slice(&payload_len.to_le_bytes());
    buf
}
