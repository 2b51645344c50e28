//! Sequential reader for F1TR recording files.
//!
//! The whole file is loaded into memory at construction for fast, allocation-
//! light sequential access; recordings are bounded by session length and fit
//! comfortably. The reader validates the file header eagerly and then yields
//! entries until end-of-file. A truncated tail yields every complete entry
//! and then fails with a `Format` error, so callers can report how far they
//! got.

use super::format::{ENTRY_OVERHEAD, FILE_HEADER_SIZE, FileHeader, RecordingEntry};
use crate::{Result, TelemetryError};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads recorded packets back in file order.
#[derive(Debug)]
pub struct RecordingReader {
    data: Vec<u8>,
    pos: usize,
    path: PathBuf,
    header: FileHeader,
    entries_read: usize,
}

impl RecordingReader {
    /// Opens a recording file, loading it fully and validating its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)
            .map_err(|e| TelemetryError::io(format!("opening recording {}", path.display()), e))?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| TelemetryError::io(format!("reading recording {}", path.display()), e))?;

        Self::from_bytes_with_path(data, path.to_path_buf())
    }

    /// Creates a reader over in-memory bytes (for tests).
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_bytes_with_path(data, PathBuf::from("<memory>"))
    }

    fn from_bytes_with_path(data: Vec<u8>, path: PathBuf) -> Result<Self> {
        let header = FileHeader::parse(&data)?;
        debug!(
            "opened recording {}: version {}, {} payload bytes",
            path.display(),
            header.version,
            data.len() - FILE_HEADER_SIZE
        );

        Ok(Self { data, pos: FILE_HEADER_SIZE, path, header, entries_read: 0 })
    }

    /// Reads the next entry in file order.
    ///
    /// Returns `Ok(None)` at a clean end-of-file. A partial entry at the tail
    /// (interrupted recording, truncated copy) fails with a `Format` error;
    /// every entry before it has already been returned.
    pub fn read_next_entry(&mut self) -> Result<Option<RecordingEntry>> {
        let remaining = self.data.len() - self.pos;
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < ENTRY_OVERHEAD {
            return Err(TelemetryError::format(format!(
                "truncated entry framing after {} entries: {} trailing bytes",
                self.entries_read, remaining
            )));
        }

        let d = &self.data[self.pos..];
        let timestamp_nanos =
            i64::from_le_bytes([d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]]);
        let payload_len = u32::from_le_bytes([d[8], d[9], d[10], d[11]]) as usize;

        let payload_start = self.pos + ENTRY_OVERHEAD;
        if self.data.len() - payload_start < payload_len {
            return Err(TelemetryError::format(format!(
                "truncated payload after {} entries: entry declares {} bytes, {} remain",
                self.entries_read,
                payload_len,
                self.data.len() - payload_start
            )));
        }

        let payload = self.data[payload_start..payload_start + payload_len].to_vec();
        self.pos = payload_start + payload_len;
        self.entries_read += 1;

        Ok(Some(RecordingEntry { timestamp_nanos, payload }))
    }

    /// The validated file header.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Number of complete entries returned so far.
    pub fn entries_read(&self) -> usize {
        self.entries_read
    }

    /// The path this reader was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::f1tr::format::encode_entry_framing;

    fn recording_with_entries(entries: &[(i64, &[u8])]) -> Vec<u8> {
        let mut data = FileHeader::new().encode().to_vec();
        for (ts, payload) in entries {
            data.extend_from_slice(&encode_entry_framing(*ts, payload.len() as u32));
            data.extend_from_slice(payload);
        }
        data
    }

    #[test]
    fn reads_entries_in_append_order() {
        let data =
            recording_with_entries(&[(100, b"first"), (250, b"second payload"), (400, b"")]);
        let mut reader = RecordingReader::from_bytes(data).unwrap();

        let a = reader.read_next_entry().unwrap().unwrap();
        assert_eq!(a.timestamp_nanos, 100);
        assert_eq!(a.payload, b"first");

        let b = reader.read_next_entry().unwrap().unwrap();
        assert_eq!(b.timestamp_nanos, 250);
        assert_eq!(b.payload, b"second payload");

        // Zero-length payloads are legal framing.
        let c = reader.read_next_entry().unwrap().unwrap();
        assert_eq!(c.timestamp_nanos, 400);
        assert!(c.payload.is_empty());

        assert!(reader.read_next_entry().unwrap().is_none());
        assert_eq!(reader.entries_read(), 3);
    }

    #[test]
    fn empty_recording_yields_no_entries() {
        let mut reader = RecordingReader::from_bytes(recording_with_entries(&[])).unwrap();
        assert!(reader.read_next_entry().unwrap().is_none());
    }

    #[test]
    fn truncated_tail_yields_complete_entries_then_fails() {
        let mut data = recording_with_entries(&[(100, b"complete"), (200, b"will be cut")]);
        data.truncate(data.len() - 4);

        let mut reader = RecordingReader::from_bytes(data).unwrap();
        assert_eq!(reader.read_next_entry().unwrap().unwrap().payload, b"complete");

        let err = reader.read_next_entry().unwrap_err();
        assert!(matches!(err, TelemetryError::Format { .. }));
        assert_eq!(reader.entries_read(), 1);
    }

    #[test]
    fn truncated_framing_fails() {
        let mut data = recording_with_entries(&[(100, b"ok")]);
        // Append 5 stray bytes: not enough for another entry's framing.
        data.extend_from_slice(&[1, 2, 3, 4, 5]);

        let mut reader = RecordingReader::from_bytes(data).unwrap();
        assert!(reader.read_next_entry().unwrap().is_some());
        assert!(reader.read_next_entry().is_err());
    }

    #[test]
    fn rejects_foreign_files() {
        let err = RecordingReader::from_bytes(b"definitely not a recording".to_vec()).unwrap_err();
        assert!(matches!(err, TelemetryError::Format { .. }));
    }
}
