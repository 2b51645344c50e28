//! The F1TR recording file format.
//!
//! Layout (little-endian, fixed-width, no trailer or index):
//!
//! ```text
//! Header: magic "F1TR" (4B) | version u16 | created_at_nanos i64 | reserved[32]
//! Entry*: timestamp_nanos i64 | payload_len u32 | payload[payload_len]
//! ```
//!
//! Entries repeat to end-of-file in append order. A file with a truncated
//! tail is readable up to the last complete entry.

pub mod format;
pub mod reader;

pub use format::{ENTRY_OVERHEAD, FILE_HEADER_SIZE, FORMAT_VERSION, FileHeader, MAGIC, RecordingEntry};
pub use reader::RecordingReader;
