//! Versioned byte-offset tables for packet bodies.
//!
//! The game publishes its wire layout per yearly release, identified by the
//! `packet_format` header field (e.g. `2025`). Supporting another release is
//! a data change here, not new branching logic in the decoders: add a table
//! and extend [`PacketLayout::for_format`].
//!
//! Offsets for the Session packet are absolute from the start of the
//! datagram; participant and per-car offsets are relative to the start of the
//! fixed-stride record arrays that follow the header.

use super::HEADER_SIZE;

/// Byte offsets and strides for one protocol generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketLayout {
    /// Size of the common header that precedes every body.
    pub header_len: usize,

    // Session packet (ID 1), absolute offsets.
    pub session_weather: usize,
    pub session_type: usize,
    pub session_track_id: usize,

    // Participants packet (ID 4). The record array starts after the header
    // and the one-byte active-car count.
    pub participants_array: usize,
    pub participant_stride: usize,
    /// Offset of the null-terminated name field within a participant record.
    pub participant_name: usize,
    pub participant_name_len: usize,

    // Per-car record strides for the display decode path.
    pub car_telemetry_stride: usize,
    pub car_status_stride: usize,
}

/// Layout for packet formats 2023 through 2025, which share these offsets.
pub const LAYOUT_2025: PacketLayout = PacketLayout {
    header_len: HEADER_SIZE,
    session_weather: 29,
    session_type: 35,
    session_track_id: 36,
    participants_array: 30,
    participant_stride: 58,
    participant_name: 48,
    participant_name_len: 32,
    car_telemetry_stride: 60,
    car_status_stride: 58,
};

impl PacketLayout {
    /// Selects the offset table for a packet format identifier.
    ///
    /// Unknown formats fall back to the newest known table rather than
    /// failing hard: capture and replay pass payloads through untouched
    /// either way, so a wrong table can only degrade the metadata/display
    /// decode, never the recording.
    pub fn for_format(format: u16) -> &'static PacketLayout {
        match format {
            2023..=2025 => &LAYOUT_2025,
            _ => &LAYOUT_2025,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_offsets_follow_the_wire_layout() {
        let layout = PacketLayout::for_format(2025);
        // weather | trackTemp | airTemp | totalLaps | trackLength(u16) |
        // sessionType | trackId
        assert_eq!(layout.session_weather, 29);
        assert_eq!(layout.session_type, 29 + 1 + 1 + 1 + 1 + 2);
        assert_eq!(layout.session_track_id, layout.session_type + 1);
    }

    #[test]
    fn participant_record_geometry() {
        let layout = PacketLayout::for_format(2025);
        assert_eq!(layout.participants_array, layout.header_len + 1);
        assert_eq!(layout.participant_stride, 58);
        assert_eq!(layout.participant_name, 48);
        assert_eq!(layout.participant_name_len, 32);
    }

    #[test]
    fn unknown_formats_fall_back_to_newest_table() {
        assert_eq!(PacketLayout::for_format(2019), &LAYOUT_2025);
        assert_eq!(PacketLayout::for_format(2024), &LAYOUT_2025);
        assert_eq!(PacketLayout::for_format(9999), &LAYOUT_2025);
    }
}
