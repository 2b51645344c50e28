//! Packet header decoding and captured-packet types.
//!
//! Every datagram the game emits starts with the same 29-byte little-endian
//! header. Decoding that header is the only interpretation the capture path
//! performs; packet bodies stay opaque and are preserved byte-for-byte through
//! recording and replay. Body decoding for the two packet kinds the session
//! detector needs, and for the display path, lives in [`car`] and uses the
//! versioned offset tables in [`layout`].

pub mod car;
pub mod layout;

use crate::{Result, TelemetryError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Size of the common packet header in bytes.
pub const HEADER_SIZE: usize = 29;

/// Known packet kinds, identified by the one-byte `packet_id` header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    Motion = 0,
    Session = 1,
    LapData = 2,
    Event = 3,
    Participants = 4,
    CarSetups = 5,
    CarTelemetry = 6,
    CarStatus = 7,
    FinalClassification = 8,
    LobbyInfo = 9,
    CarDamage = 10,
    SessionHistory = 11,
    TyreSets = 12,
    MotionEx = 13,
}

impl PacketKind {
    /// Maps a raw packet ID to a known kind, if any.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(PacketKind::Motion),
            1 => Some(PacketKind::Session),
            2 => Some(PacketKind::LapData),
            3 => Some(PacketKind::Event),
            4 => Some(PacketKind::Participants),
            5 => Some(PacketKind::CarSetups),
            6 => Some(PacketKind::CarTelemetry),
            7 => Some(PacketKind::CarStatus),
            8 => Some(PacketKind::FinalClassification),
            9 => Some(PacketKind::LobbyInfo),
            10 => Some(PacketKind::CarDamage),
            11 => Some(PacketKind::SessionHistory),
            12 => Some(PacketKind::TyreSets),
            13 => Some(PacketKind::MotionEx),
            _ => None,
        }
    }

    /// Human-readable name for a raw packet ID, for the display path.
    pub fn name(id: u8) -> &'static str {
        match Self::from_id(id) {
            Some(PacketKind::Motion) => "Motion",
            Some(PacketKind::Session) => "Session",
            Some(PacketKind::LapData) => "Lap Data",
            Some(PacketKind::Event) => "Event",
            Some(PacketKind::Participants) => "Participants",
            Some(PacketKind::CarSetups) => "Car Setups",
            Some(PacketKind::CarTelemetry) => "Car Telemetry",
            Some(PacketKind::CarStatus) => "Car Status",
            Some(PacketKind::FinalClassification) => "Final Classification",
            Some(PacketKind::LobbyInfo) => "Lobby Info",
            Some(PacketKind::CarDamage) => "Car Damage",
            Some(PacketKind::SessionHistory) => "Session History",
            Some(PacketKind::TyreSets) => "Tyre Sets",
            Some(PacketKind::MotionEx) => "Motion Ex",
            None => "Unknown",
        }
    }
}

/// The common header shared by every telemetry packet.
///
/// Decoded from the first [`HEADER_SIZE`] bytes of a datagram; immutable once
/// decoded. All multi-byte fields are little-endian at fixed offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketHeader {
    pub packet_format: u16,
    pub game_year: u8,
    pub game_major_version: u8,
    pub game_minor_version: u8,
    pub packet_version: u8,
    pub packet_id: u8,
    pub session_uid: u64,
    pub session_time: f32,
    pub frame_identifier: u32,
    pub overall_frame_identifier: u32,
    pub player_car_index: u8,
    pub secondary_player_car_index: u8,
}

impl PacketHeader {
    /// Decodes the common header from the start of a raw datagram.
    ///
    /// Pure function with no side effects. Fails with a `Protocol` error when
    /// fewer than [`HEADER_SIZE`] bytes are available.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(TelemetryError::protocol(format!(
                "packet too short for header: {} bytes (need {})",
                data.len(),
                HEADER_SIZE
            )));
        }

        Ok(Self {
            packet_format: u16_le(data, 0),
            game_year: data[2],
            game_major_version: data[3],
            game_minor_version: data[4],
            packet_version: data[5],
            packet_id: data[6],
            session_uid: u64_le(data, 7),
            // IEEE-754 value reconstructed from its raw little-endian bit
            // pattern; portable across targets.
            session_time: f32::from_le_bytes([data[15], data[16], data[17], data[18]]),
            frame_identifier: u32_le(data, 19),
            overall_frame_identifier: u32_le(data, 23),
            player_car_index: data[27],
            secondary_player_car_index: data[28],
        })
    }

    /// The packet kind this header announces, if known.
    pub fn kind(&self) -> Option<PacketKind> {
        PacketKind::from_id(self.packet_id)
    }
}

/// A raw packet stamped with its receipt time and decoded header.
///
/// Created by the receiver on network arrival, or by the player on read-back
/// from a recording. Never mutated after creation; ownership transfers through
/// bounded queues as `Arc<CapturedPacket>`.
#[derive(Debug, Clone)]
pub struct CapturedPacket {
    /// Receipt time (or recorded timestamp on replay) in Unix nanoseconds.
    pub received_at_nanos: i64,
    /// The raw datagram, byte-for-byte as received.
    pub payload: Vec<u8>,
    /// Header decoded from the first 29 payload bytes.
    pub header: PacketHeader,
}

impl CapturedPacket {
    /// Stamps and wraps a raw datagram, decoding its header.
    ///
    /// Fails with a `Protocol` error when the payload cannot carry a header;
    /// such datagrams are discarded by the ingestion path.
    pub fn new(received_at_nanos: i64, payload: Vec<u8>) -> Result<Self> {
        let header = PacketHeader::decode(&payload)?;
        Ok(Self { received_at_nanos, payload, header })
    }

    /// The packet kind, if the ID is one this crate knows about.
    pub fn kind(&self) -> Option<PacketKind> {
        self.header.kind()
    }
}

/// Current wall-clock time as Unix nanoseconds.
pub(crate) fn unix_nanos_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

// Offsets are validated by the length check in `PacketHeader::decode`.
fn u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn u64_le(data: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
        data[offset + 4],
        data[offset + 5],
        data[offset + 6],
        data[offset + 7],
    ])
}
