//! Session metadata detection from the live packet stream.
//!
//! The detector consumes a best-effort duplicate of the raw packet stream and
//! opportunistically extracts who is driving where: the Session packet (ID 1)
//! names the track, session type and weather; the Participants packet (ID 4)
//! carries the player's name. Each kind is parsed at most once, and the
//! detector terminates as soon as both have been seen, when its input ends,
//! or when the detection window elapses — it never blocks ingestion and
//! never waits indefinitely.

pub mod tables;

use crate::packet::layout::PacketLayout;
use crate::packet::{CapturedPacket, PacketKind};
use crate::{Result, TelemetryError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Fallback player name when the participants packet yields nothing usable.
pub const DEFAULT_PLAYER_NAME: &str = "Player";

/// Queue depth for the detector's duplicate packet feed.
const DETECTOR_QUEUE_CAPACITY: usize = 100;

/// Session and player metadata extracted from the packet stream.
///
/// Built incrementally by the detector; immutable once `has_info` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    pub player_name: String,
    pub track_name: String,
    pub session_type: String,
    pub weather: String,
    /// True once both the Session and Participants packets were parsed.
    pub has_info: bool,
}

impl SessionInfo {
    /// Builds a descriptive filename stem from the collected metadata.
    ///
    /// Concatenates track, session type (omitted when "Unknown"), player name
    /// (omitted when the default) and weather (omitted when "Clear") with
    /// underscores; when every part is omitted the literal `"session"` is
    /// returned.
    pub fn filename_stem(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();

        if !self.track_name.is_empty() {
            parts.push(&self.track_name);
        }
        if !self.session_type.is_empty() && self.session_type != "Unknown" {
            parts.push(&self.session_type);
        }
        if !self.player_name.is_empty() && self.player_name != DEFAULT_PLAYER_NAME {
            parts.push(&self.player_name);
        }
        if !self.weather.is_empty() && self.weather != "Clear" {
            parts.push(&self.weather);
        }

        if parts.is_empty() {
            "session".to_string()
        } else {
            parts.join("_")
        }
    }

    /// Parses track, session type and weather from a Session packet body.
    fn apply_session_packet(&mut self, packet: &CapturedPacket) {
        let layout = PacketLayout::for_format(packet.header.packet_format);
        let data = &packet.payload;
        if data.len() <= layout.session_track_id {
            return;
        }

        self.weather = tables::weather_name(data[layout.session_weather]).to_string();
        self.session_type = tables::session_type_name(data[layout.session_type]).to_string();
        self.track_name = tables::track_name(data[layout.session_track_id] as i8);

        debug!(
            "session packet parsed: track={}, type={}, weather={}",
            self.track_name, self.session_type, self.weather
        );
    }

    /// Parses the player's name from a Participants packet body.
    fn apply_participants_packet(&mut self, packet: &CapturedPacket) {
        let layout = PacketLayout::for_format(packet.header.packet_format);
        let data = &packet.payload;

        let record_start = layout.participants_array
            + usize::from(packet.header.player_car_index) * layout.participant_stride;
        let name_start = record_start + layout.participant_name;
        let Some(name_bytes) = data.get(name_start..name_start + layout.participant_name_len)
        else {
            return;
        };

        let raw = null_terminated_str(name_bytes);
        self.player_name = sanitize_name(&raw);
        debug!("participants packet parsed: player={}", self.player_name);
    }
}

impl fmt::Display for SessionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_info {
            return write!(f, "No session info available");
        }

        let mut parts = Vec::new();
        if !self.player_name.is_empty() {
            parts.push(format!("Player: {}", self.player_name));
        }
        if !self.track_name.is_empty() {
            parts.push(format!("Track: {}", self.track_name));
        }
        if !self.session_type.is_empty() {
            parts.push(format!("Session: {}", self.session_type));
        }
        if !self.weather.is_empty() {
            parts.push(format!("Weather: {}", self.weather));
        }
        write!(f, "{}", parts.join(" | "))
    }
}

/// Makes a player name safe for use in a recording filename.
///
/// Trims whitespace, maps spaces to underscores, strips every character
/// outside `[A-Za-z0-9_-]`, and falls back to [`DEFAULT_PLAYER_NAME`] when
/// nothing survives.
pub fn sanitize_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();

    if cleaned.is_empty() {
        DEFAULT_PLAYER_NAME.to_string()
    } else {
        cleaned
    }
}

fn null_terminated_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Short-lived background task that watches a duplicate packet stream for
/// session metadata.
///
/// Feed it via [`offer`](Self::offer) — a non-blocking duplicate publish that
/// can never slow the ingestion path — and collect the result with
/// [`wait`](Self::wait).
pub struct SessionDetector {
    feed: mpsc::Sender<Arc<CapturedPacket>>,
    task: JoinHandle<Result<SessionInfo>>,
}

impl SessionDetector {
    /// Spawns the detection task with the given detection window.
    pub fn spawn(window: Duration) -> Self {
        let (feed, rx) = mpsc::channel(DETECTOR_QUEUE_CAPACITY);
        let task = tokio::spawn(detect(rx, window));
        Self { feed, task }
    }

    /// Offers one packet to the detector.
    ///
    /// Non-blocking: when the detector's queue is full or the detector has
    /// already finished, the packet is simply not duplicated. Detection is
    /// best-effort by design.
    pub fn offer(&self, packet: &Arc<CapturedPacket>) {
        let _ = self.feed.try_send(Arc::clone(packet));
    }

    /// Waits for detection to finish and returns the collected metadata.
    ///
    /// Dropping all feed handles ends the input stream; the detector then
    /// returns whatever it has, with `has_info` reflecting completeness. An
    /// elapsed window without both packet kinds yields a `Timeout` error.
    pub async fn wait(self) -> Result<SessionInfo> {
        // Dropping our feed half lets the task observe end-of-stream.
        drop(self.feed);
        self.task.await.map_err(|e| {
            TelemetryError::io("joining session detector task", std::io::Error::other(e))
        })?
    }
}

async fn detect(
    mut rx: mpsc::Receiver<Arc<CapturedPacket>>,
    window: Duration,
) -> Result<SessionInfo> {
    let mut info = SessionInfo::default();
    let mut session_seen = false;
    let mut participants_seen = false;

    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                warn!("session detection window elapsed after {:?}", window);
                return Err(TelemetryError::Timeout { duration: window });
            }
            packet = rx.recv() => {
                let Some(packet) = packet else {
                    // Input stream ended; return what we have.
                    return Ok(info);
                };
                match packet.kind() {
                    Some(PacketKind::Session) if !session_seen => {
                        info.apply_session_packet(&packet);
                        session_seen = true;
                    }
                    Some(PacketKind::Participants) if !participants_seen => {
                        info.apply_participants_packet(&packet);
                        participants_seen = true;
                    }
                    _ => {}
                }
                if session_seen && participants_seen {
                    info.has_info = true;
                    info!("session detected: {}", info);
                    return Ok(info);
                }
            }
        }
    }
}
