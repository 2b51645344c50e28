//! Replays a recording over UDP with original timing.
//!
//! One background task walks the recording entries, sleeps the recorded gap
//! between consecutive packets (scaled by the speed factor) and sends each
//! payload to the target address. Pausing parks the task on a state
//! notification rather than polling, and reaching the end of the recording
//! stops playback on its own.

use crate::f1tr::RecordingReader;
use crate::packet::CapturedPacket;
use crate::{Result, TelemetryError};
use futures::Stream;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capacity of the bounded replayed-packet queue.
pub const REPLAY_QUEUE_CAPACITY: usize = 100;

/// Externally visible playback state.
///
/// `Stopped` is terminal: a player that reached it (by request, by error or
/// by running out of entries) cannot be started again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Stopped,
    Running,
    Paused,
}

/// Playback statistics, snapshotted as an independent copy.
#[derive(Debug, Clone)]
pub struct PlayerStats {
    pub packets_played: u64,
    pub bytes_sent: u64,
    /// Send failures and queue-full drops on the replay queue.
    pub errors: u64,
    pub started_at: Instant,
    /// Offset into the recording, relative to its first entry.
    pub position_nanos: i64,
}

impl PlayerStats {
    fn fresh() -> Self {
        Self {
            packets_played: 0,
            bytes_sent: 0,
            errors: 0,
            started_at: Instant::now(),
            position_nanos: 0,
        }
    }
}

#[derive(Debug)]
enum Lifecycle {
    Idle,
    Running(JoinHandle<()>),
    Stopped,
}

/// Replays an F1TR recording file to a UDP target.
#[derive(Debug)]
pub struct Player {
    file_path: PathBuf,
    target: String,
    cancel: CancellationToken,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
    state: watch::Sender<PlayerState>,
    paused: watch::Sender<bool>,
    speed: watch::Sender<f64>,
    stats: Arc<Mutex<PlayerStats>>,
    packets: Mutex<Option<mpsc::Receiver<Arc<CapturedPacket>>>>,
    last_error: watch::Sender<Option<Arc<TelemetryError>>>,
}

impl Player {
    /// Creates a player; the recording is opened by [`start`](Self::start).
    ///
    /// The speed factor scales the recorded gaps (2.0 plays twice as fast)
    /// and must be a positive finite number.
    pub fn new<P: AsRef<Path>>(
        file_path: P,
        target_address: &str,
        target_port: u16,
        speed: f64,
    ) -> Result<Self> {
        validate_speed(speed)?;
        let (state, _) = watch::channel(PlayerState::Stopped);
        let (paused, _) = watch::channel(false);
        let (speed, _) = watch::channel(speed);
        let (last_error, _) = watch::channel(None);
        Ok(Self {
            file_path: file_path.as_ref().to_path_buf(),
            target: format!("{target_address}:{target_port}"),
            cancel: CancellationToken::new(),
            lifecycle: tokio::sync::Mutex::new(Lifecycle::Idle),
            state,
            paused,
            speed,
            stats: Arc::new(Mutex::new(PlayerStats::fresh())),
            packets: Mutex::new(None),
            last_error,
        })
    }

    /// Opens the recording, connects the outbound socket and launches the
    /// playback task.
    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        match *lifecycle {
            Lifecycle::Idle => {}
            // A player that ran out of entries (or failed) parked itself in
            // Stopped without going through stop(); report that, not Running.
            Lifecycle::Running(_) if self.state() == PlayerState::Stopped => {
                return Err(TelemetryError::state("start player", "stopped"));
            }
            Lifecycle::Running(_) => return Err(TelemetryError::state("start player", "running")),
            Lifecycle::Stopped => return Err(TelemetryError::state("start player", "stopped")),
        }

        let reader = RecordingReader::open(&self.file_path)?;
        let target: SocketAddr = self.target.parse().map_err(|_| {
            TelemetryError::configuration(format!("invalid target address {}", self.target))
        })?;
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| TelemetryError::io("binding outbound UDP socket", e))?;
        socket
            .connect(target)
            .await
            .map_err(|e| TelemetryError::io(format!("connecting to {target}"), e))?;

        *lock(&self.stats) = PlayerStats::fresh();
        let (tx, rx) = mpsc::channel(REPLAY_QUEUE_CAPACITY);
        *lock(&self.packets) = Some(rx);

        let task = tokio::spawn(playback_loop(
            reader,
            socket,
            tx,
            Arc::clone(&self.stats),
            self.cancel.clone(),
            self.paused.subscribe(),
            self.speed.subscribe(),
            self.state.clone(),
            self.last_error.clone(),
        ));

        let _ = self.state.send(PlayerState::Running);
        *lifecycle = Lifecycle::Running(task);
        info!("playing {} to {target}", self.file_path.display());
        Ok(())
    }

    /// Suspends playback until [`resume`](Self::resume). Requires a running
    /// player.
    pub fn pause(&self) -> Result<()> {
        if self.state() != PlayerState::Running {
            return Err(TelemetryError::state("pause player", state_name(self.state())));
        }
        let _ = self.paused.send(true);
        let _ = self.state.send(PlayerState::Paused);
        debug!("playback paused");
        Ok(())
    }

    /// Resumes a paused player.
    pub fn resume(&self) -> Result<()> {
        if self.state() != PlayerState::Paused {
            return Err(TelemetryError::state("resume player", state_name(self.state())));
        }
        let _ = self.paused.send(false);
        let _ = self.state.send(PlayerState::Running);
        debug!("playback resumed");
        Ok(())
    }

    /// Changes the speed factor; takes effect from the next inter-packet gap.
    pub fn set_speed(&self, speed: f64) -> Result<()> {
        validate_speed(speed)?;
        let _ = self.speed.send(speed);
        Ok(())
    }

    /// Stops playback and waits for the task to exit. Idempotent and
    /// terminal.
    pub async fn stop(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        self.cancel.cancel();
        // Unpark a paused task so it can observe the cancellation.
        let _ = self.paused.send(false);

        match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running(task) => {
                if let Err(e) = task.await {
                    warn!("playback task join failed: {e}");
                }
            }
            Lifecycle::Idle | Lifecycle::Stopped => {}
        }
        let _ = self.state.send(PlayerState::Stopped);
        Ok(())
    }

    /// Current playback state.
    pub fn state(&self) -> PlayerState {
        *self.state.borrow()
    }

    /// Subscribes to state changes.
    pub fn watch_state(&self) -> watch::Receiver<PlayerState> {
        self.state.subscribe()
    }

    /// Takes the consumer end of the replayed-packet queue (single consumer).
    pub fn take_packets(&self) -> Option<mpsc::Receiver<Arc<CapturedPacket>>> {
        lock(&self.packets).take()
    }

    /// Takes the replayed-packet queue wrapped as a [`Stream`].
    pub fn take_packet_stream(
        &self,
    ) -> Option<impl Stream<Item = Arc<CapturedPacket>> + Send + 'static> {
        self.take_packets().map(ReceiverStream::new)
    }

    /// Snapshot of the current statistics; available mid-run.
    pub fn stats(&self) -> PlayerStats {
        lock(&self.stats).clone()
    }

    /// The error that terminated playback early, if any.
    pub fn last_error(&self) -> Option<Arc<TelemetryError>> {
        self.last_error.borrow().clone()
    }
}

fn validate_speed(speed: f64) -> Result<()> {
    if !(speed > 0.0) || !speed.is_finite() {
        return Err(TelemetryError::configuration(format!(
            "invalid playback speed: {speed} (must be a positive finite number)"
        )));
    }
    Ok(())
}

fn state_name(state: PlayerState) -> &'static str {
    match state {
        PlayerState::Stopped => "stopped",
        PlayerState::Running => "running",
        PlayerState::Paused => "paused",
    }
}

#[allow(clippy::too_many_arguments)]
async fn playback_loop(
    mut reader: RecordingReader,
    socket: UdpSocket,
    tx: mpsc::Sender<Arc<CapturedPacket>>,
    stats: Arc<Mutex<PlayerStats>>,
    cancel: CancellationToken,
    mut paused: watch::Receiver<bool>,
    speed: watch::Receiver<f64>,
    state: watch::Sender<PlayerState>,
    last_error: watch::Sender<Option<Arc<TelemetryError>>>,
) {
    let mut first_ts: Option<i64> = None;
    let mut prev_ts: Option<i64> = None;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let entry = match reader.read_next_entry() {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                info!("recording finished after {} entries", reader.entries_read());
                break;
            }
            Err(e) => {
                warn!("playback aborted: {e}");
                let _ = last_error.send(Some(Arc::new(e)));
                break;
            }
        };

        // The first entry plays immediately; later entries wait out the
        // recorded gap, scaled by the current speed factor.
        if let Some(prev) = prev_ts {
            let gap = (entry.timestamp_nanos - prev).max(0) as f64 / *speed.borrow();
            let delay = Duration::from_nanos(gap as u64);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        // Pause gate: park on the notification until resumed or cancelled.
        while *paused.borrow() {
            tokio::select! {
                _ = cancel.cancelled() => return,
                changed = paused.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
        if cancel.is_cancelled() {
            break;
        }

        if let Err(e) = socket.send(&entry.payload).await {
            warn!("playback send failed: {e}");
            lock(&stats).errors += 1;
            let _ = last_error.send(Some(Arc::new(TelemetryError::io("sending packet", e))));
            break;
        }

        let first = *first_ts.get_or_insert(entry.timestamp_nanos);
        {
            let mut s = lock(&stats);
            s.packets_played += 1;
            s.bytes_sent += entry.payload.len() as u64;
            s.position_nanos = entry.timestamp_nanos - first;
        }
        prev_ts = Some(entry.timestamp_nanos);

        // Mirror the replayed packet to local consumers. Like the capture
        // path, a failure here is dropped and counted, never fatal.
        match CapturedPacket::new(entry.timestamp_nanos, entry.payload) {
            Ok(packet) => {
                if tx.try_send(Arc::new(packet)).is_err() {
                    lock(&stats).errors += 1;
                }
            }
            Err(_) => lock(&stats).errors += 1,
        }
    }

    let _ = state.send(PlayerState::Stopped);
    cancel.cancel();
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // Critical sections are a few field updates; poisoning means a panic we
    // cannot meaningfully recover from.
    mutex.lock().expect("player lock poisoned")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::f1tr::format::{FileHeader, encode_entry_framing};
    use crate::packet::HEADER_SIZE;
    use std::io::Write;

    fn payload(packet_id: u8) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE + 4];
        buf[0..2].copy_from_slice(&2025u16.to_le_bytes());
        buf[6] = packet_id;
        buf
    }

    fn write_recording(dir: &Path, entries: &[(i64, Vec<u8>)]) -> PathBuf {
        let path = dir.join("test.f1tr");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&FileHeader::new().encode()).unwrap();
        for (ts, payload) in entries {
            file.write_all(&encode_entry_framing(*ts, payload.len() as u32)).unwrap();
            file.write_all(payload).unwrap();
        }
        path
    }

    #[test]
    fn rejects_non_positive_speed() {
        assert!(matches!(
            Player::new("x.f1tr", "127.0.0.1", 20777, 0.0).unwrap_err(),
            TelemetryError::Configuration { .. }
        ));
        assert!(Player::new("x.f1tr", "127.0.0.1", 20777, -1.0).is_err());
        assert!(Player::new("x.f1tr", "127.0.0.1", 20777, f64::NAN).is_err());
        assert!(Player::new("x.f1tr", "127.0.0.1", 20777, f64::INFINITY).is_err());
    }

    #[tokio::test]
    async fn missing_file_fails_on_start() {
        let dir = tempfile::tempdir().unwrap();
        let player =
            Player::new(dir.path().join("nope.f1tr"), "127.0.0.1", 20777, 1.0).unwrap();
        assert!(matches!(player.start().await.unwrap_err(), TelemetryError::Io { .. }));
    }

    #[tokio::test]
    async fn plays_entries_in_order_and_stops_at_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_recording(
            dir.path(),
            &[(1_000, payload(1)), (1_001_000, payload(6)), (2_002_000, payload(7))],
        );

        let sink = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = sink.local_addr().unwrap();
        let player =
            Player::new(&path, "127.0.0.1", target.port(), 50.0).unwrap();
        player.start().await.unwrap();

        let mut buf = [0u8; 256];
        for expected_id in [1u8, 6, 7] {
            let len = sink.recv(&mut buf).await.unwrap();
            assert_eq!(len, HEADER_SIZE + 4);
            assert_eq!(buf[6], expected_id);
        }

        // EOF stops playback without an explicit stop call.
        let mut state = player.watch_state();
        while *state.borrow_and_update() != PlayerState::Stopped {
            state.changed().await.unwrap();
        }

        let stats = player.stats();
        assert_eq!(stats.packets_played, 3);
        assert_eq!(stats.bytes_sent, 3 * (HEADER_SIZE + 4) as u64);
        assert_eq!(stats.position_nanos, 2_001_000);
        assert!(player.last_error().is_none());

        player.stop().await.unwrap();
        assert!(matches!(player.start().await.unwrap_err(), TelemetryError::State { .. }));
    }

    #[tokio::test]
    async fn pause_holds_the_next_packet_until_resume() {
        let dir = tempfile::tempdir().unwrap();
        let gap_ns = 150_000_000;
        let path =
            write_recording(dir.path(), &[(0, payload(1)), (gap_ns, payload(2))]);

        let sink = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = sink.local_addr().unwrap();
        let player = Player::new(&path, "127.0.0.1", target.port(), 1.0).unwrap();
        player.start().await.unwrap();

        let mut buf = [0u8; 256];
        sink.recv(&mut buf).await.unwrap();
        assert_eq!(buf[6], 1);

        player.pause().unwrap();
        assert_eq!(player.state(), PlayerState::Paused);

        // Nothing arrives while paused, even past the recorded gap.
        let held =
            tokio::time::timeout(Duration::from_millis(400), sink.recv(&mut buf)).await;
        assert!(held.is_err());
        assert_eq!(player.stats().packets_played, 1);

        player.resume().unwrap();
        sink.recv(&mut buf).await.unwrap();
        assert_eq!(buf[6], 2);

        player.stop().await.unwrap();
    }

    #[tokio::test]
    async fn pause_and_resume_require_the_matching_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_recording(dir.path(), &[(0, payload(1))]);
        let player = Player::new(&path, "127.0.0.1", 20777, 1.0).unwrap();

        // Not started yet: both transitions are invalid.
        assert!(matches!(player.pause().unwrap_err(), TelemetryError::State { .. }));
        assert!(matches!(player.resume().unwrap_err(), TelemetryError::State { .. }));
    }

    #[tokio::test]
    async fn truncated_recording_surfaces_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_recording(dir.path(), &[(0, payload(1))]);
        // Chop the tail so the single entry's payload is incomplete.
        let data = std::fs::read(&path).unwrap();
        std::fs::write(&path, &data[..data.len() - 2]).unwrap();

        let sink = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let player =
            Player::new(&path, "127.0.0.1", sink.local_addr().unwrap().port(), 1.0).unwrap();
        player.start().await.unwrap();

        let mut state = player.watch_state();
        while *state.borrow_and_update() != PlayerState::Stopped {
            state.changed().await.unwrap();
        }
        let err = player.last_error().unwrap();
        assert!(matches!(*err, TelemetryError::Format { .. }));
        player.stop().await.unwrap();
    }

    #[tokio::test]
    async fn sub_header_payloads_still_replay_but_count_a_mirror_error() {
        let dir = tempfile::tempdir().unwrap();
        // A legal recording whose single payload is too short to carry the
        // common packet header.
        let path = write_recording(dir.path(), &[(0, vec![0xEE; 10])]);

        let sink = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let player =
            Player::new(&path, "127.0.0.1", sink.local_addr().unwrap().port(), 1.0).unwrap();
        player.start().await.unwrap();
        let mut mirror = player.take_packets().unwrap();

        // The wire still carries the payload byte-for-byte.
        let mut buf = [0u8; 256];
        let len = sink.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[0xEE; 10]);

        let mut state = player.watch_state();
        while *state.borrow_and_update() != PlayerState::Stopped {
            state.changed().await.unwrap();
        }

        // Nothing reached the mirror queue, and the drop was counted.
        assert!(mirror.recv().await.is_none());
        let stats = player.stats();
        assert_eq!(stats.packets_played, 1);
        assert_eq!(stats.errors, 1);
        player.stop().await.unwrap();
    }

    #[tokio::test]
    async fn restart_after_eof_reports_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_recording(dir.path(), &[(0, payload(1))]);

        let sink = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let player =
            Player::new(&path, "127.0.0.1", sink.local_addr().unwrap().port(), 1.0).unwrap();
        player.start().await.unwrap();

        let mut state = player.watch_state();
        while *state.borrow_and_update() != PlayerState::Stopped {
            state.changed().await.unwrap();
        }

        // Self-terminated, never explicitly stopped: the error must name the
        // state the caller observes.
        let err = player.start().await.unwrap_err();
        assert!(matches!(err, TelemetryError::State { state: "stopped", .. }));
        player.stop().await.unwrap();
    }

    #[tokio::test]
    async fn set_speed_validates_like_new() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_recording(dir.path(), &[(0, payload(1))]);
        let player = Player::new(&path, "127.0.0.1", 20777, 1.0).unwrap();
        assert!(player.set_speed(4.0).is_ok());
        assert!(matches!(
            player.set_speed(0.0).unwrap_err(),
            TelemetryError::Configuration { .. }
        ));
    }
}
