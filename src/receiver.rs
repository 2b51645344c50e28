//! UDP ingestion pipeline with backpressure shedding.
//!
//! The receiver binds a UDP socket and runs one background task that reads
//! datagrams, decodes the common header, stamps each packet with its receipt
//! time and publishes it to a bounded output queue. The publish is
//! non-blocking by design: when the queue is full the newest packet is shed
//! and counted as an error, so the ingestion loop can never be slowed by a
//! lagging consumer.

use crate::packet::{CapturedPacket, unix_nanos_now};
use crate::{Config, Result, TelemetryError};
use futures::Stream;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

/// Capacity of the bounded packet output queue.
pub const PACKET_QUEUE_CAPACITY: usize = 100;

/// Consecutive socket failures tolerated before the task gives up.
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Receiver configuration, an explicit value with no ambient defaults.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Address to bind, e.g. `0.0.0.0`.
    pub bind_address: String,
    /// UDP port to bind.
    pub port: u16,
    /// Read buffer size; also the largest accepted datagram.
    pub buffer_size: usize,
    /// Per-iteration read deadline so a stop signal is observed promptly.
    pub read_timeout: Duration,
}

impl From<&Config> for ReceiverConfig {
    fn from(config: &Config) -> Self {
        Self {
            bind_address: config.bind_address.clone(),
            port: config.udp_port,
            buffer_size: config.buffer_size,
            read_timeout: config.read_timeout(),
        }
    }
}

/// Ingestion statistics, snapshotted as an independent copy.
#[derive(Debug, Clone)]
pub struct ReceiverStats {
    pub packets_received: u64,
    pub bytes_received: u64,
    /// Malformed headers, socket failures and queue-full drops.
    pub errors: u64,
    pub started_at: Instant,
}

impl ReceiverStats {
    fn fresh() -> Self {
        Self { packets_received: 0, bytes_received: 0, errors: 0, started_at: Instant::now() }
    }
}

enum Lifecycle {
    Idle,
    Running(JoinHandle<()>),
    Stopped,
}

/// Captures the UDP telemetry stream into a bounded packet queue.
///
/// Started once, stopped once (idempotent); a fresh instance is required to
/// capture again.
pub struct Receiver {
    config: ReceiverConfig,
    cancel: CancellationToken,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
    running: AtomicBool,
    stats: Arc<Mutex<ReceiverStats>>,
    packets: Mutex<Option<mpsc::Receiver<Arc<CapturedPacket>>>>,
    local_addr: Mutex<Option<SocketAddr>>,
    last_error: watch::Sender<Option<Arc<TelemetryError>>>,
}

impl Receiver {
    /// Creates a receiver; nothing is bound until [`start`](Self::start).
    pub fn new(config: ReceiverConfig) -> Self {
        let (last_error, _) = watch::channel(None);
        Self {
            config,
            cancel: CancellationToken::new(),
            lifecycle: tokio::sync::Mutex::new(Lifecycle::Idle),
            running: AtomicBool::new(false),
            stats: Arc::new(Mutex::new(ReceiverStats::fresh())),
            packets: Mutex::new(None),
            local_addr: Mutex::new(None),
            last_error,
        }
    }

    /// Binds the UDP socket and launches the ingestion task.
    ///
    /// Fails with a `Configuration` error for an unparseable bind address,
    /// an `Io` error when the bind itself fails (port in use), and a `State`
    /// error when already running or already stopped.
    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        match *lifecycle {
            Lifecycle::Idle => {}
            Lifecycle::Running(_) => return Err(TelemetryError::state("start receiver", "running")),
            Lifecycle::Stopped => return Err(TelemetryError::state("start receiver", "stopped")),
        }

        let bind = format!("{}:{}", self.config.bind_address, self.config.port);
        let addr: SocketAddr = bind
            .parse()
            .map_err(|_| TelemetryError::configuration(format!("invalid bind address {bind}")))?;
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| TelemetryError::io(format!("binding UDP socket {bind}"), e))?;
        let local = socket
            .local_addr()
            .map_err(|e| TelemetryError::io("resolving bound address", e))?;

        *lock(&self.stats) = ReceiverStats::fresh();
        *lock(&self.local_addr) = Some(local);

        let (tx, rx) = mpsc::channel(PACKET_QUEUE_CAPACITY);
        *lock(&self.packets) = Some(rx);

        let task = tokio::spawn(ingest_loop(
            socket,
            self.config.clone(),
            tx,
            Arc::clone(&self.stats),
            self.cancel.clone(),
            self.last_error.clone(),
            Arc::new(FlagGuard(self.cancel.clone())),
        ));

        self.running.store(true, Ordering::Release);
        *lifecycle = Lifecycle::Running(task);
        info!("receiver listening on {local}");
        Ok(())
    }

    /// Signals cancellation, waits for the ingestion task to exit, and only
    /// then lets the output queue close. Idempotent.
    pub async fn stop(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        self.running.store(false, Ordering::Release);
        self.cancel.cancel();

        match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running(task) => {
                // The producer must be fully gone before the queue closes;
                // awaiting the task guarantees its sender half is dropped.
                if let Err(e) = task.await {
                    warn!("ingestion task join failed: {e}");
                }
            }
            Lifecycle::Idle | Lifecycle::Stopped => {}
        }
        Ok(())
    }

    /// Takes the consumer end of the packet queue.
    ///
    /// The queue is single-consumer: the first caller gets it, later calls
    /// return `None`.
    pub fn take_packets(&self) -> Option<mpsc::Receiver<Arc<CapturedPacket>>> {
        lock(&self.packets).take()
    }

    /// Takes the packet queue wrapped as a [`Stream`].
    pub fn take_packet_stream(
        &self,
    ) -> Option<impl Stream<Item = Arc<CapturedPacket>> + Send + 'static> {
        self.take_packets().map(ReceiverStream::new)
    }

    /// Snapshot of the current statistics; available mid-run.
    pub fn stats(&self) -> ReceiverStats {
        lock(&self.stats).clone()
    }

    /// The fatal error that terminated the ingestion task, if any.
    pub fn last_error(&self) -> Option<Arc<TelemetryError>> {
        self.last_error.borrow().clone()
    }

    /// Whether the ingestion task is live.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && !self.cancel.is_cancelled()
    }

    /// The address actually bound, once started. Useful when binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.local_addr)
    }
}

/// Cancels the token when the ingestion task exits for any reason, so
/// `is_running()` reflects a self-terminated task.
struct FlagGuard(CancellationToken);

impl Drop for FlagGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

async fn ingest_loop(
    socket: UdpSocket,
    config: ReceiverConfig,
    tx: mpsc::Sender<Arc<CapturedPacket>>,
    stats: Arc<Mutex<ReceiverStats>>,
    cancel: CancellationToken,
    last_error: watch::Sender<Option<Arc<TelemetryError>>>,
    _exit_guard: Arc<FlagGuard>,
) {
    info!("ingestion task started");
    let mut buf = vec![0u8; config.buffer_size];
    let mut consecutive_errors = 0u32;

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = tokio::time::timeout(config.read_timeout, socket.recv_from(&mut buf)) => read,
        };

        let len = match read {
            // Deadline elapsed with nothing to read; not an error.
            Err(_) => continue,
            Ok(Err(e)) => {
                if cancel.is_cancelled() {
                    break;
                }
                lock(&stats).errors += 1;
                consecutive_errors += 1;
                warn!("socket read failed ({consecutive_errors}/{MAX_CONSECUTIVE_ERRORS}): {e}");
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    let _ = last_error
                        .send(Some(Arc::new(TelemetryError::io("reading UDP socket", e))));
                    break;
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_millis(50)) => continue,
                }
            }
            Ok(Ok((len, _peer))) => len,
        };
        consecutive_errors = 0;

        if len == 0 {
            continue;
        }

        // Copy out of the reusable read buffer and stamp receipt time.
        let packet = match CapturedPacket::new(unix_nanos_now(), buf[..len].to_vec()) {
            Ok(packet) => packet,
            Err(_) => {
                // Undecodable header: discard, count, keep reading.
                lock(&stats).errors += 1;
                continue;
            }
        };

        trace!(
            "packet: id={} format={} len={}",
            packet.header.packet_id, packet.header.packet_format, len
        );
        {
            let mut s = lock(&stats);
            s.packets_received += 1;
            s.bytes_received += len as u64;
        }

        if tx.try_send(Arc::new(packet)).is_err() {
            // Queue full (or consumer gone): shed the newest packet rather
            // than block ingestion.
            lock(&stats).errors += 1;
        }
    }

    info!("ingestion task ended");
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // Critical sections are a few field updates; poisoning means a panic we
    // cannot meaningfully recover from.
    mutex.lock().expect("receiver lock poisoned")
}
