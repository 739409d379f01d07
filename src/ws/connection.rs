use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use tokio::time::interval;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::config::{RECONNECT_BACKOFF_MS, WS_PING_INTERVAL_SECS};
use crate::engine::{Engine, IngestMode};
use crate::error::Result;
use crate::types::ListType;

/// The single persistent push-feed connection. Every frame is handed to
/// `Engine::ingest` in arrival order.
pub struct FeedConnection {
    feed_url: String,
    subscribe_msg: Option<String>,
    list_type: ListType,
    engine: Arc<Engine>,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
    /// Total frames received since process start.
    frames_received: AtomicU64,
    /// Per-mode counters for the periodic flow log.
    dumps: AtomicU64,
    updates: AtomicU64,
}

impl FeedConnection {
    pub fn new(
        feed_url: String,
        subscribe_msg: Option<String>,
        list_type: ListType,
        engine: Arc<Engine>,
        health: Arc<HealthState>,
        latency: Arc<LatencyStats>,
    ) -> Self {
        Self {
            feed_url,
            subscribe_msg,
            list_type,
            engine,
            health,
            latency,
            frames_received: AtomicU64::new(0),
            dumps: AtomicU64::new(0),
            updates: AtomicU64::new(0),
        }
    }

    pub async fn run(self) {
        let mut backoff_idx = 0usize;

        loop {
            info!("[FEED] connecting to {}", self.feed_url);
            match self.connect_once().await {
                Ok(()) => {
                    info!("[FEED] connection closed cleanly");
                    backoff_idx = 0;
                }
                Err(e) => {
                    error!("[FEED] connection error: {e}");
                }
            }
            self.health.set_feed_connected(false);

            let delay_ms = RECONNECT_BACKOFF_MS
                .get(backoff_idx)
                .or(RECONNECT_BACKOFF_MS.last())
                .copied()
                .unwrap_or(1000);
            backoff_idx = (backoff_idx + 1).min(RECONNECT_BACKOFF_MS.len().saturating_sub(1));

            warn!("[FEED] reconnecting in {delay_ms}ms");
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    async fn connect_once(&self) -> Result<()> {
        let (ws_stream, _) = connect_async(&self.feed_url).await?;
        let (mut write, mut read) = ws_stream.split();

        // Each connection is a new upstream session; its first dump replaces
        // whatever the previous session left in the buckets.
        self.engine.route_dumps(self.list_type.clone(), true);

        if let Some(msg) = &self.subscribe_msg {
            write.send(Message::Text(msg.clone().into())).await?;
            debug!("[FEED] subscribe message sent");
        }
        self.health.set_feed_connected(true);

        let mut ping_interval = interval(Duration::from_secs(WS_PING_INTERVAL_SECS));
        ping_interval.tick().await; // consume immediate first tick

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_frame(text.as_bytes()),
                        Some(Ok(Message::Binary(bytes))) => self.handle_frame(&bytes),
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return Ok(());
                        }
                        Some(Err(e)) => return Err(e.into()),
                        Some(Ok(_)) => {}
                    }
                }

                _ = ping_interval.tick() => {
                    debug!("[FEED] ping");
                    write.send(Message::Ping(vec![].into())).await?;
                }
            }
        }
    }

    fn handle_frame(&self, raw: &[u8]) {
        let received_at = Instant::now();
        let report = self.engine.ingest(raw);
        self.latency.record(received_at.elapsed());
        self.health.set_last_envelope_at_ns(now_ns());

        match report.mode {
            IngestMode::InitialDump => {
                self.dumps.fetch_add(1, Ordering::Relaxed);
                info!(
                    applied = report.stats.applied,
                    ignored = report.stats.ignored,
                    dropped = report.dropped,
                    "[FEED] initial dump ingested"
                );
            }
            IngestMode::Update => {
                self.updates.fetch_add(1, Ordering::Relaxed);
            }
            IngestMode::Rejected => {}
        }

        let total_frames = self.frames_received.fetch_add(1, Ordering::Relaxed) + 1;
        if total_frames % 500 == 0 {
            let dumps = self.dumps.load(Ordering::Relaxed);
            let updates = self.updates.load(Ordering::Relaxed);
            info!(
                frames = total_frames,
                dumps,
                updates,
                "[FEED] {total_frames} frames | dumps={dumps} updates={updates}"
            );
        }
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
