//! Bounded asynchronous fan-out to channel transports
//!
//! Deliveries go through a bounded queue into a single worker task. The
//! worker runs each delivery on its own task, limited by a semaphore, and
//! wraps every transport call in a timeout. Enqueueing never waits: when the
//! queue is full the delivery is dropped and counted, so backpressure shows
//! up in `DeliveryStats` instead of stalling whoever raised the alert.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::models::Channel;

use super::channels::ChannelTransport;
use super::render::RenderedMessage;

/// Fan-out tuning
#[derive(Debug, Clone)]
pub struct FanoutConfig {
    /// Pending deliveries held before new ones are dropped
    pub queue_capacity: usize,
    /// Deliveries in flight at once
    pub max_concurrency: usize,
    /// Per-call transport timeout
    pub send_timeout: Duration,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_concurrency: 8,
            send_timeout: Duration::from_secs(10),
        }
    }
}

/// One message for one channel
#[derive(Debug, Clone)]
pub struct Delivery {
    pub user_id: i64,
    pub channel: Channel,
    pub message: RenderedMessage,
}

/// Delivery counters
#[derive(Debug, Default)]
pub struct DeliveryStats {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of `DeliveryStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStatsSnapshot {
    pub enqueued: u64,
    pub delivered: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub dropped: u64,
}

impl DeliveryStats {
    pub fn snapshot(&self) -> DeliveryStatsSnapshot {
        DeliveryStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

enum Command {
    Deliver(Delivery),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the fan-out worker. Cheap to clone.
#[derive(Clone)]
pub struct FanoutQueue {
    tx: mpsc::Sender<Command>,
    stats: Arc<DeliveryStats>,
    channels: Arc<Vec<Channel>>,
}

impl FanoutQueue {
    /// Spawn the worker. Must be called from within a tokio runtime.
    pub fn start(transports: Vec<Arc<dyn ChannelTransport>>, config: FanoutConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let stats = Arc::new(DeliveryStats::default());

        let by_channel: HashMap<Channel, Arc<dyn ChannelTransport>> = transports
            .into_iter()
            .map(|t| (t.channel(), t))
            .collect();
        let channels = Arc::new(by_channel.keys().copied().collect::<Vec<_>>());

        info!(
            channels = ?channels,
            capacity = config.queue_capacity,
            concurrency = config.max_concurrency,
            "Starting notification fan-out"
        );

        tokio::spawn(run_worker(rx, by_channel, config, stats.clone()));

        Self {
            tx,
            stats,
            channels,
        }
    }

    /// Whether a transport is registered for `channel`
    pub fn has_channel(&self, channel: Channel) -> bool {
        self.channels.contains(&channel)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Queue a delivery without waiting. Returns false if it was dropped.
    pub fn enqueue(&self, delivery: Delivery) -> bool {
        let channel = delivery.channel;
        match self.tx.try_send(Command::Deliver(delivery)) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(channel = channel.as_str(), "Fan-out queue full, delivery dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(channel = channel.as_str(), "Fan-out stopped, delivery dropped");
                false
            }
        }
    }

    /// Wait until everything queued before this call has finished
    pub async fn flush(&self) {
        let (reply, done) = oneshot::channel();
        if self.tx.send(Command::Flush(reply)).await.is_ok() {
            let _ = done.await;
        }
    }

    /// Finish queued deliveries and stop the worker
    pub async fn shutdown(&self) {
        let (reply, done) = oneshot::channel();
        if self.tx.send(Command::Shutdown(reply)).await.is_ok() {
            let _ = done.await;
        }
    }

    pub fn stats(&self) -> DeliveryStatsSnapshot {
        self.stats.snapshot()
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<Command>,
    transports: HashMap<Channel, Arc<dyn ChannelTransport>>,
    config: FanoutConfig,
    stats: Arc<DeliveryStats>,
) {
    let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
    let mut in_flight = JoinSet::new();

    while let Some(command) = rx.recv().await {
        // Reap finished deliveries so the set does not grow unbounded
        while in_flight.try_join_next().is_some() {}

        match command {
            Command::Deliver(delivery) => {
                let Some(transport) = transports.get(&delivery.channel).cloned() else {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        channel = delivery.channel.as_str(),
                        "No transport registered for channel"
                    );
                    continue;
                };
                let Ok(permit) = permits.clone().acquire_owned().await else {
                    break;
                };
                let stats = stats.clone();
                let send_timeout = config.send_timeout;

                in_flight.spawn(async move {
                    let _permit = permit;
                    deliver(transport, delivery, send_timeout, &stats).await;
                });
            }
            Command::Flush(reply) => {
                while in_flight.join_next().await.is_some() {}
                let _ = reply.send(());
            }
            Command::Shutdown(reply) => {
                while in_flight.join_next().await.is_some() {}
                info!("Notification fan-out stopped");
                let _ = reply.send(());
                return;
            }
        }
    }

    while in_flight.join_next().await.is_some() {}
}

async fn deliver(
    transport: Arc<dyn ChannelTransport>,
    delivery: Delivery,
    send_timeout: Duration,
    stats: &DeliveryStats,
) {
    let channel = delivery.channel.as_str();
    let notification_id = delivery.message.notification_id;

    match timeout(send_timeout, transport.send(delivery.user_id, &delivery.message)).await {
        Ok(Ok(())) => {
            stats.delivered.fetch_add(1, Ordering::Relaxed);
            debug!(channel, notification_id, "Notification delivered");
        }
        Ok(Err(e)) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            warn!(channel, notification_id, error = %e, "Channel delivery failed");
        }
        Err(_) => {
            stats.timed_out.fetch_add(1, Ordering::Relaxed);
            warn!(
                channel,
                notification_id,
                timeout_ms = send_timeout.as_millis() as u64,
                "Channel delivery timed out"
            );
        }
    }
}
