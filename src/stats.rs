//! Active stream statistics
//!
//! A single collector task owns the stream counters. Every mutation is a
//! [`StreamEvent`] sent over a bounded channel, so updates are serialized
//! without shared-memory locking. Readers get snapshots through a `watch`
//! channel.

use crate::helper::STATS_CHANNEL_CAPACITY;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A change in the number of running streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    /// A relay session began
    Started,
    /// A relay session ended
    Stopped,
}

/// Point-in-time view of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Streams currently running
    pub running_streams: u64,
    /// Streams started since the process began
    pub total_streams: u64,
    /// Highest number of concurrently running streams
    pub peak_streams: u64,
}

impl StatsSnapshot {
    /// Apply one event. `Stopped` at zero is a no-op.
    pub fn apply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Started => {
                self.running_streams += 1;
                self.total_streams += 1;
                self.peak_streams = self.peak_streams.max(self.running_streams);
            }
            StreamEvent::Stopped => {
                self.running_streams = self.running_streams.saturating_sub(1);
            }
        }
    }
}

/// Single consumer owning the counters
pub struct StatsCollector {
    events: mpsc::Receiver<StreamEvent>,
    publish: watch::Sender<StatsSnapshot>,
    state: StatsSnapshot,
}

impl StatsCollector {
    /// Create a collector and the handle used to feed and read it
    pub fn new(capacity: usize) -> (Self, StatsHandle) {
        let (tx, events) = mpsc::channel(capacity);
        let (publish, snapshot) = watch::channel(StatsSnapshot::default());
        let collector = StatsCollector {
            events,
            publish,
            state: StatsSnapshot::default(),
        };
        (collector, StatsHandle { tx, snapshot })
    }

    /// Create a collector with the default channel capacity and run it on the current runtime
    pub fn spawn() -> (StatsHandle, JoinHandle<()>) {
        let (collector, handle) = Self::new(STATS_CHANNEL_CAPACITY);
        let task = tokio::spawn(collector.run());
        (handle, task)
    }

    /// Consume events until every handle is dropped
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            self.state.apply(event);
            self.publish.send_replace(self.state);
        }
        debug!("Stats collector stopped");
    }
}

/// Cloneable handle for reporting and reading stream stats
#[derive(Debug, Clone)]
pub struct StatsHandle {
    tx: mpsc::Sender<StreamEvent>,
    snapshot: watch::Receiver<StatsSnapshot>,
}

impl StatsHandle {
    /// Report that a stream started
    pub async fn notify_start(&self) {
        self.send(StreamEvent::Started).await;
    }

    /// Report that a stream ended
    pub async fn notify_end(&self) {
        self.send(StreamEvent::Stopped).await;
    }

    async fn send(&self, event: StreamEvent) {
        if self.tx.send(event).await.is_err() {
            warn!("Stats collector is gone, dropping {:?}", event);
        }
    }

    /// Report a stream start and get a guard that reports its end exactly once
    pub async fn session(&self) -> StreamGuard {
        self.notify_start().await;
        StreamGuard {
            tx: Some(self.tx.clone()),
        }
    }

    /// Latest published counters
    pub fn snapshot(&self) -> StatsSnapshot {
        *self.snapshot.borrow()
    }

    /// Streams currently running
    pub fn running_streams(&self) -> u64 {
        self.snapshot().running_streams
    }

    /// Receiver notified on every counter change
    pub fn subscribe(&self) -> watch::Receiver<StatsSnapshot> {
        self.snapshot.clone()
    }
}

/// RAII guard for one running stream
///
/// Sends [`StreamEvent::Stopped`] once, either from [`StreamGuard::finish`]
/// or on drop.
#[derive(Debug)]
pub struct StreamGuard {
    tx: Option<mpsc::Sender<StreamEvent>>,
}

impl StreamGuard {
    /// Report the end of the stream, waiting for channel capacity
    pub async fn finish(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(StreamEvent::Stopped).await;
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };

        match tx.try_send(StreamEvent::Stopped) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(event)) => match Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        let _ = tx.send(event).await;
                    });
                }
                Err(_) => warn!("Stats channel full outside a runtime, stream end lost"),
            },
        }
    }
}
