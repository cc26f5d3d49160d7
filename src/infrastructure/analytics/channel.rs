//! Channel sink that hands events to a background dispatcher task
//!
//! Recording is a non-blocking `try_send` on a bounded queue. A dispatcher
//! task drains the queue into an [`EventTransport`] until every sender is
//! dropped, then reports what it delivered.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::error::AppError;
use crate::core::result::{AppResult, ResultExt};
use crate::services::tracker::{AnalyticsEvent, AnalyticsSink, SessionAnalytics, WalletAnalytics};

/// Asynchronous destination for analytics events
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Deliver one event
    async fn deliver(&self, event: AnalyticsEvent) -> AppResult<()>;
}

/// Transport appending one JSON document per line to a file
#[derive(Debug)]
pub struct JsonLinesTransport {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesTransport {
    /// Open `path` for appending, creating it if needed
    pub async fn create(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_analytics_err("channel", || format!("failed to open {}", path.display()))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// File the transport writes to
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EventTransport for JsonLinesTransport {
    fn name(&self) -> &'static str {
        "json_lines"
    }

    async fn deliver(&self, event: AnalyticsEvent) -> AppResult<()> {
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Transport that only logs, used when no destination is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTransport;

#[async_trait]
impl EventTransport for TracingTransport {
    fn name(&self) -> &'static str {
        "tracing"
    }

    async fn deliver(&self, event: AnalyticsEvent) -> AppResult<()> {
        debug!(event = event.name(), "dispatched analytics event");
        Ok(())
    }
}

/// What a dispatcher task did before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    /// Events the transport accepted
    pub delivered: u64,
    /// Events the transport rejected
    pub failed: u64,
}

/// Sink feeding a bounded queue
#[derive(Debug)]
pub struct ChannelAnalytics {
    sender: mpsc::Sender<AnalyticsEvent>,
    dropped: AtomicU64,
}

impl ChannelAnalytics {
    /// Sink and the receiving end of its queue
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AnalyticsEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                sender,
                dropped: AtomicU64::new(0),
            },
            receiver,
        )
    }

    /// Sink plus a dispatcher task draining it into `transport`.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn spawn(capacity: usize, transport: Arc<dyn EventTransport>) -> (Self, JoinHandle<DispatchSummary>) {
        let (sink, receiver) = Self::new(capacity);
        let handle = tokio::spawn(dispatch(receiver, transport));
        (sink, handle)
    }

    /// Events dropped because the queue was full or closed
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

async fn dispatch(mut receiver: mpsc::Receiver<AnalyticsEvent>, transport: Arc<dyn EventTransport>) -> DispatchSummary {
    info!("📡 Analytics dispatcher started ({})", transport.name());
    let mut summary = DispatchSummary::default();

    while let Some(event) = receiver.recv().await {
        let name = event.name();
        match transport.deliver(event).await {
            Ok(()) => summary.delivered += 1,
            Err(e) => {
                summary.failed += 1;
                warn!(transport = transport.name(), event = name, error = %e, "Failed to deliver analytics event");
            }
        }
    }

    info!(
        "🛑 Analytics dispatcher stopped: {} delivered, {} failed",
        summary.delivered, summary.failed
    );
    summary
}

impl AnalyticsSink for ChannelAnalytics {
    fn name(&self) -> &'static str {
        "channel"
    }

    fn record(&self, event: &AnalyticsEvent) -> AppResult<()> {
        match self.sender.try_send(event.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(AppError::analytics("analytics queue is full").with_sink("channel"))
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(AppError::analytics("analytics dispatcher has stopped").with_sink("channel"))
            }
        }
    }
}

impl WalletAnalytics for ChannelAnalytics {}
impl SessionAnalytics for ChannelAnalytics {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Timestamp;
    use crate::services::tracker::EventMeta;

    fn event(ms: i64) -> AnalyticsEvent {
        AnalyticsEvent::ConnectionAttempt {
            meta: EventMeta::at(Timestamp::from_millis(ms)),
        }
    }

    #[test]
    fn test_full_and_closed_queue_drop_events() {
        let (sink, receiver) = ChannelAnalytics::new(1);
        assert!(sink.record(&event(1)).is_ok());

        let err = sink.record(&event(2)).unwrap_err();
        assert!(err.is_ignorable());
        assert_eq!(sink.dropped(), 1);

        drop(receiver);
        assert!(sink.record(&event(3)).is_err());
        assert_eq!(sink.dropped(), 2);
    }

    #[tokio::test]
    async fn test_dispatcher_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let transport = Arc::new(JsonLinesTransport::create(&path).await.unwrap());

        let (sink, handle) = ChannelAnalytics::spawn(8, transport);
        sink.record(&event(10)).unwrap();
        sink.record(&event(20)).unwrap();
        drop(sink);

        let summary = handle.await.unwrap();
        assert_eq!(summary, DispatchSummary { delivered: 2, failed: 0 });

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<_> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "connection_attempt");
        assert_eq!(first["timestamp"], 10);
    }
}
