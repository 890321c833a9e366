use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Level, warn};

const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub(crate) struct SpanSummary {
    pub(crate) name: String,
    pub(crate) fields: BTreeMap<String, String>,
}

/// One log event worth alerting on, with fields already redacted.
#[derive(Debug, Clone)]
pub(crate) struct AlertEvent {
    pub(crate) level: Level,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
    pub(crate) target: String,
    pub(crate) location: Option<String>,
    pub(crate) message: Option<String>,
    pub(crate) fields: BTreeMap<String, String>,
    pub(crate) spans: Vec<SpanSummary>,
}

#[async_trait]
pub(crate) trait AlertSink: Send + Sync {
    async fn deliver(&self, event: &AlertEvent) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Hands events to a background task through a bounded queue. Logging never waits on
/// a sink: when the queue is full the event is dropped.
#[derive(Clone)]
pub(crate) struct AlertDispatcher {
    tx: mpsc::Sender<AlertEvent>,
}

impl AlertDispatcher {
    pub(crate) fn spawn(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        let (tx, mut rx) = mpsc::channel::<AlertEvent>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                for sink in &sinks {
                    if let Err(err) = sink.deliver(&event).await {
                        warn!(sink = sink.name(), error = %err, "observability: alert delivery failed");
                    }
                }
            }
        });

        Self { tx }
    }

    pub(crate) fn dispatch(&self, event: AlertEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("observability: alert queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("observability: alert queue closed, dropping event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct CapturingSink {
        messages: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl AlertSink for CapturingSink {
        async fn deliver(&self, event: &AlertEvent) -> Result<()> {
            self.messages.lock().unwrap().push(event.message.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "capturing"
        }
    }

    #[tokio::test]
    async fn dispatched_events_reach_every_sink() {
        let sink = Arc::new(CapturingSink::default());
        let dispatcher = AlertDispatcher::spawn(vec![sink.clone() as Arc<dyn AlertSink>]);

        dispatcher.dispatch(AlertEvent {
            level: Level::ERROR,
            timestamp: Utc::now(),
            service_name: "backend".to_string(),
            environment: "test".to_string(),
            component: "backend".to_string(),
            target: "tests".to_string(),
            location: None,
            message: Some("reconciliation: callback handling failed".to_string()),
            fields: BTreeMap::new(),
            spans: Vec::new(),
        });

        for _ in 0..50 {
            if !sink.messages.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(
            sink.messages.lock().unwrap().as_slice(),
            &[Some("reconciliation: callback handling failed".to_string())]
        );
    }
}
