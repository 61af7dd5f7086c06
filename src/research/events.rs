//! The ordered, cancelable event channel of a run
//!
//! Producers (stage code, fetch sub-tasks, the token consumer) write
//! [`EventPayload`]s through cloned [`EventSink`]s into one bounded mpsc
//! channel. The single consumer pulls them through [`EventStream`], which
//! stamps each event with the next sequence number as it is handed out, so
//! numbering follows delivery order and has no gaps.
//!
//! Dropping the [`EventStream`] aborts the task driving the run. Everything
//! the driver owns (fetch tasks, the token stream, the transport) is dropped
//! with it.

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Running,
    Success,
    Error,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Running => "running",
            ToolStatus::Success => "success",
            ToolStatus::Error => "error",
        }
    }
}

/// Body of one stream event, serialized as `{"type": ..., "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    StageStart {
        invocation_id: String,
        name: String,
        message: String,
    },
    StageEnd {
        invocation_id: String,
        status: ToolStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },
    TextChunk {
        message_id: String,
        content: String,
    },
    MessageComplete {
        message_id: String,
        content: String,
    },
    PipelineEnd {
        session_id: String,
    },
    Error {
        code: String,
        message: String,
        #[serde(default)]
        details: serde_json::Value,
    },
}

impl EventPayload {
    /// Wire name of the event type
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::StageStart { .. } => "stage_start",
            EventPayload::StageEnd { .. } => "stage_end",
            EventPayload::TextChunk { .. } => "text_chunk",
            EventPayload::MessageComplete { .. } => "message_complete",
            EventPayload::PipelineEnd { .. } => "pipeline_end",
            EventPayload::Error { .. } => "error",
        }
    }

    /// Whether no further events follow this one in a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventPayload::PipelineEnd { .. } | EventPayload::Error { .. }
        )
    }
}

/// One event as delivered to the consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamEvent {
    /// Per-run position, starting at 1
    pub sequence: u64,
    #[serde(flatten)]
    pub payload: EventPayload,
}

/// The consumer is gone; the run must stop emitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event stream closed by consumer")]
pub struct StreamClosed;

/// Write half of a run's event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<EventPayload>,
}

impl EventSink {
    /// Enqueue one event, waiting for buffer space if the consumer lags.
    pub async fn emit(&self, payload: EventPayload) -> Result<(), StreamClosed> {
        self.tx.send(payload).await.map_err(|_| StreamClosed)
    }

    pub async fn text_chunk(&self, message_id: &str, content: impl Into<String>) -> Result<(), StreamClosed> {
        self.emit(EventPayload::TextChunk {
            message_id: message_id.to_string(),
            content: content.into(),
        })
        .await
    }

    pub async fn message_complete(&self, message_id: &str, content: impl Into<String>) -> Result<(), StreamClosed> {
        self.emit(EventPayload::MessageComplete {
            message_id: message_id.to_string(),
            content: content.into(),
        })
        .await
    }

    pub async fn pipeline_end(&self, session_id: &str) -> Result<(), StreamClosed> {
        self.emit(EventPayload::PipelineEnd {
            session_id: session_id.to_string(),
        })
        .await
    }

    pub async fn error(
        &self,
        code: &str,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Result<(), StreamClosed> {
        self.emit(EventPayload::Error {
            code: code.to_string(),
            message: message.into(),
            details,
        })
        .await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Read half of a run's event channel.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<EventPayload>,
    next_sequence: u64,
    driver: Option<JoinHandle<()>>,
}

/// Create a connected sink/stream pair with no driver task attached.
pub fn channel(buffer: usize) -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (
        EventSink { tx },
        EventStream {
            rx,
            next_sequence: 1,
            driver: None,
        },
    )
}

/// Run `producer` on its own task, returning the stream of what it emits.
///
/// The stream ends once the producer returns and every sink clone it handed
/// out has been dropped. Dropping the stream early aborts the producer.
pub fn spawn_stream<F, Fut>(buffer: usize, producer: F) -> EventStream
where
    F: FnOnce(EventSink) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (sink, mut stream) = channel(buffer);
    stream.driver = Some(tokio::spawn(producer(sink)));
    stream
}

impl EventStream {
    /// Pull the next event, or `None` at end-of-stream.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        let payload = self.rx.recv().await?;
        Some(self.stamp(payload))
    }

    /// Stop the producer and discard anything still buffered.
    ///
    /// After this returns, [`next_event`](Self::next_event) yields `None`.
    pub fn cancel(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }

    fn stamp(&mut self, payload: EventPayload) -> StreamEvent {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        StreamEvent { sequence, payload }
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(payload)) => Poll::Ready(Some(self.stamp(payload))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let event = StreamEvent {
            sequence: 3,
            payload: EventPayload::StageStart {
                invocation_id: "call_1".to_string(),
                name: "searching".to_string(),
                message: "Searching the web".to_string(),
            },
        };

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "sequence": 3,
                "type": "stage_start",
                "data": {
                    "invocation_id": "call_1",
                    "name": "searching",
                    "message": "Searching the web"
                }
            })
        );
    }

    #[test]
    fn test_stage_end_omits_empty_fields() {
        let payload = EventPayload::StageEnd {
            invocation_id: "call_2".to_string(),
            status: ToolStatus::Success,
            result: None,
            error: None,
            metadata: None,
        };

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"type": "stage_end", "data": {"invocation_id": "call_2", "status": "success"}})
        );
    }

    #[test]
    fn test_payload_round_trips_by_tag() {
        let value = json!({"type": "pipeline_end", "data": {"session_id": "s1"}});
        let payload: EventPayload = serde_json::from_value(value).unwrap();
        assert_eq!(payload.kind(), "pipeline_end");
        assert!(payload.is_terminal());
    }

    #[tokio::test]
    async fn test_sequence_starts_at_one_and_is_gap_free() {
        let stream = spawn_stream(4, |sink| async move {
            for i in 0..10 {
                sink.text_chunk("m1", i.to_string()).await.unwrap();
            }
        });

        let sequences: Vec<u64> = stream.map(|e| e.sequence).collect().await;
        assert_eq!(sequences, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_concurrent_producers_share_one_sequence() {
        let stream = spawn_stream(2, |sink| async move {
            let mut handles = Vec::new();
            for p in 0..4 {
                let sink = sink.clone();
                handles.push(tokio::spawn(async move {
                    for i in 0..5 {
                        let _ = sink.text_chunk(&format!("m{p}"), i.to_string()).await;
                    }
                }));
            }
            for handle in handles {
                let _ = handle.await;
            }
        });

        let events: Vec<StreamEvent> = stream.collect().await;
        assert_eq!(events.len(), 20);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.sequence, i as u64 + 1);
        }
    }

    #[tokio::test]
    async fn test_drop_aborts_producer() {
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();

        let mut stream = spawn_stream(1, |sink| async move {
            let _guard = done_tx;
            loop {
                if sink.text_chunk("m", "x").await.is_err() {
                    break;
                }
            }
        });

        assert!(stream.next_event().await.is_some());
        drop(stream);

        // The producer's guard is dropped once the task is aborted
        let result = tokio::time::timeout(std::time::Duration::from_secs(1), done_rx).await;
        assert!(matches!(result, Ok(Err(_))));
    }

    #[tokio::test]
    async fn test_cancel_discards_buffered_events() {
        let (sink, mut stream) = channel(8);
        sink.text_chunk("m", "a").await.unwrap();
        sink.text_chunk("m", "b").await.unwrap();

        stream.cancel();

        assert!(stream.next_event().await.is_none());
        assert_eq!(sink.text_chunk("m", "c").await, Err(StreamClosed));
    }

    #[tokio::test]
    async fn test_emit_after_close_reports_stream_closed() {
        let (sink, stream) = channel(1);
        drop(stream);
        assert_eq!(sink.pipeline_end("s").await, Err(StreamClosed));
        assert!(sink.is_closed());
    }
}
