//! Progress channel: one WebSocket per analysis task.
//!
//! The channel runs as a tokio task and forwards everything it sees as
//! [`ChannelMessage`]s tagged with the task id, so the owner of the
//! [`Session`](crate::Session) can drop events from a superseded run.
//! Frames that are not a known JSON event never stop the channel.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{Error, Result};
use crate::types::{ProgressEvent, TaskId};

/// Something that happened on the progress channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Connection established
    Opened,
    /// A well-formed event
    Frame(ProgressEvent),
    /// A frame that is not a known JSON event
    Malformed { error: String },
    /// Connect or transport failure; the channel ends after this
    TransportError(String),
    /// No frame arrived within the idle timeout
    Stalled(Duration),
    /// The connection is gone
    Closed,
}

/// A [`ChannelEvent`] tagged with the task it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    pub task_id: TaskId,
    pub event: ChannelEvent,
}

/// Decode one text frame.
pub fn parse_frame(text: &str) -> ChannelEvent {
    match serde_json::from_str::<ProgressEvent>(text) {
        Ok(event) => ChannelEvent::Frame(event),
        Err(e) => ChannelEvent::Malformed {
            error: e.to_string(),
        },
    }
}

/// Handle to a running progress channel.
///
/// Dropping the handle closes the connection.
#[derive(Debug)]
pub struct ChannelHandle {
    task_id: TaskId,
    task: JoinHandle<()>,
}

impl ChannelHandle {
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Close the connection. No further events are sent.
    pub fn close(&self) {
        self.task.abort();
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Open the progress channel for `task_id` on the current tokio runtime.
pub fn spawn(
    url: String,
    task_id: TaskId,
    idle_timeout: Option<Duration>,
    sink: UnboundedSender<ChannelMessage>,
) -> ChannelHandle {
    spawn_on(
        &tokio::runtime::Handle::current(),
        url,
        task_id,
        idle_timeout,
        sink,
    )
}

/// Open the progress channel on a specific runtime.
pub fn spawn_on(
    runtime: &tokio::runtime::Handle,
    url: String,
    task_id: TaskId,
    idle_timeout: Option<Duration>,
    sink: UnboundedSender<ChannelMessage>,
) -> ChannelHandle {
    let tag = task_id.clone();
    let task = runtime.spawn(async move {
        let emit = |event: ChannelEvent| {
            // The receiver going away just means nobody is listening anymore.
            let _ = sink.send(ChannelMessage {
                task_id: tag.clone(),
                event,
            });
        };
        if let Err(e) = run(&url, idle_timeout, &emit).await {
            tracing::warn!(url = %url, error = %e, "Progress channel failed");
            emit(ChannelEvent::TransportError(e.to_string()));
        }
        emit(ChannelEvent::Closed);
    });
    ChannelHandle { task_id, task }
}

/// Forward frames until the connection ends. Connect and transport
/// failures come back as [`Error::Channel`].
async fn run(
    url: &str,
    idle_timeout: Option<Duration>,
    emit: &impl Fn(ChannelEvent),
) -> Result<()> {
    tracing::info!(url, "Opening progress channel");

    let (mut stream, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| Error::Channel(format!("connect failed: {}", e)))?;
    emit(ChannelEvent::Opened);

    loop {
        let next = match idle_timeout {
            Some(idle) => match tokio::time::timeout(idle, stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    emit(ChannelEvent::Stalled(idle));
                    break;
                }
            },
            None => stream.next().await,
        };

        match next {
            Some(Ok(Message::Text(text))) => emit(parse_frame(&text)),
            Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(text) => emit(parse_frame(text)),
                Err(e) => emit(ChannelEvent::Malformed {
                    error: format!("binary frame is not UTF-8: {}", e),
                }),
            },
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(url, ?frame, "Progress channel closed by server");
                break;
            }
            // Ping/pong are answered by tungstenite itself.
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(Error::Channel(e.to_string())),
            None => break,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_progress() {
        let event = parse_frame(r#"{"type":"progress","progress":10,"stage":"document_conversion","message":"Converting"}"#);
        assert!(matches!(
            event,
            ChannelEvent::Frame(ProgressEvent::Progress { progress: 10, .. })
        ));
    }

    #[test]
    fn test_parse_frame_malformed() {
        assert!(matches!(
            parse_frame("{not json"),
            ChannelEvent::Malformed { .. }
        ));
        assert!(matches!(
            parse_frame(r#"{"type":"mystery"}"#),
            ChannelEvent::Malformed { .. }
        ));
        assert!(matches!(parse_frame(""), ChannelEvent::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_connect_failure_reports_and_closes() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _handle = spawn(
            format!("ws://{}/ws/T1", addr),
            TaskId::from("T1"),
            None,
            tx,
        );

        let first = rx.recv().await.unwrap();
        assert_eq!(first.task_id, TaskId::from("T1"));
        match first.event {
            ChannelEvent::TransportError(message) => {
                assert!(message.starts_with("progress channel error: connect failed"));
            }
            other => panic!("expected a transport error, got {:?}", other),
        }
        assert_eq!(rx.recv().await.unwrap().event, ChannelEvent::Closed);
    }
}
