//! Jog link transports
//!
//! A transport opens one duplex text connection and reports its lifecycle
//! as [`LinkEvent`]s tagged with the link's [`LinkId`]. Outbound text is
//! written through the returned [`LinkHandle`].

use futures_util::{SinkExt, StreamExt};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use uuid::Uuid;
use xytable_core::ConnectionError;

/// Identity of one link instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(Uuid);

impl LinkId {
    /// Generate a fresh id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What happened on a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEventKind {
    /// The connection is established and ready for commands
    Opened,
    /// A text frame arrived
    Message(String),
    /// The connection failed; a `Closed` event follows
    Error(String),
    /// The connection is gone
    Closed,
}

/// Lifecycle event of a link instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    /// Link that produced the event
    pub link: LinkId,
    /// Event kind
    pub kind: LinkEventKind,
}

impl LinkEvent {
    pub fn new(link: LinkId, kind: LinkEventKind) -> Self {
        Self { link, kind }
    }
}

/// Outbound side of an open link
///
/// Dropping or closing the handle ends the connection after queued frames
/// are written. A link closed this way reports no further events.
#[derive(Debug)]
pub struct LinkHandle {
    id: LinkId,
    outbound: mpsc::UnboundedSender<String>,
    task: Option<JoinHandle<()>>,
}

impl LinkHandle {
    pub fn new(id: LinkId, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id,
            outbound,
            task: None,
        }
    }

    /// Attach the task driving the connection
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Queue a text frame; returns false if the connection task has ended
    pub fn send(&self, text: String) -> bool {
        self.outbound.send(text).is_ok()
    }

    /// Close the connection
    pub fn close(self) {
        drop(self);
    }

    /// Close the connection and wait up to `grace` for queued frames to flush
    pub async fn finish(self, grace: Duration) {
        let LinkHandle { outbound, task, .. } = self;
        drop(outbound);
        if let Some(task) = task {
            if tokio::time::timeout(grace, task).await.is_err() {
                tracing::debug!("Jog link did not close within {:?}", grace);
            }
        }
    }
}

/// Opens jog links
pub trait JogTransport: Send + Sync {
    /// Start opening a link; progress is reported on `events`
    fn open(&self, id: LinkId, events: mpsc::UnboundedSender<LinkEvent>) -> LinkHandle;
}

/// WebSocket jog link transport
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    /// Create a transport connecting to a `ws://` URL
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl JogTransport for WebSocketTransport {
    fn open(&self, id: LinkId, events: mpsc::UnboundedSender<LinkEvent>) -> LinkHandle {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_websocket(self.url.clone(), id, events, outbound_rx));
        LinkHandle::new(id, outbound_tx).with_task(task)
    }
}

async fn run_websocket(
    url: String,
    id: LinkId,
    events: mpsc::UnboundedSender<LinkEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    let emit = |kind: LinkEventKind| {
        let _ = events.send(LinkEvent::new(id, kind));
    };

    tracing::debug!("Opening jog link {} to {}", id, url);
    let stream = tokio::select! {
        result = connect_async(url.as_str()) => match result {
            Ok((stream, _response)) => stream,
            Err(e) => {
                emit(link_error(&e));
                emit(LinkEventKind::Closed);
                return;
            }
        },
        _ = async { while outbound.recv().await.is_some() {} } => {
            tracing::debug!("Jog link {} abandoned while connecting", id);
            return;
        }
    };

    emit(LinkEventKind::Opened);
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            outgoing = outbound.recv() => match outgoing {
                Some(text) => {
                    if let Err(e) = sink.send(WsMessage::Text(text)).await {
                        emit(link_error(&e));
                        break;
                    }
                }
                None => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    tracing::debug!("Jog link {} closed locally", id);
                    return;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => emit(LinkEventKind::Message(text)),
                Some(Ok(WsMessage::Close(frame))) => {
                    tracing::debug!("Jog link {} closed by peer: {:?}", id, frame);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    emit(link_error(&e));
                    break;
                }
                None => break,
            }
        }
    }

    emit(LinkEventKind::Closed);
}

fn link_error(e: &impl fmt::Display) -> LinkEventKind {
    LinkEventKind::Error(
        ConnectionError::WebSocket {
            reason: e.to_string(),
        }
        .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_errors_are_labelled() {
        assert_eq!(
            link_error(&"connection reset"),
            LinkEventKind::Error("WebSocket error: connection reset".into())
        );
    }

    #[test]
    fn test_link_ids_are_unique() {
        assert_ne!(LinkId::new(), LinkId::new());
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = LinkHandle::new(LinkId::new(), tx);
        assert!(handle.send("a".into()));
        drop(rx);
        assert!(!handle.send("b".into()));
    }
}
