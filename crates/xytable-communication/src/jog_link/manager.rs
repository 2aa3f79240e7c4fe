//! Jog link lifecycle
//!
//! The manager owns at most one link. The link lives only while the control
//! system is connected, and commands sent while it is not ready are dropped.

use super::protocol::{JogCommand, JogReply};
use super::transport::{JogTransport, LinkEvent, LinkEventKind, LinkHandle, LinkId};
use std::time::Duration;
use tokio::sync::mpsc;

/// Reaction the owner of the manager must apply after a link event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkOutcome {
    /// Every jogging flag must be cleared
    pub clear_jog_state: bool,
    /// Call [`JogLinkManager::ensure_link`] again after this delay
    pub reopen_after: Option<Duration>,
}

/// Owner of the single jog link
pub struct JogLinkManager<T: JogTransport> {
    transport: T,
    events: mpsc::UnboundedSender<LinkEvent>,
    link: Option<LinkHandle>,
    ready: bool,
    reopen_delay: Duration,
}

impl<T: JogTransport> JogLinkManager<T> {
    /// Create a manager; link events are delivered on `events`
    pub fn new(
        transport: T,
        events: mpsc::UnboundedSender<LinkEvent>,
        reopen_delay: Duration,
    ) -> Self {
        Self {
            transport,
            events,
            link: None,
            ready: false,
            reopen_delay,
        }
    }

    /// Open a link if connected and none exists; close it if not connected
    pub fn ensure_link(&mut self, connected: bool) {
        if !connected {
            self.close();
            return;
        }
        if self.link.is_some() {
            return;
        }

        let id = LinkId::new();
        tracing::info!("Opening jog link {}", id);
        self.link = Some(self.transport.open(id, self.events.clone()));
        self.ready = false;
    }

    /// Close and discard the current link
    pub fn close(&mut self) {
        if let Some(link) = self.link.take() {
            tracing::info!("Closing jog link {}", link.id());
            link.close();
        }
        self.ready = false;
    }

    /// Close the link, giving queued commands up to `grace` to be written
    pub async fn shutdown(&mut self, grace: Duration) {
        if let Some(link) = self.link.take() {
            tracing::info!("Shutting down jog link {}", link.id());
            link.finish(grace).await;
        }
        self.ready = false;
    }

    /// Transmit a command if the link is open and ready
    ///
    /// Returns whether the command was handed to the link. Commands are
    /// never queued.
    pub fn send_jog(&self, command: &JogCommand) -> bool {
        let link = match (&self.link, self.ready) {
            (Some(link), true) => link,
            _ => {
                tracing::debug!("Jog link not ready, dropping {:?}", command);
                return false;
            }
        };

        let text = match serde_json::to_string(command) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to encode jog command: {}", e);
                return false;
            }
        };
        tracing::debug!("-> jog {}", text);
        link.send(text)
    }

    /// Apply a link lifecycle event
    ///
    /// Events from links other than the current one are ignored.
    pub fn handle_event(&mut self, event: LinkEvent, connected: bool) -> LinkOutcome {
        if self.current_id() != Some(event.link) {
            tracing::trace!("Ignoring event from stale jog link {}", event.link);
            return LinkOutcome::default();
        }

        match event.kind {
            LinkEventKind::Opened => {
                tracing::info!("Jog link {} open", event.link);
                self.ready = true;
                LinkOutcome::default()
            }
            LinkEventKind::Message(text) => {
                log_reply(&text);
                LinkOutcome::default()
            }
            LinkEventKind::Error(reason) => {
                tracing::warn!("Jog link error: {}", reason);
                self.ready = false;
                LinkOutcome {
                    clear_jog_state: true,
                    reopen_after: None,
                }
            }
            LinkEventKind::Closed => {
                tracing::warn!("Jog link {} closed", event.link);
                self.link = None;
                self.ready = false;
                LinkOutcome {
                    clear_jog_state: true,
                    reopen_after: connected.then_some(self.reopen_delay),
                }
            }
        }
    }

    /// Whether a link exists (opening or open)
    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// Whether the link accepts commands
    pub fn is_ready(&self) -> bool {
        self.link.is_some() && self.ready
    }

    pub fn current_id(&self) -> Option<LinkId> {
        self.link.as_ref().map(LinkHandle::id)
    }

    pub fn reopen_delay(&self) -> Duration {
        self.reopen_delay
    }
}

fn log_reply(text: &str) {
    match serde_json::from_str::<JogReply>(text) {
        Ok(reply) if reply.is_ok() => tracing::debug!("<- jog ok: {}", reply.message),
        Ok(reply) => tracing::warn!("<- jog {}: {}", reply.status, reply.message),
        Err(_) => tracing::debug!("<- jog raw: {}", text),
    }
}
