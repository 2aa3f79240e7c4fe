//! Event system for the operator console
//!
//! Provides:
//! - Event types for connection, position and jog state changes
//! - Event dispatcher for publishing events to subscribers

use crate::connection::ConnectionState;
use crate::types::{Axis, DigitalOutput, Position, QuickMoveIncrement};
use tokio::sync::broadcast;

/// Console event types
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleEvent {
    /// Connection state label changed
    ConnectionChanged(ConnectionState),
    /// Backend reported a new table position
    PositionChanged(Position),
    /// An axis started or stopped jogging
    JogStateChanged {
        /// Axis whose jog state changed
        axis: Axis,
        /// Whether the axis is now jogging
        jogging: bool,
    },
    /// The selected quick-move increment changed
    IncrementChanged(QuickMoveIncrement),
    /// A digital output was switched
    OutputChanged {
        /// Output that was switched
        output: DigitalOutput,
        /// New state
        state: bool,
    },
    /// The backend rejected a command; the reason is shown verbatim
    CommandRejected(String),
    /// A status banner for the operator (transport failures)
    Banner(String),
}

impl std::fmt::Display for ConsoleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsoleEvent::ConnectionChanged(state) => write!(f, "Connection: {}", state),
            ConsoleEvent::PositionChanged(pos) => write!(f, "Position: {}", pos),
            ConsoleEvent::JogStateChanged { axis, jogging } => {
                if *jogging {
                    write!(f, "Jogging {}", axis)
                } else {
                    write!(f, "Stopped {}", axis)
                }
            }
            ConsoleEvent::IncrementChanged(inc) => write!(f, "Increment: {}", inc),
            ConsoleEvent::OutputChanged { output, state } => {
                write!(f, "Output {}: {}", output, if *state { "ON" } else { "OFF" })
            }
            ConsoleEvent::CommandRejected(reason) => write!(f, "Rejected: {}", reason),
            ConsoleEvent::Banner(msg) => write!(f, "{}", msg),
        }
    }
}

/// Event dispatcher for publishing events to subscribers
#[derive(Clone)]
pub struct EventDispatcher {
    /// Broadcast sender channel for console events.
    tx: broadcast::Sender<ConsoleEvent>,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    ///
    /// # Arguments
    /// * `buffer_size` - Size of the broadcast buffer (default 100)
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size);
        Self { tx }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<ConsoleEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of subscribers that received it; publishing with
    /// no subscribers is not an error for the console.
    pub fn publish(&self, event: ConsoleEvent) -> usize {
        tracing::trace!("event: {}", event);
        self.tx.send(event).unwrap_or(0)
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let dispatcher = EventDispatcher::default();
        let mut rx = dispatcher.subscribe();
        assert_eq!(dispatcher.subscriber_count(), 1);

        let delivered = dispatcher.publish(ConsoleEvent::JogStateChanged {
            axis: Axis::Y,
            jogging: true,
        });
        assert_eq!(delivered, 1);
        assert_eq!(
            rx.recv().await.unwrap(),
            ConsoleEvent::JogStateChanged {
                axis: Axis::Y,
                jogging: true
            }
        );
    }

    #[test]
    fn test_publish_without_subscribers() {
        let dispatcher = EventDispatcher::default();
        assert_eq!(dispatcher.publish(ConsoleEvent::Banner("x".into())), 0);
    }
}
