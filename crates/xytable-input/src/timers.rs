//! Hold timers backed by tokio tasks

use crate::translator::{HoldTimers, HoldToken};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use xytable_core::Axis;

/// A hold timer fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldElapsed {
    pub axis: Axis,
    pub token: HoldToken,
}

/// Hold timers that sleep in spawned tasks and report on a channel
///
/// A disarmed timer may already have reported; the translator drops such
/// fires by token.
#[derive(Debug, Clone)]
pub struct TokioHoldTimers {
    tx: mpsc::UnboundedSender<HoldElapsed>,
}

impl TokioHoldTimers {
    /// Create the timers and the receiver their fires arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HoldElapsed>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl HoldTimers for TokioHoldTimers {
    type Handle = JoinHandle<()>;

    fn arm(&mut self, axis: Axis, token: HoldToken, delay: Duration) -> JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(HoldElapsed { axis, token });
        })
    }

    fn disarm(&mut self, handle: JoinHandle<()>) {
        handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::{Key, KeyMap};
    use crate::translator::{KeyInput, KeyTranslator, MotionCommand, DEFAULT_HOLD_DELAY};

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let (timers, mut rx) = TokioHoldTimers::new();
        let mut t = KeyTranslator::new(KeyMap::default(), timers, DEFAULT_HOLD_DELAY);
        t.handle_key(KeyInput::down(Key::char('w')));

        tokio::time::sleep(Duration::from_millis(399)).await;
        assert!(rx.try_recv().is_err());

        let fired = tokio::time::timeout(Duration::from_millis(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fired.axis, Axis::Y);
        let commands = t.hold_elapsed(fired.axis, fired.token);
        assert!(matches!(commands.as_slice(), [MotionCommand::Jog(cmd)] if cmd.is_start()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_disarms_timer() {
        let (timers, mut rx) = TokioHoldTimers::new();
        let mut t = KeyTranslator::new(KeyMap::default(), timers, DEFAULT_HOLD_DELAY);
        t.handle_key(KeyInput::down(Key::ArrowLeft));
        tokio::time::sleep(Duration::from_millis(100)).await;
        t.handle_key(KeyInput::up(Key::ArrowLeft));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }
}
