//! Tap/hold translation of key events into motion commands
//!
//! Each axis runs its own state machine:
//!
//! ```text
//!            key down               hold timer / key repeat
//!   Idle ───────────────▶ PendingHold ───────────────────────▶ Jogging
//!    ▲      (tap move,        │                                  │
//!    │       arm timer)       │ key up (disarm timer)            │ key up (stop)
//!    └────────────────────────┴──────────────────────────────────┘
//! ```
//!
//! The hold timer handle lives inside `PendingHold`, so every exit from
//! that state disarms it. Timer fires carry a [`HoldToken`]; a fire whose
//! token no longer matches is stale and ignored.

use crate::keymap::{Key, KeyAction, KeyMap};
use std::time::Duration;
use xytable_communication::JogCommand;
use xytable_core::{Axis, AxisKey, DigitalOutput, Direction, QuickMoveIncrement};

/// Delay after which a held key starts continuous jogging
pub const DEFAULT_HOLD_DELAY: Duration = Duration::from_millis(400);

/// Phase of a key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPhase {
    /// Initial press
    Down,
    /// OS auto-repeat while held
    Repeat,
    /// Release
    Up,
}

/// A key event with its focus context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub phase: KeyPhase,
    /// Focus is on a text input
    pub in_text_field: bool,
}

impl KeyInput {
    pub fn new(key: Key, phase: KeyPhase) -> Self {
        Self {
            key,
            phase,
            in_text_field: false,
        }
    }

    pub fn down(key: Key) -> Self {
        Self::new(key, KeyPhase::Down)
    }

    pub fn repeat(key: Key) -> Self {
        Self::new(key, KeyPhase::Repeat)
    }

    pub fn up(key: Key) -> Self {
        Self::new(key, KeyPhase::Up)
    }

    pub fn in_text_field(mut self, focused: bool) -> Self {
        self.in_text_field = focused;
        self
    }
}

/// Command produced by the translator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionCommand {
    /// One-shot relative move over the request/response API
    TapMove { axis: Axis, distance: f64 },
    /// Start or stop over the jog link
    Jog(JogCommand),
    /// Switch a digital output over the request/response API
    SetOutput { output: DigitalOutput, state: bool },
}

/// Identity of one armed hold timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HoldToken(u64);

impl HoldToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Timer service used for hold detection
///
/// An armed timer reports `(axis, token)` back to the owner, which calls
/// [`KeyTranslator::hold_elapsed`].
pub trait HoldTimers {
    /// Handle that cancels the timer
    type Handle;

    fn arm(&mut self, axis: Axis, token: HoldToken, delay: Duration) -> Self::Handle;

    fn disarm(&mut self, handle: Self::Handle);
}

/// Observable phase of one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisPhase {
    Idle,
    PendingHold,
    Jogging,
}

enum Session<H> {
    Idle,
    PendingHold {
        direction: Direction,
        token: HoldToken,
        timer: H,
    },
    Jogging {
        direction: Direction,
    },
}

struct AxisState<H> {
    session: Session<H>,
    /// Keys holding the session, activating key first
    held: Vec<Key>,
}

impl<H> AxisState<H> {
    fn idle() -> Self {
        Self {
            session: Session::Idle,
            held: Vec::new(),
        }
    }

    fn direction(&self) -> Option<Direction> {
        match self.session {
            Session::Idle => None,
            Session::PendingHold { direction, .. } | Session::Jogging { direction } => {
                Some(direction)
            }
        }
    }
}

/// Per-axis tap/hold state machines
pub struct KeyTranslator<T: HoldTimers> {
    keymap: KeyMap,
    timers: T,
    hold_delay: Duration,
    increment: QuickMoveIncrement,
    axes: [AxisState<T::Handle>; 2],
    next_token: u64,
}

impl<T: HoldTimers> KeyTranslator<T> {
    pub fn new(keymap: KeyMap, timers: T, hold_delay: Duration) -> Self {
        Self {
            keymap,
            timers,
            hold_delay,
            increment: QuickMoveIncrement::default(),
            axes: [AxisState::idle(), AxisState::idle()],
            next_token: 0,
        }
    }

    /// Translate one key event
    ///
    /// Releases are always processed. Presses and repeats are ignored while
    /// focus is on a text input.
    pub fn handle_key(&mut self, input: KeyInput) -> Vec<MotionCommand> {
        let action = match self.keymap.resolve(input.key) {
            Some(action) => action,
            None => return Vec::new(),
        };
        let key = input.key.normalized();

        if input.in_text_field && input.phase != KeyPhase::Up {
            return Vec::new();
        }

        match (action, input.phase) {
            (KeyAction::Move(axis_key), KeyPhase::Down) => self.press(key, axis_key),
            (KeyAction::Move(axis_key), KeyPhase::Repeat) => self.repeat(key, axis_key),
            (KeyAction::Move(axis_key), KeyPhase::Up) => self.release(key, axis_key.axis),
            (KeyAction::Output { output, state }, KeyPhase::Down) => {
                vec![MotionCommand::SetOutput { output, state }]
            }
            (KeyAction::Output { .. }, _) => Vec::new(),
        }
    }

    fn press(&mut self, key: Key, axis_key: AxisKey) -> Vec<MotionCommand> {
        let axis = axis_key.axis;
        let state = &mut self.axes[axis.index()];

        match state.direction() {
            None => {
                let token = HoldToken(self.next_token);
                self.next_token += 1;
                let timer = self.timers.arm(axis, token, self.hold_delay);
                state.session = Session::PendingHold {
                    direction: axis_key.direction,
                    token,
                    timer,
                };
                state.held.clear();
                state.held.push(key);

                let distance = self.increment.value() * axis_key.direction.sign();
                tracing::debug!("Tap {} by {}", axis, distance);
                vec![MotionCommand::TapMove { axis, distance }]
            }
            Some(direction) if direction == axis_key.direction => {
                if !state.held.contains(&key) {
                    state.held.push(key);
                }
                Vec::new()
            }
            Some(_) => {
                tracing::debug!("Ignoring {} while {} is busy", key, axis);
                Vec::new()
            }
        }
    }

    fn repeat(&mut self, key: Key, axis_key: AxisKey) -> Vec<MotionCommand> {
        let axis = axis_key.axis;
        let state = &self.axes[axis.index()];
        let pending_here = matches!(
            state.session,
            Session::PendingHold { direction, .. } if direction == axis_key.direction
        );
        if !pending_here || !state.held.contains(&key) {
            return Vec::new();
        }
        self.begin_jog(axis)
    }

    /// Report that the hold timer of `axis` fired
    pub fn hold_elapsed(&mut self, axis: Axis, token: HoldToken) -> Vec<MotionCommand> {
        match self.axes[axis.index()].session {
            Session::PendingHold { token: armed, .. } if armed == token => self.begin_jog(axis),
            _ => {
                tracing::trace!("Stale hold timer {} for {}", token.value(), axis);
                Vec::new()
            }
        }
    }

    fn begin_jog(&mut self, axis: Axis) -> Vec<MotionCommand> {
        let state = &mut self.axes[axis.index()];
        let previous = std::mem::replace(&mut state.session, Session::Idle);
        let direction = match previous {
            Session::PendingHold {
                direction, timer, ..
            } => {
                self.timers.disarm(timer);
                direction
            }
            other => {
                state.session = other;
                return Vec::new();
            }
        };

        state.session = Session::Jogging { direction };
        tracing::debug!("Jog {} {} at {}", axis, direction, self.increment);
        vec![MotionCommand::Jog(JogCommand::start(
            axis,
            direction,
            self.increment.value(),
        ))]
    }

    fn release(&mut self, key: Key, axis: Axis) -> Vec<MotionCommand> {
        let state = &mut self.axes[axis.index()];
        let Some(pos) = state.held.iter().position(|k| *k == key) else {
            return Vec::new();
        };
        state.held.remove(pos);
        if !state.held.is_empty() {
            return Vec::new();
        }
        self.end_session(axis)
    }

    fn end_session(&mut self, axis: Axis) -> Vec<MotionCommand> {
        let state = &mut self.axes[axis.index()];
        state.held.clear();
        match std::mem::replace(&mut state.session, Session::Idle) {
            Session::Idle => Vec::new(),
            Session::PendingHold { timer, .. } => {
                self.timers.disarm(timer);
                Vec::new()
            }
            Session::Jogging { .. } => {
                tracing::debug!("Stop jog {}", axis);
                vec![MotionCommand::Jog(JogCommand::stop(axis))]
            }
        }
    }

    /// Reset both axes to idle
    ///
    /// Pending timers are disarmed; a stop is returned for every axis that
    /// was jogging.
    pub fn release_all(&mut self) -> Vec<MotionCommand> {
        Axis::ALL
            .iter()
            .flat_map(|axis| self.end_session(*axis))
            .collect()
    }

    pub fn phase(&self, axis: Axis) -> AxisPhase {
        match self.axes[axis.index()].session {
            Session::Idle => AxisPhase::Idle,
            Session::PendingHold { .. } => AxisPhase::PendingHold,
            Session::Jogging { .. } => AxisPhase::Jogging,
        }
    }

    pub fn is_jogging(&self, axis: Axis) -> bool {
        self.phase(axis) == AxisPhase::Jogging
    }

    pub fn increment(&self) -> QuickMoveIncrement {
        self.increment
    }

    /// Select the increment used by later taps and jogs
    pub fn set_increment(&mut self, increment: QuickMoveIncrement) {
        self.increment = increment;
    }

    pub fn keymap(&self) -> &KeyMap {
        &self.keymap
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }
}
