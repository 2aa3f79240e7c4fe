//! # XY Table Input
//!
//! Turns key press, repeat and release events into motion commands:
//! a short press issues one incremental move, a sustained press starts
//! continuous jogging that stops on release.

pub mod keymap;
pub mod timers;
pub mod translator;

pub use keymap::{Key, KeyAction, KeyMap};
pub use timers::{HoldElapsed, TokioHoldTimers};
pub use translator::{
    AxisPhase, HoldTimers, HoldToken, KeyInput, KeyPhase, KeyTranslator, MotionCommand,
    DEFAULT_HOLD_DELAY,
};
