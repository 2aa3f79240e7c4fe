//! Data models for axes, positions and motion parameters
//!
//! This module provides:
//! - The two table axes and the jog direction on each axis
//! - Table positions as reported by the control backend
//! - The selectable quick-move increments
//! - The named digital outputs the backend can switch

use serde::{Deserialize, Serialize};
use std::fmt;

/// Table axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Horizontal axis
    X,
    /// Vertical axis
    Y,
}

impl Axis {
    /// Both axes, in display order
    pub const ALL: [Axis; 2] = [Axis::X, Axis::Y];

    /// Wire name of the axis
    pub fn as_str(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
        }
    }

    /// Index into per-axis arrays
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
        }
    }
}

impl std::str::FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(Axis::X),
            "y" => Ok(Axis::Y),
            other => Err(format!("Axis must be \"x\" or \"y\", got \"{}\"", other)),
        }
    }
}

/// Direction of travel along an axis
///
/// Serialized as the integers `1` and `-1` to match the jog protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Direction {
    /// Towards increasing coordinates
    Positive,
    /// Towards decreasing coordinates
    Negative,
}

impl Direction {
    /// Sign of the direction as a float multiplier
    pub fn sign(self) -> f64 {
        match self {
            Direction::Positive => 1.0,
            Direction::Negative => -1.0,
        }
    }
}

impl From<Direction> for i8 {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Positive => 1,
            Direction::Negative => -1,
        }
    }
}

impl TryFrom<i8> for Direction {
    type Error = String;

    fn try_from(value: i8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Direction::Positive),
            -1 => Ok(Direction::Negative),
            other => Err(format!("direction must be 1 or -1, got {}", other)),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Positive => write!(f, "+"),
            Direction::Negative => write!(f, "-"),
        }
    }
}

/// A movement key's meaning: one axis travelled in one direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisKey {
    /// Axis moved by the key
    pub axis: Axis,
    /// Direction of travel
    pub direction: Direction,
}

impl AxisKey {
    /// Create a new axis key
    pub const fn new(axis: Axis, direction: Direction) -> Self {
        Self { axis, direction }
    }
}

impl fmt::Display for AxisKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.axis, self.direction)
    }
}

/// Table position in inches
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X-axis position
    #[serde(default)]
    pub x: f64,
    /// Y-axis position
    #[serde(default)]
    pub y: f64,
}

impl Position {
    /// Create a new position
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Coordinate on the given axis
    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X:{:.4} Y:{:.4}", self.x, self.y)
    }
}

/// Selectable step size for tap moves and jog speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum QuickMoveIncrement {
    /// 0.1 units
    Tenth,
    /// 0.01 units
    #[default]
    Hundredth,
    /// 0.001 units
    Thousandth,
    /// 0.0001 units
    TenThousandth,
}

impl QuickMoveIncrement {
    /// All increments from coarsest to finest
    pub const ALL: [QuickMoveIncrement; 4] = [
        QuickMoveIncrement::Tenth,
        QuickMoveIncrement::Hundredth,
        QuickMoveIncrement::Thousandth,
        QuickMoveIncrement::TenThousandth,
    ];

    /// Numeric step size
    pub fn value(self) -> f64 {
        match self {
            QuickMoveIncrement::Tenth => 0.1,
            QuickMoveIncrement::Hundredth => 0.01,
            QuickMoveIncrement::Thousandth => 0.001,
            QuickMoveIncrement::TenThousandth => 0.0001,
        }
    }

    /// Next larger increment, saturating at the coarsest
    pub fn coarser(self) -> Self {
        let idx = self.position();
        Self::ALL[idx.saturating_sub(1)]
    }

    /// Next smaller increment, saturating at the finest
    pub fn finer(self) -> Self {
        let idx = self.position();
        Self::ALL[(idx + 1).min(Self::ALL.len() - 1)]
    }

    fn position(self) -> usize {
        Self::ALL.iter().position(|i| *i == self).unwrap_or(0)
    }
}

impl From<QuickMoveIncrement> for f64 {
    fn from(increment: QuickMoveIncrement) -> Self {
        increment.value()
    }
}

impl TryFrom<f64> for QuickMoveIncrement {
    type Error = String;

    fn try_from(value: f64) -> std::result::Result<Self, Self::Error> {
        QuickMoveIncrement::ALL
            .iter()
            .copied()
            .find(|inc| (inc.value() - value).abs() < 1e-9)
            .ok_or_else(|| {
                format!(
                    "increment must be one of 0.1, 0.01, 0.001, 0.0001, got {}",
                    value
                )
            })
    }
}

impl fmt::Display for QuickMoveIncrement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuickMoveIncrement::Tenth => write!(f, "0.1"),
            QuickMoveIncrement::Hundredth => write!(f, "0.01"),
            QuickMoveIncrement::Thousandth => write!(f, "0.001"),
            QuickMoveIncrement::TenThousandth => write!(f, "0.0001"),
        }
    }
}

/// Digital outputs exposed by the control backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigitalOutput {
    /// "down" output (mist coolant)
    #[default]
    Down,
    /// "start" output (flood coolant)
    Start,
}

impl DigitalOutput {
    /// Wire name of the output
    pub fn as_str(self) -> &'static str {
        match self {
            DigitalOutput::Down => "down",
            DigitalOutput::Start => "start",
        }
    }
}

impl fmt::Display for DigitalOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DigitalOutput {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "down" => Ok(DigitalOutput::Down),
            "start" => Ok(DigitalOutput::Start),
            other => Err(format!(
                "output must be \"down\" or \"start\", got \"{}\"",
                other
            )),
        }
    }
}
