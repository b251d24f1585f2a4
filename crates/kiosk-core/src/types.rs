use crate::{Result, constants::FEEDBACK_STATE_COUNT, error::Error};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of the tri-state indicator (0, 1 or 2).
///
/// State 0 doubles as the idle position the machine resets to after a
/// cooldown expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct FeedbackState(u8);

impl FeedbackState {
    /// The reset position.
    pub const IDLE: Self = FeedbackState(0);

    /// Create a feedback state with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidFeedbackState` if `value` is not 0, 1 or 2.
    pub fn new(value: u8) -> Result<Self> {
        if value >= FEEDBACK_STATE_COUNT {
            return Err(Error::InvalidFeedbackState(value));
        }
        Ok(FeedbackState(value))
    }

    /// Cyclic successor: `(s + 1) mod 3`.
    #[must_use]
    pub fn next(self) -> Self {
        FeedbackState((self.0 + 1) % FEEDBACK_STATE_COUNT)
    }

    /// Get the raw state value.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Lamp index lit for this state.
    #[must_use]
    pub fn lamp_index(&self) -> usize {
        usize::from(self.0)
    }

    /// Serialization written to the status channel, e.g. `"1\n"`.
    #[must_use]
    pub fn status_line(&self) -> String {
        format!("{}\n", self.0)
    }
}

impl fmt::Display for FeedbackState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for FeedbackState {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        FeedbackState::new(value)
    }
}

impl From<FeedbackState> for u8 {
    fn from(state: FeedbackState) -> Self {
        state.0
    }
}

impl std::str::FromStr for FeedbackState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value: u8 = s
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("Invalid feedback state: {s:?}")))?;
        FeedbackState::new(value)
    }
}

/// Platform line number (GPIO offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(u32);

impl LineId {
    #[must_use]
    pub const fn new(line: u32) -> Self {
        LineId(line)
    }

    #[must_use]
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

impl From<u32> for LineId {
    fn from(line: u32) -> Self {
        LineId(line)
    }
}

/// Logic level of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Low,
    High,
}

impl Level {
    #[must_use]
    pub fn is_high(&self) -> bool {
        matches!(self, Level::High)
    }
}

/// Direction a line is claimed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineDirection {
    Input,
    /// Output with the initial level driven at claim time.
    Output(Level),
}

/// Edge selection for line interrupts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

impl Edge {
    /// Whether a transition from `from` to `to` triggers this edge selection.
    #[must_use]
    pub fn matches(&self, from: Level, to: Level) -> bool {
        match (from, to) {
            (Level::Low, Level::High) => matches!(self, Edge::Rising | Edge::Both),
            (Level::High, Level::Low) => matches!(self, Edge::Falling | Edge::Both),
            _ => false,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Edge::Rising => "rising",
            Edge::Falling => "falling",
            Edge::Both => "both",
        };
        write!(f, "{name}")
    }
}
