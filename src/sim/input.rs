//! Input Tokens
//!
//! The discrete actions a controlled entity can perform on a tick.
//! A tick's input is the set of tokens active during it, recorded in the
//! rollback buffer, sent over the wire and persisted in replays.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One active action during a tick.
///
/// Serialized as a lower-case string (`"left"`, `"jump"`, ...), which is
/// also the persisted replay format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputToken {
    /// Move left while held.
    Left,
    /// Move right while held.
    Right,
    /// Jump (consumes one jump charge).
    Jump,
    /// Start a dash in the facing direction.
    Dash,
    /// Fire a projectile when the cooldown allows.
    Shoot,
}

impl InputToken {
    /// Every token, in declaration order.
    pub const ALL: [InputToken; 5] = [
        InputToken::Left,
        InputToken::Right,
        InputToken::Jump,
        InputToken::Dash,
        InputToken::Shoot,
    ];

    /// Wire name of the token.
    pub const fn as_str(self) -> &'static str {
        match self {
            InputToken::Left => "left",
            InputToken::Right => "right",
            InputToken::Jump => "jump",
            InputToken::Dash => "dash",
            InputToken::Shoot => "shoot",
        }
    }
}

impl fmt::Display for InputToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized token name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown input token {0:?}")]
pub struct UnknownToken(pub String);

impl FromStr for InputToken {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InputToken::ALL
            .into_iter()
            .find(|token| token.as_str() == s)
            .ok_or_else(|| UnknownToken(s.to_string()))
    }
}

/// Check whether a tick's input contains a token.
#[inline]
pub fn has(inputs: &[InputToken], token: InputToken) -> bool {
    inputs.contains(&token)
}

/// Horizontal intent of a tick's input: -1, 0 or +1.
#[inline]
pub fn horizontal_axis(inputs: &[InputToken]) -> f64 {
    let left = has(inputs, InputToken::Left) as i8;
    let right = has(inputs, InputToken::Right) as i8;
    (right - left) as f64
}

// =============================================================================
// TESTS
// =============================================================================
