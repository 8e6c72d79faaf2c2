// Differential drive mixing for the two-wheel base
//
// Provides:
// - Steering mixer (turn/forward axes -> clamped, gamma-shaped wheel commands)
// - Motor command governor (per-wheel trim, safe-command hold, dispatch)

pub mod governor;
pub mod steering;

use serde::{Deserialize, Serialize};

pub use governor::{Governor, govern};
pub use steering::steer;

/// Drive wheel selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wheel {
    Left,
    Right,
}

/// Error types for drive computations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriveError {
    #[error("Invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f32 },
}

impl DriveError {
    pub(crate) fn invalid(name: &'static str, value: f32) -> Self {
        Self::InvalidParameter { name, value }
    }
}
