// Define message types for the runtime

use serde::{Deserialize, Serialize};

// Axis reading from joystick/teleop -> runtime
// x = turn axis, y = forward axis, both normalized to [-1, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisCommand {
    pub x: f32,
    pub y: f32,
}

// Per-frame detector output -> runtime
// confidence is advisory only
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub found: bool,
    #[serde(default)]
    pub offset_x: Option<f32>,
    #[serde(default)]
    pub confidence: f32,
}

impl Detection {
    /// A frame without a usable target
    pub fn miss() -> Self {
        Self {
            found: false,
            offset_x: None,
            confidence: 0.0,
        }
    }

    /// Horizontal offset if this frame carries a usable target
    pub fn target_offset(&self) -> Option<f32> {
        match self.offset_x {
            Some(x) if self.found && x.is_finite() && (-1.0..=1.0).contains(&x) => Some(x),
            _ => None,
        }
    }
}

/// Liveness tick from the operator side
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Heartbeat {
    #[serde(default)]
    pub seq: u64,
}

/// Which controller owns the actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    #[default]
    Manual,
    Tracking,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModeCommand {
    pub mode: ControlMode,
}

// Motor output from runtime -> motor hardware
// Default is the stop command
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct MotorCommand {
    pub left: f32,
    pub right: f32,
}

impl MotorCommand {
    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    pub fn stop() -> Self {
        Self::default()
    }

    pub fn is_stop(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.left.is_finite() && self.right.is_finite()
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    TargetLost,
    LivenessDead,
    ActuatorFault,
}

/// Hand-off signal to an external search/avoidance behavior
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchStatus {
    pub search_active: bool,
}
