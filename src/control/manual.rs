// Joystick control with command watchdog
// If teleop stops sending axes the controller falls back to a stop command.

use std::time::{Duration, Instant};

use tracing::warn;

use crate::config::DriveParams;
use crate::drive::{DriveError, steer};
use crate::messages::{AxisCommand, MotorCommand};

pub struct ManualController {
    latest: Option<AxisCommand>,
    received_at: Instant,
    timeout: Duration,
    stale: bool,
}

impl ManualController {
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            latest: None,
            received_at: now,
            timeout,
            stale: true, // Start stale until first axes
        }
    }

    /// Latest axis reading from teleop
    pub fn on_axes(&mut self, axes: AxisCommand, now: Instant) {
        self.latest = Some(axes);
        self.received_at = now;
    }

    pub fn reset(&mut self) {
        self.latest = None;
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Mix the latest axes, or stop if they are missing or too old
    pub fn compute(
        &mut self,
        params: &DriveParams,
        now: Instant,
    ) -> Result<MotorCommand, DriveError> {
        let age = now.saturating_duration_since(self.received_at);

        match self.latest {
            Some(axes) if age <= self.timeout => {
                self.stale = false;
                steer(axes.x, axes.y, params.scale_factor, params.joystick_gamma)
            }
            Some(_) => {
                if !self.stale {
                    warn!("Axis command stale ({:?} old), stopping robot", age);
                }
                self.stale = true;
                Ok(MotorCommand::stop())
            }
            None => {
                // No axes ever received
                self.stale = true;
                Ok(MotorCommand::stop())
            }
        }
    }
}
