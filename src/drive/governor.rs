// Motor command governor
//
// Applies the one-wheel trim after mixing and is the only path from the
// controllers to the actuator. The trimmed wheel may exceed scale_factor by
// up to trim_offset; that allowance for motor asymmetry is not re-clamped.

use tracing::{debug, warn};

use super::{DriveError, Wheel};
use crate::actuator::{Actuator, ActuatorError, MotorSink, WriteOutcome};
use crate::config::{DriveParams, MAX_TRIM_OFFSET};
use crate::messages::MotorCommand;

/// Add `trim_offset` to the designated wheel
///
/// `Governor::resolve` does not call this for an exact (0, 0) stop command,
/// which is dispatched untrimmed.
pub fn govern(
    left: f32,
    right: f32,
    trim_offset: f32,
    wheel: Wheel,
) -> Result<MotorCommand, DriveError> {
    if !(trim_offset >= 0.0 && trim_offset < MAX_TRIM_OFFSET) {
        return Err(DriveError::invalid("trim_offset", trim_offset));
    }
    if !left.is_finite() {
        return Err(DriveError::invalid("left", left));
    }
    if !right.is_finite() {
        return Err(DriveError::invalid("right", right));
    }

    Ok(match wheel {
        Wheel::Left => MotorCommand::new(left + trim_offset, right),
        Wheel::Right => MotorCommand::new(left, right + trim_offset),
    })
}

/// Stateful governor that holds the last safe command across rejected cycles
#[derive(Debug, Default)]
pub struct Governor {
    last_safe: MotorCommand,
}

impl Governor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the held command (mode switch, liveness recovery)
    pub fn reset(&mut self) {
        self.last_safe = MotorCommand::stop();
    }

    /// Trim the mixer output, falling back to the last safe command when the
    /// mixer or the trim rejected the input
    pub fn resolve(
        &mut self,
        mixed: Result<MotorCommand, DriveError>,
        params: &DriveParams,
    ) -> MotorCommand {
        let governed = mixed.and_then(|cmd| {
            // A stop command is never trimmed, or the trimmed wheel would creep
            if cmd.is_stop() {
                Ok(cmd)
            } else {
                govern(cmd.left, cmd.right, params.trim_offset, params.trim_wheel)
            }
        });

        match governed {
            Ok(cmd) => {
                self.last_safe = cmd;
                cmd
            }
            Err(e) => {
                warn!("Rejected command ({}), holding {:?}", e, self.last_safe);
                self.last_safe
            }
        }
    }

    /// Resolve and write to the actuator
    ///
    /// Returns the dispatched command, or `None` if the liveness interlock
    /// blocked the write.
    pub fn dispatch<S: MotorSink>(
        &mut self,
        mixed: Result<MotorCommand, DriveError>,
        params: &DriveParams,
        actuator: &Actuator<S>,
    ) -> Result<Option<MotorCommand>, ActuatorError> {
        let cmd = self.resolve(mixed, params);
        match actuator.write(cmd)? {
            WriteOutcome::Written => {
                debug!("Motors: left={:.3}, right={:.3}", cmd.left, cmd.right);
                Ok(Some(cmd))
            }
            WriteOutcome::Interlocked => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::testing::RecordingSink;

    #[test]
    fn test_trim_added_exactly_to_designated_wheel() {
        let cmd = govern(0.5, 0.5, 0.1, Wheel::Left).unwrap();
        assert_eq!(cmd, MotorCommand::new(0.5 + 0.1, 0.5));

        let cmd = govern(-0.2, 0.5, 0.15, Wheel::Right).unwrap();
        assert_eq!(cmd, MotorCommand::new(-0.2, 0.5 + 0.15));
    }

    #[test]
    fn test_trim_may_exceed_scale_factor() {
        // scale 0.5 saturated wheel + 0.1 trim -> 0.6, not re-clamped
        let mixed = crate::drive::steer(0.0, 1.0, 0.5, 1.0).unwrap();
        let cmd = govern(mixed.left, mixed.right, 0.1, Wheel::Left).unwrap();
        assert!((cmd.left - 0.6).abs() < 1e-6);
        assert!((cmd.right - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_govern_rejects_bad_trim_and_nan() {
        assert!(govern(0.1, 0.1, 0.2, Wheel::Left).is_err());
        assert!(govern(0.1, 0.1, -0.01, Wheel::Left).is_err());
        assert!(govern(f32::NAN, 0.1, 0.0, Wheel::Left).is_err());
    }

    #[test]
    fn test_resolve_holds_last_safe_on_error() {
        let params = DriveParams::default();
        let mut governor = Governor::new();

        let good = governor.resolve(Ok(MotorCommand::new(0.3, 0.2)), &params);
        assert_eq!(good, MotorCommand::new(0.3, 0.2));

        let held = governor.resolve(Err(DriveError::invalid("x", 3.0)), &params);
        assert_eq!(held, good);
    }

    #[test]
    fn test_stop_is_not_trimmed() {
        let params = DriveParams {
            trim_offset: 0.05,
            ..DriveParams::default()
        };
        let mut governor = Governor::new();
        assert!(governor.resolve(Ok(MotorCommand::stop()), &params).is_stop());
    }

    #[test]
    fn test_dispatch_writes_to_actuator() {
        let sink = RecordingSink::new();
        let actuator = Actuator::new(sink.clone());
        actuator.release();
        let mut governor = Governor::new();

        let sent = governor
            .dispatch(Ok(MotorCommand::new(0.1, -0.1)), &DriveParams::default(), &actuator)
            .unwrap();
        assert_eq!(sent, Some(MotorCommand::new(0.1, -0.1)));
        assert_eq!(sink.commands(), vec![MotorCommand::new(0.1, -0.1)]);
    }

    #[test]
    fn test_dispatch_blocked_by_interlock() {
        let sink = RecordingSink::new();
        let actuator = Actuator::new(sink.clone());
        let mut governor = Governor::new();

        // Actuator starts tripped until liveness is established
        let sent = governor
            .dispatch(Ok(MotorCommand::new(0.4, 0.4)), &DriveParams::default(), &actuator)
            .unwrap();
        assert_eq!(sent, None);
        assert!(sink.commands().is_empty());
    }
}
