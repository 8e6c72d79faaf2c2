// Actuator interface shared by the control loop and the liveness supervisor
//
// The control path writes through `Actuator::write`, which checks the
// interlock while holding the sink lock. `emergency_stop` trips the
// interlock under that same lock, so no control write can land after it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, error, info};
use zenoh::Wait;

use crate::messages::MotorCommand;

/// Error types for actuator writes
#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("Failed to publish motor command: {0}")]
    Publish(String),

    #[error("Motor hardware fault: {0}")]
    Fault(String),
}

/// Anything that can apply a motor command
///
/// Writes are fire-and-forget; the command persists until overwritten.
pub trait MotorSink: Send {
    fn write(&mut self, cmd: MotorCommand) -> Result<(), ActuatorError>;
}

/// Result of a control-path write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Interlocked,
}

/// Interlocked handle to the single motor sink
pub struct Actuator<S> {
    sink: Mutex<S>,
    interlock: AtomicBool,
}

impl<S: MotorSink> Actuator<S> {
    /// Wrap a sink; starts interlocked until liveness is established
    pub fn new(sink: S) -> Self {
        Self {
            sink: Mutex::new(sink),
            interlock: AtomicBool::new(true),
        }
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        // A panicked writer must not prevent an emergency stop
        self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Control path write, refused while the interlock is tripped
    pub fn write(&self, cmd: MotorCommand) -> Result<WriteOutcome, ActuatorError> {
        let mut sink = self.lock();
        if self.interlock.load(Ordering::SeqCst) {
            debug!("Interlock tripped, dropping {:?}", cmd);
            return Ok(WriteOutcome::Interlocked);
        }
        sink.write(cmd)?;
        Ok(WriteOutcome::Written)
    }

    /// Trip the interlock and write a zero command
    ///
    /// The interlock stays tripped even if the zero write fails.
    pub fn emergency_stop(&self) -> Result<(), ActuatorError> {
        let mut sink = self.lock();
        self.interlock.store(true, Ordering::SeqCst);
        sink.write(MotorCommand::stop()).inspect_err(|e| {
            error!("Emergency stop write failed: {}", e);
        })
    }

    /// Allow control path writes again
    pub fn release(&self) {
        let _sink = self.lock();
        self.interlock.store(false, Ordering::SeqCst);
    }

    pub fn is_tripped(&self) -> bool {
        self.interlock.load(Ordering::SeqCst)
    }
}

/// Publishes motor commands as JSON to the motor hardware process
pub struct ZenohSink {
    publisher: zenoh::pubsub::Publisher<'static>,
}

impl ZenohSink {
    pub fn new(publisher: zenoh::pubsub::Publisher<'static>) -> Self {
        Self { publisher }
    }
}

impl MotorSink for ZenohSink {
    fn write(&mut self, cmd: MotorCommand) -> Result<(), ActuatorError> {
        let payload =
            serde_json::to_string(&cmd).map_err(|e| ActuatorError::Publish(e.to_string()))?;
        self.publisher
            .put(payload)
            .wait()
            .map_err(|e| ActuatorError::Publish(e.to_string()))
    }
}

/// Dry-run sink: logs instead of driving motors
#[derive(Debug, Default)]
pub struct LogSink {
    last: Option<MotorCommand>,
}

impl MotorSink for LogSink {
    fn write(&mut self, cmd: MotorCommand) -> Result<(), ActuatorError> {
        if self.last != Some(cmd) {
            info!("[dry-run] motors left={:.3} right={:.3}", cmd.left, cmd.right);
            self.last = Some(cmd);
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;

    #[test]
    fn test_starts_interlocked() {
        let sink = RecordingSink::new();
        let actuator = Actuator::new(sink.clone());
        assert!(actuator.is_tripped());
        assert_eq!(
            actuator.write(MotorCommand::new(0.2, 0.2)).unwrap(),
            WriteOutcome::Interlocked
        );
        assert!(sink.commands().is_empty());
    }

    #[test]
    fn test_emergency_stop_overrides_following_writes() {
        let sink = RecordingSink::new();
        let actuator = Actuator::new(sink.clone());
        actuator.release();

        actuator.write(MotorCommand::new(0.3, 0.3)).unwrap();
        actuator.emergency_stop().unwrap();
        let outcome = actuator.write(MotorCommand::new(0.5, 0.5)).unwrap();

        assert_eq!(outcome, WriteOutcome::Interlocked);
        assert_eq!(
            sink.commands(),
            vec![MotorCommand::new(0.3, 0.3), MotorCommand::stop()]
        );
    }

    #[test]
    fn test_write_failure_surfaces() {
        let sink = RecordingSink::new();
        let actuator = Actuator::new(sink.clone());
        actuator.release();
        sink.set_failing(true);

        assert!(matches!(
            actuator.write(MotorCommand::new(0.1, 0.1)),
            Err(ActuatorError::Fault(_))
        ));
    }

    #[test]
    fn test_interlock_holds_when_stop_write_fails() {
        let sink = RecordingSink::new();
        let actuator = Actuator::new(sink.clone());
        actuator.release();
        sink.set_failing(true);

        assert!(actuator.emergency_stop().is_err());
        assert!(actuator.is_tripped());
    }
}
