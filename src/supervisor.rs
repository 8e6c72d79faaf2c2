// Liveness supervisor
// Note: this is the highest priority safety interlock. If the operator side
// stops sending heartbeats, the actuator interlock is tripped with a zero
// command first and every display link is disconnected after, never the
// other way around.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::actuator::{Actuator, ActuatorError, MotorSink};

pub const LINK_COMMAND_DISPLAY: &str = "command-display";
pub const LINK_AXIS_DISPLAY: &str = "axis-display";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessStatus {
    Alive,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessTransition {
    Died,
    Recovered,
}

/// Heartbeat bookkeeping, checked once per period
#[derive(Debug)]
pub struct Liveness {
    status: LivenessStatus,
    last_signal: Option<Instant>,
    refreshed: bool,
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    /// Starts dead until the first heartbeat
    pub fn new() -> Self {
        Self {
            status: LivenessStatus::Dead,
            last_signal: None,
            refreshed: false,
        }
    }

    pub fn status(&self) -> LivenessStatus {
        self.status
    }

    pub fn last_signal(&self) -> Option<Instant> {
        self.last_signal
    }

    pub fn on_signal(&mut self, now: Instant) -> Option<LivenessTransition> {
        self.last_signal = Some(now);
        self.refreshed = true;
        if self.status == LivenessStatus::Dead {
            self.status = LivenessStatus::Alive;
            return Some(LivenessTransition::Recovered);
        }
        None
    }

    /// Periodic check: a period without any signal is a death
    pub fn check(&mut self) -> Option<LivenessTransition> {
        let refreshed = std::mem::replace(&mut self.refreshed, false);
        if !refreshed && self.status == LivenessStatus::Alive {
            self.status = LivenessStatus::Dead;
            return Some(LivenessTransition::Died);
        }
        None
    }
}

/// Named links that are torn down together when liveness is lost
#[derive(Debug, Default)]
pub struct LinkSet {
    links: BTreeMap<&'static str, watch::Sender<bool>>,
}

impl LinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a link; the receiver reports whether it is connected
    pub fn register(&mut self, name: &'static str) -> watch::Receiver<bool> {
        self.links
            .entry(name)
            .or_insert_with(|| watch::Sender::new(false))
            .subscribe()
    }

    pub fn is_connected(&self, name: &str) -> bool {
        self.links.get(name).is_some_and(|tx| *tx.borrow())
    }

    pub fn disconnect_all(&self) {
        for (name, tx) in &self.links {
            if tx.send_replace(false) {
                info!("Link {} disconnected", name);
            }
        }
    }

    pub fn connect_all(&self) {
        for (name, tx) in &self.links {
            if !tx.send_replace(true) {
                info!("Link {} connected", name);
            }
        }
    }
}

/// Applies liveness transitions to the actuator and links
pub struct LivenessSupervisor<S> {
    liveness: Liveness,
    actuator: Arc<Actuator<S>>,
    links: LinkSet,
}

impl<S: MotorSink> LivenessSupervisor<S> {
    pub fn new(actuator: Arc<Actuator<S>>, links: LinkSet) -> Self {
        Self {
            liveness: Liveness::new(),
            actuator,
            links,
        }
    }

    pub fn status(&self) -> LivenessStatus {
        self.liveness.status()
    }

    pub fn links(&self) -> &LinkSet {
        &self.links
    }

    pub fn on_heartbeat(&mut self, now: Instant) {
        if let Some(LivenessTransition::Recovered) = self.liveness.on_signal(now) {
            info!("Heartbeat received, control links restored");
            self.actuator.release();
            self.links.connect_all();
        }
    }

    /// Periodic check; on death stop the motors, then tear down links
    pub fn on_period(&mut self) -> Result<(), ActuatorError> {
        if let Some(LivenessTransition::Died) = self.liveness.check() {
            warn!("Heartbeat lost, emergency stop");
            return self.trip();
        }
        Ok(())
    }

    /// Final stop on shutdown
    pub fn shutdown(&mut self) -> Result<(), ActuatorError> {
        info!("Shutting down, stopping motors");
        self.trip()
    }

    fn trip(&mut self) -> Result<(), ActuatorError> {
        let stopped = self.actuator.emergency_stop();
        // Links go down even if the stop write failed
        self.links.disconnect_all();
        stopped
    }
}
