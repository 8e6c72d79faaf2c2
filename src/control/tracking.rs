// Target tracking controller
// Steers toward a detected object by feeding its horizontal offset to the
// steering mixer as the turn axis, with a fixed forward speed. Consecutive
// missed frames hold the last command until `miss_threshold` is reached,
// then the controller stops and stays stopped until the target returns.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::DriveParams;
use crate::drive::{DriveError, steer};
use crate::messages::{Detection, MotorCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Tracking,
    Waiting,
    Stopped,
}

pub struct TargetTracker {
    state: TrackerState,
    miss_streak: u32,
    held: MotorCommand,
    /// Last detection, or the reset time before the first one
    last_seen: Instant,
    search_active: bool,
}

impl TargetTracker {
    pub fn new(now: Instant) -> Self {
        Self {
            state: TrackerState::Stopped,
            miss_streak: 0,
            held: MotorCommand::stop(),
            last_seen: now,
            search_active: false,
        }
    }

    pub fn reset(&mut self, now: Instant) {
        *self = Self::new(now);
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn miss_streak(&self) -> u32 {
        self.miss_streak
    }

    /// True once nothing has been seen for `search_timeout`
    pub fn search_active(&self) -> bool {
        self.search_active
    }

    /// Command the tracker is currently holding
    pub fn current(&self) -> MotorCommand {
        self.held
    }

    /// Process one frame; `None` is a frame that failed or never arrived
    pub fn step(
        &mut self,
        frame: Option<&Detection>,
        params: &DriveParams,
        now: Instant,
    ) -> Result<MotorCommand, DriveError> {
        match frame.and_then(Detection::target_offset) {
            Some(offset_x) => self.on_hit(offset_x, params, now),
            None => Ok(self.on_miss(params, now)),
        }
    }

    fn on_hit(
        &mut self,
        offset_x: f32,
        params: &DriveParams,
        now: Instant,
    ) -> Result<MotorCommand, DriveError> {
        let turn = (offset_x / params.offset_reduction).clamp(-1.0, 1.0);
        let cmd = steer(turn, params.forward_speed, params.scale_factor, params.target_gamma)?;

        if self.state == TrackerState::Stopped {
            info!("Target acquired (offset {:.3}), tracking", offset_x);
        }
        if self.search_active {
            info!("Target found, search hand-off released");
        }
        self.state = TrackerState::Tracking;
        self.miss_streak = 0;
        self.held = cmd;
        self.last_seen = now;
        self.search_active = false;
        Ok(cmd)
    }

    fn on_miss(&mut self, params: &DriveParams, now: Instant) -> MotorCommand {
        self.miss_streak = self.miss_streak.saturating_add(1);

        if self.miss_streak >= params.miss_threshold {
            if self.state != TrackerState::Stopped {
                warn!("Target lost for {} frames, stopping", self.miss_streak);
            }
            self.state = TrackerState::Stopped;
            self.held = MotorCommand::stop();
        } else if self.state != TrackerState::Stopped {
            debug!("Missed frame {} of {}, holding", self.miss_streak, params.miss_threshold);
            self.state = TrackerState::Waiting;
        }

        let unseen_for = now.saturating_duration_since(self.last_seen);
        if !self.search_active && unseen_for >= params.search_timeout() {
            info!("No target for {:?}, search hand-off active", params.search_timeout());
            self.search_active = true;
        }

        self.held
    }
}
