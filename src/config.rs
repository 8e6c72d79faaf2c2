// Loop rates, timeouts, topics, drive tuning
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::drive::{DriveError, Wheel};

// Control loop frequency (one cycle per camera frame at 30 fps)
pub const LOOP_HZ: u64 = 30;

// Liveness supervisor check period
pub const HEARTBEAT_PERIOD: Duration = Duration::from_millis(500);

// Manual axis command watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// No detection frame within this window counts as a miss
pub const FRAME_TIMEOUT: Duration = Duration::from_millis(200);

// Zenoh topics
pub const TOPIC_CMD_AXES: &str = "diffbot/cmd/axes"; // joystick / teleop axes
pub const TOPIC_CMD_MODE: &str = "diffbot/cmd/mode"; // controller mode switch
pub const TOPIC_DETECTION: &str = "diffbot/vision/detection"; // detector output per frame
pub const TOPIC_HEARTBEAT: &str = "diffbot/heartbeat"; // liveness signal
pub const TOPIC_CONFIG_DRIVE: &str = "diffbot/config/drive"; // live tuning
pub const TOPIC_RT_MOTORS: &str = "diffbot/rt/motors"; // actuation
pub const TOPIC_STATE_MOTORS: &str = "diffbot/state/motors"; // dispatched command display
pub const TOPIC_STATE_AXES: &str = "diffbot/state/axes"; // received axes display
pub const TOPIC_STATE_HEALTH: &str = "diffbot/state/health";
pub const TOPIC_STATE_SEARCH: &str = "diffbot/state/search";

/// Largest trim allowed on the lagging wheel (exclusive)
pub const MAX_TRIM_OFFSET: f32 = 0.2;

/// Errors loading or validating drive parameters
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] DriveError),
}

/// Tunable drive parameters, read once per control cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveParams {
    /// Caps motor command magnitude, in (0, 1]
    pub scale_factor: f32,
    /// Joystick response curve exponent
    pub joystick_gamma: f32,
    /// Detector-offset response curve exponent
    pub target_gamma: f32,
    /// Additive bias on the lagging wheel, in [0, 0.2)
    pub trim_offset: f32,
    /// Which wheel receives the trim
    pub trim_wheel: Wheel,
    /// Consecutive missed frames tolerated before stopping
    pub miss_threshold: u32,
    /// Divisor applied to the detector's horizontal offset
    pub offset_reduction: f32,
    /// Fixed forward axis value while tracking
    pub forward_speed: f32,
    /// Time without any detection before the search hand-off fires
    pub search_timeout_ms: u64,
}

impl Default for DriveParams {
    fn default() -> Self {
        Self {
            scale_factor: 0.5,
            joystick_gamma: 1.0,
            target_gamma: 10.0,
            trim_offset: 0.0,
            trim_wheel: Wheel::Left,
            miss_threshold: 8,
            offset_reduction: 3.0,
            forward_speed: 0.4,
            search_timeout_ms: 5000,
        }
    }
}

impl DriveParams {
    /// Read parameters from a JSON file and validate them
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(raw.as_bytes())
    }

    /// Parse and validate a JSON parameter set
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let params: DriveParams = serde_json::from_slice(bytes)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), DriveError> {
        if !(self.scale_factor > 0.0 && self.scale_factor <= 1.0) {
            return Err(DriveError::invalid("scale_factor", self.scale_factor));
        }
        for (name, gamma) in [
            ("joystick_gamma", self.joystick_gamma),
            ("target_gamma", self.target_gamma),
        ] {
            if !(gamma.is_finite() && gamma > 0.0) {
                return Err(DriveError::invalid(name, gamma));
            }
        }
        if !(self.trim_offset >= 0.0 && self.trim_offset < MAX_TRIM_OFFSET) {
            return Err(DriveError::invalid("trim_offset", self.trim_offset));
        }
        if self.miss_threshold == 0 {
            return Err(DriveError::invalid("miss_threshold", 0.0));
        }
        if !(self.offset_reduction.is_finite() && self.offset_reduction > 0.0) {
            return Err(DriveError::invalid("offset_reduction", self.offset_reduction));
        }
        if !(-1.0..=1.0).contains(&self.forward_speed) {
            return Err(DriveError::invalid("forward_speed", self.forward_speed));
        }
        Ok(())
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(DriveParams::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let params = DriveParams::from_json(br#"{"scale_factor": 0.3, "trim_wheel": "right"}"#)
            .expect("partial config should parse");
        assert_eq!(params.scale_factor, 0.3);
        assert_eq!(params.trim_wheel, Wheel::Right);
        assert_eq!(params.miss_threshold, 8);
    }

    #[test]
    fn test_rejects_out_of_range() {
        let cases = [
            r#"{"scale_factor": 0.0}"#,
            r#"{"scale_factor": 1.5}"#,
            r#"{"joystick_gamma": -1.0}"#,
            r#"{"target_gamma": 0.0}"#,
            r#"{"trim_offset": 0.2}"#,
            r#"{"miss_threshold": 0}"#,
            r#"{"offset_reduction": 0.0}"#,
            r#"{"forward_speed": 1.1}"#,
        ];
        for case in cases {
            assert!(
                matches!(
                    DriveParams::from_json(case.as_bytes()),
                    Err(ConfigError::Invalid(DriveError::InvalidParameter { .. }))
                ),
                "{} should be rejected",
                case
            );
        }
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(
            DriveParams::from_json(b"{not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
