// Controllers that produce mixed (pre-trim) wheel commands
//
// Manual and tracking are mutually exclusive; the runtime decides which one
// owns the actuator for a given cycle.

pub mod manual;
pub mod tracking;

pub use manual::ManualController;
pub use tracking::{TargetTracker, TrackerState};
