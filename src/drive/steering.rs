// Steering mixer for a differential drive base
// Rotates the (turn, forward) axis pair by 45 degrees so each axis of the
// result drives one wheel, then clamps and gamma-shapes each wheel.

use std::f32::consts::{FRAC_PI_4, SQRT_2};

use super::DriveError;
use crate::messages::MotorCommand;

/// Mix joystick-style axes into left/right wheel commands
///
/// # Arguments
/// * `x` - Turn axis in [-1, 1] (positive = turn right)
/// * `y` - Forward axis in [-1, 1] (positive = forward)
/// * `scale_factor` - Output clamp bound in (0, 1]
/// * `gamma` - Response curve exponent (> 0); the normalized magnitude is raised
///   to `1 / gamma`, so values above 1 lift small inputs
///
/// # Returns
/// Wheel commands, each within [-scale_factor, scale_factor]
pub fn steer(x: f32, y: f32, scale_factor: f32, gamma: f32) -> Result<MotorCommand, DriveError> {
    check_axis("x", x)?;
    check_axis("y", y)?;
    if !(scale_factor > 0.0 && scale_factor <= 1.0) {
        return Err(DriveError::invalid("scale_factor", scale_factor));
    }
    if !(gamma.is_finite() && gamma > 0.0) {
        return Err(DriveError::invalid("gamma", gamma));
    }

    let (left, right) = mix(x, y);
    let left = left.clamp(-scale_factor, scale_factor);
    let right = right.clamp(-scale_factor, scale_factor);

    Ok(MotorCommand {
        left: shape(left, scale_factor, gamma),
        right: shape(right, scale_factor, gamma),
    })
}

fn check_axis(name: &'static str, value: f32) -> Result<(), DriveError> {
    if value.is_finite() && (-1.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(DriveError::invalid(name, value))
    }
}

/// Polar rotation by -45 degrees, rescaled so a pure axis reaches full scale
fn mix(x: f32, y: f32) -> (f32, f32) {
    let r = x.hypot(y);
    if r == 0.0 {
        // atan2(0, 0) is meaningless here
        return (0.0, 0.0);
    }
    let theta = y.atan2(x) - FRAC_PI_4;
    (r * theta.cos() * SQRT_2, r * theta.sin() * SQRT_2)
}

/// Signed gamma correction over the clamped range [-scale, scale]
fn shape(value: f32, scale: f32, gamma: f32) -> f32 {
    let normalized = (value.abs() / scale).min(1.0);
    let shaped = normalized.powf(1.0 / gamma) * scale;
    shaped.copysign(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn test_zero_input() {
        for &(scale, gamma) in &[(0.05, 0.1), (0.5, 1.0), (1.0, 4.0)] {
            let cmd = steer(0.0, 0.0, scale, gamma).unwrap();
            assert_eq!(cmd.left, 0.0);
            assert_eq!(cmd.right, 0.0);
        }
    }

    #[test]
    fn test_pure_turn_clamps_to_scale() {
        // r=1, theta=0 -> -pi/4 -> (0.707, -0.707) * sqrt2 -> (1, -1) -> clamp 0.5
        let cmd = steer(1.0, 0.0, 0.5, 1.0).unwrap();
        assert!(close(cmd.left, 0.5), "left={}", cmd.left);
        assert!(close(cmd.right, -0.5), "right={}", cmd.right);
    }

    #[test]
    fn test_pure_forward_drives_both_wheels_equally() {
        let cmd = steer(0.0, 1.0, 1.0, 1.0).unwrap();
        assert!(close(cmd.left, 1.0) && close(cmd.right, 1.0), "{:?}", cmd);

        let cmd = steer(0.0, -0.3, 1.0, 1.0).unwrap();
        assert!(close(cmd.left, -0.3) && close(cmd.right, -0.3), "{:?}", cmd);
    }

    #[test]
    fn test_forward_plus_turn_slows_inner_wheel() {
        // Forward with a right turn: left wheel faster than right
        let cmd = steer(0.3, 0.6, 1.0, 1.0).unwrap();
        assert!(close(cmd.left, 0.9), "left={}", cmd.left);
        assert!(close(cmd.right, 0.3), "right={}", cmd.right);
    }

    #[test]
    fn test_gamma_one_is_identity_on_clamped_value() {
        let (x, y, scale) = (0.2, 0.25, 0.8);
        let (left, right) = mix(x, y);
        let cmd = steer(x, y, scale, 1.0).unwrap();
        assert!(close(cmd.left, left.clamp(-scale, scale)));
        assert!(close(cmd.right, right.clamp(-scale, scale)));
    }

    #[test]
    fn test_gamma_reshapes_but_keeps_sign() {
        // Pre-gamma: left = 0.25, right = -0.15 against scale 0.5
        let soft = steer(0.2, 0.05, 0.5, 0.5).unwrap();
        let sharp = steer(0.2, 0.05, 0.5, 2.0).unwrap();
        let linear = steer(0.2, 0.05, 0.5, 1.0).unwrap();

        assert!(soft.left > 0.0 && sharp.left > 0.0);
        assert!(soft.right < 0.0 && sharp.right < 0.0);
        // gamma < 1 -> exponent > 1 -> smaller near zero
        assert!(soft.left.abs() < linear.left.abs());
        // gamma > 1 -> exponent < 1 -> larger near zero
        assert!(sharp.left.abs() > linear.left.abs());
    }

    #[test]
    fn test_clamp_holds_after_gamma_over_grid() {
        let scales = [0.05, 0.3, 0.5, 1.0];
        let gammas = [0.1, 0.5, 1.0, 2.0, 4.0, 40.0];
        let steps: Vec<f32> = (-10..=10).map(|i| i as f32 / 10.0).collect();

        for &scale in &scales {
            for &gamma in &gammas {
                for &x in &steps {
                    for &y in &steps {
                        let cmd = steer(x, y, scale, gamma).unwrap();
                        assert!(
                            cmd.left.abs() <= scale && cmd.right.abs() <= scale,
                            "steer({}, {}, {}, {}) = {:?}",
                            x,
                            y,
                            scale,
                            gamma,
                            cmd
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(matches!(
            steer(1.5, 0.0, 0.5, 1.0),
            Err(DriveError::InvalidParameter { name: "x", .. })
        ));
        assert!(matches!(
            steer(0.0, f32::NAN, 0.5, 1.0),
            Err(DriveError::InvalidParameter { name: "y", .. })
        ));
        assert!(matches!(
            steer(0.0, 0.0, 0.0, 1.0),
            Err(DriveError::InvalidParameter { name: "scale_factor", .. })
        ));
        assert!(matches!(
            steer(0.0, 0.0, 0.5, -2.0),
            Err(DriveError::InvalidParameter { name: "gamma", .. })
        ));
    }
}
