//! Mapping from 5-dim joint increments to the 6-joint command sent to the arm
//!
//! Joint state accumulates unbounded; only the outgoing command is wrapped
//! and rescaled. The wrist-3 joint is never driven and is always commanded
//! to zero.

use std::f64::consts::PI;

/// Number of joints driven by the agent
pub const ACTION_DIM: usize = 5;
/// Number of joints on the arm
pub const JOINT_COUNT: usize = 6;

/// Joint angles in radians, in controller order
pub type JointVector = [f64; JOINT_COUNT];

const ELBOW: usize = 2;
const WRIST_1: usize = 3;
const WRIST_3: usize = 5;

/// Floored modulus: the result takes the sign of `divisor`.
///
/// Built on the exact remainder so values a few ulps off a multiple of
/// `divisor` keep the right sign.
fn floored_mod(value: f64, divisor: f64) -> f64 {
    let r = value % divisor;
    if r != 0.0 && (r < 0.0) != (divisor < 0.0) {
        r + divisor
    } else {
        r
    }
}

/// Wrap an accumulated joint angle that left `[-π, π]`.
///
/// Values above π map into `(-π, 0]`, values below -π into `[0, π)`.
#[must_use]
pub fn wrap_joint(value: f64) -> f64 {
    if value > PI {
        floored_mod(value, -PI)
    } else if value < -PI {
        floored_mod(value, PI)
    } else {
        value
    }
}

/// Result of applying one action to the joint state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Actuation {
    /// Accumulated joint state to persist for the next step
    pub next_joints: JointVector,
    /// Bounded command to dispatch to the actuator
    pub command: JointVector,
}

impl Actuation {
    /// The first five command values, as reported in the low-dim state
    #[must_use]
    pub fn commanded_joints(&self) -> [f64; ACTION_DIM] {
        let mut joints = [0.0; ACTION_DIM];
        joints.copy_from_slice(&self.command[..ACTION_DIM]);
        joints
    }
}

/// Per-joint command rescaling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointActuationModel {
    /// Factor applied to the elbow command, limiting it to `±scale·π`
    pub elbow_scale: f64,
    /// Factor applied to the shifted wrist-1 command
    pub wrist_scale: f64,
    /// Shift subtracted from the wrist-1 command before scaling
    pub wrist_offset: f64,
}

impl Default for JointActuationModel {
    fn default() -> Self {
        Self {
            elbow_scale: 0.7,
            wrist_scale: 0.5,
            wrist_offset: PI,
        }
    }
}

impl JointActuationModel {
    /// Accumulate `delta` into `current` and derive the outgoing command.
    #[must_use]
    pub fn compute_command(&self, current: &JointVector, delta: &[f64; ACTION_DIM]) -> Actuation {
        let mut next_joints = *current;
        for (joint, d) in next_joints.iter_mut().zip(delta) {
            *joint += d;
        }

        let mut command = [0.0; JOINT_COUNT];
        for (out, joint) in command.iter_mut().zip(&next_joints).take(ACTION_DIM) {
            *out = wrap_joint(*joint);
        }

        command[ELBOW] *= self.elbow_scale;
        command[WRIST_1] = self.wrist_scale * (command[WRIST_1] - self.wrist_offset);
        // wrist 2 passes through unscaled
        command[WRIST_3] = 0.0;

        Actuation { next_joints, command }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    const INIT: JointVector = [0.0, -PI / 2.0, 0.0, -PI / 2.0, 0.0, 0.0];

    #[test]
    fn in_range_values_pass_through_before_rescale() {
        let model = JointActuationModel::default();
        let out = model.compute_command(&INIT, &[0.1, 0.2, 0.3, 0.4, 0.5]);

        assert_relative_eq!(out.next_joints[0], 0.1);
        assert_relative_eq!(out.next_joints[1], -PI / 2.0 + 0.2);
        assert_relative_eq!(out.command[0], 0.1);
        assert_relative_eq!(out.command[1], -PI / 2.0 + 0.2);
        assert_relative_eq!(out.command[2], 0.7 * 0.3);
        assert_relative_eq!(out.command[3], 0.5 * ((-PI / 2.0 + 0.4) - PI));
        assert_relative_eq!(out.command[4], 0.5);
        assert_eq!(out.command[5], 0.0);
    }

    #[test]
    fn persisted_state_is_not_bounded() {
        let model = JointActuationModel::default();
        let mut joints = INIT;
        for _ in 0..40 {
            joints = model.compute_command(&joints, &[0.1; ACTION_DIM]).next_joints;
        }
        assert_relative_eq!(joints[0], 4.0, epsilon = 1e-9);
        assert_relative_eq!(joints[5], 0.0);
    }

    #[test]
    fn wrap_matches_floored_modulus() {
        assert_relative_eq!(wrap_joint(4.0), 4.0 - 2.0 * PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_joint(-4.0), -4.0 + 2.0 * PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_joint(PI), PI);
        assert_relative_eq!(wrap_joint(-PI), -PI);
        assert_relative_eq!(wrap_joint(7.0), 7.0 - 3.0 * PI, epsilon = 1e-12);
    }

    #[test]
    fn wrap_keeps_sign_next_to_multiples_of_pi() {
        let w = wrap_joint(59.690_260_418_206_07);
        assert!(w > -PI && w <= 0.0, "{w}");
        let w = wrap_joint(-59.690_260_418_206_07);
        assert!((0.0..PI).contains(&w), "{w}");
    }

    #[test]
    fn wrap_stays_in_range_around_every_multiple_of_pi() {
        for k in 1..40u32 {
            let center = f64::from(k) * PI;
            let bits = center.to_bits();
            for offset in 0..=128u64 {
                let v = f64::from_bits(bits - 64 + offset);
                if v > PI {
                    let w = wrap_joint(v);
                    assert!(w > -PI && w <= 0.0, "{v} -> {w}");
                    let w = wrap_joint(-v);
                    assert!((0.0..PI).contains(&w), "{} -> {w}", -v);
                }
            }
        }

        let mut v = PI;
        for _ in 0..10_000 {
            v = f64::from_bits(v.to_bits() + 1);
            let w = wrap_joint(v);
            assert!(w > -PI && w <= 0.0, "{v} -> {w}");
        }
    }

    #[test]
    fn wrist_three_ignores_accumulated_state() {
        let model = JointActuationModel::default();
        let mut current = INIT;
        current[5] = 1.3;
        let out = model.compute_command(&current, &[0.0; ACTION_DIM]);
        assert_eq!(out.command[5], 0.0);
        assert_relative_eq!(out.next_joints[5], 1.3);
    }

    proptest! {
        #[test]
        fn command_has_six_entries_and_zero_tail(
            delta in prop::array::uniform5(-10.0f64..10.0),
            start in prop::array::uniform6(-10.0f64..10.0),
        ) {
            let out = JointActuationModel::default().compute_command(&start, &delta);
            prop_assert_eq!(out.command.len(), JOINT_COUNT);
            prop_assert_eq!(out.command[5], 0.0);
        }

        #[test]
        fn positive_overflow_wraps_into_nonpositive_half(v in (PI + 1e-9)..50.0f64) {
            let w = wrap_joint(v);
            prop_assert!(w > -PI && w <= 0.0, "{} -> {}", v, w);
            let turns = ((v - w) / PI).round();
            prop_assert!((v - w - turns * PI).abs() < 1e-9);
        }

        #[test]
        fn negative_overflow_wraps_into_nonnegative_half(v in -50.0f64..(-PI - 1e-9)) {
            let w = wrap_joint(v);
            prop_assert!((0.0..PI).contains(&w), "{} -> {}", v, w);
        }

        #[test]
        fn elbow_and_wrist_rescale(joints in prop::array::uniform5(-20.0f64..20.0)) {
            let mut current = [0.0; JOINT_COUNT];
            current[..ACTION_DIM].copy_from_slice(&joints);
            let out = JointActuationModel::default().compute_command(&current, &[0.0; ACTION_DIM]);
            prop_assert!((out.command[2] - 0.7 * wrap_joint(joints[2])).abs() < 1e-12);
            prop_assert!((out.command[3] - 0.5 * (wrap_joint(joints[3]) - PI)).abs() < 1e-12);
            prop_assert!((out.command[4] - wrap_joint(joints[4])).abs() < 1e-12);
        }
    }
}
