//! End-effector and goal poses

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Position plus roll/pitch/yaw orientation, as reported by the pose oracle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position (x, y, z) in meters
    pub position: Vector3<f64>,
    /// Orientation (roll, pitch, yaw) in radians
    pub orientation: Vector3<f64>,
}

impl Pose {
    /// Build a pose from raw components
    #[must_use]
    pub fn new(position: [f64; 3], orientation: [f64; 3]) -> Self {
        Self {
            position: Vector3::from(position),
            orientation: Vector3::from(orientation),
        }
    }

    /// Build a pose from a position and a rotation quaternion
    #[must_use]
    pub fn from_quaternion(position: Vector3<f64>, rotation: &UnitQuaternion<f64>) -> Self {
        let (roll, pitch, yaw) = rotation.euler_angles();
        Self {
            position,
            orientation: Vector3::new(roll, pitch, yaw),
        }
    }

    /// Pitch component of the orientation
    #[must_use]
    pub fn pitch(&self) -> f64 {
        self.orientation.y
    }

    /// Rigid transform equivalent of this pose
    #[must_use]
    pub fn to_isometry(&self) -> Isometry3<f64> {
        let rotation =
            UnitQuaternion::from_euler_angles(
                self.orientation.x,
                self.orientation.y,
                self.orientation.z,
            );
        Isometry3::from_parts(Translation3::from(self.position), rotation)
    }
}

/// Per-episode reach target. Only the pitch slot of the orientation is scored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalPose {
    /// Target position in meters
    pub position: Vector3<f64>,
    /// Target orientation (roll, pitch, yaw) in radians
    pub orientation: Vector3<f64>,
}

impl GoalPose {
    /// Build a goal from raw components
    #[must_use]
    pub fn new(position: [f64; 3], orientation: [f64; 3]) -> Self {
        Self {
            position: Vector3::from(position),
            orientation: Vector3::from(orientation),
        }
    }

    /// Target pitch
    #[must_use]
    pub fn pitch(&self) -> f64 {
        self.orientation.y
    }

    /// Translate the position by `offset`, keeping the orientation
    #[must_use]
    pub fn offset(&self, offset: Vector3<f64>) -> Self {
        Self {
            position: self.position + offset,
            orientation: self.orientation,
        }
    }
}

impl Default for GoalPose {
    fn default() -> Self {
        Self::new([0.5, 0.0, 1.5], [-1.57, 1.57, 0.0])
    }
}
