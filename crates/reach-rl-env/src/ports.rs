//! Boundaries to the arm, camera, transform tree and scene
//!
//! Implementations talk to a simulator or real hardware. The controller only
//! sees these traits; transient unavailability is reported as
//! [`PortError::NotReady`] and retried by [`crate::retry::RetryPolicy`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nalgebra::Isometry3;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::actuation::JointVector;
use crate::compositor::Frame;
use crate::pose::Pose;

/// Failure reported by an external collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    /// The resource exists but has nothing to give yet
    #[error("{0} not ready")]
    NotReady(String),
    /// The call itself failed
    #[error("{0}")]
    Failed(String),
}

/// Result type for collaborator calls
pub type PortResult<T> = std::result::Result<T, PortError>;

/// Arm trajectory controller
#[async_trait]
pub trait JointActuator: Send + Sync {
    /// Move to `positions` over `duration`; resolves once the trajectory
    /// has finished executing.
    async fn send_command(
        &self,
        joint_names: &[String],
        positions: &JointVector,
        velocities: &JointVector,
        duration: Duration,
    ) -> PortResult<()>;
}

/// Gripper trajectory controller
#[async_trait]
pub trait GripperActuator: Send + Sync {
    /// Move the finger joint to `position`; resolves when done.
    async fn send_command(&self, position: f64, duration: Duration) -> PortResult<()>;
}

/// Transform lookup between named frames
#[async_trait]
pub trait PoseOracle: Send + Sync {
    /// Pose of `target_frame` expressed in `reference_frame`
    async fn lookup_transform(&self, reference_frame: &str, target_frame: &str) -> PortResult<Pose>;
}

/// Camera producing decoded, resized, normalized single-channel frames
#[async_trait]
pub trait CameraSource: Send + Sync {
    /// Next available frame
    async fn frame(&self) -> PortResult<Frame>;
}

/// Spawning and removal of marker models in the scene
#[async_trait]
pub trait SceneObjectService: Send + Sync {
    /// Place model `name` built from `model` at `pose` in `reference_frame`
    async fn spawn(
        &self,
        name: &str,
        model: &str,
        pose: &Isometry3<f64>,
        reference_frame: &str,
    ) -> PortResult<()>;

    /// Remove model `name`
    async fn delete(&self, name: &str) -> PortResult<()>;
}

/// Everything the controller talks to
pub struct ArmInterfaces {
    /// Arm trajectory controller
    pub actuator: Arc<dyn JointActuator>,
    /// Gripper trajectory controller
    pub gripper: Arc<dyn GripperActuator>,
    /// Transform lookup
    pub poses: Arc<dyn PoseOracle>,
    /// Camera
    pub camera: Arc<dyn CameraSource>,
    /// Scene model service
    pub scene: Arc<dyn SceneObjectService>,
    /// Raw contact-sensor values
    pub contacts: mpsc::Receiver<u16>,
}
