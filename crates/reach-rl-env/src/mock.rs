//! In-process stand-in for the arm, camera, transform tree and scene
//!
//! `MockArm` answers every collaborator trait from a small kinematic model:
//! the end-effector pose follows the last joint command through a planar
//! three-link chain rotated by the base joint. Tests can script poses,
//! inject camera stalls, fail the scene service, or push contacts.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use nalgebra::{Isometry3, Vector3};
use tokio::sync::mpsc;
use tracing::trace;

use crate::actuation::{JointVector, JOINT_COUNT};
use crate::compositor::{Frame, FRAME_SIDE};
use crate::latch::CONTACT;
use crate::pose::Pose;
use crate::ports::{
    ArmInterfaces, CameraSource, GripperActuator, JointActuator, PortError, PortResult, PoseOracle,
    SceneObjectService,
};

const SHOULDER_HEIGHT: f64 = 1.089;
const UPPER_ARM: f64 = 0.425;
const FOREARM: f64 = 0.392;
const WRIST: f64 = 0.09;
const OBSTACLE_RADIUS: f64 = 0.1;

/// Record of a model placed in the mock scene
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnedModel {
    /// Scene name
    pub name: String,
    /// Placement
    pub pose: Isometry3<f64>,
    /// Reference frame it was placed in
    pub reference_frame: String,
}

#[derive(Debug, Default)]
struct MockState {
    commands: Vec<JointVector>,
    joint_names: Vec<String>,
    gripper: Vec<f64>,
    scripted_poses: VecDeque<Pose>,
    frames_served: u32,
    camera_not_ready: u32,
    camera_stalled: bool,
    scene_failing: bool,
    spawned: Vec<SpawnedModel>,
    deleted: Vec<String>,
}

/// Kinematic mock of the whole external layer
#[derive(Debug)]
pub struct MockArm {
    state: Mutex<MockState>,
    contacts: mpsc::Sender<u16>,
}

impl MockArm {
    /// Create the mock and the interface bundle that drives it
    #[must_use]
    pub fn connect() -> (Arc<Self>, ArmInterfaces) {
        let (contacts, receiver) = mpsc::channel(16);
        let arm = Arc::new(Self {
            state: Mutex::new(MockState::default()),
            contacts,
        });
        let interfaces = ArmInterfaces {
            actuator: arm.clone(),
            gripper: arm.clone(),
            poses: arm.clone(),
            camera: arm.clone(),
            scene: arm.clone(),
            contacts: receiver,
        };
        (arm, interfaces)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a pose to be returned by the next transform lookup
    pub fn push_pose(&self, pose: Pose) {
        self.lock().scripted_poses.push_back(pose);
    }

    /// Make the camera report "not ready" for the next `n` requests
    pub fn delay_frames(&self, n: u32) {
        self.lock().camera_not_ready = n;
    }

    /// Stop (or resume) producing camera frames
    pub fn stall_camera(&self, stalled: bool) {
        self.lock().camera_stalled = stalled;
    }

    /// Make every scene call fail (or succeed again)
    pub fn fail_scene(&self, failing: bool) {
        self.lock().scene_failing = failing;
    }

    /// Publish a raw contact-sensor value
    pub fn contact(&self, value: u16) {
        if self.contacts.try_send(value).is_err() {
            trace!(value, "contact channel full or closed");
        }
    }

    /// Every joint command received, oldest first
    #[must_use]
    pub fn commands(&self) -> Vec<JointVector> {
        self.lock().commands.clone()
    }

    /// Joint names sent with the last command
    #[must_use]
    pub fn last_joint_names(&self) -> Vec<String> {
        self.lock().joint_names.clone()
    }

    /// Every gripper position commanded
    #[must_use]
    pub fn gripper_commands(&self) -> Vec<f64> {
        self.lock().gripper.clone()
    }

    /// Models currently in the scene
    #[must_use]
    pub fn spawned(&self) -> Vec<SpawnedModel> {
        self.lock().spawned.clone()
    }

    /// Names passed to delete, oldest first
    #[must_use]
    pub fn deleted(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }

    /// Number of frames handed out so far
    #[must_use]
    pub fn frames_served(&self) -> u32 {
        self.lock().frames_served
    }

    /// End-effector pose implied by a joint command
    #[must_use]
    pub fn forward_kinematics(command: &JointVector) -> Pose {
        let [pan, lift, elbow, wrist_1, wrist_2, _] = *command;
        let e1 = -lift;
        let e2 = e1 - elbow;
        let e3 = e2 - wrist_1;

        let reach = UPPER_ARM * e1.cos() + FOREARM * e2.cos() + WRIST * e3.cos();
        let height = SHOULDER_HEIGHT + UPPER_ARM * e1.sin() + FOREARM * e2.sin() + WRIST * e3.sin();

        Pose {
            position: Vector3::new(reach * pan.cos(), reach * pan.sin(), height),
            orientation: Vector3::new(wrist_2, e3, pan),
        }
    }

    fn current_pose(state: &MockState) -> Pose {
        let command = state.commands.last().copied().unwrap_or([0.0; JOINT_COUNT]);
        Self::forward_kinematics(&command)
    }
}

#[async_trait]
impl JointActuator for MockArm {
    async fn send_command(
        &self,
        joint_names: &[String],
        positions: &JointVector,
        _velocities: &JointVector,
        _duration: Duration,
    ) -> PortResult<()> {
        let touching = {
            let mut state = self.lock();
            state.commands.push(*positions);
            state.joint_names = joint_names.to_vec();
            let ee = Self::current_pose(&state).position;
            state
                .spawned
                .iter()
                .filter(|m| m.name == "obstacle")
                .any(|m| (m.pose.translation.vector - ee).norm() < OBSTACLE_RADIUS)
        };
        if touching {
            self.contact(CONTACT);
        }
        tokio::task::yield_now().await;
        Ok(())
    }
}

#[async_trait]
impl GripperActuator for MockArm {
    async fn send_command(&self, position: f64, _duration: Duration) -> PortResult<()> {
        self.lock().gripper.push(position);
        Ok(())
    }
}

#[async_trait]
impl PoseOracle for MockArm {
    async fn lookup_transform(
        &self,
        reference_frame: &str,
        target_frame: &str,
    ) -> PortResult<Pose> {
        trace!(reference_frame, target_frame, "transform lookup");
        let mut state = self.lock();
        match state.scripted_poses.pop_front() {
            Some(pose) => Ok(pose),
            None => Ok(Self::current_pose(&state)),
        }
    }
}

#[async_trait]
impl CameraSource for MockArm {
    async fn frame(&self) -> PortResult<Frame> {
        let mut state = self.lock();
        if state.camera_stalled {
            return Err(PortError::NotReady("camera".to_string()));
        }
        if state.camera_not_ready > 0 {
            state.camera_not_ready -= 1;
            return Err(PortError::NotReady("camera".to_string()));
        }
        state.frames_served += 1;
        #[allow(clippy::cast_precision_loss)]
        let shade = (state.frames_served % 256) as f32 / 255.0;
        Ok(Frame::from_elem((FRAME_SIDE, FRAME_SIDE), shade))
    }
}

#[async_trait]
impl SceneObjectService for MockArm {
    async fn spawn(
        &self,
        name: &str,
        _model: &str,
        pose: &Isometry3<f64>,
        reference_frame: &str,
    ) -> PortResult<()> {
        let mut state = self.lock();
        if state.scene_failing {
            return Err(PortError::Failed(format!("spawn {name} refused")));
        }
        state.spawned.retain(|m| m.name != name);
        state.spawned.push(SpawnedModel {
            name: name.to_string(),
            pose: *pose,
            reference_frame: reference_frame.to_string(),
        });
        Ok(())
    }

    async fn delete(&self, name: &str) -> PortResult<()> {
        let mut state = self.lock();
        state.deleted.push(name.to_string());
        if state.scene_failing {
            return Err(PortError::Failed(format!("delete {name} refused")));
        }
        state.spawned.retain(|m| m.name != name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn straight_up_arm_is_above_the_shoulder() {
        let pose = MockArm::forward_kinematics(&[0.0, -FRAC_PI_2, 0.0, 0.0, 0.0, 0.0]);
        assert_relative_eq!(pose.position.x, 0.0, epsilon = 1e-9);
        let full_height = SHOULDER_HEIGHT + UPPER_ARM + FOREARM + WRIST;
        assert_relative_eq!(pose.position.z, full_height, epsilon = 1e-9);
        assert_relative_eq!(pose.pitch(), FRAC_PI_2, epsilon = 1e-12);
    }

    #[tokio::test]
    async fn camera_honours_delays() {
        let (arm, _interfaces) = MockArm::connect();
        arm.delay_frames(2);
        assert!(arm.frame().await.is_err());
        assert!(arm.frame().await.is_err());
        let frame = arm.frame().await.unwrap();
        assert_eq!(frame.dim(), (FRAME_SIDE, FRAME_SIDE));
        assert_eq!(arm.frames_served(), 1);
    }
}
