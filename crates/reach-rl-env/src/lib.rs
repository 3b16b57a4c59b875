//! Vision-guided robot arm reach environment
//!
//! An agent issues 5-dim joint increments to a 6-joint arm and is rewarded
//! for bringing the end effector to a randomized goal position and pitch
//! while avoiding an obstacle. Observations pair a rolling stack of camera
//! frames with a 16-entry low-dimensional state.
//!
//! The arm, camera, transform tree, contact sensor and scene are reached
//! through the traits in [`ports`]; [`mock::MockArm`] implements all of them
//! in-process.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod actuation;
pub mod compositor;
pub mod config;
pub mod controller;
pub mod exploration;
pub mod latch;
pub mod mock;
pub mod ports;
pub mod pose;
pub mod retry;
pub mod reward;
pub mod wrappers;

pub use actuation::{
    wrap_joint, Actuation, JointActuationModel, JointVector, ACTION_DIM, JOINT_COUNT,
};
pub use compositor::{
    assemble_low_dim_state, Frame, FrameStackSnapshot, LowDimState, ObservationCompositor,
    ReachObservation, ReachObservationSpace, FRAME_SIDE, FRAME_STACK, LOW_DIM_STATE_LEN,
};
pub use config::{FrameConfig, GoalPerturbation, MarkerConfig, ReachEnvConfig};
pub use controller::{EpisodePhase, ExplorationStep, ReachEnv};
pub use exploration::collect_uniform_rollout;
pub use latch::CollisionLatch;
pub use ports::{ArmInterfaces, PortError, PortResult};
pub use pose::{GoalPose, Pose};
pub use retry::RetryPolicy;
pub use reward::{EpisodeCounters, Evaluation, RewardConfig, RewardShapingEngine};
pub use wrappers::TimeLimit;

// Re-export core types
pub use reach_rl_core::{
    Action, ActionSpace, ContinuousAction, ContinuousSpace, Environment, Observation,
    ObservationSpace, Reward, State, Step, StepInfo, TrackedEnvironment,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{ReachEnv, ReachEnvConfig, TimeLimit};
    pub use reach_rl_core::prelude::*;
}
