//! Core reinforcement learning traits and types for the arm reach environment
//!
//! This crate provides the environment-agnostic vocabulary (actions,
//! observations, rewards, steps, episodes and trajectories) that the
//! environment crate builds on.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod environment;
pub mod error;
pub mod observation;
pub mod reward;
pub mod state;
pub mod trajectory;

// Re-export core traits and types
pub use action::{Action, ActionSpace, ContinuousAction, ContinuousSpace};
pub use environment::{Environment, Episode, Step, StepInfo, TrackedEnvironment};
pub use error::{RLError, Result};
pub use observation::{Observation, ObservationSpace};
pub use reward::Reward;
pub use state::State;
pub use trajectory::{Trajectory, Transition};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Action, ActionSpace, ContinuousAction, Environment, Observation, ObservationSpace,
        Reward, Result, State, Step, StepInfo,
    };
}
