//! Distance and orientation reward shaping with hysteresis-based success

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use reach_rl_core::Reward;

use crate::actuation::ACTION_DIM;
use crate::latch::CollisionLatch;
use crate::pose::{GoalPose, Pose};

/// Reward shaping configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Position error below which the goal counts as reached (m)
    pub reach_threshold: f64,
    /// Pitch error below which the orientation counts as reached (rad)
    pub orientation_threshold: f64,
    /// Consecutive oriented steps that must be exceeded for success
    pub success_threshold: u32,
    /// Weight of the distance penalty
    pub distance_weight: f64,
    /// Weight of the action-magnitude penalty
    pub action_weight: f64,
    /// Bonus while the position is reached
    pub reach_bonus: f64,
    /// Numerator of the inverse pitch-error bonus paid while reached
    pub orientation_shaping: f64,
    /// Bonus while position and orientation are both reached
    pub orientation_bonus: f64,
    /// Bonus paid on success
    pub success_bonus: f64,
    /// Penalty subtracted on collision
    pub collision_penalty: f64,
    /// Smallest pitch error used as the shaping denominator
    pub orientation_error_floor: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            reach_threshold: 0.05,
            orientation_threshold: 0.05,
            success_threshold: 5,
            distance_weight: 0.1,
            action_weight: 0.01,
            reach_bonus: 1.0,
            orientation_shaping: 0.01,
            orientation_bonus: 1.0,
            success_bonus: 5.0,
            collision_penalty: 1.0,
            orientation_error_floor: 1e-6,
        }
    }
}

/// Per-episode counters owned by the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeCounters {
    /// Consecutive steps with the position reached
    pub reach_counter: u32,
    /// Consecutive steps with position and orientation reached
    pub orient_reach_counter: u32,
    /// Steps taken this episode
    pub step_count: usize,
    /// Collision observed and not yet charged
    pub collision_flag: bool,
}

impl EpisodeCounters {
    /// Zero everything
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Reach flag for the low-dim state
    #[must_use]
    pub fn reach_flag(&self) -> bool {
        self.reach_counter > 0
    }

    /// Orientation reach flag for the low-dim state
    #[must_use]
    pub fn orient_flag(&self) -> bool {
        self.orient_reach_counter > 0
    }
}

/// Outcome of scoring one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Shaped reward
    pub reward: Reward,
    /// Whether the episode ends on this step
    pub terminal: bool,
    /// Whether the episode ended by reaching the goal
    pub success: bool,
    /// Whether a collision was charged on this step
    pub collision: bool,
    /// Position error (m)
    pub distance: f64,
    /// Pitch error (rad)
    pub orientation_error: f64,
}

/// Scores steps and decides termination
#[derive(Debug, Clone, Default)]
pub struct RewardShapingEngine {
    config: RewardConfig,
    success_steps: Vec<usize>,
}

impl RewardShapingEngine {
    /// Create an engine with the given shaping constants
    #[must_use]
    pub fn new(config: RewardConfig) -> Self {
        Self {
            config,
            success_steps: Vec::new(),
        }
    }

    /// Shaping constants in use
    #[must_use]
    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Step counts at which past episodes succeeded, oldest first
    #[must_use]
    pub fn success_steps(&self) -> &[usize] {
        &self.success_steps
    }

    /// Score one step, updating `counters` in place.
    ///
    /// A pending collision (`counters.collision_flag`) is charged once and
    /// the latch is disarmed so no further contacts are taken this episode.
    pub fn evaluate(
        &mut self,
        pose: &Pose,
        action: &[f64; ACTION_DIM],
        goal: &GoalPose,
        counters: &mut EpisodeCounters,
        latch: &CollisionLatch,
    ) -> Evaluation {
        let cfg = &self.config;
        let mut terminal = false;
        let mut success = false;
        let mut collision = false;

        let distance = (goal.position - pose.position).norm();
        // pitch only; roll and yaw are not scored
        let orientation_error = (goal.pitch() - pose.pitch()).abs();
        let action_norm = action.iter().map(|a| a * a).sum::<f64>().sqrt();

        let mut reward = Reward(-cfg.distance_weight * distance - cfg.action_weight * action_norm);

        if distance < cfg.reach_threshold {
            let shaping_error = orientation_error.max(cfg.orientation_error_floor);
            reward += cfg.reach_bonus + cfg.orientation_shaping / shaping_error;
            counters.reach_counter += 1;
            debug!(distance, step = counters.step_count, "reach target");

            if orientation_error < cfg.orientation_threshold {
                reward += cfg.orientation_bonus;
                counters.orient_reach_counter += 1;
                debug!(orientation_error, streak = counters.orient_reach_counter, "reach rotation");
            } else {
                counters.orient_reach_counter = 0;
            }

            if counters.orient_reach_counter > cfg.success_threshold {
                reward += cfg.success_bonus;
                terminal = true;
                success = true;
                self.success_steps.push(counters.step_count);
                info!(step = counters.step_count, "successfully completed task");
            }
        } else {
            counters.reach_counter = 0;
            counters.orient_reach_counter = 0;
        }

        if counters.collision_flag {
            reward += -cfg.collision_penalty;
            terminal = true;
            collision = true;
            latch.consume();
            counters.collision_flag = false;
            info!(step = counters.step_count, "collision, ending episode");
        }

        Evaluation {
            reward,
            terminal,
            success,
            collision,
            distance,
            orientation_error,
        }
    }
}
