//! Environment configuration

use std::f64::consts::FRAC_PI_2;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use reach_rl_core::{RLError, Result};

use crate::actuation::{JointVector, JOINT_COUNT};
use crate::pose::GoalPose;
use crate::retry::RetryPolicy;
use crate::reward::RewardConfig;

/// Uniform range `[low, high)`; a degenerate range always yields `low`
pub type Range = [f64; 2];

/// Per-axis perturbation applied to the base goal each episode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalPerturbation {
    /// Offset range along x (m)
    pub x: Range,
    /// Offset range along y (m)
    pub y: Range,
    /// Offset range along z (m)
    pub z: Range,
}

impl Default for GoalPerturbation {
    fn default() -> Self {
        Self {
            x: [0.0, 0.2],
            y: [-0.2, 0.2],
            z: [-0.1, 0.1],
        }
    }
}

/// Goal and obstacle marker placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Frame markers are placed in
    pub reference_frame: String,
    /// Scene name of the goal marker
    pub goal_name: String,
    /// Model definition file for the goal marker
    pub goal_model_path: Option<PathBuf>,
    /// Vertical offset of the goal marker from the goal position (m)
    pub goal_z_offset: f64,
    /// Scene name of the obstacle
    pub obstacle_name: String,
    /// Model definition file for the obstacle
    pub obstacle_model_path: Option<PathBuf>,
    /// Obstacle position; y is replaced by a sample from `obstacle_lateral_range`
    pub obstacle_position: [f64; 3],
    /// Lateral (y) placement range of the obstacle (m)
    pub obstacle_lateral_range: Range,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            reference_frame: "world".to_string(),
            goal_name: "object".to_string(),
            goal_model_path: None,
            goal_z_offset: -0.2,
            obstacle_name: "obstacle".to_string(),
            obstacle_model_path: None,
            obstacle_position: [0.4, 0.0, 1.2],
            obstacle_lateral_range: [-0.2, 0.2],
        }
    }
}

/// Frames used for the end-effector pose lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Frame the pose is expressed in
    pub reference_frame: String,
    /// End-effector link
    pub end_effector: String,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            reference_frame: "world".to_string(),
            end_effector: "ee_link".to_string(),
        }
    }
}

/// Configuration for [`crate::ReachEnv`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReachEnvConfig {
    /// Arm joint names in controller order
    pub joint_names: Vec<String>,
    /// Prefix prepended to every joint name (multi-robot setups)
    pub joint_prefix: Option<String>,
    /// Joint state at the start of every episode
    pub initial_joints: JointVector,
    /// Goal before per-episode perturbation
    pub base_goal: GoalPose,
    /// Per-episode goal perturbation
    pub goal_perturbation: GoalPerturbation,
    /// Trajectory duration for each command (ms)
    pub command_duration_ms: u64,
    /// Gripper position commanded at start-up
    pub gripper_close_position: f64,
    /// Reward shaping
    pub reward: RewardConfig,
    /// Marker placement
    pub markers: MarkerConfig,
    /// Pose lookup frames
    pub frames: FrameConfig,
    /// Waits on external collaborators
    pub retry: RetryPolicy,
    /// Symmetric per-joint bound of the advertised action space (rad)
    pub action_limit: f64,
    /// Seed for target randomization; entropy-seeded when absent
    pub seed: Option<u64>,
    /// Episode step cap applied by [`crate::TimeLimit`]
    pub max_episode_steps: Option<usize>,
}

impl Default for ReachEnvConfig {
    fn default() -> Self {
        Self {
            joint_names: [
                "shoulder_pan_joint",
                "shoulder_lift_joint",
                "elbow_joint",
                "wrist_1_joint",
                "wrist_2_joint",
                "wrist_3_joint",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            joint_prefix: None,
            initial_joints: [0.0, -FRAC_PI_2, 0.0, -FRAC_PI_2, 0.0, 0.0],
            base_goal: GoalPose::default(),
            goal_perturbation: GoalPerturbation::default(),
            command_duration_ms: 10,
            gripper_close_position: 1.0,
            reward: RewardConfig::default(),
            markers: MarkerConfig::default(),
            frames: FrameConfig::default(),
            retry: RetryPolicy::default(),
            action_limit: 0.1,
            seed: None,
            max_episode_steps: None,
        }
    }
}

impl ReachEnvConfig {
    /// Load and validate a JSON configuration file. Missing fields take
    /// their defaults.
    ///
    /// # Errors
    ///
    /// IO and parse failures, or any [`Self::validate`] error.
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Joint names with the optional prefix applied
    #[must_use]
    pub fn prefixed_joint_names(&self) -> Vec<String> {
        let prefix = self.joint_prefix.as_deref().unwrap_or("");
        self.joint_names.iter().map(|name| format!("{prefix}{name}")).collect()
    }

    /// Trajectory duration per command
    #[must_use]
    pub fn command_duration(&self) -> Duration {
        Duration::from_millis(self.command_duration_ms)
    }

    /// Reject configurations the controller cannot run with.
    ///
    /// # Errors
    ///
    /// [`RLError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(RLError::InvalidConfig(msg));

        if self.joint_names.len() != JOINT_COUNT {
            return invalid(format!(
                "expected {JOINT_COUNT} joint names, got {}",
                self.joint_names.len()
            ));
        }
        if self.joint_names.iter().any(String::is_empty) {
            return invalid("joint names must not be empty".to_string());
        }

        let reward = &self.reward;
        for (name, value) in [
            ("reward.reach_threshold", reward.reach_threshold),
            ("reward.orientation_threshold", reward.orientation_threshold),
            ("reward.orientation_error_floor", reward.orientation_error_floor),
            ("action_limit", self.action_limit),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return invalid(format!("{name} must be positive, got {value}"));
            }
        }

        let p = &self.goal_perturbation;
        for (name, range) in [
            ("goal_perturbation.x", p.x),
            ("goal_perturbation.y", p.y),
            ("goal_perturbation.z", p.z),
            ("markers.obstacle_lateral_range", self.markers.obstacle_lateral_range),
        ] {
            if range[0] > range[1] {
                return invalid(format!("{name} is inverted: {range:?}"));
            }
        }

        if self.max_episode_steps == Some(0) {
            return invalid("max_episode_steps must be at least 1".to_string());
        }

        if self.retry.timeout_ms == 0 {
            return invalid("retry.timeout_ms must be non-zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ReachEnvConfig::default();
        config.validate().unwrap();
        assert_eq!(config.joint_names.len(), JOINT_COUNT);
        assert_eq!(config.reward.success_threshold, 5);
        assert_eq!(config.command_duration(), Duration::from_millis(10));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: ReachEnvConfig = serde_json::from_str(
            r#"{ "joint_prefix": "left_", "reward": { "success_threshold": 10 }, "seed": 7 }"#,
        )
        .unwrap();

        assert_eq!(config.reward.success_threshold, 10);
        assert!((config.reward.reach_threshold - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.prefixed_joint_names()[0], "left_shoulder_pan_joint");
        assert_eq!(config.markers.goal_name, "object");
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = ReachEnvConfig::default();
        config.joint_names.pop();
        assert!(matches!(config.validate(), Err(RLError::InvalidConfig(_))));

        let mut config = ReachEnvConfig::default();
        config.goal_perturbation.y = [0.2, -0.2];
        assert!(matches!(config.validate(), Err(RLError::InvalidConfig(_))));

        let mut config = ReachEnvConfig::default();
        config.reward.reach_threshold = 0.0;
        assert!(matches!(config.validate(), Err(RLError::InvalidConfig(_))));

        let config = ReachEnvConfig {
            max_episode_steps: Some(0),
            ..ReachEnvConfig::default()
        };
        assert!(matches!(config.validate(), Err(RLError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn loads_from_file() {
        let path = std::env::temp_dir()
            .join(format!("reach-env-config-{}.json", std::process::id()));
        tokio::fs::write(&path, r#"{ "command_duration_ms": 25 }"#).await.unwrap();

        let config = ReachEnvConfig::from_json_file(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(config.command_duration_ms, 25);
    }
}
