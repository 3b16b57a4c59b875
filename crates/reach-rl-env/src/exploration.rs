//! Open-loop data collection with uniformly sampled actions

use rand::Rng;
use tracing::debug;

use reach_rl_core::{ContinuousAction, ContinuousSpace, Environment, Result, Trajectory, Transition};

use crate::compositor::ReachObservation;
use crate::controller::ReachEnv;

/// Drive `env` for `steps` steps with actions drawn uniformly from `space`,
/// resetting whenever an episode ends. The environment is reset first.
///
/// # Errors
///
/// Any error from `reset` or `uniform_exploration`.
pub async fn collect_uniform_rollout<R: Rng + Send>(
    env: &mut ReachEnv,
    space: &ContinuousSpace,
    steps: usize,
    rng: &mut R,
) -> Result<Trajectory<ReachObservation, ContinuousAction>> {
    let mut trajectory = Trajectory::new();
    let (mut observation, _) = env.reset().await?;

    for _ in 0..steps {
        let explored = env.uniform_exploration(space.sample_with(rng)).await?;
        let done = explored.step.done;
        let next_observation = explored.step.observation;

        trajectory.push(Transition {
            observation,
            action: explored.action,
            reward: explored.step.reward,
            next_observation: next_observation.clone(),
            done,
        });

        observation = if done {
            debug!(collected = trajectory.len(), "episode boundary during rollout");
            env.reset().await?.0
        } else {
            next_observation
        };
    }

    Ok(trajectory)
}
