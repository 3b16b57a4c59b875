//! Trajectory storage for collected experience

use serde::{Deserialize, Serialize};

use crate::Reward;

/// Single transition in a trajectory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition<O, A> {
    /// Observation the action was taken from
    pub observation: O,
    /// Action taken
    pub action: A,
    /// Reward received
    pub reward: Reward,
    /// Observation after the action
    pub next_observation: O,
    /// Whether the episode ended on this transition
    pub done: bool,
}

/// Ordered sequence of transitions, possibly spanning several episodes
#[derive(Debug, Clone)]
pub struct Trajectory<O, A> {
    /// Sequence of transitions
    pub transitions: Vec<Transition<O, A>>,
    /// Total reward
    pub total_reward: f64,
    /// Trajectory ID
    pub id: String,
}

impl<O, A> Trajectory<O, A> {
    /// Create a new empty trajectory with a fresh id
    #[must_use]
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
            total_reward: 0.0,
            id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Add a transition to the trajectory
    pub fn push(&mut self, transition: Transition<O, A>) {
        self.total_reward += transition.reward.0;
        self.transitions.push(transition);
    }

    /// Get the length of the trajectory
    #[must_use]
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Check if trajectory is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Number of episode boundaries inside the trajectory
    #[must_use]
    pub fn episodes_finished(&self) -> usize {
        self.transitions.iter().filter(|t| t.done).count()
    }

    /// Discounted returns, restarting at every episode boundary
    #[must_use]
    pub fn returns(&self, gamma: f64) -> Vec<f64> {
        let mut returns = vec![0.0; self.len()];
        let mut running_return = 0.0;

        for (i, transition) in self.transitions.iter().enumerate().rev() {
            if transition.done {
                running_return = 0.0;
            }
            running_return = transition.reward.0 + gamma * running_return;
            returns[i] = running_return;
        }

        returns
    }
}

impl<O, A> Default for Trajectory<O, A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(reward: f64, done: bool) -> Transition<u8, u8> {
        Transition {
            observation: 0,
            action: 0,
            reward: Reward(reward),
            next_observation: 0,
            done,
        }
    }

    #[test]
    fn returns_reset_at_episode_boundaries() {
        let mut trajectory = Trajectory::new();
        trajectory.push(transition(1.0, false));
        trajectory.push(transition(1.0, true));
        trajectory.push(transition(2.0, false));

        let returns = trajectory.returns(0.5);
        assert_eq!(returns, vec![1.5, 1.0, 2.0]);
        assert_eq!(trajectory.episodes_finished(), 1);
        assert!((trajectory.total_reward - 4.0).abs() < 1e-12);
    }
}
