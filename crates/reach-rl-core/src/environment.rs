//! Environment traits and episode bookkeeping

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ActionSpace, Action, Observation, ObservationSpace, Reward, State};

/// Result of a single environment step
#[derive(Debug, Clone)]
pub struct Step<O, S> {
    /// Observation from the environment
    pub observation: O,
    /// Reward signal
    pub reward: Reward,
    /// Whether the episode is done
    pub done: bool,
    /// Whether the episode was truncated (e.g., time limit)
    pub truncated: bool,
    /// Additional info from the environment
    pub info: StepInfo,
    /// Internal state (if available)
    pub state: Option<S>,
}

/// Additional information from a step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Custom fields
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl StepInfo {
    /// Builder-style insert of a serializable field
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Look up a numeric field
    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(serde_json::Value::as_f64)
    }

    /// Look up a boolean field
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(serde_json::Value::as_bool)
    }
}

/// Episode information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    /// Episode ID
    pub id: String,
    /// Total reward
    pub total_reward: f64,
    /// Number of steps
    pub steps: usize,
    /// Whether episode was truncated
    pub truncated: bool,
    /// Start time
    pub start_time: chrono::DateTime<chrono::Utc>,
    /// End time
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// Core environment trait
#[async_trait]
pub trait Environment: Send + Sync {
    /// Observation type
    type Observation: Observation;
    /// Action type
    type Action: Action;
    /// State type
    type State: State;

    /// Get the observation space
    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>>;

    /// Get the action space
    fn action_space(&self) -> Box<dyn ActionSpace<Action = Self::Action>>;

    /// Reset the environment
    async fn reset(&mut self) -> crate::Result<(Self::Observation, StepInfo)>;

    /// Take a step in the environment
    async fn step(
        &mut self,
        action: Self::Action,
    ) -> crate::Result<Step<Self::Observation, Self::State>>;

    /// Close the environment
    async fn close(&mut self) -> crate::Result<()> {
        Ok(())
    }

    /// Get current episode info
    fn episode_info(&self) -> Option<Episode> {
        None
    }
}

/// Wrapper for environments that tracks episodes
pub struct TrackedEnvironment<E> {
    /// Inner environment
    pub env: E,
    /// Current episode
    pub episode: Option<Episode>,
    /// Finished episodes, oldest first
    pub history: Vec<Episode>,
    /// Step counter
    pub step_count: usize,
}

impl<E> TrackedEnvironment<E> {
    /// Create a new tracked environment
    pub fn new(env: E) -> Self {
        Self {
            env,
            episode: None,
            history: Vec::new(),
            step_count: 0,
        }
    }

    /// Mean return over all finished episodes
    #[must_use]
    pub fn mean_return(&self) -> Option<f64> {
        if self.history.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.history.len() as f64;
        Some(self.history.iter().map(|e| e.total_reward).sum::<f64>() / n)
    }

    fn close_episode(&mut self) {
        if let Some(mut episode) = self.episode.take() {
            if episode.end_time.is_none() {
                episode.end_time = Some(chrono::Utc::now());
            }
            self.history.push(episode);
        }
    }
}

#[async_trait]
impl<E> Environment for TrackedEnvironment<E>
where
    E: Environment,
{
    type Observation = E::Observation;
    type Action = E::Action;
    type State = E::State;

    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>> {
        self.env.observation_space()
    }

    fn action_space(&self) -> Box<dyn ActionSpace<Action = Self::Action>> {
        self.env.action_space()
    }

    async fn reset(&mut self) -> crate::Result<(Self::Observation, StepInfo)> {
        self.close_episode();

        self.episode = Some(Episode {
            id: uuid::Uuid::new_v4().to_string(),
            total_reward: 0.0,
            steps: 0,
            truncated: false,
            start_time: chrono::Utc::now(),
            end_time: None,
        });
        self.step_count = 0;

        self.env.reset().await
    }

    async fn step(
        &mut self,
        action: Self::Action,
    ) -> crate::Result<Step<Self::Observation, Self::State>> {
        let step = self.env.step(action).await?;

        self.step_count += 1;
        if let Some(ref mut episode) = self.episode {
            episode.total_reward += step.reward.0;
            episode.steps = self.step_count;

            if step.done || step.truncated {
                episode.truncated = step.truncated;
                episode.end_time = Some(chrono::Utc::now());
            }
        }

        Ok(step)
    }

    async fn close(&mut self) -> crate::Result<()> {
        self.close_episode();
        self.env.close().await
    }

    fn episode_info(&self) -> Option<Episode> {
        self.episode.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContinuousAction, ContinuousSpace};

    #[derive(Debug, Clone)]
    struct Scalar(f64);

    impl Observation for Scalar {
        fn to_vec(&self) -> Vec<f64> {
            vec![self.0]
        }

        fn shape(&self) -> Vec<usize> {
            vec![1]
        }
    }

    impl State for Scalar {
        fn features(&self) -> Vec<f64> {
            vec![self.0]
        }
    }

    struct ScalarSpace;

    impl ObservationSpace for ScalarSpace {
        type Observation = Scalar;

        fn sample(&self) -> Scalar {
            Scalar(0.0)
        }

        fn contains(&self, _obs: &Scalar) -> bool {
            true
        }

        fn shape(&self) -> Vec<usize> {
            vec![1]
        }
    }

    /// Pays out the first action component and ends after three steps
    struct Counter {
        steps: usize,
    }

    #[async_trait]
    impl Environment for Counter {
        type Observation = Scalar;
        type Action = ContinuousAction;
        type State = Scalar;

        fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Scalar>> {
            Box::new(ScalarSpace)
        }

        fn action_space(&self) -> Box<dyn ActionSpace<Action = ContinuousAction>> {
            Box::new(ContinuousSpace::symmetric(1, 1.0))
        }

        async fn reset(&mut self) -> crate::Result<(Scalar, StepInfo)> {
            self.steps = 0;
            Ok((Scalar(0.0), StepInfo::default()))
        }

        async fn step(&mut self, action: ContinuousAction) -> crate::Result<Step<Scalar, Scalar>> {
            self.steps += 1;
            Ok(Step {
                observation: Scalar(0.0),
                reward: Reward(action.0[0]),
                done: self.steps >= 3,
                truncated: false,
                info: StepInfo::default().with("step", self.steps),
                state: None,
            })
        }
    }

    #[tokio::test]
    async fn tracks_returns_across_episodes() {
        let mut env = TrackedEnvironment::new(Counter { steps: 0 });

        for payout in [1.0, 0.5] {
            env.reset().await.unwrap();
            loop {
                let step = env.step(ContinuousAction(vec![payout])).await.unwrap();
                if step.done {
                    break;
                }
            }
        }
        env.close().await.unwrap();

        assert_eq!(env.history.len(), 2);
        assert!((env.history[0].total_reward - 3.0).abs() < 1e-12);
        assert_eq!(env.history[1].steps, 3);
        assert!(env.history.iter().all(|e| e.end_time.is_some()));
        assert!((env.mean_return().unwrap() - 2.25).abs() < 1e-12);
    }

    #[test]
    fn step_info_accessors() {
        let info = StepInfo::default().with("distance", 0.25).with("success", true);
        assert_eq!(info.get_f64("distance"), Some(0.25));
        assert_eq!(info.get_bool("success"), Some(true));
        assert_eq!(info.get_f64("missing"), None);
    }
}
