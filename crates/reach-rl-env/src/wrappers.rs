//! Episode-length cap

use async_trait::async_trait;
use tracing::debug;

use reach_rl_core::{ActionSpace, Environment, Episode, ObservationSpace, Result, Step, StepInfo};

use crate::controller::ReachEnv;

/// Ends an episode as truncated once it has run `max_steps` completed steps.
///
/// Only steps the inner environment accepted count towards the cap; a step
/// that returns an error leaves the count untouched. With no cap the wrapper
/// passes everything through.
pub struct TimeLimit<E> {
    env: E,
    max_steps: Option<usize>,
    elapsed: usize,
}

impl<E> TimeLimit<E> {
    /// Cap episodes of `env` at `max_steps` steps
    pub fn new(env: E, max_steps: usize) -> Self {
        Self::with_cap(env, Some(max_steps))
    }

    /// Cap episodes at `max_steps` steps, or not at all for `None`
    pub fn with_cap(env: E, max_steps: Option<usize>) -> Self {
        Self {
            env,
            max_steps,
            elapsed: 0,
        }
    }

    /// The cap in force, if any
    #[must_use]
    pub fn max_steps(&self) -> Option<usize> {
        self.max_steps
    }

    /// Completed steps in the current episode
    #[must_use]
    pub fn elapsed(&self) -> usize {
        self.elapsed
    }

    /// The wrapped environment
    pub fn inner(&self) -> &E {
        &self.env
    }

    /// Unwrap the inner environment
    pub fn into_inner(self) -> E {
        self.env
    }
}

impl TimeLimit<ReachEnv> {
    /// Wrap `env` with the cap from its `max_episode_steps` setting
    #[must_use]
    pub fn from_config(env: ReachEnv) -> Self {
        let cap = env.config().max_episode_steps;
        Self::with_cap(env, cap)
    }
}

impl ReachEnv {
    /// Shorthand for [`TimeLimit::from_config`]
    #[must_use]
    pub fn time_limited(self) -> TimeLimit<Self> {
        TimeLimit::from_config(self)
    }
}

#[async_trait]
impl<E> Environment for TimeLimit<E>
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

    async fn reset(&mut self) -> Result<(Self::Observation, StepInfo)> {
        let reset = self.env.reset().await?;
        self.elapsed = 0;
        Ok(reset)
    }

    async fn step(
        &mut self,
        action: Self::Action,
    ) -> Result<Step<Self::Observation, Self::State>> {
        let mut step = self.env.step(action).await?;
        self.elapsed += 1;

        let capped = self.max_steps.is_some_and(|max| self.elapsed >= max);
        if capped && !step.done {
            debug!(steps = self.elapsed, "episode truncated by time limit");
            step.truncated = true;
            step.done = true;
            step.info = step.info.with("time_limit", true);
        }

        Ok(step)
    }

    async fn close(&mut self) -> Result<()> {
        self.env.close().await
    }

    fn episode_info(&self) -> Option<Episode> {
        self.env.episode_info()
    }
}
