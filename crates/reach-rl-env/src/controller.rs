//! Episode controller for the vision-guided reach task
//!
//! One `ReachEnv` owns the joint state, the frame stack, the episode
//! counters and the current goal. Each `step` runs strictly in sequence:
//! command the arm and wait for it to finish, read the end-effector pose,
//! pull a camera frame, build the observation, then score the step.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use nalgebra::{Isometry3, Vector3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use reach_rl_core::{
    ActionSpace, ContinuousAction, ContinuousSpace, Environment, ObservationSpace, RLError,
    Result, Step, StepInfo,
};

use crate::actuation::{Actuation, JointActuationModel, JointVector, ACTION_DIM, JOINT_COUNT};
use crate::compositor::{
    assemble_low_dim_state, Frame, LowDimState, ObservationCompositor, ReachObservation,
    ReachObservationSpace,
};
use crate::config::{Range, ReachEnvConfig};
use crate::latch::{spawn_collision_listener, CollisionLatch};
use crate::pose::{GoalPose, Pose};
use crate::ports::{
    ArmInterfaces, CameraSource, GripperActuator, JointActuator, PoseOracle, SceneObjectService,
};
use crate::reward::{EpisodeCounters, Evaluation, RewardShapingEngine};

const ZERO_VELOCITY: JointVector = [0.0; JOINT_COUNT];

/// Where the controller is in the episode cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodePhase {
    /// No episode has started
    Idle,
    /// Sampling the goal and placing markers
    TargetGenerating,
    /// Accepting steps
    Running,
    /// Last step was terminal; `reset` starts the next episode
    Terminated,
    /// `close` was called; the contact listener is gone and no further
    /// episodes can run
    Closed,
}

/// A step taken for exploration, with the action that produced it
#[derive(Debug, Clone)]
pub struct ExplorationStep {
    /// The environment step
    pub step: Step<ReachObservation, LowDimState>,
    /// The raw action that was applied
    pub action: ContinuousAction,
}

/// Model definitions spawned for the goal and obstacle markers
#[derive(Debug, Clone, Default)]
struct MarkerModels {
    goal: String,
    obstacle: String,
}

/// Vision-guided reach-and-orient environment
pub struct ReachEnv {
    config: ReachEnvConfig,
    joint_names: Vec<String>,
    actuator: Arc<dyn JointActuator>,
    poses: Arc<dyn PoseOracle>,
    camera: Arc<dyn CameraSource>,
    scene: Arc<dyn SceneObjectService>,
    latch: Arc<CollisionLatch>,
    listener: JoinHandle<()>,
    models: MarkerModels,
    actuation: JointActuationModel,
    compositor: ObservationCompositor,
    engine: RewardShapingEngine,
    counters: EpisodeCounters,
    joints: JointVector,
    goal: GoalPose,
    phase: EpisodePhase,
    rng: StdRng,
}

impl ReachEnv {
    /// Connect to the arm and close the gripper.
    ///
    /// # Errors
    ///
    /// Invalid configuration, or the gripper not completing its close
    /// command within the retry budget.
    pub async fn new(config: ReachEnvConfig, interfaces: ArmInterfaces) -> Result<Self> {
        config.validate()?;

        let ArmInterfaces {
            actuator,
            gripper,
            poses,
            camera,
            scene,
            contacts,
        } = interfaces;

        let latch = Arc::new(CollisionLatch::new());
        let listener = spawn_collision_listener(Arc::clone(&latch), contacts);

        let models = MarkerModels {
            goal: load_model(config.markers.goal_model_path.as_deref()).await,
            obstacle: load_model(config.markers.obstacle_model_path.as_deref()).await,
        };

        close_gripper(gripper.as_ref(), &config).await?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            joint_names: config.prefixed_joint_names(),
            joints: config.initial_joints,
            goal: config.base_goal,
            engine: RewardShapingEngine::new(config.reward.clone()),
            config,
            actuator,
            poses,
            camera,
            scene,
            latch,
            listener,
            models,
            actuation: JointActuationModel::default(),
            compositor: ObservationCompositor::default(),
            counters: EpisodeCounters::default(),
            phase: EpisodePhase::Idle,
            rng,
        })
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &ReachEnvConfig {
        &self.config
    }

    /// Current episode phase
    #[must_use]
    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    /// Goal for the current episode
    #[must_use]
    pub fn goal(&self) -> &GoalPose {
        &self.goal
    }

    /// Counters for the current episode
    #[must_use]
    pub fn counters(&self) -> &EpisodeCounters {
        &self.counters
    }

    /// Accumulated (unbounded) joint state
    #[must_use]
    pub fn joints(&self) -> &JointVector {
        &self.joints
    }

    /// Step counts at which past episodes succeeded
    #[must_use]
    pub fn success_steps(&self) -> &[usize] {
        self.engine.success_steps()
    }

    /// Shared collision latch
    #[must_use]
    pub fn collision_latch(&self) -> Arc<CollisionLatch> {
        Arc::clone(&self.latch)
    }

    /// Same as [`Environment::step`], also handing back the action taken.
    /// Used for open-loop data collection.
    ///
    /// # Errors
    ///
    /// As for [`Environment::step`].
    pub async fn uniform_exploration(
        &mut self,
        action: ContinuousAction,
    ) -> Result<ExplorationStep> {
        let step = self.advance(&action).await?;
        Ok(ExplorationStep { step, action })
    }

    async fn advance(
        &mut self,
        action: &ContinuousAction,
    ) -> Result<Step<ReachObservation, LowDimState>> {
        if self.phase != EpisodePhase::Running {
            return Err(RLError::InvalidState(format!(
                "step called while {:?}; call reset first",
                self.phase
            )));
        }
        let delta: [f64; ACTION_DIM] = action.to_array()?;

        self.counters.step_count += 1;
        let actuation = self.actuation.compute_command(&self.joints, &delta);
        self.joints = actuation.next_joints;
        self.dispatch(&actuation).await?;

        let pose = self.end_effector_pose().await?;
        let frame = self.next_frame().await?;
        let vision = self.compositor.push_frame(frame.view())?;

        // flags reflect the counters before this step is scored
        let state = assemble_low_dim_state(
            &actuation.commanded_joints(),
            &pose.position,
            &delta,
            self.counters.reach_flag(),
            self.counters.orient_flag(),
            &self.goal.position,
        );

        self.counters.collision_flag = self.latch.triggered();
        let eval = self
            .engine
            .evaluate(&pose, &delta, &self.goal, &mut self.counters, &self.latch);

        if eval.terminal {
            self.phase = EpisodePhase::Terminated;
            info!(
                steps = self.counters.step_count,
                success = eval.success,
                collision = eval.collision,
                "episode finished"
            );
        }
        debug!(
            step = self.counters.step_count,
            reward = eval.reward.0,
            distance = eval.distance,
            action_norm = action.norm(),
            "step"
        );

        Ok(Step {
            observation: ReachObservation {
                vision,
                state: state.clone(),
            },
            reward: eval.reward,
            done: eval.terminal,
            truncated: false,
            info: self.step_info(&eval),
            state: Some(state),
        })
    }

    async fn dispatch(&self, actuation: &Actuation) -> Result<()> {
        self.config
            .retry
            .within(
                "joint trajectory",
                self.actuator.send_command(
                    &self.joint_names,
                    &actuation.command,
                    &ZERO_VELOCITY,
                    self.config.command_duration(),
                ),
            )
            .await
    }

    async fn end_effector_pose(&self) -> Result<Pose> {
        let frames = &self.config.frames;
        self.config
            .retry
            .wait_for("end-effector transform", || {
                self.poses.lookup_transform(&frames.reference_frame, &frames.end_effector)
            })
            .await
    }

    async fn next_frame(&self) -> Result<Frame> {
        self.config.retry.wait_for("camera frame", || self.camera.frame()).await
    }

    fn sample_goal(&mut self) -> GoalPose {
        let p = self.config.goal_perturbation;
        let offset = Vector3::new(
            sample_range(&mut self.rng, p.x),
            sample_range(&mut self.rng, p.y),
            sample_range(&mut self.rng, p.z),
        );
        self.config.base_goal.offset(offset)
    }

    /// Remove last episode's markers, return the arm to its initial pose,
    /// open the collision window, then spawn the new markers.
    async fn place_markers(&mut self) -> Result<()> {
        let markers = self.config.markers.clone();
        let retry = self.config.retry;

        for name in [&markers.goal_name, &markers.obstacle_name] {
            if let Err(err) = retry.within("delete model", self.scene.delete(name)).await {
                warn!(model = %name, %err, "delete_model service call failed");
            }
        }

        // contacts while returning to the start pose are not charged
        self.latch.disarm();
        retry
            .within(
                "initial pose",
                self.actuator.send_command(
                    &self.joint_names,
                    &self.config.initial_joints,
                    &ZERO_VELOCITY,
                    self.config.command_duration(),
                ),
            )
            .await?;
        self.latch.clear();
        self.latch.arm();

        let g = self.goal.position;
        let goal_pose = Isometry3::translation(g.x, g.y, g.z + markers.goal_z_offset);
        let [ox, _, oz] = markers.obstacle_position;
        let oy = sample_range(&mut self.rng, markers.obstacle_lateral_range);
        let obstacle_pose = Isometry3::translation(ox, oy, oz);

        for (name, model, pose) in [
            (&markers.goal_name, &self.models.goal, goal_pose),
            (&markers.obstacle_name, &self.models.obstacle, obstacle_pose),
        ] {
            let spawn = self.scene.spawn(name, model, &pose, &markers.reference_frame);
            if let Err(err) = retry.within("spawn model", spawn).await {
                warn!(model = %name, %err, "spawn_model service call failed");
            }
        }

        Ok(())
    }

    fn step_info(&self, eval: &Evaluation) -> StepInfo {
        StepInfo::default()
            .with("step", self.counters.step_count)
            .with("distance", eval.distance)
            .with("orientation_error", eval.orientation_error)
            .with("reach_counter", self.counters.reach_counter)
            .with("orient_reach_counter", self.counters.orient_reach_counter)
            .with("collision", eval.collision)
            .with("success", eval.success)
    }

    fn goal_info(&self) -> StepInfo {
        let g = &self.goal;
        StepInfo::default().with(
            "goal",
            serde_json::json!([
                g.position.x,
                g.position.y,
                g.position.z,
                g.orientation.x,
                g.orientation.y,
                g.orientation.z
            ]),
        )
    }
}

#[async_trait]
impl Environment for ReachEnv {
    type Observation = ReachObservation;
    type Action = ContinuousAction;
    type State = LowDimState;

    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>> {
        Box::new(ReachObservationSpace {
            stack: self.compositor.capacity(),
            side: self.compositor.side(),
        })
    }

    fn action_space(&self) -> Box<dyn ActionSpace<Action = Self::Action>> {
        Box::new(ContinuousSpace::symmetric(ACTION_DIM, self.config.action_limit))
    }

    async fn reset(&mut self) -> Result<(Self::Observation, StepInfo)> {
        if self.phase == EpisodePhase::Closed {
            return Err(RLError::InvalidState("reset called after close".to_string()));
        }
        self.phase = EpisodePhase::TargetGenerating;
        self.joints = self.config.initial_joints;
        self.counters.reset();
        self.latch.clear();

        self.goal = self.sample_goal();
        self.place_markers().await?;

        let frame = self.next_frame().await?;
        let vision = self.compositor.fill_frame(frame.view())?;
        let pose = self.end_effector_pose().await?;

        let mut joints = [0.0; ACTION_DIM];
        joints.copy_from_slice(&self.joints[..ACTION_DIM]);
        let state = assemble_low_dim_state(
            &joints,
            &pose.position,
            &[0.0; ACTION_DIM],
            false,
            false,
            &self.goal.position,
        );

        self.phase = EpisodePhase::Running;
        info!(
            goal_x = self.goal.position.x,
            goal_y = self.goal.position.y,
            goal_z = self.goal.position.z,
            "episode started"
        );

        Ok((ReachObservation { vision, state }, self.goal_info()))
    }

    async fn step(&mut self, action: Self::Action) -> Result<Step<Self::Observation, Self::State>> {
        self.advance(&action).await
    }

    async fn close(&mut self) -> Result<()> {
        if self.phase == EpisodePhase::Closed {
            return Ok(());
        }
        let markers = &self.config.markers;
        let retry = self.config.retry;
        for name in [&markers.goal_name, &markers.obstacle_name] {
            if let Err(err) = retry.within("delete model", self.scene.delete(name)).await {
                warn!(model = %name, %err, "delete_model service call failed");
            }
        }
        self.latch.disarm();
        self.latch.clear();
        self.listener.abort();
        self.phase = EpisodePhase::Closed;
        debug!("environment closed");
        Ok(())
    }
}

impl Drop for ReachEnv {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

fn sample_range(rng: &mut StdRng, range: Range) -> f64 {
    if range[0] < range[1] {
        Uniform::new(range[0], range[1]).sample(rng)
    } else {
        range[0]
    }
}

async fn close_gripper(gripper: &dyn GripperActuator, config: &ReachEnvConfig) -> Result<()> {
    config
        .retry
        .within(
            "gripper close",
            gripper.send_command(config.gripper_close_position, config.command_duration()),
        )
        .await?;
    debug!(position = config.gripper_close_position, "gripper closed");
    Ok(())
}

async fn load_model(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return String::new();
    };
    match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(err) => {
            warn!(
                path = %path.display(),
                %err,
                "could not read marker model, spawning without definition"
            );
            String::new()
        }
    }
}
