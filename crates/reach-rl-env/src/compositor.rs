//! Observation assembly: the rolling frame stack and the low-dimensional state

use nalgebra::Vector3;
use ndarray::{Array1, Array2, Array3, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use reach_rl_core::{Observation, ObservationSpace, RLError, Result, State};

use crate::actuation::ACTION_DIM;

/// Frames kept in the stack
pub const FRAME_STACK: usize = 4;
/// Side length of a square camera frame, in pixels
pub const FRAME_SIDE: usize = 64;
/// Length of [`LowDimState`]
pub const LOW_DIM_STATE_LEN: usize = ACTION_DIM + 3 + 1 + ACTION_DIM + 2;

/// Single-channel image with pixels normalized to `[0, 1]`
pub type Frame = Array2<f32>;

/// Owned copy of the frame stack, oldest frame first, shape `[stack, side, side]`
pub type FrameStackSnapshot = Array3<f32>;

/// Rolling, fixed-capacity stack of camera frames
#[derive(Debug, Clone)]
pub struct ObservationCompositor {
    frames: VecDeque<Frame>,
    capacity: usize,
    side: usize,
}

impl Default for ObservationCompositor {
    fn default() -> Self {
        Self::new(FRAME_STACK, FRAME_SIDE)
    }
}

impl ObservationCompositor {
    /// Create a stack of `capacity` blank `side`×`side` frames
    #[must_use]
    pub fn new(capacity: usize, side: usize) -> Self {
        let frames = (0..capacity).map(|_| Frame::zeros((side, side))).collect();
        Self {
            frames,
            capacity,
            side,
        }
    }

    /// Number of frames held
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frame side length in pixels
    #[must_use]
    pub fn side(&self) -> usize {
        self.side
    }

    /// Drop the oldest frame and append `frame` as the newest.
    ///
    /// # Errors
    ///
    /// [`RLError::DimensionMismatch`] if the frame is not `side`×`side`.
    pub fn push_frame(&mut self, frame: ArrayView2<'_, f32>) -> Result<FrameStackSnapshot> {
        self.check_shape(&frame)?;
        self.frames.pop_front();
        self.frames.push_back(frame.to_owned());
        Ok(self.snapshot())
    }

    /// Overwrite every slot with `frame`. Used at episode start.
    ///
    /// # Errors
    ///
    /// [`RLError::DimensionMismatch`] if the frame is not `side`×`side`.
    pub fn fill_frame(&mut self, frame: ArrayView2<'_, f32>) -> Result<FrameStackSnapshot> {
        self.check_shape(&frame)?;
        for slot in &mut self.frames {
            slot.assign(&frame);
        }
        Ok(self.snapshot())
    }

    /// Owned copy of the current stack
    #[must_use]
    pub fn snapshot(&self) -> FrameStackSnapshot {
        let shape = (self.frames.len(), self.side, self.side);
        Array3::from_shape_fn(shape, |(slot, row, col)| self.frames[slot][[row, col]])
    }

    fn check_shape(&self, frame: &ArrayView2<'_, f32>) -> Result<()> {
        let (rows, cols) = frame.dim();
        if rows != self.side || cols != self.side {
            return Err(RLError::DimensionMismatch {
                expected: self.side * self.side,
                actual: rows * cols,
            });
        }
        Ok(())
    }
}

/// Flat state vector:
/// `[joints(5), position error(3), distance, last action(5), reach flag, orient flag]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowDimState(pub Array1<f64>);

impl LowDimState {
    const ERROR: usize = ACTION_DIM;
    const DISTANCE: usize = ACTION_DIM + 3;
    const ACTION: usize = ACTION_DIM + 4;
    const REACH: usize = LOW_DIM_STATE_LEN - 2;
    const ORIENT: usize = LOW_DIM_STATE_LEN - 1;

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; the vector has a fixed length
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Joint angles slot
    #[must_use]
    pub fn joints(&self) -> &[f64] {
        &self.as_slice()[..Self::ERROR]
    }

    /// End-effector position minus goal position
    #[must_use]
    pub fn position_error(&self) -> &[f64] {
        &self.as_slice()[Self::ERROR..Self::DISTANCE]
    }

    /// Distance to the goal position
    #[must_use]
    pub fn distance(&self) -> f64 {
        self.0[Self::DISTANCE]
    }

    /// Action applied on the step that produced this state
    #[must_use]
    pub fn last_action(&self) -> &[f64] {
        &self.as_slice()[Self::ACTION..Self::REACH]
    }

    /// Whether the reach counter was positive
    #[must_use]
    pub fn reach_flag(&self) -> bool {
        self.0[Self::REACH] > 0.5
    }

    /// Whether the orientation reach counter was positive
    #[must_use]
    pub fn orient_flag(&self) -> bool {
        self.0[Self::ORIENT] > 0.5
    }

    fn as_slice(&self) -> &[f64] {
        self.0.as_slice().unwrap_or(&[])
    }
}

impl State for LowDimState {
    fn features(&self) -> Vec<f64> {
        self.0.to_vec()
    }
}

/// Build the low-dimensional state for one step. Pure.
#[must_use]
pub fn assemble_low_dim_state(
    joints: &[f64; ACTION_DIM],
    position: &Vector3<f64>,
    last_action: &[f64; ACTION_DIM],
    reach_flag: bool,
    orient_flag: bool,
    goal_position: &Vector3<f64>,
) -> LowDimState {
    let error = position - goal_position;
    let distance = error.norm();

    let mut values = Vec::with_capacity(LOW_DIM_STATE_LEN);
    values.extend_from_slice(joints);
    values.extend(error.iter());
    values.push(distance);
    values.extend_from_slice(last_action);
    values.push(f64::from(u8::from(reach_flag)));
    values.push(f64::from(u8::from(orient_flag)));

    LowDimState(Array1::from(values))
}

/// Observation pair returned to the agent
#[derive(Debug, Clone, PartialEq)]
pub struct ReachObservation {
    /// Stacked camera frames, oldest first
    pub vision: FrameStackSnapshot,
    /// Low-dimensional proprioceptive and goal state
    pub state: LowDimState,
}

impl Observation for ReachObservation {
    /// Vision pixels (row-major) followed by the low-dim state
    fn to_vec(&self) -> Vec<f64> {
        self.vision
            .iter()
            .map(|&p| f64::from(p))
            .chain(self.state.0.iter().copied())
            .collect()
    }

    /// Shape of the vision tensor
    fn shape(&self) -> Vec<usize> {
        self.vision.shape().to_vec()
    }
}

/// Space of [`ReachObservation`]s for a given stack geometry
#[derive(Debug, Clone, Copy)]
pub struct ReachObservationSpace {
    /// Frames per observation
    pub stack: usize,
    /// Frame side length
    pub side: usize,
}

impl Default for ReachObservationSpace {
    fn default() -> Self {
        Self {
            stack: FRAME_STACK,
            side: FRAME_SIDE,
        }
    }
}

impl ObservationSpace for ReachObservationSpace {
    type Observation = ReachObservation;

    fn sample(&self) -> ReachObservation {
        let mut rng = rand::thread_rng();
        let shape = (self.stack, self.side, self.side);
        let vision = Array3::from_shape_simple_fn(shape, || rng.gen_range(0.0..=1.0));
        let state = Array1::from_shape_simple_fn(LOW_DIM_STATE_LEN, || rng.gen_range(-1.0..1.0));
        ReachObservation {
            vision,
            state: LowDimState(state),
        }
    }

    fn contains(&self, obs: &ReachObservation) -> bool {
        obs.vision.shape() == [self.stack, self.side, self.side]
            && obs.vision.iter().all(|p| (0.0..=1.0).contains(p))
            && obs.state.len() == LOW_DIM_STATE_LEN
            && obs.state.0.iter().all(|v| v.is_finite())
    }

    fn shape(&self) -> Vec<usize> {
        vec![self.stack, self.side, self.side]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Axis;

    fn frame(value: f32) -> Frame {
        Frame::from_elem((FRAME_SIDE, FRAME_SIDE), value)
    }

    fn slot_value(snapshot: &FrameStackSnapshot, slot: usize) -> f32 {
        let plane = snapshot.index_axis(Axis(0), slot);
        let first = plane[[0, 0]];
        assert!(plane.iter().all(|&p| p == first), "slot {slot} is not uniform");
        first
    }

    #[test]
    fn snapshot_keeps_every_pixel_in_place() {
        let mut compositor = ObservationCompositor::new(3, 2);
        for base in [0.0f32, 10.0, 20.0] {
            let f = ndarray::arr2(&[[base, base + 1.0], [base + 2.0, base + 3.0]]);
            compositor.push_frame(f.view()).unwrap();
        }

        let snapshot = compositor.snapshot();
        assert_eq!(snapshot.dim(), (3, 2, 2));
        assert_eq!(snapshot[[0, 0, 1]], 1.0);
        assert_eq!(snapshot[[1, 1, 0]], 12.0);
        assert_eq!(snapshot[[2, 1, 1]], 23.0);
    }

    #[test]
    fn fill_sets_every_slot() {
        let mut compositor = ObservationCompositor::default();
        let snapshot = compositor.fill_frame(frame(0.25).view()).unwrap();
        assert_eq!(snapshot.shape(), &[FRAME_STACK, FRAME_SIDE, FRAME_SIDE]);
        for slot in 0..FRAME_STACK {
            assert_eq!(slot_value(&snapshot, slot), 0.25);
        }
    }

    #[test]
    fn push_shifts_left_over_five_frames() {
        let mut compositor = ObservationCompositor::default();
        compositor.fill_frame(frame(0.0).view()).unwrap();

        let mut snapshot = None;
        for i in 1..=5u8 {
            snapshot = Some(compositor.push_frame(frame(f32::from(i) / 10.0).view()).unwrap());
        }
        let snapshot = snapshot.unwrap();

        let values: Vec<f32> = (0..FRAME_STACK).map(|s| slot_value(&snapshot, s)).collect();
        assert_eq!(values, vec![0.2, 0.3, 0.4, 0.5]);
    }

    #[test]
    fn snapshot_does_not_alias_buffer() {
        let mut compositor = ObservationCompositor::default();
        let first = compositor.fill_frame(frame(0.1).view()).unwrap();
        compositor.push_frame(frame(0.9).view()).unwrap();
        assert_eq!(slot_value(&first, FRAME_STACK - 1), 0.1);
    }

    #[test]
    fn wrong_frame_shape_is_rejected() {
        let mut compositor = ObservationCompositor::default();
        let small = Frame::zeros((32, 32));
        assert!(matches!(
            compositor.push_frame(small.view()),
            Err(RLError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn low_dim_state_layout() {
        let state = assemble_low_dim_state(
            &[0.1, 0.2, 0.3, 0.4, 0.5],
            &Vector3::new(0.5, 0.3, 1.5),
            &[-1.0, -2.0, -3.0, -4.0, -5.0],
            true,
            false,
            &Vector3::new(0.5, 0.0, 1.1),
        );

        assert_eq!(state.len(), LOW_DIM_STATE_LEN);
        assert_eq!(state.len(), 16);
        assert_eq!(state.joints(), &[0.1, 0.2, 0.3, 0.4, 0.5]);
        assert_relative_eq!(state.position_error()[1], 0.3);
        assert_relative_eq!(state.position_error()[2], 0.4, epsilon = 1e-12);
        assert_relative_eq!(state.distance(), 0.5, epsilon = 1e-12);
        assert_eq!(state.last_action(), &[-1.0, -2.0, -3.0, -4.0, -5.0]);
        assert!(state.reach_flag());
        assert!(!state.orient_flag());
    }

    #[test]
    fn low_dim_state_length_is_fixed() {
        for scale in [0.0, 1e-9, 3.0, -250.0] {
            let state = assemble_low_dim_state(
                &[scale; ACTION_DIM],
                &Vector3::repeat(scale),
                &[scale; ACTION_DIM],
                scale > 0.0,
                scale < 0.0,
                &Vector3::zeros(),
            );
            assert_eq!(state.len(), 16);
        }
    }

    #[test]
    fn sampled_observations_are_contained() {
        let space = ReachObservationSpace::default();
        let obs = space.sample();
        assert!(space.contains(&obs));
        assert_eq!(obs.to_vec().len(), FRAME_STACK * FRAME_SIDE * FRAME_SIDE + LOW_DIM_STATE_LEN);
    }
}
