//! Action representations and action spaces

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for actions in an RL environment
pub trait Action: Clone + Debug + Send + Sync {
    /// Convert action to a vector representation
    fn to_vec(&self) -> Vec<f64>;
}

/// Trait for defining action spaces
pub trait ActionSpace: Send + Sync {
    /// The type of actions in this space
    type Action: Action;

    /// Sample a random action from the space
    fn sample(&self) -> Self::Action;

    /// Check if an action is valid within this space
    fn contains(&self, action: &Self::Action) -> bool;

    /// Get the dimensionality of the action space
    fn dim(&self) -> Option<usize>;
}

/// Continuous action (e.g., joint increments for continuous control)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousAction(pub Vec<f64>);

impl ContinuousAction {
    /// A zero action of the given dimension
    #[must_use]
    pub fn zeros(dim: usize) -> Self {
        Self(vec![0.0; dim])
    }

    /// Euclidean norm of the action vector
    #[must_use]
    pub fn norm(&self) -> f64 {
        self.0.iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    /// Copy the action into a fixed-size array.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RLError::DimensionMismatch`] when the action does not
    /// have exactly `N` components.
    pub fn to_array<const N: usize>(&self) -> crate::Result<[f64; N]> {
        <[f64; N]>::try_from(self.0.as_slice()).map_err(|_| crate::RLError::DimensionMismatch {
            expected: N,
            actual: self.0.len(),
        })
    }
}

impl Action for ContinuousAction {
    fn to_vec(&self) -> Vec<f64> {
        self.0.clone()
    }
}

impl From<Vec<f64>> for ContinuousAction {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Continuous action space (box)
#[derive(Debug, Clone)]
pub struct ContinuousSpace {
    /// Lower bounds for each dimension
    pub low: Vec<f64>,
    /// Upper bounds for each dimension
    pub high: Vec<f64>,
}

impl ContinuousSpace {
    /// Create a new continuous action space
    ///
    /// # Errors
    ///
    /// Returns [`crate::RLError::DimensionMismatch`] when the bound vectors
    /// differ in length.
    pub fn new(low: Vec<f64>, high: Vec<f64>) -> crate::Result<Self> {
        if low.len() != high.len() {
            return Err(crate::RLError::DimensionMismatch {
                expected: low.len(),
                actual: high.len(),
            });
        }
        Ok(Self { low, high })
    }

    /// Box of `dim` dimensions bounded by `[-limit, limit]` on every axis
    #[must_use]
    pub fn symmetric(dim: usize, limit: f64) -> Self {
        Self {
            low: vec![-limit; dim],
            high: vec![limit; dim],
        }
    }

    /// Sample using a caller-supplied generator
    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> ContinuousAction {
        let values: Vec<f64> = self
            .low
            .iter()
            .zip(&self.high)
            .map(|(l, h)| if l < h { rng.gen_range(*l..*h) } else { *l })
            .collect();

        ContinuousAction(values)
    }
}

impl ActionSpace for ContinuousSpace {
    type Action = ContinuousAction;

    fn sample(&self) -> Self::Action {
        self.sample_with(&mut rand::thread_rng())
    }

    fn contains(&self, action: &Self::Action) -> bool {
        action.0.len() == self.low.len()
            && action
                .0
                .iter()
                .zip(&self.low)
                .zip(&self.high)
                .all(|((x, l), h)| x >= l && x <= h)
    }

    fn dim(&self) -> Option<usize> {
        Some(self.low.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn to_array_rejects_wrong_length() {
        let action = ContinuousAction(vec![0.1, 0.2, 0.3]);
        assert!(action.to_array::<3>().is_ok());
        match action.to_array::<5>() {
            Err(crate::RLError::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, 5);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn mismatched_bounds_are_rejected() {
        assert!(ContinuousSpace::new(vec![0.0; 2], vec![1.0; 3]).is_err());
    }

    proptest! {
        #[test]
        fn samples_stay_inside_the_box(limit in 0.001f64..10.0, dim in 1usize..8) {
            let space = ContinuousSpace::symmetric(dim, limit);
            let action = space.sample();
            prop_assert_eq!(action.0.len(), dim);
            prop_assert!(space.contains(&action));
        }
    }
}
