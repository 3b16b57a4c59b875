//! State representations

use std::fmt::Debug;

/// Trait for states in an RL environment
pub trait State: Clone + Debug + Send + Sync {
    /// Get a feature representation of the state
    fn features(&self) -> Vec<f64>;

    /// Check if this is a terminal state
    fn is_terminal(&self) -> bool {
        false
    }
}
