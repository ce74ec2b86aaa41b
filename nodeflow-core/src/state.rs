//! State management for nodeflow nodes.

/// Trait representing a state in a node's execution.
///
/// States define the current position in the execution and control
/// which transitions are valid.
pub trait FlowState:
    Clone + PartialEq + Eq + std::hash::Hash + std::fmt::Debug + Send + Sync + 'static
{
    /// Returns true if this is a terminal state (execution should stop).
    fn is_terminal(&self) -> bool;

    /// Returns true if this state can transition to the target state.
    /// Default implementation allows all transitions.
    fn can_transition_to(&self, _target: &Self) -> bool {
        true
    }
}

/// State transition information.
#[derive(Clone, Debug)]
pub struct StateTransition<S: FlowState> {
    /// Source state
    pub from: S,
    /// Target state
    pub to: S,
}

impl<S: FlowState> StateTransition<S> {
    /// Create a new state transition.
    pub fn new(from: S, to: S) -> Self {
        Self { from, to }
    }

    /// Check if this transition is valid.
    pub fn is_valid(&self) -> bool {
        !self.from.is_terminal() && self.from.can_transition_to(&self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    enum Light {
        Red,
        Green,
        Off,
    }

    impl FlowState for Light {
        fn is_terminal(&self) -> bool {
            matches!(self, Light::Off)
        }

        fn can_transition_to(&self, target: &Self) -> bool {
            !matches!((self, target), (Light::Red, Light::Red) | (Light::Green, Light::Green))
        }
    }

    #[test]
    fn test_state_transition_validity() {
        assert!(StateTransition::new(Light::Red, Light::Green).is_valid());
        assert!(!StateTransition::new(Light::Red, Light::Red).is_valid());
        assert!(!StateTransition::new(Light::Off, Light::Green).is_valid());
    }
}
