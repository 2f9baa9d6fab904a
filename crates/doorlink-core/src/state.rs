//! Validated state machine shared by the gateway and terminal lifecycles.
//!
//! The machine never reads the clock itself: every operation that depends on
//! time takes the caller's `now`, so the owning control loop (or a test) fully
//! controls elapsed time.
//!
//! # Examples
//!
//! ```
//! use std::fmt;
//! use std::time::{Duration, Instant};
//! use doorlink_core::state::{State, StateMachine};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! enum Lamp { Off, On }
//!
//! impl fmt::Display for Lamp {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl State for Lamp {
//!     fn can_transition_to(&self, target: &Self) -> bool {
//!         self != target
//!     }
//! }
//!
//! let t0 = Instant::now();
//! let mut machine = StateMachine::new(Lamp::Off, t0);
//! machine.transition_to(Lamp::On, t0).unwrap();
//! machine.set_timeout(Duration::from_secs(5));
//!
//! assert!(!machine.has_timed_out(t0 + Duration::from_secs(4)));
//! assert!(machine.has_timed_out(t0 + Duration::from_secs(5)));
//! assert!(machine.transition_to(Lamp::On, t0).is_err());
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use crate::{Result, error::Error};

/// Maximum number of state transitions kept in history.
///
/// A full connect cycle is four transitions, so this covers the last dozen
/// or so recovery cycles.
const MAX_HISTORY_SIZE: usize = 50;

/// A lifecycle state with a fixed transition table.
pub trait State: Copy + Eq + fmt::Debug + fmt::Display {
    /// Whether moving from `self` to `target` is allowed.
    fn can_transition_to(&self, target: &Self) -> bool;
}

/// One recorded state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition<S> {
    pub from: S,
    pub to: S,
    pub at: Instant,
}

/// State machine enforcing a transition table, with an optional per-state
/// timeout and bounded history.
#[derive(Debug, Clone)]
pub struct StateMachine<S: State> {
    current: S,
    entered_at: Instant,
    history: VecDeque<StateTransition<S>>,
    timeout: Option<Duration>,
}

impl<S: State> StateMachine<S> {
    pub fn new(initial: S, now: Instant) -> Self {
        Self {
            current: initial,
            entered_at: now,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
            timeout: None,
        }
    }

    pub fn current(&self) -> S {
        self.current
    }

    /// When the current state was entered.
    pub fn entered_at(&self) -> Instant {
        self.entered_at
    }

    pub fn time_in_state(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.entered_at)
    }

    /// Arm a timeout for the current state. Cleared on every transition.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    pub fn has_timed_out(&self, now: Instant) -> bool {
        self.timeout
            .is_some_and(|timeout| self.time_in_state(now) >= timeout)
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition<S>> {
        &self.history
    }

    /// Move to `new_state` if the transition table allows it.
    ///
    /// # Errors
    /// Returns `Error::InvalidStateTransition` and leaves the machine
    /// unchanged if the transition is not allowed.
    pub fn transition_to(&mut self, new_state: S, now: Instant) -> Result<StateTransition<S>> {
        if !self.current.can_transition_to(&new_state) {
            return Err(Error::InvalidStateTransition {
                from: self.current.to_string(),
                to: new_state.to_string(),
            });
        }

        let transition = StateTransition {
            from: self.current,
            to: new_state,
            at: now,
        };
        self.current = new_state;
        self.entered_at = now;
        self.timeout = None;

        if self.history.len() == MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(transition);
        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Phase {
        Idle,
        Busy,
        Done,
    }

    impl fmt::Display for Phase {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl State for Phase {
        fn can_transition_to(&self, target: &Self) -> bool {
            matches!(
                (self, target),
                (Phase::Idle, Phase::Busy) | (Phase::Busy, Phase::Done) | (Phase::Done, Phase::Idle)
            )
        }
    }

    #[test]
    fn test_valid_transition_recorded() {
        let t0 = Instant::now();
        let mut machine = StateMachine::new(Phase::Idle, t0);
        let later = t0 + Duration::from_millis(5);

        let transition = machine.transition_to(Phase::Busy, later).unwrap();
        assert_eq!(transition.from, Phase::Idle);
        assert_eq!(transition.to, Phase::Busy);
        assert_eq!(machine.current(), Phase::Busy);
        assert_eq!(machine.entered_at(), later);
        assert_eq!(machine.history().len(), 1);
    }

    #[test]
    fn test_invalid_transition_leaves_state() {
        let t0 = Instant::now();
        let mut machine = StateMachine::new(Phase::Idle, t0);

        match machine.transition_to(Phase::Done, t0) {
            Err(Error::InvalidStateTransition { from, to }) => {
                assert_eq!(from, "Idle");
                assert_eq!(to, "Done");
            }
            other => panic!("expected InvalidStateTransition, got {other:?}"),
        }
        assert_eq!(machine.current(), Phase::Idle);
        assert!(machine.history().is_empty());
    }

    #[test]
    fn test_timeout_cleared_on_transition() {
        let t0 = Instant::now();
        let mut machine = StateMachine::new(Phase::Idle, t0);
        machine.set_timeout(Duration::from_secs(1));
        assert!(!machine.has_timed_out(t0 + Duration::from_millis(999)));
        assert!(machine.has_timed_out(t0 + Duration::from_secs(1)));

        machine.transition_to(Phase::Busy, t0).unwrap();
        assert!(!machine.has_timed_out(t0 + Duration::from_secs(60)));
    }

    #[test]
    fn test_history_is_bounded() {
        let t0 = Instant::now();
        let mut machine = StateMachine::new(Phase::Idle, t0);
        for _ in 0..100 {
            machine.transition_to(Phase::Busy, t0).unwrap();
            machine.transition_to(Phase::Done, t0).unwrap();
            machine.transition_to(Phase::Idle, t0).unwrap();
        }
        assert_eq!(machine.history().len(), MAX_HISTORY_SIZE);
        assert_eq!(machine.history().back().map(|t| t.to), Some(Phase::Idle));
    }
}
