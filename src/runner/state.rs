//! Handler and inspector state machines

use crate::error::StateError;
use std::fmt;
use tokio::sync::watch;

/// Lifecycle of a task handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerState {
    Uninitialized,
    Initialized,
    Monitoring,
    Executing,
    Stopping,
    Cancelled,
    DoneSuccess,
    DoneFail,
}

impl HandlerState {
    pub fn can_transition_to(self, next: HandlerState) -> bool {
        use HandlerState::*;
        matches!(
            (self, next),
            (Uninitialized, Initialized)
                | (Initialized, Monitoring | Executing | Stopping)
                | (Monitoring, Executing | DoneFail | Stopping)
                | (Executing, DoneSuccess | DoneFail | Stopping)
                | (Stopping, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            HandlerState::DoneSuccess | HandlerState::DoneFail | HandlerState::Cancelled
        )
    }
}

impl fmt::Display for HandlerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandlerState::Uninitialized => "Uninitialized",
            HandlerState::Initialized => "Initialized",
            HandlerState::Monitoring => "Monitoring",
            HandlerState::Executing => "Executing",
            HandlerState::Stopping => "Stopping",
            HandlerState::Cancelled => "Cancelled",
            HandlerState::DoneSuccess => "FinishWithSuccessful",
            HandlerState::DoneFail => "FinishWithFailed",
        };
        f.write_str(name)
    }
}

/// Lifecycle of a condition inspector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InspectorState {
    Pending,
    Satisfied,
    Cancelled,
    Failed,
}

impl InspectorState {
    pub fn can_transition_to(self, next: InspectorState) -> bool {
        matches!(
            (self, next),
            (
                InspectorState::Pending,
                InspectorState::Satisfied | InspectorState::Cancelled | InspectorState::Failed
            )
        )
    }

    pub fn is_terminal(self) -> bool {
        self != InspectorState::Pending
    }
}

impl fmt::Display for InspectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A state type with a transition table
pub trait Transition: Copy + PartialEq + fmt::Display + Send + Sync + 'static {
    fn allows(self, next: Self) -> bool;
}

impl Transition for HandlerState {
    fn allows(self, next: Self) -> bool {
        self.can_transition_to(next)
    }
}

impl Transition for InspectorState {
    fn allows(self, next: Self) -> bool {
        self.can_transition_to(next)
    }
}

/// Shared, observable state that only moves along its transition table
#[derive(Debug)]
pub struct StateCell<S> {
    tx: watch::Sender<S>,
}

impl<S: Transition> StateCell<S> {
    pub fn new(initial: S) -> Self {
        let (tx, _rx) = watch::channel(initial);
        StateCell { tx }
    }

    pub fn get(&self) -> S {
        *self.tx.borrow()
    }

    /// Atomically move to `next`, rejecting transitions the table forbids
    pub fn transition(&self, next: S) -> Result<S, StateError> {
        let mut outcome = Ok(next);
        self.tx.send_if_modified(|current| {
            if current.allows(next) {
                outcome = Ok(*current);
                *current = next;
                true
            } else {
                outcome = Err(StateError::IllegalTransition {
                    from: current.to_string(),
                    to: next.to_string(),
                });
                false
            }
        });
        outcome
    }

    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_happy_path() {
        let cell = StateCell::new(HandlerState::Uninitialized);
        for next in [
            HandlerState::Initialized,
            HandlerState::Monitoring,
            HandlerState::Executing,
            HandlerState::DoneSuccess,
        ] {
            assert!(cell.transition(next).is_ok(), "failed to enter {}", next);
        }
        assert!(cell.get().is_terminal());
    }

    #[test]
    fn test_illegal_transition_is_error() {
        let cell = StateCell::new(HandlerState::Initialized);
        let result = cell.transition(HandlerState::DoneSuccess);
        assert_eq!(
            result,
            Err(StateError::IllegalTransition {
                from: "Initialized".to_string(),
                to: "FinishWithSuccessful".to_string(),
            })
        );
        assert_eq!(cell.get(), HandlerState::Initialized);
    }

    #[test]
    fn test_cancelled_is_sticky() {
        let cell = StateCell::new(HandlerState::Executing);
        cell.transition(HandlerState::Stopping).unwrap();
        cell.transition(HandlerState::Cancelled).unwrap();

        assert!(cell.transition(HandlerState::DoneFail).is_err());
        assert!(cell.transition(HandlerState::Stopping).is_err());
        assert_eq!(cell.get(), HandlerState::Cancelled);
    }

    #[test]
    fn test_stop_reachable_from_live_states() {
        for state in [
            HandlerState::Initialized,
            HandlerState::Monitoring,
            HandlerState::Executing,
        ] {
            assert!(state.can_transition_to(HandlerState::Stopping));
        }
        for state in [
            HandlerState::DoneSuccess,
            HandlerState::DoneFail,
            HandlerState::Cancelled,
        ] {
            assert!(!state.can_transition_to(HandlerState::Stopping));
        }
    }

    #[test]
    fn test_monitoring_cannot_skip_to_success() {
        assert!(!HandlerState::Monitoring.can_transition_to(HandlerState::DoneSuccess));
    }

    #[test]
    fn test_inspector_transitions() {
        let cell = StateCell::new(InspectorState::Pending);
        cell.transition(InspectorState::Satisfied).unwrap();
        assert!(cell.transition(InspectorState::Cancelled).is_err());
        assert!(cell.get().is_terminal());
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let cell = StateCell::new(HandlerState::Uninitialized);
        let mut rx = cell.subscribe();
        cell.transition(HandlerState::Initialized).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), HandlerState::Initialized);
    }
}
