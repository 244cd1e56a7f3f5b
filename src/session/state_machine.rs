use crate::session::error::{SessionError, SessionResult};
use crate::session::types::{SessionEvent, SessionState};
use parking_lot::RwLock;
use std::sync::Arc;

/// Tracks the phase of one session. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    state: Arc<RwLock<SessionState>>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::AwaitingStart)),
        }
    }

    /// Get current state
    pub fn current_state(&self) -> SessionState {
        self.state.read().clone()
    }

    /// Transition state based on event
    pub fn transition(&self, event: SessionEvent) -> SessionResult<SessionState> {
        let mut state = self.state.write();

        let new_state = match (&*state, &event) {
            (SessionState::AwaitingStart, SessionEvent::StartReceived) => SessionState::Measuring,

            // Nothing to answer if the peer left before starting
            (SessionState::AwaitingStart, SessionEvent::ChannelLost) => SessionState::Closed,

            (SessionState::Measuring, SessionEvent::ProcessesReady) => {
                SessionState::AwaitingCompletion
            }

            (SessionState::AwaitingCompletion, SessionEvent::CompletionReceived) => {
                SessionState::Analyzing
            }

            (SessionState::Analyzing, SessionEvent::AnalysisFinished) => SessionState::Responding,

            // Every active phase fails over to responding with a partial result
            (
                SessionState::Measuring | SessionState::AwaitingCompletion | SessionState::Analyzing,
                SessionEvent::Failed { .. },
            ) => SessionState::Responding,

            (SessionState::Responding, SessionEvent::ResponseSent) => SessionState::Done,

            (SessionState::Responding, SessionEvent::ResponseUndeliverable) => SessionState::Closed,

            _ => {
                return Err(SessionError::InvalidStateTransition(format!(
                    "Cannot handle {:?} in state {:?}",
                    event, *state
                )));
            }
        };

        *state = new_state.clone();
        Ok(new_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed() -> SessionEvent {
        SessionEvent::Failed {
            error: "capturer did not start".into(),
        }
    }

    #[test]
    fn test_state_machine_creation() {
        let sm = SessionStateMachine::new();
        assert_eq!(sm.current_state(), SessionState::AwaitingStart);
    }

    #[test]
    fn test_happy_path() {
        let sm = SessionStateMachine::new();

        for (event, expected) in [
            (SessionEvent::StartReceived, SessionState::Measuring),
            (SessionEvent::ProcessesReady, SessionState::AwaitingCompletion),
            (SessionEvent::CompletionReceived, SessionState::Analyzing),
            (SessionEvent::AnalysisFinished, SessionState::Responding),
            (SessionEvent::ResponseSent, SessionState::Done),
        ] {
            assert_eq!(sm.transition(event).unwrap(), expected);
        }

        assert!(sm.current_state().is_terminal());
    }

    #[test]
    fn test_failure_from_each_active_phase() {
        let prefixes: [&[SessionEvent]; 3] = [
            &[SessionEvent::StartReceived],
            &[SessionEvent::StartReceived, SessionEvent::ProcessesReady],
            &[
                SessionEvent::StartReceived,
                SessionEvent::ProcessesReady,
                SessionEvent::CompletionReceived,
            ],
        ];

        for prefix in prefixes {
            let sm = SessionStateMachine::new();
            for event in prefix {
                sm.transition(event.clone()).unwrap();
            }
            assert_eq!(sm.transition(failed()).unwrap(), SessionState::Responding);
        }
    }

    #[test]
    fn test_undeliverable_response_closes() {
        let sm = SessionStateMachine::new();
        sm.transition(SessionEvent::StartReceived).unwrap();
        sm.transition(failed()).unwrap();
        sm.transition(SessionEvent::ResponseUndeliverable).unwrap();

        assert_eq!(sm.current_state(), SessionState::Closed);
    }

    #[test]
    fn test_channel_lost_before_start() {
        let sm = SessionStateMachine::new();
        sm.transition(SessionEvent::ChannelLost).unwrap();
        assert_eq!(sm.current_state(), SessionState::Closed);
    }

    #[test]
    fn test_invalid_transition() {
        let sm = SessionStateMachine::new();

        // Cannot finish analysis before measuring
        let result = sm.transition(SessionEvent::AnalysisFinished);
        assert!(result.is_err());

        // Cannot fail out of a session that has not started
        assert!(sm.transition(failed()).is_err());
        assert_eq!(sm.current_state(), SessionState::AwaitingStart);
    }

    #[test]
    fn test_clones_share_state() {
        let sm = SessionStateMachine::new();
        let observer = sm.clone();
        sm.transition(SessionEvent::StartReceived).unwrap();
        assert_eq!(observer.current_state(), SessionState::Measuring);
    }
}
