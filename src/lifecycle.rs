//! Request and websocket lifecycle state machines.
use std::sync::{Arc, Mutex, PoisonError};

/// State of one HTTP exchange.
///
/// ```text
/// Received -> Routed -> Handling -> Coerced -> Sent
///     \_________\__________\__________\-> Failed -> Sent
/// ```
///
/// A middleware may answer without reaching the router, in which case the exchange goes from
/// `Received` straight to `Sent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpState {
    Received,
    Routed,
    Handling,
    Coerced,
    Failed,
    Sent,
}

impl HttpState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }

    fn can_advance(self, to: Self) -> bool {
        use HttpState::*;
        matches!(
            (self, to),
            (Received, Routed)
                | (Routed, Handling)
                | (Handling, Coerced)
                | (Coerced, Sent)
                | (Received, Sent)
                | (Failed, Sent)
                | (Received | Routed | Handling | Coerced, Failed)
        )
    }
}

/// State of one websocket session.
///
/// ```text
/// Connecting -> Accepted -> Open -> Closing -> Closed
///           \-> Rejected
/// ```
///
/// A host disconnect moves any state directly to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WsState {
    Connecting,
    Accepted,
    Rejected,
    Open,
    Closing,
    Closed,
}

impl WsState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Closed)
    }

    pub(crate) fn can_advance(self, to: Self) -> bool {
        use WsState::*;
        matches!(
            (self, to),
            (Connecting, Accepted | Rejected)
                | (Accepted, Open)
                | (Open, Closing)
                | (Connecting | Accepted | Open | Closing, Closed)
        )
    }
}

/// An illegal state transition.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid transition from {from:?} to {to:?}")]
pub struct InvalidTransition<S: std::fmt::Debug> {
    pub from: S,
    pub to: S,
}

/// Shared record of the states one HTTP exchange went through.
///
/// Cloning is cheap, every clone observes the same exchange.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    history: Arc<Mutex<Vec<HttpState>>>,
}

impl Lifecycle {
    /// Create new `Lifecycle` in the `Received` state.
    pub fn new() -> Self {
        Self {
            history: Arc::new(Mutex::new(vec![HttpState::Received])),
        }
    }

    pub fn state(&self) -> HttpState {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.last().copied().unwrap_or(HttpState::Received)
    }

    /// Move to `to`, illegal transitions leave the state unchanged.
    ///
    /// Moving to the current state is a no-op.
    pub fn advance(&self, to: HttpState) -> Result<(), InvalidTransition<HttpState>> {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let from = history.last().copied().unwrap_or(HttpState::Received);
        if from == to {
            return Ok(());
        }
        if !from.can_advance(to) {
            return Err(InvalidTransition { from, to });
        }
        history.push(to);
        Ok(())
    }

    /// Like [`advance`][Lifecycle::advance], an illegal transition is only logged.
    pub(crate) fn mark(&self, to: HttpState) {
        if let Err(_err) = self.advance(to) {
            crate::log::warning!("{_err}");
        }
    }

    /// Returns every state visited, in order.
    pub fn history(&self) -> Vec<HttpState> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use HttpState::*;

    #[test]
    fn success_path() {
        let lifecycle = Lifecycle::new();
        for state in [Routed, Handling, Coerced, Sent] {
            lifecycle.advance(state).unwrap();
        }
        assert_eq!(lifecycle.history(), [Received, Routed, Handling, Coerced, Sent]);
        assert!(lifecycle.advance(Failed).is_err());
    }

    #[test]
    fn failure_resolves_to_sent() {
        let lifecycle = Lifecycle::new();
        lifecycle.advance(Routed).unwrap();
        lifecycle.advance(Failed).unwrap();
        assert!(lifecycle.advance(Handling).is_err());
        lifecycle.advance(Sent).unwrap();
        assert_eq!(lifecycle.state(), Sent);
    }

    #[test]
    fn repeated_failure_is_recorded_once() {
        let lifecycle = Lifecycle::new();
        lifecycle.advance(Failed).unwrap();
        lifecycle.advance(Failed).unwrap();
        lifecycle.advance(Sent).unwrap();
        assert_eq!(lifecycle.history(), [Received, Failed, Sent]);
    }

    #[test]
    fn websocket_transitions() {
        assert!(WsState::Connecting.can_advance(WsState::Rejected));
        assert!(WsState::Open.can_advance(WsState::Closed));
        assert!(!WsState::Rejected.can_advance(WsState::Open));
        assert!(!WsState::Connecting.can_advance(WsState::Open));
    }
}
