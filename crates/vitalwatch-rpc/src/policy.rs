//! What to do when something goes wrong.
//!
//! The supervisor consults a [`FailurePolicy`] for every node error signal,
//! every failed connect, every failed unsubscribe and every handler failure
//! reported by the layers above it. A close signal is never a failure: it
//! always reconnects.

use crate::error::Failure;

/// The policy's ruling on a single failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Terminate the supervisor. No further connection attempts are made.
    Abort,
    /// Keep going: drop the event, or reconnect after a transport error.
    Continue,
}

pub trait FailurePolicy: Send + Sync + 'static {
    fn on_failure(&self, failure: &Failure) -> Disposition;
}

/// Every failure is fatal. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailFast;

impl FailurePolicy for FailFast {
    fn on_failure(&self, failure: &Failure) -> Disposition {
        tracing::error!(error = %failure, "fatal failure");
        Disposition::Abort
    }
}

/// Log and carry on.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAndContinue;

impl FailurePolicy for LogAndContinue {
    fn on_failure(&self, failure: &Failure) -> Disposition {
        tracing::error!(error = %failure, "failure ignored");
        Disposition::Continue
    }
}

impl<F> FailurePolicy for F
where
    F: Fn(&Failure) -> Disposition + Send + Sync + 'static,
{
    fn on_failure(&self, failure: &Failure) -> Disposition {
        self(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    #[test]
    fn fail_fast_aborts() {
        let f = Failure::Transport(TransportError::WebSocket("reset".into()));
        assert_eq!(FailFast.on_failure(&f), Disposition::Abort);
    }

    #[test]
    fn log_and_continue_continues() {
        let f = Failure::handler("newHeads", "boom");
        assert_eq!(LogAndContinue.on_failure(&f), Disposition::Continue);
    }

    #[test]
    fn closures_are_policies() {
        let only_handlers = |f: &Failure| match f {
            Failure::Handler { .. } => Disposition::Continue,
            Failure::Transport(_) => Disposition::Abort,
        };
        assert_eq!(
            only_handlers.on_failure(&Failure::handler("logs", "x")),
            Disposition::Continue
        );
    }
}
