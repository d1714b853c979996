//! Purpose: Carry an explicit diagnostics capability into a session.
//! Exports: `Logger`.
//! Role: Every context and table emits its `tracing` events through one of these.
//! Invariants: No process-wide verbosity state; the dispatcher travels with the value.
//! Invariants: Without a dispatcher, events go to whatever default is ambient.
use std::fmt;

use tracing::Dispatch;

#[derive(Clone, Default)]
pub struct Logger {
    dispatch: Option<Dispatch>,
}

impl Logger {
    pub fn new(dispatch: Dispatch) -> Self {
        Self {
            dispatch: Some(dispatch),
        }
    }

    /// A logger that drops every event.
    pub fn silent() -> Self {
        Self::new(Dispatch::none())
    }

    /// Runs `f` with this logger's dispatcher as the current default.
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("explicit", &self.dispatch.is_some())
            .finish()
    }
}
