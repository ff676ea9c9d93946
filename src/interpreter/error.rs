//! Engine and session errors.

use crate::builder::BuildError;
use crate::core::GuardError;
use thiserror::Error;

/// Fatal errors raised while processing a macrostep.
///
/// When one of these is returned the macrostep is aborted: context and
/// active configuration stay at their last stable values.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("interpreter has not been started")]
    NotStarted,

    #[error("interpreter is already started")]
    AlreadyStarted,

    #[error("interpreter has been stopped")]
    Stopped,

    #[error("guard '{guard}' on state '{state}' failed: {source}")]
    Guard {
        guard: String,
        state: String,
        #[source]
        source: GuardError,
    },

    #[error("action '{action}' is not registered")]
    UnknownAction { action: String },

    #[error("service '{service}' is not registered")]
    UnknownService { service: String },

    #[error("no stable configuration within {limit} microsteps (last state '{state}')")]
    EventlessLoop { state: String, limit: usize },

    #[error(transparent)]
    Definition(#[from] BuildError),

    #[error("invoked services require a running tokio runtime")]
    NoRuntime,
}

/// Errors returned by a [`SessionHandle`](super::SessionHandle).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error("session has ended")]
    Closed,

    #[error(transparent)]
    Engine(#[from] EngineError),
}
