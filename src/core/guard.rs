//! Guard predicates for controlling transitions.
//!
//! Guards are pure functions over the context and the triggering event
//! that decide whether a transition is eligible. A guard that cannot
//! evaluate returns a [`GuardError`], which aborts the whole macrostep.

use super::event::Event;
use std::sync::Arc;
use thiserror::Error;

/// Raised by a guard that cannot evaluate its predicate.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct GuardError {
    message: String,
}

impl GuardError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Pure predicate that determines if a transition can be taken.
///
/// # Example
///
/// ```rust
/// use chartflow::core::{Event, Guard};
///
/// let has_data = Guard::new(|_ctx: &u32, event: &Event| Ok(!event.data.is_null()));
///
/// assert!(!has_data.check(&0, &Event::new("PING")).unwrap());
/// ```
pub struct Guard<C> {
    predicate: Arc<dyn Fn(&C, &Event) -> Result<bool, GuardError> + Send + Sync>,
}

impl<C> Guard<C> {
    /// Create a guard from a fallible predicate.
    ///
    /// The predicate must be deterministic and must not have side effects.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&C, &Event) -> Result<bool, GuardError> + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    /// Create a guard from a predicate that always evaluates.
    pub fn infallible<F>(predicate: F) -> Self
    where
        C: 'static,
        F: Fn(&C, &Event) -> bool + Send + Sync + 'static,
    {
        Self::new(move |ctx, event| Ok(predicate(ctx, event)))
    }

    pub fn check(&self, context: &C, event: &Event) -> Result<bool, GuardError> {
        (self.predicate)(context, event)
    }
}

impl<C> Clone for Guard<C> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
        }
    }
}
