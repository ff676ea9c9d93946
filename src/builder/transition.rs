//! Builder for declaring transitions.

use crate::core::EVENTLESS;

/// Declares one transition with an unresolved target.
///
/// Targets are written the way they resolve:
/// - `key` or `key.child`: a sibling of the declaring state
/// - `.key`: a descendant of the declaring state (internal transition)
/// - `#id`: an absolute dotted id from the root
///
/// # Example
///
/// ```rust
/// use chartflow::builder::TransitionBuilder;
///
/// let transition = TransitionBuilder::to(".pending")
///     .event("AnswerUser")
///     .guard("hasAnswer")
///     .action("recordAnswer");
///
/// assert_eq!(transition.event_name(), "AnswerUser");
/// assert!(!transition.is_eventless());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionBuilder {
    pub(crate) event: String,
    pub(crate) target: String,
    pub(crate) guard: Option<String>,
    pub(crate) actions: Vec<String>,
}

impl TransitionBuilder {
    /// Start an eventless transition towards `target`.
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            event: EVENTLESS.to_string(),
            target: target.into(),
            guard: None,
            actions: Vec::new(),
        }
    }

    /// Set the triggering event.
    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event = event.into();
        self
    }

    /// Require the named guard to pass.
    pub fn guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    /// Append an action run when the transition is taken.
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    pub fn event_name(&self) -> &str {
        &self.event
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_eventless(&self) -> bool {
        self.event == EVENTLESS
    }
}
