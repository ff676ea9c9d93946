//! Builder for declaring state nodes.

use crate::builder::transition::TransitionBuilder;
use crate::core::NodeKind;

/// Declares a state node and, for compound states, its children.
///
/// # Example
///
/// ```rust
/// use chartflow::builder::{StateBuilder, TransitionBuilder};
///
/// let lookup = StateBuilder::compound("lookup")
///     .initial("question")
///     .on("AnswerUser", ".pending")
///     .state(StateBuilder::atomic("question").entry("ask"))
///     .state(
///         StateBuilder::atomic("pending")
///             .invoke("fetch", "fetchItem")
///             .on_invoke_done(TransitionBuilder::to("done").guard("found"))
///             .on_invoke_done(TransitionBuilder::to("missing"))
///             .on_invoke_error(TransitionBuilder::to("failed")),
///     )
///     .state(StateBuilder::atomic("missing"))
///     .state(StateBuilder::atomic("failed"))
///     .state(StateBuilder::final_state("done"))
///     .on_done("next");
///
/// assert_eq!(lookup.key(), "lookup");
/// ```
#[derive(Clone, Debug)]
pub struct StateBuilder {
    pub(crate) key: String,
    pub(crate) kind: NodeKind,
    pub(crate) initial: Option<String>,
    pub(crate) children: Vec<StateBuilder>,
    pub(crate) entry: Vec<String>,
    pub(crate) exit: Vec<String>,
    pub(crate) transitions: Vec<TransitionBuilder>,
    pub(crate) invoke: Option<(String, String)>,
    pub(crate) invoke_done: Vec<TransitionBuilder>,
    pub(crate) invoke_error: Vec<TransitionBuilder>,
    pub(crate) on_done: Option<TransitionBuilder>,
}

impl StateBuilder {
    fn new(key: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            key: key.into(),
            kind,
            initial: None,
            children: Vec::new(),
            entry: Vec::new(),
            exit: Vec::new(),
            transitions: Vec::new(),
            invoke: None,
            invoke_done: Vec::new(),
            invoke_error: Vec::new(),
            on_done: None,
        }
    }

    pub fn atomic(key: impl Into<String>) -> Self {
        Self::new(key, NodeKind::Atomic)
    }

    pub fn compound(key: impl Into<String>) -> Self {
        Self::new(key, NodeKind::Compound)
    }

    pub fn final_state(key: impl Into<String>) -> Self {
        Self::new(key, NodeKind::Final)
    }

    /// Set the initial child key (required for compound states).
    pub fn initial(mut self, key: impl Into<String>) -> Self {
        self.initial = Some(key.into());
        self
    }

    /// Add a child state.
    pub fn state(mut self, child: StateBuilder) -> Self {
        self.children.push(child);
        self
    }

    /// Append an entry action.
    pub fn entry(mut self, action: impl Into<String>) -> Self {
        self.entry.push(action.into());
        self
    }

    /// Append an exit action.
    pub fn exit(mut self, action: impl Into<String>) -> Self {
        self.exit.push(action.into());
        self
    }

    /// Unguarded transition to `target` on `event`.
    pub fn on(self, event: impl Into<String>, target: impl Into<String>) -> Self {
        self.transition(TransitionBuilder::to(target).event(event))
    }

    /// Add a transition. Transitions for the same event are tried in the
    /// order they are added.
    pub fn transition(mut self, transition: TransitionBuilder) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Add an eventless transition, checked right after every entry.
    pub fn always(self, transition: TransitionBuilder) -> Self {
        let transition = TransitionBuilder {
            event: crate::core::EVENTLESS.to_string(),
            ..transition
        };
        self.transition(transition)
    }

    /// Invoke the registered service `src` while this state is active.
    pub fn invoke(mut self, id: impl Into<String>, src: impl Into<String>) -> Self {
        self.invoke = Some((id.into(), src.into()));
        self
    }

    /// Transition taken when the invoked service resolves.
    pub fn on_invoke_done(mut self, transition: TransitionBuilder) -> Self {
        self.invoke_done.push(transition);
        self
    }

    /// Transition taken when the invoked service rejects.
    pub fn on_invoke_error(mut self, transition: TransitionBuilder) -> Self {
        self.invoke_error.push(transition);
        self
    }

    /// Target taken when this region reaches a final child.
    pub fn on_done(mut self, target: impl Into<String>) -> Self {
        self.on_done = Some(TransitionBuilder::to(target));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}
