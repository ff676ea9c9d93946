//! Resolved state nodes and transitions of a statechart.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Index of a node inside its [`StateChart`](super::StateChart).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Leaf state
    Atomic,
    /// State with child states and exactly one initial child
    Compound,
    /// Leaf whose entry completes its parent region
    Final,
}

/// A transition with its target resolved to a node.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// Triggering event; empty for eventless transitions
    pub event: String,
    /// Node declaring the transition
    pub source: NodeId,
    pub target: NodeId,
    /// The source is not exited; only its descendants are replaced
    pub internal: bool,
    pub guard: Option<String>,
    pub actions: Vec<String>,
}

/// Service invoked while a state is active.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invoke {
    /// Identifier used in `done.invoke.<id>` / `error.invoke.<id>`
    pub id: String,
    /// Name of the registered service
    pub src: String,
}

#[derive(Clone, Debug)]
pub struct StateNode {
    pub(crate) id: String,
    pub(crate) key: String,
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) initial: Option<NodeId>,
    pub(crate) entry: Vec<String>,
    pub(crate) exit: Vec<String>,
    pub(crate) on: HashMap<String, Vec<Transition>>,
    pub(crate) invoke: Option<Invoke>,
    pub(crate) depth: usize,
}

impl StateNode {
    /// Dotted path from the root, e.g. `newTicket.pending`; the chart id
    /// for the root itself.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Key relative to the parent.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_final(&self) -> bool {
        self.kind == NodeKind::Final
    }

    pub fn is_compound(&self) -> bool {
        self.kind == NodeKind::Compound
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn initial(&self) -> Option<NodeId> {
        self.initial
    }

    pub fn entry(&self) -> &[String] {
        &self.entry
    }

    pub fn exit(&self) -> &[String] {
        &self.exit
    }

    pub fn invoke(&self) -> Option<&Invoke> {
        self.invoke.as_ref()
    }

    /// Distance from the root (the root is at depth 0).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Transitions declared for `event`, in declaration order.
    pub fn transitions(&self, event: &str) -> &[Transition] {
        self.on.get(event).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn all_transitions(&self) -> impl Iterator<Item = &Transition> {
        self.on.values().flatten()
    }
}
