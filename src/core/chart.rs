//! Immutable statechart definition.
//!
//! A [`StateChart`] is produced by the
//! [`ChartBuilder`](crate::builder::ChartBuilder), which guarantees every
//! target exists and every compound node has an initial child. After
//! construction the chart is read-only and can be shared across sessions.

use super::event::done_state_name;
use super::node::{NodeId, StateNode, Transition};
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct StateChart {
    nodes: Vec<StateNode>,
    by_id: HashMap<String, NodeId>,
}

impl StateChart {
    /// Nodes must be in arena order with the root at index 0.
    pub(crate) fn from_nodes(nodes: Vec<StateNode>) -> Self {
        let by_id = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), NodeId(index)))
            .collect();
        Self { nodes, by_id }
    }

    /// Identifier of the chart (the root node id).
    pub fn id(&self) -> &str {
        &self.root().id
    }

    pub fn root(&self) -> &StateNode {
        &self.nodes[NodeId::ROOT.0]
    }

    pub fn node(&self, id: NodeId) -> &StateNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut StateNode {
        &mut self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &StateNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId(index), node))
    }

    /// Look up a node by its dotted id (`newTicket.pending`).
    pub fn find(&self, id: &str) -> Option<NodeId> {
        self.by_id.get(id).copied()
    }

    /// Child of `parent` with the given key.
    pub fn child(&self, parent: NodeId, key: &str) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|child| self.node(*child).key == key)
    }

    /// The node followed by its ancestors up to and including the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.node(parent).parent;
        }
        chain
    }

    /// Path from the root down to `id`, both included.
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = self.ancestors(id);
        path.reverse();
        path
    }

    /// Whether `node` is `ancestor` or lies below it.
    pub fn is_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.node(id).parent;
        }
        false
    }

    /// Chain of initial children below `id`, excluding `id` itself.
    pub fn initial_chain(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.node(id).initial;
        while let Some(child) = current {
            chain.push(child);
            current = self.node(child).initial;
        }
        chain
    }

    /// Transitions declared on `id` for `event`.
    pub fn transitions(&self, id: NodeId, event: &str) -> &[Transition] {
        self.node(id).transitions(event)
    }

    /// Target of the completion transition of `id`, if any.
    pub fn on_done_target(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id);
        node.transitions(&done_state_name(&node.id))
            .first()
            .map(|transition| transition.target)
    }

    /// Active path for `keys`, resolved from the root.
    pub fn resolve_path<S: AsRef<str>>(&self, keys: &[S]) -> Option<Vec<NodeId>> {
        let mut path = vec![NodeId::ROOT];
        let mut current = NodeId::ROOT;
        for key in keys {
            current = self.child(current, key.as_ref())?;
            path.push(current);
        }
        Some(path)
    }

    /// Whether `path` is a root-to-leaf chain where every step is a child
    /// of the previous node.
    pub fn is_valid_configuration(&self, path: &[NodeId]) -> bool {
        let Some((&first, rest)) = path.split_first() else {
            return false;
        };
        if first != NodeId::ROOT {
            return false;
        }
        let mut parent = first;
        for &id in rest {
            if id.0 >= self.nodes.len() || self.node(id).parent != Some(parent) {
                return false;
            }
            parent = id;
        }
        !self.node(parent).is_compound()
    }
}
