//! Builder for constructing statecharts.

use crate::builder::error::{BuildError, DefinitionDefect};
use crate::builder::state::StateBuilder;
use crate::builder::transition::TransitionBuilder;
use crate::builder::validate::{self, Check};
use crate::core::{
    done_invoke_name, done_state_name, error_invoke_name, Invoke, NodeId, NodeKind, StateChart,
    StateNode, Transition,
};
use std::collections::{HashMap, HashSet};

/// Builder for a statechart with a fluent API.
///
/// The root is a compound state named after the chart id. `build` resolves
/// every target and reports all definition defects together.
///
/// # Example
///
/// ```rust
/// use chartflow::builder::{ChartBuilder, StateBuilder};
///
/// let chart = ChartBuilder::new("light")
///     .initial("red")
///     .state(StateBuilder::atomic("red").on("TIMER", "green"))
///     .state(StateBuilder::atomic("green").on("TIMER", "red"))
///     .build()
///     .unwrap();
///
/// assert!(chart.find("green").is_some());
/// ```
pub struct ChartBuilder {
    root: StateBuilder,
}

/// Transitions of one node before their targets are resolved.
struct Unresolved {
    initial: Option<String>,
    transitions: Vec<TransitionBuilder>,
}

impl ChartBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            root: StateBuilder::compound(id),
        }
    }

    /// Set the root's initial child (required).
    pub fn initial(mut self, key: impl Into<String>) -> Self {
        self.root = self.root.initial(key);
        self
    }

    /// Add a top-level state.
    pub fn state(mut self, state: StateBuilder) -> Self {
        self.root = self.root.state(state);
        self
    }

    /// Add a root-level transition, handled from any active state.
    pub fn transition(mut self, transition: TransitionBuilder) -> Self {
        self.root = self.root.transition(transition);
        self
    }

    /// Resolve and validate the chart.
    pub fn build(self) -> Result<StateChart, BuildError> {
        let mut nodes = Vec::new();
        let mut unresolved = Vec::new();
        let mut checks = Vec::new();

        flatten(&self.root, None, &mut nodes, &mut unresolved, &mut checks);

        let mut seen = HashSet::new();
        for node in &nodes {
            let id = node.id.clone();
            checks.push(validate::ensure(seen.insert(id.clone()), || {
                DefinitionDefect::DuplicateState { id }
            }));
        }

        resolve_initials(&mut nodes, &unresolved, &mut checks);

        let mut chart = StateChart::from_nodes(nodes);
        let mut resolved: Vec<(NodeId, Transition)> = Vec::new();
        for (index, pending) in unresolved.iter().enumerate() {
            let source = NodeId(index);
            for declared in &pending.transitions {
                match resolve_target(&chart, source, &declared.target) {
                    Some((target, internal)) => resolved.push((
                        source,
                        Transition {
                            event: declared.event.clone(),
                            source,
                            target,
                            internal,
                            guard: declared.guard.clone(),
                            actions: declared.actions.clone(),
                        },
                    )),
                    None => checks.push(validate::defect(DefinitionDefect::UnknownTarget {
                        state: chart.node(source).id.clone(),
                        target: declared.target.clone(),
                    })),
                }
            }
        }

        validate::finish(checks)?;

        for (source, transition) in resolved {
            chart
                .node_mut(source)
                .on
                .entry(transition.event.clone())
                .or_default()
                .push(transition);
        }
        Ok(chart)
    }
}

/// Push `state` and its descendants in pre-order, returning its id.
fn flatten(
    state: &StateBuilder,
    parent: Option<(NodeId, &str, usize)>,
    nodes: &mut Vec<StateNode>,
    unresolved: &mut Vec<Unresolved>,
    checks: &mut Vec<Check>,
) -> NodeId {
    let id = NodeId(nodes.len());
    let (path, depth) = match parent {
        None => (state.key.clone(), 0),
        Some((_, _, 0)) => (state.key.clone(), 1),
        Some((_, parent_path, parent_depth)) => {
            (format!("{parent_path}.{}", state.key), parent_depth + 1)
        }
    };

    checks.push(validate::key(&state.key));
    checks.extend(shape_checks(state, &path));

    let invoke = state.invoke.as_ref().map(|(invoke_id, src)| Invoke {
        id: invoke_id.clone(),
        src: src.clone(),
    });

    let mut transitions = state.transitions.clone();
    if let Some(invoke) = &invoke {
        let done = done_invoke_name(&invoke.id);
        let error = error_invoke_name(&invoke.id);
        transitions.extend(state.invoke_done.iter().cloned().map(|t| t.event(done.clone())));
        transitions.extend(state.invoke_error.iter().cloned().map(|t| t.event(error.clone())));
    }
    if let Some(on_done) = &state.on_done {
        transitions.push(on_done.clone().event(done_state_name(&path)));
    }

    nodes.push(StateNode {
        id: path.clone(),
        key: state.key.clone(),
        kind: state.kind,
        parent: parent.map(|(parent_id, _, _)| parent_id),
        children: Vec::new(),
        initial: None,
        entry: state.entry.clone(),
        exit: state.exit.clone(),
        on: HashMap::new(),
        invoke,
        depth,
    });
    unresolved.push(Unresolved {
        initial: state.initial.clone(),
        transitions,
    });

    let children: Vec<NodeId> = state
        .children
        .iter()
        .map(|child| flatten(child, Some((id, &path, depth)), nodes, unresolved, checks))
        .collect();
    nodes[id.0].children = children;
    id
}

fn shape_checks(state: &StateBuilder, path: &str) -> Vec<Check> {
    let named = || path.to_string();
    vec![
        validate::ensure(
            state.kind != NodeKind::Compound || !state.children.is_empty(),
            || DefinitionDefect::EmptyCompound { state: named() },
        ),
        validate::ensure(
            state.kind == NodeKind::Compound || state.children.is_empty(),
            || DefinitionDefect::UnexpectedChildren { state: named() },
        ),
        validate::ensure(
            state.kind != NodeKind::Final
                || (state.transitions.is_empty() && state.invoke.is_none()),
            || DefinitionDefect::FinalWithTransitions { state: named() },
        ),
        validate::ensure(
            state.on_done.is_none() || state.kind == NodeKind::Compound,
            || DefinitionDefect::OnDoneWithoutRegion { state: named() },
        ),
        validate::ensure(
            state.invoke.is_some()
                || (state.invoke_done.is_empty() && state.invoke_error.is_empty()),
            || DefinitionDefect::OutcomeWithoutInvoke { state: named() },
        ),
    ]
}

fn resolve_initials(nodes: &mut [StateNode], unresolved: &[Unresolved], checks: &mut Vec<Check>) {
    for index in 0..nodes.len() {
        if nodes[index].kind != NodeKind::Compound || nodes[index].children.is_empty() {
            continue;
        }
        let state = nodes[index].id.clone();
        let Some(initial) = &unresolved[index].initial else {
            checks.push(validate::defect(DefinitionDefect::MissingInitial { state }));
            continue;
        };
        let found = nodes[index]
            .children
            .iter()
            .copied()
            .find(|child| nodes[child.0].key == *initial);
        match found {
            Some(child) => nodes[index].initial = Some(child),
            None => checks.push(validate::defect(DefinitionDefect::UnknownInitial {
                state,
                initial: initial.clone(),
            })),
        }
    }
}

/// Resolve a declared target to a node and whether the transition is
/// internal to its source.
fn resolve_target(chart: &StateChart, source: NodeId, target: &str) -> Option<(NodeId, bool)> {
    if let Some(absolute) = target.strip_prefix('#') {
        return chart.find(absolute).map(|id| (id, false));
    }
    if let Some(relative) = target.strip_prefix('.') {
        return descend(chart, source, relative).map(|id| (id, true));
    }
    let base = chart.node(source).parent().unwrap_or(source);
    descend(chart, base, target).map(|id| (id, false))
}

fn descend(chart: &StateChart, from: NodeId, path: &str) -> Option<NodeId> {
    path.split('.')
        .try_fold(from, |current, key| chart.child(current, key))
}
