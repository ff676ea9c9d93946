//! Build errors for statechart definitions.

use thiserror::Error;

/// A single defect found in a statechart definition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DefinitionDefect {
    #[error("state '{state}' is compound but declares no initial child")]
    MissingInitial { state: String },

    #[error("initial '{initial}' of state '{state}' is not one of its children")]
    UnknownInitial { state: String, initial: String },

    #[error("state '{state}' is compound but has no children")]
    EmptyCompound { state: String },

    #[error("state '{state}' is not compound but declares children")]
    UnexpectedChildren { state: String },

    #[error("state key '{key}' must be non-empty and contain no '.' or '#'")]
    InvalidKey { key: String },

    #[error("state id '{id}' is declared more than once")]
    DuplicateState { id: String },

    #[error("transition on '{state}' targets unknown state '{target}'")]
    UnknownTarget { state: String, target: String },

    #[error("final state '{state}' declares outgoing transitions or an invocation")]
    FinalWithTransitions { state: String },

    #[error("state '{state}' declares on_done but is not compound")]
    OnDoneWithoutRegion { state: String },

    #[error("state '{state}' declares invocation outcomes without an invocation")]
    OutcomeWithoutInvoke { state: String },

    #[error("state '{state}' references unregistered guard '{guard}'")]
    UnknownGuard { state: String, guard: String },

    #[error("state '{state}' references unregistered action '{action}'")]
    UnknownAction { state: String, action: String },

    #[error("state '{state}' invokes unregistered service '{service}'")]
    UnknownService { state: String, service: String },
}

/// Errors that can occur when building statecharts and machines.
///
/// Every defect found is reported at once rather than stopping at the first.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("invalid statechart definition ({} defects): {}", .defects.len(), join(.defects))]
    Invalid { defects: Vec<DefinitionDefect> },
}

impl BuildError {
    pub fn defects(&self) -> &[DefinitionDefect] {
        match self {
            Self::Invalid { defects } => defects,
        }
    }
}

fn join(defects: &[DefinitionDefect]) -> String {
    defects
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
