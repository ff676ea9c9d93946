//! Accumulating validation of statechart definitions.
//!
//! Uses Stillwater's `Validation` so a definition with several defects
//! reports all of them in one pass instead of failing on the first.

use crate::builder::error::{BuildError, DefinitionDefect};
use crate::core::{Implementations, StateChart};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Outcome of a single definition check.
pub(crate) type Check = Validation<(), NonEmptyVec<DefinitionDefect>>;

/// Fail with `defect` unless `ok` holds.
pub(crate) fn ensure(ok: bool, defect: impl FnOnce() -> DefinitionDefect) -> Check {
    if ok {
        Validation::success(())
    } else {
        Validation::fail(defect())
    }
}

pub(crate) fn defect(defect: DefinitionDefect) -> Check {
    Validation::fail(defect)
}

/// Combine every check, reporting all failures together.
pub(crate) fn finish(checks: Vec<Check>) -> Result<(), BuildError> {
    match Validation::all_vec(checks) {
        Validation::Success(_) => Ok(()),
        Validation::Failure(defects) => Err(BuildError::Invalid {
            defects: defects.iter().cloned().collect(),
        }),
    }
}

/// State keys are single path segments.
pub(crate) fn key(key: &str) -> Check {
    ensure(
        !key.is_empty() && !key.contains('.') && !key.contains('#'),
        || DefinitionDefect::InvalidKey {
            key: key.to_string(),
        },
    )
}

/// Every guard, action and service the chart names must be registered.
pub fn implementations<C: 'static>(
    chart: &StateChart,
    implementations: &Implementations<C>,
) -> Result<(), BuildError> {
    let mut checks = Vec::new();

    for (_, node) in chart.nodes() {
        let state = node.id();
        for action in node.entry().iter().chain(node.exit()) {
            checks.push(ensure(implementations.has_action(action), || {
                DefinitionDefect::UnknownAction {
                    state: state.to_string(),
                    action: action.clone(),
                }
            }));
        }

        for transition in node.all_transitions() {
            if let Some(guard) = &transition.guard {
                checks.push(ensure(implementations.has_guard(guard), || {
                    DefinitionDefect::UnknownGuard {
                        state: state.to_string(),
                        guard: guard.clone(),
                    }
                }));
            }
            for action in &transition.actions {
                checks.push(ensure(implementations.has_action(action), || {
                    DefinitionDefect::UnknownAction {
                        state: state.to_string(),
                        action: action.clone(),
                    }
                }));
            }
        }

        if let Some(invoke) = node.invoke() {
            checks.push(ensure(implementations.has_service(&invoke.src), || {
                DefinitionDefect::UnknownService {
                    state: state.to_string(),
                    service: invoke.src.clone(),
                }
            }));
        }
    }

    finish(checks)
}
