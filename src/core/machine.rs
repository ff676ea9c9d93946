//! A statechart paired with the implementations it references.

use super::chart::StateChart;
use super::registry::Implementations;
use crate::builder::{validate, BuildError};
use std::sync::Arc;

/// Immutable machine definition shared read-only by every session.
pub struct Machine<C> {
    chart: StateChart,
    implementations: Implementations<C>,
}

impl<C: 'static> Machine<C> {
    /// Pair a chart with its implementations.
    ///
    /// Fails with every guard, action and service name the chart
    /// references but the registry does not provide.
    pub fn new(chart: StateChart, implementations: Implementations<C>) -> Result<Self, BuildError> {
        validate::implementations(&chart, &implementations)?;
        Ok(Self {
            chart,
            implementations,
        })
    }

    /// Convenience for sharing the machine across sessions.
    pub fn shared(
        chart: StateChart,
        implementations: Implementations<C>,
    ) -> Result<Arc<Self>, BuildError> {
        Self::new(chart, implementations).map(Arc::new)
    }

    pub fn chart(&self) -> &StateChart {
        &self.chart
    }

    pub fn implementations(&self) -> &Implementations<C> {
        &self.implementations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ChartBuilder, DefinitionDefect, StateBuilder};

    fn chart() -> StateChart {
        ChartBuilder::new("m")
            .initial("idle")
            .state(
                StateBuilder::atomic("idle")
                    .entry("greet")
                    .transition(crate::builder::TransitionBuilder::to("busy").event("GO").guard("ready")),
            )
            .state(StateBuilder::atomic("busy").invoke("work", "worker"))
            .build()
            .unwrap()
    }

    #[test]
    fn missing_implementations_are_all_reported() {
        let err = match Machine::<()>::new(chart(), Implementations::new()) {
            Err(err) => err,
            Ok(_) => panic!("expected missing implementations"),
        };

        let defects = err.defects();
        assert_eq!(defects.len(), 3);
        assert!(defects.contains(&DefinitionDefect::UnknownGuard {
            state: "idle".into(),
            guard: "ready".into()
        }));
        assert!(defects.contains(&DefinitionDefect::UnknownAction {
            state: "idle".into(),
            action: "greet".into()
        }));
        assert!(defects.contains(&DefinitionDefect::UnknownService {
            state: "busy".into(),
            service: "worker".into()
        }));
    }

    #[test]
    fn complete_implementations_build() {
        let implementations = Implementations::<()>::new()
            .guard_fn("ready", |_, _| true)
            .action("greet", |_, _| ())
            .service("worker", |_| async { Ok::<_, crate::core::ServiceError>(serde_json::Value::Null) });

        let machine = Machine::shared(chart(), implementations).unwrap();
        assert_eq!(machine.chart().id(), "m");
        assert!(machine.implementations().has_service("worker"));
    }
}
