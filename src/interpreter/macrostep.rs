//! Microstep and macrostep processing.
//!
//! A [`Macrostep`] works on copies of the configuration, context and
//! generation counters. The interpreter commits them only when the
//! macrostep reaches a stable configuration, so an aborted macrostep
//! leaves no trace and observers never see a half-applied context.

use crate::core::{Event, Implementations, NodeId, StateChart, Transition, EVENTLESS};
use crate::interpreter::error::EngineError;
use std::collections::{HashMap, VecDeque};

/// Working copies of a macrostep that reached a stable configuration.
pub(crate) struct Settled<C> {
    pub(crate) configuration: Vec<NodeId>,
    pub(crate) context: C,
    pub(crate) generations: HashMap<NodeId, u64>,
    pub(crate) microsteps: usize,
    pub(crate) root_done: bool,
}

pub(crate) struct Macrostep<'a, C> {
    chart: &'a StateChart,
    implementations: &'a Implementations<C>,
    limit: usize,
    pub(crate) configuration: Vec<NodeId>,
    pub(crate) context: C,
    pub(crate) generations: HashMap<NodeId, u64>,
    internal: VecDeque<Event>,
    pub(crate) microsteps: usize,
    /// A final child of the root was entered
    pub(crate) root_done: bool,
}

impl<'a, C: 'static> Macrostep<'a, C> {
    pub(crate) fn new(
        chart: &'a StateChart,
        implementations: &'a Implementations<C>,
        limit: usize,
        configuration: Vec<NodeId>,
        context: C,
        generations: HashMap<NodeId, u64>,
    ) -> Self {
        Self {
            chart,
            implementations,
            limit,
            configuration,
            context,
            generations,
            internal: VecDeque::new(),
            microsteps: 0,
            root_done: false,
        }
    }

    /// Enter the root and its initial chain.
    pub(crate) fn enter_initial(&mut self, event: &Event) -> Result<(), EngineError> {
        self.configuration.clear();
        let mut entering = vec![NodeId::ROOT];
        entering.extend(self.chart.initial_chain(NodeId::ROOT));
        self.enter(&entering, event)
    }

    /// Find the transition to take for `name`: walk from the active leaf
    /// up through its ancestors, trying each node's transitions in
    /// declaration order. The first one whose guard passes wins.
    pub(crate) fn select(&self, name: &str, event: &Event) -> Result<Option<&'a Transition>, EngineError> {
        let Some(&leaf) = self.configuration.last() else {
            return Ok(None);
        };
        for node in self.chart.ancestors(leaf) {
            for transition in self.chart.transitions(node, name) {
                if self.guard_passes(transition, event)? {
                    return Ok(Some(transition));
                }
            }
        }
        Ok(None)
    }

    fn guard_passes(&self, transition: &Transition, event: &Event) -> Result<bool, EngineError> {
        let Some(name) = &transition.guard else {
            return Ok(true);
        };
        let failed = |source| EngineError::Guard {
            guard: name.clone(),
            state: self.chart.node(transition.source).id().to_string(),
            source,
        };
        let guard = self
            .implementations
            .get_guard(name)
            .ok_or_else(|| failed(crate::core::GuardError::new("guard is not registered")))?;
        guard.check(&self.context, event).map_err(failed)
    }

    /// Take one transition: exit innermost first, run the transition's
    /// actions, then enter outermost first.
    pub(crate) fn microstep(&mut self, transition: &Transition, event: &Event) -> Result<(), EngineError> {
        self.microsteps += 1;
        if self.microsteps > self.limit {
            return Err(EngineError::EventlessLoop {
                state: self.leaf_id(),
                limit: self.limit,
            });
        }

        let domain = self.domain(transition);
        let keep = self
            .configuration
            .iter()
            .position(|id| *id == domain)
            .map_or(0, |index| index + 1);

        let exiting: Vec<NodeId> = self.configuration[keep..].iter().rev().copied().collect();
        for node in &exiting {
            let actions = self.chart.node(*node).exit();
            self.run_actions(actions, event)?;
        }
        self.configuration.truncate(keep);

        self.run_actions(&transition.actions, event)?;

        let path = self.chart.path_to(transition.target);
        let below_domain = path
            .iter()
            .position(|id| *id == domain)
            .map_or(0, |index| index + 1);
        let mut entering: Vec<NodeId> = path[below_domain..].to_vec();
        entering.extend(self.chart.initial_chain(transition.target));

        tracing::debug!(
            event = %event.name,
            source = %self.chart.node(transition.source).id(),
            target = %self.chart.node(transition.target).id(),
            exited = exiting.len(),
            entered = entering.len(),
            "Microstep"
        );
        self.enter(&entering, event)
    }

    /// The deepest node kept active by the transition.
    fn domain(&self, transition: &Transition) -> NodeId {
        if transition.internal {
            return transition.source;
        }
        self.chart
            .ancestors(transition.source)
            .into_iter()
            .skip(1)
            .find(|ancestor| {
                *ancestor != transition.target && self.chart.is_descendant(transition.target, *ancestor)
            })
            .unwrap_or(NodeId::ROOT)
    }

    fn enter(&mut self, entering: &[NodeId], event: &Event) -> Result<(), EngineError> {
        for &node in entering {
            self.configuration.push(node);
            *self.generations.entry(node).or_insert(0) += 1;

            let state = self.chart.node(node);
            self.run_actions(state.entry(), event)?;

            if state.is_final() {
                match state.parent() {
                    Some(NodeId::ROOT) | None => self.root_done = true,
                    Some(parent) => {
                        let parent_id = self.chart.node(parent).id();
                        self.internal.push_back(Event::done_state(parent_id));
                    }
                }
            }
        }
        Ok(())
    }

    fn run_actions(&mut self, names: &[String], event: &Event) -> Result<(), EngineError> {
        for name in names {
            let action = self
                .implementations
                .get_action(name)
                .ok_or_else(|| EngineError::UnknownAction {
                    action: name.clone(),
                })?;
            self.context = action(&self.context, event);
        }
        Ok(())
    }

    /// Resolve eventless transitions and raised completion events until
    /// none apply.
    pub(crate) fn settle(&mut self, event: &Event) -> Result<(), EngineError> {
        let mut current = event.clone();
        loop {
            if self.root_done {
                return Ok(());
            }
            if let Some(transition) = self.select(EVENTLESS, &current)? {
                self.microstep(transition, &current)?;
                continue;
            }
            let Some(internal) = self.internal.pop_front() else {
                return Ok(());
            };
            if let Some(transition) = self.select(&internal.name, &internal)? {
                self.microstep(transition, &internal)?;
            }
            current = internal;
        }
    }

    pub(crate) fn finish(self) -> Settled<C> {
        Settled {
            configuration: self.configuration,
            context: self.context,
            generations: self.generations,
            microsteps: self.microsteps,
            root_done: self.root_done,
        }
    }

    fn leaf_id(&self) -> String {
        self.configuration
            .last()
            .map(|leaf| self.chart.node(*leaf).id().to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ChartBuilder, StateBuilder, TransitionBuilder};
    use crate::core::GuardError;

    type Log = Vec<String>;

    fn logging(names: &[&str]) -> Implementations<Log> {
        names.iter().fold(Implementations::new(), |implementations, name| {
            let label = name.to_string();
            implementations.action(*name, move |log: &Log, _| {
                let mut next = log.clone();
                next.push(label.clone());
                next
            })
        })
    }

    fn keys(chart: &StateChart, configuration: &[NodeId]) -> Vec<String> {
        configuration
            .iter()
            .skip(1)
            .map(|id| chart.node(*id).key().to_string())
            .collect()
    }

    fn nested_chart() -> StateChart {
        ChartBuilder::new("m")
            .initial("a")
            .state(
                StateBuilder::compound("a")
                    .initial("a1")
                    .entry("enter a")
                    .exit("exit a")
                    .state(StateBuilder::atomic("a1").entry("enter a1").exit("exit a1"))
                    .state(StateBuilder::atomic("a2").entry("enter a2"))
                    .transition(TransitionBuilder::to(".a2").event("INNER").action("inner"))
                    .transition(TransitionBuilder::to("b").event("OUT").action("out")),
            )
            .state(StateBuilder::atomic("b").entry("enter b"))
            .build()
            .unwrap()
    }

    fn implementations() -> Implementations<Log> {
        logging(&[
            "enter a", "exit a", "enter a1", "exit a1", "enter a2", "enter b", "inner", "out",
        ])
    }

    #[test]
    fn initial_entry_runs_top_down() {
        let chart = nested_chart();
        let implementations = implementations();
        let mut step = Macrostep::new(&chart, &implementations, 8, Vec::new(), Vec::new(), HashMap::new());

        step.enter_initial(&Event::init()).unwrap();
        assert_eq!(keys(&chart, &step.configuration), vec!["a", "a1"]);
        assert_eq!(step.context, vec!["enter a", "enter a1"]);
    }

    #[test]
    fn external_transition_exits_innermost_first() {
        let chart = nested_chart();
        let implementations = implementations();
        let mut step = Macrostep::new(&chart, &implementations, 8, Vec::new(), Vec::new(), HashMap::new());
        step.enter_initial(&Event::init()).unwrap();
        step.context.clear();

        let event = Event::new("OUT");
        let transition = step.select("OUT", &event).unwrap().unwrap();
        step.microstep(transition, &event).unwrap();

        assert_eq!(keys(&chart, &step.configuration), vec!["b"]);
        assert_eq!(step.context, vec!["exit a1", "exit a", "out", "enter b"]);
    }

    #[test]
    fn internal_transition_keeps_source_active() {
        let chart = nested_chart();
        let implementations = implementations();
        let mut step = Macrostep::new(&chart, &implementations, 8, Vec::new(), Vec::new(), HashMap::new());
        step.enter_initial(&Event::init()).unwrap();
        step.context.clear();

        let event = Event::new("INNER");
        let transition = step.select("INNER", &event).unwrap().unwrap();
        step.microstep(transition, &event).unwrap();

        assert_eq!(keys(&chart, &step.configuration), vec!["a", "a2"]);
        assert_eq!(step.context, vec!["exit a1", "inner", "enter a2"]);
    }

    #[test]
    fn reentry_bumps_generation() {
        let chart = ChartBuilder::new("m")
            .initial("a")
            .state(StateBuilder::atomic("a").on("AGAIN", "a"))
            .build()
            .unwrap();
        let implementations = Implementations::<()>::new();
        let mut step = Macrostep::new(&chart, &implementations, 8, Vec::new(), (), HashMap::new());
        step.enter_initial(&Event::init()).unwrap();
        let a = chart.find("a").unwrap();
        assert_eq!(step.generations[&a], 1);

        let event = Event::new("AGAIN");
        let transition = step.select("AGAIN", &event).unwrap().unwrap();
        step.microstep(transition, &event).unwrap();
        assert_eq!(step.generations[&a], 2);
    }

    #[test]
    fn eventless_cycle_hits_the_limit() {
        let chart = ChartBuilder::new("m")
            .initial("ping")
            .state(StateBuilder::atomic("ping").always(TransitionBuilder::to("pong")))
            .state(StateBuilder::atomic("pong").always(TransitionBuilder::to("ping")))
            .build()
            .unwrap();
        let implementations = Implementations::<()>::new();
        let mut step = Macrostep::new(&chart, &implementations, 5, Vec::new(), (), HashMap::new());
        step.enter_initial(&Event::init()).unwrap();

        let err = step.settle(&Event::init()).unwrap_err();
        assert!(matches!(err, EngineError::EventlessLoop { limit: 5, .. }));
    }

    #[test]
    fn completion_event_triggers_on_done() {
        let chart = ChartBuilder::new("m")
            .initial("region")
            .state(
                StateBuilder::compound("region")
                    .initial("work")
                    .state(StateBuilder::atomic("work").on("FINISH", "finished"))
                    .state(StateBuilder::final_state("finished"))
                    .on_done("after"),
            )
            .state(StateBuilder::atomic("after"))
            .build()
            .unwrap();
        let implementations = Implementations::<()>::new();
        let mut step = Macrostep::new(&chart, &implementations, 8, Vec::new(), (), HashMap::new());
        step.enter_initial(&Event::init()).unwrap();

        let event = Event::new("FINISH");
        let transition = step.select("FINISH", &event).unwrap().unwrap();
        step.microstep(transition, &event).unwrap();
        assert_eq!(keys(&chart, &step.configuration), vec!["region", "finished"]);

        step.settle(&event).unwrap();
        assert_eq!(keys(&chart, &step.configuration), vec!["after"]);
        assert_eq!(step.microsteps, 2);
    }

    #[test]
    fn failing_guard_falls_through_to_ancestor() {
        let chart = ChartBuilder::new("m")
            .initial("outer")
            .state(
                StateBuilder::compound("outer")
                    .initial("inner")
                    .state(
                        StateBuilder::atomic("inner")
                            .transition(TransitionBuilder::to("elsewhere").event("GO").guard("never")),
                    )
                    .state(StateBuilder::atomic("elsewhere"))
                    .on("GO", "fallback"),
            )
            .state(StateBuilder::atomic("fallback"))
            .build()
            .unwrap();
        let implementations = Implementations::<()>::new().guard_fn("never", |_, _| false);
        let mut step = Macrostep::new(&chart, &implementations, 8, Vec::new(), (), HashMap::new());
        step.enter_initial(&Event::init()).unwrap();

        let transition = step.select("GO", &Event::new("GO")).unwrap().unwrap();
        assert_eq!(transition.target, chart.find("fallback").unwrap());
    }

    #[test]
    fn guard_error_is_fatal() {
        let chart = ChartBuilder::new("m")
            .initial("a")
            .state(StateBuilder::atomic("a").transition(TransitionBuilder::to("b").event("GO").guard("broken")))
            .state(StateBuilder::atomic("b"))
            .build()
            .unwrap();
        let implementations =
            Implementations::<()>::new().guard("broken", |_, _| Err(GuardError::new("cannot read answer")));
        let mut step = Macrostep::new(&chart, &implementations, 8, Vec::new(), (), HashMap::new());
        step.enter_initial(&Event::init()).unwrap();

        let err = step.select("GO", &Event::new("GO")).unwrap_err();
        assert!(matches!(err, EngineError::Guard { ref guard, .. } if guard == "broken"));
    }

    #[test]
    fn final_child_of_root_completes_the_machine() {
        let chart = ChartBuilder::new("m")
            .initial("a")
            .state(StateBuilder::atomic("a").on("END", "end"))
            .state(StateBuilder::final_state("end"))
            .build()
            .unwrap();
        let implementations = Implementations::<()>::new();
        let mut step = Macrostep::new(&chart, &implementations, 8, Vec::new(), (), HashMap::new());
        step.enter_initial(&Event::init()).unwrap();

        let event = Event::new("END");
        let transition = step.select("END", &event).unwrap().unwrap();
        step.microstep(transition, &event).unwrap();
        assert!(step.root_done);
    }
}
