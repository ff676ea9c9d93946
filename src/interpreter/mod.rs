//! Statechart interpreter.
//!
//! The [`Interpreter`] owns the active configuration and context of one
//! session and processes one event at a time to a stable configuration
//! (a macrostep). Within a macrostep it takes microsteps: the selected
//! transition, then eventless transitions and completion (`done.state`)
//! transitions until none apply.
//!
//! External events and service outcomes share one FIFO queue. The
//! synchronous [`Interpreter::send`] first processes whatever is already
//! queued and then the event itself; [`Interpreter::step`] and
//! [`Interpreter::run_until_idle`] drain the queue. [`SessionHandle`] wraps an interpreter in a tokio task for
//! callers that only hold a handle.
//!
//! # Example
//!
//! ```rust
//! use chartflow::builder::{ChartBuilder, StateBuilder};
//! use chartflow::core::{Event, Implementations, Machine};
//! use chartflow::interpreter::{Interpreter, Status};
//!
//! let chart = ChartBuilder::new("door")
//!     .initial("closed")
//!     .state(StateBuilder::atomic("closed").on("OPEN", "open"))
//!     .state(
//!         StateBuilder::atomic("open")
//!             .entry("count")
//!             .on("CLOSE", "closed"),
//!     )
//!     .build()
//!     .unwrap();
//! let implementations = Implementations::new().action("count", |opened: &u32, _| opened + 1);
//! let machine = Machine::shared(chart, implementations).unwrap();
//!
//! let mut interpreter = Interpreter::new(machine);
//! interpreter.start(0).unwrap();
//! let snapshot = interpreter.send(Event::new("OPEN")).unwrap();
//!
//! assert_eq!(snapshot.value, vec!["open"]);
//! assert_eq!(snapshot.context, 1);
//! assert_eq!(snapshot.status, Status::Running);
//! ```

mod config;
mod error;
mod macrostep;
mod service;
mod session;
mod snapshot;

pub use config::{
    InterpreterConfig, InterpreterConfigBuilder, SessionConfig, DEFAULT_BROADCAST_CAPACITY,
    DEFAULT_MAX_MICROSTEPS,
};
pub use error::{EngineError, SessionError};
pub use service::{Envelope, EventSender, ServiceOutcome};
pub use session::SessionHandle;
pub use snapshot::{Snapshot, Status};

use crate::checkpoint::{Checkpoint, CheckpointError};
use crate::core::{Event, Machine, NodeId, StateHistory, TransitionRecord};
use chrono::Utc;
use macrostep::{Macrostep, Settled};
use serde::Serialize;
use service::ServiceInvoker;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

type Listener<C> = Box<dyn FnMut(&Snapshot<C>) + Send>;

/// Runtime for one session of a [`Machine`].
pub struct Interpreter<C> {
    machine: Arc<Machine<C>>,
    config: InterpreterConfig,
    id: Uuid,
    status: Status,
    /// Active nodes from the root down to the leaf
    configuration: Vec<NodeId>,
    context: Option<C>,
    /// Entry count per node, used to tag service calls
    generations: HashMap<NodeId, u64>,
    history: StateHistory,
    listeners: Vec<Listener<C>>,
    invoker: ServiceInvoker,
    queue_tx: mpsc::UnboundedSender<Envelope>,
    queue_rx: mpsc::UnboundedReceiver<Envelope>,
}

impl<C> Interpreter<C>
where
    C: Clone + Send + Sync + 'static,
{
    pub fn new(machine: Arc<Machine<C>>) -> Self {
        Self::with_config(machine, InterpreterConfig::default())
    }

    pub fn with_config(machine: Arc<Machine<C>>, config: InterpreterConfig) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Self {
            machine,
            config,
            id: Uuid::new_v4(),
            status: Status::NotStarted,
            configuration: Vec::new(),
            context: None,
            generations: HashMap::new(),
            history: StateHistory::new(),
            listeners: Vec::new(),
            invoker: ServiceInvoker::new(queue_tx.clone()),
            queue_tx,
            queue_rx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn machine(&self) -> &Arc<Machine<C>> {
        &self.machine
    }

    pub fn history(&self) -> &StateHistory {
        &self.history
    }

    /// Producer side of the event queue.
    pub fn sender(&self) -> EventSender {
        EventSender::new(self.queue_tx.clone())
    }

    /// Register a listener called once per macrostep, in order.
    pub fn subscribe(&mut self, listener: impl FnMut(&Snapshot<C>) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Current snapshot, or `None` before [`start`](Self::start).
    pub fn snapshot(&self) -> Option<Snapshot<C>> {
        let context = self.context.clone()?;
        Some(Snapshot {
            value: self.value(),
            context,
            status: self.status,
        })
    }

    fn current(&self) -> Result<Snapshot<C>, EngineError> {
        self.snapshot().ok_or(EngineError::NotStarted)
    }

    /// Enter the initial configuration and resolve eventless transitions.
    pub fn start(&mut self, context: C) -> Result<Snapshot<C>, EngineError> {
        if self.status != Status::NotStarted {
            return Err(EngineError::AlreadyStarted);
        }
        let event = Event::init();
        let machine = Arc::clone(&self.machine);
        let mut step = Macrostep::new(
            machine.chart(),
            machine.implementations(),
            self.config.max_microsteps,
            Vec::new(),
            context,
            HashMap::new(),
        );
        step.enter_initial(&event)
            .and_then(|()| step.settle(&event))
            .map_err(|err| self.abort(err, &event))?;

        self.status = Status::Running;
        let snapshot = self.commit(step.finish(), &event).map_err(|err| {
            self.status = Status::NotStarted;
            err
        })?;
        tracing::info!(session = %self.id, machine = %machine.chart().id(), "Session started");
        Ok(snapshot)
    }

    /// Process `event` to a stable configuration.
    ///
    /// An event no active state handles leaves the snapshot unchanged and
    /// does not notify listeners. A fatal error leaves context and
    /// configuration at their previous values.
    ///
    /// Items already waiting in the queue are processed first, so an event
    /// never overtakes a service outcome that was queued before it.
    pub fn send(&mut self, event: Event) -> Result<Snapshot<C>, EngineError> {
        if self.status == Status::Running {
            self.drain()?;
        }
        self.dispatch(event)
    }

    fn dispatch(&mut self, event: Event) -> Result<Snapshot<C>, EngineError> {
        match self.status {
            Status::NotStarted => Err(EngineError::NotStarted),
            Status::Stopped => Err(EngineError::Stopped),
            Status::Done => self.current(),
            Status::Running => self.macrostep(event),
        }
    }

    /// Process a service outcome. Stale outcomes are discarded and yield
    /// `None`.
    pub fn deliver(&mut self, outcome: ServiceOutcome) -> Result<Option<Snapshot<C>>, EngineError> {
        if self.status != Status::Running {
            tracing::warn!(
                session = %self.id,
                event = %outcome.event.name,
                status = ?self.status,
                "Service outcome arrived for an inactive session"
            );
            return Ok(None);
        }
        if !self.invoker.accept(&outcome) {
            tracing::debug!(
                event = %outcome.event.name,
                node = %outcome.node,
                generation = outcome.generation,
                "Discarded stale service outcome"
            );
            return Ok(None);
        }
        self.macrostep(outcome.event).map(Some)
    }

    /// Process one queued item.
    pub fn handle(&mut self, envelope: Envelope) -> Result<Option<Snapshot<C>>, EngineError> {
        match envelope {
            Envelope::Event(event) if self.status == Status::Stopped => {
                tracing::debug!(session = %self.id, event = %event.name, "Dropped event queued after stop");
                Ok(None)
            }
            Envelope::Event(event) => self.dispatch(event).map(Some),
            Envelope::Outcome(outcome) => self.deliver(outcome),
            Envelope::Stop => {
                self.stop();
                Ok(self.snapshot())
            }
        }
    }

    /// Wait for and process the next queued item.
    pub async fn step(&mut self) -> Result<Option<Snapshot<C>>, EngineError> {
        match self.queue_rx.recv().await {
            Some(envelope) => self.handle(envelope),
            None => Ok(None),
        }
    }

    /// Process queued items until the queue is empty and no service call
    /// is outstanding. Does not return while a started service never
    /// completes.
    pub async fn run_until_idle(&mut self) -> Result<Snapshot<C>, EngineError> {
        loop {
            self.drain()?;
            if self.status != Status::Running || self.invoker.pending() == 0 {
                return self.current();
            }
            if let Some(envelope) = self.queue_rx.recv().await {
                self.handle(envelope)?;
            }
        }
    }

    /// Process every item already queued, in order.
    fn drain(&mut self) -> Result<(), EngineError> {
        while let Ok(envelope) = self.queue_rx.try_recv() {
            self.handle(envelope)?;
        }
        Ok(())
    }

    /// Cancel in-flight services and stop accepting events. Listeners are
    /// not notified; no macrostep is taken.
    pub fn stop(&mut self) {
        if self.status == Status::Stopped {
            return;
        }
        self.invoker.cancel_all();
        self.status = Status::Stopped;
        tracing::info!(session = %self.id, "Session stopped");
    }

    /// Capture the current snapshot and history.
    pub fn checkpoint(&self) -> Result<Checkpoint<C>, CheckpointError>
    where
        C: Serialize,
    {
        let snapshot = self.snapshot().ok_or_else(|| {
            CheckpointError::ValidationFailed("interpreter has not been started".to_string())
        })?;
        Ok(Checkpoint::new(self.id, snapshot, self.history.clone()))
    }

    /// Restore an interpreter from `checkpoint`.
    ///
    /// The restored states are entered with fresh generations and their
    /// services are started again; entry actions do not run. A stopped
    /// session resumes as running.
    pub fn resume(
        machine: Arc<Machine<C>>,
        checkpoint: Checkpoint<C>,
        config: InterpreterConfig,
    ) -> Result<Self, CheckpointError> {
        checkpoint.validate()?;
        let Checkpoint {
            session_id,
            snapshot,
            history,
            ..
        } = checkpoint;

        let status = match snapshot.status {
            Status::NotStarted => {
                return Err(CheckpointError::ValidationFailed(
                    "checkpoint was taken before the session started".to_string(),
                ))
            }
            Status::Done => Status::Done,
            Status::Running | Status::Stopped => Status::Running,
        };
        let configuration = {
            let chart = machine.chart();
            chart
                .resolve_path(&snapshot.value)
                .filter(|path| chart.is_valid_configuration(path))
                .ok_or_else(|| {
                    CheckpointError::ValidationFailed(format!(
                        "'{}' is not a configuration of '{}'",
                        snapshot.state(),
                        chart.id()
                    ))
                })?
        };

        let mut interpreter = Self::with_config(machine, config);
        interpreter.id = session_id;
        interpreter.generations = configuration.iter().map(|node| (*node, 1)).collect();
        interpreter.configuration = configuration;
        interpreter.context = Some(snapshot.context);
        interpreter.history = history;
        interpreter.status = status;
        if status == Status::Running {
            interpreter.start_services()?;
        }
        tracing::info!(session = %session_id, state = %snapshot.value.join("."), "Session resumed");
        Ok(interpreter)
    }

    fn macrostep(&mut self, event: Event) -> Result<Snapshot<C>, EngineError> {
        let context = self.context.clone().ok_or(EngineError::NotStarted)?;
        let machine = Arc::clone(&self.machine);
        let mut step = Macrostep::new(
            machine.chart(),
            machine.implementations(),
            self.config.max_microsteps,
            self.configuration.clone(),
            context,
            self.generations.clone(),
        );

        let selected = step
            .select(&event.name, &event)
            .map_err(|err| self.abort(err, &event))?;
        let Some(transition) = selected else {
            tracing::debug!(
                session = %self.id,
                event = %event.name,
                state = %self.value().join("."),
                "Ignored unmatched event"
            );
            return self.current();
        };

        step.microstep(transition, &event)
            .and_then(|()| step.settle(&event))
            .map_err(|err| self.abort(err, &event))?;
        self.commit(step.finish(), &event)
    }

    fn abort(&self, err: EngineError, event: &Event) -> EngineError {
        tracing::error!(
            session = %self.id,
            event = %event.name,
            state = %self.value().join("."),
            error = %err,
            "Macrostep aborted"
        );
        err
    }

    /// Adopt a settled macrostep, reconcile services and notify.
    fn commit(&mut self, settled: Settled<C>, event: &Event) -> Result<Snapshot<C>, EngineError> {
        if !settled.root_done && self.needs_runtime(&settled) {
            tokio::runtime::Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        }

        let previous = self.value();
        self.configuration = settled.configuration;
        self.context = Some(settled.context);
        self.generations = settled.generations;

        if settled.root_done {
            self.status = Status::Done;
            self.invoker.cancel_all();
            tracing::info!(session = %self.id, state = %self.value().join("."), "Reached final state");
        } else {
            let configuration = &self.configuration;
            let generations = &self.generations;
            self.invoker.retain_active(|node, generation| {
                configuration.contains(&node) && generations.get(&node) == Some(&generation)
            });
            self.start_services()?;
        }

        let value = self.value();
        if value != previous {
            self.history = self.history.record(TransitionRecord {
                from: previous,
                to: value,
                event: event.name.clone(),
                timestamp: Utc::now(),
                microsteps: settled.microsteps,
            });
        }

        let snapshot = self.current()?;
        self.notify(&snapshot);
        Ok(snapshot)
    }

    fn needs_runtime(&self, settled: &Settled<C>) -> bool {
        let chart = self.machine.chart();
        settled.configuration.iter().any(|node| {
            let generation = settled.generations.get(node).copied().unwrap_or(0);
            chart.node(*node).invoke().is_some() && !self.invoker.has_generation(*node, generation)
        })
    }

    /// Start the service of every active invoking state that has no call
    /// for its current generation.
    fn start_services(&mut self) -> Result<(), EngineError> {
        let machine = Arc::clone(&self.machine);
        let Some(context) = &self.context else {
            return Ok(());
        };
        for &node in &self.configuration {
            let Some(invoke) = machine.chart().node(node).invoke() else {
                continue;
            };
            let generation = self.generations.get(&node).copied().unwrap_or(0);
            if self.invoker.has_generation(node, generation) {
                continue;
            }
            let service = machine
                .implementations()
                .get_service(&invoke.src)
                .ok_or_else(|| EngineError::UnknownService {
                    service: invoke.src.clone(),
                })?;
            self.invoker.start(node, generation, invoke, service(context))?;
        }
        Ok(())
    }

    fn notify(&mut self, snapshot: &Snapshot<C>) {
        for listener in &mut self.listeners {
            listener(snapshot);
        }
    }

    fn value(&self) -> Vec<String> {
        let chart = self.machine.chart();
        self.configuration
            .iter()
            .skip(1)
            .map(|node| chart.node(*node).key().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ChartBuilder, StateBuilder, TransitionBuilder};
    use crate::core::{GuardError, Implementations, ServiceError};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    fn toggle() -> Arc<Machine<u32>> {
        let chart = ChartBuilder::new("toggle")
            .initial("off")
            .state(StateBuilder::atomic("off").on("FLIP", "on"))
            .state(
                StateBuilder::atomic("on")
                    .entry("count")
                    .on("FLIP", "off")
                    .transition(TransitionBuilder::to("off").event("CHECK").guard("broken")),
            )
            .build()
            .unwrap();
        let implementations = Implementations::new()
            .action("count", |n: &u32, _| n + 1)
            .guard("broken", |_, _| Err(GuardError::new("no answer data")));
        Machine::shared(chart, implementations).unwrap()
    }

    fn lookup(fail: bool) -> Arc<Machine<Vec<String>>> {
        let chart = ChartBuilder::new("lookup")
            .initial("idle")
            .state(StateBuilder::atomic("idle").on("GO", "pending"))
            .state(
                StateBuilder::atomic("pending")
                    .invoke("fetch", "fetch")
                    .on_invoke_done(TransitionBuilder::to("found").action("record"))
                    .on_invoke_error(TransitionBuilder::to("failed").action("record"))
                    .on("CANCEL", "idle"),
            )
            .state(StateBuilder::atomic("found"))
            .state(StateBuilder::atomic("failed"))
            .build()
            .unwrap();
        let implementations = Implementations::new()
            .action("record", |log: &Vec<String>, event: &Event| {
                let mut next = log.clone();
                next.push(event.data.to_string());
                next
            })
            .service("fetch", move |_: &Vec<String>| async move {
                if fail {
                    Err(ServiceError::new("offline"))
                } else {
                    Ok(json!({ "count": 2 }))
                }
            });
        Machine::shared(chart, implementations).unwrap()
    }

    #[test]
    fn send_before_start_fails() {
        let mut interpreter = Interpreter::new(toggle());
        assert_eq!(interpreter.send(Event::new("FLIP")).unwrap_err(), EngineError::NotStarted);
    }

    #[test]
    fn start_twice_fails() {
        let mut interpreter = Interpreter::new(toggle());
        interpreter.start(0).unwrap();
        assert_eq!(interpreter.start(0).unwrap_err(), EngineError::AlreadyStarted);
    }

    #[test]
    fn listeners_see_every_macrostep() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut interpreter = Interpreter::new(toggle());
        let sink = Arc::clone(&seen);
        interpreter.subscribe(move |snapshot| sink.lock().unwrap().push(snapshot.state()));

        interpreter.start(0).unwrap();
        interpreter.send(Event::new("FLIP")).unwrap();
        interpreter.send(Event::new("FLIP")).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["off", "on", "off"]);
    }

    #[test]
    fn unmatched_event_is_silent() {
        let seen = Arc::new(Mutex::new(0));
        let mut interpreter = Interpreter::new(toggle());
        interpreter.start(0).unwrap();
        let sink = Arc::clone(&seen);
        interpreter.subscribe(move |_| *sink.lock().unwrap() += 1);

        let before = interpreter.snapshot().unwrap();
        let after = interpreter.send(Event::new("UNKNOWN")).unwrap();

        assert_eq!(before, after);
        assert_eq!(*seen.lock().unwrap(), 0);
        assert_eq!(interpreter.history().transitions().len(), 1);
    }

    #[test]
    fn guard_error_keeps_previous_state() {
        let mut interpreter = Interpreter::new(toggle());
        interpreter.start(0).unwrap();
        interpreter.send(Event::new("FLIP")).unwrap();
        let before = interpreter.snapshot().unwrap();

        let err = interpreter.send(Event::new("CHECK")).unwrap_err();

        assert!(matches!(err, EngineError::Guard { ref state, .. } if state == "on"));
        assert_eq!(interpreter.snapshot().unwrap(), before);
        assert_eq!(interpreter.status(), Status::Running);
    }

    #[test]
    fn history_records_each_configuration_change() {
        let mut interpreter = Interpreter::new(toggle());
        interpreter.start(0).unwrap();
        interpreter.send(Event::new("FLIP")).unwrap();

        let history = interpreter.history();
        assert_eq!(history.transitions().len(), 2);
        let last = history.last().unwrap();
        assert_eq!(last.from_path(), "off");
        assert_eq!(last.to_path(), "on");
        assert_eq!(last.event, "FLIP");
        assert_eq!(last.microsteps, 1);
    }

    #[test]
    fn stopped_interpreter_rejects_events() {
        let seen = Arc::new(Mutex::new(0));
        let mut interpreter = Interpreter::new(toggle());
        interpreter.start(0).unwrap();
        let sink = Arc::clone(&seen);
        interpreter.subscribe(move |_| *sink.lock().unwrap() += 1);
        interpreter.stop();

        assert_eq!(*seen.lock().unwrap(), 0);
        assert_eq!(interpreter.status(), Status::Stopped);
        assert_eq!(interpreter.send(Event::new("FLIP")).unwrap_err(), EngineError::Stopped);
    }

    #[test]
    fn invoking_without_runtime_keeps_previous_state() {
        let mut interpreter = Interpreter::new(lookup(false));
        interpreter.start(Vec::new()).unwrap();

        let err = interpreter.send(Event::new("GO")).unwrap_err();

        assert_eq!(err, EngineError::NoRuntime);
        assert_eq!(interpreter.snapshot().unwrap().state(), "idle");
    }

    #[tokio::test]
    async fn queued_outcome_is_processed_before_a_later_event() {
        let mut interpreter = Interpreter::new(lookup(false));
        interpreter.start(Vec::new()).unwrap();
        interpreter.send(Event::new("GO")).unwrap();
        tokio::task::yield_now().await;

        let snapshot = interpreter.send(Event::new("CANCEL")).unwrap();

        assert_eq!(snapshot.state(), "found");
        assert_eq!(snapshot.context, vec![json!({ "count": 2 }).to_string()]);
    }

    #[tokio::test]
    async fn events_queued_after_stop_are_dropped() {
        let mut interpreter = Interpreter::new(toggle());
        interpreter.start(0).unwrap();
        let sender = interpreter.sender();
        sender.stop().unwrap();
        sender.send(Event::new("FLIP")).unwrap();

        let snapshot = interpreter.run_until_idle().await.unwrap();

        assert_eq!(snapshot.status, Status::Stopped);
        assert_eq!(snapshot.state(), "off");
    }

    #[tokio::test]
    async fn service_result_is_delivered_through_the_queue() {
        let mut interpreter = Interpreter::new(lookup(false));
        interpreter.start(Vec::new()).unwrap();
        interpreter.send(Event::new("GO")).unwrap();

        let snapshot = interpreter.run_until_idle().await.unwrap();

        assert_eq!(snapshot.state(), "found");
        assert_eq!(snapshot.context, vec![json!({ "count": 2 }).to_string()]);
    }

    #[tokio::test]
    async fn service_failure_routes_to_error_branch() {
        let mut interpreter = Interpreter::new(lookup(true));
        interpreter.start(Vec::new()).unwrap();
        interpreter.send(Event::new("GO")).unwrap();

        let snapshot = interpreter.run_until_idle().await.unwrap();

        assert_eq!(snapshot.state(), "failed");
        assert_eq!(snapshot.context, vec![Value::from("offline").to_string()]);
    }

    #[tokio::test]
    async fn outcome_of_exited_state_is_discarded() {
        let mut interpreter = Interpreter::new(lookup(false));
        interpreter.start(Vec::new()).unwrap();
        interpreter.send(Event::new("GO")).unwrap();
        interpreter.send(Event::new("CANCEL")).unwrap();

        let snapshot = interpreter.run_until_idle().await.unwrap();

        assert_eq!(snapshot.state(), "idle");
        assert!(snapshot.context.is_empty());
    }

    #[tokio::test]
    async fn checkpoint_resume_restarts_services() {
        let machine = lookup(false);
        let mut interpreter = Interpreter::new(Arc::clone(&machine));
        interpreter.start(Vec::new()).unwrap();
        interpreter.send(Event::new("GO")).unwrap();
        let checkpoint = interpreter.checkpoint().unwrap();
        interpreter.stop();

        let json = checkpoint.to_json().unwrap();
        let restored = Checkpoint::from_json(&json).unwrap();
        let mut resumed = Interpreter::resume(machine, restored, InterpreterConfig::default()).unwrap();

        assert_eq!(resumed.id(), interpreter.id());
        let snapshot = resumed.run_until_idle().await.unwrap();
        assert_eq!(snapshot.state(), "found");
        assert_eq!(resumed.history().transitions().len(), 3);
    }

    #[test]
    fn resume_rejects_unknown_configuration() {
        let machine = toggle();
        let checkpoint = Checkpoint::new(
            Uuid::new_v4(),
            Snapshot {
                value: vec!["sideways".to_string()],
                context: 0,
                status: Status::Running,
            },
            StateHistory::new(),
        );

        let err = Interpreter::resume(machine, checkpoint, InterpreterConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, CheckpointError::ValidationFailed(_)));
    }
}
