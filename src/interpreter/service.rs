//! Invoked services and the interpreter's event queue.
//!
//! Each entry into a state bumps that state's generation. A service is
//! started for the generation that is active when the macrostep settles,
//! and its outcome is posted back to the same FIFO queue as external
//! events, tagged with that generation. Outcomes whose generation is no
//! longer live are discarded.

use crate::core::{Event, Invoke, NodeId, ServiceFuture};
use crate::interpreter::error::{EngineError, SessionError};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Result of an invoked service, tagged with the state instance that
/// started it.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceOutcome {
    pub node: NodeId,
    pub generation: u64,
    pub event: Event,
}

/// Items consumed by the interpreter, one at a time, in arrival order.
#[derive(Debug)]
pub enum Envelope {
    Event(Event),
    Outcome(ServiceOutcome),
    Stop,
}

/// Cloneable producer side of an interpreter's event queue.
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl EventSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { tx }
    }

    /// Queue an external event.
    pub fn send(&self, event: Event) -> Result<(), SessionError> {
        self.tx
            .send(Envelope::Event(event))
            .map_err(|_| SessionError::Closed)
    }

    /// Queue a stop request behind any events already queued.
    pub fn stop(&self) -> Result<(), SessionError> {
        self.tx.send(Envelope::Stop).map_err(|_| SessionError::Closed)
    }
}

struct ServiceHandle {
    service_id: String,
    generation: u64,
    finished: bool,
    task: JoinHandle<()>,
}

/// Tracks at most one live call per state.
pub(crate) struct ServiceInvoker {
    live: HashMap<NodeId, ServiceHandle>,
    outcomes: mpsc::UnboundedSender<Envelope>,
}

impl ServiceInvoker {
    pub(crate) fn new(outcomes: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            live: HashMap::new(),
            outcomes,
        }
    }

    /// Whether a call was already started for this state instance.
    pub(crate) fn has_generation(&self, node: NodeId, generation: u64) -> bool {
        self.live
            .get(&node)
            .is_some_and(|handle| handle.generation == generation)
    }

    /// Spawn the call for `generation` of `node`, replacing any older call.
    pub(crate) fn start(
        &mut self,
        node: NodeId,
        generation: u64,
        invoke: &Invoke,
        call: ServiceFuture,
    ) -> Result<(), EngineError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let outcomes = self.outcomes.clone();
        let service_id = invoke.id.clone();
        let task = runtime.spawn(async move {
            let event = match call.await {
                Ok(data) => Event::done_invoke(&service_id, data),
                Err(err) => Event::error_invoke(&service_id, err.reason),
            };
            let _ = outcomes.send(Envelope::Outcome(ServiceOutcome {
                node,
                generation,
                event,
            }));
        });

        tracing::debug!(service = %invoke.id, %node, generation, "Started invoked service");
        let handle = ServiceHandle {
            service_id: invoke.id.clone(),
            generation,
            finished: false,
            task,
        };
        if let Some(previous) = self.live.insert(node, handle) {
            previous.task.abort();
        }
        Ok(())
    }

    /// Claim an outcome. Returns false for stale or duplicate deliveries.
    pub(crate) fn accept(&mut self, outcome: &ServiceOutcome) -> bool {
        match self.live.get_mut(&outcome.node) {
            Some(handle) if handle.generation == outcome.generation && !handle.finished => {
                handle.finished = true;
                true
            }
            _ => false,
        }
    }

    /// Cancel every call whose owning state instance is no longer active.
    pub(crate) fn retain_active(&mut self, active: impl Fn(NodeId, u64) -> bool) {
        self.live.retain(|node, handle| {
            let keep = active(*node, handle.generation);
            if !keep {
                tracing::debug!(
                    service = %handle.service_id,
                    generation = handle.generation,
                    "Cancelled invoked service of exited state"
                );
                handle.task.abort();
            }
            keep
        });
    }

    pub(crate) fn cancel_all(&mut self) {
        for (_, handle) in self.live.drain() {
            handle.task.abort();
        }
    }

    /// Calls started but not yet delivered.
    pub(crate) fn pending(&self) -> usize {
        self.live.values().filter(|handle| !handle.finished).count()
    }
}

impl Drop for ServiceInvoker {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
