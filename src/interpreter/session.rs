//! Asynchronous session actor.
//!
//! A session runs an [`Interpreter`] inside a tokio task that consumes
//! the interpreter's queue. Callers hold a [`SessionHandle`]: events are
//! queued through it, snapshots are broadcast to subscribers and the
//! latest one is kept in a watch channel.

use super::{
    EngineError, EventSender, Interpreter, SessionConfig, SessionError, Snapshot, Status,
};
use crate::checkpoint::{Checkpoint, CheckpointError};
use crate::core::{Event, Machine};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Handle to a running session.
pub struct SessionHandle<C> {
    id: Uuid,
    sender: EventSender,
    snapshots: broadcast::Sender<Snapshot<C>>,
    latest: watch::Receiver<Snapshot<C>>,
    task: Option<JoinHandle<Result<Snapshot<C>, EngineError>>>,
}

impl<C> SessionHandle<C>
where
    C: Clone + Send + Sync + 'static,
{
    /// Start a session of `machine` with `context` on the current tokio
    /// runtime.
    pub fn spawn(
        machine: Arc<Machine<C>>,
        context: C,
        config: SessionConfig,
    ) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let mut interpreter = Interpreter::with_config(machine, config.interpreter.clone());
        let initial = interpreter.start(context)?;
        Ok(Self::launch(&runtime, interpreter, initial, config.broadcast_capacity))
    }

    /// Resume a session from `checkpoint` on the current tokio runtime.
    pub fn resume(
        machine: Arc<Machine<C>>,
        checkpoint: Checkpoint<C>,
        config: SessionConfig,
    ) -> Result<Self, CheckpointError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let interpreter = Interpreter::resume(machine, checkpoint, config.interpreter.clone())?;
        let initial = interpreter
            .snapshot()
            .ok_or(CheckpointError::Resume(EngineError::NotStarted))?;
        Ok(Self::launch(&runtime, interpreter, initial, config.broadcast_capacity))
    }

    fn launch(
        runtime: &tokio::runtime::Handle,
        mut interpreter: Interpreter<C>,
        initial: Snapshot<C>,
        capacity: usize,
    ) -> Self {
        let (snapshots, _) = broadcast::channel(capacity.max(1));
        let (latest_tx, latest) = watch::channel(initial);
        let broadcast = snapshots.clone();
        interpreter.subscribe(move |snapshot| {
            let _ = broadcast.send(snapshot.clone());
            latest_tx.send_replace(snapshot.clone());
        });

        let id = interpreter.id();
        let sender = interpreter.sender();
        let task = runtime.spawn(run(interpreter));
        Self {
            id,
            sender,
            snapshots,
            latest,
            task: Some(task),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue an event behind any already queued.
    pub fn send(&self, event: Event) -> Result<(), SessionError> {
        self.sender.send(event)
    }

    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Receive the snapshot of every later macrostep.
    pub fn subscribe(&self) -> broadcast::Receiver<Snapshot<C>> {
        self.snapshots.subscribe()
    }

    /// Snapshot of the latest macrostep.
    pub fn snapshot(&self) -> Snapshot<C> {
        self.latest.borrow().clone()
    }

    /// Wait until a snapshot satisfies `predicate`, checking the latest
    /// snapshot first.
    pub async fn wait_until(
        &self,
        predicate: impl FnMut(&Snapshot<C>) -> bool,
    ) -> Result<Snapshot<C>, SessionError> {
        let mut latest = self.latest.clone();
        let snapshot = latest
            .wait_for(predicate)
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(snapshot.clone())
    }

    /// Queue a stop request. In-flight services are cancelled when it is
    /// processed.
    pub fn stop(&self) -> Result<(), SessionError> {
        self.sender.stop()
    }

    /// Wait for the session task to end and return its final snapshot.
    pub async fn join(mut self) -> Result<Snapshot<C>, SessionError> {
        let task = self.task.take().ok_or(SessionError::Closed)?;
        let result = task.await.map_err(|_| SessionError::Closed)?;
        Ok(result?)
    }
}

impl<C> Drop for SessionHandle<C> {
    fn drop(&mut self) {
        // An unjoined session is stopped with its last handle.
        if self.task.is_some() {
            let _ = self.sender.stop();
        }
    }
}

async fn run<C>(mut interpreter: Interpreter<C>) -> Result<Snapshot<C>, EngineError>
where
    C: Clone + Send + Sync + 'static,
{
    while interpreter.status() == Status::Running {
        if let Err(err) = interpreter.step().await {
            tracing::error!(session = %interpreter.id(), error = %err, "Session aborted");
            interpreter.stop();
            return Err(err);
        }
    }
    tracing::debug!(session = %interpreter.id(), status = ?interpreter.status(), "Session task ended");
    interpreter.snapshot().ok_or(EngineError::NotStarted)
}
