//! Core statechart types.
//!
//! This module contains the pure, immutable part of the engine:
//! - Events, including the internal outcome and completion events
//! - Resolved state nodes and the [`StateChart`] with its lookups
//! - Guards, action reducers and services registered by name
//! - Immutable macrostep history
//!
//! Nothing here performs I/O or mutates shared state; the
//! [`interpreter`](crate::interpreter) drives these definitions.

mod chart;
mod event;
mod guard;
mod history;
mod machine;
mod node;
mod registry;

pub use chart::StateChart;
pub use event::{done_invoke_name, done_state_name, error_invoke_name, Event, EVENTLESS};
pub use guard::{Guard, GuardError};
pub use history::{StateHistory, TransitionRecord};
pub use machine::Machine;
pub use node::{Invoke, NodeId, NodeKind, StateNode, Transition};
pub use registry::{ActionFn, Implementations, ServiceError, ServiceFn, ServiceFuture};
