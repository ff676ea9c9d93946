//! Chartflow: a hierarchical statechart engine
//!
//! Chartflow separates an immutable, shareable chart definition from the
//! runtime that drives it. Charts are declared with builders, validated
//! once, and interpreted per session with context updates applied as
//! pure reducers.
//!
//! # Core Concepts
//!
//! - **StateChart**: Nested atomic, compound and final states with
//!   guarded, eventless and completion transitions
//! - **Implementations**: Guards, actions and asynchronous services
//!   registered by name
//! - **Interpreter**: Processes one event at a time to a stable
//!   configuration and reports a [`Snapshot`](interpreter::Snapshot)
//! - **Services**: Invoked on state entry, cancelled on exit, with stale
//!   results discarded by generation
//! - **Checkpoints**: Snapshot and history persisted as JSON or binary
//!
//! The [`flow`] module contains a complete guided support conversation
//! built on the engine.
//!
//! # Example
//!
//! ```rust
//! use chartflow::builder::{ChartBuilder, StateBuilder, TransitionBuilder};
//! use chartflow::core::{Event, Implementations, Machine};
//! use chartflow::interpreter::Interpreter;
//!
//! let chart = ChartBuilder::new("traffic")
//!     .initial("green")
//!     .state(StateBuilder::atomic("green").on("TIMER", "yellow"))
//!     .state(StateBuilder::atomic("yellow").on("TIMER", "red"))
//!     .state(
//!         StateBuilder::atomic("red")
//!             .transition(TransitionBuilder::to("green").event("TIMER").guard("clear")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let implementations = Implementations::new().guard_fn("clear", |waiting: &u32, _| *waiting == 0);
//! let machine = Machine::shared(chart, implementations).unwrap();
//!
//! let mut interpreter = Interpreter::new(machine);
//! interpreter.start(0).unwrap();
//! interpreter.send(Event::new("TIMER")).unwrap();
//! let snapshot = interpreter.send(Event::new("TIMER")).unwrap();
//! assert_eq!(snapshot.state(), "red");
//!
//! let snapshot = interpreter.send(Event::new("TIMER")).unwrap();
//! assert_eq!(snapshot.state(), "green");
//! ```

pub mod builder;
pub mod checkpoint;
pub mod core;
pub mod flow;
pub mod interpreter;

// Re-export commonly used types
pub use builder::{BuildError, ChartBuilder, StateBuilder, TransitionBuilder};
pub use core::{Event, Implementations, Machine, StateChart, StateHistory};
pub use interpreter::{EngineError, Interpreter, SessionHandle, Snapshot, Status};
