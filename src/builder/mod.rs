//! Builder API for declaring statecharts.
//!
//! Charts are declared as nested [`StateBuilder`]s under a
//! [`ChartBuilder`]. Building resolves every transition target and
//! validates the structure, reporting all defects together as a
//! [`BuildError`].

pub mod chart;
pub mod error;
pub mod state;
pub mod transition;
pub mod validate;

pub use chart::ChartBuilder;
pub use error::{BuildError, DefinitionDefect};
pub use state::StateBuilder;
pub use transition::TransitionBuilder;
