//! Observable interpreter state.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NotStarted,
    Running,
    /// A top-level final state was reached
    Done,
    Stopped,
}

/// Active configuration and context after a macrostep.
///
/// `value` lists the active state keys below the root, outermost first.
///
/// # Example
///
/// ```rust
/// use chartflow::interpreter::{Snapshot, Status};
///
/// let snapshot = Snapshot {
///     value: vec!["newTicket".into(), "pending".into()],
///     context: (),
///     status: Status::Running,
/// };
///
/// assert!(snapshot.matches("newTicket"));
/// assert!(snapshot.matches("newTicket.pending"));
/// assert!(!snapshot.matches("newTicket.done"));
/// assert_eq!(snapshot.state(), "newTicket.pending");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<C> {
    pub value: Vec<String>,
    pub context: C,
    pub status: Status,
}

impl<C> Snapshot<C> {
    /// Whether the dotted `path` is a prefix of the active configuration.
    pub fn matches(&self, path: &str) -> bool {
        let keys: Vec<&str> = path.split('.').collect();
        keys.len() <= self.value.len()
            && keys.iter().zip(&self.value).all(|(k, v)| *k == v.as_str())
    }

    /// Dotted active path, e.g. `pingTicket.question`.
    pub fn state(&self) -> String {
        self.value.join(".")
    }

    pub fn is_running(&self) -> bool {
        self.status == Status::Running
    }
}
