//! Macrostep history tracking.
//!
//! Each macrostep that changes the active configuration is recorded as a
//! [`TransitionRecord`]. History is immutable: `record` returns a new
//! history with the record appended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record of one macrostep.
///
/// Paths are the active state keys from the root's child down to the leaf.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Active path before the macrostep
    pub from: Vec<String>,
    /// Active path after the macrostep
    pub to: Vec<String>,
    /// Name of the event that started the macrostep
    pub event: String,
    /// When the macrostep completed
    pub timestamp: DateTime<Utc>,
    /// Number of microsteps taken, eventless and completion steps included
    pub microsteps: usize,
}

impl TransitionRecord {
    pub fn from_path(&self) -> String {
        self.from.join(".")
    }

    pub fn to_path(&self) -> String {
        self.to.join(".")
    }
}

/// Ordered history of macrosteps.
///
/// # Example
///
/// ```rust
/// use chartflow::core::{StateHistory, TransitionRecord};
/// use chrono::Utc;
///
/// let history = StateHistory::new();
/// let next = history.record(TransitionRecord {
///     from: vec!["a".into()],
///     to: vec!["b".into()],
///     event: "GO".into(),
///     timestamp: Utc::now(),
///     microsteps: 1,
/// });
///
/// assert_eq!(history.transitions().len(), 0); // original unchanged
/// assert_eq!(next.get_path().len(), 2); // a -> b
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateHistory {
    transitions: Vec<TransitionRecord>,
}

impl StateHistory {
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
        }
    }

    /// Record a macrostep, returning a new history.
    pub fn record(&self, transition: TransitionRecord) -> Self {
        let mut transitions = self.transitions.clone();
        transitions.push(transition);
        Self { transitions }
    }

    /// Get the sequence of configurations traversed: the first record's
    /// `from`, then every record's `to`.
    pub fn get_path(&self) -> Vec<&[String]> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.first() {
            path.push(first.from.as_slice());
        }
        for transition in &self.transitions {
            path.push(transition.to.as_slice());
        }
        path
    }

    pub fn last(&self) -> Option<&TransitionRecord> {
        self.transitions.last()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }
}
