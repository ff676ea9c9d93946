//! Events delivered to the interpreter.
//!
//! External callers send named events carrying a JSON payload. The
//! interpreter also synthesizes internal events for service outcomes
//! (`done.invoke.<id>`, `error.invoke.<id>`) and region completion
//! (`done.state.<id>`); these go through the same transition lookup.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of eventless transitions, evaluated right after entry.
pub const EVENTLESS: &str = "";

const DONE_INVOKE_PREFIX: &str = "done.invoke.";
const ERROR_INVOKE_PREFIX: &str = "error.invoke.";
const DONE_STATE_PREFIX: &str = "done.state.";
const INIT: &str = "chartflow.init";

/// A named event with an arbitrary payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event type used to look up transitions
    #[serde(rename = "type")]
    pub name: String,
    /// Payload, `Value::Null` when the event carries none
    #[serde(default)]
    pub data: Value,
}

impl Event {
    /// Create an event with no payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Value::Null,
        }
    }

    /// Create an event with a payload.
    pub fn with_data(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Pseudo-event the initial macrostep runs under.
    pub fn init() -> Self {
        Self::new(INIT)
    }

    /// Success outcome of the service invoked under `id`.
    pub fn done_invoke(id: &str, data: Value) -> Self {
        Self::with_data(done_invoke_name(id), data)
    }

    /// Failure outcome of the service invoked under `id`.
    pub fn error_invoke(id: &str, reason: impl Into<String>) -> Self {
        Self::with_data(error_invoke_name(id), Value::String(reason.into()))
    }

    /// Completion of the compound state `id`.
    pub fn done_state(id: &str) -> Self {
        Self::new(done_state_name(id))
    }

    /// Decode the payload into a typed value.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}

pub fn done_invoke_name(id: &str) -> String {
    format!("{DONE_INVOKE_PREFIX}{id}")
}

pub fn error_invoke_name(id: &str) -> String {
    format!("{ERROR_INVOKE_PREFIX}{id}")
}

pub fn done_state_name(id: &str) -> String {
    format!("{DONE_STATE_PREFIX}{id}")
}
