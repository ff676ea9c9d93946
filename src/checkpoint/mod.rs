//! Checkpoint and resume functionality for interpreters.
//!
//! A checkpoint captures the active configuration, context and history of
//! a session so a long-running conversation can survive a process
//! restart. Guards, actions and services are not serialized; a checkpoint
//! is resumed against the same [`Machine`](crate::core::Machine), and any
//! service whose owning state was active is started again.

use crate::core::StateHistory;
use crate::interpreter::Snapshot;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod error;

pub use error::CheckpointError;

/// Version identifier for checkpoint format
pub const CHECKPOINT_VERSION: u32 = 1;

/// Serializable checkpoint of an interpreter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint<C> {
    /// Checkpoint format version
    pub version: u32,

    /// Unique checkpoint identifier
    pub id: String,

    /// When checkpoint was created
    pub timestamp: DateTime<Utc>,

    /// Interpreter the checkpoint was taken from
    pub session_id: Uuid,

    /// Active configuration, context and status
    pub snapshot: Snapshot<C>,

    /// Macrosteps taken so far
    pub history: StateHistory,
}

impl<C> Checkpoint<C> {
    pub fn new(session_id: Uuid, snapshot: Snapshot<C>, history: StateHistory) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            session_id,
            snapshot,
            history,
        }
    }

    /// Reject checkpoints written by an incompatible format version.
    pub fn validate(&self) -> Result<(), CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: self.version,
                supported: CHECKPOINT_VERSION,
            });
        }
        Ok(())
    }
}

impl<C: Serialize> Checkpoint<C> {
    /// Serialize checkpoint to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, CheckpointError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    /// Serialize checkpoint to compact binary.
    pub fn to_binary(&self) -> Result<Vec<u8>, CheckpointError> {
        bincode::serialize(self).map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }
}

impl<C: DeserializeOwned> Checkpoint<C> {
    /// Deserialize a checkpoint from JSON, checking its version.
    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        let checkpoint: Self = serde_json::from_str(json)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    /// Deserialize a checkpoint from binary, checking its version.
    pub fn from_binary(bytes: &[u8]) -> Result<Self, CheckpointError> {
        let checkpoint: Self = bincode::deserialize(bytes)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }
}
