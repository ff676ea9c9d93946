//! Stand-in lookup collaborators.
//!
//! Both responders answer from a fixed table after a configurable delay.
//! Keys outside the table are rejected with `NOPE`.

use crate::core::ServiceError;
use serde_json::{json, Value};
use std::time::Duration;

/// Latency of the stand-in responders unless configured otherwise.
pub const DEFAULT_LOOKUP_DELAY: Duration = Duration::from_millis(500);

const REJECTION: &str = "NOPE";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LookupConfig {
    pub delay: Duration,
}

impl LookupConfig {
    /// Responders that answer without waiting.
    pub fn immediate() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_LOOKUP_DELAY,
        }
    }
}

/// Stock of a peripheral.
pub async fn peripheral(item: Option<String>, config: LookupConfig) -> Result<Value, ServiceError> {
    pause(config).await;
    match item.as_deref() {
        Some(name @ "monitor") => Ok(json!({ "item": name, "count": 23 })),
        Some(name @ "laptop") => Ok(json!({ "item": name, "count": 0 })),
        _ => Err(ServiceError::new(REJECTION)),
    }
}

/// Status of a support ticket.
pub async fn ticket(code: Option<String>, config: LookupConfig) -> Result<Value, ServiceError> {
    pause(config).await;
    match code.as_deref() {
        Some(code @ "200") => Ok(json!({ "ticket": code, "item": "monitor", "pinged": true })),
        Some(code @ "202") => Ok(json!({ "ticket": code, "item": "monitor", "pinged": false })),
        Some(code @ "400") => Ok(json!({ "ticket": code, "item": null })),
        _ => Err(ServiceError::new(REJECTION)),
    }
}

async fn pause(config: LookupConfig) {
    if !config.delay.is_zero() {
        tokio::time::sleep(config.delay).await;
    }
}
