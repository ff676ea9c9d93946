//! Interpreter and session configuration.

/// Upper bound on microsteps in one macrostep unless configured otherwise.
pub const DEFAULT_MAX_MICROSTEPS: usize = 64;

/// Snapshots buffered per session subscriber.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Microsteps allowed in one macrostep before it is aborted as a
    /// non-terminating eventless or completion chain
    pub max_microsteps: usize,
}

impl InterpreterConfig {
    pub fn builder() -> InterpreterConfigBuilder {
        InterpreterConfigBuilder::new()
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_microsteps: DEFAULT_MAX_MICROSTEPS,
        }
    }
}

/// Fluent builder for [`InterpreterConfig`].
///
/// # Example
///
/// ```rust
/// use chartflow::interpreter::InterpreterConfig;
///
/// let config = InterpreterConfig::builder().max_microsteps(8).build();
/// assert_eq!(config.max_microsteps, 8);
/// ```
pub struct InterpreterConfigBuilder {
    max_microsteps: Option<usize>,
}

impl InterpreterConfigBuilder {
    pub fn new() -> Self {
        Self {
            max_microsteps: None,
        }
    }

    pub fn max_microsteps(mut self, limit: usize) -> Self {
        self.max_microsteps = Some(limit.max(1));
        self
    }

    pub fn build(self) -> InterpreterConfig {
        InterpreterConfig {
            max_microsteps: self.max_microsteps.unwrap_or(DEFAULT_MAX_MICROSTEPS),
        }
    }
}

impl Default for InterpreterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration of an asynchronous session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub interpreter: InterpreterConfig,
    /// Capacity of the snapshot broadcast channel
    pub broadcast_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            interpreter: InterpreterConfig::default(),
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}
