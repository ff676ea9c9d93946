//! Named implementations referenced by a statechart.
//!
//! A chart refers to guards, actions and services by name only. The
//! [`Implementations`] registry maps those names to code, so one
//! immutable chart can be paired with different behavior.

use super::event::Event;
use super::guard::{Guard, GuardError};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Reducer from the current context and event to the next context.
pub type ActionFn<C> = Arc<dyn Fn(&C, &Event) -> C + Send + Sync>;

/// Rejection reason of an invoked service.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("service rejected: {reason}")]
pub struct ServiceError {
    pub reason: String,
}

impl ServiceError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// In-flight service call.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Value, ServiceError>> + Send>>;

/// Factory starting a service call from the current context.
pub type ServiceFn<C> = Arc<dyn Fn(&C) -> ServiceFuture + Send + Sync>;

/// Registry of guards, actions and services keyed by name.
///
/// # Example
///
/// ```rust
/// use chartflow::core::{Event, Implementations};
///
/// let implementations = Implementations::<u32>::new()
///     .guard_fn("positive", |ctx, _| *ctx > 0)
///     .action("increment", |ctx, _| ctx + 1)
///     .service("echo", |ctx| {
///         let value = *ctx;
///         async move { Ok::<_, chartflow::core::ServiceError>(serde_json::json!(value)) }
///     });
///
/// assert!(implementations.has_guard("positive"));
/// assert!(implementations.has_action("increment"));
/// assert!(implementations.has_service("echo"));
/// ```
pub struct Implementations<C> {
    guards: HashMap<String, Guard<C>>,
    actions: HashMap<String, ActionFn<C>>,
    services: HashMap<String, ServiceFn<C>>,
}

impl<C: 'static> Implementations<C> {
    pub fn new() -> Self {
        Self {
            guards: HashMap::new(),
            actions: HashMap::new(),
            services: HashMap::new(),
        }
    }

    /// Register a fallible guard.
    pub fn guard<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&C, &Event) -> Result<bool, GuardError> + Send + Sync + 'static,
    {
        self.guards.insert(name.into(), Guard::new(predicate));
        self
    }

    /// Register a guard that always evaluates.
    pub fn guard_fn<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&C, &Event) -> bool + Send + Sync + 'static,
    {
        self.guards.insert(name.into(), Guard::infallible(predicate));
        self
    }

    /// Register a context reducer.
    pub fn action<F>(mut self, name: impl Into<String>, reducer: F) -> Self
    where
        F: Fn(&C, &Event) -> C + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Arc::new(reducer));
        self
    }

    /// Register an asynchronous service.
    pub fn service<F, Fut>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ServiceError>> + Send + 'static,
    {
        let factory: ServiceFn<C> = Arc::new(move |ctx: &C| Box::pin(factory(ctx)) as ServiceFuture);
        self.services.insert(name.into(), factory);
        self
    }

    pub fn get_guard(&self, name: &str) -> Option<&Guard<C>> {
        self.guards.get(name)
    }

    pub fn get_action(&self, name: &str) -> Option<&ActionFn<C>> {
        self.actions.get(name)
    }

    pub fn get_service(&self, name: &str) -> Option<&ServiceFn<C>> {
        self.services.get(name)
    }

    pub fn has_guard(&self, name: &str) -> bool {
        self.guards.contains_key(name)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn has_service(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }
}

impl<C: 'static> Default for Implementations<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registered_action_reduces_context() {
        let implementations = Implementations::<Vec<String>>::new().action("push", |ctx, event| {
            let mut next = ctx.clone();
            next.push(event.name.clone());
            next
        });

        let action = implementations.get_action("push").unwrap();
        let next = action(&vec!["a".to_string()], &Event::new("b"));
        assert_eq!(next, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn missing_names_are_reported() {
        let implementations = Implementations::<()>::new();
        assert!(implementations.get_guard("nope").is_none());
        assert!(!implementations.has_action("nope"));
        assert!(!implementations.has_service("nope"));
    }

    #[test]
    fn fallible_guard_is_registered() {
        let implementations =
            Implementations::<()>::new().guard("strict", |_, _| Err(GuardError::new("bad")));
        let guard = implementations.get_guard("strict").unwrap();
        assert!(guard.check(&(), &Event::new("x")).is_err());
    }

    #[tokio::test]
    async fn service_future_resolves() {
        let implementations = Implementations::<u64>::new().service("double", |ctx| {
            let value = *ctx * 2;
            async move { Ok::<_, ServiceError>(json!(value)) }
        });

        let factory = implementations.get_service("double").unwrap();
        assert_eq!(factory(&21).await, Ok(json!(42)));
    }

    #[tokio::test]
    async fn service_future_rejects() {
        let implementations = Implementations::<()>::new()
            .service("fail", |_| async { Err::<Value, _>(ServiceError::new("NOPE")) });

        let factory = implementations.get_service("fail").unwrap();
        let err = factory(&()).await.unwrap_err();
        assert_eq!(err.reason, "NOPE");
    }
}
