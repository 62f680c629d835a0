//! Ergonomic testing utilities for request lifecycles
//!
//! This module provides a fluent API for testing a [`RequestLifecycle`] with
//! readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // LifecycleTest is the natural name

use crate::mocks::Recorder;
use observable_rust_core::{RequestError, Transport};
use observable_rust_runtime::{LifecycleConfig, LifecycleState, RequestLifecycle};

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for history assertion functions
type HistoryAssertion<S> = Box<dyn FnOnce(&[Option<S>])>;

/// Type alias for outcome assertion functions
type OutcomeAssertion<T, E> = Box<dyn FnOnce(&Result<Option<T>, RequestError<E>>)>;

/// Fluent API for testing a request lifecycle with Given-When-Then syntax
///
/// The harness starts one request, checks the state right after `start`
/// returns, awaits settlement, then checks the final state, the value the
/// handle resolved with, and every state the subscribers saw.
///
/// # Example
///
/// ```ignore
/// use observable_rust_testing::LifecycleTest;
///
/// LifecycleTest::new(transport)
///     .with_config(LifecycleConfig::default().with_success_status(201))
///     .when_started(Some(user_id))
///     .then_pending(|state| {
///         assert!(state.pending);
///     })
///     .then_settled(|state| {
///         assert_eq!(state.data.as_deref(), Some("x"));
///     })
///     .run()
///     .await;
/// ```
pub struct LifecycleTest<Tr>
where
    Tr: Transport,
{
    transport: Tr,
    config: LifecycleConfig,
    args: Option<Tr::Args>,
    pending_assertions: Vec<StateAssertion<LifecycleState<Tr>>>,
    settled_assertions: Vec<StateAssertion<LifecycleState<Tr>>>,
    history_assertions: Vec<HistoryAssertion<LifecycleState<Tr>>>,
    outcome_assertions: Vec<OutcomeAssertion<Tr::Data, Tr::Error>>,
}

impl<Tr> LifecycleTest<Tr>
where
    Tr: Transport,
    Tr::Data: Clone,
{
    /// Create a new lifecycle test over the given transport
    #[must_use]
    pub fn new(transport: Tr) -> Self {
        Self {
            transport,
            config: LifecycleConfig::default(),
            args: None,
            pending_assertions: Vec::new(),
            settled_assertions: Vec::new(),
            history_assertions: Vec::new(),
            outcome_assertions: Vec::new(),
        }
    }

    /// Set the lifecycle configuration (Given)
    #[must_use]
    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the arguments passed to `start` (When)
    #[must_use]
    pub fn when_started(mut self, args: Option<Tr::Args>) -> Self {
        self.args = args;
        self
    }

    /// Add an assertion about the state right after `start` returns (Then)
    #[must_use]
    pub fn then_pending<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&LifecycleState<Tr>) + 'static,
    {
        self.pending_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the state once the request settled (Then)
    #[must_use]
    pub fn then_settled<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&LifecycleState<Tr>) + 'static,
    {
        self.settled_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about every state delivered to subscribers (Then)
    #[must_use]
    pub fn then_history<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Option<LifecycleState<Tr>>]) + 'static,
    {
        self.history_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about what the request handle resolved with (Then)
    #[must_use]
    pub fn then_outcome<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&Result<Option<Tr::Data>, RequestError<Tr::Error>>) + 'static,
    {
        self.outcome_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// Must be awaited inside a tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if the lifecycle state is ever empty, or if any assertion fails.
    #[allow(clippy::expect_used)] // Test code can use expect
    pub async fn run(self) {
        let lifecycle = RequestLifecycle::with_config(self.transport, self.config);
        let recorder = Recorder::new();
        let _subscription = recorder.attach(lifecycle.state());

        let handle = lifecycle.start(self.args);

        let pending = lifecycle
            .state()
            .get_value()
            .expect("lifecycle state is always populated");
        for assertion in self.pending_assertions {
            assertion(&pending);
        }

        let outcome = handle.await;

        let settled = lifecycle
            .state()
            .get_value()
            .expect("lifecycle state is always populated");
        for assertion in self.settled_assertions {
            assertion(&settled);
        }

        for assertion in self.outcome_assertions {
            assertion(&outcome);
        }

        let history = recorder.values();
        for assertion in self.history_assertions {
            assertion(&history);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::ScriptedTransport;
    use observable_rust_core::Envelope;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[tokio::test]
    async fn test_success_flow() {
        LifecycleTest::new(ScriptedTransport::<(), _, Boom>::new().respond(Envelope::ok("x")))
            .then_pending(|state| {
                assert!(state.pending);
                assert!(state.data.is_none());
            })
            .then_settled(|state| {
                assert!(!state.pending);
                assert_eq!(state.data, Some("x"));
                assert!(state.error.is_none());
            })
            .then_outcome(|outcome| {
                assert!(matches!(outcome, Ok(Some("x"))));
            })
            .then_history(|history| {
                assert_eq!(history.len(), 3);
            })
            .run()
            .await;
    }

    #[tokio::test]
    async fn test_custom_success_status() {
        LifecycleTest::new(ScriptedTransport::<(), _, Boom>::new().respond(Envelope::new(201, 9)))
            .with_config(LifecycleConfig::default().with_success_status(201))
            .then_settled(|state| {
                assert_eq!(state.data, Some(9));
            })
            .run()
            .await;
    }
}
