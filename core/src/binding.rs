//! Host bindings: subscribe + snapshot pairs over an observable state.
//!
//! Reactive hosts (UI frameworks, TUI render loops, web socket pushers) usually
//! want two functions: one to register a "something changed" callback and one
//! to read the current snapshot. A [`Selector`] provides exactly that for a
//! projection of an [`ObservableState`].
//!
//! ```
//! use observable_rust_core::observable::ObservableState;
//! use observable_rust_core::binding::Selector;
//!
//! let name = ObservableState::with_value("ada".to_string());
//! let length = Selector::new(name.clone(), |value: Option<&String>| value.map_or(0, String::len));
//!
//! assert_eq!(length.snapshot(), 3);
//! name.next(Some("grace".to_string()));
//! assert_eq!(length.snapshot(), 5);
//! ```

use crate::observable::{ObservableState, Subscription};
use crate::request::{RequestError, RequestState};
use std::sync::Arc;

type Projection<S, V> = Arc<dyn Fn(Option<&S>) -> V + Send + Sync>;

/// A projection of an [`ObservableState`] exposed as subscribe + snapshot.
///
/// Selectors over the same state always agree with each other, because each
/// snapshot reads the one underlying value.
pub struct Selector<S, V> {
    source: ObservableState<S>,
    project: Projection<S, V>,
}

impl<S, V> Selector<S, V>
where
    S: Send + Sync + 'static,
    V: 'static,
{
    /// Create a selector projecting `source` through `project`.
    pub fn new<F>(source: ObservableState<S>, project: F) -> Self
    where
        F: Fn(Option<&S>) -> V + Send + Sync + 'static,
    {
        Self {
            source,
            project: Arc::new(project),
        }
    }

    /// Read the projected value.
    pub fn snapshot(&self) -> V {
        self.source.read(|value| (self.project)(value))
    }

    /// Register a change notification; the host re-reads [`Self::snapshot`].
    ///
    /// Like [`ObservableState::subscribe`], `on_change` is also called once on
    /// registration.
    pub fn subscribe<F>(&self, on_change: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.source.subscribe(move |_| on_change())
    }

    /// Register a callback receiving the projected value on every change.
    pub fn subscribe_value<F>(&self, callback: F) -> Subscription
    where
        F: Fn(V) + Send + Sync + 'static,
    {
        let project = Arc::clone(&self.project);
        self.source.subscribe(move |value| callback(project(value)))
    }

    /// The underlying state.
    #[must_use]
    pub const fn source(&self) -> &ObservableState<S> {
        &self.source
    }
}

impl<S, V> Clone for Selector<S, V> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            project: Arc::clone(&self.project),
        }
    }
}

impl<S, V> std::fmt::Debug for Selector<S, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selector").finish_non_exhaustive()
    }
}

impl<T> ObservableState<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Identity selector: snapshot is the current value.
    #[must_use]
    pub fn binding(&self) -> Selector<T, Option<T>> {
        Selector::new(self.clone(), |value: Option<&T>| value.cloned())
    }
}

/// `true` while a request is in flight. An absent state reads as not loading.
#[must_use]
pub fn loading<T, E>(
    state: &ObservableState<RequestState<T, E>>,
) -> Selector<RequestState<T, E>, bool>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    Selector::new(state.clone(), |value: Option<&RequestState<T, E>>| {
        value.is_some_and(|s| s.pending)
    })
}

/// Payload of the last successful request.
#[must_use]
pub fn data<T, E>(
    state: &ObservableState<RequestState<T, E>>,
) -> Selector<RequestState<T, E>, Option<T>>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    Selector::new(state.clone(), |value: Option<&RequestState<T, E>>| {
        value.and_then(|s| s.data.clone())
    })
}

/// Failure of the last request.
#[must_use]
pub fn error<T, E>(
    state: &ObservableState<RequestState<T, E>>,
) -> Selector<RequestState<T, E>, Option<RequestError<E>>>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    Selector::new(state.clone(), |value: Option<&RequestState<T, E>>| {
        value.and_then(|s| s.error.clone())
    })
}
