//! Mirror a single future's progress into a request state.
//!
//! These are the building blocks of [`RequestLifecycle`](crate::RequestLifecycle)
//! and can be used on their own when there is no [`Transport`] to wrap.
//!
//! Both functions publish the pending state *immediately*, then return a future
//! that publishes the settlement when it completes. Like any Rust future it does
//! nothing until polled. If it is dropped before settling, the state settles as
//! [`RequestError::Aborted`] so it never stays pending.
//!
//! [`Transport`]: observable_rust_core::Transport

use observable_rust_core::{Envelope, ObservableState, RequestError, RequestState};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// What a settled envelope means for the state and for the caller.
pub(crate) struct Settlement<T, E> {
    /// State to publish
    pub state: RequestState<T, E>,
    /// Value handed back to whoever awaits the request
    pub outcome: Result<Option<T>, RequestError<E>>,
}

impl<T, E> Settlement<T, E> {
    /// Label used by metrics and logs.
    pub(crate) const fn kind(&self) -> &'static str {
        match &self.state.error {
            None => "success",
            Some(RequestError::Status(_)) => "status",
            Some(RequestError::Transport(_)) => "transport",
            Some(RequestError::Aborted) => "aborted",
        }
    }

    pub(crate) const fn aborted() -> Self {
        Self {
            state: RequestState::failure(RequestError::Aborted),
            outcome: Err(RequestError::Aborted),
        }
    }
}

/// Owns the obligation to settle a state that was published as pending.
///
/// Consumed by [`settle`](Self::settle) or [`disarm`](Self::disarm). Dropped
/// any other way (the future holding it was dropped, or its task was torn down
/// with the runtime) it publishes [`RequestError::Aborted`].
pub(crate) struct PendingGuard<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    state: Option<ObservableState<RequestState<T, E>>>,
    /// Latest started generation and this request's generation
    generation: Option<(Arc<AtomicU64>, u64)>,
}

impl<T, E> PendingGuard<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub(crate) fn new(state: ObservableState<RequestState<T, E>>) -> Self {
        Self {
            state: Some(state),
            generation: None,
        }
    }

    /// Treat this request as stale once `latest` moves past `generation`.
    pub(crate) fn superseded_by(mut self, latest: Arc<AtomicU64>, generation: u64) -> Self {
        self.generation = Some((latest, generation));
        self
    }

    /// Whether a newer request has started since this one.
    pub(crate) fn is_stale(&self) -> bool {
        self.generation
            .as_ref()
            .is_some_and(|(latest, generation)| latest.load(Ordering::SeqCst) != *generation)
    }

    /// Publish the settled state.
    pub(crate) fn settle(mut self, settled: RequestState<T, E>) {
        if let Some(state) = self.state.take() {
            state.next(Some(settled));
        }
    }

    /// Give up without publishing anything.
    pub(crate) fn disarm(mut self) {
        self.state = None;
    }
}

impl<T, E> Drop for PendingGuard<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn drop(&mut self) {
        let Some(state) = self.state.take() else {
            return;
        };
        if self.is_stale() {
            return;
        }
        tracing::debug!("Request dropped before settling, publishing aborted state");
        state.next(Some(RequestState::failure(RequestError::Aborted)));
    }
}

/// Interpret a transport result.
///
/// A status other than `success_status` fails the *state* but still resolves
/// the caller's outcome with the payload; only a transport error rejects.
pub(crate) fn settle_envelope<T: Clone, E>(
    result: Result<Envelope<T>, E>,
    success_status: u16,
) -> Settlement<T, E> {
    match result {
        Ok(Envelope { status, data }) if status == success_status => Settlement {
            state: RequestState::success(data.clone()),
            outcome: Ok(data),
        },
        Ok(Envelope { status, data }) => Settlement {
            state: RequestState::failure(RequestError::Status(status)),
            outcome: Ok(data),
        },
        Err(error) => {
            let error = RequestError::transport(error);
            Settlement {
                state: RequestState::failure(error.clone()),
                outcome: Err(error),
            }
        }
    }
}

/// Track a plain `Result` future.
///
/// Publishes `pending` now; on completion publishes the value as data, or the
/// error as [`RequestError::Transport`]. Resolves with the future's own result,
/// the error wrapped in the same `Arc` the state holds.
pub fn track<T, E, F>(
    future: F,
    state: &ObservableState<RequestState<T, E>>,
) -> impl Future<Output = Result<T, RequestError<E>>> + Send + 'static
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    state.next(Some(RequestState::pending()));
    let guard = PendingGuard::new(state.clone());

    async move {
        match future.await {
            Ok(value) => {
                guard.settle(RequestState::success(Some(value.clone())));
                Ok(value)
            }
            Err(error) => {
                let error = RequestError::transport(error);
                guard.settle(RequestState::failure(error.clone()));
                Err(error)
            }
        }
    }
}

/// Track a future resolving to an [`Envelope`].
///
/// Publishes `pending` now. On completion, a `success_status` envelope becomes
/// data; any other status becomes [`RequestError::Status`] in the state while the
/// returned future still resolves with the payload. Only a transport failure
/// makes the returned future resolve to `Err`.
pub fn track_envelope<T, E, F>(
    future: F,
    state: &ObservableState<RequestState<T, E>>,
    success_status: u16,
) -> impl Future<Output = Result<Option<T>, RequestError<E>>> + Send + 'static
where
    F: Future<Output = Result<Envelope<T>, E>> + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    state.next(Some(RequestState::pending()));
    let guard = PendingGuard::new(state.clone());

    async move {
        let settlement = settle_envelope(future.await, success_status);
        guard.settle(settlement.state);
        settlement.outcome
    }
}
