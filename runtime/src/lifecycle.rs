//! The request lifecycle: one transport, one observable state.

use crate::config::{LifecycleConfig, RacePolicy};
use crate::metrics::LifecycleMetrics;
use crate::track::{PendingGuard, Settlement, settle_envelope};
use futures::FutureExt;
use observable_rust_core::binding::{self, Selector};
use observable_rust_core::{ObservableState, RequestError, RequestState, Transport};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::oneshot;

/// State type driven by a lifecycle over transport `Tr`.
pub type LifecycleState<Tr> =
    RequestState<<Tr as Transport>::Data, <Tr as Transport>::Error>;

/// Drives an [`ObservableState`] of [`RequestState`] through
/// `pending → success | failure` for every call to [`start`](Self::start).
///
/// Cloning yields another handle to the same transport and state.
///
/// # Example
///
/// ```ignore
/// let profile = RequestLifecycle::new(transport_fn(fetch_profile));
///
/// let _sub = profile.loading().subscribe(|| redraw());
/// let handle = profile.start(Some(user_id));
/// assert!(profile.current_loading());
///
/// let payload = handle.await?;
/// ```
pub struct RequestLifecycle<Tr>
where
    Tr: Transport,
{
    transport: Arc<Tr>,
    state: ObservableState<LifecycleState<Tr>>,
    config: LifecycleConfig,
    /// Generation of the most recently started request
    latest: Arc<AtomicU64>,
}

impl<Tr> RequestLifecycle<Tr>
where
    Tr: Transport,
    Tr::Data: Clone,
{
    /// Create a lifecycle with default configuration and an idle state.
    #[must_use]
    pub fn new(transport: Tr) -> Self {
        Self::with_config(transport, LifecycleConfig::default())
    }

    /// Create a lifecycle with custom configuration and an idle state.
    #[must_use]
    pub fn with_config(transport: Tr, config: LifecycleConfig) -> Self {
        Self::with_state(
            transport,
            ObservableState::with_value(RequestState::idle()),
            config,
        )
    }

    /// Create a lifecycle publishing into an existing state.
    #[must_use]
    pub fn with_state(
        transport: Tr,
        state: ObservableState<LifecycleState<Tr>>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            transport: Arc::new(transport),
            state,
            config,
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start a request.
    ///
    /// The pending state is published before this returns and the transport is
    /// invoked immediately. Settlement runs on the current tokio runtime, so the
    /// state settles even if the returned handle is dropped.
    ///
    /// The handle resolves with the envelope's payload for *any* status; a
    /// non-success status only shows up in the state. It resolves to `Err` only
    /// when the transport fails (or the request task dies).
    ///
    /// Outside a tokio runtime the request cannot run: the state and the handle
    /// both report [`RequestError::Aborted`]. The same happens when the runtime
    /// shuts down before the request settles.
    ///
    /// A subscriber panicking while the settlement is published does not change
    /// the handle's outcome; the state already holds the settled value.
    #[tracing::instrument(skip(self, args), name = "lifecycle_start")]
    pub fn start(&self, args: Option<Tr::Args>) -> RequestHandle<Tr::Data, Tr::Error> {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(generation, "Starting request");
        LifecycleMetrics::record_start();

        self.state.next(Some(RequestState::pending()));

        let (tx, rx) = oneshot::channel();
        let handle = RequestHandle { rx, generation };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!(error = %e, "No tokio runtime available, aborting request");
                let settlement = Settlement::aborted();
                LifecycleMetrics::record_failure(settlement.kind(), std::time::Duration::ZERO);
                self.state.next(Some(settlement.state));
                return handle;
            }
        };

        let future = self.transport.call(args);
        let mut guard = PendingGuard::new(self.state.clone());
        if self.config.race_policy == RacePolicy::LatestStarted {
            guard = guard.superseded_by(Arc::clone(&self.latest), generation);
        }
        let success_status = self.config.success_status;
        let started = Instant::now();

        runtime.spawn(async move {
            let settlement = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => settle_envelope(result, success_status),
                Err(_) => {
                    tracing::error!(generation, "Transport future panicked");
                    Settlement::aborted()
                }
            };

            let elapsed = started.elapsed();
            let kind = settlement.kind();
            if kind == "success" {
                LifecycleMetrics::record_success(elapsed);
            } else {
                LifecycleMetrics::record_failure(kind, elapsed);
            }

            if guard.is_stale() {
                tracing::debug!(generation, kind, "Discarding stale settlement");
                LifecycleMetrics::record_stale();
                guard.disarm();
            } else {
                tracing::debug!(generation, kind, ?elapsed, "Request settled");
                let published =
                    std::panic::catch_unwind(AssertUnwindSafe(|| guard.settle(settlement.state)));
                if published.is_err() {
                    tracing::error!(generation, "Subscriber panicked while publishing settlement");
                }
            }

            // The caller may have dropped the handle
            let _ = tx.send(settlement.outcome);
        });

        handle
    }

    /// Whether a request is in flight.
    #[must_use]
    pub fn current_loading(&self) -> bool {
        self.state.read(|s| s.is_some_and(|s| s.pending))
    }

    /// Payload of the last successful request.
    #[must_use]
    pub fn current_data(&self) -> Option<Tr::Data> {
        self.state.read(|s| s.and_then(|s| s.data.clone()))
    }

    /// Failure of the last request.
    #[must_use]
    pub fn current_error(&self) -> Option<RequestError<Tr::Error>> {
        self.state.read(|s| s.and_then(|s| s.error.clone()))
    }

    /// Selector over [`current_loading`](Self::current_loading).
    #[must_use]
    pub fn loading(&self) -> Selector<LifecycleState<Tr>, bool> {
        binding::loading(&self.state)
    }

    /// Selector over [`current_data`](Self::current_data).
    #[must_use]
    pub fn data(&self) -> Selector<LifecycleState<Tr>, Option<Tr::Data>> {
        binding::data(&self.state)
    }

    /// Selector over [`current_error`](Self::current_error).
    #[must_use]
    pub fn error(&self) -> Selector<LifecycleState<Tr>, Option<RequestError<Tr::Error>>> {
        binding::error(&self.state)
    }

    /// The underlying state, for direct subscription.
    #[must_use]
    pub const fn state(&self) -> &ObservableState<LifecycleState<Tr>> {
        &self.state
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &LifecycleConfig {
        &self.config
    }
}

impl<Tr: Transport> Clone for RequestLifecycle<Tr> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            state: self.state.clone(),
            config: self.config.clone(),
            latest: Arc::clone(&self.latest),
        }
    }
}

impl<Tr: Transport> std::fmt::Debug for RequestLifecycle<Tr> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLifecycle")
            .field("config", &self.config)
            .field("latest", &self.latest.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Future returned by [`RequestLifecycle::start`].
///
/// Resolves with the envelope payload, or with the transport error. Dropping it
/// does not cancel the request.
#[must_use = "dropping the handle discards the result, the request still runs"]
pub struct RequestHandle<T, E> {
    rx: oneshot::Receiver<Result<Option<T>, RequestError<E>>>,
    generation: u64,
}

impl<T, E> RequestHandle<T, E> {
    /// Monotonic id of this request within its lifecycle, starting at 1.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

impl<T, E> Future for RequestHandle<T, E> {
    type Output = Result<Option<T>, RequestError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(RequestError::Aborted)))
    }
}

impl<T, E> std::fmt::Debug for RequestHandle<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandle")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
