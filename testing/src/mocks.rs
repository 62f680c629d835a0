//! Test doubles.
//!
//! - [`ScriptedTransport`]: replies from a queue, in order
//! - [`GatedTransport`]: holds every call until the test releases it
//! - [`Recorder`]: remembers every value an observable state delivers

use observable_rust_core::{BoxFuture, Envelope, ObservableState, Subscription, Transport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Reply<T, E> {
    result: Result<Envelope<T>, E>,
    delay: Option<Duration>,
}

/// Transport replying with queued results, one per call.
///
/// Records the arguments of every call. Running out of replies panics inside
/// the request future, which the lifecycle reports as `Aborted`.
///
/// # Example
///
/// ```
/// use observable_rust_core::Envelope;
/// use observable_rust_testing::ScriptedTransport;
///
/// let transport = ScriptedTransport::<u32, &str, std::io::Error>::new()
///     .respond(Envelope::ok("first"))
///     .respond(Envelope::status_only(500));
/// ```
pub struct ScriptedTransport<A, T, E> {
    replies: Arc<Mutex<VecDeque<Reply<T, E>>>>,
    calls: Arc<Mutex<Vec<Option<A>>>>,
}

impl<A, T, E> ScriptedTransport<A, T, E> {
    /// Create a transport with no replies queued.
    #[must_use]
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful transport result.
    #[must_use]
    pub fn respond(self, envelope: Envelope<T>) -> Self {
        self.push(Ok(envelope), None)
    }

    /// Queue a result delivered after `delay`.
    #[must_use]
    pub fn respond_after(self, delay: Duration, envelope: Envelope<T>) -> Self {
        self.push(Ok(envelope), Some(delay))
    }

    /// Queue a transport failure.
    #[must_use]
    pub fn fail(self, error: E) -> Self {
        self.push(Err(error), None)
    }

    /// Queue a transport failure delivered after `delay`.
    #[must_use]
    pub fn fail_after(self, delay: Duration, error: E) -> Self {
        self.push(Err(error), Some(delay))
    }

    fn push(self, result: Result<Envelope<T>, E>, delay: Option<Duration>) -> Self {
        lock(&self.replies).push_back(Reply { result, delay });
        self
    }

    /// Number of replies not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        lock(&self.replies).len()
    }
}

impl<A: Clone, T, E> ScriptedTransport<A, T, E> {
    /// Arguments of every call so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Option<A>> {
        lock(&self.calls).clone()
    }
}

impl<A, T, E> Default for ScriptedTransport<A, T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, T, E> Clone for ScriptedTransport<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            replies: Arc::clone(&self.replies),
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<A, T, E> Transport for ScriptedTransport<A, T, E>
where
    A: Send + 'static,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    type Args = A;
    type Data = T;
    type Error = E;

    fn call(&self, args: Option<A>) -> BoxFuture<'static, Result<Envelope<T>, E>> {
        lock(&self.calls).push(args);
        let reply = lock(&self.replies).pop_front();

        Box::pin(async move {
            #[allow(clippy::panic)] // Test double: an unscripted call is a test bug
            let Some(Reply { result, delay }) = reply else {
                panic!("ScriptedTransport has no reply queued for this call");
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }
}

/// Transport whose calls stay in flight until the test releases them.
///
/// Calls are numbered from 0 in the order they were made. Useful for forcing a
/// specific settlement order between overlapping requests.
pub struct GatedTransport<T, E> {
    gates: Arc<Mutex<Vec<Option<oneshot::Sender<Result<Envelope<T>, E>>>>>>,
}

impl<T, E> GatedTransport<T, E> {
    /// Create a transport with no calls yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            gates: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of calls made so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        lock(&self.gates).len()
    }

    /// Settle call `index` with `result`.
    ///
    /// Returns `false` if there is no such call, it was already released, or
    /// nobody is waiting on it any more.
    pub fn release(&self, index: usize, result: Result<Envelope<T>, E>) -> bool {
        let sender = lock(&self.gates).get_mut(index).and_then(Option::take);
        sender.is_some_and(|sender| sender.send(result).is_ok())
    }
}

impl<T, E> Default for GatedTransport<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for GatedTransport<T, E> {
    fn clone(&self) -> Self {
        Self {
            gates: Arc::clone(&self.gates),
        }
    }
}

impl<T, E> Transport for GatedTransport<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    type Args = ();
    type Data = T;
    type Error = E;

    fn call(&self, _args: Option<()>) -> BoxFuture<'static, Result<Envelope<T>, E>> {
        let (tx, rx) = oneshot::channel();
        lock(&self.gates).push(Some(tx));

        Box::pin(async move {
            match rx.await {
                Ok(result) => result,
                #[allow(clippy::panic)] // Test double: the gate was dropped unreleased
                Err(_) => panic!("GatedTransport dropped before the call was released"),
            }
        })
    }
}

/// Captures every value delivered to a subscriber.
///
/// ```
/// use observable_rust_core::ObservableState;
/// use observable_rust_testing::Recorder;
///
/// let state = ObservableState::with_value(1);
/// let recorder = Recorder::new();
/// let _sub = recorder.attach(&state);
///
/// state.next(Some(2));
/// assert_eq!(recorder.values(), vec![Some(1), Some(2)]);
/// ```
pub struct Recorder<T> {
    values: Arc<Mutex<Vec<Option<T>>>>,
}

impl<T> Recorder<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A subscriber callback appending to this recorder.
    pub fn callback(&self) -> impl Fn(Option<&T>) + Send + Sync + 'static {
        let values = Arc::clone(&self.values);
        move |value: Option<&T>| lock(&values).push(value.cloned())
    }

    /// Subscribe this recorder to `state`.
    pub fn attach(&self, state: &ObservableState<T>) -> Subscription {
        state.subscribe(self.callback())
    }

    /// Everything recorded so far.
    #[must_use]
    pub fn values(&self) -> Vec<Option<T>> {
        lock(&self.values).clone()
    }

    /// The most recent delivery.
    #[must_use]
    pub fn last(&self) -> Option<Option<T>> {
        lock(&self.values).last().cloned()
    }

    /// Number of deliveries.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.values).len()
    }

    /// Whether nothing has been delivered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.values).is_empty()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        lock(&self.values).clear();
    }
}

impl<T> Default for Recorder<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            values: Arc::clone(&self.values),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_transport_replies_in_order() {
        let transport = ScriptedTransport::<u8, &str, std::io::Error>::new()
            .respond(Envelope::ok("a"))
            .respond(Envelope::status_only(404));

        let first = transport.call(Some(1)).await.unwrap();
        let second = transport.call(None).await.unwrap();

        assert_eq!(first, Envelope::ok("a"));
        assert_eq!(second.status, 404);
        assert_eq!(transport.calls(), vec![Some(1), None]);
        assert_eq!(transport.remaining(), 0);
    }

    #[tokio::test]
    async fn test_gated_transport_release() {
        let transport = GatedTransport::<u8, std::io::Error>::new();
        let pending = transport.call(None);

        assert_eq!(transport.calls(), 1);
        assert!(transport.release(0, Ok(Envelope::ok(5))));
        assert!(!transport.release(0, Ok(Envelope::ok(6))));
        assert!(!transport.release(3, Ok(Envelope::ok(7))));

        assert_eq!(pending.await.unwrap(), Envelope::ok(5));
    }

    #[test]
    fn test_recorder_captures_replay_and_updates() {
        let state = ObservableState::with_value("a");
        let recorder = Recorder::new();
        let subscription = recorder.attach(&state);

        state.next(Some("b"));
        subscription.unsubscribe();
        state.next(Some("c"));

        assert_eq!(recorder.values(), vec![Some("a"), Some("b")]);
        assert_eq!(recorder.last(), Some(Some("b")));
    }
}
