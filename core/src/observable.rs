//! Single-slot observable value with synchronous change notification.
//!
//! [`ObservableState`] caches the most recent value published through
//! [`ObservableState::next`] and replays it to every new subscriber.
//!
//! # Example
//!
//! ```
//! use observable_rust_core::observable::ObservableState;
//!
//! let counter = ObservableState::with_value(0);
//! let subscription = counter.subscribe(|value| {
//!     println!("counter is now {value:?}");
//! });
//!
//! counter.next(Some(1));
//! assert_eq!(counter.get_value(), Some(1));
//!
//! subscription.unsubscribe();
//! ```
//!
//! # Delivery order
//!
//! Publishes are queued per state and delivered by one thread at a time, so
//! every subscriber sees values in the order they were stored. A thread that
//! publishes while another thread is delivering blocks until its own value has
//! been delivered. A publish made from inside a callback is queued behind the
//! current pass and delivered before the outermost `next` returns.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};

/// Callback invoked with the current value on every publish.
type Subscriber<T> = Arc<dyn Fn(Option<&T>) + Send + Sync>;

/// Registration id, unique per `ObservableState` instance.
type SubscriberId = u64;

/// One queued notification: a value and the registrations it goes to.
struct Delivery<T> {
    seq: u64,
    value: Option<Arc<T>>,
    targets: Vec<Subscriber<T>>,
}

struct Slot<T> {
    value: Option<Arc<T>>,
    subscribers: Vec<(SubscriberId, Subscriber<T>)>,
    queue: VecDeque<Delivery<T>>,
    /// Thread currently draining `queue`
    drainer: Option<ThreadId>,
    enqueued: u64,
    delivered: u64,
}

impl<T> Slot<T> {
    fn enqueue(&mut self, value: Option<Arc<T>>, targets: Vec<Subscriber<T>>) -> u64 {
        self.enqueued += 1;
        let seq = self.enqueued;
        self.queue.push_back(Delivery {
            seq,
            value,
            targets,
        });
        seq
    }

    fn is_drained_by_current_thread(&self) -> bool {
        self.drainer == Some(thread::current().id())
    }
}

struct Inner<T> {
    slot: Mutex<Slot<T>>,
    /// Signalled whenever a delivery completes or the drainer role frees up
    progress: Condvar,
    next_id: AtomicU64,
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make sure delivery `seq` has reached its subscribers.
    ///
    /// On the draining thread itself (a callback publishing) this returns at
    /// once; the outer drain loop picks the delivery up.
    fn dispatch(&self, mut slot: MutexGuard<'_, Slot<T>>, seq: u64) {
        loop {
            if slot.delivered >= seq || slot.is_drained_by_current_thread() {
                return;
            }
            if slot.drainer.is_none() {
                slot.drainer = Some(thread::current().id());
                drop(slot);
                self.drain();
                return;
            }
            slot = self
                .progress
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn drain(&self) {
        let _release = DrainerRelease { inner: self };
        loop {
            let Some(delivery) = self.lock().queue.pop_front() else {
                return;
            };
            for target in &delivery.targets {
                target(delivery.value.as_deref());
            }
            self.lock().delivered = delivery.seq;
            self.progress.notify_all();
        }
    }
}

/// Gives up the drainer role, also when a subscriber panics mid-delivery.
struct DrainerRelease<'a, T> {
    inner: &'a Inner<T>,
}

impl<T> Drop for DrainerRelease<'_, T> {
    fn drop(&mut self) {
        self.inner.lock().drainer = None;
        self.inner.progress.notify_all();
    }
}

/// A shared cell holding one optional value and notifying subscribers on change.
///
/// Cloning an `ObservableState` yields another handle to the *same* cell. Build
/// it once and pass clones to whoever needs it.
///
/// The internal lock is never held while subscriber callbacks run, so a callback
/// may subscribe, unsubscribe, read, or publish on the same state. A callback
/// must not block on another thread that publishes to the same state.
pub struct ObservableState<T> {
    inner: Arc<Inner<T>>,
}

impl<T> ObservableState<T>
where
    T: Send + Sync + 'static,
{
    /// Create a state holding `initial`.
    #[must_use]
    pub fn new(initial: Option<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot {
                    value: initial.map(Arc::new),
                    subscribers: Vec::new(),
                    queue: VecDeque::new(),
                    drainer: None,
                    enqueued: 0,
                    delivered: 0,
                }),
                progress: Condvar::new(),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Create a state with no value.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(None)
    }

    /// Create a state holding `value`.
    #[must_use]
    pub fn with_value(value: T) -> Self {
        Self::new(Some(value))
    }

    /// Replace the current value and notify every subscriber.
    ///
    /// Subscribers are called synchronously, in registration order, before this
    /// returns. The subscriber list is snapshotted first: registrations added or
    /// removed by a callback take effect from the next publish.
    pub fn next(&self, value: Option<T>) {
        let slot = self.inner.lock();
        self.publish(slot, value.map(Arc::new));
    }

    fn publish(&self, mut slot: MutexGuard<'_, Slot<T>>, value: Option<Arc<T>>) {
        slot.value.clone_from(&value);
        let targets: Vec<Subscriber<T>> = slot
            .subscribers
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect();

        tracing::trace!(
            subscribers = targets.len(),
            present = value.is_some(),
            "Publishing value"
        );

        let seq = slot.enqueue(value, targets);
        self.inner.dispatch(slot, seq);
    }

    /// Register `callback` and immediately call it with the current value.
    ///
    /// Each call creates an independent registration, even for the same
    /// callback. The returned [`Subscription`] removes exactly this one.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&T>) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: Subscriber<T> = Arc::new(callback);

        let mut slot = self.inner.lock();
        slot.subscribers.push((id, Arc::clone(&callback)));
        tracing::trace!(subscriber_id = id, "Subscriber registered");

        if slot.is_drained_by_current_thread() {
            // Registered from a callback: queued deliveries predate this
            // registration, so the replay can go out right away.
            let current = slot.value.clone();
            drop(slot);
            callback(current.as_deref());
        } else {
            let current = slot.value.clone();
            let seq = slot.enqueue(current, vec![callback]);
            self.inner.dispatch(slot, seq);
        }

        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        Subscription {
            remove: Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let mut slot = inner.lock();
                    if let Some(index) = slot.subscribers.iter().position(|(sid, _)| *sid == id) {
                        slot.subscribers.remove(index);
                        tracing::trace!(subscriber_id = id, "Subscriber removed");
                    }
                }
            }),
        }
    }

    /// Read the current value through a closure without cloning it.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(Option<&T>) -> R,
    {
        let current = self.inner.lock().value.clone();
        f(current.as_deref())
    }

    /// Number of live registrations.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

impl<T> ObservableState<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Return a copy of the current value.
    #[must_use]
    pub fn get_value(&self) -> Option<T> {
        self.read(|value| value.cloned())
    }
}

impl<T> ObservableState<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    /// Publish `value` only if it differs from the current value.
    ///
    /// Returns `true` when subscribers were notified.
    pub fn set_if_changed(&self, value: Option<T>) -> bool {
        let slot = self.inner.lock();
        if slot.value.as_deref() == value.as_ref() {
            return false;
        }
        self.publish(slot, value.map(Arc::new));
        true
    }
}

impl<T> Clone for ObservableState<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for ObservableState<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> std::fmt::Debug for ObservableState<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.inner.lock();
        f.debug_struct("ObservableState")
            .field("value", &slot.value)
            .field("subscribers", &slot.subscribers.len())
            .finish()
    }
}

/// Handle returned by [`ObservableState::subscribe`].
///
/// Dropping it does *not* unsubscribe. Only a weak reference to the state is
/// held, so an outstanding subscription never keeps the state alive.
#[derive(Clone)]
pub struct Subscription {
    remove: Arc<dyn Fn() + Send + Sync>,
}

impl Subscription {
    /// Remove this registration. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        (self.remove)();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::panic::AssertUnwindSafe;
    use std::time::Duration;

    type Seen<T> = Arc<Mutex<Vec<Option<T>>>>;

    fn collector<T>() -> (Seen<T>, impl Fn(Option<&T>) + Send + Sync + 'static)
    where
        T: Clone + Send + Sync + 'static,
    {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |value: Option<&T>| {
            sink.lock().unwrap().push(value.cloned());
        })
    }

    #[test]
    fn test_initial_value() {
        let state = ObservableState::with_value(7);
        assert_eq!(state.get_value(), Some(7));

        let empty: ObservableState<i32> = ObservableState::empty();
        assert_eq!(empty.get_value(), None);
    }

    #[test]
    fn test_next_replaces_value() {
        let state = ObservableState::with_value("a".to_string());
        state.next(Some("b".to_string()));
        assert_eq!(state.get_value().as_deref(), Some("b"));

        state.next(None);
        assert_eq!(state.get_value(), None);
    }

    #[test]
    fn test_subscribe_replays_current_value() {
        let state = ObservableState::with_value(3);
        let (seen, callback) = collector::<i32>();

        let _subscription = state.subscribe(callback);

        assert_eq!(*seen.lock().unwrap(), vec![Some(3)]);
    }

    #[test]
    fn test_subscribers_notified_in_order() {
        let state = ObservableState::with_value(0);
        let order = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            let _ = state.subscribe(move |value| {
                order.lock().unwrap().push((name, value.copied()));
            });
        }
        order.lock().unwrap().clear();

        state.next(Some(5));

        assert_eq!(
            *order.lock().unwrap(),
            vec![("first", Some(5)), ("second", Some(5)), ("third", Some(5))]
        );
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let state = ObservableState::with_value(0);
        let (seen, callback) = collector::<i32>();

        let subscription = state.subscribe(callback);
        state.next(Some(1));
        subscription.unsubscribe();
        state.next(Some(2));

        assert_eq!(*seen.lock().unwrap(), vec![Some(0), Some(1)]);
        assert_eq!(state.subscriber_count(), 0);
    }

    #[test]
    fn test_double_unsubscribe_leaves_other_registrations() {
        let state = ObservableState::with_value(0);
        let (first_seen, first) = collector::<i32>();
        let (second_seen, second) = collector::<i32>();

        let first_subscription = state.subscribe(first);
        let _second_subscription = state.subscribe(second);

        first_subscription.unsubscribe();
        first_subscription.unsubscribe();
        state.next(Some(9));

        assert_eq!(*first_seen.lock().unwrap(), vec![Some(0)]);
        assert_eq!(*second_seen.lock().unwrap(), vec![Some(0), Some(9)]);
        assert_eq!(state.subscriber_count(), 1);
    }

    #[test]
    fn test_same_callback_registered_twice() {
        let state = ObservableState::with_value(0);
        let calls = Arc::new(AtomicU64::new(0));
        let callback = {
            let calls = Arc::clone(&calls);
            move |_: Option<&i32>| {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        };

        let a = state.subscribe(callback.clone());
        let _b = state.subscribe(callback);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        a.unsubscribe();
        state.next(Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unsubscribe_during_notification() {
        let state = ObservableState::with_value(0);
        let (seen, callback) = collector::<i32>();
        let holder: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let self_removing = {
            let holder = Arc::clone(&holder);
            move |value: Option<&i32>| {
                if value == Some(&1) {
                    if let Some(subscription) = holder.lock().unwrap().as_ref() {
                        subscription.unsubscribe();
                    }
                }
            }
        };
        let subscription = state.subscribe(self_removing);
        *holder.lock().unwrap() = Some(subscription);
        let _tail = state.subscribe(callback);

        state.next(Some(1));
        state.next(Some(2));

        assert_eq!(*seen.lock().unwrap(), vec![Some(0), Some(1), Some(2)]);
        assert_eq!(state.subscriber_count(), 1);
    }

    #[test]
    fn test_subscribe_during_notification_waits_for_next_pass() {
        let state = ObservableState::with_value(0);
        let late_calls = Arc::new(Mutex::new(Vec::new()));

        let spawner = {
            let state = state.clone();
            let late_calls = Arc::clone(&late_calls);
            move |value: Option<&i32>| {
                if value == Some(&1) {
                    let late_calls = Arc::clone(&late_calls);
                    let _ = state.subscribe(move |v| late_calls.lock().unwrap().push(v.copied()));
                }
            }
        };
        let _ = state.subscribe(spawner);

        state.next(Some(1));
        // Only the replay on registration, not a second delivery in the same pass.
        assert_eq!(*late_calls.lock().unwrap(), vec![Some(1)]);

        state.next(Some(2));
        assert_eq!(*late_calls.lock().unwrap(), vec![Some(1), Some(2)]);
    }

    #[test]
    fn test_publish_from_callback() {
        let state = ObservableState::with_value(0);
        let clamp = {
            let state = state.clone();
            move |value: Option<&i32>| {
                if let Some(&v) = value {
                    if v > 10 {
                        state.next(Some(10));
                    }
                }
            }
        };
        let _ = state.subscribe(clamp);
        let (seen, callback) = collector::<i32>();
        let _ = state.subscribe(callback);

        state.next(Some(42));

        assert_eq!(state.get_value(), Some(10));
        // The nested publish waits for the current pass to finish
        assert_eq!(*seen.lock().unwrap(), vec![Some(0), Some(42), Some(10)]);
    }

    #[test]
    fn test_concurrent_publishers_deliver_in_store_order() {
        let state = ObservableState::with_value(0);
        let _slow = state.subscribe(|value| {
            if value == Some(&1) {
                thread::sleep(Duration::from_millis(100));
            }
        });
        let (seen, callback) = collector::<i32>();
        let _ = state.subscribe(callback);

        let publisher = {
            let state = state.clone();
            thread::spawn(move || state.next(Some(1)))
        };
        thread::sleep(Duration::from_millis(20));
        state.next(Some(2));
        publisher.join().unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen.last().copied().flatten(), state.get_value());
        assert_eq!(seen, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn test_panicking_subscriber_does_not_wedge_delivery() {
        let state = ObservableState::with_value(0);
        let _ = state.subscribe(|value| {
            if value == Some(&1) {
                panic!("subscriber failed");
            }
        });
        let (seen, callback) = collector::<i32>();
        let _ = state.subscribe(callback);

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| state.next(Some(1))));
        assert!(result.is_err());

        state.next(Some(2));
        assert_eq!(*seen.lock().unwrap(), vec![Some(0), Some(2)]);
        assert_eq!(state.get_value(), Some(2));
    }

    #[test]
    fn test_set_if_changed() {
        let state = ObservableState::with_value(1);
        let (seen, callback) = collector::<i32>();
        let _ = state.subscribe(callback);

        assert!(!state.set_if_changed(Some(1)));
        assert!(state.set_if_changed(Some(2)));
        assert!(state.set_if_changed(None));
        assert!(!state.set_if_changed(None));

        assert_eq!(*seen.lock().unwrap(), vec![Some(1), Some(2), None]);
    }

    #[test]
    fn test_subscription_does_not_keep_state_alive() {
        let state = ObservableState::with_value(0);
        let subscription = state.subscribe(|_| {});
        drop(state);
        subscription.unsubscribe();
    }

    proptest! {
        #[test]
        fn prop_get_value_tracks_last_next(
            values in proptest::collection::vec(proptest::option::of(any::<i64>()), 1..32),
        ) {
            let state = ObservableState::empty();
            for value in values {
                state.next(value);
                prop_assert_eq!(state.get_value(), value);
                prop_assert_eq!(state.get_value(), value);
            }
        }

        #[test]
        fn prop_every_subscriber_sees_every_value(
            subscriber_count in 1usize..8,
            values in proptest::collection::vec(any::<u8>(), 0..16),
        ) {
            let state = ObservableState::with_value(0u8);
            let logs: Vec<_> = (0..subscriber_count)
                .map(|_| {
                    let (seen, callback) = collector::<u8>();
                    let _ = state.subscribe(callback);
                    seen
                })
                .collect();

            for value in &values {
                state.next(Some(*value));
            }

            let expected: Vec<Option<u8>> = std::iter::once(Some(0))
                .chain(values.iter().copied().map(Some))
                .collect();
            for log in logs {
                prop_assert_eq!(&*log.lock().unwrap(), &expected);
            }
        }
    }
}
