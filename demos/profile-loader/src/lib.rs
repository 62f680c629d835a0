//! # Profile Loader Example
//!
//! Loads user profiles through a [`RequestLifecycle`] and renders the request
//! state the way a UI host would.
//!
//! This example showcases:
//! - A hand-written [`Transport`] (an in-memory profile directory)
//! - Status failures vs transport failures
//! - A view that re-renders from selectors on every change
//!
//! ## Example
//!
//! ```no_run
//! use profile_loader::{FakeProfileApi, ProfileView};
//! use observable_rust_runtime::RequestLifecycle;
//!
//! # async fn example() {
//! let lifecycle = RequestLifecycle::new(FakeProfileApi::seeded());
//! let view = ProfileView::attach(&lifecycle);
//!
//! let _ = lifecycle.start(Some(1)).await;
//! println!("{}", view.render());
//! # }
//! ```

use observable_rust_core::{BoxFuture, Envelope, RequestError, Selector, Subscription, Transport};
use observable_rust_runtime::{LifecycleState, RequestLifecycle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// A user profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// User id
    pub id: u32,
    /// Display name
    pub name: String,
}

/// Failures of the fake API itself (as opposed to status codes)
#[derive(Error, Debug)]
pub enum ProfileApiError {
    /// The "server" refused the connection
    #[error("connection refused")]
    ConnectionRefused,
}

/// In-memory profile directory behaving like an HTTP API.
///
/// - known id → `200` with the profile
/// - unknown id → `404` with no payload
/// - missing id → `400` with no payload
/// - id `0` → [`ProfileApiError::ConnectionRefused`]
#[derive(Debug, Clone)]
pub struct FakeProfileApi {
    profiles: HashMap<u32, Profile>,
    latency: Duration,
}

impl FakeProfileApi {
    /// Create an API serving `profiles` with the given latency.
    #[must_use]
    pub fn new(profiles: impl IntoIterator<Item = Profile>, latency: Duration) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.id, p)).collect(),
            latency,
        }
    }

    /// A small directory with two users and 20ms latency.
    #[must_use]
    pub fn seeded() -> Self {
        Self::new(
            [
                Profile {
                    id: 1,
                    name: "Ada Lovelace".to_string(),
                },
                Profile {
                    id: 2,
                    name: "Grace Hopper".to_string(),
                },
            ],
            Duration::from_millis(20),
        )
    }
}

impl Transport for FakeProfileApi {
    type Args = u32;
    type Data = Profile;
    type Error = ProfileApiError;

    fn call(
        &self,
        args: Option<u32>,
    ) -> BoxFuture<'static, Result<Envelope<Profile>, ProfileApiError>> {
        let latency = self.latency;
        let found = args.map(|id| (id, self.profiles.get(&id).cloned()));

        Box::pin(async move {
            tokio::time::sleep(latency).await;
            match found {
                None => Ok(Envelope::status_only(400)),
                Some((0, _)) => Err(ProfileApiError::ConnectionRefused),
                Some((_, Some(profile))) => Ok(Envelope::ok(profile)),
                Some((_, None)) => Ok(Envelope::status_only(404)),
            }
        })
    }
}

/// A minimal "view": re-renders a status line from selectors on every change.
pub struct ProfileView {
    loading: Selector<LifecycleState<FakeProfileApi>, bool>,
    data: Selector<LifecycleState<FakeProfileApi>, Option<Profile>>,
    error: Selector<LifecycleState<FakeProfileApi>, Option<RequestError<ProfileApiError>>>,
    frames: Arc<Mutex<Vec<String>>>,
    subscription: Subscription,
}

impl ProfileView {
    /// Bind a view to `lifecycle`. The current state is rendered immediately.
    #[must_use]
    pub fn attach(lifecycle: &RequestLifecycle<FakeProfileApi>) -> Self {
        let loading = lifecycle.loading();
        let data = lifecycle.data();
        let error = lifecycle.error();
        let frames = Arc::new(Mutex::new(Vec::new()));

        let subscription = {
            let (loading, data, error) = (loading.clone(), data.clone(), error.clone());
            let frames = Arc::clone(&frames);
            lifecycle.loading().subscribe(move || {
                let frame = render_frame(loading.snapshot(), data.snapshot(), error.snapshot());
                tracing::info!(%frame, "render");
                frames
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(frame);
            })
        };

        Self {
            loading,
            data,
            error,
            frames,
            subscription,
        }
    }

    /// Render the current state.
    #[must_use]
    pub fn render(&self) -> String {
        render_frame(
            self.loading.snapshot(),
            self.data.snapshot(),
            self.error.snapshot(),
        )
    }

    /// Every frame rendered so far, in order.
    #[must_use]
    pub fn frames(&self) -> Vec<String> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop re-rendering.
    pub fn detach(&self) {
        self.subscription.unsubscribe();
    }
}

fn render_frame(
    loading: bool,
    data: Option<Profile>,
    error: Option<RequestError<ProfileApiError>>,
) -> String {
    match (loading, data, error) {
        (true, _, _) => "Loading...".to_string(),
        (false, _, Some(error)) => format!("Error: {error}"),
        (false, Some(profile), None) => format!("Profile #{}: {}", profile.id, profile.name),
        (false, None, None) => "No profile".to_string(),
    }
}
