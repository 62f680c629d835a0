//! # Observable Rust Runtime
//!
//! Runtime support for the Observable Rust workspace.
//!
//! This crate drives asynchronous requests on tokio and mirrors their progress
//! into an [`ObservableState`](observable_rust_core::ObservableState).
//!
//! ## Core Components
//!
//! - **RequestLifecycle**: One transport, one request state, `start` + projections
//! - **RequestHandle**: Future resolving with the request's own outcome
//! - **track / track_envelope**: Lifecycle transitions for a single future
//! - **LifecycleConfig**: Success status and race policy
//!
//! ## Example
//!
//! ```ignore
//! use observable_rust_core::{Envelope, transport_fn};
//! use observable_rust_runtime::RequestLifecycle;
//!
//! let users = RequestLifecycle::new(transport_fn(|page: Option<u32>| async move {
//!     api.list_users(page.unwrap_or(1)).await
//! }));
//!
//! let handle = users.start(Some(2));
//! assert!(users.current_loading());
//!
//! handle.await?;
//! println!("{:?}", users.current_data());
//! ```

/// Lifecycle configuration
pub mod config;

/// `RequestLifecycle` and its handle
pub mod lifecycle;

/// Single-future tracking helpers
pub mod track;

/// Prometheus metrics for observability
pub mod metrics;

pub use config::{LifecycleConfig, RacePolicy};
pub use lifecycle::{LifecycleState, RequestHandle, RequestLifecycle};
pub use track::{track, track_envelope};
