//! # Observable Rust Core
//!
//! Core types for the Observable Rust workspace.
//!
//! This crate provides a single-slot observable value and the types used to
//! mirror an asynchronous request's progress into one.
//!
//! ## Core Concepts
//!
//! - **ObservableState**: Holds the latest value, notifies subscribers synchronously
//! - **Subscription**: Handle removing exactly one registration
//! - **RequestState**: `pending` / `data` / `error` snapshot of a request
//! - **Transport**: Injected dependency performing the actual request
//! - **Selector**: Subscribe + snapshot pair for reactive hosts
//!
//! ## Architecture Principles
//!
//! - Synchronous, in-order notification
//! - Last value replayed to late subscribers
//! - Dependency injection: states are built once and passed around explicitly
//! - No runtime dependency (the runtime crate drives requests on tokio)
//!
//! ## Example
//!
//! ```
//! use observable_rust_core::{ObservableState, RequestState};
//!
//! let profile: ObservableState<RequestState<String, std::io::Error>> =
//!     ObservableState::with_value(RequestState::idle());
//!
//! let _subscription = profile.subscribe(|state| {
//!     if let Some(state) = state {
//!         println!("loading: {}", state.pending);
//!     }
//! });
//!
//! profile.next(Some(RequestState::pending()));
//! ```

/// Single-slot observable value
pub mod observable;

/// Request lifecycle state, envelope, and error types
pub mod request;

/// Transport trait for the operation behind a request
pub mod transport;

/// Subscribe + snapshot bindings for reactive hosts
pub mod binding;

pub use binding::Selector;
pub use observable::{ObservableState, Subscription};
pub use request::{DEFAULT_SUCCESS_STATUS, Envelope, RequestError, RequestState};
pub use transport::{FnTransport, Transport, transport_fn};

// Re-exported so transport implementors don't need a direct `futures` dependency
pub use futures::future::BoxFuture;
