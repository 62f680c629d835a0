//! # Observable Rust Testing
//!
//! Testing utilities and helpers for the Observable Rust workspace.
//!
//! This crate provides:
//! - Mock [`Transport`](observable_rust_core::Transport) implementations
//! - A [`Recorder`] capturing every value a state delivers
//! - The fluent [`LifecycleTest`] harness
//! - Tracing setup for tests
//!
//! ## Example
//!
//! ```ignore
//! use observable_rust_testing::{LifecycleTest, mocks::ScriptedTransport};
//! use observable_rust_core::Envelope;
//!
//! #[tokio::test]
//! async fn test_profile_loads() {
//!     LifecycleTest::new(ScriptedTransport::<(), _, std::io::Error>::new().respond(Envelope::ok("x")))
//!         .then_pending(|state| assert!(state.pending))
//!         .then_settled(|state| assert_eq!(state.data, Some("x")))
//!         .run()
//!         .await;
//! }
//! ```

/// Mock implementations of `Transport` and a subscriber recorder
pub mod mocks;

/// Fluent given/when/then harness for request lifecycles
pub mod lifecycle_test;

pub use lifecycle_test::LifecycleTest;
pub use mocks::{GatedTransport, Recorder, ScriptedTransport};

/// Install a test-friendly tracing subscriber.
///
/// Honors `RUST_LOG`; safe to call from every test since repeated
/// initialisation is ignored.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
