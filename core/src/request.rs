//! Request lifecycle state types.
//!
//! A request moves through `idle → pending → (success | failure)` and may be
//! restarted at any time. The progress is stored as a [`RequestState`] inside an
//! [`ObservableState`](crate::observable::ObservableState).

use std::sync::Arc;
use thiserror::Error;

/// Status code treated as success unless configured otherwise.
pub const DEFAULT_SUCCESS_STATUS: u16 = 200;

/// Result of a transport call: a status code plus an optional payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope<T> {
    /// Status code reported by the transport
    pub status: u16,
    /// Payload, if the transport returned one
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Create an envelope with a payload.
    #[must_use]
    pub const fn new(status: u16, data: T) -> Self {
        Self {
            status,
            data: Some(data),
        }
    }

    /// Create an envelope carrying only a status code.
    #[must_use]
    pub const fn status_only(status: u16) -> Self {
        Self { status, data: None }
    }

    /// Shorthand for a `200` envelope.
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self::new(DEFAULT_SUCCESS_STATUS, data)
    }
}

/// Errors stored in a [`RequestState`] or returned from a request handle.
#[derive(Error, Debug)]
pub enum RequestError<E> {
    /// The operation itself failed; the error is forwarded unchanged.
    #[error("{0}")]
    Transport(Arc<E>),

    /// The operation completed with a non-success status code.
    ///
    /// Renders as the bare status code, e.g. `404`.
    #[error("{0}")]
    Status(u16),

    /// The request task ended before it could settle.
    #[error("request ended before settling")]
    Aborted,
}

impl<E> RequestError<E> {
    /// Wrap a transport failure.
    #[must_use]
    pub fn transport(error: E) -> Self {
        Self::Transport(Arc::new(error))
    }

    /// The forwarded transport error, if this is one.
    #[must_use]
    pub fn as_transport(&self) -> Option<&E> {
        match self {
            Self::Transport(error) => Some(error),
            _ => None,
        }
    }

    /// The status code, if this is a status failure.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            _ => None,
        }
    }
}

// Manual impl: cloning shares the `Arc`, so `E` need not be `Clone`.
impl<E> Clone for RequestError<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Transport(error) => Self::Transport(Arc::clone(error)),
            Self::Status(code) => Self::Status(*code),
            Self::Aborted => Self::Aborted,
        }
    }
}

impl<E> PartialEq for RequestError<E> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Transport(a), Self::Transport(b)) => Arc::ptr_eq(a, b),
            (Self::Status(a), Self::Status(b)) => a == b,
            (Self::Aborted, Self::Aborted) => true,
            _ => false,
        }
    }
}

/// Snapshot of one request's progress.
///
/// `data` and `error` are never both set by the lifecycle transitions.
#[derive(Debug)]
pub struct RequestState<T, E> {
    /// Whether a request is in flight
    pub pending: bool,
    /// Payload of the last successful request
    pub data: Option<T>,
    /// Failure of the last request
    pub error: Option<RequestError<E>>,
}

impl<T, E> RequestState<T, E> {
    /// The state before any request has been made.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            pending: false,
            data: None,
            error: None,
        }
    }

    /// A request is in flight; previous data and error are cleared.
    #[must_use]
    pub const fn pending() -> Self {
        Self {
            pending: true,
            data: None,
            error: None,
        }
    }

    /// The request succeeded with `data`.
    #[must_use]
    pub const fn success(data: Option<T>) -> Self {
        Self {
            pending: false,
            data,
            error: None,
        }
    }

    /// The request failed with `error`.
    #[must_use]
    pub const fn failure(error: RequestError<E>) -> Self {
        Self {
            pending: false,
            data: None,
            error: Some(error),
        }
    }

    /// Split into `(loading, data, error)`.
    #[must_use]
    pub fn into_parts(self) -> (bool, Option<T>, Option<RequestError<E>>) {
        (self.pending, self.data, self.error)
    }
}

impl<T: Clone, E> Clone for RequestState<T, E> {
    fn clone(&self) -> Self {
        Self {
            pending: self.pending,
            data: self.data.clone(),
            error: self.error.clone(),
        }
    }
}

impl<T: PartialEq, E> PartialEq for RequestState<T, E> {
    fn eq(&self, other: &Self) -> bool {
        self.pending == other.pending && self.data == other.data && self.error == other.error
    }
}

impl<T, E> Default for RequestState<T, E> {
    fn default() -> Self {
        Self::idle()
    }
}
