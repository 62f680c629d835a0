//! Transport abstraction consumed by the request lifecycle.
//!
//! A [`Transport`] is whatever actually performs the request: an HTTP client, an
//! RPC stub, or a test double. The lifecycle only needs the [`Envelope`] it
//! resolves to.

use crate::request::Envelope;
use futures::future::BoxFuture;
use std::future::Future;
use std::marker::PhantomData;

/// Performs one asynchronous operation producing an [`Envelope`].
///
/// # Example
///
/// ```ignore
/// struct ProfileApi { client: reqwest::Client }
///
/// impl Transport for ProfileApi {
///     type Args = UserId;
///     type Data = Profile;
///     type Error = reqwest::Error;
///
///     fn call(&self, args: Option<UserId>) -> BoxFuture<'static, Result<Envelope<Profile>, reqwest::Error>> {
///         let client = self.client.clone();
///         Box::pin(async move {
///             let response = client.get(profile_url(args)).send().await?;
///             let status = response.status().as_u16();
///             Ok(Envelope { status, data: response.json().await.ok() })
///         })
///     }
/// }
/// ```
pub trait Transport: Send + Sync + 'static {
    /// Arguments accepted by a call
    type Args: Send + 'static;
    /// Payload carried by a successful envelope
    type Data: Send + Sync + 'static;
    /// Failure of the operation itself
    type Error: Send + Sync + 'static;

    /// Start the operation.
    ///
    /// The returned future must be `'static` so it can outlive the caller.
    fn call(
        &self,
        args: Option<Self::Args>,
    ) -> BoxFuture<'static, Result<Envelope<Self::Data>, Self::Error>>;
}

/// Adapter turning a closure into a [`Transport`]. Built by [`transport_fn`].
pub struct FnTransport<F, A, T, E> {
    f: F,
    _marker: PhantomData<fn(A) -> (T, E)>,
}

/// Wrap a closure returning a future of `Result<Envelope<T>, E>` as a [`Transport`].
///
/// ```ignore
/// let transport = transport_fn(|id: Option<u32>| async move {
///     Ok::<_, std::io::Error>(Envelope::ok(format!("user-{}", id.unwrap_or(0))))
/// });
/// ```
pub const fn transport_fn<F, Fut, A, T, E>(f: F) -> FnTransport<F, A, T, E>
where
    F: Fn(Option<A>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Envelope<T>, E>> + Send + 'static,
{
    FnTransport {
        f,
        _marker: PhantomData,
    }
}

impl<F, Fut, A, T, E> Transport for FnTransport<F, A, T, E>
where
    F: Fn(Option<A>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Envelope<T>, E>> + Send + 'static,
    A: Send + 'static,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    type Args = A;
    type Data = T;
    type Error = E;

    fn call(&self, args: Option<A>) -> BoxFuture<'static, Result<Envelope<T>, E>> {
        Box::pin((self.f)(args))
    }
}
