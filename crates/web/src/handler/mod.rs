//! The handler seam between the transport adapter and application code.

use std::error::Error;
use std::future::Future;

use async_trait::async_trait;

use crate::protocol::{Request, Response};

pub type BoxError = Box<dyn Error + Send + Sync>;

/// A user-supplied request handler.
///
/// Invoked once per transaction with a freshly constructed [`Request`];
/// returns the [`Response`] to serialize, or an error routed through the
/// adapter's error-handling path.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, request: Request) -> Result<Response, BoxError>;
}

/// Adapts an async function into a [`Handler`].
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, BoxError>> + Send,
{
    async fn call(&self, request: Request) -> Result<Response, BoxError> {
        (self.f)(request).await
    }
}

pub fn make_handler<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, BoxError>> + Send,
{
    HandlerFn { f }
}

/// Callback consulted when a transaction fails before or during handling.
///
/// Receives the request when construction succeeded, plus the failure, and
/// may produce a substitute response. Returning `None` falls back to the
/// generic 500 response.
pub type ErrorHandler =
    dyn Fn(Option<&Request>, &(dyn Error + Send + Sync)) -> Option<Response> + Send + Sync;
