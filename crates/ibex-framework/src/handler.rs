//! Handlers and the tower service that calls them.
//!
//! A handler is any async function taking the processor's
//! [`HandlerContext`] and the rule's [`Captures`]:
//!
//! ```rust,ignore
//! async fn rot13(ctx: Arc<HandlerContext>, args: Captures) {
//!     ctx.add_response(rotate(args.str(0)));
//! }
//!
//! async fn guarded(ctx: Arc<HandlerContext>, _: Captures) -> anyhow::Result<Flow> {
//!     ctx.add_response("handled");
//!     Ok(Flow::Stop)
//! }
//! ```
//!
//! The return type only has to implement [`HandlerResponse`].

use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::{BoxError, Service};

use crate::context::HandlerContext;
use crate::rule::{Captures, Invocation};

// ============================================================================
// Flow
// ============================================================================

/// What a processor does after one of its handlers ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Flow {
    /// Try the processor's remaining rules.
    #[default]
    Continue,
    /// Skip the processor's remaining rules. Other processors still run.
    Stop,
}

// ============================================================================
// HandlerResponse
// ============================================================================

/// A trait for types that can be returned from handlers.
pub trait HandlerResponse: Send + 'static {
    /// Converts the handler output into a flow decision or a failure.
    fn into_flow(self) -> Result<Flow, BoxError>;
}

impl HandlerResponse for () {
    fn into_flow(self) -> Result<Flow, BoxError> {
        Ok(Flow::Continue)
    }
}

impl HandlerResponse for Flow {
    fn into_flow(self) -> Result<Flow, BoxError> {
        Ok(self)
    }
}

/// On `Err` the error becomes a handler failure, logged by the dispatcher.
impl<T, E> HandlerResponse for Result<T, E>
where
    T: HandlerResponse,
    E: Into<BoxError> + Send + 'static,
{
    fn into_flow(self) -> Result<Flow, BoxError> {
        self.map_err(Into::into)?.into_flow()
    }
}

// ============================================================================
// Handler
// ============================================================================

/// An async function usable as a rule handler.
///
/// Implemented for every `Fn(Arc<HandlerContext>, Captures) -> impl Future`
/// whose output implements [`HandlerResponse`].
pub trait Handler: Clone + Send + Sync + 'static {
    fn call(&self, ctx: Arc<HandlerContext>, args: Captures) -> BoxFuture<'static, Result<Flow, BoxError>>;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Arc<HandlerContext>, Captures) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerResponse,
{
    fn call(&self, ctx: Arc<HandlerContext>, args: Captures) -> BoxFuture<'static, Result<Flow, BoxError>> {
        let fut = (self)(ctx, args);
        async move { fut.await.into_flow() }.boxed()
    }
}

// ============================================================================
// HandlerService
// ============================================================================

/// A tower [`Service`] that calls a single handler with a matched invocation.
///
/// Pattern and authorization filters are stacked on top of it as ordinary
/// tower layers; see [`crate::rule`].
#[derive(Clone)]
pub struct HandlerService<H> {
    handler: H,
}

impl<H> HandlerService<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }
}

impl<H: Handler> Service<Invocation> for HandlerService<H> {
    type Response = Flow;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Flow, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, invocation: Invocation) -> Self::Future {
        let Invocation { ctx, args } = invocation;
        self.handler.call(ctx, args)
    }
}
