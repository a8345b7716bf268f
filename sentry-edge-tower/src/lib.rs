//! Adds support for binding a hub to each request received by a Tower server.
//!
//! Nothing is bound to the executing thread or task.  Instead, the layer
//! hands the hub to the request itself, so that handlers, and the HTTP
//! layers further down, find it there and capture into it.  With `http`
//! requests the hub lands in the request extensions.
//!
//! # Examples
//!
//! ```rust
//! # #[cfg(feature = "http")] {
//! # use tower::ServiceBuilder;
//! # use std::time::Duration;
//! # type Request = http::Request<String>;
//! use sentry_edge_tower::NewSentryLayer;
//!
//! // Compose a Tower service where each request gets its own Sentry hub
//! let service = ServiceBuilder::new()
//!     .layer(NewSentryLayer::<Request>::new_from_top())
//!     .service(tower::service_fn(|req: Request| async move {
//!         let hub = sentry_edge_tower::request_hub(&req);
//!         hub.capture_message("hello", sentry_edge_core::Level::Info);
//!         Ok::<_, std::convert::Infallible>(req.into_body())
//!     }));
//! # }
//! ```
//!
//! More customization can be achieved through the `new` function, such as
//! passing a [`Hub`] directly, or a closure that picks a hub depending on the
//! incoming request.
//!
//! ## Usage with `http`
//!
//! The `http` feature offers two more layers.  [`SentryHttpLayer`] attaches
//! request details onto captured events, captures errors returned by the
//! service, and optionally starts a new performance monitoring transaction
//! based on the incoming HTTP headers.  [`SentryClientLayer`] instruments
//! outgoing requests and propagates the trace to the called service.  Both
//! return the errors of the inner service as [`BoxError`].
//!
//! The created transaction will automatically use the request method and
//! path as its name.  This is sometimes not desirable in case the path
//! contains unique IDs or similar.  In this case, users should manually
//! override the transaction name in the request handler using the
//! [`Scope::set_transaction`](sentry_edge_core::Scope::set_transaction)
//! method.
//!
//! Always define the `Hub` layer before the `Http` one, so that the
//! transaction is started on the hub of the request:
//!
//! ```rust
//! # #[cfg(feature = "http")] {
//! # type Request = http::Request<String>;
//! let layer = tower::ServiceBuilder::new()
//!     .layer(sentry_edge_tower::NewSentryLayer::<Request>::new_from_top())
//!     .layer(sentry_edge_tower::SentryHttpLayer::with_transaction());
//! # }
//! ```

#![doc(html_favicon_url = "https://sentry-brand.storage.googleapis.com/favicon.ico")]
#![doc(html_logo_url = "https://sentry-brand.storage.googleapis.com/sentry-glyph-black.png")]
#![warn(missing_docs)]

use std::marker::PhantomData;
use std::task::{Context, Poll};

use sentry_edge_core::Hub;
use tower_layer::Layer;
use tower_service::Service;

#[cfg(feature = "http")]
mod client;
#[cfg(feature = "http")]
mod server;
#[cfg(feature = "http")]
pub use crate::client::*;
#[cfg(feature = "http")]
pub use crate::server::*;

/// Alias for a type-erased error.
///
/// The HTTP services return their inner service's errors boxed, so that the
/// whole `source()` chain of an error can be captured.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Provides a hub for each request
pub trait HubProvider<Request> {
    /// Returns a hub to be bound to the request
    fn hub(&self, request: &Request) -> Hub;
}

impl<F, Request> HubProvider<Request> for F
where
    F: Fn(&Request) -> Hub,
{
    fn hub(&self, request: &Request) -> Hub {
        (self)(request)
    }
}

impl<Request> HubProvider<Request> for Hub {
    fn hub(&self, _request: &Request) -> Hub {
        self.clone()
    }
}

/// Provides a new hub made from the main hub for each request
#[derive(Clone, Copy)]
pub struct NewFromTopProvider;

impl<Request> HubProvider<Request> for NewFromTopProvider {
    fn hub(&self, _request: &Request) -> Hub {
        Hub::new_from_top(&Hub::main())
    }
}

/// A request that can carry the hub it is handled with.
pub trait BindHub {
    /// Attaches `hub` to the request.
    fn bind_hub(&mut self, hub: Hub);
}

#[cfg(feature = "http")]
impl<B> BindHub for ::http::Request<B> {
    fn bind_hub(&mut self, hub: Hub) {
        self.extensions_mut().insert(hub);
    }
}

/// Returns the hub bound to the request, or the main hub if there is none.
#[cfg(feature = "http")]
pub fn request_hub<B>(request: &::http::Request<B>) -> Hub {
    request
        .extensions()
        .get::<Hub>()
        .cloned()
        .unwrap_or_else(Hub::main)
}

/// Tower layer that binds a specific Sentry hub for each request made.
pub struct SentryLayer<P, Request>
where
    P: HubProvider<Request>,
{
    provider: P,
    _request: PhantomData<fn() -> Request>,
}

impl<S, P, Request> Layer<S> for SentryLayer<P, Request>
where
    P: HubProvider<Request> + Clone,
{
    type Service = SentryService<S, P, Request>;

    fn layer(&self, service: S) -> Self::Service {
        SentryService {
            service,
            provider: self.provider.clone(),
            _request: PhantomData,
        }
    }
}

impl<P, Request> Clone for SentryLayer<P, Request>
where
    P: HubProvider<Request> + Clone,
{
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            _request: PhantomData,
        }
    }
}

impl<P, Request> SentryLayer<P, Request>
where
    P: HubProvider<Request> + Clone,
{
    /// Build a new layer with the given Layer provider
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            _request: PhantomData,
        }
    }
}

/// Tower service that binds a specific Sentry hub for each request made.
pub struct SentryService<S, P, Request>
where
    P: HubProvider<Request>,
{
    service: S,
    provider: P,
    _request: PhantomData<fn() -> Request>,
}

impl<S, Request, P> Service<Request> for SentryService<S, P, Request>
where
    S: Service<Request>,
    P: HubProvider<Request>,
    Request: BindHub,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let hub = self.provider.hub(&request);
        request.bind_hub(hub);
        self.service.call(request)
    }
}

impl<S, P, Request> Clone for SentryService<S, P, Request>
where
    S: Clone,
    P: HubProvider<Request> + Clone,
{
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            provider: self.provider.clone(),
            _request: PhantomData,
        }
    }
}

impl<S, P, Request> SentryService<S, P, Request>
where
    P: HubProvider<Request> + Clone,
{
    /// Wrap a Tower service with a Tower layer that binds a Sentry hub for each request made.
    pub fn new(provider: P, service: S) -> Self {
        SentryLayer::<P, Request>::new(provider).layer(service)
    }
}

/// Tower layer that binds a new Sentry hub for each request made
pub type NewSentryLayer<Request> = SentryLayer<NewFromTopProvider, Request>;

impl<Request> NewSentryLayer<Request> {
    /// Create a new Sentry layer that binds a new Sentry hub for each request made
    pub fn new_from_top() -> Self {
        Self {
            provider: NewFromTopProvider,
            _request: PhantomData,
        }
    }
}

/// Tower service that binds a new Sentry hub for each request made.
pub type NewSentryService<S, Request> = SentryService<S, NewFromTopProvider, Request>;

impl<S, Request> NewSentryService<S, Request> {
    /// Wrap a Tower service with a Tower layer that binds a Sentry hub for each request made.
    pub fn new_from_top(service: S) -> Self {
        Self {
            provider: NewFromTopProvider,
            service,
            _request: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn assert_sync<T: Sync>() {}

    #[test]
    fn test_layer_is_sync_when_request_isnt() {
        assert_sync::<NewSentryLayer<Rc<()>>>(); // Rc<()> is not Sync
    }

    #[test]
    fn test_service_is_sync_when_request_isnt() {
        assert_sync::<NewSentryService<(), Rc<()>>>(); // Rc<()> is not Sync
    }
}
