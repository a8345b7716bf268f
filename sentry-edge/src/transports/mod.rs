//! The provided transports.
//!
//! This module exposes all transports that are compiled into the sentry
//! library.  The `reqwest` feature turns on the HTTP transport.

#[cfg(feature = "reqwest")]
use std::sync::Arc;

#[cfg(feature = "reqwest")]
use crate::{ClientOptions, Transport, TransportFactory};

#[cfg(feature = "httpdate")]
mod ratelimit;
#[cfg(feature = "reqwest")]
mod thread;

#[cfg(feature = "httpdate")]
pub use ratelimit::{RateLimiter, RateLimitingCategory};
#[cfg(feature = "reqwest")]
pub use thread::TransportThread;

#[cfg(feature = "reqwest")]
mod reqwest;
#[cfg(feature = "reqwest")]
pub use self::reqwest::ReqwestHttpTransport;

/// The default http transport.
#[cfg(feature = "reqwest")]
pub type HttpTransport = ReqwestHttpTransport;

/// Creates the default HTTP transport.
///
/// This is the default value for `transport` on the client options.  It
/// creates a `HttpTransport`.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct DefaultTransportFactory;

#[cfg(feature = "reqwest")]
impl TransportFactory for DefaultTransportFactory {
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport> {
        Arc::new(HttpTransport::new(options))
    }
}
