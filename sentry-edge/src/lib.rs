//! This crate provides support for logging events and errors / panics to the
//! [Sentry] error logging service from edge functions and servers.
//!
//! [Sentry]: https://sentry.io/
//!
//! # Quickstart
//!
//! The most convenient way to use this library is via the [`init`] function,
//! which starts a sentry client with a default set of integrations, and binds
//! it to the main hub.  The [`init`] function returns a guard that when
//! dropped will flush Events that were not yet sent to the sentry service.
//!
//! ```
//! let _guard = sentry_edge::init("https://key@sentry.io/42");
//! sentry_edge::capture_message("Hello World!", sentry_edge::Level::Info);
//! // when the guard goes out of scope here, the client will wait up to two
//! // seconds to send remaining events to the service.
//! ```
//!
//! # Request Context
//!
//! Nothing is stored per thread or per task.  Each request gets a [`Hub`]
//! of its own, created from the main hub, and that hub is handed to every
//! function which records data for the request:
//!
//! ```
//! use sentry_edge::{Hub, InstrumentOptions};
//!
//! # async fn handle() {
//! let hub = Hub::new_from_top(&Hub::main());
//! let rows = sentry_edge::instrument(
//!     &hub,
//!     InstrumentOptions::new("db.query", "SELECT users"),
//!     |_hub| async { Ok::<_, std::io::Error>(3) },
//! )
//! .await;
//! # let _ = rows;
//! # }
//! ```
//!
//! With the `tower` feature, the layers of `sentry-edge-tower` do this for
//! every request of an HTTP service.
//!
//! # Features
//!
//! Additional functionality and integrations are enabled via feature flags.
//! Some features are enabled by default.
//!
//! ## Default features
//! - `transport`: Enables the default transport, which is currently `reqwest`
//!   with `native-tls`.
//! - `dedupe`: Enables the dedupe integration, which drops an error event
//!   repeating the one captured right before it.
//!
//! ## Integrations
//! - `tower`: Enables support for the `tower` crate and those using it.
//! - `tower-http`: Enables the HTTP server and client layers.
//!
//! ## Transports
//! - `reqwest`: **Default**.  Enables the `reqwest` transport.
//! - `native-tls`: **Default**.  Uses the `native-tls` crate.
//! - `rustls`: Enables `rustls` support for the `reqwest` transport.  Please
//!   note that `native-tls` is a default feature, and `default-features =
//!   false` must be set to completely disable building `native-tls`
//!   dependencies.
//!
//! ## Other features
//! - `test`: Enables testing support.
//! - `debug-logs`: Uses the `log` crate for internal logging.

#![doc(html_favicon_url = "https://sentry-brand.storage.googleapis.com/favicon.ico")]
#![doc(html_logo_url = "https://sentry-brand.storage.googleapis.com/sentry-glyph-black.png")]
#![warn(missing_docs)]
#![cfg_attr(doc_cfg, feature(doc_cfg))]

mod defaults;
mod init;
pub mod transports;

// re-export from core
#[doc(inline)]
pub use sentry_edge_core::*;

// added public API
pub use crate::defaults::apply_defaults;
pub use crate::init::{init, ClientInitGuard};

/// Available Sentry Integrations.
///
/// Integrations extend the functionality of the SDK for some common frameworks and
/// libraries.  Integrations come two primary kinds: as event *sources* or as event
/// *processors*.
///
/// Integrations which are *sources*, like the `sentry_edge::integrations::tower`
/// layers, usually instrument some framework and capture events on their own.
///
/// Integrations which *process* events in some way implement the
/// [`Integration`](crate::Integration) trait and need to be installed when sentry is
/// initialised.  The [`apply_defaults`] function installs the default ones.
pub mod integrations {
    #[cfg(feature = "dedupe")]
    pub mod dedupe;

    #[cfg(feature = "tower")]
    #[doc(inline)]
    pub use sentry_edge_tower as tower;
}
