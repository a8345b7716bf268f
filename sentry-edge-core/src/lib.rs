//! This crate provides the core of the Sentry SDK for edge and server
//! runtimes.
//!
//! `sentry-edge-core` is meant for integration authors that want to
//! instrument their code for sentry.  Applications should use the
//! `sentry-edge` crate instead, which comes with an HTTP transport and
//! `init`.
//!
//! # Core Concepts
//!
//! This crate is centered around the concepts of [`Client`], [`Hub`] and
//! [`Scope`], as well as the extension points via the [`Integration`],
//! [`Transport`] and [`TransportFactory`] traits.
//!
//! # Request Context
//!
//! There is no ambient per-thread or per-task hub.  Each unit of work, such
//! as an incoming request, gets its own [`Hub`] created with
//! [`Hub::new_from_top`], which is then passed to everything that captures
//! data for that unit of work.  Concurrent sub-tasks use [`Hub::fork`].
//!
//! ```
//! use sentry_edge_core::{Hub, Level};
//!
//! fn handle_request(hub: &Hub, path: &str) {
//!     hub.configure_isolation_scope(|scope| scope.set_tag("path", path));
//!     hub.capture_message("handled", Level::Info);
//! }
//!
//! let hub = Hub::new_from_top(&Hub::main());
//! handle_request(&hub, "/users");
//! ```
//!
//! # Edge Runtimes
//!
//! Hosts that may stop executing as soon as a response was returned are
//! supported through the [`WaitUntil`] trait and the [`TaskTracker`]
//! completion barrier, which hold the host open until the events of a
//! request were flushed.
//!
//! # Features
//!
//! - `feature = "test"`: Activates the [`test`] module, which can be used to
//!   write integration tests. It comes with a test transport which can capture
//!   all sent envelopes for inspection.
//! - `feature = "debug-logs"`: Uses the `log` crate for debug output, instead
//!   of printing to `stderr`.
//!
//! [`test`]: test/index.html

#![doc(html_favicon_url = "https://sentry-brand.storage.googleapis.com/favicon.ico")]
#![doc(html_logo_url = "https://sentry-brand.storage.googleapis.com/sentry-glyph-black.png")]
#![warn(missing_docs)]

use std::sync::atomic::{AtomicBool, Ordering};

// macros; these need to be first to be used by other modules
#[macro_use]
mod macros;

mod api;
mod batcher;
mod breadcrumbs;
mod client;
mod client_reports;
mod clientoptions;
mod constants;
mod error;
mod flags;
mod hub;
mod instrument;
mod integration;
mod intodsn;
pub mod logs;
mod performance;
mod scope;
mod session;
mod transport;
mod utils;
mod waituntil;

// public api or exports from this crate
pub use crate::api::*;
pub use crate::breadcrumbs::{ui_breadcrumb, BreadcrumbDebouncer, IntoBreadcrumbs, DEBOUNCE_WINDOW};
pub use crate::client::Client;
pub use crate::client_reports::ClientReportRecorder;
pub use crate::clientoptions::{BeforeCallback, ClientOptions, SessionMode, TracesSampler};
pub use crate::constants::{SDK_NAME, VERSION};
pub use crate::error::{
    capture_error, event_from_error, event_from_error_with_mechanism,
    AggregateError, DEFAULT_MAX_LINKED_ERRORS, GENERIC_MECHANISM,
};
pub use crate::flags::{FeatureFlagBuffer, DEFAULT_MAX_FLAGS, MAX_FLAGS_PER_SPAN};
pub use crate::hub::{Hub, ScopeGuard};
pub use crate::instrument::{instrument, InstrumentOptions};
pub use crate::integration::Integration;
pub use crate::intodsn::IntoDsn;
pub use crate::performance::*;
pub use crate::scope::{EventProcessor, PropagationContext, Scope};
pub use crate::transport::{Transport, TransportFactory};
pub use crate::utils::parse_type_from_debug;
pub use crate::waituntil::{BoxTask, TaskTracker, WaitUntil};

// test utilities
#[cfg(feature = "test")]
pub mod test;

// public api from other crates
#[doc(inline)]
pub use sentry_edge_types as types;
pub use sentry_edge_types::protocol::v7 as protocol;
pub use sentry_edge_types::protocol::v7::{Breadcrumb, Envelope, Level, User};
pub use sentry_edge_types::Uuid;

#[cfg(feature = "debug-logs")]
#[doc(hidden)]
pub use log as __log;

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Whether a client with `debug: true` was created.
#[doc(hidden)]
pub fn debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

pub(crate) fn set_debug_enabled(enabled: bool) {
    DEBUG_ENABLED.store(enabled, Ordering::Relaxed);
}
