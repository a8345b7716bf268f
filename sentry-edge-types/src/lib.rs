//! This crate provides common types for working with the Sentry protocol or the
//! Sentry server as spoken by edge and serverless runtimes.  It's used by the
//! `sentry-edge` client but can also be used independently.
//!
//! It implements the envelope wire format, DSN and auth header handling and
//! the trace propagation headers (`sentry-trace`, `baggage` and
//! `traceparent`) used to continue a trace across service boundaries.
//!
//! # Example
//!
//! ```rust
//! use sentry_edge_types::Dsn;
//!
//! let dsn: Dsn = "https://public@sentry.example.com/1".parse().unwrap();
//! assert_eq!(dsn.project_id().value(), Some(1));
//! assert_eq!(
//!     dsn.envelope_api_url().as_str(),
//!     "https://sentry.example.com/api/1/envelope/"
//! );
//! ```

#![doc(html_favicon_url = "https://sentry-brand.storage.googleapis.com/favicon.ico")]
#![doc(html_logo_url = "https://sentry-brand.storage.googleapis.com/sentry-glyph-black.png")]
#![warn(missing_docs)]

#[macro_use]
mod macros;

mod auth;
mod dsn;
mod project_id;
mod propagation;
pub mod protocol;
pub(crate) mod utils;

pub use crate::auth::*;
pub use crate::dsn::*;
pub use crate::project_id::*;
pub use crate::propagation::*;

// Re-export external types and traits for convenience
pub use uuid::{Uuid, Version as UuidVersion};
