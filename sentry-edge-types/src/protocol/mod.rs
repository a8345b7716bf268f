//! This module exposes the types for the Sentry protocol in different versions.

mod client_report;
mod envelope;
mod feedback;
mod log;
mod session;
pub mod v7;

/// The latest version of the protocol.
pub const LATEST: u16 = 7;

/// The always latest sentry protocol version.
pub mod latest {
    pub use super::v7::*;
}
