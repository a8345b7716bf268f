use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::ts_seconds_float;

/// An error used when parsing `DataCategory` or `DiscardReason`.
#[derive(Debug, Error)]
#[error("invalid client report name")]
pub struct ParseClientReportNameError;

/// The kind of data a discard or a rate limit applies to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum DataCategory {
    /// Error events.
    Error,
    /// Transactions.
    Transaction,
    /// Session updates and aggregates.
    Session,
    /// Individual structured logs.
    LogItem,
    /// Spans, including those inside transactions.
    Span,
    /// User feedback.
    Feedback,
    /// Anything else.
    Default,
}

impl_str_names!(DataCategory, ParseClientReportNameError, {
    Error => "error",
    Transaction => "transaction",
    Session => "session",
    LogItem => "log_item",
    Span => "span",
    Feedback => "feedback",
    Default => "default",
});
impl_str_serde!(DataCategory);

/// Why the SDK dropped data instead of sending it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum DiscardReason {
    /// Dropped by `before_send` or a similar callback.
    BeforeSend,
    /// Dropped by an event processor or integration.
    EventProcessor,
    /// Dropped by random sampling.
    SampleRate,
    /// Dropped because the category is rate limited.
    RatelimitBackoff,
    /// Dropped because the transport queue was full.
    QueueOverflow,
    /// Dropped because the request failed.
    NetworkError,
    /// Dropped because a buffer was full.
    BufferOverflow,
}

impl_str_names!(DiscardReason, ParseClientReportNameError, {
    BeforeSend => "before_send",
    EventProcessor => "event_processor",
    SampleRate => "sample_rate",
    RatelimitBackoff => "ratelimit_backoff",
    QueueOverflow => "queue_overflow",
    NetworkError => "network_error",
    BufferOverflow => "buffer_overflow",
});
impl_str_serde!(DiscardReason);

/// The number of items dropped for one reason and category.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DiscardedEvent {
    /// Why the items were dropped.
    pub reason: DiscardReason,
    /// What was dropped.
    pub category: DataCategory,
    /// How many items were dropped.
    pub quantity: u32,
}

/// Outcomes of data the SDK dropped locally.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClientReport {
    /// When the report was created.
    #[serde(with = "ts_seconds_float")]
    pub timestamp: SystemTime,
    /// The dropped items.
    pub discarded_events: Vec<DiscardedEvent>,
}

impl ClientReport {
    /// Creates a report for the given discards.
    pub fn new(discarded_events: Vec<DiscardedEvent>) -> Self {
        ClientReport {
            timestamp: SystemTime::now(),
            discarded_events,
        }
    }
}
