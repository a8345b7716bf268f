//! Structured logs.
//!
//! Logs are only captured when [`ClientOptions::enable_logs`] is set. They
//! are batched and sent as a single `log` container item.
//!
//! [`ClientOptions::enable_logs`]: crate::ClientOptions::enable_logs

use std::time::{Duration, SystemTime};

use crate::batcher::{Batcher, Pending};
use crate::client::TransportArc;
use crate::protocol::{EnvelopeItem, Log, LogAttribute, LogLevel, Map};
use crate::{Envelope, Hub};

/// A `log` container is sent as soon as it holds this many logs.
const MAX_LOGS: usize = 100;
const FLUSH_INTERVAL: Duration = Duration::from_secs(5);

pub(crate) type LogsBatcher = Batcher<LogQueue>;

pub(crate) fn logs_batcher(transport: TransportArc) -> LogsBatcher {
    Batcher::new(transport, "logs", FLUSH_INTERVAL, LogQueue::default())
}

#[derive(Default)]
pub(crate) struct LogQueue(Vec<Log>);

impl Pending for LogQueue {
    type Item = Log;

    fn push(&mut self, log: Log) -> bool {
        self.0.push(log);
        self.0.len() >= MAX_LOGS
    }

    fn take_envelopes(&mut self) -> Vec<Envelope> {
        if self.0.is_empty() {
            return Vec::new();
        }
        vec![EnvelopeItem::Logs(std::mem::take(&mut self.0)).into()]
    }
}

/// Creates a log record for the log macros.
#[doc(hidden)]
pub fn new_log(level: LogLevel, body: String, attributes: Map<String, LogAttribute>) -> Log {
    Log {
        level,
        body,
        trace_id: None,
        timestamp: SystemTime::now(),
        severity_number: Some(level.severity_number()),
        attributes,
    }
}

impl Hub {
    /// Captures a structured log.
    ///
    /// The log is enriched from the scope and the client options, passed
    /// through `before_send_log` and then batched.
    pub fn capture_log(&self, log: Log) {
        let Some((client, scope)) = self.client_and_merged_scope() else {
            return;
        };
        client.capture_log(log, &scope);
    }
}

/// Captures a log at the given level, with the given message and attributes.
///
/// It's possible to attach any number of attributes to the log, using either:
/// - The `identifier = value` syntax for simple attributes
/// - The `"string.with.dots" = value` syntax for structured attributes
///
/// After specifying the attributes, the last parameter(s) consist of the message and optionally format args if the message is a format string.
///
/// Logs go to the main hub unless a hub is passed first with `hub = &hub`.
///
/// See also the [`trace`], [`debug`], [`info`], [`warn`], [`error`], and [`fatal`] macros, which call `log!` with the corresponding level.
///
/// # Examples
///
/// ```
/// use sentry_edge_core::{log, protocol::LogLevel, Hub};
///
/// // Simple message
/// log!(LogLevel::Info, "Hello world");
///
/// // Message with format args
/// log!(LogLevel::Debug, "Value is {}", 42);
///
/// // Message with format args and attributes
/// log!(LogLevel::Warn,
///     error_code = 500,
///     "user.id" = "12345",
///     success = false,
///     "Error occurred: {}",
///     "bad input"
/// );
///
/// // Logging to a request hub
/// let hub = Hub::new_from_top(&Hub::main());
/// log!(hub = &hub, LogLevel::Info, "handled request");
/// ```
#[macro_export]
macro_rules! log {
    (hub = $hub:expr, $level:expr, $($rest:tt)+) => {{
        let log = $crate::__log_record!($level, $($rest)+);
        $crate::Hub::capture_log($hub, log)
    }};

    ($level:expr, $($rest:tt)+) => {{
        let log = $crate::__log_record!($level, $($rest)+);
        $crate::Hub::main().capture_log(log)
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_record {
    // Simple message
    ($level:expr, $msg:literal) => {
        $crate::logs::new_log($level, $msg.to_owned(), $crate::protocol::Map::new())
    };

    // Message with format string and args
    ($level:expr, $fmt:literal, $($arg:expr),+) => {{
        let mut attributes = $crate::protocol::Map::new();
        $crate::__log_record!(@format attributes, $level, $fmt, $($arg),+)
    }};

    // Attributes entrypoint
    ($level:expr, $($rest:tt)+) => {{
        let mut attributes = $crate::protocol::Map::new();
        $crate::__log_record!(@internal attributes, $level, $($rest)+)
    }};

    // Attributes base case: no more attributes, simple message
    (@internal $attrs:ident, $level:expr, $msg:literal) => {
        $crate::logs::new_log($level, $msg.to_owned(), $attrs)
    };

    // Attributes base case: no more attributes, message with format string and args
    (@internal $attrs:ident, $level:expr, $fmt:literal, $($arg:expr),+) => {
        $crate::__log_record!(@format $attrs, $level, $fmt, $($arg),+)
    };

    // Attributes recursive case: string literal key
    (@internal $attrs:ident, $level:expr, $key:literal = $value:expr, $($rest:tt)+) => {{
        $attrs.insert(
            $key.to_owned(),
            $crate::protocol::LogAttribute($crate::protocol::Value::from($value))
        );
        $crate::__log_record!(@internal $attrs, $level, $($rest)+)
    }};

    // Attributes recursive case: identifier key
    (@internal $attrs:ident, $level:expr, $key:ident = $value:expr, $($rest:tt)+) => {{
        $attrs.insert(
            stringify!($key).to_owned(),
            $crate::protocol::LogAttribute($crate::protocol::Value::from($value))
        );
        $crate::__log_record!(@internal $attrs, $level, $($rest)+)
    }};

    (@format $attrs:ident, $level:expr, $fmt:literal, $($arg:expr),+) => {{
        $attrs.insert(
            "sentry.message.template".to_owned(),
            $crate::protocol::LogAttribute($crate::protocol::Value::from($fmt))
        );
        let body = format!($fmt, $($arg),+);
        let parameters = [$($crate::protocol::Value::from($arg)),+];
        for (i, parameter) in parameters.into_iter().enumerate() {
            $attrs.insert(
                format!("sentry.message.parameter.{}", i),
                $crate::protocol::LogAttribute(parameter)
            );
        }
        $crate::logs::new_log($level, body, $attrs)
    }};
}

/// Captures a log at the trace level, with the given message and attributes.
///
/// See [`log!`](crate::log) for the accepted syntax.
#[macro_export]
macro_rules! trace {
    (hub = $hub:expr, $($arg:tt)+) => {
        $crate::log!(hub = $hub, $crate::protocol::LogLevel::Trace, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::log!($crate::protocol::LogLevel::Trace, $($arg)+)
    };
}

/// Captures a log at the debug level, with the given message and attributes.
///
/// See [`log!`](crate::log) for the accepted syntax.
#[macro_export]
macro_rules! debug {
    (hub = $hub:expr, $($arg:tt)+) => {
        $crate::log!(hub = $hub, $crate::protocol::LogLevel::Debug, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::log!($crate::protocol::LogLevel::Debug, $($arg)+)
    };
}

/// Captures a log at the info level, with the given message and attributes.
///
/// See [`log!`](crate::log) for the accepted syntax.
#[macro_export]
macro_rules! info {
    (hub = $hub:expr, $($arg:tt)+) => {
        $crate::log!(hub = $hub, $crate::protocol::LogLevel::Info, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::log!($crate::protocol::LogLevel::Info, $($arg)+)
    };
}

/// Captures a log at the warn level, with the given message and attributes.
///
/// See [`log!`](crate::log) for the accepted syntax.
#[macro_export]
macro_rules! warn {
    (hub = $hub:expr, $($arg:tt)+) => {
        $crate::log!(hub = $hub, $crate::protocol::LogLevel::Warn, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::log!($crate::protocol::LogLevel::Warn, $($arg)+)
    };
}

/// Captures a log at the error level, with the given message and attributes.
///
/// See [`log!`](crate::log) for the accepted syntax.
#[macro_export]
macro_rules! error {
    (hub = $hub:expr, $($arg:tt)+) => {
        $crate::log!(hub = $hub, $crate::protocol::LogLevel::Error, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::log!($crate::protocol::LogLevel::Error, $($arg)+)
    };
}

/// Captures a log at the fatal level, with the given message and attributes.
///
/// See [`log!`](crate::log) for the accepted syntax.
#[macro_export]
macro_rules! fatal {
    (hub = $hub:expr, $($arg:tt)+) => {
        $crate::log!(hub = $hub, $crate::protocol::LogLevel::Fatal, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::log!($crate::protocol::LogLevel::Fatal, $($arg)+)
    };
}

#[cfg(all(test, feature = "test"))]
mod tests {
    use crate::protocol::{EnvelopeItem, LogAttribute, LogLevel, Value};
    use crate::test::with_captured_envelopes_options;
    use crate::{ClientOptions, TransactionContext};

    fn capture_logs<F: FnOnce(&crate::Hub)>(
        f: F,
        options: ClientOptions,
    ) -> Vec<crate::protocol::Log> {
        with_captured_envelopes_options(f, options)
            .iter()
            .flat_map(|envelope| envelope.items())
            .filter_map(|item| match item {
                EnvelopeItem::Logs(logs) => Some(logs.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn test_logs_disabled() {
        let logs = capture_logs(
            |hub| crate::info!(hub = hub, "not sent"),
            ClientOptions::default(),
        );
        assert!(logs.is_empty());
    }

    #[test]
    fn test_log_attributes() {
        let logs = capture_logs(
            |hub| {
                crate::log!(
                    hub = hub,
                    LogLevel::Warn,
                    error_code = 500,
                    "user.id" = "12345",
                    "request {} failed",
                    "abc"
                );
            },
            ClientOptions {
                enable_logs: true,
                release: Some("app@1.0.0".into()),
                environment: Some("production".into()),
                server_name: Some("edge-1".into()),
                ..Default::default()
            },
        );
        assert_eq!(logs.len(), 1);

        let log = &logs[0];
        assert_eq!(log.level, LogLevel::Warn);
        assert_eq!(log.body, "request abc failed");
        assert_eq!(log.severity_number, Some(13));
        assert!(log.trace_id.is_some());

        let attr = |key: &str| log.attributes.get(key).cloned();
        assert_eq!(attr("error_code"), Some(LogAttribute(Value::from(500))));
        assert_eq!(attr("user.id"), Some(LogAttribute::from("12345")));
        assert_eq!(
            attr("sentry.message.template"),
            Some(LogAttribute::from("request {} failed"))
        );
        assert_eq!(
            attr("sentry.message.parameter.0"),
            Some(LogAttribute::from("abc"))
        );
        assert_eq!(attr("sentry.release"), Some(LogAttribute::from("app@1.0.0")));
        assert_eq!(
            attr("sentry.environment"),
            Some(LogAttribute::from("production"))
        );
        assert_eq!(attr("server.address"), Some(LogAttribute::from("edge-1")));
        assert_eq!(
            attr("sentry.sdk.name"),
            Some(LogAttribute::from(crate::SDK_NAME))
        );
        assert!(attr("sentry.sdk.version").is_some());
        assert!(attr("sentry.trace.parent_span_id").is_none());
    }

    #[test]
    fn test_log_in_span() {
        let mut trace = None;
        let logs = capture_logs(
            |hub| {
                let transaction = hub.start_transaction(TransactionContext::new("test", "test"));
                trace = Some(transaction.get_trace_context());
                hub.configure_scope(|scope| scope.set_span(Some(transaction.clone().into())));
                crate::info!(hub = hub, "inside");
                transaction.finish();
            },
            ClientOptions {
                enable_logs: true,
                ..Default::default()
            },
        );
        let trace = trace.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].trace_id, Some(trace.trace_id));
        assert_eq!(
            logs[0].attributes.get("sentry.trace.parent_span_id"),
            Some(&LogAttribute::from(trace.span_id.to_string()))
        );
    }

    #[test]
    fn test_before_send_log() {
        let logs = capture_logs(
            |hub| {
                crate::info!(hub = hub, "keep");
                crate::info!(hub = hub, "drop");
            },
            ClientOptions {
                enable_logs: true,
                before_send_log: Some(std::sync::Arc::new(|log| {
                    (log.body != "drop").then_some(log)
                })),
                ..Default::default()
            },
        );
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].body, "keep");
    }
}
