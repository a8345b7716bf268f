//! The instrumentation pattern shared by all integrations.
//!
//! An instrumented operation opens a span, runs the operation, records its
//! outcome and closes the span again.  Errors are captured on their way back
//! to the caller and then returned unchanged.

use std::error::Error;
use std::future::Future;

use crate::protocol::{Breadcrumb, Map, Mechanism, SpanStatus, Value};
use crate::{Hub, TransactionContext, TransactionOrSpan};

/// Describes the span [`instrument`] opens.
#[derive(Debug, Clone, Default)]
pub struct InstrumentOptions {
    /// The operation of the span, e.g. `db.query`.
    pub op: String,
    /// A description of the span, e.g. the query.
    pub description: String,
    /// The instrumentation creating the span.  Also used as the mechanism
    /// type of captured errors.
    pub origin: String,
    /// Attributes set on the span.
    pub attributes: Map<String, Value>,
    /// Recorded once the operation settled.
    pub breadcrumb: Option<Breadcrumb>,
}

impl InstrumentOptions {
    /// Creates options for a span with the given `op` and `description`.
    pub fn new(op: &str, description: &str) -> Self {
        Self {
            op: op.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    /// Sets the origin of the span.
    #[must_use]
    pub fn origin(mut self, origin: &str) -> Self {
        self.origin = origin.into();
        self
    }

    /// Sets an attribute of the span.
    #[must_use]
    pub fn attribute<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Records `breadcrumb` once the operation settled.
    #[must_use]
    pub fn breadcrumb(mut self, breadcrumb: Breadcrumb) -> Self {
        self.breadcrumb = Some(breadcrumb);
        self
    }
}

/// Finishes the span as cancelled if the operation is dropped before it
/// settled.
struct SpanGuard(Option<TransactionOrSpan>);

impl SpanGuard {
    fn finish(&mut self, status: SpanStatus) {
        if let Some(span) = self.0.take() {
            span.set_status(status);
            span.finish();
        }
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.finish(SpanStatus::Cancelled);
    }
}

/// Runs `operation` inside a new span.
///
/// The span is a child of the span active on `hub`, or a new transaction if
/// there is none.  `operation` receives a fork of `hub` with the new span
/// set, so that work it starts is parented correctly.
///
/// An `Err` is captured with a mechanism of type `origin` that is not
/// handled, and the span status becomes `internal_error`.  The result is
/// returned unchanged.
///
/// # Examples
///
/// ```
/// use sentry_edge_core::{instrument, Hub, InstrumentOptions};
///
/// # async fn load() -> Result<u32, std::io::Error> { Ok(1) }
/// # async fn run() -> Result<(), std::io::Error> {
/// let hub = Hub::new_from_top(&Hub::main());
/// let options = InstrumentOptions::new("cache.get", "user:42").origin("auto.cache");
/// let value = instrument(&hub, options, |_hub| load()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn instrument<F, Fut, T, E>(
    hub: &Hub,
    options: InstrumentOptions,
    operation: F,
) -> Result<T, E>
where
    F: FnOnce(Hub) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Error + 'static,
{
    let InstrumentOptions {
        op,
        description,
        origin,
        attributes,
        breadcrumb,
    } = options;

    let span: TransactionOrSpan = match hub.current_span() {
        Some(parent) => parent.start_child(&op, &description).into(),
        None => {
            let name = if description.is_empty() { &op } else { &description };
            let mut ctx = TransactionContext::new(name, &op);
            if !origin.is_empty() {
                ctx.set_origin(&origin);
            }
            hub.start_transaction(ctx).into()
        }
    };
    if !origin.is_empty() {
        span.set_origin(&origin);
    }
    for (key, value) in attributes {
        span.set_data(&key, value);
    }

    let fork = hub.fork();
    fork.configure_scope(|scope| scope.set_span(Some(span.clone())));
    let mut guard = SpanGuard(Some(span));

    let result = operation(fork.clone()).await;

    let status = match &result {
        Ok(_) => SpanStatus::Ok,
        Err(err) => {
            let ty = if origin.is_empty() {
                crate::GENERIC_MECHANISM.to_owned()
            } else {
                origin
            };
            fork.capture_error_with_mechanism(
                err,
                Mechanism {
                    ty,
                    handled: Some(false),
                    ..Default::default()
                },
            );
            SpanStatus::InternalError
        }
    };
    if let Some(breadcrumb) = breadcrumb {
        fork.add_breadcrumb(breadcrumb);
    }
    guard.finish(status);
    result
}

#[cfg(all(test, feature = "test"))]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::protocol::{EnvelopeItem, Event, Level, Transaction};
    use crate::test::with_captured_envelopes_options;
    use crate::ClientOptions;

    #[derive(Debug, thiserror::Error)]
    #[error("storage unavailable")]
    struct StorageError;

    fn transactions(envelopes: &[crate::Envelope]) -> Vec<Transaction<'static>> {
        envelopes
            .iter()
            .flat_map(|envelope| envelope.items())
            .filter_map(|item| match item {
                EnvelopeItem::Transaction(transaction) => Some(transaction.clone()),
                _ => None,
            })
            .collect()
    }

    fn events(envelopes: &[crate::Envelope]) -> Vec<Event<'static>> {
        envelopes
            .iter()
            .filter_map(|envelope| envelope.event().cloned())
            .collect()
    }

    fn options() -> ClientOptions {
        ClientOptions {
            traces_sample_rate: 1.0,
            ..Default::default()
        }
    }

    fn block_on<F: Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn test_error_is_captured_and_returned() {
        let envelopes = with_captured_envelopes_options(
            |hub| {
                let options = InstrumentOptions::new("kv.get", "user:42")
                    .origin("auto.kv")
                    .attribute("kv.key", "user:42");
                let result: Result<(), _> =
                    block_on(instrument(hub, options, |_| async { Err(StorageError) }));
                assert!(matches!(result, Err(StorageError)));
            },
            options(),
        );

        let events = events(&envelopes);
        assert_eq!(events.len(), 1);
        let exception = events[0].exception.last().unwrap();
        assert_eq!(exception.value.as_deref(), Some("storage unavailable"));
        let mechanism = exception.mechanism.as_ref().unwrap();
        assert_eq!(mechanism.ty, "auto.kv");
        assert_eq!(mechanism.handled, Some(false));

        let transactions = transactions(&envelopes);
        assert_eq!(transactions.len(), 1);
        let crate::protocol::Context::Trace(trace) = &transactions[0].contexts["trace"] else {
            panic!("missing trace context");
        };
        assert_eq!(trace.status, Some(SpanStatus::InternalError));
        assert_eq!(trace.origin.as_deref(), Some("auto.kv"));
        assert_eq!(trace.data["kv.key"], Value::from("user:42"));

        // the error is linked to the span it happened in
        let crate::protocol::Context::Trace(event_trace) = &events[0].contexts["trace"] else {
            panic!("missing trace context");
        };
        assert_eq!(event_trace.trace_id, trace.trace_id);
        assert_eq!(event_trace.span_id, trace.span_id);
    }

    #[test]
    fn test_child_span_of_active_transaction() {
        let envelopes = with_captured_envelopes_options(
            |hub| {
                let transaction =
                    hub.start_transaction(TransactionContext::new("GET /", "http.server"));
                hub.configure_scope(|scope| scope.set_span(Some(transaction.clone().into())));

                let parent_id = Arc::new(Mutex::new(None));
                let seen = parent_id.clone();
                let options = InstrumentOptions::new("db.query", "SELECT 1")
                    .breadcrumb(Breadcrumb {
                        category: Some("query".into()),
                        ..Default::default()
                    });
                let result: Result<u32, StorageError> =
                    block_on(instrument(hub, options, |hub| async move {
                        *seen.lock().unwrap() = hub.current_span().map(|span| span.span_id());
                        Ok(1)
                    }));
                assert_eq!(result.unwrap(), 1);
                hub.capture_message("after", Level::Info);
                transaction.finish();
                assert!(parent_id.lock().unwrap().is_some());
            },
            options(),
        );

        let transactions = transactions(&envelopes);
        assert_eq!(transactions.len(), 1);
        let span = &transactions[0].spans[0];
        assert_eq!(span.op.as_deref(), Some("db.query"));
        assert_eq!(span.description.as_deref(), Some("SELECT 1"));
        assert_eq!(span.status, Some(SpanStatus::Ok));

        let events = events(&envelopes);
        assert_eq!(events[0].breadcrumbs[0].category.as_deref(), Some("query"));
    }

    #[test]
    fn test_dropped_operation_is_cancelled() {
        let envelopes = with_captured_envelopes_options(
            |hub| {
                let future = instrument(hub, InstrumentOptions::new("task", ""), |_| async {
                    std::future::pending::<Result<(), StorageError>>().await
                });
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .unwrap();
                let _guard = runtime.enter();
                let timed_out = runtime
                    .block_on(tokio::time::timeout(Duration::from_millis(10), future))
                    .is_err();
                assert!(timed_out);
            },
            options(),
        );

        let transactions = transactions(&envelopes);
        let crate::protocol::Context::Trace(trace) = &transactions[0].contexts["trace"] else {
            panic!("missing trace context");
        };
        assert_eq!(trace.status, Some(SpanStatus::Cancelled));
    }
}
