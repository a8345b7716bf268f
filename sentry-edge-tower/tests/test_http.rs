use std::convert::Infallible;
use std::future::Future;
use std::sync::{Arc, Mutex};

use http::{HeaderMap, Request, Response, StatusCode};
use sentry_edge::protocol::{Context, EnvelopeItem, SpanStatus};
use sentry_edge::test::{with_captured_envelopes_options, with_captured_events};
use sentry_edge::{BoxTask, ClientOptions, Level, TaskTracker, TransactionContext, WaitUntil};
use sentry_edge_tower::{request_hub, BoxError, SentryClientLayer, SentryHttpLayer, SentryLayer};
use tower::{service_fn, Service, ServiceBuilder, ServiceExt};

const TRACE_ID: &str = "771a43a4192642f0b136d5159a501700";

#[derive(Debug, thiserror::Error)]
enum HandlerError {
    #[error("database unavailable: {0}")]
    Database(String),
}

#[derive(Debug, thiserror::Error)]
#[error("loading user failed")]
struct LoadError(#[source] HandlerError);

#[derive(Clone, Default)]
struct CollectingHost(Arc<Mutex<Vec<BoxTask>>>);

impl WaitUntil for CollectingHost {
    fn wait_until(&self, task: BoxTask) {
        self.0.lock().unwrap().push(task);
    }
}

impl CollectingHost {
    fn take(&self) -> Vec<BoxTask> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn tracing_options() -> ClientOptions {
    ClientOptions {
        traces_sample_rate: 1.0,
        trace_propagation_targets: Some(vec!["api.example.com".into()]),
        ..Default::default()
    }
}

#[test]
fn test_hub_is_bound_to_request() {
    let events = with_captured_events(|hub| {
        let service = ServiceBuilder::new()
            .layer(SentryLayer::<_, Request<()>>::new(hub.clone()))
            .service_fn(|req: Request<()>| async move {
                request_hub(&req).capture_message("Request failed", Level::Error);
                Ok::<_, Infallible>(Response::new(()))
            });

        block_on(service.oneshot(Request::new(()))).unwrap();
    });

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message.as_deref(), Some("Request failed"));
}

#[test]
fn test_server_transaction_continues_trace() {
    let envelopes = with_captured_envelopes_options(
        |hub| {
            let service = ServiceBuilder::new()
                .layer(SentryLayer::<_, Request<()>>::new(hub.clone()))
                .layer(SentryHttpLayer::with_transaction())
                .service_fn(|_req: Request<()>| async {
                    Err::<Response<()>, _>(HandlerError::Database("connection refused".into()))
                });

            let request = Request::builder()
                .uri("/users/42?page=2")
                .header("host", "example.com")
                .header("sentry-trace", format!("{TRACE_ID}-b2d4f3e1a2c3d4e5-1"))
                .body(())
                .unwrap();
            assert!(block_on(service.oneshot(request)).is_err());
        },
        tracing_options(),
    );

    let event = envelopes
        .iter()
        .find_map(|envelope| envelope.event())
        .unwrap();
    let exception = &event.exception[0];
    assert_eq!(
        exception.value.as_deref(),
        Some("database unavailable: connection refused")
    );
    let mechanism = exception.mechanism.as_ref().unwrap();
    assert_eq!(mechanism.ty, "auto.http.server");
    assert_eq!(mechanism.handled, Some(false));
    let request = event.request.as_ref().unwrap();
    assert_eq!(
        request.url.as_ref().unwrap().as_str(),
        "http://example.com/users/42?page=2"
    );
    assert_eq!(request.method.as_deref(), Some("GET"));

    let transaction = envelopes
        .iter()
        .flat_map(|envelope| envelope.items())
        .find_map(|item| match item {
            EnvelopeItem::Transaction(transaction) => Some(transaction.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(transaction.name.as_deref(), Some("GET /users/42"));
    let Some(Context::Trace(trace)) = transaction.contexts.get("trace") else {
        panic!("transaction has no trace context");
    };
    assert_eq!(trace.trace_id.to_string(), TRACE_ID);
    assert_eq!(trace.parent_span_id.unwrap().to_string(), "b2d4f3e1a2c3d4e5");
    assert_eq!(trace.op.as_deref(), Some("http.server"));
    assert_eq!(trace.origin.as_deref(), Some("auto.http.server"));
    assert_eq!(trace.status, Some(SpanStatus::InternalError));
}

#[test]
fn test_server_transaction_status_from_response() {
    let envelopes = with_captured_envelopes_options(
        |hub| {
            let service = ServiceBuilder::new()
                .layer(SentryLayer::<_, Request<()>>::new(hub.clone()))
                .layer(SentryHttpLayer::new().enable_transaction())
                .service_fn(|_req: Request<()>| async {
                    let mut response = Response::new(());
                    *response.status_mut() = StatusCode::NOT_FOUND;
                    Ok::<_, Infallible>(response)
                });

            let request = Request::builder()
                .uri("https://example.com/missing")
                .body(())
                .unwrap();
            block_on(service.oneshot(request)).unwrap();
        },
        tracing_options(),
    );

    let transaction = envelopes
        .iter()
        .flat_map(|envelope| envelope.items())
        .find_map(|item| match item {
            EnvelopeItem::Transaction(transaction) => Some(transaction.clone()),
            _ => None,
        })
        .unwrap();
    let Some(Context::Trace(trace)) = transaction.contexts.get("trace") else {
        panic!("transaction has no trace context");
    };
    assert_eq!(trace.status, Some(SpanStatus::NotFound));
    assert_eq!(trace.data["http.response.status_code"], 404);
    assert_eq!(trace.data["server.address"], "example.com");
}

#[test]
fn test_client_propagates_to_matching_targets() {
    let seen: Arc<Mutex<Vec<HeaderMap>>> = Default::default();
    let mut trace_id = String::new();

    let envelopes = with_captured_envelopes_options(
        |hub| {
            let transaction = hub.start_transaction(TransactionContext::new("checkout", "task"));
            trace_id = transaction.get_trace_context().trace_id.to_string();
            hub.configure_scope(|scope| scope.set_span(Some(transaction.clone().into())));

            let sink = seen.clone();
            let inner = service_fn(move |req: Request<()>| {
                sink.lock().unwrap().push(req.headers().clone());
                async {
                    let mut response = Response::new(());
                    *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
                    Ok::<_, Infallible>(response)
                }
            });
            let mut service = ServiceBuilder::new()
                .layer(SentryClientLayer::new())
                .service(inner);

            for uri in ["https://api.example.com/orders", "https://other.example.org/"] {
                let mut request = Request::builder().uri(uri).body(()).unwrap();
                request.extensions_mut().insert(hub.clone());
                let response = block_on(async {
                    let ready = ServiceExt::<Request<()>>::ready(&mut service).await;
                    ready.unwrap().call(request).await
                });
                assert_eq!(response.unwrap().status(), StatusCode::SERVICE_UNAVAILABLE);
            }

            hub.capture_message("after the calls", Level::Info);
            transaction.finish();
        },
        tracing_options(),
    );

    let seen = seen.lock().unwrap();
    let sentry_trace = seen[0]["sentry-trace"].to_str().unwrap();
    assert!(sentry_trace.starts_with(&trace_id));
    assert!(seen[0]["baggage"]
        .to_str()
        .unwrap()
        .contains(&format!("sentry-trace_id={trace_id}")));
    assert!(!seen[1].contains_key("sentry-trace"));
    assert!(!seen[1].contains_key("baggage"));

    let event = envelopes
        .iter()
        .find_map(|envelope| envelope.event())
        .unwrap();
    assert_eq!(event.breadcrumbs.len(), 2);
    let breadcrumb = &event.breadcrumbs[0];
    assert_eq!(breadcrumb.ty, "http");
    assert_eq!(breadcrumb.level, Level::Error);
    assert_eq!(breadcrumb.data["url"], "https://api.example.com/orders");
    assert_eq!(breadcrumb.data["status_code"], 503);

    let transaction = envelopes
        .iter()
        .flat_map(|envelope| envelope.items())
        .find_map(|item| match item {
            EnvelopeItem::Transaction(transaction) => Some(transaction.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(transaction.spans.len(), 2);
    let span = &transaction.spans[0];
    assert_eq!(span.op.as_deref(), Some("http.client"));
    assert_eq!(span.status, Some(SpanStatus::Unavailable));
    assert_eq!(span.data["url.full"], "https://api.example.com/orders");
}

#[test]
fn test_server_captures_error_chain() {
    let events = with_captured_events(|hub| {
        let service = ServiceBuilder::new()
            .layer(SentryLayer::<_, Request<()>>::new(hub.clone()))
            .layer(SentryHttpLayer::new())
            .service_fn(|_req: Request<()>| async {
                let err: BoxError = Box::new(LoadError(HandlerError::Database("timeout".into())));
                Err::<Response<()>, _>(err)
            });

        let err = block_on(service.oneshot(Request::new(()))).unwrap_err();
        assert_eq!(err.to_string(), "loading user failed");
    });

    assert_eq!(events.len(), 1);
    let exceptions = &events[0].exception;
    assert_eq!(exceptions.len(), 2);

    let source = &exceptions[0];
    assert_eq!(source.value.as_deref(), Some("database unavailable: timeout"));
    let mechanism = source.mechanism.as_ref().unwrap();
    assert_eq!(mechanism.ty, "chained");
    assert_eq!(mechanism.exception_id, Some(1));
    assert_eq!(mechanism.parent_id, Some(0));

    let root = &exceptions[1];
    assert_eq!(root.ty, "LoadError");
    let mechanism = root.mechanism.as_ref().unwrap();
    assert_eq!(mechanism.ty, "auto.http.server");
    assert_eq!(mechanism.handled, Some(false));
    assert_eq!(mechanism.exception_id, Some(0));
}

#[test]
fn test_one_flush_per_request() {
    let host = CollectingHost::default();
    let tracker = TaskTracker::new(host.clone());

    with_captured_events(|hub| {
        let service = ServiceBuilder::new()
            .layer(SentryLayer::<_, Request<()>>::new(hub.clone()))
            .layer(SentryHttpLayer::new().flush_with(tracker.clone()))
            .service_fn(|_req: Request<()>| async { Ok::<_, Infallible>(Response::new(())) });
        block_on(service.oneshot(Request::new(()))).unwrap();

        let tasks = host.take();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tracker.pending(), 0);
        for task in tasks {
            block_on(task);
        }
    });
}

#[test]
fn test_flush_waits_for_request_tasks() {
    let host = CollectingHost::default();
    let tracker = TaskTracker::new(host.clone());
    let (release, released) = tokio::sync::oneshot::channel::<()>();

    let events = with_captured_events(|hub| {
        let background = tracker.clone();
        let mut released = Some(released);
        let service = ServiceBuilder::new()
            .layer(SentryLayer::<_, Request<()>>::new(hub.clone()))
            .layer(SentryHttpLayer::new().flush_with(tracker.clone()))
            .service_fn(move |req: Request<()>| {
                let hub = request_hub(&req);
                let released = released.take();
                background.wait_until(async move {
                    if let Some(released) = released {
                        released.await.ok();
                    }
                    hub.capture_message("cache warmed", Level::Info);
                });
                async { Ok::<_, Infallible>(Response::new(())) }
            });
        block_on(service.oneshot(Request::new(()))).unwrap();

        // the work of the handler first, then the flush
        let mut tasks = host.take();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tracker.pending(), 1);
        let flush = tasks.pop().unwrap();
        let work = tasks.pop().unwrap();

        block_on(async {
            let flush = tokio::spawn(flush);
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
            assert!(!flush.is_finished());

            release.send(()).unwrap();
            work.await;
            flush.await.unwrap();
        });
        assert_eq!(tracker.pending(), 0);
    });

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message.as_deref(), Some("cache warmed"));
}
