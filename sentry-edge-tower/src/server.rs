use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use http::{HeaderMap, Request, Response, StatusCode, Uri};
use sentry_edge_core::protocol::{self, Mechanism, SpanStatus, TransactionSource};
use sentry_edge_core::{Hub, SessionMode, TaskTracker, TransactionContext, TransactionOrSpan};
use tower_layer::Layer;
use tower_service::Service;

use crate::BoxError;

/// The origin of transactions started for incoming requests.
pub const SERVER_ORIGIN: &str = "auto.http.server";

/// Headers that are only attached to events with `send_default_pii`.
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "proxy-authorization",
    "set-cookie",
    "x-api-key",
    "x-forwarded-for",
    "x-real-ip",
];

/// Tower Layer that instruments incoming HTTP requests.
///
/// The Service created by this Layer attaches the request to captured
/// events and captures errors returned by the inner service, together with
/// their `source()` chain.  Errors are passed on as [`BoxError`].  It can also
/// start a new performance monitoring transaction for each incoming request,
/// continuing the trace based on incoming distributed tracing headers.
///
/// Events are captured on the hub bound by [`SentryLayer`](crate::SentryLayer),
/// or on a new hub made from the main hub if the request has none.
#[derive(Clone, Default)]
pub struct SentryHttpLayer {
    start_transaction: bool,
    tracker: Option<TaskTracker>,
}

impl SentryHttpLayer {
    /// Creates a new Layer that does not start transactions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new Layer which starts a new performance monitoring transaction
    /// for each incoming request.
    pub fn with_transaction() -> Self {
        Self {
            start_transaction: true,
            tracker: None,
        }
    }

    /// Starts a new performance monitoring transaction for each incoming request.
    pub fn enable_transaction(mut self) -> Self {
        self.start_transaction = true;
        self
    }

    /// Keeps the host alive until the events of each request were flushed.
    ///
    /// Once the response is ready, a flush of the client is registered with
    /// `tracker`.  It waits for the other tasks of the tracker first.
    pub fn flush_with(mut self, tracker: TaskTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }
}

/// Tower Service that instruments incoming HTTP requests.
///
/// See [`SentryHttpLayer`] for details.
#[derive(Clone)]
pub struct SentryHttpService<S> {
    service: S,
    start_transaction: bool,
    tracker: Option<TaskTracker>,
}

impl<S> Layer<S> for SentryHttpLayer {
    type Service = SentryHttpService<S>;

    fn layer(&self, service: S) -> Self::Service {
        Self::Service {
            service,
            start_transaction: self.start_transaction,
            tracker: self.tracker.clone(),
        }
    }
}

/// Everything that has to be settled once the request completed.
///
/// Dropping it without [`InFlight::settle`] finishes the transaction as
/// cancelled.
struct InFlight {
    hub: Hub,
    transaction: Option<TransactionOrSpan>,
    session: bool,
    tracker: Option<TaskTracker>,
}

impl InFlight {
    fn settle<ResBody>(self, result: &Result<Response<ResBody>, BoxError>) {
        match result {
            Ok(response) => {
                if let Some(transaction) = &self.transaction {
                    let status = response.status();
                    transaction.set_data("http.response.status_code", status.as_u16().into());
                    if transaction.get_status().is_none() {
                        transaction.set_status(map_status(status));
                    }
                }
            }
            Err(err) => {
                self.hub.capture_error_with_mechanism(
                    &**err,
                    Mechanism {
                        ty: SERVER_ORIGIN.into(),
                        handled: Some(false),
                        ..Default::default()
                    },
                );
                if let Some(transaction) = &self.transaction {
                    if transaction.get_status().is_none() {
                        transaction.set_status(SpanStatus::InternalError);
                    }
                }
            }
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(transaction) = self.transaction.take() {
            if transaction.get_status().is_none() {
                transaction.set_status(SpanStatus::Cancelled);
            }
            transaction.finish();
        }
        if self.session {
            self.hub.end_session();
        }
        if let (Some(tracker), Some(client)) = (&self.tracker, self.hub.client()) {
            tracker.flush_when_done(client, None);
        }
    }
}

/// The Future returned from [`SentryHttpService`].
#[pin_project::pin_project]
pub struct SentryHttpFuture<F> {
    in_flight: Option<InFlight>,
    #[pin]
    future: F,
}

impl<F, ResBody, Error> Future for SentryHttpFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, Error>>,
    Error: Into<BoxError>,
{
    type Output = Result<Response<ResBody>, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let slf = self.project();
        match slf.future.poll(cx) {
            Poll::Ready(res) => {
                let res = res.map_err(Into::into);
                if let Some(in_flight) = slf.in_flight.take() {
                    in_flight.settle(&res);
                }
                Poll::Ready(res)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for SentryHttpService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Error: Into<BoxError>,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = SentryHttpFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let hub = match request.extensions().get::<Hub>() {
            Some(hub) => hub.clone(),
            None => {
                let hub = Hub::new_from_top(&Hub::main());
                request.extensions_mut().insert(hub.clone());
                hub
            }
        };
        let client = hub.client();
        let send_default_pii = client
            .as_ref()
            .is_some_and(|client| client.options().send_default_pii);

        let mut sentry_req = request_data(request.uri(), request.headers(), send_default_pii);
        sentry_req.method = Some(request.method().to_string());
        let event_req = sentry_req.clone();
        hub.configure_isolation_scope(|scope| {
            scope.add_event_processor(move |mut event| {
                if event.request.is_none() {
                    event.request = Some(event_req.clone());
                }
                Some(event)
            });
        });

        let session = client.as_ref().is_some_and(|client| {
            client.options().auto_session_tracking
                && client.options().session_mode == SessionMode::Request
        });
        if session {
            hub.start_session();
        }

        let transaction = self.start_transaction.then(|| {
            let headers = request.headers().into_iter().flat_map(|(header, value)| {
                value.to_str().ok().map(|value| (header.as_str(), value))
            });
            let tx_name = format!("{} {}", request.method(), request.uri().path());
            let mut tx_ctx =
                TransactionContext::continue_from_headers(&tx_name, "http.server", headers);
            tx_ctx.set_origin(SERVER_ORIGIN);
            tx_ctx.set_source(TransactionSource::Url);

            let transaction: TransactionOrSpan = hub.start_transaction(tx_ctx).into();
            transaction.set_data("http.request.method", request.method().as_str().into());
            if let Some(url) = &sentry_req.url {
                transaction.set_data("url.full", url.as_str().into());
            }
            transaction.set_request(sentry_req);
            for (key, value) in url_attributes(request.uri(), request.headers()) {
                transaction.set_data(key, value.into());
            }
            hub.configure_scope(|scope| scope.set_span(Some(transaction.clone())));
            transaction
        });

        SentryHttpFuture {
            in_flight: Some(InFlight {
                hub,
                transaction,
                session,
                tracker: self.tracker.clone(),
            }),
            future: self.service.call(request),
        }
    }
}

/// The host a request was sent to, from the URI or the `Host` header.
fn request_host<'a>(uri: &'a Uri, headers: &'a HeaderMap) -> Option<&'a str> {
    uri.host().or_else(|| {
        headers
            .get(http::header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(|host| host.split(':').next().unwrap_or(host))
    })
}

/// Reconstructs the full URL of an incoming request.
///
/// Servers usually only see the path, so the host is taken from the `Host`
/// header, and the scheme defaults to `http`.
pub(crate) fn full_url(uri: &Uri, headers: &HeaderMap) -> Option<url::Url> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return uri.to_string().parse().ok();
    }
    let authority = uri.authority().map(|a| a.as_str()).or_else(|| {
        headers
            .get(http::header::HOST)
            .and_then(|value| value.to_str().ok())
    })?;
    let scheme = uri.scheme_str().unwrap_or("http");
    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
    format!("{scheme}://{authority}{path}").parse().ok()
}

fn url_attributes(uri: &Uri, headers: &HeaderMap) -> Vec<(&'static str, String)> {
    let mut attributes = vec![
        ("url.path", uri.path().to_owned()),
        (
            "url.scheme",
            uri.scheme_str().unwrap_or("http").to_owned(),
        ),
    ];
    if let Some(host) = request_host(uri, headers) {
        attributes.push(("server.address", host.to_owned()));
    }
    attributes
}

fn request_data(uri: &Uri, headers: &HeaderMap, send_default_pii: bool) -> protocol::Request {
    protocol::Request {
        url: full_url(uri, headers),
        query_string: uri.query().map(str::to_owned),
        cookies: if send_default_pii {
            headers
                .get(http::header::COOKIE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        } else {
            None
        },
        headers: headers
            .iter()
            .filter(|(header, _)| {
                send_default_pii || !SENSITIVE_HEADERS.contains(&header.as_str())
            })
            .map(|(header, value)| {
                (
                    header.to_string(),
                    value.to_str().unwrap_or_default().into(),
                )
            })
            .collect(),
        ..Default::default()
    }
}

/// Maps an HTTP status code to the status of a span.
pub fn map_status(status: StatusCode) -> SpanStatus {
    match status {
        StatusCode::UNAUTHORIZED => SpanStatus::Unauthenticated,
        StatusCode::FORBIDDEN => SpanStatus::PermissionDenied,
        StatusCode::NOT_FOUND => SpanStatus::NotFound,
        StatusCode::TOO_MANY_REQUESTS => SpanStatus::ResourceExhausted,
        StatusCode::CONFLICT => SpanStatus::AlreadyExists,
        status if status.is_client_error() => SpanStatus::InvalidArgument,
        StatusCode::NOT_IMPLEMENTED => SpanStatus::Unimplemented,
        StatusCode::SERVICE_UNAVAILABLE => SpanStatus::Unavailable,
        StatusCode::GATEWAY_TIMEOUT => SpanStatus::DeadlineExceeded,
        status if status.is_server_error() => SpanStatus::InternalError,
        status if status.is_success() || status.is_redirection() => SpanStatus::Ok,
        _ => SpanStatus::UnknownError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_status() {
        assert_eq!(map_status(StatusCode::OK), SpanStatus::Ok);
        assert_eq!(map_status(StatusCode::FOUND), SpanStatus::Ok);
        assert_eq!(map_status(StatusCode::NOT_FOUND), SpanStatus::NotFound);
        assert_eq!(map_status(StatusCode::CONFLICT), SpanStatus::AlreadyExists);
        assert_eq!(
            map_status(StatusCode::UNPROCESSABLE_ENTITY),
            SpanStatus::InvalidArgument
        );
        assert_eq!(
            map_status(StatusCode::GATEWAY_TIMEOUT),
            SpanStatus::DeadlineExceeded
        );
        assert_eq!(
            map_status(StatusCode::BAD_GATEWAY),
            SpanStatus::InternalError
        );
    }

    #[test]
    fn test_full_url_from_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::HOST, "example.com:8080".parse().unwrap());
        let uri: Uri = "/users/42?page=2".parse().unwrap();

        let url = full_url(&uri, &headers).unwrap();
        assert_eq!(url.as_str(), "http://example.com:8080/users/42?page=2");

        let attributes = url_attributes(&uri, &headers);
        assert!(attributes.contains(&("server.address", "example.com".to_owned())));
        assert!(attributes.contains(&("url.path", "/users/42".to_owned())));

        assert!(full_url(&uri, &HeaderMap::new()).is_none());
    }

    #[test]
    fn test_sensitive_headers_need_pii() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::COOKIE, "session=secret".parse().unwrap());
        headers.insert(http::header::ACCEPT, "text/html".parse().unwrap());
        let uri: Uri = "https://example.com/".parse().unwrap();

        let request = request_data(&uri, &headers, false);
        assert!(request.cookies.is_none());
        assert!(!request.headers.contains_key("cookie"));
        assert_eq!(request.headers["accept"], "text/html");

        let request = request_data(&uri, &headers, true);
        assert_eq!(request.cookies.as_deref(), Some("session=secret"));
    }
}
