use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use http::header::{HeaderName, HeaderValue};
use http::{Request, Response};
use sentry_edge_core::protocol::{Mechanism, SpanStatus};
use sentry_edge_core::types::{Baggage, BAGGAGE_HEADER};
use sentry_edge_core::{Breadcrumb, Hub, Level, Span};
use tower_layer::Layer;
use tower_service::Service;

use crate::server::{full_url, map_status};
use crate::BoxError;

/// The origin of spans started for outgoing requests.
pub const CLIENT_ORIGIN: &str = "auto.http.client.fetch";

/// Tower Layer that instruments outgoing HTTP requests.
///
/// Each request gets an `http.client` span, a child of the span active on
/// the hub of the request.  Requests to URLs matching
/// `trace_propagation_targets` receive the `sentry-trace` and `baggage`
/// headers, so the called service continues the trace.  Errors are
/// captured with their `source()` chain and passed on as [`BoxError`].
/// Every request leaves an `http` breadcrumb.
///
/// The hub is taken from the request extensions, see
/// [`request_hub`](crate::request_hub).
#[derive(Clone, Copy, Default)]
pub struct SentryClientLayer;

impl SentryClientLayer {
    /// Creates a new Layer.
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for SentryClientLayer {
    type Service = SentryClientService<S>;

    fn layer(&self, service: S) -> Self::Service {
        SentryClientService { service }
    }
}

/// Tower Service that instruments outgoing HTTP requests.
///
/// See [`SentryClientLayer`] for details.
#[derive(Clone)]
pub struct SentryClientService<S> {
    service: S,
}

/// What is known about an outgoing request once it was sent.
struct Outgoing {
    hub: Hub,
    span: Option<Span>,
    method: String,
    url: String,
}

impl Outgoing {
    fn settle<ResBody>(mut self, result: &Result<Response<ResBody>, BoxError>) {
        let mut breadcrumb = Breadcrumb {
            ty: "http".into(),
            category: Some("http".into()),
            level: Level::Info,
            ..Default::default()
        };
        breadcrumb.data.insert("method".into(), self.method.clone().into());
        breadcrumb.data.insert("url".into(), self.url.clone().into());

        match result {
            Ok(response) => {
                let status = response.status();
                breadcrumb
                    .data
                    .insert("status_code".into(), status.as_u16().into());
                if status.is_server_error() {
                    breadcrumb.level = Level::Error;
                } else if status.is_client_error() {
                    breadcrumb.level = Level::Warning;
                }
                if let Some(span) = &self.span {
                    span.set_data("http.response.status_code", status.as_u16().into());
                    span.set_status(map_status(status));
                }
            }
            Err(err) => {
                breadcrumb.level = Level::Error;
                self.hub.capture_error_with_mechanism(
                    &**err,
                    Mechanism {
                        ty: CLIENT_ORIGIN.into(),
                        handled: Some(false),
                        ..Default::default()
                    },
                );
                if let Some(span) = &self.span {
                    span.set_status(SpanStatus::InternalError);
                }
            }
        }

        self.hub.add_breadcrumb(breadcrumb);
        if let Some(span) = self.span.take() {
            span.finish();
        }
    }
}

impl Drop for Outgoing {
    fn drop(&mut self) {
        if let Some(span) = self.span.take() {
            if span.get_status().is_none() {
                span.set_status(SpanStatus::Cancelled);
            }
            span.finish();
        }
    }
}

/// The Future returned from [`SentryClientService`].
#[pin_project::pin_project]
pub struct SentryClientFuture<F> {
    outgoing: Option<Outgoing>,
    #[pin]
    future: F,
}

impl<F, ResBody, Error> Future for SentryClientFuture<F>
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
                if let Some(outgoing) = slf.outgoing.take() {
                    outgoing.settle(&res);
                }
                Poll::Ready(res)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for SentryClientService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Error: Into<BoxError>,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = SentryClientFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let hub = crate::request_hub(&request);
        let method = request.method().to_string();
        let url = full_url(request.uri(), request.headers())
            .map(|url| url.to_string())
            .unwrap_or_else(|| request.uri().to_string());

        let span = hub.current_span().map(|parent| {
            let span = parent.start_child("http.client", &format!("{method} {url}"));
            span.set_origin(CLIENT_ORIGIN);
            span.set_data("http.request.method", method.clone().into());
            span.set_data("url.full", url.clone().into());
            if let Some(host) = request.uri().host() {
                span.set_data("server.address", host.into());
            }
            span
        });

        let propagate = hub
            .client()
            .is_some_and(|client| client.options().should_propagate_to(&url));
        if propagate {
            let headers = match &span {
                Some(span) => span.iter_headers(),
                None => hub.iter_trace_propagation_headers(),
            };
            for (name, value) in headers {
                inject_header(request.headers_mut(), name, value);
            }
        }

        SentryClientFuture {
            outgoing: Some(Outgoing {
                hub,
                span,
                method,
                url,
            }),
            future: self.service.call(request),
        }
    }
}

/// Sets a trace header, merging `baggage` with the members already present.
fn inject_header(headers: &mut http::HeaderMap, name: &'static str, value: String) {
    let value = if name == BAGGAGE_HEADER {
        let existing = headers
            .get_all(BAGGAGE_HEADER)
            .iter()
            .filter_map(|value| value.to_str().ok());
        let mut baggage = Baggage::parse_all(existing);
        let ours = Baggage::parse_all([value.as_str()]);
        baggage.set_dynamic_sampling_context(ours.dynamic_sampling_context().clone());
        baggage.to_string()
    } else {
        value
    };
    if let Ok(value) = HeaderValue::try_from(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baggage_keeps_third_party_members() {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            BAGGAGE_HEADER,
            HeaderValue::from_static("vendor=1, sentry-environment=stale"),
        );

        inject_header(
            &mut headers,
            BAGGAGE_HEADER,
            "sentry-trace_id=771a43a4192642f0b136d5159a501700,sentry-environment=prod".into(),
        );

        let values: Vec<_> = headers.get_all(BAGGAGE_HEADER).iter().collect();
        assert_eq!(values.len(), 1);
        let baggage = Baggage::parse_all([values[0].to_str().unwrap()]);
        assert_eq!(baggage.third_party_members(), &["vendor=1".to_owned()]);
        let dsc = baggage.dynamic_sampling_context();
        assert_eq!(dsc.get("environment"), Some("prod"));
        assert_eq!(
            dsc.get("trace_id"),
            Some("771a43a4192642f0b136d5159a501700")
        );
    }

    #[test]
    fn test_sentry_trace_is_replaced() {
        let mut headers = http::HeaderMap::new();
        headers.insert("sentry-trace", HeaderValue::from_static("stale"));
        inject_header(&mut headers, "sentry-trace", "fresh".into());
        assert_eq!(headers["sentry-trace"], "fresh");
    }
}
