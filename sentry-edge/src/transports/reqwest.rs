use std::sync::Arc;
use std::time::Duration;

use ::reqwest::{header as ReqwestHeaders, Client as ReqwestClient, Proxy};

use super::thread::TransportThread;

use crate::protocol::DiscardReason;
use crate::types::auth_header;
use crate::{sentry_debug, ClientOptions, ClientReportRecorder, Envelope, Transport};

/// A [`Transport`] that sends events via the [`reqwest`] library.
///
/// When the `transport` feature is enabled this will currently
/// be the default transport.  This is separately enabled by the
/// `reqwest` feature flag.
///
/// [`reqwest`]: https://crates.io/crates/reqwest
#[cfg_attr(doc_cfg, doc(cfg(feature = "reqwest")))]
pub struct ReqwestHttpTransport {
    thread: TransportThread,
}

#[cfg_attr(doc_cfg, doc(cfg(feature = "reqwest")))]
impl ReqwestHttpTransport {
    /// Creates a new Transport.
    pub fn new(options: &ClientOptions) -> Self {
        Self::new_internal(options, None)
    }

    /// Creates a new Transport that uses the specified [`ReqwestClient`].
    pub fn with_client(options: &ClientOptions, client: ReqwestClient) -> Self {
        Self::new_internal(options, Some(client))
    }

    fn new_internal(options: &ClientOptions, client: Option<ReqwestClient>) -> Self {
        let client = client.unwrap_or_else(|| build_client(options));
        let target = options.dsn.as_ref().map(|dsn| {
            (
                dsn.envelope_api_url().to_string(),
                auth_header(dsn, &options.user_agent),
            )
        });
        let reports = options
            .send_client_reports
            .then(|| Arc::new(ClientReportRecorder::new()));
        let network_reports = reports.clone();

        let thread = TransportThread::new(
            move |envelope: Envelope, mut rl| {
                let request = target.as_ref().map(|(url, auth)| {
                    client
                        .post(url)
                        .header("X-Sentry-Auth", auth)
                        .body(envelope.to_bytes())
                });
                let reports = network_reports.clone();

                // NOTE: because of lifetime issues, building the request using the
                // `client` has to happen outside of this async block.
                async move {
                    let Some(request) = request else {
                        sentry_debug!("No DSN configured, dropping envelope");
                        return rl;
                    };
                    match request.send().await {
                        Ok(response) => {
                            let headers = response.headers();
                            rl.update_from_response(
                                response.status().as_u16(),
                                headers
                                    .get("x-sentry-rate-limits")
                                    .and_then(|x| x.to_str().ok()),
                                headers
                                    .get(ReqwestHeaders::RETRY_AFTER)
                                    .and_then(|x| x.to_str().ok()),
                            );
                            match response.text().await {
                                Err(err) => {
                                    sentry_debug!("Failed to read sentry response: {}", err);
                                }
                                Ok(text) => {
                                    sentry_debug!("Get response: `{}`", text);
                                }
                            }
                        }
                        Err(err) => {
                            sentry_debug!("Failed to send envelope: {}", err);
                            if let Some(reports) = reports {
                                reports.record_envelope(DiscardReason::NetworkError, &envelope);
                            }
                        }
                    }
                    rl
                }
            },
            reports,
        );
        Self { thread }
    }
}

fn build_client(options: &ClientOptions) -> ReqwestClient {
    let mut builder = ReqwestClient::builder();
    if let Some(url) = options.http_proxy.as_ref() {
        match Proxy::http(url.as_ref()) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(err) => {
                sentry_debug!("Ignoring invalid http proxy `{}`: {}", url, err);
            }
        }
    };
    if let Some(url) = options.https_proxy.as_ref() {
        match Proxy::https(url.as_ref()) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(err) => {
                sentry_debug!("Ignoring invalid https proxy `{}`: {}", url, err);
            }
        }
    };
    builder.build().unwrap_or_else(|err| {
        sentry_debug!("Failed to build the http client, using defaults: {}", err);
        ReqwestClient::new()
    })
}

#[cfg_attr(doc_cfg, doc(cfg(feature = "reqwest")))]
impl Transport for ReqwestHttpTransport {
    fn send_envelope(&self, envelope: Envelope) {
        self.thread.send(envelope)
    }
    fn flush(&self, timeout: Duration) -> bool {
        self.thread.flush(timeout)
    }

    fn shutdown(&self, timeout: Duration) -> bool {
        self.flush(timeout)
    }
}
