use std::borrow::Cow;
use std::fmt;
use std::panic::RefUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use std::time::{Duration, SystemTime};

use rand::random;

use crate::client_reports::ClientReportRecorder;
use crate::constants::SDK_INFO;
use crate::logs::{logs_batcher, LogsBatcher};
use crate::protocol::{
    ClientSdkInfo, DataCategory, DiscardReason, Event, Feedback, Log, LogAttribute,
    SessionUpdate, Transaction,
};
use crate::session::{session_flusher, SessionFlusher};
use crate::types::{DynamicSamplingContext, Dsn, Scheme, Uuid};
use crate::{ClientOptions, Envelope, Integration, Scope, SessionMode, Transport};

impl<T: Into<ClientOptions>> From<T> for Client {
    fn from(o: T) -> Client {
        Client::with_options(o.into())
    }
}

pub(crate) type TransportArc = Arc<RwLock<Option<Arc<dyn Transport>>>>;

/// The Sentry Client.
///
/// The Client is responsible for event processing and sending events to the
/// sentry server via the configured [`Transport`]. It can be created from a
/// [`ClientOptions`].
///
/// Events that are dropped while being processed are counted per reason
/// and sent as a client report on [`Client::flush`] and [`Client::close`].
///
/// # Examples
///
/// ```
/// sentry_edge::Client::from(sentry_edge::ClientOptions::default());
/// ```
pub struct Client {
    options: ClientOptions,
    transport: TransportArc,
    session_flusher: RwLock<Option<SessionFlusher>>,
    logs_batcher: RwLock<Option<LogsBatcher>>,
    client_reports: ClientReportRecorder,
    integrations: Vec<Arc<dyn Integration>>,
    pub(crate) sdk_info: ClientSdkInfo,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("dsn", &self.dsn())
            .field("options", &self.options)
            .finish()
    }
}

impl Client {
    /// Creates a new Sentry client from a config.
    ///
    /// # Supported Configs
    ///
    /// The following common values are supported for the client config:
    ///
    /// * `ClientOptions`: configure the client with the given client options.
    /// * `()` or empty string: Disable the client.
    /// * `&str` / `String` / `&OsStr` / `String`: configure the client with the given DSN.
    /// * `Dsn` / `&Dsn`: configure the client with a given DSN.
    /// * `(Dsn, ClientOptions)`: configure the client from the given DSN and optional options.
    ///
    /// # Panics
    ///
    /// The `Into<ClientOptions>` implementations can panic for the forms where a DSN needs to be
    /// parsed.  If you want to handle invalid DSNs you need to parse them manually by calling
    /// parse on it and handle the error.
    pub fn from_config<O: Into<ClientOptions>>(opts: O) -> Client {
        Client::with_options(opts.into())
    }

    /// Creates a new sentry client for the given options.
    ///
    /// If the DSN on the options is set to `None` the client will be entirely
    /// disabled.
    pub fn with_options(mut options: ClientOptions) -> Client {
        if options.debug {
            crate::set_debug_enabled(true);
        }
        sentry_debug!(
            "[Client] Creating new client with options: dsn={:?}",
            options.dsn.as_ref().map(|dsn| dsn.to_string())
        );

        let create_transport = || {
            let dsn = options.dsn.as_ref()?;
            if !matches!(dsn.scheme(), Scheme::Https | Scheme::Http) {
                sentry_debug!("[Client] DSN scheme is not supported");
                return None;
            }
            let factory = options.transport.as_ref()?;
            Some(factory.create_transport(&options))
        };

        let transport = Arc::new(RwLock::new(create_transport()));
        if read(&transport).is_none() {
            sentry_debug!("[Client] No transport available (client will be disabled)");
        }

        let mut sdk_info = SDK_INFO.clone();

        let integrations = options.integrations.clone();
        for integration in integrations.iter() {
            sentry_debug!("[Client] Setting up integration: {}", integration.name());
            integration.setup(&mut options);
            sdk_info.integrations.push(integration.name().to_string());
        }

        let session_flusher = RwLock::new(Some(session_flusher(
            transport.clone(),
            options.session_mode,
        )));

        let logs_batcher = RwLock::new(if options.enable_logs {
            Some(logs_batcher(transport.clone()))
        } else {
            None
        });

        Client {
            options,
            transport,
            session_flusher,
            logs_batcher,
            client_reports: ClientReportRecorder::new(),
            integrations,
            sdk_info,
        }
    }

    /// Prepares an event for transmission to sentry.
    ///
    /// Returns `None` if the event was dropped by the scope's event
    /// processors, an integration, the `ignore_errors` filter, `before_send`
    /// or sampling.  The drop is recorded for the next client report.
    /// `ignore_transactions` only applies to transactions.
    pub fn prepare_event(
        &self,
        mut event: Event<'static>,
        scope: Option<&Scope>,
    ) -> Option<Event<'static>> {
        // event_id and sdk_info are set before the processors run so that the
        // processors can poke around in that data.
        if event.event_id.is_nil() {
            event.event_id = Uuid::new_v4();
        }

        if event.sdk.is_none() {
            // NOTE: we need to clone here because `Event` must be `'static`
            event.sdk = Some(Cow::Owned(self.sdk_info.clone()));
        }

        if event.timestamp == SystemTime::UNIX_EPOCH {
            event.timestamp = SystemTime::now();
        }

        if let Some(scope) = scope {
            event = match scope.apply_to_event(event) {
                Some(event) => event,
                None => return self.discard_event(DiscardReason::EventProcessor),
            };
        }

        for integration in self.integrations.iter() {
            let id = event.event_id;
            event = match integration.process_event(event, &self.options) {
                Some(event) => event,
                None => {
                    sentry_debug!(
                        "[Client] Integration '{}' dropped event {}",
                        integration.name(),
                        id
                    );
                    return self.discard_event(DiscardReason::EventProcessor);
                }
            }
        }

        if event.release.is_none() {
            event.release.clone_from(&self.options.release);
        }
        if event.environment.is_none() {
            event.environment.clone_from(&self.options.environment);
        }
        if event.server_name.is_none() {
            event.server_name.clone_from(&self.options.server_name);
        }
        if event.dist.is_none() {
            event.dist.clone_from(&self.options.dist);
        }

        if self.options.is_ignored_error(&event) {
            sentry_debug!("[Client] Event {} matched an ignore filter", event.event_id);
            return self.discard_event(DiscardReason::EventProcessor);
        }

        if let Some(ref func) = self.options.before_send {
            let id = event.event_id;
            event = match func(event) {
                Some(event) => event,
                None => {
                    sentry_debug!("[Client] before_send callback dropped event {}", id);
                    return self.discard_event(DiscardReason::BeforeSend);
                }
            }
        }

        if let Some(scope) = scope {
            scope.update_session_from_event(&event);
        }

        if !self.sample_should_send(self.options.sample_rate) {
            sentry_debug!(
                "[Client] Event {} dropped due to sampling (rate: {})",
                event.event_id,
                self.options.sample_rate
            );
            return self.discard_event(DiscardReason::SampleRate);
        }
        Some(event)
    }

    fn discard_event(&self, reason: DiscardReason) -> Option<Event<'static>> {
        self.record_discard(reason, DataCategory::Error, 1);
        None
    }

    /// Records dropped items for the next client report.
    pub fn record_discard(&self, reason: DiscardReason, category: DataCategory, quantity: u32) {
        if self.options.send_client_reports {
            self.client_reports.record(reason, category, quantity);
        }
    }

    /// Returns the options of this client.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Returns the DSN that constructed this client.
    pub fn dsn(&self) -> Option<&Dsn> {
        self.options.dsn.as_ref()
    }

    /// Quick check to see if the client is enabled.
    ///
    /// The Client is enabled if it has a valid DSN and Transport configured.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// let client = sentry_edge::Client::from(sentry_edge::ClientOptions::default());
    /// assert!(!client.is_enabled());
    ///
    /// let dsn = "https://public@example.com/1";
    /// let transport = sentry_edge::test::TestTransport::new();
    /// let client = sentry_edge::Client::from((
    ///     dsn,
    ///     sentry_edge::ClientOptions {
    ///         transport: Some(Arc::new(transport)),
    ///         ..Default::default()
    ///     },
    /// ));
    /// assert!(client.is_enabled());
    /// ```
    pub fn is_enabled(&self) -> bool {
        self.options.dsn.is_some() && read(&self.transport).is_some()
    }

    /// Captures an event and sends it to sentry.
    ///
    /// Returns the id of the sent event, or the nil id if the event was
    /// dropped.
    pub fn capture_event(&self, event: Event<'static>, scope: Option<&Scope>) -> Uuid {
        let transport = read(&self.transport);
        let Some(transport) = transport.as_ref() else {
            sentry_debug!("[Client] No transport available, cannot capture event");
            return Uuid::nil();
        };
        let Some(event) = self.prepare_event(event, scope) else {
            return Uuid::nil();
        };

        let event_id = event.event_id;
        let trace_id = event.contexts.get("trace").and_then(|context| match context {
            crate::protocol::Context::Trace(trace) => Some(trace.trace_id),
            _ => None,
        });
        let mut envelope: Envelope = event.into();

        let dsc = scope
            .and_then(Scope::dynamic_sampling_context)
            .or_else(|| trace_id.map(|trace_id| self.default_sampling_context(trace_id)));
        if let Some(dsc) = dsc.filter(|dsc| !dsc.is_empty()) {
            envelope.set_trace(dsc);
        }

        // For request-mode sessions, we aggregate them all instead of
        // flushing them out early.
        if self.options.session_mode == SessionMode::Application {
            let session_item = scope.and_then(|scope| {
                scope
                    .session
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .as_mut()
                    .and_then(|session| session.create_envelope_item())
            });
            if let Some(session_item) = session_item {
                envelope.add_item(session_item);
            }
        }

        transport.send_envelope(envelope);
        event_id
    }

    /// The sampling context of a trace that no span was started for.
    fn default_sampling_context(
        &self,
        trace_id: crate::protocol::TraceId,
    ) -> DynamicSamplingContext {
        let mut dsc = DynamicSamplingContext::new();
        dsc.trace_id = Some(trace_id.to_string());
        if let Some(dsn) = self.dsn() {
            dsc.public_key = Some(dsn.public_key().to_owned());
            dsc.org_id = dsn.org_id().map(ToOwned::to_owned);
        }
        dsc.release = self.options.release.as_deref().map(ToOwned::to_owned);
        dsc.environment = self.options.environment.as_deref().map(ToOwned::to_owned);
        dsc
    }

    /// Sends a finished transaction to sentry.
    ///
    /// The scope of the hub the transaction was started on fills user, tags
    /// and contexts.  The transaction is then matched against
    /// `ignore_transactions` and passed through `before_send_transaction`.
    pub(crate) fn capture_transaction(
        &self,
        mut transaction: Transaction<'static>,
        scope: Option<&Scope>,
        dsc: Option<DynamicSamplingContext>,
    ) {
        let transport = read(&self.transport);
        let Some(transport) = transport.as_ref() else {
            return;
        };

        if transaction.release.is_none() {
            transaction.release.clone_from(&self.options.release);
        }
        if transaction.environment.is_none() {
            transaction.environment.clone_from(&self.options.environment);
        }
        if transaction.sdk.is_none() {
            transaction.sdk = Some(Cow::Owned(self.sdk_info.clone()));
        }
        if let Some(scope) = scope {
            scope.apply_to_transaction(&mut transaction);
        }

        let spans = transaction.spans.len() as u32 + 1;
        if self
            .options
            .is_ignored_transaction(transaction.name.as_deref())
        {
            sentry_debug!("[Client] Transaction {:?} is ignored", transaction.name);
            self.record_transaction_discard(DiscardReason::EventProcessor, spans);
            return;
        }

        if let Some(ref func) = self.options.before_send_transaction {
            transaction = match func(transaction) {
                Some(transaction) => transaction,
                None => {
                    sentry_debug!("[Client] before_send_transaction dropped a transaction");
                    self.record_transaction_discard(DiscardReason::BeforeSend, spans);
                    return;
                }
            }
        }

        let mut envelope: Envelope = transaction.into();
        if let Some(dsc) = dsc.filter(|dsc| !dsc.is_empty()) {
            envelope.set_trace(dsc);
        }
        transport.send_envelope(envelope);
    }

    fn record_transaction_discard(&self, reason: DiscardReason, spans: u32) {
        self.record_discard(reason, DataCategory::Transaction, 1);
        self.record_discard(reason, DataCategory::Span, spans);
    }

    /// Sends user feedback to sentry.
    ///
    /// Release, environment and SDK info default to the client options.
    pub fn capture_feedback(&self, mut feedback: Feedback, scope: Option<&Scope>) {
        let transport = read(&self.transport);
        let Some(transport) = transport.as_ref() else {
            return;
        };
        if feedback.release.is_none() {
            feedback.release = self.options.release.as_deref().map(ToOwned::to_owned);
        }
        if feedback.environment.is_none() {
            feedback.environment = self.options.environment.as_deref().map(ToOwned::to_owned);
        }
        if feedback.sdk.is_none() {
            feedback.sdk = Some(self.sdk_info.clone());
        }
        let mut dsc = None;
        if let Some(scope) = scope {
            if feedback.user.is_none() {
                feedback.user = scope.user().cloned();
            }
            for (key, value) in scope.tags.iter() {
                feedback
                    .tags
                    .entry(key.to_owned())
                    .or_insert_with(|| value.clone());
            }
            let context = match scope.get_span() {
                Some(span) => span.get_trace_context(),
                None => crate::protocol::TraceContext {
                    trace_id: scope.propagation_context.trace_id,
                    span_id: scope.propagation_context.span_id,
                    ..Default::default()
                },
            };
            feedback
                .contexts
                .entry("trace".to_owned())
                .or_insert_with(|| context.into());
            dsc = scope.dynamic_sampling_context();
        }

        let mut envelope: Envelope = feedback.into();
        if let Some(dsc) = dsc.filter(|dsc| !dsc.is_empty()) {
            envelope.set_trace(dsc);
        }
        transport.send_envelope(envelope);
    }

    /// Sends the specified [`Envelope`] to sentry.
    pub fn send_envelope(&self, envelope: Envelope) {
        if let Some(ref transport) = *read(&self.transport) {
            transport.send_envelope(envelope);
        }
    }

    pub(crate) fn enqueue_session(&self, session_update: SessionUpdate<'static>) {
        if let Some(ref flusher) = *read(&self.session_flusher) {
            flusher.enqueue(session_update);
        }
    }

    fn send_client_report(&self, transport: &dyn Transport) {
        if !self.options.send_client_reports {
            return;
        }
        if let Some(envelope) = self.client_reports.take_envelope() {
            sentry_debug!("[Client] Sending client report");
            transport.send_envelope(envelope);
        }
    }

    /// Drains all pending events without shutting down.
    ///
    /// Pending sessions, logs and the client report are handed to the
    /// transport first.  Returns `true` if the transport queue was drained
    /// within `timeout`, which defaults to `shutdown_timeout`.
    pub fn flush(&self, timeout: Option<Duration>) -> bool {
        if let Some(ref flusher) = *read(&self.session_flusher) {
            flusher.flush();
        }
        if let Some(ref batcher) = *read(&self.logs_batcher) {
            batcher.flush();
        }
        if let Some(ref transport) = *read(&self.transport) {
            self.send_client_report(transport.as_ref());
            transport.flush(timeout.unwrap_or(self.options.shutdown_timeout))
        } else {
            true
        }
    }

    /// Drains all pending events and shuts down the transport behind the
    /// client.  After shutting down the transport is removed.
    ///
    /// This returns `true` if the queue was successfully drained in the
    /// given time or `false` if not (for instance because of a timeout).
    /// If no timeout is provided the client will wait for as long a
    /// `shutdown_timeout` in the client options.
    pub fn close(&self, timeout: Option<Duration>) -> bool {
        drop(
            self.session_flusher
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        drop(
            self.logs_batcher
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let transport_opt = self
            .transport
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(transport) = transport_opt {
            self.send_client_report(transport.as_ref());
            sentry_debug!("[Client] Requesting transport shutdown");
            transport.shutdown(timeout.unwrap_or(self.options.shutdown_timeout))
        } else {
            true
        }
    }

    /// Returns a random boolean with a probability defined
    /// by rate
    pub fn sample_should_send(&self, rate: f32) -> bool {
        if rate >= 1.0 {
            true
        } else if rate <= 0.0 {
            false
        } else {
            random::<f32>() < rate
        }
    }

    /// Captures a log and sends it to Sentry.
    pub fn capture_log(&self, log: Log, scope: &Scope) {
        if !self.options().enable_logs {
            return;
        }
        if let Some(log) = self.prepare_log(log, scope) {
            if let Some(ref batcher) = *read(&self.logs_batcher) {
                batcher.enqueue(log);
            }
        }
    }

    /// Prepares a log to be sent, setting the `trace_id` and other default attributes, and
    /// processing it through `before_send_log`.
    fn prepare_log(&self, mut log: Log, scope: &Scope) -> Option<Log> {
        scope.apply_to_log(&mut log, self.options.send_default_pii);

        self.set_log_default_attributes(&mut log);

        if let Some(ref func) = self.options.before_send_log {
            log = match func(log) {
                Some(log) => log,
                None => {
                    self.record_discard(DiscardReason::BeforeSend, DataCategory::LogItem, 1);
                    return None;
                }
            };
        }

        Some(log)
    }

    fn set_log_default_attributes(&self, log: &mut Log) {
        let defaults = [
            ("sentry.environment", self.options.environment.as_deref()),
            ("sentry.release", self.options.release.as_deref()),
            ("sentry.sdk.name", Some(self.sdk_info.name.as_str())),
            ("sentry.sdk.version", Some(self.sdk_info.version.as_str())),
            ("server.address", self.options.server_name.as_deref()),
        ];
        for (key, value) in defaults {
            if let Some(value) = value {
                log.attributes
                    .entry(key.to_owned())
                    .or_insert_with(|| LogAttribute::from(value));
            }
        }
    }
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

// Make this unwind safe. It's not out of the box because of the
// `BeforeCallback`s inside `ClientOptions`, and the contained Integrations
impl RefUnwindSafe for Client {}

#[cfg(all(test, feature = "test"))]
mod tests {
    use std::sync::Arc;

    use crate::protocol::{ClientReport, DiscardedEvent, EnvelopeItem, Level};
    use crate::test::{with_captured_envelopes_options, with_captured_events_options};
    use crate::{ClientOptions, Hub, TransactionContext};

    use super::*;

    fn client_reports(envelopes: &[Envelope]) -> Vec<DiscardedEvent> {
        envelopes
            .iter()
            .flat_map(|envelope| envelope.items())
            .filter_map(|item| match item {
                EnvelopeItem::ClientReport(ClientReport {
                    discarded_events, ..
                }) => Some(discarded_events.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn test_prepare_event_defaults() {
        let events = with_captured_events_options(
            |hub| {
                hub.capture_message("hello", Level::Info);
            },
            ClientOptions {
                release: Some("app@1.0.0".into()),
                environment: Some("staging".into()),
                server_name: Some("edge-1".into()),
                dist: Some("42".into()),
                ..Default::default()
            },
        );
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert!(!event.event_id.is_nil());
        assert_eq!(event.release.as_deref(), Some("app@1.0.0"));
        assert_eq!(event.environment.as_deref(), Some("staging"));
        assert_eq!(event.server_name.as_deref(), Some("edge-1"));
        assert_eq!(event.dist.as_deref(), Some("42"));
        assert_eq!(
            event.sdk.as_ref().map(|sdk| sdk.name.as_str()),
            Some(crate::constants::SDK_NAME)
        );
    }

    #[test]
    fn test_before_send_can_rewrite() {
        let events = with_captured_events_options(
            |hub| {
                hub.capture_message("secret", Level::Info);
            },
            ClientOptions {
                before_send: Some(Arc::new(|mut event| {
                    event.message = Some("[redacted]".into());
                    Some(event)
                })),
                ..Default::default()
            },
        );
        assert_eq!(events[0].message.as_deref(), Some("[redacted]"));
    }

    #[test]
    fn test_drops_are_recorded() {
        let envelopes = with_captured_envelopes_options(
            |hub| {
                hub.capture_message("dropped by filter", Level::Info);
                hub.capture_message("dropped by callback", Level::Info);
                hub.configure_scope(|scope| scope.add_event_processor(|_| None));
                hub.capture_message("dropped by processor", Level::Info);
            },
            ClientOptions {
                ignore_errors: vec!["by filter".into()],
                before_send: Some(Arc::new(|event| {
                    if event.message.as_deref() == Some("dropped by callback") {
                        None
                    } else {
                        Some(event)
                    }
                })),
                ..Default::default()
            },
        );

        let reports = client_reports(&envelopes);
        assert_eq!(
            reports,
            vec![
                DiscardedEvent {
                    reason: DiscardReason::BeforeSend,
                    category: DataCategory::Error,
                    quantity: 1,
                },
                DiscardedEvent {
                    reason: DiscardReason::EventProcessor,
                    category: DataCategory::Error,
                    quantity: 2,
                },
            ]
        );
        assert!(envelopes.iter().all(|envelope| envelope.event().is_none()));
    }

    #[test]
    fn test_sample_rate_zero() {
        let envelopes = with_captured_envelopes_options(
            |hub| {
                hub.capture_message("sampled out", Level::Info);
            },
            ClientOptions {
                sample_rate: 0.0,
                ..Default::default()
            },
        );
        assert_eq!(
            client_reports(&envelopes),
            vec![DiscardedEvent {
                reason: DiscardReason::SampleRate,
                category: DataCategory::Error,
                quantity: 1,
            }]
        );
    }

    #[test]
    fn test_event_carries_trace_header() {
        let envelopes = with_captured_envelopes_options(
            |hub| {
                hub.capture_message("with trace", Level::Info);
            },
            ClientOptions {
                release: Some("app@1.0.0".into()),
                ..Default::default()
            },
        );
        let envelope = &envelopes[0];
        let event = envelope.event().unwrap();
        let trace = envelope.headers().trace.as_ref().unwrap();
        let crate::protocol::Context::Trace(context) = &event.contexts["trace"] else {
            panic!("missing trace context");
        };
        assert_eq!(trace.trace_id, Some(context.trace_id.to_string()));
        assert_eq!(trace.public_key.as_deref(), Some("public"));
        assert_eq!(trace.release.as_deref(), Some("app@1.0.0"));
    }

    #[test]
    fn test_ignored_transaction() {
        let envelopes = with_captured_envelopes_options(
            |hub| {
                let transaction =
                    hub.start_transaction(TransactionContext::new("GET /healthz", "http.server"));
                let span = transaction.start_child("db", "");
                span.finish();
                transaction.finish();
            },
            ClientOptions {
                traces_sample_rate: 1.0,
                ignore_transactions: vec!["/healthz".into()],
                ..Default::default()
            },
        );
        assert_eq!(
            client_reports(&envelopes),
            vec![
                DiscardedEvent {
                    reason: DiscardReason::EventProcessor,
                    category: DataCategory::Transaction,
                    quantity: 1,
                },
                DiscardedEvent {
                    reason: DiscardReason::EventProcessor,
                    category: DataCategory::Span,
                    quantity: 2,
                },
            ]
        );
    }

    #[test]
    fn test_ignore_transactions_keeps_errors() {
        let events = with_captured_events_options(
            |hub| {
                hub.configure_scope(|scope| scope.set_transaction(Some("GET /health")));
                hub.capture_message("db down", Level::Error);
            },
            ClientOptions {
                ignore_transactions: vec!["/health".into()],
                ..Default::default()
            },
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message.as_deref(), Some("db down"));
        assert_eq!(events[0].transaction.as_deref(), Some("GET /health"));
    }

    #[test]
    fn test_disabled_client() {
        let hub = Hub::new(
            Some(Arc::new(Client::from(ClientOptions::default()))),
            Default::default(),
        );
        assert!(!hub.client().unwrap().is_enabled());
        assert!(hub.capture_message("nowhere", Level::Info).is_nil());
    }
}
