use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::USER_AGENT;
use crate::performance::TransactionContext;
use crate::protocol::{Breadcrumb, Event, Log, Transaction};
use crate::types::Dsn;
use crate::{Integration, IntoDsn, TransportFactory};

/// Type alias for before event/breadcrumb handlers.
pub type BeforeCallback<T> = Arc<dyn Fn(T) -> Option<T> + Send + Sync>;

/// Type alias for the `traces_sampler` callback.
///
/// The callback returns the sample rate in `[0, 1]` to use for the given
/// transaction.
pub type TracesSampler = Arc<dyn Fn(&TransactionContext) -> f32 + Send + Sync>;

/// The Session Mode of the SDK.
///
/// Depending on the use-case, the SDK can be set to two different session modes:
///
/// * **Application Mode Sessions**:
///   This mode should be used for user-attended programs, which typically have
///   a single long running session that span the applications' lifetime.
///
/// * **Request Mode Sessions**:
///   This mode is intended for servers that use one session per incoming
///   request, and thus have a lot of very short lived sessions.
///
/// Setting the SDK to *request-mode* sessions means that session durations will
/// not be tracked, and sessions will be pre-aggregated before being sent upstream.
/// This applies both to automatic and manually triggered sessions.
///
/// **NOTE**: Support for *request-mode* sessions was added in Sentry `21.2`.
///
/// See the [Documentation on Session Modes](https://develop.sentry.dev/sdk/sessions/#sdk-considerations)
/// for more information.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionMode {
    /// Long running application session.
    Application,
    /// Lots of short per-request sessions.
    Request,
}

/// Configuration settings for the client.
///
/// These options are explained in more detail in the general
/// [sentry documentation](https://docs.sentry.io/platforms/rust/configuration/options/).
///
/// Options that are left unset are filled from the environment by
/// `sentry_edge::apply_defaults`; whatever is set here always wins.
///
/// # Examples
///
/// ```
/// let _options = sentry_edge::ClientOptions {
///     debug: true,
///     ..Default::default()
/// };
/// ```
#[derive(Clone)]
pub struct ClientOptions {
    // Common options
    /// The DSN to use.  If not set the client is effectively disabled.
    pub dsn: Option<Dsn>,
    /// Enables debug mode.
    ///
    /// In debug mode debug information is printed to stderr to help you understand what
    /// sentry is doing.  When the `debug-logs` feature is enabled, Sentry will instead
    /// log to the `sentry` logger independently of this flag with the `Debug` level.
    pub debug: bool,
    /// The release to be sent with events.
    pub release: Option<Cow<'static, str>>,
    /// The environment to be sent with events.
    ///
    /// Defaults to either `"development"` or `"production"` depending on the
    /// `debug_assertions` cfg-attribute.
    pub environment: Option<Cow<'static, str>>,
    /// The distribution of the release.
    pub dist: Option<Cow<'static, str>>,
    /// The server name to be reported.
    pub server_name: Option<Cow<'static, str>>,
    /// The sample rate for event submission. (0.0 - 1.0, defaults to 1.0)
    pub sample_rate: f32,
    /// The sample rate for tracing transactions. (0.0 - 1.0, defaults to 0.0)
    pub traces_sample_rate: f32,
    /// If given, called with a [`TransactionContext`] for each started
    /// transaction to determine the sampling rate.
    ///
    /// Return a sample rate between 0.0 and 1.0 for the transaction in question.
    /// Takes priority over the parent's decision and `traces_sample_rate`.
    pub traces_sampler: Option<TracesSampler>,
    /// Maximum number of breadcrumbs. (defaults to 100)
    pub max_breadcrumbs: usize,
    /// Maximum number of linked errors added to an exception. (defaults to 5)
    pub max_linked_errors: usize,
    /// Maximum number of feature flag evaluations kept per scope. (defaults to 100)
    pub max_feature_flags: usize,
    /// If turned on some default PII informat is attached.
    pub send_default_pii: bool,
    /// Send reports about locally dropped data. (defaults to true)
    pub send_client_reports: bool,
    /// Enables capturing structured logs.
    pub enable_logs: bool,
    // Session options
    /// Enable Release Health Session tracking.
    ///
    /// When automatic session tracking is enabled, a new "user-mode" session
    /// is started at the time of `sentry_edge::init`, and will persist for the
    /// application lifetime.
    pub auto_session_tracking: bool,
    /// Determine how Sessions are being tracked.
    pub session_mode: SessionMode,
    // Tracing options
    /// URLs that outgoing requests attach trace headers to.
    ///
    /// A URL matches if it contains one of the entries.  `None` attaches
    /// the headers to every outgoing request.
    pub trace_propagation_targets: Option<Vec<String>>,
    /// Also emit the W3C `traceparent` header on outgoing requests.
    pub propagate_traceparent: bool,
    // Filters
    /// Errors whose `Type: message` contains one of these entries are dropped.
    pub ignore_errors: Vec<Cow<'static, str>>,
    /// Transactions whose name contains one of these entries are dropped.
    pub ignore_transactions: Vec<Cow<'static, str>>,
    // Hooks
    /// Callback that is executed before event sending.
    pub before_send: Option<BeforeCallback<Event<'static>>>,
    /// Callback that is executed before transaction sending.
    pub before_send_transaction: Option<BeforeCallback<Transaction<'static>>>,
    /// Callback that is executed for each Breadcrumb being added.
    pub before_breadcrumb: Option<BeforeCallback<Breadcrumb>>,
    /// Callback that is executed for each Log being added.
    pub before_send_log: Option<BeforeCallback<Log>>,
    // Integration options
    /// A list of integrations to enable.
    pub integrations: Vec<Arc<dyn Integration>>,
    /// Whether to add default integrations.
    pub default_integrations: bool,
    // Transport options
    /// The transport to use.
    ///
    /// This is typically either a boxed function taking the client options by
    /// reference and returning a `Transport`, a boxed `Arc<Transport>` or
    /// alternatively the `DefaultTransportFactory`.
    pub transport: Option<Arc<dyn TransportFactory>>,
    /// An optional HTTP proxy to use.
    ///
    /// This will default to the `http_proxy` environment variable.
    pub http_proxy: Option<Cow<'static, str>>,
    /// An optional HTTPS proxy to use.
    ///
    /// This will default to the `HTTPS_PROXY` environment variable
    /// or `http_proxy` if that one exists.
    pub https_proxy: Option<Cow<'static, str>>,
    /// The timeout on client drop for draining events on shutdown.
    pub shutdown_timeout: Duration,
    /// The user agent that should be reported.
    pub user_agent: Cow<'static, str>,
}

impl ClientOptions {
    /// Creates new Options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a configured integration to the options.
    ///
    /// # Examples
    ///
    /// ```
    /// struct MyIntegration;
    ///
    /// impl sentry_edge::Integration for MyIntegration {}
    ///
    /// let options = sentry_edge::ClientOptions::new().add_integration(MyIntegration);
    /// assert_eq!(options.integrations.len(), 1);
    /// ```
    #[must_use]
    pub fn add_integration<I: Integration>(mut self, integration: I) -> Self {
        self.integrations.push(Arc::new(integration));
        self
    }

    /// Whether trace headers should be attached to a request to `url`.
    pub fn should_propagate_to(&self, url: &str) -> bool {
        match &self.trace_propagation_targets {
            None => true,
            Some(targets) => targets.iter().any(|target| url.contains(target.as_str())),
        }
    }

    pub(crate) fn is_ignored_error(&self, event: &Event<'_>) -> bool {
        if self.ignore_errors.is_empty() {
            return false;
        }
        let mut messages: Vec<String> = event
            .exception
            .iter()
            .map(|exc| match &exc.value {
                Some(value) => format!("{}: {}", exc.ty, value),
                None => exc.ty.clone(),
            })
            .collect();
        messages.extend(event.message.clone());
        messages.iter().any(|message| {
            self.ignore_errors
                .iter()
                .any(|pattern| message.contains(pattern.as_ref()))
        })
    }

    pub(crate) fn is_ignored_transaction(&self, name: Option<&str>) -> bool {
        let Some(name) = name else {
            return false;
        };
        self.ignore_transactions
            .iter()
            .any(|pattern| name.contains(pattern.as_ref()))
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Debug)]
        struct BeforeSend;
        let before_send = self.before_send.as_ref().map(|_| BeforeSend);
        #[derive(Debug)]
        struct BeforeSendTransaction;
        let before_send_transaction = self
            .before_send_transaction
            .as_ref()
            .map(|_| BeforeSendTransaction);
        #[derive(Debug)]
        struct BeforeBreadcrumb;
        let before_breadcrumb = self.before_breadcrumb.as_ref().map(|_| BeforeBreadcrumb);
        #[derive(Debug)]
        struct BeforeSendLog;
        let before_send_log = self.before_send_log.as_ref().map(|_| BeforeSendLog);
        #[derive(Debug)]
        struct TracesSampler;
        let traces_sampler = self.traces_sampler.as_ref().map(|_| TracesSampler);
        #[derive(Debug)]
        struct TransportFactory;

        let integrations: Vec<_> = self.integrations.iter().map(|i| i.name()).collect();

        f.debug_struct("ClientOptions")
            .field("dsn", &self.dsn)
            .field("debug", &self.debug)
            .field("release", &self.release)
            .field("environment", &self.environment)
            .field("dist", &self.dist)
            .field("server_name", &self.server_name)
            .field("sample_rate", &self.sample_rate)
            .field("traces_sample_rate", &self.traces_sample_rate)
            .field("traces_sampler", &traces_sampler)
            .field("max_breadcrumbs", &self.max_breadcrumbs)
            .field("max_linked_errors", &self.max_linked_errors)
            .field("max_feature_flags", &self.max_feature_flags)
            .field("send_default_pii", &self.send_default_pii)
            .field("send_client_reports", &self.send_client_reports)
            .field("enable_logs", &self.enable_logs)
            .field("auto_session_tracking", &self.auto_session_tracking)
            .field("session_mode", &self.session_mode)
            .field("trace_propagation_targets", &self.trace_propagation_targets)
            .field("propagate_traceparent", &self.propagate_traceparent)
            .field("ignore_errors", &self.ignore_errors)
            .field("ignore_transactions", &self.ignore_transactions)
            .field("before_send", &before_send)
            .field("before_send_transaction", &before_send_transaction)
            .field("before_breadcrumb", &before_breadcrumb)
            .field("before_send_log", &before_send_log)
            .field("integrations", &integrations)
            .field("default_integrations", &self.default_integrations)
            .field("transport", &TransportFactory)
            .field("http_proxy", &self.http_proxy)
            .field("https_proxy", &self.https_proxy)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for ClientOptions {
    fn default() -> ClientOptions {
        ClientOptions {
            dsn: None,
            debug: false,
            release: None,
            environment: None,
            dist: None,
            server_name: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.0,
            traces_sampler: None,
            max_breadcrumbs: 100,
            max_linked_errors: 5,
            max_feature_flags: 100,
            send_default_pii: false,
            send_client_reports: true,
            enable_logs: false,
            auto_session_tracking: false,
            session_mode: SessionMode::Application,
            trace_propagation_targets: None,
            propagate_traceparent: false,
            ignore_errors: vec![],
            ignore_transactions: vec![],
            before_send: None,
            before_send_transaction: None,
            before_breadcrumb: None,
            before_send_log: None,
            integrations: vec![],
            default_integrations: true,
            transport: None,
            http_proxy: None,
            https_proxy: None,
            shutdown_timeout: Duration::from_secs(2),
            user_agent: Cow::Borrowed(USER_AGENT.as_str()),
        }
    }
}

impl<T: IntoDsn> From<(T, ClientOptions)> for ClientOptions {
    fn from((into_dsn, mut opts): (T, ClientOptions)) -> ClientOptions {
        opts.dsn = into_dsn.into_dsn().expect("invalid value for DSN");
        opts
    }
}

impl<T: IntoDsn> From<T> for ClientOptions {
    fn from(into_dsn: T) -> ClientOptions {
        ClientOptions {
            dsn: into_dsn.into_dsn().expect("invalid value for DSN"),
            ..ClientOptions::default()
        }
    }
}
