use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::flags::{MAX_FLAGS_PER_SPAN, SPAN_FLAG_ATTRIBUTE_PREFIX};
use crate::hub::HubInner;
use crate::protocol::{
    self, DataCategory, DiscardReason, Map, SpanId, SpanStatus, TraceContext, TraceId,
    TransactionInfo, TransactionSource, Value,
};
use crate::types::{
    Baggage, DynamicSamplingContext, SentryTrace, TraceParent, BAGGAGE_HEADER,
    SENTRY_TRACE_HEADER, TRACEPARENT_HEADER,
};
use crate::{Client, ClientOptions, Hub};

/// The maximum number of child spans recorded per transaction.
pub const MAX_SPANS: usize = 1_000;

// global API:

/// Start a new Performance Monitoring Transaction on the main hub.
///
/// The transaction needs to be explicitly finished via [`Transaction::finish`],
/// otherwise it will be discarded.
/// The transaction itself also represents the root span in the span hierarchy.
/// Child spans can be started with the [`Transaction::start_child`] method.
pub fn start_transaction(ctx: TransactionContext) -> Transaction {
    Hub::main().start_transaction(ctx)
}

// Hub API:

impl Hub {
    /// Start a new Performance Monitoring Transaction.
    ///
    /// The sampling decision is made here, from the options of the bound
    /// client.  See the global [`start_transaction`] for more documentation.
    pub fn start_transaction(&self, ctx: TransactionContext) -> Transaction {
        Transaction::new(self.client(), ctx, self.downgrade())
    }

    /// Returns the headers needed to continue the current trace in an
    /// outgoing request.
    pub fn iter_trace_propagation_headers(&self) -> TraceHeadersIter {
        self.with_merged_scope(|scope| scope.iter_trace_propagation_headers())
    }
}

// "Context" Types:

/// The Transaction Context used to start a new Performance Monitoring Transaction.
///
/// The Transaction Context defines the metadata for a Performance Monitoring
/// Transaction, and also the connection point for distributed tracing.
#[derive(Debug, Clone)]
pub struct TransactionContext {
    name: String,
    op: String,
    trace_id: TraceId,
    parent_span_id: Option<SpanId>,
    sampled: Option<bool>,
    parent_sampled: Option<bool>,
    origin: Option<String>,
    source: TransactionSource,
    data: Map<String, Value>,
    dsc: Option<DynamicSamplingContext>,
}

impl TransactionContext {
    /// Creates a new Transaction Context with the given `name` and `op`.
    ///
    /// See <https://docs.sentry.io/platforms/native/enriching-events/transaction-name/>
    /// for an explanation of a Transaction's `name`, and
    /// <https://develop.sentry.dev/sdk/performance/span-operations/> for conventions
    /// around an `operation`'s value.
    ///
    /// See also the [`TransactionContext::continue_from_headers`] function that
    /// can be used for distributed tracing.
    #[must_use = "this must be used with `start_transaction`"]
    pub fn new(name: &str, op: &str) -> Self {
        Self {
            name: name.into(),
            op: op.into(),
            trace_id: TraceId::random(),
            parent_span_id: None,
            sampled: None,
            parent_sampled: None,
            origin: None,
            source: TransactionSource::Custom,
            data: Map::new(),
            dsc: None,
        }
    }

    /// Creates a new Transaction Context based on the distributed tracing `headers`.
    ///
    /// A `sentry-trace` header continues the trace, and a `baggage` header
    /// next to it carries the sampling context of the trace, which is then
    /// forwarded unmodified.  Without `sentry-trace`, a W3C `traceparent`
    /// header is used instead.  Header names are matched case-insensitively
    /// and invalid values are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use sentry_edge_core::TransactionContext;
    ///
    /// let headers = [
    ///     ("sentry-trace", "771a43a4192642f0b136d5159a501700-b6c56a0b6ea2e0cb-1"),
    ///     ("baggage", "sentry-trace_id=771a43a4192642f0b136d5159a501700,sentry-sample_rand=0.25"),
    /// ];
    /// let ctx = TransactionContext::continue_from_headers("GET /users", "http.server", headers);
    /// assert_eq!(ctx.trace_id().to_string(), "771a43a4192642f0b136d5159a501700");
    /// assert_eq!(ctx.parent_sampled(), Some(true));
    /// ```
    #[must_use = "this must be used with `start_transaction`"]
    pub fn continue_from_headers<'a, I: IntoIterator<Item = (&'a str, &'a str)>>(
        name: &str,
        op: &str,
        headers: I,
    ) -> Self {
        let mut sentry_trace = None;
        let mut traceparent = None;
        let mut baggage = Vec::new();
        for (k, v) in headers.into_iter() {
            if k.eq_ignore_ascii_case(SENTRY_TRACE_HEADER) {
                sentry_trace = v
                    .parse::<SentryTrace>()
                    .map_err(|err| {
                        sentry_debug!("[TransactionContext] invalid sentry-trace header: {}", err);
                    })
                    .ok();
            } else if k.eq_ignore_ascii_case(BAGGAGE_HEADER) {
                baggage.push(v);
            } else if k.eq_ignore_ascii_case(TRACEPARENT_HEADER) {
                traceparent = v.parse::<TraceParent>().ok();
            }
        }
        let dsc = Baggage::parse_all(baggage).into_dynamic_sampling_context();

        let mut ctx = Self::new(name, op);
        if let Some(trace) = sentry_trace {
            ctx.trace_id = trace.trace_id();
            ctx.parent_span_id = Some(trace.span_id());
            ctx.parent_sampled = trace.sampled();
            // an upstream SDK without baggage support freezes an empty context
            ctx.dsc = Some(dsc.unwrap_or_default());
        } else if let Some(traceparent) = traceparent {
            ctx.trace_id = traceparent.trace_id();
            ctx.parent_span_id = Some(traceparent.parent_id());
            ctx.parent_sampled = Some(traceparent.sampled());
            ctx.dsc = dsc;
        }
        ctx
    }

    /// Creates a new Transaction Context based on an existing Span.
    ///
    /// This should be used when an independent computation is spawned on another
    /// thread and should be connected to the calling thread via a distributed
    /// tracing transaction.
    pub fn continue_from_span(name: &str, op: &str, span: Option<TransactionOrSpan>) -> Self {
        let span = match span {
            Some(span) => span,
            None => return Self::new(name, op),
        };

        let context = span.get_trace_context();
        let mut ctx = Self::new(name, op);
        ctx.trace_id = context.trace_id;
        ctx.parent_span_id = Some(context.span_id);
        ctx.sampled = Some(span.is_sampled());
        ctx.dsc = span.dynamic_sampling_context();
        ctx
    }

    /// Set the sampling decision for this Transaction.
    ///
    /// This can be either an explicit boolean flag, or [`None`], which will fall
    /// back to the `traces_sampler`, the parent's decision and then the
    /// configured `traces_sample_rate` option.
    pub fn set_sampled(&mut self, sampled: impl Into<Option<bool>>) {
        self.sampled = sampled.into();
    }

    /// The explicit sampling decision.
    pub fn sampled(&self) -> Option<bool> {
        self.sampled
    }

    /// The sampling decision of the upstream service.
    pub fn parent_sampled(&self) -> Option<bool> {
        self.parent_sampled
    }

    /// The name of the transaction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The operation of the transaction.
    pub fn operation(&self) -> &str {
        &self.op
    }

    /// The trace this transaction belongs to.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// The span this transaction continues, if any.
    pub fn parent_span_id(&self) -> Option<SpanId> {
        self.parent_span_id
    }

    /// Sets the instrumentation that creates this transaction, e.g. `auto.http.server`.
    pub fn set_origin(&mut self, origin: &str) {
        self.origin = Some(origin.into());
    }

    /// Sets how the transaction name was determined.
    ///
    /// Names with source `url` are not forwarded in the sampling context.
    pub fn set_source(&mut self, source: TransactionSource) {
        self.source = source;
    }

    /// How the transaction name was determined.
    pub fn source(&self) -> TransactionSource {
        self.source
    }

    /// Sets an attribute of the transaction, also visible to the `traces_sampler`.
    pub fn set_data(&mut self, key: &str, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// The attributes of the transaction.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// The sampling context inherited from the upstream service.
    pub fn dynamic_sampling_context(&self) -> Option<&DynamicSamplingContext> {
        self.dsc.as_ref()
    }
}

/// The outcome of the sampling decision of a transaction.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SamplingDecision {
    sampled: bool,
    sample_rate: Option<f64>,
    sample_rand: f64,
}

/// Decides whether a transaction is sampled.
///
/// The explicit decision wins, then the `traces_sampler`, then the upstream
/// decision and finally `traces_sample_rate`.  Rates are compared against
/// `sample_rand`, which is shared by the whole trace when it was received
/// in the baggage.
fn sample_transaction(ctx: &TransactionContext, options: &ClientOptions) -> SamplingDecision {
    let sample_rand = ctx
        .dsc
        .as_ref()
        .and_then(|dsc| dsc.sample_rand_value())
        .unwrap_or_else(rand::random::<f64>);
    let decide = |rate: f64| SamplingDecision {
        sampled: sample_rand < rate,
        sample_rate: Some(rate),
        sample_rand,
    };

    if let Some(sampled) = ctx.sampled {
        return SamplingDecision {
            sampled,
            sample_rate: None,
            sample_rand,
        };
    }
    if let Some(sampler) = &options.traces_sampler {
        return decide(f64::from(sampler(ctx)).clamp(0.0, 1.0));
    }
    if let Some(sampled) = ctx.parent_sampled {
        let sample_rate = ctx
            .dsc
            .as_ref()
            .and_then(|dsc| dsc.sample_rate.as_deref())
            .and_then(|rate| rate.parse().ok());
        return SamplingDecision {
            sampled,
            sample_rate,
            sample_rand,
        };
    }
    decide(f64::from(options.traces_sample_rate).clamp(0.0, 1.0))
}

/// Creates the sampling context of a trace started by this service.
fn new_dynamic_sampling_context(
    ctx: &TransactionContext,
    options: &ClientOptions,
    decision: SamplingDecision,
) -> DynamicSamplingContext {
    let mut dsc = DynamicSamplingContext::new();
    dsc.trace_id = Some(ctx.trace_id.to_string());
    if let Some(dsn) = &options.dsn {
        dsc.public_key = Some(dsn.public_key().to_owned());
        dsc.org_id = dsn.org_id().map(ToOwned::to_owned);
    }
    dsc.release = options.release.as_deref().map(ToOwned::to_owned);
    dsc.environment = options.environment.as_deref().map(ToOwned::to_owned);
    if ctx.source != TransactionSource::Url {
        dsc.transaction = Some(ctx.name.clone());
    }
    dsc.sample_rate = decision.sample_rate.map(|rate| rate.to_string());
    dsc.sampled = Some(decision.sampled.to_string());
    dsc.sample_rand = Some(decision.sample_rand.to_string());
    dsc
}

// global API types:

/// A wrapper that groups a [`Transaction`] and a [`Span`] together.
#[derive(Clone, Debug)]
pub enum TransactionOrSpan {
    /// A [`Transaction`].
    Transaction(Transaction),
    /// A [`Span`].
    Span(Span),
}

impl From<Transaction> for TransactionOrSpan {
    fn from(transaction: Transaction) -> Self {
        Self::Transaction(transaction)
    }
}

impl From<Span> for TransactionOrSpan {
    fn from(span: Span) -> Self {
        Self::Span(span)
    }
}

impl TransactionOrSpan {
    /// Set some extra information to be sent with this Transaction/Span.
    pub fn set_data(&self, key: &str, value: Value) {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.set_data(key, value),
            TransactionOrSpan::Span(span) => span.set_data(key, value),
        }
    }

    /// Sets a tag to a specific value.
    pub fn set_tag<V: ToString>(&self, key: &str, value: V) {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.set_tag(key, value),
            TransactionOrSpan::Span(span) => span.set_tag(key, value),
        }
    }

    /// Get the status of the Transaction/Span.
    pub fn get_status(&self) -> Option<SpanStatus> {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.get_status(),
            TransactionOrSpan::Span(span) => span.get_status(),
        }
    }

    /// Set the status of the Transaction/Span.
    pub fn set_status(&self, status: SpanStatus) {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.set_status(status),
            TransactionOrSpan::Span(span) => span.set_status(status),
        }
    }

    /// Sets the instrumentation that created the Transaction/Span.
    pub fn set_origin(&self, origin: &str) {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.set_origin(origin),
            TransactionOrSpan::Span(span) => span.set_origin(origin),
        }
    }

    /// Set the HTTP request information for this Transaction/Span.
    pub fn set_request(&self, request: protocol::Request) {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.set_request(request),
            TransactionOrSpan::Span(span) => span.set_request(request),
        }
    }

    /// Returns the trace context of the Transaction/Span.
    pub fn get_trace_context(&self) -> TraceContext {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.get_trace_context(),
            TransactionOrSpan::Span(span) => span.get_trace_context(),
        }
    }

    /// Returns the span id of the Transaction/Span.
    pub fn span_id(&self) -> SpanId {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.span_id(),
            TransactionOrSpan::Span(span) => span.span_id(),
        }
    }

    /// Returns whether the Transaction/Span is sampled.
    pub fn is_sampled(&self) -> bool {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.is_sampled(),
            TransactionOrSpan::Span(span) => span.is_sampled(),
        }
    }

    /// The sampling context of the trace.
    pub fn dynamic_sampling_context(&self) -> Option<DynamicSamplingContext> {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.dynamic_sampling_context(),
            TransactionOrSpan::Span(span) => span.dynamic_sampling_context(),
        }
    }

    /// Returns the headers needed for distributed tracing.
    pub fn iter_headers(&self) -> TraceHeadersIter {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.iter_headers(),
            TransactionOrSpan::Span(span) => span.iter_headers(),
        }
    }

    /// Starts a new child Span with the given `op` and `description`.
    ///
    /// The span must be explicitly finished via [`Span::finish`], as it will
    /// otherwise not be sent to Sentry.
    #[must_use = "a span must be explicitly closed via `finish()`"]
    pub fn start_child(&self, op: &str, description: &str) -> Span {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.start_child(op, description),
            TransactionOrSpan::Span(span) => span.start_child(op, description),
        }
    }

    pub(crate) fn set_transaction_name(&self, name: &str) {
        let inner = match self {
            TransactionOrSpan::Transaction(transaction) => &transaction.inner,
            TransactionOrSpan::Span(span) => &span.transaction,
        };
        if let Some(transaction) = lock(inner).transaction.as_mut() {
            transaction.name = Some(name.into());
        }
    }

    /// Records a feature flag evaluation as a span attribute.
    pub(crate) fn set_flag(&self, flag: &str, result: bool) {
        let key = format!("{SPAN_FLAG_ATTRIBUTE_PREFIX}{flag}");
        match self {
            TransactionOrSpan::Transaction(transaction) => {
                let mut inner = lock(&transaction.inner);
                insert_flag(&mut inner.context.data, key, result);
            }
            TransactionOrSpan::Span(span) => {
                let mut span = lock(&span.span);
                insert_flag(&mut span.data, key, result);
            }
        }
    }

    pub(crate) fn apply_to_event(&self, event: &mut protocol::Event<'_>) {
        if event.contexts.contains_key("trace") {
            return;
        }
        event
            .contexts
            .insert("trace".into(), self.get_trace_context().into());
    }

    /// Finishes the Transaction/Span.
    ///
    /// This records the end timestamp and either sends the inner [`Transaction`]
    /// directly to Sentry, or adds the [`Span`] to its transaction.
    pub fn finish(self) {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.finish(),
            TransactionOrSpan::Span(span) => span.finish(),
        }
    }
}

fn insert_flag(data: &mut Map<String, Value>, key: String, result: bool) {
    let count = data
        .keys()
        .filter(|k| k.starts_with(SPAN_FLAG_ATTRIBUTE_PREFIX))
        .count();
    if data.contains_key(&key) || count < MAX_FLAGS_PER_SPAN {
        data.insert(key, result.into());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub(crate) struct TransactionInner {
    client: Option<Arc<Client>>,
    hub: Weak<HubInner>,
    sampled: bool,
    context: TraceContext,
    dsc: Option<DynamicSamplingContext>,
    propagate_traceparent: bool,
    pub(crate) transaction: Option<protocol::Transaction<'static>>,
}

type TransactionArc = Arc<Mutex<TransactionInner>>;

/// A running Performance Monitoring Transaction.
///
/// The transaction needs to be explicitly finished via [`Transaction::finish`],
/// otherwise neither the transaction nor any of its child spans will be sent
/// to Sentry.
///
/// An unsampled transaction records nothing, but still propagates its trace
/// id and sampling decision to downstream services.
#[derive(Clone, Debug)]
pub struct Transaction {
    pub(crate) inner: TransactionArc,
}

impl Transaction {
    fn new(client: Option<Arc<Client>>, ctx: TransactionContext, hub: Weak<HubInner>) -> Self {
        let context = TraceContext {
            trace_id: ctx.trace_id,
            parent_span_id: ctx.parent_span_id,
            op: Some(ctx.op.clone()),
            origin: ctx.origin.clone(),
            data: ctx.data.clone(),
            ..Default::default()
        };

        let Some(client) = client else {
            let sampled = ctx.sampled.or(ctx.parent_sampled).unwrap_or(false);
            return Self::from_inner(TransactionInner {
                client: None,
                hub,
                sampled,
                context,
                dsc: ctx.dsc,
                propagate_traceparent: false,
                transaction: None,
            });
        };

        let options = client.options();
        let decision = sample_transaction(&ctx, options);
        let dsc = match ctx.dsc.clone() {
            Some(dsc) => dsc,
            None => new_dynamic_sampling_context(&ctx, options, decision),
        };
        let propagate_traceparent = options.propagate_traceparent;

        if !decision.sampled {
            sentry_debug!("[Transaction] {} was not sampled", ctx.name);
            client.record_discard(DiscardReason::SampleRate, DataCategory::Transaction, 1);
            return Self::from_inner(TransactionInner {
                client: None,
                hub,
                sampled: false,
                context,
                dsc: Some(dsc),
                propagate_traceparent,
                transaction: None,
            });
        }

        let transaction = protocol::Transaction {
            name: Some(ctx.name),
            transaction_info: Some(TransactionInfo { source: ctx.source }),
            ..Default::default()
        };
        Self::from_inner(TransactionInner {
            client: Some(client),
            hub,
            sampled: true,
            context,
            dsc: Some(dsc),
            propagate_traceparent,
            transaction: Some(transaction),
        })
    }

    fn from_inner(inner: TransactionInner) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Set some extra information to be sent with this Transaction.
    pub fn set_data(&self, key: &str, value: Value) {
        lock(&self.inner).context.data.insert(key.into(), value);
    }

    /// Sets a tag to a specific value.
    pub fn set_tag<V: ToString>(&self, key: &str, value: V) {
        let mut inner = lock(&self.inner);
        if let Some(transaction) = inner.transaction.as_mut() {
            transaction.tags.insert(key.into(), value.to_string());
        }
    }

    /// Get the status of the Transaction.
    pub fn get_status(&self) -> Option<SpanStatus> {
        lock(&self.inner).context.status
    }

    /// Set the status of the Transaction.
    pub fn set_status(&self, status: SpanStatus) {
        lock(&self.inner).context.status = Some(status);
    }

    /// Sets the instrumentation that created the Transaction.
    pub fn set_origin(&self, origin: &str) {
        lock(&self.inner).context.origin = Some(origin.into());
    }

    /// Renames the Transaction.
    pub fn set_name(&self, name: &str) {
        let mut inner = lock(&self.inner);
        if let Some(transaction) = inner.transaction.as_mut() {
            transaction.name = Some(name.into());
        }
    }

    /// Set the HTTP request information for this Transaction.
    pub fn set_request(&self, request: protocol::Request) {
        let mut inner = lock(&self.inner);
        if let Some(transaction) = inner.transaction.as_mut() {
            transaction.request = Some(request);
        }
    }

    /// Returns the trace context of the Transaction.
    pub fn get_trace_context(&self) -> TraceContext {
        lock(&self.inner).context.clone()
    }

    /// Returns the span id of the Transaction.
    pub fn span_id(&self) -> SpanId {
        lock(&self.inner).context.span_id
    }

    /// Returns whether the Transaction is sampled.
    pub fn is_sampled(&self) -> bool {
        lock(&self.inner).sampled
    }

    /// The sampling context of the trace, inherited or created at start.
    pub fn dynamic_sampling_context(&self) -> Option<DynamicSamplingContext> {
        lock(&self.inner).dsc.clone()
    }

    /// Returns the headers needed for distributed tracing.
    pub fn iter_headers(&self) -> TraceHeadersIter {
        let inner = lock(&self.inner);
        TraceHeadersIter::for_span(
            inner.context.trace_id,
            inner.context.span_id,
            inner.sampled,
            inner.dsc.clone(),
            inner.propagate_traceparent,
        )
    }

    /// Finishes the Transaction.
    ///
    /// This records the end timestamp and sends the transaction together with
    /// all finished child spans to Sentry.  The data of the hub it was started
    /// on is applied, and the envelope carries the sampling context of the
    /// trace.
    pub fn finish(self) {
        let mut inner = lock(&self.inner);
        let Some(mut transaction) = inner.transaction.take() else {
            return;
        };
        let Some(client) = inner.client.take() else {
            return;
        };
        transaction.finish();
        transaction
            .contexts
            .insert("trace".into(), inner.context.clone().into());
        let dsc = inner.dsc.clone();
        let hub = inner.hub.upgrade().map(Hub::from_inner);
        drop(inner);

        let scope = hub.map(|hub| hub.merged_scope());
        client.capture_transaction(transaction, scope.as_ref(), dsc);
    }

    /// Starts a new child Span with the given `op` and `description`.
    ///
    /// The span must be explicitly finished via [`Span::finish`].
    #[must_use = "a span must be explicitly closed via `finish()`"]
    pub fn start_child(&self, op: &str, description: &str) -> Span {
        let inner = lock(&self.inner);
        let span = protocol::Span {
            trace_id: inner.context.trace_id,
            parent_span_id: Some(inner.context.span_id),
            op: Some(op.into()),
            description: if description.is_empty() {
                None
            } else {
                Some(description.into())
            },
            ..Default::default()
        };
        Span {
            transaction: Arc::clone(&self.inner),
            sampled: inner.sampled,
            span: Arc::new(Mutex::new(span)),
        }
    }
}

/// A running Performance Monitoring Span.
///
/// The span needs to be explicitly finished via [`Span::finish`], otherwise it
/// will not be sent to Sentry.
#[derive(Clone, Debug)]
pub struct Span {
    pub(crate) transaction: TransactionArc,
    sampled: bool,
    span: SpanArc,
}

type SpanArc = Arc<Mutex<protocol::Span>>;

impl Span {
    /// Set some extra information to be sent with this Span.
    pub fn set_data(&self, key: &str, value: Value) {
        lock(&self.span).data.insert(key.into(), value);
    }

    /// Sets a tag to a specific value.
    pub fn set_tag<V: ToString>(&self, key: &str, value: V) {
        lock(&self.span).tags.insert(key.into(), value.to_string());
    }

    /// Get the status of the Span.
    pub fn get_status(&self) -> Option<SpanStatus> {
        lock(&self.span).status
    }

    /// Set the status of the Span.
    pub fn set_status(&self, status: SpanStatus) {
        lock(&self.span).status = Some(status);
    }

    /// Sets the instrumentation that created the Span.
    pub fn set_origin(&self, origin: &str) {
        lock(&self.span).origin = Some(origin.into());
    }

    /// Set the HTTP request information for this Span.
    ///
    /// The request is recorded as span attributes.
    pub fn set_request(&self, request: protocol::Request) {
        let mut span = lock(&self.span);
        if let Some(method) = request.method {
            span.data.insert("http.request.method".into(), method.into());
        }
        if let Some(url) = request.url {
            span.data.insert("url.full".into(), url.to_string().into());
        }
        if let Some(query_string) = request.query_string {
            span.data.insert("http.query".into(), query_string.into());
        }
    }

    /// Returns the trace context of the Span.
    pub fn get_trace_context(&self) -> TraceContext {
        let span = lock(&self.span);
        TraceContext {
            span_id: span.span_id,
            trace_id: span.trace_id,
            parent_span_id: span.parent_span_id,
            op: span.op.clone(),
            description: span.description.clone(),
            status: span.status,
            origin: span.origin.clone(),
            ..Default::default()
        }
    }

    /// Returns the span id of the Span.
    pub fn span_id(&self) -> SpanId {
        lock(&self.span).span_id
    }

    /// Returns whether the Span is sampled.
    pub fn is_sampled(&self) -> bool {
        self.sampled
    }

    /// The sampling context of the trace.
    pub fn dynamic_sampling_context(&self) -> Option<DynamicSamplingContext> {
        lock(&self.transaction).dsc.clone()
    }

    /// Returns the headers needed for distributed tracing.
    pub fn iter_headers(&self) -> TraceHeadersIter {
        let (dsc, propagate_traceparent) = {
            let inner = lock(&self.transaction);
            (inner.dsc.clone(), inner.propagate_traceparent)
        };
        let span = lock(&self.span);
        TraceHeadersIter::for_span(
            span.trace_id,
            span.span_id,
            self.sampled,
            dsc,
            propagate_traceparent,
        )
    }

    /// Finishes the Span.
    ///
    /// This will record the end timestamp and add the span to the transaction
    /// in which it was started.
    pub fn finish(self) {
        let mut span = lock(&self.span);
        if span.timestamp.is_some() {
            // the span was already finished
            return;
        }
        span.finish();
        let mut inner = lock(&self.transaction);
        let TransactionInner {
            client,
            transaction,
            ..
        } = &mut *inner;
        if let Some(transaction) = transaction.as_mut() {
            if transaction.spans.len() < MAX_SPANS {
                transaction.spans.push(span.clone());
            } else if let Some(client) = client {
                client.record_discard(DiscardReason::BufferOverflow, DataCategory::Span, 1);
            }
        }
    }

    /// Starts a new child Span with the given `op` and `description`.
    ///
    /// The span must be explicitly finished via [`Span::finish`].
    #[must_use = "a span must be explicitly closed via `finish()`"]
    pub fn start_child(&self, op: &str, description: &str) -> Span {
        let span = lock(&self.span);
        let span = protocol::Span {
            trace_id: span.trace_id,
            parent_span_id: Some(span.span_id),
            op: Some(op.into()),
            description: if description.is_empty() {
                None
            } else {
                Some(description.into())
            },
            ..Default::default()
        };
        Span {
            transaction: self.transaction.clone(),
            sampled: self.sampled,
            span: Arc::new(Mutex::new(span)),
        }
    }
}

/// An Iterator over HTTP header names and values needed for distributed tracing.
///
/// This yields the `sentry-trace` header, the `baggage` header when the
/// trace has a sampling context, and the W3C `traceparent` header when
/// [`ClientOptions::propagate_traceparent`] is enabled.
#[derive(Debug)]
pub struct TraceHeadersIter {
    headers: std::vec::IntoIter<(&'static str, String)>,
}

impl TraceHeadersIter {
    pub(crate) fn new(
        trace: SentryTrace,
        dsc: Option<DynamicSamplingContext>,
        traceparent: Option<TraceParent>,
    ) -> Self {
        let mut headers = vec![(SENTRY_TRACE_HEADER, trace.to_string())];
        if let Some(dsc) = dsc.filter(|dsc| !dsc.is_empty()) {
            headers.push((BAGGAGE_HEADER, Baggage::from_dsc(dsc).to_string()));
        }
        if let Some(traceparent) = traceparent {
            headers.push((TRACEPARENT_HEADER, traceparent.to_string()));
        }
        TraceHeadersIter {
            headers: headers.into_iter(),
        }
    }

    fn for_span(
        trace_id: TraceId,
        span_id: SpanId,
        sampled: bool,
        dsc: Option<DynamicSamplingContext>,
        propagate_traceparent: bool,
    ) -> Self {
        let traceparent =
            propagate_traceparent.then(|| TraceParent::new(trace_id, span_id, sampled));
        Self::new(
            SentryTrace::new(trace_id, span_id, Some(sampled)),
            dsc,
            traceparent,
        )
    }
}

impl Iterator for TraceHeadersIter {
    type Item = (&'static str, String);

    fn next(&mut self) -> Option<Self::Item> {
        self.headers.next()
    }
}
