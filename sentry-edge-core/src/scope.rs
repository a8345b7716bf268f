use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::flags::FeatureFlagBuffer;
use crate::performance::{TraceHeadersIter, TransactionOrSpan};
use crate::protocol::{
    Breadcrumb, Context, Event, Level, Log, LogAttribute, SpanId, TraceContext, TraceId,
    Transaction, User, Value,
};
use crate::session::Session;
use crate::types::{DynamicSamplingContext, SentryTrace};
use crate::Client;

/// A callback that can modify or drop an event before it is sent.
pub type EventProcessor = Arc<dyn Fn(Event<'static>) -> Option<Event<'static>> + Send + Sync>;

/// The trace identity of a unit of work without an active span.
///
/// Every isolation scope starts with a fresh random trace, so that errors
/// and logs of one request are connected even when tracing is disabled.
/// When a request continues an incoming trace, the trace id and the
/// incoming sampling context are stored here.
#[derive(Clone, Debug, PartialEq)]
pub struct PropagationContext {
    /// The trace this unit of work belongs to.
    pub trace_id: TraceId,
    /// The span id used when no span is active.
    pub span_id: SpanId,
    /// The upstream sampling decision, if known.
    pub sampled: Option<bool>,
    /// The sampling context received from upstream.
    pub dsc: Option<DynamicSamplingContext>,
}

impl Default for PropagationContext {
    fn default() -> Self {
        PropagationContext {
            trace_id: TraceId::random(),
            span_id: SpanId::random(),
            sampled: None,
            dsc: None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StackLayer {
    pub client: Option<Arc<Client>>,
    pub scope: Arc<Scope>,
}

#[derive(Debug)]
pub(crate) struct Stack {
    top: StackLayer,
    layers: Vec<StackLayer>,
}

impl Stack {
    pub fn from_client_and_scope(client: Option<Arc<Client>>, scope: Arc<Scope>) -> Stack {
        Stack {
            top: StackLayer { client, scope },
            layers: vec![],
        }
    }

    pub fn push(&mut self) {
        let layer = self.top.clone();
        self.layers.push(layer);
    }

    pub fn pop(&mut self) {
        match self.layers.pop() {
            Some(layer) => self.top = layer,
            None => debug_panic_or_log!("Pop from empty stack"),
        }
    }

    /// Pops layers until only `depth` remain.
    pub fn truncate(&mut self, depth: usize) {
        while self.layers.len() > depth {
            self.pop();
        }
    }

    #[inline(always)]
    pub fn top(&self) -> &StackLayer {
        &self.top
    }

    #[inline(always)]
    pub fn top_mut(&mut self) -> &mut StackLayer {
        &mut self.top
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

/// Holds contextual data for the current scope.
///
/// The scope is an object that can be cloned efficiently and stores data that
/// is locally relevant to an event.  For instance the scope will hold recorded
/// breadcrumbs and similar information.
///
/// A [`Hub`](crate::Hub) holds two kinds of scopes:
///
/// 1. the **isolation scope**, one per unit of work such as a request.
///    Breadcrumbs, feature flags and the session are recorded here, and it
///    can be configured with [`Hub::configure_isolation_scope`].
/// 2. a stack of **current scopes**, pushed with [`Hub::push_scope`] and
///    configured with [`Hub::configure_scope`].
///
/// When an event is captured, the isolation scope is applied first and the
/// current scope overrides it.
///
/// [`Hub::configure_isolation_scope`]: crate::Hub::configure_isolation_scope
/// [`Hub::push_scope`]: crate::Hub::push_scope
/// [`Hub::configure_scope`]: crate::Hub::configure_scope
#[derive(Clone, Default)]
pub struct Scope {
    pub(crate) level: Option<Level>,
    pub(crate) fingerprint: Option<Arc<[Cow<'static, str>]>>,
    pub(crate) transaction: Option<Arc<str>>,
    pub(crate) breadcrumbs: Arc<VecDeque<Breadcrumb>>,
    pub(crate) user: Option<Arc<User>>,
    pub(crate) extra: Arc<HashMap<String, Value>>,
    pub(crate) tags: Arc<HashMap<String, String>>,
    pub(crate) contexts: Arc<HashMap<String, Context>>,
    pub(crate) event_processors: Arc<Vec<EventProcessor>>,
    pub(crate) flags: Arc<FeatureFlagBuffer>,
    pub(crate) session: Arc<Mutex<Option<Session>>>,
    pub(crate) span: Arc<Option<TransactionOrSpan>>,
    pub(crate) propagation_context: PropagationContext,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("level", &self.level)
            .field("fingerprint", &self.fingerprint)
            .field("transaction", &self.transaction)
            .field("breadcrumbs", &self.breadcrumbs)
            .field("user", &self.user)
            .field("extra", &self.extra)
            .field("tags", &self.tags)
            .field("contexts", &self.contexts)
            .field("event_processors", &self.event_processors.len())
            .field("flags", &self.flags)
            .field("session", &self.session)
            .field("span", &self.span)
            .field("propagation_context", &self.propagation_context)
            .finish()
    }
}

impl Scope {
    /// Clear the scope.
    ///
    /// By default a scope will inherit all values from the higher scope.
    /// In some situations this might not be what a user wants.  Calling
    /// this method will wipe all data contained within.
    pub fn clear(&mut self) {
        sentry_debug!("[Scope] Clearing all scope data");
        *self = Default::default();
    }

    /// Deletes current breadcrumbs from the scope.
    pub fn clear_breadcrumbs(&mut self) {
        self.breadcrumbs = Default::default();
    }

    /// Sets a level override.
    pub fn set_level(&mut self, level: Option<Level>) {
        self.level = level;
    }

    /// Sets the fingerprint.
    pub fn set_fingerprint(&mut self, fingerprint: Option<&[&str]>) {
        self.fingerprint =
            fingerprint.map(|fp| fp.iter().map(|s| Cow::Owned((*s).into())).collect())
    }

    /// Sets the transaction.
    ///
    /// This also renames the active transaction, if there is one.
    pub fn set_transaction(&mut self, transaction: Option<&str>) {
        self.transaction = transaction.map(Arc::from);
        if let (Some(name), Some(span)) = (transaction, self.span.as_ref()) {
            span.set_transaction_name(name);
        }
    }

    /// Sets the user for the current scope.
    pub fn set_user(&mut self, user: Option<User>) {
        self.user = user.map(Arc::new);
    }

    /// Retrieves the user of the current scope.
    pub fn user(&self) -> Option<&User> {
        self.user.as_deref()
    }

    /// Sets a tag to a specific value.
    pub fn set_tag<V: ToString>(&mut self, key: &str, value: V) {
        Arc::make_mut(&mut self.tags).insert(key.to_string(), value.to_string());
    }

    /// Removes a tag.
    ///
    /// If the tag is not set, does nothing.
    pub fn remove_tag(&mut self, key: &str) {
        Arc::make_mut(&mut self.tags).remove(key);
    }

    /// Sets a context for a key.
    pub fn set_context<C: Into<Context>>(&mut self, key: &str, value: C) {
        Arc::make_mut(&mut self.contexts).insert(key.to_string(), value.into());
    }

    /// Removes a context for a key.
    pub fn remove_context(&mut self, key: &str) {
        Arc::make_mut(&mut self.contexts).remove(key);
    }

    /// Sets a extra to a specific value.
    pub fn set_extra(&mut self, key: &str, value: Value) {
        Arc::make_mut(&mut self.extra).insert(key.to_string(), value);
    }

    /// Removes a extra.
    pub fn remove_extra(&mut self, key: &str) {
        Arc::make_mut(&mut self.extra).remove(key);
    }

    /// Add an event processor to the scope.
    pub fn add_event_processor<F>(&mut self, f: F)
    where
        F: Fn(Event<'static>) -> Option<Event<'static>> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.event_processors).push(Arc::new(f));
    }

    /// Set the given [`TransactionOrSpan`] as the active span for this scope.
    pub fn set_span(&mut self, span: Option<TransactionOrSpan>) {
        self.span = Arc::new(span);
    }

    /// Returns the currently active span.
    pub fn get_span(&self) -> Option<TransactionOrSpan> {
        self.span.as_ref().clone()
    }

    /// Returns the trace identity used when no span is active.
    pub fn propagation_context(&self) -> &PropagationContext {
        &self.propagation_context
    }

    /// Replaces the trace identity used when no span is active.
    pub fn set_propagation_context(&mut self, context: PropagationContext) {
        self.propagation_context = context;
    }

    /// The recorded feature flag evaluations.
    pub fn flags(&self) -> &FeatureFlagBuffer {
        &self.flags
    }

    pub(crate) fn add_breadcrumb(&mut self, breadcrumb: Breadcrumb, max_breadcrumbs: usize) {
        let breadcrumbs = Arc::make_mut(&mut self.breadcrumbs);
        breadcrumbs.push_back(breadcrumb);
        while breadcrumbs.len() > max_breadcrumbs {
            breadcrumbs.pop_front();
        }
    }

    pub(crate) fn add_feature_flag(&mut self, flag: &str, result: bool, capacity: usize) {
        let flags = Arc::make_mut(&mut self.flags);
        flags.set_capacity(capacity);
        flags.insert(flag, result);
    }

    /// Creates the scope an event is captured with.
    ///
    /// `self` is the isolation scope, and values set on `current` take
    /// precedence over it.  Breadcrumbs, event processors and flags are
    /// concatenated.
    pub(crate) fn merged_with(&self, current: &Scope) -> Scope {
        let mut merged = self.clone();
        if current.level.is_some() {
            merged.level = current.level;
        }
        if current.fingerprint.is_some() {
            merged.fingerprint.clone_from(&current.fingerprint);
        }
        if current.transaction.is_some() {
            merged.transaction.clone_from(&current.transaction);
        }
        if current.user.is_some() {
            merged.user.clone_from(&current.user);
        }
        if !current.breadcrumbs.is_empty() {
            Arc::make_mut(&mut merged.breadcrumbs).extend(current.breadcrumbs.iter().cloned());
        }
        extend_map(&mut merged.extra, &current.extra);
        extend_map(&mut merged.tags, &current.tags);
        extend_map(&mut merged.contexts, &current.contexts);
        if !current.event_processors.is_empty() {
            Arc::make_mut(&mut merged.event_processors)
                .extend(current.event_processors.iter().cloned());
        }
        if !current.flags.is_empty() {
            Arc::make_mut(&mut merged.flags).extend_from(&current.flags);
        }
        if current.span.is_some() {
            merged.span = current.span.clone();
        }
        merged
    }

    /// Applies the contained scoped data to fill an event.
    pub fn apply_to_event(&self, mut event: Event<'static>) -> Option<Event<'static>> {
        if let Some(level) = self.level {
            event.level = level;
        }

        if event.user.is_none() {
            if let Some(user) = self.user.as_deref() {
                event.user = Some(user.clone());
            }
        }

        event.breadcrumbs.extend(self.breadcrumbs.iter().cloned());
        event
            .extra
            .extend(self.extra.iter().map(|(k, v)| (k.to_owned(), v.to_owned())));
        event
            .tags
            .extend(self.tags.iter().map(|(k, v)| (k.to_owned(), v.to_owned())));
        event.contexts.extend(
            self.contexts
                .iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned())),
        );

        if !self.flags.is_empty() && !event.contexts.contains_key("flags") {
            event
                .contexts
                .insert("flags".into(), self.flags.to_context().into());
        }

        if let Some(span) = self.span.as_ref() {
            span.apply_to_event(&mut event);
        } else {
            self.apply_propagation_context(&mut event);
        }

        if event.transaction.is_none() {
            if let Some(txn) = self.transaction.as_deref() {
                event.transaction = Some(txn.to_owned());
            }
        }

        if event.fingerprint.len() == 1
            && (event.fingerprint[0] == "{{ default }}" || event.fingerprint[0] == "{{default}}")
        {
            if let Some(fp) = self.fingerprint.as_deref() {
                event.fingerprint = Cow::Owned(fp.to_owned());
            }
        }

        for processor in self.event_processors.as_ref() {
            let id = event.event_id;
            event = match processor(event) {
                Some(event) => event,
                None => {
                    sentry_debug!("[Scope] event processor dropped event {}", id);
                    return None;
                }
            }
        }

        Some(event)
    }

    /// Applies the contained scoped data to fill a transaction.
    pub fn apply_to_transaction(&self, transaction: &mut Transaction<'static>) {
        if transaction.user.is_none() {
            if let Some(user) = self.user.as_deref() {
                transaction.user = Some(user.clone());
            }
        }

        transaction
            .extra
            .extend(self.extra.iter().map(|(k, v)| (k.to_owned(), v.to_owned())));
        transaction
            .tags
            .extend(self.tags.iter().map(|(k, v)| (k.to_owned(), v.to_owned())));
        for (key, context) in self.contexts.iter() {
            // the transaction's own trace context always wins
            transaction
                .contexts
                .entry(key.to_owned())
                .or_insert_with(|| context.clone());
        }
        if !self.flags.is_empty() && !transaction.contexts.contains_key("flags") {
            transaction
                .contexts
                .insert("flags".into(), self.flags.to_context().into());
        }
    }

    /// Applies the contained scoped data to a log, setting the `trace_id` and certain default
    /// attributes.
    pub fn apply_to_log(&self, log: &mut Log, send_default_pii: bool) {
        let span = self.span.as_ref().as_ref();
        log.trace_id = Some(match span {
            Some(span) => span.get_trace_context().trace_id,
            None => self.propagation_context.trace_id,
        });

        if let Some(span) = span {
            log.attributes
                .entry("sentry.trace.parent_span_id".to_owned())
                .or_insert_with(|| LogAttribute(span.span_id().to_string().into()));
        }

        if !send_default_pii {
            return;
        }
        let Some(user) = self.user.as_deref() else {
            return;
        };
        let user_attributes = [
            ("user.id", &user.id),
            ("user.name", &user.username),
            ("user.email", &user.email),
        ];
        for (key, value) in user_attributes {
            if let Some(value) = value {
                log.attributes
                    .entry(key.to_owned())
                    .or_insert_with(|| LogAttribute(value.clone().into()));
            }
        }
    }

    pub(crate) fn update_session_from_event(&self, event: &Event<'static>) {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = session.as_mut() {
            session.update_from_event(event);
        }
    }

    pub(crate) fn apply_propagation_context(&self, event: &mut Event<'_>) {
        if event.contexts.contains_key("trace") {
            return;
        }

        let context = TraceContext {
            trace_id: self.propagation_context.trace_id,
            span_id: self.propagation_context.span_id,
            ..Default::default()
        };
        event.contexts.insert("trace".into(), context.into());
    }

    /// The sampling context events of this scope are sent with.
    pub(crate) fn dynamic_sampling_context(&self) -> Option<DynamicSamplingContext> {
        match self.span.as_ref() {
            Some(span) => span.dynamic_sampling_context(),
            None => self.propagation_context.dsc.clone(),
        }
    }

    /// Returns the headers needed for distributed tracing.
    ///
    /// Without an active span, the propagation context is used and the
    /// sampling decision is left to the downstream service.
    pub fn iter_trace_propagation_headers(&self) -> TraceHeadersIter {
        if let Some(span) = self.get_span() {
            span.iter_headers()
        } else {
            let context = &self.propagation_context;
            let trace = SentryTrace::new(context.trace_id, context.span_id, context.sampled);
            TraceHeadersIter::new(trace, context.dsc.clone(), None)
        }
    }
}

fn extend_map<V: Clone>(target: &mut Arc<HashMap<String, V>>, source: &HashMap<String, V>) {
    if source.is_empty() {
        return;
    }
    Arc::make_mut(target).extend(source.iter().map(|(k, v)| (k.clone(), v.clone())));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_scope_overrides_isolation() {
        let mut isolation = Scope::default();
        isolation.set_tag("shared", "isolation");
        isolation.set_tag("request", "abc");
        isolation.set_level(Some(Level::Warning));
        isolation.add_breadcrumb(
            Breadcrumb {
                message: Some("first".into()),
                ..Default::default()
            },
            100,
        );

        let mut current = Scope::default();
        current.set_tag("shared", "current");
        current.set_level(Some(Level::Fatal));
        current.add_breadcrumb(
            Breadcrumb {
                message: Some("second".into()),
                ..Default::default()
            },
            100,
        );

        let merged = isolation.merged_with(&current);
        let event = merged.apply_to_event(Event::default()).unwrap();
        assert_eq!(event.level, Level::Fatal);
        assert_eq!(event.tags["shared"], "current");
        assert_eq!(event.tags["request"], "abc");
        let messages: Vec<_> = event
            .breadcrumbs
            .iter()
            .map(|b| b.message.as_deref())
            .collect();
        assert_eq!(messages, [Some("first"), Some("second")]);

        // the isolation scope itself is unchanged
        assert_eq!(isolation.tags["shared"], "isolation");
    }

    #[test]
    fn test_breadcrumbs_are_bounded() {
        let mut scope = Scope::default();
        for i in 0..5 {
            scope.add_breadcrumb(
                Breadcrumb {
                    message: Some(i.to_string()),
                    ..Default::default()
                },
                3,
            );
        }
        let messages: Vec<_> = scope
            .breadcrumbs
            .iter()
            .map(|b| b.message.clone().unwrap())
            .collect();
        assert_eq!(messages, ["2", "3", "4"]);
    }

    #[test]
    fn test_flags_context() {
        let mut scope = Scope::default();
        scope.add_feature_flag("new-checkout", true, 100);
        scope.add_feature_flag("dark-mode", false, 100);

        let event = scope.apply_to_event(Event::default()).unwrap();
        let Some(Context::Flags(flags)) = event.contexts.get("flags") else {
            panic!("expected flags context");
        };
        let values: Vec<_> = flags.values.iter().map(|f| (f.flag.as_str(), f.result)).collect();
        assert_eq!(values, [("new-checkout", true), ("dark-mode", false)]);
    }

    #[test]
    fn test_propagation_context() {
        let scope = Scope::default();
        let event = scope.apply_to_event(Event::default()).unwrap();
        let Some(Context::Trace(trace)) = event.contexts.get("trace") else {
            panic!("expected trace context");
        };
        assert_eq!(trace.trace_id, scope.propagation_context.trace_id);

        let headers: Vec<_> = scope.iter_trace_propagation_headers().collect();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].0, "sentry-trace");
        assert_eq!(
            headers[0].1,
            format!(
                "{}-{}",
                scope.propagation_context.trace_id, scope.propagation_context.span_id
            )
        );
    }

    #[test]
    fn test_event_processor_drops() {
        let mut scope = Scope::default();
        scope.add_event_processor(|event| {
            if event.message.as_deref() == Some("drop me") {
                None
            } else {
                Some(event)
            }
        });
        let dropped = Event {
            message: Some("drop me".into()),
            ..Default::default()
        };
        assert!(scope.apply_to_event(dropped).is_none());
        assert!(scope.apply_to_event(Event::default()).is_some());
    }

    #[test]
    fn test_log_attributes() {
        let mut scope = Scope::default();
        scope.set_user(Some(User {
            id: Some("42".into()),
            email: Some("jane@example.com".into()),
            ..Default::default()
        }));

        let mut log = Log {
            level: crate::protocol::LogLevel::Info,
            body: "hello".into(),
            trace_id: None,
            timestamp: std::time::SystemTime::now(),
            severity_number: None,
            attributes: Default::default(),
        };
        scope.apply_to_log(&mut log, false);
        assert_eq!(log.trace_id, Some(scope.propagation_context.trace_id));
        assert!(log.attributes.is_empty());

        scope.apply_to_log(&mut log, true);
        assert_eq!(log.attributes["user.id"], LogAttribute::from("42"));
        assert_eq!(
            log.attributes["user.email"],
            LogAttribute::from("jane@example.com")
        );
        assert!(!log.attributes.contains_key("user.name"));
    }
}
