use std::fmt;
use std::sync::{Arc, LazyLock, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use crate::breadcrumbs::{ui_breadcrumb, BreadcrumbDebouncer};
use crate::protocol::{Event, Feedback, Level, SessionStatus};
use crate::scope::{PropagationContext, Stack};
use crate::session::Session;
use crate::{Client, IntoBreadcrumbs, Scope, TransactionOrSpan, Uuid};

static MAIN_HUB: LazyLock<Hub> = LazyLock::new(|| Hub::new(None, Default::default()));

/// A guard which is returned from [`Hub::push_scope`].
///
/// Dropping it pops the scope again.
pub struct ScopeGuard(pub(crate) Option<(Hub, usize)>);

impl fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeGuard")
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Some((hub, depth)) = self.0.take() {
            hub.with_stack_mut(|stack| {
                crate::debug_assert_or_log!(
                    stack.depth() == depth,
                    "Tried to pop guards out of order"
                );
                stack.truncate(depth - 1);
            })
        }
    }
}

/// The isolation scope, shared by all forks of one unit of work.
#[derive(Debug, Default)]
struct Isolation {
    scope: RwLock<Scope>,
    debouncer: Mutex<BreadcrumbDebouncer>,
}

#[derive(Debug)]
pub(crate) struct HubInner {
    stack: RwLock<Stack>,
    isolation: Arc<Isolation>,
    last_event_id: RwLock<Option<Uuid>>,
}

/// The central object that manages scopes and clients.
///
/// A hub is an explicit context object: it is created for a unit of work,
/// such as an incoming request, and passed to everything that captures data
/// for it.  There is no hidden per-thread or per-task hub.  Cloning a hub is
/// cheap and yields a handle to the same hub.
///
/// Every hub holds an isolation scope for data of the whole unit of work,
/// and a stack of current scopes for nested work.  See [`Scope`] for how the
/// two are combined.
///
/// Free functions such as [`capture_event`](crate::capture_event) use the
/// process wide [`Hub::main`].
///
/// # Examples
///
/// ```
/// use sentry_edge::{Hub, Level};
///
/// // at the top of a request
/// let hub = Hub::new_from_top(&Hub::main());
/// hub.configure_isolation_scope(|scope| scope.set_tag("request_id", "abc"));
/// hub.capture_message("handled a request", Level::Info);
/// ```
#[derive(Clone)]
pub struct Hub(Arc<HubInner>);

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("client", &self.client().map(|client| client.dsn().cloned()))
            .finish()
    }
}

impl Hub {
    fn from_parts(client: Option<Arc<Client>>, scope: Arc<Scope>, isolation: Isolation) -> Hub {
        Hub(Arc::new(HubInner {
            stack: RwLock::new(Stack::from_client_and_scope(client, scope)),
            isolation: Arc::new(isolation),
            last_event_id: RwLock::new(None),
        }))
    }

    pub(crate) fn from_inner(inner: Arc<HubInner>) -> Hub {
        Hub(inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<HubInner> {
        Arc::downgrade(&self.0)
    }

    fn with_stack<F: FnOnce(&Stack) -> R, R>(&self, f: F) -> R {
        let guard = self.0.stack.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn with_stack_mut<F: FnOnce(&mut Stack) -> R, R>(&self, f: F) -> R {
        let mut guard = self.0.stack.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    fn with_isolation_mut<F: FnOnce(&mut Scope) -> R, R>(&self, f: F) -> R {
        let mut guard = self
            .0
            .isolation
            .scope
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Creates a new hub from the given client and scope.
    ///
    /// The hub starts with an empty isolation scope.
    pub fn new(client: Option<Arc<Client>>, scope: Arc<Scope>) -> Hub {
        Hub::from_parts(client, scope, Isolation::default())
    }

    /// Creates a hub for a new unit of work, based on the top scope of the
    /// given hub.
    ///
    /// The new hub gets a copy of the parent's isolation scope with a fresh
    /// trace.  A session running on the parent is shared, but sessions
    /// started on the new hub are not seen by the parent.
    pub fn new_from_top(other: &Hub) -> Hub {
        let mut isolation = other
            .0
            .isolation
            .scope
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        isolation.propagation_context = PropagationContext::default();

        other.with_stack(|stack| {
            let top = stack.top();
            Hub::from_parts(
                top.client.clone(),
                top.scope.clone(),
                Isolation {
                    scope: RwLock::new(isolation),
                    debouncer: Default::default(),
                },
            )
        })
    }

    /// Creates a hub for nested work of the same unit of work.
    ///
    /// The fork shares the isolation scope with `self` and starts with a
    /// copy of its current scope, so that spans and scope changes of
    /// concurrent tasks do not leak into each other.
    pub fn fork(&self) -> Hub {
        self.with_stack(|stack| {
            let top = stack.top();
            Hub(Arc::new(HubInner {
                stack: RwLock::new(Stack::from_client_and_scope(
                    top.client.clone(),
                    top.scope.clone(),
                )),
                isolation: self.0.isolation.clone(),
                last_event_id: RwLock::new(None),
            }))
        })
    }

    /// Returns the process wide hub.
    ///
    /// `sentry_edge::init` binds its client here.
    pub fn main() -> Hub {
        MAIN_HUB.clone()
    }

    /// Returns the currently bound client.
    pub fn client(&self) -> Option<Arc<Client>> {
        self.with_stack(|stack| stack.top().client.clone())
    }

    /// Binds a new client to the hub.
    pub fn bind_client(&self, client: Option<Arc<Client>>) {
        self.with_stack_mut(|stack| {
            stack.top_mut().client = client;
        })
    }

    /// The scope events are captured with: the isolation scope with the
    /// current scope applied on top.
    pub(crate) fn merged_scope(&self) -> Scope {
        self.with_merged_scope(Scope::clone)
    }

    pub(crate) fn with_merged_scope<F: FnOnce(&Scope) -> R, R>(&self, f: F) -> R {
        let isolation = self
            .0
            .isolation
            .scope
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let current = self.with_stack(|stack| stack.top().scope.clone());
        f(&isolation.merged_with(&current))
    }

    /// The span set on the current scope.
    ///
    /// Instrumentation starts its spans as children of this one.
    pub fn current_span(&self) -> Option<TransactionOrSpan> {
        self.with_stack(|stack| stack.top().scope.get_span())
    }

    /// Returns the bound client together with the merged scope.
    ///
    /// No lock is held while the caller works with the result.
    pub(crate) fn client_and_merged_scope(&self) -> Option<(Arc<Client>, Scope)> {
        let client = self.client()?;
        Some((client, self.merged_scope()))
    }

    /// Sends the event to the current client with the current scope.
    ///
    /// Returns the nil id if the hub has no client or the event was dropped.
    ///
    /// See the global [`capture_event`](crate::capture_event)
    /// for more documentation.
    pub fn capture_event(&self, event: Event<'static>) -> Uuid {
        let Some((client, scope)) = self.client_and_merged_scope() else {
            return Uuid::nil();
        };
        let event_id = client.capture_event(event, Some(&scope));
        if !event_id.is_nil() {
            *self
                .0
                .last_event_id
                .write()
                .unwrap_or_else(PoisonError::into_inner) = Some(event_id);
        }
        event_id
    }

    /// Captures an arbitrary message.
    ///
    /// See the global [`capture_message`](crate::capture_message)
    /// for more documentation.
    pub fn capture_message(&self, msg: &str, level: Level) -> Uuid {
        let event = Event {
            message: Some(msg.to_string()),
            level,
            ..Default::default()
        };
        self.capture_event(event)
    }

    /// Sends user feedback.
    ///
    /// The user, tags and trace of the scope are attached, and the feedback
    /// is linked to the last captured event unless it names one already.
    pub fn capture_feedback(&self, mut feedback: Feedback) {
        let Some((client, scope)) = self.client_and_merged_scope() else {
            return;
        };
        if let Some(crate::protocol::Context::Feedback(context)) =
            feedback.contexts.get_mut("feedback")
        {
            if context.associated_event_id.is_none() {
                context.associated_event_id = self.last_event_id();
            }
        }
        client.capture_feedback(feedback, Some(&scope));
    }

    /// Returns the last event id.
    pub fn last_event_id(&self) -> Option<Uuid> {
        *self
            .0
            .last_event_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Invokes a function that can modify the current scope.
    ///
    /// Nothing happens when the hub has no client.
    ///
    /// See the global [`configure_scope`](crate::configure_scope)
    /// for more documentation.
    pub fn configure_scope<F, R>(&self, f: F) -> R
    where
        R: Default,
        F: FnOnce(&mut Scope) -> R,
    {
        self.with_stack_mut(|stack| {
            let top = stack.top_mut();
            if top.client.is_none() {
                return Default::default();
            }
            f(Arc::make_mut(&mut top.scope))
        })
    }

    /// Invokes a function that can modify the isolation scope.
    ///
    /// Data set here applies to everything captured for this unit of work,
    /// including forks of this hub.  Nothing happens when the hub has no
    /// client.
    pub fn configure_isolation_scope<F, R>(&self, f: F) -> R
    where
        R: Default,
        F: FnOnce(&mut Scope) -> R,
    {
        if self.client().is_none() {
            return Default::default();
        }
        self.with_isolation_mut(f)
    }

    /// Pushes a new scope.
    ///
    /// This returns a guard that when dropped will pop the scope again.
    pub fn push_scope(&self) -> ScopeGuard {
        self.with_stack_mut(|stack| {
            stack.push();
            ScopeGuard(Some((self.clone(), stack.depth())))
        })
    }

    /// Temporarily pushes a scope for a single call optionally reconfiguring it.
    ///
    /// See the global [`with_scope`](crate::with_scope)
    /// for more documentation.
    pub fn with_scope<C, F, R>(&self, scope_config: C, callback: F) -> R
    where
        C: FnOnce(&mut Scope),
        F: FnOnce() -> R,
    {
        let _guard = self.push_scope();
        self.configure_scope(scope_config);
        callback()
    }

    /// Adds a new breadcrumb to the isolation scope.
    ///
    /// See the global [`add_breadcrumb`](crate::add_breadcrumb)
    /// for more documentation.
    pub fn add_breadcrumb<B: IntoBreadcrumbs>(&self, breadcrumbs: B) {
        let Some(client) = self.client() else {
            return;
        };
        let options = client.options();
        let breadcrumbs: Vec<_> = breadcrumbs
            .into_breadcrumbs()
            .filter_map(|breadcrumb| match &options.before_breadcrumb {
                Some(callback) => callback(breadcrumb),
                None => Some(breadcrumb),
            })
            .collect();
        if breadcrumbs.is_empty() {
            return;
        }
        self.with_isolation_mut(|scope| {
            for breadcrumb in breadcrumbs {
                scope.add_breadcrumb(breadcrumb, options.max_breadcrumbs);
            }
        })
    }

    /// Records a UI event such as a click as a breadcrumb.
    ///
    /// Identical consecutive events on the same target within
    /// [`DEBOUNCE_WINDOW`](crate::DEBOUNCE_WINDOW) collapse into one.
    pub fn add_ui_breadcrumb(&self, event_type: &str, target: &str) {
        let record = self
            .0
            .isolation
            .debouncer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .should_record(event_type, target);
        if record {
            self.add_breadcrumb(ui_breadcrumb(event_type, target));
        }
    }

    /// Records a feature flag evaluation.
    ///
    /// The evaluation is attached to all events of this unit of work, and
    /// to the active span.
    pub fn add_feature_flag(&self, flag: &str, result: bool) {
        let Some(client) = self.client() else {
            return;
        };
        let capacity = client.options().max_feature_flags;
        self.with_isolation_mut(|scope| scope.add_feature_flag(flag, result, capacity));
        if let Some(span) = self.current_span() {
            span.set_flag(flag, result);
        }
    }

    /// Start a new session for Release Health.
    ///
    /// The session belongs to the isolation scope and replaces any session
    /// running there, which is ended as `exited`.
    ///
    /// See the global [`start_session`](crate::start_session)
    /// for more documentation.
    pub fn start_session(&self) {
        let Some(client) = self.client() else {
            return;
        };
        let previous = self.with_isolation_mut(|scope| {
            let session = Session::new(&client, scope.user())?;
            let previous = std::mem::replace(
                &mut scope.session,
                Arc::new(Mutex::new(Some(session))),
            );
            Some(previous)
        });
        // the previous session is closed outside of the scope lock
        drop(previous);
    }

    /// End the current Release Health Session.
    ///
    /// See the global [`sentry_edge::end_session`](crate::end_session)
    /// for more documentation.
    pub fn end_session(&self) {
        self.end_session_with_status(SessionStatus::Exited)
    }

    /// End the current Release Health Session with the given [`SessionStatus`].
    ///
    /// See the global [`end_session_with_status`](crate::end_session_with_status)
    /// for more documentation.
    pub fn end_session_with_status(&self, status: SessionStatus) {
        let session = self.with_isolation_mut(|scope| {
            scope
                .session
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
        });
        if let Some(mut session) = session {
            session.close(status);
        }
    }

    /// Drains all pending events of the bound client.
    ///
    /// Returns `true` when there was nothing to send or everything was sent
    /// within `timeout`.
    pub fn flush(&self, timeout: Option<Duration>) -> bool {
        match self.client() {
            Some(client) => client.flush(timeout),
            None => true,
        }
    }
}
